use url::Url;

use crate::error::CoreError;

/// The `Access-Control-Allow-Origin` value the handshake-mediated sync
/// redirect must send so it survives opaque-origin browsers (spec §4.8
/// "the handshake adds `Access-Control-Allow-Origin: null` and credentials").
pub const HANDSHAKE_SYNC_ALLOW_ORIGIN: &str = "null";

/// Builds the satellite-side redirect to the Primary's `/client/handshake`,
/// the handshake analogue of [`super::sync::build_satellite_redirect`]: uses
/// `satellite_fapi` rather than `link_domain` as the satellite identifier.
pub fn build_handshake_redirect(primary_fapi_host: &str, satellite_fapi: &str, redirect_url: &str) -> Result<Url, CoreError> {
    let mut url = Url::parse(&format!("https://{primary_fapi_host}/client/handshake")).map_err(|e| CoreError::Unexpected(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("redirect_url", redirect_url)
        .append_pair("satellite_fapi", satellite_fapi);
    Ok(url)
}

/// Builds the redirect back to the satellite's `/client/handshake`, carrying
/// the signed handshake payload under `__clerk_sync_token` rather than the
/// `__clerk_token` parameter the plain link flow uses.
pub fn build_handshake_sync_redirect(satellite_fapi_host: &str, sync_token: &str) -> Result<Url, CoreError> {
    let mut url = Url::parse(&format!("https://{satellite_fapi_host}/client/handshake")).map_err(|e| CoreError::Unexpected(e.to_string()))?;
    url.query_pairs_mut().append_pair("__clerk_sync_token", sync_token);
    Ok(url)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn handshake_redirect_uses_satellite_fapi_param() {
        let url = build_handshake_redirect("primary.example.com", "satellite.example.com", "https://satellite.example.com/after").unwrap();
        assert!(url.query().unwrap().contains("satellite_fapi=satellite.example.com"));
    }

    #[test]
    fn handshake_sync_redirect_carries_sync_token() {
        let url = build_handshake_sync_redirect("satellite.example.com", "tok123").unwrap();
        assert!(url.query().unwrap().contains("__clerk_sync_token=tok123"));
    }
}
