use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Claims recovered from an OAuth/OIDC/SAML provider after a successful
/// callback, used by `SignInMachine`/`SignUpMachine` to populate identity
/// fields and by the reserved-identification promotion step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalAccountProfile {
    pub provider_user_id: String,
    pub email_address: Option<String>,
    pub email_verified: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// The OAuth2/OIDC/SAML contract the CORE calls into for strategies like
/// `oauth_callback`/`saml`; the actual provider integrations (token
/// exchange, discovery documents, signature verification) are external to
/// this CORE per spec §1 Non-goals.
#[async_trait]
pub trait ExternalAccountProvider: Send + Sync {
    /// Exchanges an authorization code/SAML response for a verified profile.
    async fn exchange(&self, connection_id: &str, code_or_response: &str) -> Result<ExternalAccountProfile, CoreError>;

    /// Best-effort refresh-token maintenance for a linked account (spec
    /// §4.6.1 step 6). Failure must not abort the surrounding conversion.
    async fn ensure_refresh_token(&self, connection_id: &str, profile: &ExternalAccountProfile) -> Result<(), CoreError>;
}

/// Deterministic fake: treats `code_or_response` as the provider user id and
/// never fails.
#[derive(Default)]
pub struct FakeExternalAccountProvider;

#[async_trait]
impl ExternalAccountProvider for FakeExternalAccountProvider {
    async fn exchange(&self, _connection_id: &str, code_or_response: &str) -> Result<ExternalAccountProfile, CoreError> {
        Ok(ExternalAccountProfile {
            provider_user_id: code_or_response.to_owned(),
            email_address: None,
            email_verified: false,
            first_name: None,
            last_name: None,
            image_url: None,
            access_token: None,
            refresh_token: None,
        })
    }

    async fn ensure_refresh_token(&self, _connection_id: &str, _profile: &ExternalAccountProfile) -> Result<(), CoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn fake_provider_echoes_code_as_user_id() {
        let provider = FakeExternalAccountProvider;
        let profile = provider.exchange("oauth_google", "code123").await.unwrap();
        assert_eq!(profile.provider_user_id, "code123");
    }
}
