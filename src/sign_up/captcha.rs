use async_trait::async_trait;

use crate::error::CoreError;

/// One upstream captcha-verification client (e.g. a specific widget type's
/// API). The pool tries these in order until one succeeds to verify.
#[async_trait]
pub trait CaptchaClient: Send + Sync {
    async fn verify(&self, token: &str) -> Result<bool, CoreError>;
}

/// Request shape captcha gating needs from the caller (spec §4.7 "Captcha
/// gating").
pub struct CaptchaRequest<'a> {
    pub production: bool,
    pub native_client: bool,
    pub captcha_enabled: bool,
    pub token: Option<&'a str>,
    /// Set when the client itself reported it could not render/solve the
    /// challenge; short-circuits to `CaptchaInvalid` without calling the pool.
    pub client_error: Option<&'a str>,
}

/// Verifies a sign-up's captcha token against a pool of upstream clients,
/// trying each widget type in turn (spec §4.7). Network/upstream failures
/// fail open — captcha exists to deter scripted abuse, not to be a hard
/// outage dependency.
pub async fn verify_captcha(pool: &[Box<dyn CaptchaClient>], req: CaptchaRequest<'_>) -> Result<(), CoreError> {
    if !req.captcha_enabled {
        return Ok(());
    }
    if req.client_error.is_some() {
        return Err(CoreError::CaptchaInvalid);
    }
    if req.production && !req.native_client {
        let token = req.token.ok_or(CoreError::CaptchaInvalid)?;
        for client in pool {
            match client.verify(token).await {
                Ok(true) => return Ok(()),
                Ok(false) => return Err(CoreError::CaptchaInvalid),
                Err(_) => continue,
            }
        }
        // Every upstream client in the pool failed to respond: fail open.
    }
    Ok(())
}

/// Deterministic fake: accepts any token equal to `"valid"`.
pub struct FakeCaptchaClient;

#[async_trait]
impl CaptchaClient for FakeCaptchaClient {
    async fn verify(&self, token: &str) -> Result<bool, CoreError> {
        Ok(token == "valid")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pool() -> Vec<Box<dyn CaptchaClient>> {
        vec![Box::new(FakeCaptchaClient)]
    }

    #[tokio::test]
    async fn native_clients_skip_captcha() {
        let result = verify_captcha(
            &pool(),
            CaptchaRequest {
                production: true,
                native_client: true,
                captcha_enabled: true,
                token: None,
                client_error: None,
            },
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn missing_token_in_production_is_rejected() {
        let result = verify_captcha(
            &pool(),
            CaptchaRequest {
                production: true,
                native_client: false,
                captcha_enabled: true,
                token: None,
                client_error: None,
            },
        )
        .await;
        assert!(matches!(result, Err(CoreError::CaptchaInvalid)));
    }

    #[tokio::test]
    async fn client_reported_error_short_circuits() {
        let result = verify_captcha(
            &pool(),
            CaptchaRequest {
                production: true,
                native_client: false,
                captcha_enabled: true,
                token: Some("valid"),
                client_error: Some("widget_failed"),
            },
        )
        .await;
        assert!(matches!(result, Err(CoreError::CaptchaInvalid)));
    }

    #[tokio::test]
    async fn valid_token_passes() {
        let result = verify_captcha(
            &pool(),
            CaptchaRequest {
                production: true,
                native_client: false,
                captcha_enabled: true,
                token: Some("valid"),
                client_error: None,
            },
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn upstream_failure_fails_open() {
        struct Flaky;
        #[async_trait]
        impl CaptchaClient for Flaky {
            async fn verify(&self, _token: &str) -> Result<bool, CoreError> {
                Err(CoreError::Unexpected("network down".into()))
            }
        }
        let pool: Vec<Box<dyn CaptchaClient>> = vec![Box::new(Flaky)];
        let result = verify_captcha(
            &pool,
            CaptchaRequest {
                production: true,
                native_client: false,
                captcha_enabled: true,
                token: Some("anything"),
                client_error: None,
            },
        )
        .await;
        assert!(result.is_ok());
    }
}
