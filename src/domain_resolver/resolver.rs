use async_trait::async_trait;
use thiserror::Error as ThisError;
use url::Url;

use super::environment::{DomainKind, Environment};

#[derive(Debug, ThisError)]
pub enum DomainResolveError {
    #[error("no environment is configured for host {0}")]
    UnknownHost(String),
    #[error("environment lookup failed: {0}")]
    Backend(String),
}

/// Environment lookup by host; an external collaborator contract the CORE
/// calls into (the actual Application/Instance/Domain/AuthConfig store is
/// out of scope per spec §1).
#[async_trait]
pub trait EnvironmentLookup: Send + Sync {
    async fn by_host(&self, host: &str) -> Result<Environment, DomainResolveError>;
}

#[async_trait]
impl EnvironmentLookup for std::sync::Arc<dyn EnvironmentLookup> {
    async fn by_host(&self, host: &str) -> Result<Environment, DomainResolveError> {
        self.as_ref().by_host(host).await
    }
}

/// Classifies a request's Domain as Primary/Satellite and exposes the
/// host/URL accessors §4.3 names.
pub struct DomainResolver<L: EnvironmentLookup> {
    lookup: L,
}

impl<L: EnvironmentLookup> DomainResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    pub async fn resolve(&self, host: &str) -> Result<Environment, DomainResolveError> {
        self.lookup.by_host(host).await
    }

    pub fn kind(&self, env: &Environment) -> DomainKind {
        env.domain.kind(&env.instance)
    }

    pub fn is_satellite(&self, env: &Environment) -> bool {
        self.kind(env) == DomainKind::Satellite
    }

    /// The FAPI-side host, used for the `__client` cookie's `Domain=`.
    pub fn auth_host(&self, env: &Environment) -> String {
        env.domain.fapi_host.clone()
    }

    /// The eTLD+1 of the developer-facing host, or `localhost`.
    pub fn client_uat_domain(&self, env: &Environment) -> String {
        if let Some(suffix) = &env.instance.cookie_domain_suffix {
            suffix.clone()
        } else {
            etld_plus_one(&env.domain.fapi_host)
        }
    }

    pub fn fapi_url(&self, env: &Environment) -> Url {
        if let Some(proxy) = &env.domain.proxy_url {
            proxy.clone()
        } else {
            Url::parse(&format!("https://{}", env.domain.fapi_host)).expect("fapi host must produce a valid URL")
        }
    }

    pub fn fapi_host(&self, env: &Environment) -> String {
        self.fapi_url(env).host_str().unwrap_or_default().to_owned()
    }
}

/// Best-effort eTLD+1 by label count: the last two labels, unless the host
/// is a bare `localhost`/IP. A production implementation would consult the
/// Public Suffix List; this mirrors the complexity budget of this CORE,
/// where full PSL awareness lives in the `DomainResolver`'s collaborator.
pub fn etld_plus_one(host: &str) -> String {
    let host = host.split(':').next().unwrap_or(host);
    if host == "localhost" || host.parse::<std::net::IpAddr>().is_ok() {
        return host.to_owned();
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        host.to_owned()
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn etld_plus_one_strips_subdomains() {
        assert_eq!(etld_plus_one("accounts.clerk.example.com"), "example.com");
        assert_eq!(etld_plus_one("example.com"), "example.com");
        assert_eq!(etld_plus_one("localhost"), "localhost");
        assert_eq!(etld_plus_one("localhost:3000"), "localhost");
    }
}
