use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::TypedId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: TypedId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: TypedId,
    pub application_id: TypedId,
    pub active_domain_id: TypedId,
    pub edge_enabled: bool,
    pub single_session_mode: bool,
    pub multi_session_mode: bool,
    pub captcha_enabled: bool,
    pub legacy_orgs_claim_cutoff: Option<chrono::DateTime<chrono::Utc>>,
    pub allowed_clerk_js_min_version: Option<String>,
    pub same_site_none_allowlisted: bool,
    pub cookie_domain_suffix: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    Primary,
    Satellite,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: TypedId,
    pub instance_id: TypedId,
    pub fapi_host: String,
    pub is_satellite: bool,
    /// Present only when this Domain runs behind a developer-configured
    /// reverse proxy, in which case cookies use the proxy's host/path
    /// rather than the FAPI host directly.
    pub proxy_url: Option<Url>,
}

impl Domain {
    pub fn kind(&self, instance: &Instance) -> DomainKind {
        if self.id == instance.active_domain_id {
            DomainKind::Primary
        } else {
            DomainKind::Satellite
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub allow_origins: Vec<String>,
    pub captcha_secret: Option<String>,
    pub billing_enabled: bool,
}

/// The resolved quadruple for a given request (glossary: "Environment").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub application: Application,
    pub instance: Instance,
    pub domain: Domain,
    pub auth_config: AuthConfig,
}
