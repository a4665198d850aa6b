use std::time::Duration as StdDuration;

use chrono::Duration;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

pub const SERVICE_NAME: &str = "clerk-core";

/// Database connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbConfig {
    pub connection_string: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// Signing material for the auth cookie and the default session token.
/// A production deployment rotates these through a KMS-backed provider;
/// this CORE only needs the resolved secret + algorithm name.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningConfig {
    pub secret: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    pub kid: Option<String>,
}

fn default_algorithm() -> String {
    "HS256".into()
}

/// TTLs for the flows a `SignInMachine`/`SignUpMachine` drive (spec §4.6-§4.7).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowTtlConfig {
    #[serde(default = "default_sign_in_ttl_secs")]
    pub sign_in_ttl_secs: i64,
    #[serde(default = "default_sign_up_ttl_secs")]
    pub sign_up_ttl_secs: i64,
    #[serde(default = "default_verification_ttl_secs")]
    pub verification_ttl_secs: i64,
    #[serde(default = "default_max_attempts")]
    pub max_verification_attempts: u32,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,
    #[serde(default = "default_session_abandon_secs")]
    pub session_abandon_secs: i64,
    #[serde(default = "default_cookie_ttl_secs")]
    pub cookie_ttl_secs: i64,
    #[serde(default = "default_session_token_ttl_secs")]
    pub session_token_ttl_secs: i64,
}

fn default_sign_in_ttl_secs() -> i64 {
    60 * 30
}
fn default_sign_up_ttl_secs() -> i64 {
    60 * 30
}
fn default_verification_ttl_secs() -> i64 {
    60 * 10
}
fn default_max_attempts() -> u32 {
    5
}
fn default_session_ttl_secs() -> i64 {
    60 * 60 * 24 * 7
}
fn default_session_abandon_secs() -> i64 {
    60 * 60 * 24 * 30
}
fn default_cookie_ttl_secs() -> i64 {
    60 * 60 * 24 * 365
}
fn default_session_token_ttl_secs() -> i64 {
    60
}

impl FlowTtlConfig {
    pub fn sign_in_ttl(&self) -> Duration {
        Duration::seconds(self.sign_in_ttl_secs)
    }
    pub fn sign_up_ttl(&self) -> Duration {
        Duration::seconds(self.sign_up_ttl_secs)
    }
    pub fn verification_ttl(&self) -> Duration {
        Duration::seconds(self.verification_ttl_secs)
    }
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_secs)
    }
    pub fn session_abandon(&self) -> Duration {
        Duration::seconds(self.session_abandon_secs)
    }
}

/// Tracing/log output shape (spec ambient stack: structured logging).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "info".into()
}

/// The application configuration, assembled from (in increasing priority)
/// `config/default.toml`, an environment-specific `config/{env}.toml`, and
/// `CLERK_CORE__*` environment variables. Generalizes the teacher's layered
/// `AppConfig::new()` without depending on its unpublished `CoreConfig`
/// pre-init step, which this CORE has no equivalent of.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub listen_address: String,
    #[serde(default)]
    pub production: bool,
    #[serde(default)]
    pub allow_origins: Vec<String>,
    pub issuer: String,

    pub db: DbConfig,
    /// Base URL of the edge backend an Instance with `edge_enabled` routes
    /// new Clients to (spec §4.2). `None` disables edge routing outright.
    pub edge_base_url: Option<String>,
    pub cookie_signing: SigningConfig,
    pub token_signing: SigningConfig,
    pub flow_ttl: FlowTtlConfig,
    pub tracing: TracingConfig,
}

impl AppConfig {
    pub fn load() -> Result<AppConfig, ConfigError> {
        let env = std::env::var("CLERK_CORE_ENV").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{env}")).required(false))
            .add_source(Environment::with_prefix("clerk_core").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn db_connect_timeout(&self) -> StdDuration {
        StdDuration::from_secs(5)
    }
}
