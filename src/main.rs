use std::sync::Arc;

use async_trait::async_trait;
use clerk_core::config::AppConfig;
use clerk_core::domain_resolver::{DomainResolveError, Environment, EnvironmentLookup};
use clerk_core::external_account::FakeExternalAccountProvider;
use clerk_core::routes::{router, AppState};
use clerk_core::sign_in::{FakePasswordVerifier, NullCodeDelivery, NullIdentifierPolicy};
use clerk_core::store::cache::MokaMaintenanceCache;
use clerk_core::store::{ClientStore, EdgeStore, RelationalFlowStore, RelationalStore};
use clerk_core::telemetry;
use reqwest::Client as HttpClient;
use sqlx::postgres::PgPoolOptions;
use url::Url;

/// Resolves every host to a single, statically-configured `Environment`.
/// Real multi-tenant deployments back `EnvironmentLookup` with an
/// Application/Instance/Domain store (out of this CORE's persisted scope
/// per spec §1); this is the single-tenant bootstrap default.
struct SingleEnvironmentLookup(Environment);

#[async_trait]
impl EnvironmentLookup for SingleEnvironmentLookup {
    async fn by_host(&self, _host: &str) -> Result<Environment, DomainResolveError> {
        Ok(self.0.clone())
    }
}

fn default_environment(config: &AppConfig) -> Environment {
    use clerk_core::domain::TypedId;
    use clerk_core::domain_resolver::{Application, AuthConfig, Domain, Instance};

    let application_id = TypedId::new("app_default");
    let instance_id = TypedId::new("ins_default");
    let domain_id = TypedId::new("dom_default");

    Environment {
        application: Application { id: application_id, name: "default".into() },
        instance: Instance {
            id: instance_id.clone(),
            application_id: TypedId::new("app_default"),
            active_domain_id: domain_id.clone(),
            edge_enabled: false,
            single_session_mode: false,
            multi_session_mode: true,
            captcha_enabled: false,
            legacy_orgs_claim_cutoff: None,
            allowed_clerk_js_min_version: None,
            same_site_none_allowlisted: false,
            cookie_domain_suffix: None,
        },
        domain: Domain {
            id: domain_id,
            instance_id,
            fapi_host: config.listen_address.clone(),
            is_satellite: false,
            proxy_url: None,
        },
        auth_config: AuthConfig {
            allow_origins: config.allow_origins.clone(),
            captcha_secret: None,
            billing_enabled: false,
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    telemetry::init(&config.tracing);

    tracing::info!(service = clerk_core::config::SERVICE_NAME, "starting");

    let pool = PgPoolOptions::new()
        .max_connections(config.db.max_connections)
        .acquire_timeout(config.db_connect_timeout())
        .connect(&config.db.connection_string)
        .await?;

    let relational = Arc::new(RelationalStore::new(pool.clone()));
    let edge_base_url = config.edge_base_url.clone().unwrap_or_else(|| "http://localhost".into());
    let edge = Arc::new(EdgeStore::new(HttpClient::new(), Url::parse(&edge_base_url)?));
    let cache = Arc::new(MokaMaintenanceCache::new(10_000));

    let client_store = ClientStore::new(relational, edge, cache);
    let flow_store: Box<dyn clerk_core::store::FlowStore> = Box::new(RelationalFlowStore::new(pool));

    let environment_lookup: Arc<dyn EnvironmentLookup> = Arc::new(SingleEnvironmentLookup(default_environment(&config)));

    let state = AppState::new(
        config.clone(),
        client_store,
        flow_store,
        environment_lookup,
        Arc::new(FakePasswordVerifier),
        Arc::new(NullCodeDelivery),
        Arc::new(NullIdentifierPolicy),
        Vec::new(),
        Arc::new(FakeExternalAccountProvider),
    );

    let app = router().with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_address).await?;
    tracing::info!(address = %config.listen_address, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
