use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use cds_core::constants::{DEFAULT_CONFIG_PATH, DEFAULT_ONTOLOGY_DIR, DEFAULT_TENANT_CONFIG_DIR};
use cds_core::{
    InMemoryAuditLog, RuleRegistry, ServiceConfig, TenantEngines, build_registry, load_graph,
};

/// Main entry point for the CDS service
///
/// Resolves start-up configuration from the environment once, loads the ontology graph and
/// rule set, and serves the REST API.
///
/// # Environment Variables
/// - `CDS_REST_ADDR`: REST server address (default: "0.0.0.0:8000")
/// - `ONTOLOGY_DIR`: Directory of ontology sources (default: "ontologies")
/// - `CONFIG_DIR`: Directory of per-tenant configuration files (default: "configs/tenants")
/// - `CDS_DEFAULT_CONFIG`: Default configuration file (default: "configs/default.json")
/// - `CDS_RULES_FILE`: Optional extension rule file loaded on top of the built-in rules
/// - `API_KEY`: API key required on `/evaluate`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - `API_KEY` is not set,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cds_run=info".parse()?)
                .add_directive("cds_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CDS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into());
    let api_key =
        std::env::var("API_KEY").map_err(|_| anyhow::anyhow!("API_KEY not set in environment"))?;

    let service = ServiceConfig::new(
        env_path("ONTOLOGY_DIR", DEFAULT_ONTOLOGY_DIR),
        env_path("CONFIG_DIR", DEFAULT_TENANT_CONFIG_DIR),
        env_path("CDS_DEFAULT_CONFIG", DEFAULT_CONFIG_PATH),
        std::env::var("CDS_RULES_FILE").ok().map(PathBuf::from),
    );

    let graph = load_graph(service.ontology_dir());
    let registry = match build_registry(service.rules_file()) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::warn!("-- Ignoring extension rules: {e}");
            RuleRegistry::with_defaults()
        }
    };
    tracing::info!("-- Loaded {} rules", registry.len());

    let engines = TenantEngines::new(
        service,
        Arc::new(graph),
        Arc::new(registry),
        Arc::new(InMemoryAuditLog::new()),
    );
    // Fail fast on a broken default configuration.
    engines.engine_for(None)?;

    let app = router(AppState::new(Arc::new(engines), api_key));

    tracing::info!("++ Starting CDS REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
