mod classification;
mod config;
mod errors;
mod llm_client;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::classification::catalog::RoleCatalog;
use crate::classification::pipeline::Classifier;
use crate::classification::semantic::{LlmSemanticAnalyzer, NoopAnalyzer, SemanticAnalyzer};
use crate::classification::templates::FsTemplateStore;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Load the role catalog once; it is read-only from here on
    let catalog = match &config.catalog_path {
        Some(path) => {
            info!("Loading role catalog from {}", path.display());
            RoleCatalog::from_json_file(path)?
        }
        None => RoleCatalog::builtin()?,
    };
    let catalog = Arc::new(catalog);
    info!(
        "Role catalog loaded: {} roles (default: {})",
        catalog.len(),
        catalog.default_role()
    );

    // Template storage
    if !config.template_root.is_dir() {
        warn!(
            "Template root {} does not exist; every classification will fail template lookup",
            config.template_root.display()
        );
    }
    let store = Arc::new(FsTemplateStore::new(config.template_root.clone()));

    let classifier = Classifier::new(
        catalog.clone(),
        store,
        config.selection_policy(),
        config.max_jd_bytes,
    )?;

    // Semantic hint (NoopAnalyzer unless an API key is configured)
    let analyzer: Arc<dyn SemanticAnalyzer> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone(), config.ai_timeout)?;
            info!(
                "Semantic role hints enabled (model: {}, timeout: {:?})",
                llm_client::MODEL,
                config.ai_timeout
            );
            Arc::new(LlmSemanticAnalyzer::new(llm, &catalog))
        }
        None => {
            info!("ANTHROPIC_API_KEY not set; classifying keyword-only");
            Arc::new(NoopAnalyzer)
        }
    };

    // Build app state
    let state = AppState {
        config: config.clone(),
        classifier: Arc::new(classifier),
        analyzer,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
