use std::sync::Arc;

use crate::classification::pipeline::Classifier;
use crate::classification::semantic::SemanticAnalyzer;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Catalog, keyword matcher and template store; read-only after startup.
    pub classifier: Arc<Classifier>,
    /// Pluggable AI hint. Default: NoopAnalyzer. LLM-backed when ANTHROPIC_API_KEY is set.
    pub analyzer: Arc<dyn SemanticAnalyzer>,
}
