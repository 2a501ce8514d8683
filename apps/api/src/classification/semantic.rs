//! Semantic Analyzer: optional AI role hint consumed by the template selector.
//!
//! `AppState` holds an `Arc<dyn SemanticAnalyzer>`, swapped at startup:
//! `LlmSemanticAnalyzer` when an API key is configured, `NoopAnalyzer` otherwise.
//! Callers go through `analyze_with_timeout`, which never fails: any error or
//! timeout degrades to `None` and classification proceeds keyword-only.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::classification::catalog::{RoleCatalog, RoleKey};
use crate::classification::prompts::{ROLE_HINT_PROMPT_TEMPLATE, ROLE_HINT_SYSTEM};
use crate::llm_client::{LlmClient, LlmError};

/// Characters of job description forwarded to the model.
const MAX_PROMPT_CHARS: usize = 12_000;

/// The AI collaborator's guess: a role plus its confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoleHint {
    pub role: RoleKey,
    pub confidence: f64,
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("semantic analysis is disabled")]
    Disabled,

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("malformed role hint: {0}")]
    Malformed(String),

    #[error("semantic analysis timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait SemanticAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<RoleHint, AnalyzerError>;
}

// ────────────────────────────────────────────────────────────────────────────
// NoopAnalyzer: used when no API key is configured, and in tests
// ────────────────────────────────────────────────────────────────────────────

pub struct NoopAnalyzer;

#[async_trait]
impl SemanticAnalyzer for NoopAnalyzer {
    async fn analyze(&self, _text: &str) -> Result<RoleHint, AnalyzerError> {
        Err(AnalyzerError::Disabled)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmSemanticAnalyzer: Anthropic-backed hint
// ────────────────────────────────────────────────────────────────────────────

/// Wire shape returned by the model. `role` is parsed leniently into a `RoleKey`.
#[derive(Debug, Deserialize)]
struct RawRoleHint {
    role: String,
    confidence: f64,
}

pub struct LlmSemanticAnalyzer {
    llm: LlmClient,
    roles_listing: String,
}

impl LlmSemanticAnalyzer {
    pub fn new(llm: LlmClient, catalog: &RoleCatalog) -> Self {
        let roles_listing = catalog
            .categories()
            .iter()
            .map(|c| format!("- {} ({})", c.key, c.display_name))
            .collect::<Vec<_>>()
            .join("\n");
        Self { llm, roles_listing }
    }

    fn build_prompt(&self, text: &str) -> String {
        let excerpt: String = text.chars().take(MAX_PROMPT_CHARS).collect();
        ROLE_HINT_PROMPT_TEMPLATE
            .replace("{roles}", &self.roles_listing)
            .replace("{jd_text}", &excerpt)
    }
}

#[async_trait]
impl SemanticAnalyzer for LlmSemanticAnalyzer {
    async fn analyze(&self, text: &str) -> Result<RoleHint, AnalyzerError> {
        let raw: RawRoleHint = self
            .llm
            .call_json(&self.build_prompt(text), ROLE_HINT_SYSTEM)
            .await?;
        parse_hint(raw)
    }
}

fn parse_hint(raw: RawRoleHint) -> Result<RoleHint, AnalyzerError> {
    let role = raw
        .role
        .parse::<RoleKey>()
        .map_err(|e| AnalyzerError::Malformed(e.to_string()))?;
    if !raw.confidence.is_finite() {
        return Err(AnalyzerError::Malformed(format!(
            "confidence is not a number: {}",
            raw.confidence
        )));
    }
    Ok(RoleHint {
        role,
        confidence: raw.confidence.clamp(0.0, 1.0),
    })
}

/// Runs the analyzer under `timeout`. Failures are logged and discarded.
pub async fn analyze_with_timeout(
    analyzer: &dyn SemanticAnalyzer,
    text: &str,
    timeout: Duration,
) -> Option<RoleHint> {
    let outcome = match tokio::time::timeout(timeout, analyzer.analyze(text)).await {
        Ok(result) => result,
        Err(_) => Err(AnalyzerError::Timeout(timeout)),
    };

    match outcome {
        Ok(hint) => {
            debug!("Semantic hint: {} ({:.2})", hint.role, hint.confidence);
            Some(hint)
        }
        Err(AnalyzerError::Disabled) => None,
        Err(e) => {
            warn!("Semantic analysis unavailable, continuing keyword-only: {e}");
            None
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAnalyzer(RoleHint);

    #[async_trait]
    impl SemanticAnalyzer for FixedAnalyzer {
        async fn analyze(&self, _text: &str) -> Result<RoleHint, AnalyzerError> {
            Ok(self.0)
        }
    }

    struct SlowAnalyzer;

    #[async_trait]
    impl SemanticAnalyzer for SlowAnalyzer {
        async fn analyze(&self, _text: &str) -> Result<RoleHint, AnalyzerError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(RoleHint {
                role: RoleKey::Backend,
                confidence: 1.0,
            })
        }
    }

    struct BrokenAnalyzer;

    #[async_trait]
    impl SemanticAnalyzer for BrokenAnalyzer {
        async fn analyze(&self, _text: &str) -> Result<RoleHint, AnalyzerError> {
            Err(AnalyzerError::Malformed("not json".to_string()))
        }
    }

    #[tokio::test]
    async fn test_hint_passes_through() {
        let hint = RoleHint {
            role: RoleKey::Mobile,
            confidence: 0.9,
        };
        let result = analyze_with_timeout(&FixedAnalyzer(hint), "jd", Duration::from_secs(5)).await;
        assert_eq!(result, Some(hint));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades_to_none() {
        let result = analyze_with_timeout(&SlowAnalyzer, "jd", Duration::from_secs(5)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_failure_degrades_to_none() {
        assert!(analyze_with_timeout(&BrokenAnalyzer, "jd", Duration::from_secs(5))
            .await
            .is_none());
        assert!(analyze_with_timeout(&NoopAnalyzer, "jd", Duration::from_secs(5))
            .await
            .is_none());
    }

    #[test]
    fn test_parse_hint_clamps_confidence() {
        let hint = parse_hint(RawRoleHint {
            role: "AI-systems".to_string(),
            confidence: 1.7,
        })
        .unwrap();
        assert_eq!(hint.role, RoleKey::AiSystems);
        assert_eq!(hint.confidence, 1.0);
    }

    #[test]
    fn test_parse_hint_rejects_unknown_role() {
        let err = parse_hint(RawRoleHint {
            role: "wizard".to_string(),
            confidence: 0.5,
        })
        .unwrap_err();
        assert!(matches!(err, AnalyzerError::Malformed(_)));
    }

    #[test]
    fn test_prompt_lists_roles_and_truncates_text() {
        let catalog = RoleCatalog::builtin().unwrap();
        let llm = LlmClient::new("k".to_string(), Duration::from_secs(5)).unwrap();
        let analyzer = LlmSemanticAnalyzer::new(llm, &catalog);

        let long_text = "x".repeat(MAX_PROMPT_CHARS + 500);
        let prompt = analyzer.build_prompt(&long_text);
        assert!(prompt.contains("- ai_systems (AI Systems Engineer)"));
        assert!(prompt.contains(&"x".repeat(MAX_PROMPT_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_PROMPT_CHARS + 1)));
    }
}
