//! Classifier: the request-level pipeline.
//!
//! Flow: validate → extract keywords → score → percentages → select template.
//! Everything here is synchronous and request-scoped; the only shared state is
//! the read-only catalog and the template store. The optional AI hint is fetched
//! by `classify_enriched` before the synchronous pipeline runs.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::classification::catalog::{CatalogError, RoleCatalog, RoleKey};
use crate::classification::customizer::{customize, CustomizeError, CustomizedDocument};
use crate::classification::keywords::{KeywordExtractor, KeywordMatchSet};
use crate::classification::scoring::{compute_percentages, compute_scores, PercentageSet, ScoreSet};
use crate::classification::selector::{
    breakdown, ExclusionReason, FallbackStep, NoUsableTemplate, RoleBreakdownEntry,
    SelectionPolicy, TemplateMatch, TemplateSelector,
};
use crate::classification::semantic::{analyze_with_timeout, RoleHint, SemanticAnalyzer};
use crate::classification::templates::{TemplateError, TemplateStore};

/// Default input cap (~50 KB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 50 * 1024;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("job description is empty")]
    Empty,

    #[error("job description is {len} bytes; the limit is {max}")]
    TooLarge { len: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("no usable template (default role {role}: {reason})")]
    TemplateUnavailable {
        role: RoleKey,
        reason: ExclusionReason,
        fallback_steps: Vec<FallbackStep>,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Customize(#[from] CustomizeError),
}

impl From<NoUsableTemplate> for ClassifyError {
    fn from(e: NoUsableTemplate) -> Self {
        ClassifyError::TemplateUnavailable {
            role: e.role,
            reason: e.reason,
            fallback_steps: e.fallback_steps,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Results
// ────────────────────────────────────────────────────────────────────────────

/// Full outcome of a classification with keyword signal.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub analysis_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub keywords: KeywordMatchSet,
    pub scores: ScoreSet,
    pub percentages: PercentageSet,
    pub breakdown: Vec<RoleBreakdownEntry>,
    pub template: TemplateMatch,
    pub mixed_role: bool,
    pub fallback_used: bool,
    pub exhausted: bool,
    pub fallback_steps: Vec<FallbackStep>,
    pub hint: Option<RoleHint>,
    pub hint_applied: bool,
}

/// No keyword matched any role. Percentages are all zero, not uniform.
#[derive(Debug, Clone, Serialize)]
pub struct NoSignalResult {
    pub analysis_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub percentages: PercentageSet,
    /// The default role's template, offered so callers can still proceed.
    pub template: TemplateMatch,
    pub hint: Option<RoleHint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Classification {
    Matched(AnalysisResult),
    NoSignal(NoSignalResult),
}

impl Classification {
    pub fn template(&self) -> &TemplateMatch {
        match self {
            Classification::Matched(result) => &result.template,
            Classification::NoSignal(result) => &result.template,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Classifier
// ────────────────────────────────────────────────────────────────────────────

/// Rejects empty and oversized input before any extraction work.
pub fn validate_input(text: &str, max_bytes: usize) -> Result<(), InputError> {
    if text.trim().is_empty() {
        return Err(InputError::Empty);
    }
    if text.len() > max_bytes {
        return Err(InputError::TooLarge {
            len: text.len(),
            max: max_bytes,
        });
    }
    Ok(())
}

pub struct Classifier {
    catalog: Arc<RoleCatalog>,
    extractor: KeywordExtractor,
    store: Arc<dyn TemplateStore>,
    policy: SelectionPolicy,
    max_input_bytes: usize,
}

impl Classifier {
    pub fn new(
        catalog: Arc<RoleCatalog>,
        store: Arc<dyn TemplateStore>,
        policy: SelectionPolicy,
        max_input_bytes: usize,
    ) -> Result<Self, CatalogError> {
        let extractor = KeywordExtractor::new(&catalog)?;
        Ok(Self {
            catalog,
            extractor,
            store,
            policy,
            max_input_bytes,
        })
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    pub fn validate(&self, text: &str) -> Result<(), InputError> {
        validate_input(text, self.max_input_bytes)
    }

    /// Keyword-only (or pre-fetched hint) classification.
    pub fn classify(
        &self,
        text: &str,
        hint: Option<&RoleHint>,
    ) -> Result<Classification, ClassifyError> {
        self.validate(text)?;

        let keywords: KeywordMatchSet = self.extractor.extract(text);
        let scores = compute_scores(&keywords, &self.catalog);
        let percentages = compute_percentages(&scores);
        let selector = TemplateSelector::new(&self.catalog, self.store.as_ref(), &self.policy);

        let analysis_id = Uuid::new_v4();
        let analyzed_at = Utc::now();

        if !percentages.has_signal() {
            warn!("Analysis {analysis_id}: no role keywords matched; using default role");
            let template = selector.default_template(&keywords, &scores, &percentages)?;
            return Ok(Classification::NoSignal(NoSignalResult {
                analysis_id,
                analyzed_at,
                percentages,
                template,
                hint: hint.copied(),
            }));
        }

        let selection = selector.select(&keywords, &scores, &percentages, hint)?;
        let breakdown = breakdown(&self.catalog, &percentages, self.policy.breakdown_threshold);

        info!(
            "Analysis {analysis_id}: {} ({:.1}%, confidence {:.2}, mixed_role={}, fallback_used={})",
            selection.template.role,
            selection.template.percentage,
            selection.template.confidence,
            selection.mixed_role,
            selection.fallback_used
        );

        Ok(Classification::Matched(AnalysisResult {
            analysis_id,
            analyzed_at,
            keywords,
            scores,
            percentages,
            breakdown,
            template: selection.template,
            mixed_role: selection.mixed_role,
            fallback_used: selection.fallback_used,
            exhausted: selection.exhausted,
            fallback_steps: selection.fallback_steps,
            hint: hint.copied(),
            hint_applied: selection.hint_applied,
        }))
    }

    /// Validates, fetches an AI hint under `timeout`, then classifies.
    /// A failed or slow analyzer never fails the classification.
    pub async fn classify_enriched(
        &self,
        text: &str,
        analyzer: &dyn SemanticAnalyzer,
        timeout: Duration,
    ) -> Result<Classification, ClassifyError> {
        self.validate(text)?;
        let hint = analyze_with_timeout(analyzer, text, timeout).await;
        self.classify(text, hint.as_ref())
    }

    /// Reads the selected template and fills its placeholders.
    pub fn customize(
        &self,
        template: &TemplateMatch,
        values: &BTreeMap<String, String>,
    ) -> Result<CustomizedDocument, ClassifyError> {
        let content = self.store.read(&template.template_path)?;
        Ok(customize(&content, values, &self.policy.required_markers)?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
