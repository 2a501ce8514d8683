//! Template Selector: turns percentage shares into a usable role template.
//!
//! Pipeline for one request:
//! 1. Misclassification guard: the guarded role needs a majority share to win
//! 2. Best match (percentage desc, priority asc, key asc), optionally nudged by an AI hint
//! 3. Content alignment: enough of the role's keywords must appear in the text
//! 4. Template existence and structure
//! 5. On failure, exclude the role and re-run best match over the remainder
//!
//! Step 5 is a loop over a shrinking candidate mask, bounded by the category count.
//! When every candidate is gone the catalog's default role is used.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classification::catalog::{RoleCatalog, RoleCategory, RoleKey};
use crate::classification::customizer::{missing_markers, DEFAULT_REQUIRED_MARKERS};
use crate::classification::keywords::KeywordMatchSet;
use crate::classification::scoring::{PercentageSet, ScoreSet};
use crate::classification::semantic::RoleHint;
use crate::classification::templates::{TemplateError, TemplateStore};

// ────────────────────────────────────────────────────────────────────────────
// Policy
// ────────────────────────────────────────────────────────────────────────────

/// Blend used for the confidence score. Tunable calibration, not a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceCalibration {
    /// Weight of (winner − runner-up) / 100.
    pub gap_weight: f64,
    /// Weight of winner / 100.
    pub share_weight: f64,
    /// Raw score at which the winner counts as fully significant.
    pub significant_score: f64,
}

impl Default for ConfidenceCalibration {
    fn default() -> Self {
        Self {
            gap_weight: 0.7,
            share_weight: 0.3,
            significant_score: 3.0,
        }
    }
}

/// When an AI hint may override the keyword winner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintPolicy {
    pub min_confidence: f64,
    /// Max percentage points the hinted role may trail the keyword winner by.
    pub max_gap: f64,
}

impl Default for HintPolicy {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            max_gap: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionPolicy {
    pub breakdown_threshold: f64,
    pub mixed_role_threshold: f64,
    pub guard_threshold: f64,
    pub alignment_min_fraction: f64,
    pub required_markers: Vec<String>,
    pub confidence: ConfidenceCalibration,
    pub hint: HintPolicy,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            breakdown_threshold: 5.0,
            mixed_role_threshold: 50.0,
            guard_threshold: 50.0,
            alignment_min_fraction: 0.10,
            required_markers: DEFAULT_REQUIRED_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            confidence: ConfidenceCalibration::default(),
            hint: HintPolicy::default(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output models
// ────────────────────────────────────────────────────────────────────────────

/// A role whose share clears the breakdown threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleBreakdownEntry {
    pub role: RoleKey,
    pub display_name: String,
    pub percentage: f64,
}

/// Why a candidate role was passed over.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    MisclassificationGuard { percentage: f64 },
    AlignmentFailed { fraction: f64 },
    TemplateMissing { path: PathBuf },
    TemplateUnreadable { message: String },
    InvalidStructure { missing_markers: Vec<String> },
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::MisclassificationGuard { percentage } => {
                write!(f, "guarded role below majority ({percentage:.1}%)")
            }
            ExclusionReason::AlignmentFailed { fraction } => {
                write!(f, "keyword alignment too low ({:.0}%)", fraction * 100.0)
            }
            ExclusionReason::TemplateMissing { path } => {
                write!(f, "template missing: {}", path.display())
            }
            ExclusionReason::TemplateUnreadable { message } => {
                write!(f, "template unreadable: {message}")
            }
            ExclusionReason::InvalidStructure { missing_markers } => {
                write!(f, "template missing markers: {}", missing_markers.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackStep {
    pub role: RoleKey,
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

/// The chosen role and its template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateMatch {
    pub role: RoleKey,
    pub display_name: String,
    pub score: f64,
    pub percentage: f64,
    pub confidence: f64,
    pub template_path: PathBuf,
    pub keyword_matches: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub template: TemplateMatch,
    pub mixed_role: bool,
    /// The selected role differs from the first choice.
    pub fallback_used: bool,
    /// Every candidate failed and the default role was used.
    pub exhausted: bool,
    pub hint_applied: bool,
    pub fallback_steps: Vec<FallbackStep>,
}

/// Even the default role's template is unusable.
#[derive(Debug, Clone, PartialEq)]
pub struct NoUsableTemplate {
    pub role: RoleKey,
    pub reason: ExclusionReason,
    pub fallback_steps: Vec<FallbackStep>,
}

// ────────────────────────────────────────────────────────────────────────────
// Pure helpers
// ────────────────────────────────────────────────────────────────────────────

/// Ordering for candidates: higher share first, then lower priority number,
/// then key name.
fn rank(a: &RoleCategory, b: &RoleCategory, percentages: &PercentageSet) -> Ordering {
    percentages
        .get(b.key)
        .total_cmp(&percentages.get(a.key))
        .then_with(|| a.priority.cmp(&b.priority))
        .then_with(|| a.key.as_str().cmp(b.key.as_str()))
}

/// Index of the best non-excluded category with a positive share.
pub fn best_match(
    catalog: &RoleCatalog,
    percentages: &PercentageSet,
    excluded: &[bool],
) -> Option<usize> {
    catalog
        .categories()
        .iter()
        .enumerate()
        .filter(|(idx, category)| !excluded[*idx] && percentages.get(category.key) > 0.0)
        .min_by(|(_, a), (_, b)| rank(a, b, percentages))
        .map(|(idx, _)| idx)
}

/// Roles at or above `threshold`, highest share first.
pub fn breakdown(
    catalog: &RoleCatalog,
    percentages: &PercentageSet,
    threshold: f64,
) -> Vec<RoleBreakdownEntry> {
    let mut entries: Vec<&RoleCategory> = catalog
        .categories()
        .iter()
        .filter(|c| percentages.has_signal() && percentages.get(c.key) >= threshold)
        .collect();
    entries.sort_by(|a, b| rank(a, b, percentages));

    entries
        .into_iter()
        .map(|c| RoleBreakdownEntry {
            role: c.key,
            display_name: c.display_name.clone(),
            percentage: percentages.get(c.key),
        })
        .collect()
}

/// Fraction of a role's configured phrases that occur in the text.
pub fn alignment_fraction(category: &RoleCategory, matches: &KeywordMatchSet) -> f64 {
    let present = matches
        .for_role(category.key)
        .map(|phrases| phrases.values().filter(|count| **count > 0).count())
        .unwrap_or(0);
    present as f64 / category.keywords.len() as f64
}

/// Gap- and significance-based confidence in [0, 1].
pub fn confidence(
    selected: RoleKey,
    scores: &ScoreSet,
    percentages: &PercentageSet,
    calibration: &ConfidenceCalibration,
) -> f64 {
    let winner = percentages.get(selected);
    let runner_up = percentages
        .iter()
        .filter(|(role, _)| **role != selected)
        .map(|(_, pct)| *pct)
        .fold(0.0_f64, f64::max);

    let gap = (winner - runner_up).max(0.0) / 100.0;
    let share = winner / 100.0;
    let significance = if calibration.significant_score > 0.0 {
        (scores.get(selected) / calibration.significant_score).min(1.0)
    } else {
        1.0
    };

    ((calibration.gap_weight * gap + calibration.share_weight * share) * significance)
        .clamp(0.0, 1.0)
}

// ────────────────────────────────────────────────────────────────────────────
// Selector
// ────────────────────────────────────────────────────────────────────────────

pub struct TemplateSelector<'a> {
    catalog: &'a RoleCatalog,
    store: &'a dyn TemplateStore,
    policy: &'a SelectionPolicy,
}

impl<'a> TemplateSelector<'a> {
    pub fn new(
        catalog: &'a RoleCatalog,
        store: &'a dyn TemplateStore,
        policy: &'a SelectionPolicy,
    ) -> Self {
        Self {
            catalog,
            store,
            policy,
        }
    }

    /// Resolves a category's template and checks its structure.
    pub fn usable_template(&self, category: &RoleCategory) -> Result<PathBuf, ExclusionReason> {
        let path = self
            .store
            .resolve(&category.template)
            .map_err(exclusion_for)?;
        let content = self.store.read(&path).map_err(exclusion_for)?;

        let missing = missing_markers(&content, &self.policy.required_markers);
        if !missing.is_empty() {
            return Err(ExclusionReason::InvalidStructure {
                missing_markers: missing,
            });
        }
        Ok(path)
    }

    /// Template for the catalog's default role, used when there is no keyword signal.
    pub fn default_template(
        &self,
        matches: &KeywordMatchSet,
        scores: &ScoreSet,
        percentages: &PercentageSet,
    ) -> Result<TemplateMatch, NoUsableTemplate> {
        let role = self.catalog.default_role();
        let Some(category) = self.catalog.get(role) else {
            // RoleCatalog::new guarantees the default role exists.
            return Err(NoUsableTemplate {
                role,
                reason: ExclusionReason::TemplateMissing {
                    path: PathBuf::new(),
                },
                fallback_steps: Vec::new(),
            });
        };

        let template_path = self.usable_template(category).map_err(|reason| NoUsableTemplate {
            role,
            reason,
            fallback_steps: Vec::new(),
        })?;
        Ok(self.template_match(category, template_path, 0.0, matches, scores, percentages))
    }

    pub fn select(
        &self,
        matches: &KeywordMatchSet,
        scores: &ScoreSet,
        percentages: &PercentageSet,
        hint: Option<&RoleHint>,
    ) -> Result<Selection, NoUsableTemplate> {
        let categories = self.catalog.categories();
        let mut excluded = vec![false; categories.len()];
        let mut steps: Vec<FallbackStep> = Vec::new();

        let unguarded_winner = best_match(self.catalog, percentages, &excluded);

        // 1. Misclassification guard
        if let Some(guarded) = self.catalog.guarded_role() {
            let pct = percentages.get(guarded);
            if pct < self.policy.guard_threshold {
                if let Some(idx) = self.catalog.index_of(guarded) {
                    excluded[idx] = true;
                    if unguarded_winner == Some(idx) {
                        info!(
                            "Guarded role {guarded} would win with only {pct:.1}%, excluded"
                        );
                        steps.push(FallbackStep {
                            role: guarded,
                            reason: ExclusionReason::MisclassificationGuard { percentage: pct },
                        });
                    }
                }
            }
        }

        // 2. First choice, optionally from the AI hint
        let keyword_winner = best_match(self.catalog, percentages, &excluded);
        let (first_choice, hint_applied) = match keyword_winner {
            Some(winner) => match self.hinted_choice(winner, percentages, &excluded, hint) {
                Some(hinted) => (Some(hinted), true),
                None => (Some(winner), false),
            },
            None => (None, false),
        };

        let mixed_role = keyword_winner
            .map(|idx| percentages.get(categories[idx].key) < self.policy.mixed_role_threshold)
            .unwrap_or(false);
        if mixed_role {
            warn!(
                "Mixed-role job description: top share below {:.0}%",
                self.policy.mixed_role_threshold
            );
        }

        // 3–5. Validate, excluding and re-selecting on failure
        let mut candidate = first_choice;
        for _ in 0..categories.len() {
            let Some(idx) = candidate else {
                break;
            };
            let category = &categories[idx];

            match self.validate_candidate(category, matches) {
                Ok(template_path) => {
                    let conf = confidence(
                        category.key,
                        scores,
                        percentages,
                        &self.policy.confidence,
                    );
                    return Ok(Selection {
                        template: self.template_match(
                            category,
                            template_path,
                            conf,
                            matches,
                            scores,
                            percentages,
                        ),
                        mixed_role,
                        fallback_used: Some(idx) != first_choice,
                        exhausted: false,
                        hint_applied,
                        fallback_steps: steps,
                    });
                }
                Err(reason) => {
                    info!("Excluding {}: {reason}", category.key);
                    excluded[idx] = true;
                    steps.push(FallbackStep {
                        role: category.key,
                        reason,
                    });
                    candidate = best_match(self.catalog, percentages, &excluded);
                }
            }
        }

        // Exhausted: default role, no alignment check
        let default_role = self.catalog.default_role();
        warn!(
            "All {} candidate roles rejected; falling back to default role {default_role}",
            steps.len()
        );
        let Some(category) = self.catalog.get(default_role) else {
            return Err(NoUsableTemplate {
                role: default_role,
                reason: ExclusionReason::TemplateMissing {
                    path: PathBuf::new(),
                },
                fallback_steps: steps,
            });
        };

        match self.usable_template(category) {
            Ok(template_path) => Ok(Selection {
                template: self.template_match(
                    category,
                    template_path,
                    0.0,
                    matches,
                    scores,
                    percentages,
                ),
                mixed_role,
                fallback_used: true,
                exhausted: true,
                hint_applied,
                fallback_steps: steps,
            }),
            Err(reason) => Err(NoUsableTemplate {
                role: default_role,
                reason,
                fallback_steps: steps,
            }),
        }
    }

    /// The hinted role index when the hint is confident, eligible and close enough.
    fn hinted_choice(
        &self,
        winner: usize,
        percentages: &PercentageSet,
        excluded: &[bool],
        hint: Option<&RoleHint>,
    ) -> Option<usize> {
        let hint = hint?;
        if hint.confidence < self.policy.hint.min_confidence {
            debug!("Ignoring low-confidence hint {} ({:.2})", hint.role, hint.confidence);
            return None;
        }

        let idx = self.catalog.index_of(hint.role)?;
        if idx == winner || excluded[idx] {
            return None;
        }

        let hinted_pct = percentages.get(hint.role);
        let winner_pct = percentages.get(self.catalog.categories()[winner].key);
        if hinted_pct <= 0.0 || winner_pct - hinted_pct > self.policy.hint.max_gap {
            return None;
        }

        info!(
            "AI hint {} ({hinted_pct:.1}%) preferred over keyword winner ({winner_pct:.1}%)",
            hint.role
        );
        Some(idx)
    }

    fn validate_candidate(
        &self,
        category: &RoleCategory,
        matches: &KeywordMatchSet,
    ) -> Result<PathBuf, ExclusionReason> {
        let fraction = alignment_fraction(category, matches);
        if fraction < self.policy.alignment_min_fraction {
            return Err(ExclusionReason::AlignmentFailed { fraction });
        }
        self.usable_template(category)
    }

    fn template_match(
        &self,
        category: &RoleCategory,
        template_path: PathBuf,
        confidence: f64,
        matches: &KeywordMatchSet,
        scores: &ScoreSet,
        percentages: &PercentageSet,
    ) -> TemplateMatch {
        TemplateMatch {
            role: category.key,
            display_name: category.display_name.clone(),
            score: scores.get(category.key),
            percentage: percentages.get(category.key),
            confidence,
            template_path,
            keyword_matches: matches.for_role(category.key).cloned().unwrap_or_default(),
        }
    }
}

fn exclusion_for(error: TemplateError) -> ExclusionReason {
    match error {
        TemplateError::Missing(path) => ExclusionReason::TemplateMissing { path },
        other => ExclusionReason::TemplateUnreadable {
            message: other.to_string(),
        },
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
