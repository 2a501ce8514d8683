//! Role Scorer: weighted raw scores and percentage shares per role.
//!
//! raw score = Σ(phrase occurrences) / priority
//! percentage = 100 × score / Σ(scores), or all zeros when nothing matched.
//!
//! Maps are ordered by `RoleKey`, so summation order (and therefore every float)
//! is identical across runs for the same input.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::classification::catalog::{RoleCatalog, RoleKey};
use crate::classification::keywords::KeywordMatchSet;

/// Non-negative raw score per role.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScoreSet(BTreeMap<RoleKey, f64>);

impl ScoreSet {
    pub fn get(&self, role: RoleKey) -> f64 {
        self.0.get(&role).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoleKey, &f64)> {
        self.0.iter()
    }
}

/// Percentage share per role. Sums to 100 when `has_signal`, otherwise all zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentageSet {
    values: BTreeMap<RoleKey, f64>,
    has_signal: bool,
}

impl PercentageSet {
    pub fn get(&self, role: RoleKey) -> f64 {
        self.values.get(&role).copied().unwrap_or(0.0)
    }

    /// False when no keyword matched any role ("no clear match").
    pub fn has_signal(&self) -> bool {
        self.has_signal
    }

    #[cfg(test)]
    pub fn sum(&self) -> f64 {
        self.values.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoleKey, &f64)> {
        self.values.iter()
    }
}

/// Raw score for every catalog role.
pub fn compute_scores(matches: &KeywordMatchSet, catalog: &RoleCatalog) -> ScoreSet {
    ScoreSet(
        catalog
            .categories()
            .iter()
            .map(|category| {
                let occurrences = matches.total_for(category.key) as f64;
                (category.key, occurrences / category.priority as f64)
            })
            .collect(),
    )
}

/// Normalizes raw scores into percentage shares.
pub fn compute_percentages(scores: &ScoreSet) -> PercentageSet {
    let total = scores.total();

    if total <= 0.0 {
        return PercentageSet {
            values: scores.iter().map(|(role, _)| (*role, 0.0)).collect(),
            has_signal: false,
        };
    }

    PercentageSet {
        values: scores
            .iter()
            .map(|(role, score)| (*role, 100.0 * score / total))
            .collect(),
        has_signal: true,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
