//! Keyword Extractor: counts catalog phrases in a job description.
//!
//! One Aho-Corasick automaton holds every distinct phrase in the catalog. Raw hits
//! are filtered to word boundaries, and a hit fully covered by a longer phrase hit
//! is dropped, so "full stack" counts once and never as "full" + "stack".

use std::collections::{BTreeMap, HashMap};

use aho_corasick::{AhoCorasick, MatchKind};
use serde::Serialize;

use crate::classification::catalog::{CatalogError, RoleCatalog, RoleKey};

/// Lowercases and collapses every whitespace run to a single space.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Per-role phrase occurrence counts for one request.
///
/// Every catalog role is present; a role with no hits maps to an empty map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KeywordMatchSet(BTreeMap<RoleKey, BTreeMap<String, u32>>);

impl KeywordMatchSet {
    /// Empty match maps for every role in the catalog.
    pub fn empty(catalog: &RoleCatalog) -> Self {
        Self(
            catalog
                .categories()
                .iter()
                .map(|c| (c.key, BTreeMap::new()))
                .collect(),
        )
    }

    pub fn for_role(&self, role: RoleKey) -> Option<&BTreeMap<String, u32>> {
        self.0.get(&role)
    }

    /// Sum of occurrence counts for a role.
    pub fn total_for(&self, role: RoleKey) -> u32 {
        self.0
            .get(&role)
            .map(|phrases| phrases.values().sum())
            .unwrap_or(0)
    }

    /// True when no phrase of any role matched.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&RoleKey, &BTreeMap<String, u32>)> {
        self.0.iter()
    }
}

/// A boundary-valid occurrence of one phrase.
#[derive(Debug, Clone, Copy)]
struct Hit {
    pattern: usize,
    start: usize,
    end: usize,
}

/// Compiled matcher for a catalog. Built once and reused across requests.
pub struct KeywordExtractor {
    matcher: AhoCorasick,
    phrases: Vec<String>,
    /// Roles that list each phrase, indexed like `phrases`.
    owners: Vec<Vec<RoleKey>>,
    empty: KeywordMatchSet,
}

impl std::fmt::Debug for KeywordExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordExtractor")
            .field("phrases", &self.phrases.len())
            .finish()
    }
}

impl KeywordExtractor {
    pub fn new(catalog: &RoleCatalog) -> Result<Self, CatalogError> {
        let mut phrases: Vec<String> = Vec::new();
        let mut owners: Vec<Vec<RoleKey>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for category in catalog.categories() {
            for phrase in &category.keywords {
                let id = *index.entry(phrase.clone()).or_insert_with(|| {
                    phrases.push(phrase.clone());
                    owners.push(Vec::new());
                    phrases.len() - 1
                });
                if !owners[id].contains(&category.key) {
                    owners[id].push(category.key);
                }
            }
        }

        // Overlapping search is only defined for the standard match kind.
        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&phrases)
            .map_err(|e| CatalogError::Matcher(e.to_string()))?;

        Ok(Self {
            matcher,
            phrases,
            owners,
            empty: KeywordMatchSet::empty(catalog),
        })
    }

    /// Counts phrase occurrences in `text`, normalizing it first.
    pub fn extract(&self, text: &str) -> KeywordMatchSet {
        let normalized = normalize_text(text);
        let mut result = self.empty.clone();
        if normalized.is_empty() {
            return result;
        }

        let hits: Vec<Hit> = self
            .matcher
            .find_overlapping_iter(&normalized)
            .map(|m| Hit {
                pattern: m.pattern().as_usize(),
                start: m.start(),
                end: m.end(),
            })
            .filter(|hit| on_word_boundary(&normalized, hit.start, hit.end))
            .collect();

        let mut counts: BTreeMap<usize, u32> = BTreeMap::new();
        for hit in hits.iter().filter(|hit| !is_covered(hit, &hits)) {
            *counts.entry(hit.pattern).or_insert(0) += 1;
        }

        for (pattern, count) in counts {
            for role in &self.owners[pattern] {
                if let Some(phrases) = result.0.get_mut(role) {
                    phrases.insert(self.phrases[pattern].clone(), count);
                }
            }
        }

        result
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Word-boundary test applied only at phrase edges that are word characters,
/// so phrases like "c++" or ".net" still match next to letters.
fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let matched = &text[start..end];

    let leading_word = matched.chars().next().is_some_and(is_word_char);
    let trailing_word = matched.chars().next_back().is_some_and(is_word_char);

    let before_ok = !leading_word || !text[..start].chars().next_back().is_some_and(is_word_char);
    let after_ok = !trailing_word || !text[end..].chars().next().is_some_and(is_word_char);

    before_ok && after_ok
}

/// True when another hit spans strictly more text and fully contains `hit`.
fn is_covered(hit: &Hit, all: &[Hit]) -> bool {
    all.iter().any(|other| {
        other.start <= hit.start
            && other.end >= hit.end
            && (other.end - other.start) > (hit.end - hit.start)
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
