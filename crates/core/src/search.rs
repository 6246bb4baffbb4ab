//! # Fuzzy Resolver
//!
//! Approximate name matching over the display subset. A query is scored
//! against every name by its best approximate substring alignment:
//! the minimal edit distance between the query and any substring of the
//! name, relative to the query length. 0 is a perfect match and 1 is no
//! match at all.

use crate::catalog::DisplaySubset;
use crate::error::DexError;

/// Default acceptance threshold; scores above it are not-found
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// How far past the threshold a name may score and still be suggested
const SUGGESTION_SLACK: f64 = 0.2;
/// Suggestions offered with a not-found reply
const MAX_SUGGESTIONS: usize = 3;
/// Longer queries are cut to this many folded characters
pub const MAX_PATTERN_LEN: usize = 32;

/// Penalty per character the alignment starts past the beginning of the name
const LOCATION_PENALTY: f64 = 0.01;
/// Penalty scaled by the share of the name the query leaves uncovered
const COVERAGE_PENALTY: f64 = 0.05;

/// A resolved name with its display index and score
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub name: String,
    pub display_index: usize,
    pub score: f64,
}

#[derive(Debug, Clone)]
struct IndexedName {
    name: String,
    folded: Vec<char>,
}

/// Fuzzy index over the display subset
#[derive(Debug, Clone)]
pub struct FuzzyResolver {
    names: Vec<IndexedName>,
    threshold: f64,
}

impl FuzzyResolver {
    /// Index every name of the subset, keeping display order
    pub fn new(subset: &DisplaySubset) -> Self {
        let names = subset
            .names()
            .iter()
            .map(|name| IndexedName {
                name: name.clone(),
                folded: fold(name),
            })
            .collect();

        Self {
            names,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Override the acceptance threshold (clamped to [0, 1])
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Best match for a query, or `None` when nothing clears the threshold
    pub fn resolve(&self, query: &str) -> Option<FuzzyMatch> {
        self.resolve_all(query, 1).into_iter().next()
    }

    /// Ranked matches, best first. Equal scores keep display order.
    pub fn resolve_all(&self, query: &str, limit: usize) -> Vec<FuzzyMatch> {
        self.ranked(query, limit, self.threshold)
    }

    /// Near misses just past the threshold, for "did you mean" hints
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<FuzzyMatch> {
        self.ranked(query, limit, (self.threshold + SUGGESTION_SLACK).min(1.0))
    }

    /// Not-found error for `query`, carrying the best suggestions
    pub fn not_found(&self, query: &str) -> DexError {
        DexError::NotFound {
            query: query.to_string(),
            suggestions: self
                .suggest(query, MAX_SUGGESTIONS)
                .into_iter()
                .map(|m| m.name)
                .collect(),
        }
    }

    fn ranked(&self, query: &str, limit: usize, threshold: f64) -> Vec<FuzzyMatch> {
        let mut pattern = fold(query);
        pattern.truncate(MAX_PATTERN_LEN);
        if pattern.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut matches: Vec<FuzzyMatch> = self
            .names
            .iter()
            .enumerate()
            .filter_map(|(idx, indexed)| {
                let score = score(&pattern, &indexed.folded)?;
                (score <= threshold).then(|| FuzzyMatch {
                    name: indexed.name.clone(),
                    display_index: idx,
                    score,
                })
            })
            .collect();

        // Stable sort keeps display order among ties
        matches.sort_by(|a, b| a.score.total_cmp(&b.score));
        matches.truncate(limit);

        tracing::debug!(query, matches = matches.len(), "Fuzzy resolution");
        matches
    }
}

/// Case-fold and drop everything that is not alphanumeric
fn fold(s: &str) -> Vec<char> {
    s.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Score a folded pattern against a folded name. `None` when either is empty.
fn score(pattern: &[char], text: &[char]) -> Option<f64> {
    if pattern.is_empty() || text.is_empty() {
        return None;
    }
    if pattern == text {
        return Some(0.0);
    }

    let (distance, start) = best_alignment(pattern, text);
    let accuracy = distance as f64 / pattern.len() as f64;
    let location = start as f64 * LOCATION_PENALTY;
    let uncovered = text.len().saturating_sub(pattern.len()) as f64 / text.len() as f64;

    let total = accuracy + location + uncovered * COVERAGE_PENALTY;
    Some(total.clamp(0.0, 1.0))
}

/// Minimal edit distance of `pattern` against any substring of `text`,
/// with the start offset of that substring.
fn best_alignment(pattern: &[char], text: &[char]) -> (usize, usize) {
    // Each cell holds (distance, start of the aligned substring).
    // Row 0 lets an alignment begin anywhere in the text.
    let mut prev: Vec<(usize, usize)> = (0..=text.len()).map(|j| (0, j)).collect();
    let mut curr = vec![(0, 0); text.len() + 1];

    for (i, pc) in pattern.iter().enumerate() {
        curr[0] = (i + 1, 0);
        for (j, tc) in text.iter().enumerate() {
            let cost = usize::from(pc != tc);
            let substitute = (prev[j].0 + cost, prev[j].1);
            let skip_pattern = (prev[j + 1].0 + 1, prev[j + 1].1);
            let skip_text = (curr[j].0 + 1, curr[j].1);

            curr[j + 1] = [substitute, skip_pattern, skip_text]
                .into_iter()
                .min_by_key(|(d, s)| (*d, *s))
                .unwrap_or(substitute);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev.into_iter()
        .skip(1)
        .min_by_key(|(d, s)| (*d, *s))
        .unwrap_or((pattern.len(), 0))
}
