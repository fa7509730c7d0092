//! Multi-strategy fuzzy string matching
//!
//! Combines aggressive normalization, token-set overlap, and a bounded
//! edit-distance window scan (bitap style) for audiobook title/author
//! matching. Strategy order matters: the first strategy that produces a
//! match wins.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static NON_ALPHANUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]").unwrap());
static BRACKETS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\[\(].*?[\]\)]").unwrap());
static DASH_TAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[-\u{2013}\u{2014}]\s*.*$").unwrap());
static ARTICLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(the|a|an)\b").unwrap());
static PUNCTUATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Which strategy produced a match result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchAlgorithm {
    Exact,
    NormalizedExact,
    TokenSet,
    Bitap,
    EmptyInput,
}

/// Result of a fuzzy match operation
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub score: f64,
    pub matched: bool,
    pub exact: bool,
    pub word_boundary: bool,
    pub algorithm: MatchAlgorithm,
    pub normalized_match: bool,
    pub token_overlap: f64,
}

impl MatchResult {
    fn miss(algorithm: MatchAlgorithm) -> Self {
        Self {
            score: 0.0,
            matched: false,
            exact: false,
            word_boundary: false,
            algorithm,
            normalized_match: false,
            token_overlap: 0.0,
        }
    }
}

/// Fuzzy text matcher with audiobook-oriented normalization
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyMatcher;

impl FuzzyMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Aggressively normalize an author name: lowercase, strip everything
    /// that is not alphanumeric. "Smith, John" and "SmithJohn" both collapse
    /// to "smithjohn".
    pub fn normalize_author(&self, author: &str) -> String {
        NON_ALPHANUMERIC_RE
            .replace_all(&author.to_lowercase(), "")
            .into_owned()
    }

    /// Normalize a title for matching: lowercase, drop bracketed spans and
    /// dash tails, drop articles, punctuation to spaces, collapse whitespace.
    /// Spaces survive so the result can be tokenized.
    pub fn normalize_title(&self, title: &str) -> String {
        let cleaned = title.to_lowercase();
        let cleaned = BRACKETS_RE.replace_all(&cleaned, "");
        let cleaned = DASH_TAIL_RE.replace_all(&cleaned, "");
        let cleaned = ARTICLE_RE.replace_all(&cleaned, "");
        let cleaned = PUNCTUATION_RE.replace_all(&cleaned, " ");
        let cleaned = WHITESPACE_RE.replace_all(&cleaned, " ");
        cleaned.trim().to_string()
    }

    /// Split into a set of non-empty lowercase tokens
    pub fn tokenize(&self, text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split_whitespace()
            .filter(|token| !token.is_empty())
            .map(String::from)
            .collect()
    }

    /// Jaccard similarity of two token sets
    pub fn token_set_overlap(&self, a: &HashSet<String>, b: &HashSet<String>) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let intersection = a.intersection(b).count();
        let union = a.union(b).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }

    /// Match two strings. Strategy order, first hit wins:
    /// exact -> normalized exact -> token-set overlap (>= 0.7) -> bitap scan.
    pub fn fuzzy_match(&self, text1: &str, text2: &str) -> MatchResult {
        if text1.is_empty() || text2.is_empty() {
            return MatchResult::miss(MatchAlgorithm::EmptyInput);
        }

        let clean1 = text1.to_lowercase();
        let clean2 = text2.to_lowercase();
        if clean1.trim() == clean2.trim() {
            return MatchResult {
                score: 1.0,
                matched: true,
                exact: true,
                word_boundary: true,
                algorithm: MatchAlgorithm::Exact,
                normalized_match: false,
                token_overlap: 0.0,
            };
        }

        let norm1 = self.normalize_title(text1);
        let norm2 = self.normalize_title(text2);
        if !norm1.is_empty() && norm1 == norm2 {
            return MatchResult {
                score: 1.0,
                matched: true,
                exact: false,
                word_boundary: true,
                algorithm: MatchAlgorithm::NormalizedExact,
                normalized_match: true,
                token_overlap: 0.0,
            };
        }

        let tokens1 = self.tokenize(&norm1);
        let tokens2 = self.tokenize(&norm2);
        let token_overlap = self.token_set_overlap(&tokens1, &tokens2);
        if !tokens1.is_empty() && !tokens2.is_empty() && token_overlap >= 0.7 {
            return MatchResult {
                score: token_overlap,
                matched: true,
                exact: false,
                word_boundary: true,
                algorithm: MatchAlgorithm::TokenSet,
                normalized_match: false,
                token_overlap,
            };
        }

        let bitap_score = bitap_search(&norm1, &norm2);
        let word_boundary = word_overlap_ratio(&norm1, &norm2) >= 0.5;
        let score = if word_boundary {
            (bitap_score + 0.2).min(1.0)
        } else {
            bitap_score
        };

        MatchResult {
            score,
            matched: score >= 0.6,
            exact: false,
            word_boundary,
            algorithm: MatchAlgorithm::Bitap,
            normalized_match: false,
            token_overlap,
        }
    }
}

/// Sliding-window bounded edit-distance scan. The shorter string is the
/// pattern; each pattern-length window of the longer string is scored by
/// Levenshtein distance and the best window wins.
fn bitap_search(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (pattern, text) = if a.chars().count() > b.chars().count() {
        (b, a)
    } else {
        (a, b)
    };

    if pattern == text {
        return 1.0;
    }
    if text.contains(pattern) {
        return pattern.chars().count() as f64 / text.chars().count() as f64;
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let window = pattern.len();

    let mut best: f64 = 0.0;
    for start in 0..=(text.len() - window) {
        let substring = &text[start..start + window];
        let distance = edit_distance(&pattern, substring);
        let score = 1.0 - distance as f64 / window as f64;
        best = best.max(score);
    }
    best
}

/// Plain Levenshtein distance over char slices
fn edit_distance(s1: &[char], s2: &[char]) -> usize {
    if s1.len() < s2.len() {
        return edit_distance(s2, s1);
    }
    if s2.is_empty() {
        return s1.len();
    }

    let mut previous_row: Vec<usize> = (0..=s2.len()).collect();
    for (i, c1) in s1.iter().enumerate() {
        let mut current_row = vec![i + 1];
        for (j, c2) in s2.iter().enumerate() {
            let insertions = previous_row[j + 1] + 1;
            let deletions = current_row[j] + 1;
            let substitutions = previous_row[j] + usize::from(c1 != c2);
            current_row.push(insertions.min(deletions).min(substitutions));
        }
        previous_row = current_row;
    }
    previous_row[s2.len()]
}

/// Share of words the two strings have in common (union-based)
fn word_overlap_ratio(text1: &str, text2: &str) -> f64 {
    let words1: HashSet<&str> = text1.split_whitespace().collect();
    let words2: HashSet<&str> = text2.split_whitespace().collect();
    let total = words1.union(&words2).count();
    if total == 0 {
        return 0.0;
    }
    words1.intersection(&words2).count() as f64 / total as f64
}
