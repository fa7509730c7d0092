//! Quality scoring for search results
//!
//! Relevance dominates by design: the goal is finding the RIGHT book, with
//! container format and metadata completeness as minor tiebreakers. The
//! confidence percentage layers penalties and bonuses from the raw signals
//! on top of the weighted total, so a zero-weighted axis (seeders, bitrate)
//! can still sink a result's confidence.

use std::cmp::Ordering;

use serde::Serialize;

use crate::models::{AudioFormat, SearchResult};

use super::fuzzy::FuzzyMatcher;
use super::series::{extract_series_info, SeriesInfo};

const WEIGHT_RELEVANCE: f64 = 0.95;
const WEIGHT_FORMAT: f64 = 0.03;
const WEIGHT_BITRATE: f64 = 0.0;
const WEIGHT_SOURCE: f64 = 0.0;
const WEIGHT_METADATA: f64 = 0.02;
const WEIGHT_AVAILABILITY: f64 = 0.0;

const MIN_BITRATE: f64 = 64.0;
const PREFERRED_BITRATE: f64 = 128.0;
const MAX_USEFUL_BITRATE: f64 = 320.0;

/// How one relevance axis matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Match,
    NoMatch,
    NotProvided,
    NotApplicable,
}

/// Book-number alignment between search and result titles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookNumberStatus {
    Match,
    Mismatch,
    ResultMissing,
    SearchMissing,
    NotApplicable,
}

/// Score and status for one relevance axis
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AxisScore {
    pub score: f64,
    pub status: MatchStatus,
}

impl AxisScore {
    fn new(score: f64, status: MatchStatus) -> Self {
        Self { score, status }
    }
}

/// How the relevance score was assembled
#[derive(Debug, Clone, Serialize)]
pub struct RelevanceBreakdown {
    pub book_number_status: BookNumberStatus,
    pub author: AxisScore,
    pub title: AxisScore,
    pub series: AxisScore,
    pub search_numbers: Vec<String>,
    pub result_numbers: Vec<String>,
}

impl Default for RelevanceBreakdown {
    fn default() -> Self {
        Self {
            book_number_status: BookNumberStatus::NotApplicable,
            author: AxisScore::new(0.0, MatchStatus::NotApplicable),
            title: AxisScore::new(0.0, MatchStatus::NotApplicable),
            series: AxisScore::new(0.0, MatchStatus::NotApplicable),
            search_numbers: Vec::new(),
            result_numbers: Vec::new(),
        }
    }
}

/// Complete quality assessment for one result
#[derive(Debug, Clone, Serialize)]
pub struct QualityScore {
    pub relevance_score: f64,
    pub format_score: f64,
    pub bitrate_score: f64,
    pub source_score: f64,
    pub metadata_score: f64,
    pub availability_score: f64,
    pub total_score: f64,
    /// 0-100 percentage
    pub confidence: f64,
    pub breakdown: RelevanceBreakdown,
}

/// A result with its quality assessment attached
#[derive(Debug, Clone)]
pub struct ScoredResult {
    pub result: SearchResult,
    pub assessment: QualityScore,
}

/// Assesses search results against the original query
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityAssessor {
    fuzzy: FuzzyMatcher,
}

impl QualityAssessor {
    pub fn new() -> Self {
        Self {
            fuzzy: FuzzyMatcher::new(),
        }
    }

    /// Score one result against the search terms
    pub fn assess(
        &self,
        result: &SearchResult,
        search_title: &str,
        search_author: &str,
    ) -> QualityScore {
        let result_author = result.author.as_deref().unwrap_or("");

        let (relevance_score, breakdown) =
            self.assess_relevance(&result.title, result_author, search_title, search_author);
        let format_score = format_score(result.format);
        let bitrate_score = bitrate_score(result.bitrate_kbps);
        let source_score = 7.0;
        let metadata_score = metadata_score(result);
        let mut availability_score = availability_score(result.seeders);

        // AudiobookBay publishes no swarm stats and always reports one
        // seeder; treat those results as healthy instead of penalized.
        if result.indexer_name.to_lowercase().contains("audiobookbay") && result.seeders <= 1 {
            availability_score = 8.0;
        }

        let total_score = relevance_score * WEIGHT_RELEVANCE
            + format_score * WEIGHT_FORMAT
            + bitrate_score * WEIGHT_BITRATE
            + source_score * WEIGHT_SOURCE
            + metadata_score * WEIGHT_METADATA
            + availability_score * WEIGHT_AVAILABILITY;

        let confidence = confidence(
            total_score,
            format_score,
            bitrate_score,
            metadata_score,
            availability_score,
            &breakdown,
        );

        QualityScore {
            relevance_score,
            format_score,
            bitrate_score,
            source_score,
            metadata_score,
            availability_score,
            total_score,
            confidence,
            breakdown,
        }
    }

    /// Attach assessments and sort best-first. Results tagged with the
    /// variant query that found them are scored against that variant.
    pub fn rank_results_by_quality(
        &self,
        results: Vec<SearchResult>,
        search_title: &str,
        search_author: &str,
    ) -> Vec<ScoredResult> {
        let mut scored: Vec<ScoredResult> = results
            .into_iter()
            .map(|result| {
                let query_title = result
                    .search_query_used
                    .clone()
                    .unwrap_or_else(|| search_title.to_string());
                let assessment = self.assess(&result, &query_title, search_author);
                tracing::debug!(
                    title = %result.title,
                    total = assessment.total_score,
                    confidence = assessment.confidence,
                    "Scored result"
                );
                ScoredResult { result, assessment }
            })
            .collect();

        // stable sort: insertion order breaks ties
        scored.sort_by(|a, b| {
            b.assessment
                .total_score
                .partial_cmp(&a.assessment.total_score)
                .unwrap_or(Ordering::Equal)
        });
        scored
    }

    /// Relevance 0-10: author (0-6) + title (0-2.5, with book-number
    /// alignment) + series (0-1.5)
    fn assess_relevance(
        &self,
        result_title: &str,
        result_author: &str,
        search_title: &str,
        search_author: &str,
    ) -> (f64, RelevanceBreakdown) {
        let mut breakdown = RelevanceBreakdown::default();

        if search_title.is_empty() && search_author.is_empty() {
            return (5.0, breakdown);
        }

        let author_score = self.author_score(result_author, search_author);
        breakdown.author = AxisScore::new(
            author_score,
            if search_author.is_empty() {
                MatchStatus::NotProvided
            } else if author_score > 0.0 {
                MatchStatus::Match
            } else {
                MatchStatus::NoMatch
            },
        );

        let search_series = extract_series_info(search_title);
        let result_series = extract_series_info(result_title);

        let title_score = self.title_score(
            result_title,
            search_title,
            &result_series,
            &search_series,
            &mut breakdown,
        );
        breakdown.title = AxisScore::new(
            title_score,
            if search_title.is_empty() {
                MatchStatus::NotProvided
            } else if title_score > 0.0 {
                MatchStatus::Match
            } else {
                MatchStatus::NoMatch
            },
        );

        let series_score = self.series_score(&result_series, &search_series, search_title);
        breakdown.series = AxisScore::new(
            series_score,
            if result_series.series_name.is_none() || search_series.series_name.is_none() {
                MatchStatus::NotApplicable
            } else if series_score > 0.0 {
                MatchStatus::Match
            } else {
                MatchStatus::NoMatch
            },
        );

        let score = (author_score + title_score + series_score).min(10.0);
        (score, breakdown)
    }

    fn author_score(&self, result_author: &str, search_author: &str) -> f64 {
        if search_author.is_empty() {
            // author not searched: neutral half credit
            return 3.0;
        }
        if result_author.is_empty() {
            return 0.0;
        }

        let search_norm = self.fuzzy.normalize_author(search_author);
        let result_norm = self.fuzzy.normalize_author(result_author);
        if !search_norm.is_empty()
            && !result_norm.is_empty()
            && (result_norm.contains(&search_norm) || search_norm.contains(&result_norm))
        {
            return 6.0;
        }

        let search_tokens = self.fuzzy.tokenize(&self.fuzzy.normalize_title(search_author));
        let result_tokens = self.fuzzy.tokenize(&self.fuzzy.normalize_title(result_author));

        if !search_tokens.is_empty() && !result_tokens.is_empty() {
            let common = search_tokens.intersection(&result_tokens).count();
            if common > 0 {
                let overlap = common as f64 / search_tokens.len().max(result_tokens.len()) as f64;
                if overlap >= 0.5 {
                    return 6.0 * overlap;
                }
            }
        }

        let fuzzy = self.fuzzy.fuzzy_match(result_author, search_author);
        if fuzzy.score >= 0.7 {
            return 6.0 * fuzzy.score;
        }
        0.0
    }

    fn title_score(
        &self,
        result_title: &str,
        search_title: &str,
        result_series: &SeriesInfo,
        search_series: &SeriesInfo,
        breakdown: &mut RelevanceBreakdown,
    ) -> f64 {
        if search_title.is_empty() {
            // title not searched: neutral half credit
            return 1.25;
        }
        if result_title.is_empty() {
            return 0.0;
        }

        let search_norm = self.fuzzy.normalize_title(search_title);
        let result_norm = self.fuzzy.normalize_title(result_title);
        let search_core = strip_series_span(&search_norm, search_series);
        let result_core = strip_series_span(&result_norm, result_series);

        let search_tokens = self.fuzzy.tokenize(&search_core);
        let result_tokens = self.fuzzy.tokenize(&result_core);

        let mut score = if !search_tokens.is_empty() && !result_tokens.is_empty() {
            if search_tokens.is_subset(&result_tokens) {
                2.5
            } else {
                let overlap = self.fuzzy.token_set_overlap(&search_tokens, &result_tokens);
                if overlap >= 0.7 {
                    2.5 * overlap
                } else if search_core.contains(&result_core)
                    || result_core.contains(&search_core)
                    || search_norm.contains(&result_norm)
                    || result_norm.contains(&search_norm)
                {
                    2.5
                } else {
                    let fuzzy = self.fuzzy.fuzzy_match(&result_core, &search_core);
                    if fuzzy.score >= 0.7 {
                        2.5 * fuzzy.score
                    } else {
                        0.0
                    }
                }
            }
        } else if search_core.contains(&result_core) || result_core.contains(&search_core) {
            2.5
        } else {
            let fuzzy = self.fuzzy.fuzzy_match(&result_core, &search_core);
            if fuzzy.score >= 0.7 {
                2.5 * fuzzy.score
            } else {
                0.0
            }
        };

        // Book-number alignment over the RAW titles: asking for book 8 and
        // getting book 7 is a hard miss no matter how similar the words are.
        let search_numbers = extract_numbers(search_title);
        let result_numbers = extract_numbers(result_title);
        breakdown.search_numbers = search_numbers.clone();
        breakdown.result_numbers = result_numbers.clone();

        if !search_numbers.is_empty() {
            if !result_numbers.is_empty() {
                if search_numbers.iter().any(|n| result_numbers.contains(n)) {
                    score = (score + 0.75).min(2.5);
                    breakdown.book_number_status = BookNumberStatus::Match;
                } else {
                    score = 0.0;
                    breakdown.book_number_status = BookNumberStatus::Mismatch;
                }
            } else {
                score *= 0.2;
                breakdown.book_number_status = BookNumberStatus::ResultMissing;
            }
        } else if !result_numbers.is_empty() {
            breakdown.book_number_status = BookNumberStatus::SearchMissing;
        }

        score
    }

    fn series_score(
        &self,
        result_series: &SeriesInfo,
        search_series: &SeriesInfo,
        search_title: &str,
    ) -> f64 {
        match (&result_series.series_name, &search_series.series_name) {
            (Some(result_name), Some(search_name)) => {
                let matched = self.fuzzy.fuzzy_match(result_name, search_name);
                let mut score: f64 = if matched.exact || matched.score >= 0.8 {
                    1.5
                } else if matched.score >= 0.7 {
                    1.2
                } else if matched.score >= 0.6 {
                    0.9
                } else if matched.score >= 0.5 {
                    0.6
                } else {
                    0.0
                };

                if let (Some(result_number), Some(search_number)) =
                    (&result_series.book_number, &search_series.book_number)
                {
                    if result_number == search_number {
                        score = (score + 0.3).min(1.5);
                    }
                }
                score
            }
            (None, Some(_)) => 0.0,
            (Some(result_name), None)
                if !search_title.is_empty()
                    && search_title
                        .to_lowercase()
                        .contains(&result_name.to_lowercase()) =>
            {
                1.0
            }
            _ => 0.75,
        }
    }
}

/// Remove the detected series span from a normalized title
fn strip_series_span(normalized_title: &str, series: &SeriesInfo) -> String {
    match &series.full_series {
        Some(span) => normalized_title
            .replace(&span.to_lowercase(), "")
            .trim_matches([' ', ',', ':', ';', '-'])
            .to_string(),
        None => normalized_title.to_string(),
    }
}

/// All standalone integer tokens in a string
fn extract_numbers(text: &str) -> Vec<String> {
    use once_cell::sync::Lazy;
    use regex::Regex;
    static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\b").unwrap());
    NUMBER_RE
        .captures_iter(text)
        .map(|captures| captures[1].to_string())
        .collect()
}

fn format_score(format: AudioFormat) -> f64 {
    match format {
        AudioFormat::M4b => 10.0,
        AudioFormat::M4a => 8.0,
        AudioFormat::Flac => 7.0,
        AudioFormat::Mp3 => 6.0,
        AudioFormat::Aac => 5.0,
        AudioFormat::Ogg => 4.0,
        AudioFormat::Unknown => 1.0,
    }
}

fn bitrate_score(bitrate_kbps: u32) -> f64 {
    let bitrate = bitrate_kbps as f64;
    if bitrate <= 0.0 {
        0.0
    } else if bitrate < MIN_BITRATE {
        1.0
    } else if bitrate >= MAX_USEFUL_BITRATE {
        10.0
    } else if bitrate >= PREFERRED_BITRATE {
        8.0 + 2.0 * (bitrate - PREFERRED_BITRATE) / (MAX_USEFUL_BITRATE - PREFERRED_BITRATE)
    } else {
        3.0 + 5.0 * (bitrate - MIN_BITRATE) / (PREFERRED_BITRATE - MIN_BITRATE)
    }
}

fn metadata_score(result: &SearchResult) -> f64 {
    let mut score: f64 = 0.0;
    if !result.title.is_empty() {
        score += 4.0;
    }
    if result.author.as_deref().is_some_and(|author| !author.is_empty()) {
        score += 4.0;
    }
    if result.size_bytes > 0 {
        score += 2.0;
    }
    score.min(10.0)
}

fn availability_score(seeders: i64) -> f64 {
    if seeders <= 0 {
        0.0
    } else if seeders >= 50 {
        10.0
    } else if seeders >= 10 {
        8.0
    } else if seeders >= 5 {
        6.0
    } else if seeders >= 2 {
        4.0
    } else {
        2.0
    }
}

fn confidence(
    total_score: f64,
    format_score: f64,
    bitrate_score: f64,
    metadata_score: f64,
    availability_score: f64,
    breakdown: &RelevanceBreakdown,
) -> f64 {
    let base = (total_score * 10.0).min(100.0);

    let mut penalties = 0.0;
    if format_score < 5.0 {
        penalties += 15.0;
    } else if format_score < 7.0 {
        penalties += 5.0;
    }

    if bitrate_score == 0.0 {
        penalties += 10.0;
    } else if bitrate_score < 3.0 {
        penalties += 10.0;
    } else if bitrate_score < 6.0 {
        penalties += 5.0;
    }

    if metadata_score < 8.0 {
        penalties += 5.0;
    }
    if metadata_score < 5.0 {
        penalties += 10.0;
    }

    if availability_score == 0.0 {
        penalties += 20.0;
    } else if availability_score < 4.0 {
        penalties += 10.0;
    } else if availability_score < 6.0 {
        penalties += 5.0;
    }

    let mut bonuses = 0.0;
    if format_score >= 9.0 {
        bonuses += 5.0;
    }
    if bitrate_score >= 9.0 {
        bonuses += 3.0;
    }
    if metadata_score >= 9.0 {
        bonuses += 2.0;
    }
    if availability_score >= 9.0 {
        bonuses += 5.0;
    }

    match breakdown.book_number_status {
        BookNumberStatus::Mismatch => penalties += 45.0,
        BookNumberStatus::ResultMissing => penalties += 20.0,
        BookNumberStatus::Match => bonuses += 5.0,
        _ => {}
    }

    match breakdown.title.status {
        MatchStatus::NoMatch => penalties += 35.0,
        MatchStatus::Match if breakdown.title.score >= 2.0 => bonuses += 5.0,
        _ => {}
    }

    match breakdown.series.status {
        MatchStatus::NoMatch => penalties += 15.0,
        MatchStatus::Match if breakdown.series.score >= 1.2 => bonuses += 5.0,
        _ => {}
    }

    (base - penalties + bonuses).clamp(0.0, 100.0)
}
