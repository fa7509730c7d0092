//! Search-term normalization and variant-query generation
//!
//! Providers index the same book under different title shapes ("The Primal
//! Hunter 12", "Primal Hunter - Book 12", "Primal Hunter: A LitRPG Adventure,
//! Book 12"). Each request derives a small set of title variants that are all
//! probed and deduped afterwards.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{NormalizedQuery, SearchQuery};

static BY_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+by\s+").unwrap());
static SERIES_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?P<series>[^\d]+?)\s*(?:book\s*)?(?P<number>\d+)\b").unwrap());
static SERIES_COMMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?P<series>[^,]+?),\s*(?:book|volume)\s*(?P<number>\d+)\b").unwrap());

/// Split "Title by Author" into its halves; author half empty when absent
pub fn split_title_author(text: &str) -> (String, String) {
    if text.is_empty() {
        return (String::new(), String::new());
    }
    let mut parts = BY_SPLIT_RE.splitn(text, 2);
    let title = parts.next().unwrap_or("").trim().to_string();
    match parts.next() {
        Some(author) => (title, author.trim().to_string()),
        None => (text.trim().to_string(), String::new()),
    }
}

/// Drop everything after the first colon
pub fn strip_subtitle(text: &str) -> String {
    match text.split_once(':') {
        Some((head, _)) => head.trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Clean up raw query/title/author into the terms actually searched.
/// Authors embedded in the title ("... by So-and-so") migrate to the author
/// slot; subtitles are stripped.
pub fn normalize_search_terms(query: &str, title: &str, author: &str) -> (String, String, String) {
    let query = query.trim();
    let mut title = title.trim().to_string();
    let author = author.trim();

    if title.is_empty() && !query.is_empty() {
        title = query.to_string();
    }

    let (title_base, title_author) = split_title_author(&title);
    let (query_base, query_author) = split_title_author(query);

    let normalized_author = if !author.is_empty() {
        author.to_string()
    } else if !title_author.is_empty() {
        title_author
    } else {
        query_author
    };
    let normalized_title = strip_subtitle(&title_base);
    let normalized_query_base = strip_subtitle(&query_base);

    let normalized_query = if !normalized_title.is_empty() && !normalized_author.is_empty() {
        format!("{} {}", normalized_title, normalized_author)
    } else if !normalized_title.is_empty() {
        normalized_title.clone()
    } else if !normalized_query_base.is_empty() {
        normalized_query_base
    } else {
        normalized_author.clone()
    };

    (
        normalized_query.trim().to_string(),
        normalized_title,
        normalized_author,
    )
}

/// Additional "Series N" rewrites of a title, e.g.
/// "Primal Hunter: A LitRPG Adventure, Book 12" -> "Primal Hunter 12"
pub fn build_series_variants(title: &str) -> Vec<String> {
    let mut variants = Vec::new();
    let normalized = title.trim();
    if normalized.is_empty() {
        return variants;
    }

    let head = normalized
        .split_once(':')
        .map(|(head, _)| head.trim())
        .unwrap_or(normalized);

    for candidate in [head, normalized] {
        let captures = SERIES_NUMBER_RE
            .captures(candidate)
            .or_else(|| SERIES_COMMA_RE.captures(candidate));
        let Some(captures) = captures else {
            continue;
        };

        let series = captures["series"].trim_matches([' ', ',', ':', '-']);
        let number = captures["number"].trim();
        if series.is_empty() || number.is_empty() {
            continue;
        }

        let variant = format!("{series} {number}");
        if variant.to_lowercase() != normalized.to_lowercase() && !variants.contains(&variant) {
            variants.push(variant);
        }
    }

    variants
}

impl NormalizedQuery {
    /// Derive the canonical terms and the full variant list for a request.
    /// The canonical title is always the first variant; falls back to the
    /// author alone for author-only searches.
    pub fn from_query(query: &SearchQuery) -> Self {
        let (normalized_query, normalized_title, normalized_author) =
            normalize_search_terms(&query.title, &query.title, &query.author);

        let canonical_title = if normalized_title.is_empty() {
            normalized_query.clone()
        } else {
            normalized_title
        };
        let canonical_author = if normalized_author.is_empty() {
            query.author.trim().to_string()
        } else {
            normalized_author
        };

        let mut variant_titles = Vec::new();
        if !canonical_title.is_empty() {
            variant_titles.push(canonical_title.clone());
        }
        for variant in build_series_variants(&canonical_title) {
            if !variant_titles.contains(&variant) {
                variant_titles.push(variant);
            }
        }
        if variant_titles.is_empty() && !normalized_query.is_empty() {
            variant_titles.push(normalized_query.clone());
        }
        if variant_titles.is_empty() && !canonical_author.is_empty() {
            variant_titles.push(canonical_author.clone());
        }

        Self {
            canonical_title,
            canonical_author,
            variant_titles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchMode;

    #[test]
    fn test_split_title_author() {
        assert_eq!(
            split_title_author("The Hobbit by J.R.R. Tolkien"),
            ("The Hobbit".to_string(), "J.R.R. Tolkien".to_string())
        );
        assert_eq!(
            split_title_author("Standby Mode"),
            ("Standby Mode".to_string(), String::new())
        );
    }

    #[test]
    fn test_strip_subtitle() {
        assert_eq!(
            strip_subtitle("Mark of the Fool: A Progression Fantasy"),
            "Mark of the Fool"
        );
        assert_eq!(strip_subtitle("No Subtitle"), "No Subtitle");
    }

    #[test]
    fn test_normalize_moves_author_out_of_title() {
        let (query, title, author) =
            normalize_search_terms("", "Dungeon Crawler Carl by Matt Dinniman", "");
        assert_eq!(title, "Dungeon Crawler Carl");
        assert_eq!(author, "Matt Dinniman");
        assert_eq!(query, "Dungeon Crawler Carl Matt Dinniman");
    }

    #[test]
    fn test_series_variants() {
        // identical rewrite is suppressed
        assert!(build_series_variants("The Primal Hunter 12").is_empty());

        assert_eq!(
            build_series_variants("Primal Hunter: A LitRPG Adventure, Book 12"),
            vec!["Primal Hunter: A LitRPG Adventure 12".to_string()]
        );
        assert_eq!(
            build_series_variants("Mark of the Fool, Book 8"),
            vec!["Mark of the Fool 8".to_string()]
        );
        assert!(build_series_variants("No Numbers Here").is_empty());
    }

    #[test]
    fn test_variant_list_dedupes_preserving_order() {
        let query = SearchQuery::new(
            "Primal Hunter: A LitRPG Adventure, Book 12",
            "Zogarth",
            SearchMode::Manual,
        );
        let normalized = NormalizedQuery::from_query(&query);
        assert_eq!(normalized.canonical_title, "Primal Hunter");
        assert_eq!(
            normalized.variant_titles,
            vec!["Primal Hunter".to_string()]
        );
        assert_eq!(normalized.canonical_author, "Zogarth");
    }

    #[test]
    fn test_variant_list_with_trailing_number() {
        let query = SearchQuery::new("The Primal Hunter 12", "Zogarth", SearchMode::Manual);
        let normalized = NormalizedQuery::from_query(&query);
        // canonical first, no duplicate rewrite
        assert_eq!(
            normalized.variant_titles,
            vec!["The Primal Hunter 12".to_string()]
        );
    }

    #[test]
    fn test_author_only_search_uses_author_variant() {
        let query = SearchQuery::new("", "Blake Crouch", SearchMode::Manual);
        let normalized = NormalizedQuery::from_query(&query);
        assert_eq!(normalized.variant_titles, vec!["Blake Crouch".to_string()]);
    }
}
