//! Series detection in release titles
//!
//! Titles carry series information in a handful of recurring shapes:
//! "Title: Series Name, Book 3", "Title (Series #3)", "[Series 3]",
//! "Series Name: Title", ", Book 3", and the bare "Series Name 8".

use once_cell::sync::Lazy;
use regex::Regex;

static COMMA_BOOK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[:\s]([^,:]+),\s*(?:Book|#)\s*(\d+)").unwrap());
static BRACKETED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\(\[]([^)\]]+?)\s*[#\s](\d+)[\)\]]").unwrap());
static SERIES_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^:]+):\s*(.+)").unwrap());
static TRAILING_BOOK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i),\s*(?:Book|#)\s*(\d+)").unwrap());
static NAME_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+?)\s+(?:Book\s+)?(\d+)$").unwrap());

/// Words that mark a leading "<name>:" span as a series rather than a title
const SERIES_MARKERS: &[&str] = &["series", "saga", "chronicles", "trilogy"];

/// Bracketed release metadata that must not be mistaken for a series name,
/// e.g. the "[M4B 128]" quality tag
fn is_release_metadata(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    matches!(
        lowered.as_str(),
        "m4b" | "m4a" | "mp3" | "flac" | "aac" | "ogg" | "wav"
    ) || lowered.contains("kbps")
}

/// Series information extracted from a title
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesInfo {
    pub series_name: Option<String>,
    pub book_number: Option<String>,
    /// The exact span the series matched, for stripping it back out
    pub full_series: Option<String>,
}

/// Detect a series name and/or book number in a title
pub fn extract_series_info(title: &str) -> SeriesInfo {
    if title.is_empty() {
        return SeriesInfo::default();
    }

    // "Title: Series Name, Book 3"
    if let Some(captures) = COMMA_BOOK_RE.captures(title) {
        return SeriesInfo {
            series_name: Some(captures[1].trim().to_string()),
            book_number: Some(captures[2].to_string()),
            full_series: Some(
                captures[0]
                    .trim_matches([':', ',', ' '])
                    .to_string(),
            ),
        };
    }

    // "Title (Series Name #3)" or "Title [Series Name 3]"
    if let Some(captures) = BRACKETED_RE.captures(title) {
        if !is_release_metadata(&captures[1]) {
            return SeriesInfo {
                series_name: Some(captures[1].trim().to_string()),
                book_number: Some(captures[2].to_string()),
                full_series: Some(captures[0].to_string()),
            };
        }
    }

    // "Series Name: Title", only when the prefix names itself a series
    if let Some(captures) = SERIES_PREFIX_RE.captures(title) {
        let first_part = captures[1].trim();
        let lowered = first_part.to_lowercase();
        if SERIES_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return SeriesInfo {
                series_name: Some(first_part.to_string()),
                book_number: None,
                full_series: Some(format!("{first_part}:")),
            };
        }
    }

    // "Title, Book 3" with the series name folded into the title
    if let Some(captures) = TRAILING_BOOK_RE.captures(title) {
        return SeriesInfo {
            series_name: None,
            book_number: Some(captures[1].to_string()),
            full_series: Some(captures[0].trim_matches([',', ' ']).to_string()),
        };
    }

    // "Mark of the Fool 8" - a trailing number after at least two words
    if let Some(captures) = NAME_NUMBER_RE.captures(title) {
        let potential_series = captures[1].trim();
        let book_number = &captures[2];
        if potential_series.split_whitespace().count() >= 2 {
            return SeriesInfo {
                series_name: Some(potential_series.to_string()),
                book_number: Some(book_number.to_string()),
                full_series: Some(format!("{potential_series} {book_number}")),
            };
        }
    }

    SeriesInfo::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_comma_book() {
        let info = extract_series_info("Edgedancer: The Stormlight Archive, Book 3");
        assert_eq!(info.series_name.as_deref(), Some("The Stormlight Archive"));
        assert_eq!(info.book_number.as_deref(), Some("3"));
    }

    #[test]
    fn test_parenthesized_series() {
        let info = extract_series_info("Oathbringer (Stormlight Archive #3)");
        assert_eq!(info.series_name.as_deref(), Some("Stormlight Archive"));
        assert_eq!(info.book_number.as_deref(), Some("3"));
        assert_eq!(info.full_series.as_deref(), Some("(Stormlight Archive #3)"));
    }

    #[test]
    fn test_bracketed_series() {
        let info = extract_series_info("Some Title [Wandering Inn 4]");
        assert_eq!(info.series_name.as_deref(), Some("Wandering Inn"));
        assert_eq!(info.book_number.as_deref(), Some("4"));
    }

    #[test]
    fn test_series_prefix_requires_marker() {
        let info = extract_series_info("The Dresden Files Series: Storm Front");
        assert_eq!(
            info.series_name.as_deref(),
            Some("The Dresden Files Series")
        );
        assert_eq!(info.book_number, None);

        // an ordinary "Title: Subtitle" is not a series
        let info = extract_series_info("Project Hail Mary: A Novel");
        assert_eq!(info.series_name, None);
    }

    #[test]
    fn test_trailing_number() {
        let info = extract_series_info("Mark of the Fool 8");
        assert_eq!(info.series_name.as_deref(), Some("Mark of the Fool"));
        assert_eq!(info.book_number.as_deref(), Some("8"));
        assert_eq!(info.full_series.as_deref(), Some("Mark of the Fool 8"));

        let info = extract_series_info("Mark of the Fool Book 8");
        assert_eq!(info.series_name.as_deref(), Some("Mark of the Fool"));
        assert_eq!(info.book_number.as_deref(), Some("8"));
    }

    #[test]
    fn test_quality_tag_is_not_a_series() {
        // "[M4B 128]" is release metadata, not "series M4B, book 128"
        let info = extract_series_info("Mark of the Fool 8 [M4B 128]");
        assert_ne!(info.series_name.as_deref(), Some("M4B"));
        let info = extract_series_info("Some Book [320 kbps 2]");
        assert_ne!(info.series_name.as_deref(), Some("320 kbps"));
    }

    #[test]
    fn test_bare_number_is_not_a_series() {
        // "Book 8" alone has fewer than two series words
        assert_eq!(extract_series_info("Book 8"), SeriesInfo::default());
        assert_eq!(extract_series_info(""), SeriesInfo::default());
        assert_eq!(extract_series_info("Plain Title"), SeriesInfo::default());
    }
}
