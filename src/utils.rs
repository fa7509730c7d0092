use once_cell::sync::Lazy;
use regex::Regex;

/// Format bytes into human readable string
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes == 0 {
        "Unknown".to_string()
    } else if bytes >= TB {
        format!("{:.1} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} B", bytes as f64)
    }
}

static SIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<num>\d+(?:\.\d+)?)\s*(?P<unit>[A-Za-z]+)").unwrap());

/// Parse a size value that is either raw bytes ("123456") or a human string
/// ("850 MB", "1.2 GiB"). Units use binary multipliers.
pub fn parse_size(value: &str) -> u64 {
    let text = value.trim();
    if text.is_empty() {
        return 0;
    }

    if let Ok(bytes) = text.parse::<u64>() {
        return bytes;
    }

    let Some(caps) = SIZE_RE.captures(text) else {
        return 0;
    };

    let number: f64 = caps["num"].parse().unwrap_or(0.0);
    let unit = caps["unit"].to_lowercase();
    let multiplier: u64 = match unit.trim_end_matches('s') {
        "b" | "byte" => 1,
        "kb" | "kib" => 1024,
        "mb" | "mib" => 1024 * 1024,
        "gb" | "gib" => 1024 * 1024 * 1024,
        "tb" | "tib" => 1024u64.pow(4),
        _ => 1,
    };

    (number * multiplier as f64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "Unknown");
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(891289600), "850.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_parse_size_raw_bytes() {
        assert_eq!(parse_size("123456"), 123456);
        assert_eq!(parse_size(""), 0);
        assert_eq!(parse_size("garbage"), 0);
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("1 KB"), 1024);
        assert_eq!(parse_size("1.5 MB"), (1.5 * 1024.0 * 1024.0) as u64);
        assert_eq!(parse_size("850 MB"), 850 * 1024 * 1024);
        assert_eq!(parse_size("2 GiB"), 2 * 1024 * 1024 * 1024);
        // unit casing and plural forms
        assert_eq!(parse_size("3 gbs"), 3 * 1024 * 1024 * 1024);
    }
}
