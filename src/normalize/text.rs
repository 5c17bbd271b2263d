//! Text, URL, date, and identity-key cleanup helpers.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use url::Url;

use crate::record::Source;

fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));

/// `\command` or `\command{` openers left over from LaTeX abstracts.
static LATEX_COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"\\[A-Za-z]+\*?\s*"));

static INLINE_MATH_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\$[^$]*\$"));

/// Collapses whitespace, replaces inline math with `[MATH]`, and strips LaTeX commands.
#[must_use]
pub fn clean_text(raw: &str) -> String {
    let text = INLINE_MATH_RE.replace_all(raw, "[MATH]");
    let text = LATEX_COMMAND_RE.replace_all(&text, " ");
    WHITESPACE_RE.replace_all(text.trim(), " ").trim().to_string()
}

/// Trims the URL and adds an `https://` scheme when none is present.
///
/// Returns `None` when the result does not parse as an http(s) URL with a host.
#[must_use]
pub fn clean_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = Url::parse(&candidate).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(candidate)
}

/// Parses the timestamp shapes the fetchers emit.
///
/// Accepts RFC 3339 (`2024-01-01T12:00:00Z`), `YYYY-MM-DD HH:MM:SS`, and
/// `YYYY-MM-DD`. Naive values are interpreted as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Normalizes a title for duplicate matching.
///
/// Punctuation is removed, the text is lower-cased, and whitespace runs are
/// collapsed to a single space.
#[must_use]
pub fn normalize_title_key(title: &str) -> String {
    let stripped: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    stripped
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derives the identity key for a record.
///
/// A stable external identifier wins over the title and is prefixed with the
/// source so a DOI and a repository name can never collide.
#[must_use]
pub fn identity_key(source: Source, title: &str, external_id: Option<&str>) -> String {
    if let Some(id) = external_id.map(str::trim).filter(|id| !id.is_empty()) {
        return format!("{}:{}", source.as_str(), id.to_lowercase());
    }
    normalize_title_key(title)
}

/// Normalizes a DOI to its bare `10.x/...` form.
#[must_use]
pub fn normalize_doi(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let bare = ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"]
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix).map(|_| &trimmed[prefix.len()..]))
        .unwrap_or(trimmed)
        .trim();
    if bare.starts_with("10.") && bare.contains('/') {
        Some(bare.to_string())
    } else {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(
            clean_text("  Code Generation with  AI  \n\n test "),
            "Code Generation with AI test"
        );
    }

    #[test]
    fn test_clean_text_replaces_math_and_latex() {
        let cleaned = clean_text(r"We bound $O(n^2)$ with \emph{care}");
        assert_eq!(cleaned, "We bound [MATH] with {care}");
    }

    #[test]
    fn test_clean_url_adds_scheme() {
        assert_eq!(
            clean_url("github.com/test/repo").as_deref(),
            Some("https://github.com/test/repo")
        );
    }

    #[test]
    fn test_clean_url_rejects_blank_and_unsupported() {
        assert!(clean_url("   ").is_none());
        assert!(clean_url("ftp://example.com/file").is_none());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let rfc = parse_timestamp("2024-01-01T12:00:00Z").unwrap();
        assert_eq!(rfc.hour(), 12);
        let spaced = parse_timestamp("2024-02-03 04:05:06").unwrap();
        assert_eq!(spaced.day(), 3);
        let date_only = parse_timestamp("2024-03-09").unwrap();
        assert_eq!(date_only.month(), 3);
        assert!(parse_timestamp("last tuesday").is_none());
    }

    #[test]
    fn test_normalize_title_key_ignores_case_punctuation_whitespace() {
        assert_eq!(
            normalize_title_key("  Attention: Is ALL   you need?! "),
            "attention is all you need"
        );
        assert_eq!(
            normalize_title_key("attention is all you need"),
            normalize_title_key("Attention Is All\tYou Need")
        );
    }

    #[test]
    fn test_identity_key_prefers_external_id_with_source_prefix() {
        assert_eq!(
            identity_key(Source::Repository, "Some Title", Some("Owner/Repo")),
            "repository:owner/repo"
        );
        assert_eq!(
            identity_key(Source::Paper, "Some Title", Some("  ")),
            "some title"
        );
    }

    #[test]
    fn test_normalize_doi_strips_resolver_prefixes() {
        assert_eq!(
            normalize_doi("https://doi.org/10.1234/ABC").as_deref(),
            Some("10.1234/ABC")
        );
        assert_eq!(normalize_doi("doi:10.5/x").as_deref(), Some("10.5/x"));
        assert!(normalize_doi("not-a-doi").is_none());
    }
}
