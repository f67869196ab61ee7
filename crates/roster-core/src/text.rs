//! String normalization for names, phones, and scraped text.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid regex"));

/// Professional titles that trail agent names on listing sites.
static NAME_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i),?\s*(?:\bRealtor\b®?|\bBroker\s*Associate\b|\bTeam\b|\bGroup\b)")
        .expect("valid regex")
});

/// Collapses whitespace runs to a single space and trims.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// First and last name split out of a display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonName {
    pub first_name: String,
    pub last_name: String,
}

/// Strips title suffixes and splits into first/last name.
///
/// The last token is the last name; everything before it is the first name.
pub fn split_person_name(raw: &str) -> PersonName {
    let cleaned = normalize_whitespace(raw);
    let stripped = NAME_SUFFIX.replace_all(&cleaned, "");
    let name = normalize_whitespace(&stripped);
    let name = name.trim_matches(|c: char| c == ',' || c.is_whitespace());

    let mut parts: Vec<&str> = name.split(' ').filter(|p| !p.is_empty()).collect();
    match parts.len() {
        0 => PersonName::default(),
        1 => PersonName {
            first_name: parts[0].to_string(),
            last_name: String::new(),
        },
        _ => {
            let last_name = parts.pop().unwrap_or_default().to_string();
            PersonName {
                first_name: parts.join(" "),
                last_name,
            }
        }
    }
}

/// Best-effort US-biased phone normalization.
///
/// - no digits: empty
/// - 10 digits: `+1` prefixed
/// - 11 digits starting with `1`: `+` prefixed
/// - already `+`-prefixed: the trimmed input, untouched
/// - otherwise: the bare digits
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = DIGIT_RUN.find_iter(raw).map(|m| m.as_str()).collect();
    if digits.is_empty() {
        return String::new();
    }
    if digits.len() == 10 {
        return format!("+1{digits}");
    }
    if digits.len() == 11 && digits.starts_with('1') {
        return format!("+{digits}");
    }
    let trimmed = raw.trim();
    if trimmed.starts_with('+') {
        return trimmed.to_string();
    }
    digits
}
