//! First-match pattern scanning and name normalization.

use regex::{Regex, RegexBuilder};

/// Outcome of a successful scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Source of the pattern that matched.
    pub pattern: String,
    /// Capture groups 1..n; empty for boolean-only patterns. An optional
    /// group that did not participate is an empty string.
    pub captures: Vec<String>,
}

/// Lower-case text before matching.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
}

/// Compile a pattern the way the catalog does: case-insensitive, Unicode.
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Return the first pattern, in order, that matches anywhere in `text`.
pub fn find_first(patterns: &[Regex], text: &str) -> Option<MatchResult> {
    patterns.iter().find_map(|re| {
        re.captures(text).map(|caps| MatchResult {
            pattern: re.as_str().to_string(),
            captures: caps
                .iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        })
    })
}

/// Whether any pattern matches.
pub fn is_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

/// Title-case a free-text capture.
///
/// The first letter of every alphabetic run is upper-cased and the rest
/// lower-cased, so `"coca-cola zero"` becomes `"Coca-Cola Zero"`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

/// Trim and title-case a captured product name.
pub fn clean_name(raw: &str) -> String {
    title_case(raw.trim())
}
