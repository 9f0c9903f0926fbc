//! Shared value sanitizer used both when generating JSON-Schema enums and
//! when formatters compare a model-returned value against the external
//! option set.
//!
//! Applying the same sanitizer at both sites means a model's response is
//! always directly comparable to the external option set without a
//! second-pass normalization inside every formatter.

use std::sync::OnceLock;

use regex::Regex;

fn html_json_breaking_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[<>/&?*#@$%^(){}\[\]|\\"']"#).unwrap())
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strips HTML/JSON-breaking characters and collapses whitespace runs into a
/// single space, producing a canonical form for enum/option comparison.
pub fn sanitize(value: &str) -> String {
    let stripped = html_json_breaking_chars().replace_all(value.trim(), "");
    whitespace_run().replace_all(&stripped, " ").trim().to_string()
}

/// Sanitizes a whole list of enum option strings, preserving order.
pub fn sanitize_all<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values.into_iter().map(|v| sanitize(v.as_ref())).collect()
}
