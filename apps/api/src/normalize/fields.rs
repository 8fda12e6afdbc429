//! Per-value rules shared by the normalizer and the template helpers.

use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix applied to local phone numbers.
pub const DEFAULT_COUNTRY_CODE: &str = "+27";

/// An unfilled template marker such as `@name` or `@job_title`.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@[A-Za-z_]+$").expect("placeholder pattern is valid"));

/// True when the value carries no content: blank, `@`, `none` in any case, or a
/// leftover `@identifier` placeholder. Whitespace around the value is ignored.
pub fn is_empty_value(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed == "@"
        || trimmed.eq_ignore_ascii_case("none")
        || PLACEHOLDER.is_match(trimmed)
}

/// Single-line field: trimmed, inner whitespace runs collapsed to one space.
/// Returns `None` for empty values.
pub fn clean_single_line(value: Option<&str>) -> Option<String> {
    let value = value?;
    if is_empty_value(value) {
        return None;
    }
    Some(value.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Multi-line field: line breaks kept, only the outer whitespace trimmed.
/// Returns `None` for empty values.
pub fn clean_multi_line(value: Option<&str>) -> Option<String> {
    let value = value?;
    if is_empty_value(value) {
        return None;
    }
    Some(value.replace("\r\n", "\n").trim().to_string())
}

/// Best-effort international form. Not a validator: `0` alone still becomes the
/// bare country code.
pub fn normalize_phone(phone: &str) -> String {
    if phone.starts_with('+') {
        phone.to_string()
    } else if let Some(local) = phone.strip_prefix('0') {
        format!("{DEFAULT_COUNTRY_CODE}{local}")
    } else {
        format!("{DEFAULT_COUNTRY_CODE}{phone}")
    }
}

/// Splits on commas, or on `&` when the text has no comma. Items are trimmed and
/// blanks dropped.
pub fn split_items(value: &str) -> Vec<String> {
    let delimiter = if value.contains(',') { ',' } else { '&' };
    split_on(value, delimiter)
}

/// Splits on `delimiter` only, trimming items and dropping blanks.
pub fn split_on(value: &str, delimiter: char) -> Vec<String> {
    value
        .split(delimiter)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// One item per line. Text that already has line breaks is taken as itemized.
pub fn one_item_per_line(value: &str) -> String {
    if value.contains('\n') {
        return value.to_string();
    }
    split_items(value).join("\n")
}
