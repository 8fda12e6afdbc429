//! Text helpers registered on every compiled template.
//!
//! Markup-producing helpers escape their input first and return HTML, so templates
//! call them with triple braces: `{{{boldFirstLine tertiaryEducation}}}`.

use handlebars::{handlebars_helper, html_escape, Handlebars};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::normalize::fields::{is_empty_value, split_items, split_on};

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{4}").expect("year pattern is valid"));

pub const EXISTS: &str = "exists";
pub const NL2BR: &str = "nl2br";
pub const BOLD_FIRST_LINE: &str = "boldFirstLine";
pub const SPLIT_LIST: &str = "splitList";
pub const SPLIT_COMMA: &str = "splitComma";
pub const EQ: &str = "eq";

handlebars_helper!(exists_helper: |value: Json| value_exists(value));
handlebars_helper!(nl2br_helper: |value: Json| lines_to_items(&as_text(value)));
handlebars_helper!(bold_first_line_helper: |value: Json| bold_first_line(&as_text(value)));
handlebars_helper!(split_list_helper: |value: Json| split_items(&as_text(value)));
handlebars_helper!(split_comma_helper: |value: Json| split_on(&as_text(value), ','));
handlebars_helper!(eq_helper: |left: Json, right: Json| left == right);

/// Registers every CV helper on `registry`, replacing built-ins of the same name.
pub fn register_helpers(registry: &mut Handlebars<'_>) {
    registry.register_helper(EXISTS, Box::new(exists_helper));
    registry.register_helper(NL2BR, Box::new(nl2br_helper));
    registry.register_helper(BOLD_FIRST_LINE, Box::new(bold_first_line_helper));
    registry.register_helper(SPLIT_LIST, Box::new(split_list_helper));
    registry.register_helper(SPLIT_COMMA, Box::new(split_comma_helper));
    registry.register_helper(EQ, Box::new(eq_helper));
}

/// Render-time emptiness check. Only strings can exist.
pub fn value_exists(value: &Value) -> bool {
    match value {
        Value::String(s) => !is_empty_value(s),
        _ => false,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn non_blank_lines(escaped: &str) -> impl Iterator<Item = &str> {
    escaped.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// One `<div>` per non-blank line. The first line (a reference's name) is tagged
/// `line-first`, contact details after it `line-rest`.
pub fn lines_to_items(text: &str) -> String {
    let escaped = html_escape(text);
    non_blank_lines(&escaped)
        .enumerate()
        .map(|(i, line)| {
            let class = if i == 0 { "line-first" } else { "line-rest" };
            format!(r#"<div class="line {class}">{line}</div>"#)
        })
        .collect()
}

/// Title / subtitle / date / description structure from a free-text block.
///
/// Line 1 is the title, line 2 the subtitle. Later lines holding a four-digit run
/// are dates, everything else is description.
pub fn bold_first_line(text: &str) -> String {
    let escaped = html_escape(text);
    non_blank_lines(&escaped)
        .enumerate()
        .map(|(i, line)| {
            let class = match i {
                0 => "entry-title",
                1 => "entry-subtitle",
                _ if YEAR.is_match(line) => "entry-date",
                _ => "entry-description",
            };
            format!(r#"<div class="{class}">{line}</div>"#)
        })
        .collect()
}
