//! AI output parsing.
//!
//! Turns the provider's raw text into the six-section structure or fails
//! with a [`ParseError`] that keeps the raw text. Nothing is repaired
//! beyond stripping one surrounding Markdown code fence.
//!
//! Value rules per section:
//! - missing or `null`: empty string, reported in `sections_missing`
//! - string: trimmed
//! - number or bool: its JSON text
//! - array: elements joined with `\n`; `null` elements are skipped and
//!   object or array elements are rejected
//! - object: rejected

use serde_json::{Map, Value};

use lessonplan_db::models::{LessonSections, Section};

use crate::error::ParseError;

/// Successfully parsed AI output. Always carries all six sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedContent {
    pub sections: LessonSections,
    /// Sections absent (or `null`) in the output, in canonical order.
    pub sections_missing: Vec<Section>,
}

impl ParsedContent {
    /// Canonical keys of the missing sections.
    pub fn missing_keys(&self) -> Vec<String> {
        self.sections_missing
            .iter()
            .map(|s| s.key().to_string())
            .collect()
    }
}

/// Parser settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentParser {
    /// Treat any missing section as a parse failure.
    pub require_all_sections: bool,
}

impl ContentParser {
    pub fn new(require_all_sections: bool) -> Self {
        Self {
            require_all_sections,
        }
    }

    pub fn parse(&self, raw: &str) -> Result<ParsedContent, ParseError> {
        let parsed = parse_content(raw)?;
        if self.require_all_sections && !parsed.sections_missing.is_empty() {
            return Err(ParseError::MissingSections {
                missing: parsed.missing_keys(),
                raw: raw.to_string(),
            });
        }
        Ok(parsed)
    }
}

/// Parse raw AI output, tolerating missing sections.
pub fn parse_content(raw: &str) -> Result<ParsedContent, ParseError> {
    let body = strip_code_fence(raw);
    if body.trim().is_empty() {
        return Err(ParseError::Empty {
            raw: raw.to_string(),
        });
    }

    let value: Value = serde_json::from_str(body).map_err(|e| ParseError::Malformed {
        message: e.to_string(),
        raw: raw.to_string(),
    })?;
    let Value::Object(object) = value else {
        return Err(ParseError::NotAnObject {
            found: json_type(&value),
            raw: raw.to_string(),
        });
    };

    let mut sections = LessonSections::default();
    let mut sections_missing = Vec::new();
    for section in Section::ALL {
        match lookup(&object, section) {
            None | Some(Value::Null) => sections_missing.push(section),
            Some(value) => {
                let text = coerce(section, value).map_err(|found| ParseError::UnsupportedValue {
                    key: section.key().to_string(),
                    found,
                    raw: raw.to_string(),
                })?;
                sections.set(section, text);
            }
        }
    }

    Ok(ParsedContent {
        sections,
        sections_missing,
    })
}

/// camelCase key first, snake_case alias second.
fn lookup(object: &Map<String, Value>, section: Section) -> Option<&Value> {
    object
        .get(section.key())
        .or_else(|| object.get(section.column()))
}

/// Stringify a section value, or name the JSON type that is not allowed.
fn coerce(section: Section, value: &Value) -> Result<String, &'static str> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(_) | Value::Bool(_) => Ok(value.to_string()),
        Value::Array(items) => {
            let mut lines = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Null => {}
                    Value::String(s) => lines.push(s.clone()),
                    Value::Number(_) | Value::Bool(_) => lines.push(item.to_string()),
                    Value::Array(_) | Value::Object(_) => {
                        tracing::debug!(section = %section, "nested value in section array");
                        return Err(json_type(item));
                    }
                }
            }
            Ok(lines.join("\n"))
        }
        Value::Object(_) => Err("object"),
        Value::Null => Ok(String::new()),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Remove one surrounding ```` ``` ```` fence (with optional language tag).
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return raw;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return raw;
    };
    match inner.split_once('\n') {
        Some((tag, body)) if !tag.trim_start().starts_with(['{', '[']) => body,
        _ => inner,
    }
}
