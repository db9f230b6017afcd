use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static FLAT_OBJECT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{[^{}]*\}").ok());

static EXTRACTION_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)"(?:question|answer)"\s*:"#).ok());

/// Recovers one JSON object from noisy model text.
///
/// Tried in order, first hit wins:
/// 1. the whole text is a JSON object;
/// 2. any `{...}` span without nested braces;
/// 3. a string-aware brace scan from every `{`, left to right.
///
/// Arrays and scalars at the root are never returned.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    parse_object(text.trim())
        .or_else(|| flat_object(text))
        .or_else(|| balanced_object(text))
}

/// True for text that is the start of a JSON value no strategy could
/// recover, typically an object cut off by the token budget.
pub fn looks_like_json_fragment(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with(['{', '['])
        || EXTRACTION_KEY
            .as_ref()
            .is_some_and(|re| re.is_match(text))
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn flat_object(text: &str) -> Option<Map<String, Value>> {
    FLAT_OBJECT
        .as_ref()?
        .find_iter(text)
        .find_map(|m| parse_object(m.as_str()))
}

fn balanced_object(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        let len = balanced_len(&text[start..])?;
        parse_object(&text[start..start + len])
    })
}

/// Byte length of the brace-balanced prefix of `text`, which starts at `{`.
fn balanced_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
