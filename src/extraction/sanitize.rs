//! Cleanup of raw model text before any parsing happens.
//!
//! Models wrap their output in reasoning blocks, markdown fences and quotes.
//! [`sanitize`] peels those layers off until nothing more changes, so the
//! result is stable under repeated application.

use std::sync::LazyLock;

use regex::Regex;

static REASONING_BLOCK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:think|thinking|reasoning)\b[^>]*>.*?</(?:think|thinking|reasoning)\s*>")
        .ok()
});

static DANGLING_CLOSE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)^.*</(?:think|thinking|reasoning)\s*>").ok());

static FENCE_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_+.\-]*[ \t]*$\n?").ok());

static LANG_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_+.\-]*[ \t]*$").ok());

const FENCE: &str = "```";

const QUOTE_PAIRS: [(char, char); 6] = [
    ('"', '"'),
    ('\'', '\''),
    ('`', '`'),
    ('\u{201C}', '\u{201D}'),
    ('\u{AB}', '\u{BB}'),
    ('\u{2018}', '\u{2019}'),
];

pub fn sanitize(raw: &str) -> String {
    let mut current = sanitize_step(raw);
    loop {
        let next = sanitize_step(&current);
        // Every step only removes text, so equal length means nothing changed.
        if next.len() >= current.len() {
            return current;
        }
        current = next;
    }
}

fn sanitize_step(text: &str) -> String {
    let text = strip_reasoning(text);
    let text = unwrap_fences(&text);
    strip_wrapping(&text).to_string()
}

fn strip_reasoning(text: &str) -> String {
    let mut out = match REASONING_BLOCK.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };
    if let Some(re) = DANGLING_CLOSE.as_ref() {
        if let Some(m) = re.find(&out) {
            out = out[m.end()..].to_string();
        }
    }
    out
}

/// Block fences only: the text opens with a fence or a fence marker sits on
/// its own line. Inline ``` spans inside prose are left alone.
fn unwrap_fences(text: &str) -> String {
    if !is_fenced(text) {
        return text.to_string();
    }
    let positions: Vec<usize> = text.match_indices(FENCE).map(|(i, _)| i).collect();

    for pair in positions.chunks_exact(2) {
        let inner = &text[pair[0] + FENCE.len()..pair[1]];
        let body = strip_lang_tag(inner).trim();
        if !body.is_empty() {
            return body.to_string();
        }
    }

    let without_lines = match FENCE_LINE.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };
    without_lines.replace(FENCE, "")
}

fn is_fenced(text: &str) -> bool {
    text.trim_start().starts_with(FENCE) || FENCE_LINE.as_ref().is_some_and(|re| re.is_match(text))
}

fn strip_lang_tag(inner: &str) -> &str {
    match inner.split_once('\n') {
        Some((first, rest)) if LANG_TAG.as_ref().is_some_and(|re| re.is_match(first)) => rest,
        _ => inner,
    }
}

fn strip_wrapping(text: &str) -> &str {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return trimmed;
    };

    for (open, close) in QUOTE_PAIRS {
        if first == open && last == close {
            let inner = &trimmed[open.len_utf8()..trimmed.len() - close.len_utf8()];
            // `"a" and "b"` is not a single quoted value.
            if inner.contains(close) || inner.contains(open) {
                return trimmed;
            }
            return inner.trim();
        }
    }
    trimmed
}
