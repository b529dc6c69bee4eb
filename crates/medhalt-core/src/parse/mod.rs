//! Loose parser: recovers a field map from raw, near-JSON model output.
//!
//! Models answer with something that *looks* like a mapping literal, e.g.
//! `{'cop': 'B', 'why_correct': '...'}`, followed by prose or the few-shot
//! stop sentinel, and often with apostrophes that break the quoting.
//! [`LooseParser::parse`] never fails: it tries a strict literal decode first,
//! falls back to a regex key/value scan, and returns an empty map when
//! neither recovers anything.

pub mod literal;

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::ParsedOutput;
use crate::metrics::METRICS;
use crate::obs;

/// Stop sentinel appended after every few-shot example.
pub const DEFAULT_STOP_SENTINEL: &str = "Stop Here";

/// Which stage produced the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePath {
    Strict,
    Lenient,
    Failed,
}

/// A parsed output plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub output: ParsedOutput,
    pub path: ParsePath,
    /// The cleaned single-line text both decoders ran on.
    pub cleaned: String,
}

#[derive(Debug, Clone)]
pub struct LooseParser {
    stop_sentinel: String,
}

impl Default for LooseParser {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_SENTINEL)
    }
}

impl LooseParser {
    pub fn new(stop_sentinel: impl Into<String>) -> Self {
        Self {
            stop_sentinel: stop_sentinel.into(),
        }
    }

    /// Parse raw model output into a field map.
    pub fn parse(&self, raw: &str) -> Parsed {
        let cleaned = self.clean(raw);

        // An empty literal carries no fields and counts as a failure.
        match literal::decode_mapping(&cleaned) {
            Ok(map) if !map.is_empty() => {
                return Parsed {
                    output: map.into_iter().collect::<BTreeMap<_, _>>().into(),
                    path: ParsePath::Strict,
                    cleaned,
                };
            }
            _ => {}
        }

        let output = recover_key_values(&cleaned);
        let path = if output.is_empty() {
            ParsePath::Failed
        } else {
            ParsePath::Lenient
        };
        Parsed {
            output,
            path,
            cleaned,
        }
    }

    /// Parse the output of one sample, recording fallbacks and failures for audit.
    pub fn parse_sample(&self, sample_id: &str, raw: &str) -> Parsed {
        let parsed = self.parse(raw);
        METRICS.inc_outputs_parsed();
        match parsed.path {
            ParsePath::Strict => {}
            ParsePath::Lenient => {
                METRICS.inc_lenient_recoveries();
                obs::emit_parse_recovered(sample_id, parsed.output.len(), &parsed.cleaned);
            }
            ParsePath::Failed => {
                METRICS.inc_parse_failures();
                obs::emit_parse_failed(sample_id, raw);
            }
        }
        parsed
    }

    /// First line only, sentinel removed, possessives collapsed, apostrophes
    /// inside words re-quoted so they cannot close a string early.
    pub fn clean(&self, raw: &str) -> String {
        let first_line = raw.trim().lines().next().unwrap_or("");
        let without_sentinel = if self.stop_sentinel.is_empty() {
            first_line.to_string()
        } else {
            first_line.replace(&self.stop_sentinel, "")
        };
        normalize_quotes(&collapse_possessives(without_sentinel.trim()))
    }
}

/// Drop the apostrophe of a `'s` that follows a word character (`It's` → `Its`).
pub fn collapse_possessives(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let possessive = c == '\''
            && i > 0
            && is_word_char(chars[i - 1])
            && chars.get(i + 1) == Some(&'s');
        if !possessive {
            out.push(c);
        }
    }
    out
}

/// Parse with the default stop sentinel.
pub fn parse_output(raw: &str) -> ParsedOutput {
    LooseParser::default().parse(raw).output
}

/// Re-quote apostrophes that sit between two word characters.
///
/// With single quotes present, `don't` becomes `don"t` so the single-quoted
/// string survives; otherwise `don"t` becomes `don\'t` inside the
/// double-quoted string.
pub fn normalize_quotes(text: &str) -> String {
    if text.contains('\'') {
        replace_inner_char(text, '\'', "\"")
    } else {
        replace_inner_char(text, '"', "\\'")
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn replace_inner_char(text: &str, target: char, replacement: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let inner = c == target
            && i > 0
            && is_word_char(chars[i - 1])
            && chars.get(i + 1).copied().is_some_and(is_word_char);
        if inner {
            out.push_str(replacement);
        } else {
            out.push(c);
        }
    }
    out
}

fn key_value_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"['"](.*?)['"]\s*:\s*['"]*(.*?)['"]*\s*[,}]"#)
            .expect("key/value pattern is a valid regex")
    })
}

/// Scan for `"<key>": <value>` segments terminated by a comma or closing brace.
pub fn recover_key_values(text: &str) -> ParsedOutput {
    key_value_pattern()
        .captures_iter(text)
        .map(|caps| {
            let key = caps[1].replace('\\', "");
            (key, caps[2].to_string())
        })
        .collect()
}
