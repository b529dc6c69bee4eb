//! Strict decoder for single-level mapping literals.
//!
//! Accepts the dict syntax models imitate from their few-shot examples:
//! single- or double-quoted strings, numbers, `True`/`False`/`None` (and the
//! JSON spellings), lists, tuples and nested mappings. Anything else is an
//! error; nothing is ever evaluated.

use serde_json::{Map, Number, Value};

/// Deepest container nesting the decoder accepts.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiteralError {
    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unexpected character {found:?} at offset {offset}")]
    Unexpected { found: char, offset: usize },

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("top-level value is not a mapping")]
    NotAMapping,

    #[error("trailing input at offset {0}")]
    TrailingInput(usize),

    #[error("nesting too deep at offset {0}")]
    TooDeep(usize),
}

/// Decode `input` as a mapping literal. Later duplicate keys win.
pub fn decode_mapping(input: &str) -> Result<Map<String, Value>, LiteralError> {
    let mut decoder = Decoder::new(input);
    decoder.skip_ws();
    let value = decoder.value()?;
    decoder.skip_ws();
    if let Some((offset, _)) = decoder.peek_indexed() {
        return Err(LiteralError::TrailingInput(offset));
    }
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(LiteralError::NotAMapping),
    }
}

struct Decoder<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    depth: usize,
}

impl<'a> Decoder<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            depth: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_indexed(&mut self) -> Option<(usize, char)> {
        self.chars.peek().copied()
    }

    fn next(&mut self) -> Result<(usize, char), LiteralError> {
        self.chars.next().ok_or(LiteralError::UnexpectedEnd)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn expect(&mut self, want: char) -> Result<(), LiteralError> {
        let (offset, found) = self.next()?;
        if found == want {
            Ok(())
        } else {
            Err(LiteralError::Unexpected { found, offset })
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        let (offset, c) = self.peek_indexed().ok_or(LiteralError::UnexpectedEnd)?;
        match c {
            '{' | '[' | '(' => self.container(c, offset),
            '\'' | '"' => self.string().map(Value::String),
            '-' | '+' | '.' | '0'..='9' => self.number(),
            c if c.is_alphabetic() => self.keyword(),
            found => Err(LiteralError::Unexpected { found, offset }),
        }
    }

    fn container(&mut self, open: char, offset: usize) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(LiteralError::TooDeep(offset));
        }
        self.depth += 1;
        let value = match open {
            '{' => self.mapping(),
            '[' => self.sequence('[', ']'),
            _ => self.sequence('(', ')'),
        };
        self.depth -= 1;
        value
    }

    fn mapping(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.chars.next();
                return Ok(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => {
                    let (offset, found) = self.peek_indexed().ok_or(LiteralError::UnexpectedEnd)?;
                    return Err(LiteralError::Unexpected { found, offset });
                }
            };
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            let (offset, c) = self.next()?;
            match c {
                ',' => continue,
                '}' => return Ok(Value::Object(map)),
                found => return Err(LiteralError::Unexpected { found, offset }),
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Value, LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.chars.next();
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            let (offset, c) = self.next()?;
            if c == close {
                return Ok(Value::Array(items));
            }
            if c != ',' {
                return Err(LiteralError::Unexpected { found: c, offset });
            }
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let (_, quote) = self.next()?;
        let mut out = String::new();
        loop {
            let (_, c) = self.next()?;
            match c {
                c if c == quote => return Ok(out),
                '\n' => return Err(LiteralError::UnexpectedEnd),
                '\\' => {
                    let (offset, escaped) = self.next()?;
                    match escaped {
                        '\\' | '\'' | '"' | '/' => out.push(escaped),
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'u' => out.push(self.unicode_escape(offset)?),
                        // Unknown escapes are kept verbatim.
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self, offset: usize) -> Result<char, LiteralError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let (at, c) = self.next()?;
            let digit = c
                .to_digit(16)
                .ok_or(LiteralError::Unexpected { found: c, offset: at })?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or(LiteralError::Unexpected {
            found: 'u',
            offset,
        })
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.peek_indexed().map(|(i, _)| i).unwrap_or(self.input.len());
        let mut end = start;
        while let Some((i, c)) = self.peek_indexed() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        let text = &self.input[start..end];
        let trimmed = text.strip_prefix('+').unwrap_or(text);
        if let Ok(i) = trimmed.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
        trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError::InvalidNumber(text.to_string()))
    }

    fn keyword(&mut self) -> Result<Value, LiteralError> {
        let (start, _) = self.peek_indexed().ok_or(LiteralError::UnexpectedEnd)?;
        let mut end = start;
        while let Some((i, c)) = self.peek_indexed() {
            if c.is_alphanumeric() || c == '_' {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        match &self.input[start..end] {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            word => Err(LiteralError::Unexpected {
                found: word.chars().next().unwrap_or('?'),
                offset: start,
            }),
        }
    }
}
