use thiserror::Error;

use crate::value::{Map, Set, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiteralError {
    #[error("invalid literal syntax: {0}")]
    InvalidSyntax(String),
}

/// Parse bracket-delimited literal text: `[1, 'a']`, `(1, 2)`, `{1, 2}`,
/// `{'k': [True, None]}`. Quotes may be single or double, bare words are
/// strings, and `True`/`False`/`None` are accepted next to the JSON spellings.
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    let mut p = Scanner::new(input);
    let value = p.parse_value()?;
    p.skip_ws();
    if !p.eof() {
        return Err(LiteralError::InvalidSyntax("trailing input".into()));
    }
    Ok(value)
}

struct Scanner<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek_char() {
            Some('[') => {
                self.i += 1;
                Ok(Value::List(self.parse_items(']')?))
            }
            Some('(') => {
                self.i += 1;
                Ok(Value::Tuple(self.parse_items(')')?))
            }
            Some('{') => {
                self.i += 1;
                self.parse_braced()
            }
            Some('"') | Some('\'') => Ok(Value::Str(self.parse_quoted_string()?)),
            Some(c) if c == '-' || c == '+' || c.is_ascii_digit() => self.parse_number_literal(),
            Some(_) => {
                let word = self.parse_bare_word()?;
                Ok(match word.as_str() {
                    "true" | "True" => Value::Bool(true),
                    "false" | "False" => Value::Bool(false),
                    "null" | "None" => Value::Null,
                    _ => Value::Str(word),
                })
            }
            None => Err(LiteralError::InvalidSyntax("value expected".into())),
        }
    }

    fn parse_items(&mut self, close: char) -> Result<Vec<Value>, LiteralError> {
        let mut out = Vec::new();
        loop {
            self.skip_ws();
            if self.consume_char(close) {
                return Ok(out);
            }
            out.push(self.parse_value()?);
            self.skip_ws();
            if self.consume_char(',') {
                continue;
            }
            self.expect(close)?;
            return Ok(out);
        }
    }

    /// `{}` is an empty map; after the first item a `:` decides map versus set.
    fn parse_braced(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        if self.consume_char('}') {
            return Ok(Value::Map(Map::new()));
        }
        let first = self.parse_value()?;
        self.skip_ws();
        if self.consume_char(':') {
            let mut map = Map::new();
            let v = self.parse_value()?;
            map.insert(first, v);
            loop {
                self.skip_ws();
                if self.consume_char('}') {
                    return Ok(Value::Map(map));
                }
                self.expect(',')?;
                self.skip_ws();
                if self.consume_char('}') {
                    return Ok(Value::Map(map));
                }
                let k = self.parse_value()?;
                self.skip_ws();
                self.expect(':')?;
                let v = self.parse_value()?;
                map.insert(k, v);
            }
        }
        let mut set = Set::new();
        set.insert(first);
        if !self.consume_char('}') {
            self.expect(',')?;
            set.extend(self.parse_items('}')?);
        }
        Ok(Value::Set(set))
    }

    fn parse_bare_word(&mut self) -> Result<String, LiteralError> {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if matches!(c, ',' | ':' | ']' | ')' | '}') {
                break;
            }
            self.i += c.len_utf8();
        }
        let word = self.s[start..self.i].trim_end();
        if word.is_empty() {
            return Err(LiteralError::InvalidSyntax("value expected".into()));
        }
        Ok(word.to_string())
    }

    fn parse_number_literal(&mut self) -> Result<Value, LiteralError> {
        let start = self.i;
        if matches!(self.peek_char(), Some('-') | Some('+')) {
            self.i += 1;
        }
        let mut is_float = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '_' {
                self.i += 1;
            } else if matches!(c, '.' | 'e' | 'E') {
                is_float = true;
                self.i += 1;
                if c != '.' && matches!(self.peek_char(), Some('-') | Some('+')) {
                    self.i += 1;
                }
            } else {
                break;
            }
        }
        let text = self.s[start..self.i].replace('_', "");
        // something like `1a` is a bare word rather than a number
        if let Some(c) = self.peek_char() {
            if !c.is_whitespace() && !matches!(c, ',' | ':' | ']' | ')' | '}') {
                self.i = start;
                return Ok(Value::Str(self.parse_bare_word()?));
            }
        }
        if is_float {
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| LiteralError::InvalidSyntax(format!("bad float {text:?}")))
        } else {
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| LiteralError::InvalidSyntax(format!("bad int {text:?}")))
        }
    }

    fn parse_quoted_string(&mut self) -> Result<String, LiteralError> {
        let quote = self
            .peek_char()
            .ok_or_else(|| LiteralError::InvalidSyntax("string".into()))?;
        if quote != '\'' && quote != '"' {
            return Err(LiteralError::InvalidSyntax("expected quoted string".into()));
        }
        self.i += 1;
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            self.i += c.len_utf8();
            if c == quote {
                return Ok(out);
            }
            if c == '\\' {
                if let Some(nc) = self.peek_char() {
                    self.i += nc.len_utf8();
                    match nc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '\\' => out.push('\\'),
                        '"' => out.push('"'),
                        '\'' => out.push('\''),
                        _ => {
                            out.push('\\');
                            out.push(nc);
                        }
                    }
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        Err(LiteralError::InvalidSyntax("unterminated string".into()))
    }

    fn expect(&mut self, c: char) -> Result<(), LiteralError> {
        if self.consume_char(c) {
            Ok(())
        } else {
            Err(LiteralError::InvalidSyntax(format!("expected '{}'", c)))
        }
    }

    fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn eof(&self) -> bool {
        self.i >= self.s.len()
    }
}
