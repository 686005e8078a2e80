//! Hex-string AST: bytes, nibble wildcards, jumps and alternations inside
//! a `{ ... }` string definition.

use crate::error::SyntaxError;
use crate::util::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nibble {
    Fixed(u8),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HexToken {
    Byte { high: Nibble, low: Nibble },
    Jump { low: Option<u32>, high: Option<u32> },
    Alternation(Vec<Vec<HexToken>>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HexString {
    pub tokens: Vec<HexToken>,
}

impl HexString {
    /// Parse the full `{ ... }` span (braces included) captured by the
    /// lexer.
    pub fn parse(text: &str, base_line: usize, base_col: usize) -> Result<HexString, SyntaxError> {
        let inner = text
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| SyntaxError::new(Position::new(base_line, base_col), "malformed hex string"))?;
        let mut parser = HexParser { chars: inner.chars().collect(), pos: 0 };
        let tokens = parser.parse_sequence()?;
        if parser.pos != parser.chars.len() {
            return Err(SyntaxError::new(Position::new(base_line, base_col), "trailing content in hex string"));
        }
        Ok(HexString { tokens })
    }

    pub fn text(&self) -> String {
        let mut s = String::from("{ ");
        s.push_str(&render_tokens(&self.tokens));
        s.push_str(" }");
        s
    }
}

fn render_tokens(tokens: &[HexToken]) -> String {
    tokens.iter().map(render_token).collect::<Vec<_>>().join(" ")
}

fn render_nibble(n: Nibble) -> String {
    match n {
        Nibble::Fixed(v) => format!("{:X}", v),
        Nibble::Wildcard => "?".to_string(),
    }
}

fn render_token(t: &HexToken) -> String {
    match t {
        HexToken::Byte { high, low } => format!("{}{}", render_nibble(*high), render_nibble(*low)),
        HexToken::Jump { low, high } => match (low, high) {
            (Some(l), Some(h)) if l == h => format!("[{}]", l),
            (Some(l), Some(h)) => format!("[{}-{}]", l, h),
            (Some(l), None) => format!("[{}-]", l),
            (None, Some(h)) => format!("[-{}]", h),
            (None, None) => "[-]".to_string(),
        },
        HexToken::Alternation(groups) => {
            let inner = groups.iter().map(|g| render_tokens(g)).collect::<Vec<_>>().join(" | ");
            format!("({})", inner)
        }
    }
}

struct HexParser {
    chars: Vec<char>,
    pos: usize,
}

impl HexParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }
    fn err(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(Position::new(1, self.pos + 1), message)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.chars.get(self.pos + 1) == Some(&'/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn parse_sequence(&mut self) -> Result<Vec<HexToken>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None | Some(')') | Some('|') => break,
                Some('[') => tokens.push(self.parse_jump()?),
                Some('(') => tokens.push(self.parse_alternation()?),
                _ => tokens.push(self.parse_byte()?),
            }
        }
        Ok(tokens)
    }

    fn parse_nibble(&mut self) -> Result<Nibble, SyntaxError> {
        match self.bump() {
            Some('?') => Ok(Nibble::Wildcard),
            Some(c) if c.is_ascii_hexdigit() => Ok(Nibble::Fixed(c.to_digit(16).unwrap() as u8)),
            other => Err(self.err(format!("expected hex digit or '?', found {:?}", other))),
        }
    }

    fn parse_byte(&mut self) -> Result<HexToken, SyntaxError> {
        let high = self.parse_nibble()?;
        let low = self.parse_nibble()?;
        Ok(HexToken::Byte { high, low })
    }

    fn parse_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.bump();
        }
        if self.pos == start {
            None
        } else {
            self.chars[start..self.pos].iter().collect::<String>().parse().ok()
        }
    }

    fn parse_jump(&mut self) -> Result<HexToken, SyntaxError> {
        self.bump(); // '['
        self.skip_trivia();
        let low = self.parse_number();
        self.skip_trivia();
        let high = if self.peek() == Some('-') {
            self.bump();
            self.skip_trivia();
            let h = self.parse_number();
            self.skip_trivia();
            h
        } else {
            low
        };
        if self.bump() != Some(']') {
            return Err(self.err("unterminated jump, expected ']'"));
        }
        if let (Some(l), Some(h)) = (low, high) {
            if l > h {
                return Err(self.err(format!("invalid jump [{}-{}]: low bound exceeds high bound", l, h)));
            }
        }
        Ok(HexToken::Jump { low, high })
    }

    fn parse_alternation(&mut self) -> Result<HexToken, SyntaxError> {
        self.bump(); // '('
        let mut groups = Vec::new();
        loop {
            groups.push(self.parse_sequence()?);
            self.skip_trivia();
            match self.bump() {
                Some('|') => continue,
                Some(')') => break,
                other => return Err(self.err(format!("expected '|' or ')', found {:?}", other))),
            }
        }
        Ok(HexToken::Alternation(groups))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_bytes() {
        let hex = HexString::parse("{ 6A 40 }", 1, 1).unwrap();
        assert_eq!(hex.tokens, vec![
            HexToken::Byte { high: Nibble::Fixed(6), low: Nibble::Fixed(0xA) },
            HexToken::Byte { high: Nibble::Fixed(4), low: Nibble::Fixed(0) },
        ]);
    }

    #[test]
    fn parses_nibble_wildcards() {
        let hex = HexString::parse("{ 4? ?A }", 1, 1).unwrap();
        assert_eq!(hex.tokens, vec![
            HexToken::Byte { high: Nibble::Fixed(4), low: Nibble::Wildcard },
            HexToken::Byte { high: Nibble::Wildcard, low: Nibble::Fixed(0xA) },
        ]);
    }

    #[test]
    fn parses_fixed_and_unbounded_jumps() {
        let hex = HexString::parse("{ 01 [4] 02 [4-8] 03 [10-] 04 }", 1, 1).unwrap();
        assert_eq!(hex.tokens[1], HexToken::Jump { low: Some(4), high: Some(4) });
        assert_eq!(hex.tokens[3], HexToken::Jump { low: Some(4), high: Some(8) });
        assert_eq!(hex.tokens[5], HexToken::Jump { low: Some(10), high: None });
    }

    #[test]
    fn rejects_jump_with_low_exceeding_high() {
        assert!(HexString::parse("{ [8-4] }", 1, 1).is_err());
    }

    #[test]
    fn parses_alternation_groups() {
        let hex = HexString::parse("{ ( 01 02 | 03 ) }", 1, 1).unwrap();
        match &hex.tokens[0] {
            HexToken::Alternation(groups) => assert_eq!(groups.len(), 2),
            other => panic!("expected alternation, got {:?}", other),
        }
    }

    #[test]
    fn text_renders_canonical_form() {
        let hex = HexString::parse("{6A40}", 1, 1).unwrap();
        assert_eq!(hex.text(), "{ 6A 40 }");
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(HexString::parse("{ 01 ) }", 1, 1).is_err());
    }
}
