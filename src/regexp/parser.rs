use super::{CharClass, Regexp, RegexpLiteral, Shorthand};
use crate::error::SyntaxError;
use crate::util::Position;

/// Recursive-descent parser over the captured text of a `/…/` token.
/// Invoked by [crate::parser::Parser] whenever it meets a
/// `RegexpLiteral` token; never runs over raw source directly.
pub struct RegexpParser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl<'a> RegexpParser<'a> {
    /// `token_text` is the full `/pattern/flags` span, `base_pos` the byte
    /// offset of its first character in the source file (for error
    /// positions).
    pub fn parse(token_text: &'a str, base_line: usize, base_col: usize) -> Result<RegexpLiteral, SyntaxError> {
        let end_slash = token_text.rfind('/').ok_or_else(|| {
            SyntaxError::new(Position::new(base_line, base_col), "malformed regexp literal")
        })?;
        let body = &token_text[1..end_slash];
        let flags = &token_text[end_slash + 1..];
        let case_insensitive = flags.contains('i');
        let dot_all = flags.contains('s');

        let mut parser = RegexpParser { chars: body.chars().collect(), pos: 0, source: body };
        let ast = parser.parse_or()?;
        if parser.pos != parser.chars.len() {
            return Err(SyntaxError::new(Position::new(base_line, base_col), "trailing characters in regexp"));
        }
        Ok(RegexpLiteral { ast, case_insensitive, dot_all, pure_text: body.to_string() })
    }

    fn err(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(Position::new(1, self.pos + 1), message)
    }

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

    fn parse_or(&mut self) -> Result<Regexp, SyntaxError> {
        let left = self.parse_concat()?;
        if self.peek() == Some('|') {
            self.bump();
            let right = self.parse_or()?;
            Ok(Regexp::Or(Box::new(left), Box::new(right)))
        } else {
            Ok(left)
        }
    }

    fn parse_concat(&mut self) -> Result<Regexp, SyntaxError> {
        let mut items = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            items.push(self.parse_repeat()?);
        }
        if items.is_empty() {
            return Ok(Regexp::Concat(Vec::new()));
        }
        if items.len() == 1 {
            Ok(items.pop().unwrap())
        } else {
            Ok(Regexp::Concat(items))
        }
    }

    fn parse_repeat(&mut self) -> Result<Regexp, SyntaxError> {
        let atom = self.parse_atom()?;
        match self.peek() {
            Some('*') => {
                self.bump();
                let greedy = self.consume_lazy_marker();
                Ok(Regexp::Iteration { inner: Box::new(atom), greedy })
            }
            Some('+') => {
                self.bump();
                let greedy = self.consume_lazy_marker();
                Ok(Regexp::PositiveIteration { inner: Box::new(atom), greedy })
            }
            Some('?') => {
                self.bump();
                let greedy = self.consume_lazy_marker();
                Ok(Regexp::Optional { inner: Box::new(atom), greedy })
            }
            Some('{') => {
                let save = self.pos;
                if let Some((low, high)) = self.try_parse_range()? {
                    let greedy = self.consume_lazy_marker();
                    Ok(Regexp::Range { inner: Box::new(atom), low, high, greedy })
                } else {
                    self.pos = save;
                    Ok(atom)
                }
            }
            _ => Ok(atom),
        }
    }

    /// Trailing `?` after `*`, `+`, `?`, or `{…}` sets `greedy=false`;
    /// absence leaves it `true`.
    fn consume_lazy_marker(&mut self) -> bool {
        if self.peek() == Some('?') {
            self.bump();
            false
        } else {
            true
        }
    }

    fn try_parse_range(&mut self) -> Result<Option<(Option<u32>, Option<u32>)>, SyntaxError> {
        self.bump(); // '{'
        let low = self.parse_number();
        let (low, high) = if self.peek() == Some(',') {
            self.bump();
            let high = self.parse_number();
            (low, high)
        } else {
            (low, low)
        };
        if self.peek() != Some('}') {
            return Ok(None);
        }
        self.bump();
        if let (Some(l), Some(h)) = (low, high) {
            if l > h {
                return Err(self.err(format!("invalid repetition range {{{},{}}}: low > high", l, h)));
            }
        }
        Ok(Some((low, high)))
    }

    fn parse_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.bump();
        }
        if self.pos == start {
            None
        } else {
            self.source[..].chars().skip(start).take(self.pos - start).collect::<String>().parse().ok()
        }
    }

    fn parse_atom(&mut self) -> Result<Regexp, SyntaxError> {
        match self.bump() {
            None => Err(self.err("unexpected end of regexp")),
            Some('(') => {
                let inner = self.parse_or()?;
                if self.bump() != Some(')') {
                    return Err(self.err("unterminated group"));
                }
                Ok(Regexp::Group(Box::new(inner)))
            }
            Some('^') => Ok(Regexp::StartOfLine),
            Some('$') => Ok(Regexp::EndOfLine),
            Some('.') => Ok(Regexp::Shorthand(Shorthand::AnyChar)),
            Some('[') => self.parse_class(),
            Some('\\') => self.parse_escape(),
            Some(c) => Ok(Regexp::Text(c)),
        }
    }

    fn parse_escape(&mut self) -> Result<Regexp, SyntaxError> {
        match self.bump() {
            None => Err(self.err("dangling escape")),
            Some('w') => Ok(Regexp::Shorthand(Shorthand::WordChar)),
            Some('W') => Ok(Regexp::Shorthand(Shorthand::NotWordChar)),
            Some('s') => Ok(Regexp::Shorthand(Shorthand::Space)),
            Some('S') => Ok(Regexp::Shorthand(Shorthand::NotSpace)),
            Some('d') => Ok(Regexp::Shorthand(Shorthand::Digit)),
            Some('D') => Ok(Regexp::Shorthand(Shorthand::NotDigit)),
            Some('b') => Ok(Regexp::Shorthand(Shorthand::WordBoundary)),
            Some('B') => Ok(Regexp::Shorthand(Shorthand::NotWordBoundary)),
            Some(c) => Ok(Regexp::Text(c)),
        }
    }

    fn parse_class(&mut self) -> Result<Regexp, SyntaxError> {
        let negated = if self.peek() == Some('^') {
            self.bump();
            true
        } else {
            false
        };
        let start = self.pos;
        loop {
            match self.bump() {
                None => return Err(self.err("unterminated character class")),
                Some('\\') => {
                    self.bump();
                }
                Some(']') => break,
                _ => {}
            }
        }
        let spec_end = self.pos - 1;
        let spec: String = self.chars[start..spec_end].iter().collect();
        Ok(Regexp::Class(CharClass { negated, spec }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_concatenation() {
        let re = RegexpParser::parse("/abc/", 1, 1).unwrap();
        assert_eq!(re.ast, Regexp::Concat(vec![Regexp::Text('a'), Regexp::Text('b'), Regexp::Text('c')]));
        assert!(!re.case_insensitive);
        assert!(!re.dot_all);
    }

    #[test]
    fn flags_set_case_insensitive_and_dot_all() {
        let re = RegexpParser::parse("/abc/is", 1, 1).unwrap();
        assert!(re.case_insensitive);
        assert!(re.dot_all);
    }

    #[test]
    fn text_round_trips_pattern_and_flags() {
        let re = RegexpParser::parse("/a.b/i", 1, 1).unwrap();
        assert_eq!(re.text(), "/a.b/i");
    }

    #[test]
    fn repetition_operators_default_greedy() {
        let re = RegexpParser::parse("/a*/", 1, 1).unwrap();
        match re.ast {
            Regexp::Iteration { greedy, .. } => assert!(greedy),
            other => panic!("expected Iteration, got {:?}", other),
        }
    }

    #[test]
    fn lazy_marker_after_repetition() {
        let re = RegexpParser::parse("/a+?/", 1, 1).unwrap();
        match re.ast {
            Regexp::PositiveIteration { greedy, .. } => assert!(!greedy),
            other => panic!("expected PositiveIteration, got {:?}", other),
        }
    }

    #[test]
    fn bounded_repetition_range() {
        let re = RegexpParser::parse("/a{2,5}/", 1, 1).unwrap();
        match re.ast {
            Regexp::Range { low, high, .. } => assert_eq!((low, high), (Some(2), Some(5))),
            other => panic!("expected Range, got {:?}", other),
        }
    }

    #[test]
    fn rejects_inverted_repetition_range() {
        assert!(RegexpParser::parse("/a{5,2}/", 1, 1).is_err());
    }

    #[test]
    fn unbalanced_brace_falls_back_to_literal_text() {
        // `{` that never closes isn't a repetition range; it's just text.
        let re = RegexpParser::parse("/a{foo/", 1, 1).unwrap();
        assert!(matches!(re.ast, Regexp::Concat(_)));
    }

    #[test]
    fn shorthand_classes() {
        let re = RegexpParser::parse("/\\w\\d\\s/", 1, 1).unwrap();
        assert_eq!(
            re.ast,
            Regexp::Concat(vec![
                Regexp::Shorthand(Shorthand::WordChar),
                Regexp::Shorthand(Shorthand::Digit),
                Regexp::Shorthand(Shorthand::Space),
            ])
        );
    }

    #[test]
    fn character_class_preserves_raw_spec() {
        let re = RegexpParser::parse("/[a-z0-9]/", 1, 1).unwrap();
        match re.ast {
            Regexp::Class(CharClass { negated, spec }) => {
                assert!(!negated);
                assert_eq!(spec, "a-z0-9");
            }
            other => panic!("expected Class, got {:?}", other),
        }
    }

    #[test]
    fn negated_character_class() {
        let re = RegexpParser::parse("/[^abc]/", 1, 1).unwrap();
        match re.ast {
            Regexp::Class(CharClass { negated, .. }) => assert!(negated),
            other => panic!("expected Class, got {:?}", other),
        }
    }

    #[test]
    fn alternation_and_grouping() {
        let re = RegexpParser::parse("/(a|b)/", 1, 1).unwrap();
        match re.ast {
            Regexp::Group(inner) => assert!(matches!(*inner, Regexp::Or(_, _))),
            other => panic!("expected Group, got {:?}", other),
        }
    }

    #[test]
    fn anchors() {
        let re = RegexpParser::parse("/^a$/", 1, 1).unwrap();
        assert_eq!(re.ast, Regexp::Concat(vec![Regexp::StartOfLine, Regexp::Text('a'), Regexp::EndOfLine]));
    }

    #[test]
    fn rejects_unterminated_group() {
        assert!(RegexpParser::parse("/(a/", 1, 1).is_err());
    }
}
