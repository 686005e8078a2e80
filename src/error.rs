use crate::util::Position;
use std::fmt::{Display, Formatter};

/// Input could not be tokenized: unrecognized byte sequence or an
/// unterminated string/hex-string/regexp/comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalError {
    pub position: Position,
    pub message: String,
}

/// The grammar rejected a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub position: Position,
    pub message: String,
}

/// Unknown identifier, unknown module, a type violation on a struct/array
/// access or function call, a duplicate rule/string name, or a reference
/// to a string not declared in the current rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    pub position: Position,
    pub message: String,
}

/// Attempt to construct an ill-typed expression through the builder API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderError {
    pub message: String,
}

impl LexicalError {
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        Self { position, message: message.into() }
    }
}
impl SyntaxError {
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        Self { position, message: message.into() }
    }
}
impl SemanticError {
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        Self { position, message: message.into() }
    }
}
impl BuilderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl Display for LexicalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LexicalError: {} at {}", self.message, self.position)
    }
}
impl Display for SyntaxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SyntaxError: {} at {}", self.message, self.position)
    }
}
impl Display for SemanticError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SemanticError: {} at {}", self.message, self.position)
    }
}
impl Display for BuilderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuilderError: {}", self.message)
    }
}

impl std::error::Error for LexicalError {}
impl std::error::Error for SyntaxError {}
impl std::error::Error for SemanticError {}
impl std::error::Error for BuilderError {}

/// Union of the parse-time error kinds. A single `ParserError` is raised
/// per `parse` call and carries a [Position] for diagnostics. Lexing is
/// eager and total, so a syntax or semantic failure during parsing never
/// loses token data: the caller can always re-tokenize the same source
/// independently to inspect the full stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
    Lexical(LexicalError),
    Syntax(SyntaxError),
    Semantic(SemanticError),
}

impl Display for ParserError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParserError::Lexical(e) => Display::fmt(e, f),
            ParserError::Syntax(e) => Display::fmt(e, f),
            ParserError::Semantic(e) => Display::fmt(e, f),
        }
    }
}
impl std::error::Error for ParserError {}

impl From<LexicalError> for ParserError {
    fn from(e: LexicalError) -> Self {
        ParserError::Lexical(e)
    }
}
impl From<SyntaxError> for ParserError {
    fn from(e: SyntaxError) -> Self {
        ParserError::Syntax(e)
    }
}
impl From<SemanticError> for ParserError {
    fn from(e: SemanticError) -> Self {
        ParserError::Semantic(e)
    }
}
