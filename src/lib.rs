//! Lossless lexer, parser, AST and visitor/builder framework for the
//! YARA rule-description language.
//!
//! The tree this crate builds is lossless: every token, including
//! whitespace and comments, lives in a [TokenStream], and every AST node
//! holds a `(first, last)` pair of stable handles into it rather than
//! owning its own text. Rendering a node back to source is just
//! concatenating the tokens its span covers — see the `format` module
//! for both the exact and canonically-reformatted renderings.
//!
//! # Pipeline
//!
//! ```text
//! bytes --Lexer::tokenize--> TokenStream --Parser::parse--> YaraFile
//! ```
//!
//! [Lexer::tokenize] turns a byte slice into a complete [TokenStream] or
//! a [LexicalError]; it never stops partway. [Parser::parse] then walks
//! that stream once, building a [YaraFile] while resolving identifiers
//! against a [SymbolTable] seeded from [modules::catalog]. An
//! [ObservingVisitor] or [ModifyingVisitor] can then traverse or rewrite
//! a rule's condition; the builder API constructs new trees without
//! parsing at all.
//!
//! # Example
//!
//! ```
//! use yara_ast::{ImportFeatures, Parser};
//!
//! let source = br#"
//! rule silent_banker : banker
//! {
//!     meta:
//!         description = "This is just an example"
//!     strings:
//!         $a = {6A 40 68 00 30 00 00 6A 14 8D 91}
//!         $b = "banker"
//!     condition:
//!         $a or $b
//! }
//! "#;
//!
//! let file = Parser::parse(source, ImportFeatures::Everything).unwrap();
//! assert_eq!(file.rules.len(), 1);
//! assert_eq!(file.text(), String::from_utf8_lossy(source));
//! ```

mod builder;
mod error;
mod expr;
mod format;
mod hex_string;
mod lexer;
mod literal;
pub mod modules;
mod parser;
mod regexp;
mod rule;
mod symbol;
mod token;
mod token_stream;
mod util;
mod visitor;

pub use builder::{conjunction, disjunction, ExprBuilder, YaraFileBuilder, YaraRuleBuilder};
pub use error::{BuilderError, LexicalError, ParserError, SemanticError, SyntaxError};
pub use expr::{BoxExpr, Expression, Span};
pub use format::print_tree;
pub use hex_string::{HexString, HexToken, Nibble};
pub use lexer::Lexer;
pub use literal::Literal;
pub use parser::Parser;
pub use regexp::{CharClass, Regexp, RegexpLiteral, RegexpParser, Shorthand};
pub use rule::{Import, Meta, Rule, RuleModifier, StringDefinition, StringModifiers, StringValue, YaraFile};
pub use symbol::{DataType, FunctionSignature, ImportFeatures, Symbol, SymbolKind, SymbolTable};
pub use token::{Token, TokenKind};
pub use token_stream::{TokenPtr, TokenStream};
pub use util::{Code, Position};
pub use visitor::{default_observe, modify, ModifyingVisitor, ObservingVisitor, VisitAction};
