//! Top-level recursive-descent parser. Consumes
//! the [TokenStream] produced by [crate::lexer::Lexer] and builds a
//! [YaraFile], resolving module/rule identifiers against a [SymbolTable]
//! as it goes.
//!
//! Lexing runs eagerly and completely before parsing starts, so a
//! [SyntaxError]/[SemanticError] raised here never loses token data: the
//! caller always has the full, already-tokenized source available by
//! tokenizing it again.

use crate::error::{ParserError, SemanticError, SyntaxError};
use crate::expr::{BoxExpr, Expression, Span};
use crate::hex_string::HexString;
use crate::lexer::Lexer;
use crate::literal::Literal;
use crate::modules;
use crate::regexp::RegexpParser;
use crate::rule::{Import, Meta, Rule, RuleModifier, StringDefinition, StringModifiers, StringValue};
use crate::symbol::{ImportFeatures, Symbol, SymbolTable};
use crate::token::TokenKind;
use crate::token_stream::{TokenPtr, TokenStream};
use crate::util::{Code, Position};
use crate::rule::YaraFile;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub struct Parser<'c> {
    tokens: TokenStream,
    cur: Option<TokenPtr>,
    offset: usize,
    code: Code<'c>,
    symbols: SymbolTable,
    modules: HashMap<String, Rc<Symbol>>,
    current_strings: HashSet<String>,
    local_vars: Vec<String>,
}

impl<'c> Parser<'c> {
    pub fn parse(source: &'c [u8], features: ImportFeatures) -> Result<YaraFile, ParserError> {
        let tokens = Lexer::tokenize(source)?;
        let mut parser = Parser {
            tokens,
            cur: None,
            offset: 0,
            code: Code::new(source),
            symbols: SymbolTable::new(),
            modules: modules::catalog(features),
            current_strings: HashSet::new(),
            local_vars: Vec::new(),
        };
        parser.cur = parser.tokens.head();
        parser.skip_trivia();

        let mut imports = Vec::new();
        while parser.at(TokenKind::Import) {
            imports.push(parser.parse_import()?);
        }

        let mut rules = Vec::new();
        while !parser.at_eof() {
            let rule = parser.parse_rule()?;
            parser.symbols.insert(Symbol::scalar(rule.name.clone(), crate::symbol::DataType::Bool));
            rules.push(rule);
        }

        Ok(YaraFile { tokens: parser.tokens, imports, rules, symbols: parser.symbols })
    }

    // --- token cursor -----------------------------------------------

    fn skip_trivia(&mut self) {
        while let Some(p) = self.cur {
            let tok = self.tokens.get(p);
            if tok.kind.is_trivia() {
                self.offset += tok.text.len();
                self.cur = self.tokens.next(p);
            } else {
                break;
            }
        }
    }

    fn bump(&mut self) -> TokenPtr {
        let p = self.cur.expect("bump called at end of input");
        self.offset += self.tokens.get(p).text.len();
        self.cur = self.tokens.next(p);
        self.skip_trivia();
        p
    }

    fn cur_kind(&self) -> TokenKind {
        self.cur.map(|p| self.tokens.get(p).kind).unwrap_or(TokenKind::Eof)
    }
    fn at(&self, kind: TokenKind) -> bool {
        self.cur_kind() == kind
    }
    fn at_eof(&self) -> bool {
        self.cur.is_none()
    }

    /// Kind of the first non-trivia token strictly after `ptr`, without
    /// moving the cursor. Used for the handful of constructs (numeric
    /// `of`-quantifiers) that need one token of lookahead beyond `cur`.
    fn peek_ahead(&self, ptr: Option<TokenPtr>) -> Option<TokenKind> {
        let mut p = ptr?;
        loop {
            p = self.tokens.next(p)?;
            let tok = self.tokens.get(p);
            if !tok.kind.is_trivia() {
                return Some(tok.kind);
            }
        }
    }

    fn position(&self) -> Position {
        self.code.obtain_position(self.offset)
    }
    fn syntax_err(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.position(), message)
    }
    fn semantic_err(&self, message: impl Into<String>) -> SemanticError {
        SemanticError::new(self.position(), message)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<TokenPtr, ParserError> {
        if self.cur_kind() == kind {
            Ok(self.bump())
        } else {
            Err(self.syntax_err(format!("expected {:?}, found {:?}", kind, self.cur_kind())).into())
        }
    }

    // --- top level -----------------------------------------------------

    fn parse_import(&mut self) -> Result<Import, ParserError> {
        let first = self.expect(TokenKind::Import)?;
        let str_ptr = self.expect(TokenKind::StringLiteral)?;
        let name = match &self.tokens.get(str_ptr).literal {
            Some(Literal::Str { escaped, .. }) => escaped.clone(),
            _ => return Err(self.syntax_err("expected string literal after 'import'").into()),
        };
        let last = str_ptr;
        match self.modules.get(&name) {
            Some(sym) => self.symbols.insert(sym.clone()),
            None => return Err(self.semantic_err(format!("unknown module '{}'", name)).into()),
        }
        Ok(Import { span: Span::new(first, last), name })
    }

    fn parse_rule(&mut self) -> Result<Rule, ParserError> {
        let mut first = self.cur;
        let mut private = false;
        let mut global = false;
        loop {
            match self.cur_kind() {
                TokenKind::Private => {
                    private = true;
                    self.bump();
                }
                TokenKind::Global => {
                    global = true;
                    self.bump();
                }
                _ => break,
            }
        }
        let rule_kw = self.expect(TokenKind::Rule)?;
        let first = first.take().unwrap_or(rule_kw);
        let modifier = match (private, global) {
            (true, true) => RuleModifier::PrivateGlobal,
            (true, false) => RuleModifier::Private,
            (false, true) => RuleModifier::Global,
            (false, false) => RuleModifier::Empty,
        };

        let name_ptr = self.expect(TokenKind::Identifier)?;
        let name = self.tokens.get(name_ptr).text.clone();

        let mut tags = Vec::new();
        if self.at(TokenKind::Colon) {
            self.bump();
            while self.at(TokenKind::Identifier) {
                let p = self.bump();
                tags.push(self.tokens.get(p).text.clone());
            }
        }

        self.expect(TokenKind::LBrace)?;

        let mut metas = Vec::new();
        if self.at(TokenKind::Meta) {
            self.bump();
            self.expect(TokenKind::Colon)?;
            while self.at(TokenKind::Identifier) {
                metas.push(self.parse_meta()?);
            }
        }

        let mut strings = Vec::new();
        if self.at(TokenKind::Strings) {
            self.bump();
            self.expect(TokenKind::Colon)?;
            while self.at(TokenKind::StringId) {
                strings.push(self.parse_string_def()?);
            }
        }

        self.current_strings = strings.iter().map(|s| s.id.clone()).collect();
        self.expect(TokenKind::Condition)?;
        self.expect(TokenKind::Colon)?;
        let condition = self.parse_expression()?;
        self.current_strings.clear();

        let rbrace = self.expect(TokenKind::RBrace)?;
        Ok(Rule { span: Span::new(first, rbrace), modifier, name, tags, metas, strings, condition })
    }

    fn parse_meta(&mut self) -> Result<Meta, ParserError> {
        let key_ptr = self.bump();
        let key = self.tokens.get(key_ptr).text.clone();
        self.expect(TokenKind::Assign)?;
        let (value, last) = match self.cur_kind() {
            TokenKind::StringLiteral => {
                let p = self.bump();
                (self.tokens.get(p).literal.clone().unwrap(), p)
            }
            TokenKind::IntegerLiteral => {
                let p = self.bump();
                (self.tokens.get(p).literal.clone().unwrap(), p)
            }
            TokenKind::Minus => {
                self.bump();
                let p = self.expect(TokenKind::IntegerLiteral)?;
                let negated = match &self.tokens.get(p).literal {
                    Some(Literal::Int { value, text }) => Literal::Int { value: -value, text: format!("-{}", text) },
                    _ => return Err(self.syntax_err("expected integer after '-'").into()),
                };
                (negated, p)
            }
            TokenKind::True => {
                let p = self.bump();
                (Literal::Bool(true), p)
            }
            TokenKind::False => {
                let p = self.bump();
                (Literal::Bool(false), p)
            }
            _ => return Err(self.syntax_err("expected a meta value").into()),
        };
        Ok(Meta { span: Span::new(key_ptr, last), key, value })
    }

    fn parse_string_def(&mut self) -> Result<StringDefinition, ParserError> {
        let id_ptr = self.expect(TokenKind::StringId)?;
        let id = self.tokens.get(id_ptr).text.clone();
        self.expect(TokenKind::Assign)?;

        let (value, mut last) = match self.cur_kind() {
            TokenKind::StringLiteral => {
                let p = self.bump();
                let raw = match &self.tokens.get(p).literal {
                    Some(Literal::Str { raw, .. }) => raw.clone(),
                    _ => Vec::new(),
                };
                (StringValue::Plain(raw), p)
            }
            TokenKind::HexStringBody => {
                let pos = self.position();
                let p = self.bump();
                let text = self.tokens.get(p).text.clone();
                let hex = HexString::parse(&text, pos.line, pos.column)?;
                (StringValue::Hex(hex), p)
            }
            TokenKind::RegexpLiteral => {
                let pos = self.position();
                let p = self.bump();
                let text = self.tokens.get(p).text.clone();
                let re = RegexpParser::parse(&text, pos.line, pos.column)?;
                (StringValue::Regexp(re), p)
            }
            _ => return Err(self.syntax_err("expected a string value").into()),
        };

        let mut modifiers = StringModifiers::default();
        loop {
            match self.cur_kind() {
                TokenKind::Ascii => {
                    modifiers.ascii = true;
                    last = self.bump();
                }
                TokenKind::Wide => {
                    modifiers.wide = true;
                    last = self.bump();
                }
                TokenKind::Nocase => {
                    modifiers.nocase = true;
                    last = self.bump();
                }
                TokenKind::Fullword => {
                    modifiers.fullword = true;
                    last = self.bump();
                }
                TokenKind::Private => {
                    modifiers.private = true;
                    last = self.bump();
                }
                TokenKind::Xor => {
                    modifiers.xor = true;
                    last = self.bump();
                }
                _ => break,
            }
        }
        Ok(StringDefinition { span: Span::new(id_ptr, last), id, value, modifiers })
    }

    // --- expressions -----------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expression, ParserError> {
        self.parse_or()
    }

    fn parse_left_assoc(
        &mut self,
        next: fn(&mut Self) -> Result<Expression, ParserError>,
        ops: &[(TokenKind, fn(Span, BoxExpr, BoxExpr) -> Expression)],
    ) -> Result<Expression, ParserError> {
        let mut left = next(self)?;
        loop {
            let kind = self.cur_kind();
            let Some((_, make)) = ops.iter().find(|(k, _)| *k == kind) else { break };
            let first = left.span().first;
            self.bump();
            let right = next(self)?;
            let span = Span::new(first, right.span().last);
            left = make(span, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expression, ParserError> {
        self.parse_left_assoc(
            Self::parse_and,
            &[(TokenKind::Or, |s, l, r| Expression::Or { span: s, left: l, right: r, left_comment: None, right_comment: None })],
        )
    }

    fn parse_and(&mut self) -> Result<Expression, ParserError> {
        self.parse_left_assoc(
            Self::parse_not,
            &[(TokenKind::And, |s, l, r| Expression::And { span: s, left: l, right: r, left_comment: None, right_comment: None })],
        )
    }

    fn parse_not(&mut self) -> Result<Expression, ParserError> {
        if self.at(TokenKind::Not) {
            let first = self.bump();
            let operand = self.parse_not()?;
            let span = Span::new(first, operand.span().last);
            return Ok(Expression::Not { span, operand: Box::new(operand) });
        }
        if self.at(TokenKind::For) {
            return self.parse_for();
        }
        if self.at(TokenKind::All) || self.at(TokenKind::Any) {
            let quantifier = self.parse_postfix()?;
            if self.at(TokenKind::Of) {
                self.bump();
                let iterated_set = self.parse_postfix()?;
                let span = Span::new(quantifier.span().first, iterated_set.span().last);
                return Ok(Expression::Of { span, variable: Box::new(quantifier), iterated_set: Box::new(iterated_set) });
            }
            return Ok(quantifier);
        }
        if self.at(TokenKind::IntegerLiteral) && self.peek_ahead(self.cur) == Some(TokenKind::Of) {
            let quantifier = self.parse_postfix()?;
            self.expect(TokenKind::Of)?;
            let iterated_set = self.parse_postfix()?;
            let span = Span::new(quantifier.span().first, iterated_set.span().last);
            return Ok(Expression::Of { span, variable: Box::new(quantifier), iterated_set: Box::new(iterated_set) });
        }
        self.parse_relational()
    }

    fn parse_for(&mut self) -> Result<Expression, ParserError> {
        let first = self.expect(TokenKind::For)?;
        let numeric_quantifier = matches!(self.cur_kind(), TokenKind::All | TokenKind::Any)
            || (self.at(TokenKind::IntegerLiteral) && self.peek_ahead(self.cur) == Some(TokenKind::Of));

        if numeric_quantifier {
            let quantifier = self.parse_postfix()?;
            self.expect(TokenKind::Of)?;
            let iterated_set = self.parse_postfix()?;
            self.expect(TokenKind::Colon)?;
            self.expect(TokenKind::LParen)?;
            let body = self.parse_expression()?;
            let rp = self.expect(TokenKind::RParen)?;
            let span = Span::new(first, rp);
            return Ok(Expression::ForInt {
                span,
                variable: quantifier.text(&self.tokens),
                iterated_set: Box::new(iterated_set),
                body: Box::new(body),
            });
        }

        let var_ptr = self.expect(TokenKind::Identifier)?;
        let variable = self.tokens.get(var_ptr).text.clone();
        self.expect(TokenKind::In)?;
        let iterated_set = self.parse_postfix()?;
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::LParen)?;
        self.local_vars.push(variable.clone());
        let body = self.parse_expression();
        self.local_vars.pop();
        let body = body?;
        let rp = self.expect(TokenKind::RParen)?;
        let span = Span::new(first, rp);
        Ok(Expression::ForString { span, variable, iterated_set: Box::new(iterated_set), body: Box::new(body) })
    }

    fn parse_relational(&mut self) -> Result<Expression, ParserError> {
        self.parse_left_assoc(
            Self::parse_bitor,
            &[
                (TokenKind::Lt, |s, l, r| Expression::Lt { span: s, left: l, right: r }),
                (TokenKind::Le, |s, l, r| Expression::Le { span: s, left: l, right: r }),
                (TokenKind::Gt, |s, l, r| Expression::Gt { span: s, left: l, right: r }),
                (TokenKind::Ge, |s, l, r| Expression::Ge { span: s, left: l, right: r }),
                (TokenKind::Equals, |s, l, r| Expression::Eq { span: s, left: l, right: r }),
                (TokenKind::NotEquals, |s, l, r| Expression::Neq { span: s, left: l, right: r }),
                (TokenKind::Contains, |s, l, r| Expression::Contains { span: s, left: l, right: r }),
                (TokenKind::IContains, |s, l, r| Expression::IContains { span: s, left: l, right: r }),
                (TokenKind::Matches, |s, l, r| Expression::Matches { span: s, left: l, right: r }),
            ],
        )
    }

    fn parse_bitor(&mut self) -> Result<Expression, ParserError> {
        self.parse_left_assoc(Self::parse_bitxor, &[(TokenKind::Pipe, |s, l, r| Expression::BitwiseOr { span: s, left: l, right: r })])
    }
    fn parse_bitxor(&mut self) -> Result<Expression, ParserError> {
        self.parse_left_assoc(Self::parse_bitand, &[(TokenKind::Caret, |s, l, r| Expression::BitwiseXor { span: s, left: l, right: r })])
    }
    fn parse_bitand(&mut self) -> Result<Expression, ParserError> {
        self.parse_left_assoc(Self::parse_shift, &[(TokenKind::Amp, |s, l, r| Expression::BitwiseAnd { span: s, left: l, right: r })])
    }
    fn parse_shift(&mut self) -> Result<Expression, ParserError> {
        self.parse_left_assoc(
            Self::parse_additive,
            &[
                (TokenKind::Shl, |s, l, r| Expression::ShiftLeft { span: s, left: l, right: r }),
                (TokenKind::Shr, |s, l, r| Expression::ShiftRight { span: s, left: l, right: r }),
            ],
        )
    }
    fn parse_additive(&mut self) -> Result<Expression, ParserError> {
        self.parse_left_assoc(
            Self::parse_multiplicative,
            &[
                (TokenKind::Plus, |s, l, r| Expression::Plus { span: s, left: l, right: r }),
                (TokenKind::Minus, |s, l, r| Expression::Minus { span: s, left: l, right: r }),
            ],
        )
    }
    fn parse_multiplicative(&mut self) -> Result<Expression, ParserError> {
        self.parse_left_assoc(
            Self::parse_unary,
            &[
                (TokenKind::Star, |s, l, r| Expression::Multiply { span: s, left: l, right: r }),
                (TokenKind::Backslash, |s, l, r| Expression::Divide { span: s, left: l, right: r }),
                (TokenKind::Percent, |s, l, r| Expression::Modulo { span: s, left: l, right: r }),
            ],
        )
    }

    fn parse_unary(&mut self) -> Result<Expression, ParserError> {
        match self.cur_kind() {
            TokenKind::Minus => {
                let first = self.bump();
                let operand = self.parse_unary()?;
                let span = Span::new(first, operand.span().last);
                Ok(Expression::UnaryMinus { span, operand: Box::new(operand) })
            }
            TokenKind::Tilde => {
                let first = self.bump();
                let operand = self.parse_unary()?;
                let span = Span::new(first, operand.span().last);
                Ok(Expression::BitwiseNot { span, operand: Box::new(operand) })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParserError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.cur_kind() {
                TokenKind::Dot => {
                    self.bump();
                    let name_ptr = self.expect(TokenKind::Identifier)?;
                    let attribute = self.tokens.get(name_ptr).text.clone();
                    let symbol = self.resolve_attribute(&expr, &attribute);
                    let span = Span::new(expr.span().first, name_ptr);
                    expr = Expression::StructAccess { span, base: Box::new(expr), attribute, symbol };
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index_expr = self.parse_expression()?;
                    let rb = self.expect(TokenKind::RBracket)?;
                    let symbol = self.resolve_array(&expr);
                    let span = Span::new(expr.span().first, rb);
                    expr = Expression::ArrayAccess { span, base: Box::new(expr), index_expr: Box::new(index_expr), symbol };
                }
                TokenKind::LParen => {
                    self.bump();
                    let mut arguments = Vec::new();
                    if !self.at(TokenKind::RParen) {
                        arguments.push(self.parse_expression()?);
                        while self.at(TokenKind::Comma) {
                            self.bump();
                            arguments.push(self.parse_expression()?);
                        }
                    }
                    let rp = self.expect(TokenKind::RParen)?;
                    let symbol = self.resolve_function(&expr);
                    let span = Span::new(expr.span().first, rp);
                    expr = Expression::FunctionCall { span, function: Box::new(expr), arguments, symbol };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn base_symbol(expr: &Expression) -> Option<Rc<Symbol>> {
        match expr {
            Expression::Id { symbol, .. }
            | Expression::StructAccess { symbol, .. }
            | Expression::ArrayAccess { symbol, .. }
            | Expression::FunctionCall { symbol, .. } => symbol.clone(),
            _ => None,
        }
    }
    fn resolve_attribute(&self, base: &Expression, name: &str) -> Option<Rc<Symbol>> {
        Self::base_symbol(base)?.get_attribute(name)
    }
    fn resolve_array(&self, base: &Expression) -> Option<Rc<Symbol>> {
        Self::base_symbol(base)
    }
    fn resolve_function(&self, callee: &Expression) -> Option<Rc<Symbol>> {
        Self::base_symbol(callee)
    }

    fn check_string_id(&self, token_text: &str) -> Result<(), ParserError> {
        if token_text.ends_with('*') {
            return Ok(());
        }
        let normalized = format!("${}", &token_text[1..]);
        if self.current_strings.contains(&normalized) {
            Ok(())
        } else {
            Err(self.semantic_err(format!("undefined string '{}'", normalized)).into())
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, ParserError> {
        match self.cur_kind() {
            TokenKind::True => {
                let p = self.bump();
                Ok(Expression::BoolLiteral { span: Span::new(p, p), value: true })
            }
            TokenKind::False => {
                let p = self.bump();
                Ok(Expression::BoolLiteral { span: Span::new(p, p), value: false })
            }
            TokenKind::IntegerLiteral => {
                let p = self.bump();
                let (value, text) = match &self.tokens.get(p).literal {
                    Some(Literal::Int { value, text }) => (*value, text.clone()),
                    _ => (0, String::new()),
                };
                Ok(Expression::IntLiteral { span: Span::new(p, p), value, text })
            }
            TokenKind::DoubleLiteral => {
                let p = self.bump();
                let text = self.tokens.get(p).text.clone();
                let value: f64 = text.parse().unwrap_or(0.0);
                Ok(Expression::DoubleLiteral { span: Span::new(p, p), value })
            }
            TokenKind::StringLiteral => {
                let p = self.bump();
                let value = match &self.tokens.get(p).literal {
                    Some(Literal::Str { raw, .. }) => raw.clone(),
                    _ => Vec::new(),
                };
                Ok(Expression::StringLiteral { span: Span::new(p, p), value })
            }
            TokenKind::RegexpLiteral => {
                let pos = self.position();
                let p = self.bump();
                let text = self.tokens.get(p).text.clone();
                let regexp_string = RegexpParser::parse(&text, pos.line, pos.column)?;
                Ok(Expression::Regexp { span: Span::new(p, p), regexp_string })
            }
            TokenKind::Filesize => {
                let p = self.bump();
                Ok(Expression::Filesize { span: Span::new(p, p) })
            }
            TokenKind::Entrypoint => {
                let p = self.bump();
                Ok(Expression::Entrypoint { span: Span::new(p, p) })
            }
            TokenKind::All => {
                let p = self.bump();
                Ok(Expression::All { span: Span::new(p, p) })
            }
            TokenKind::Any => {
                let p = self.bump();
                Ok(Expression::Any { span: Span::new(p, p) })
            }
            TokenKind::Them => {
                let p = self.bump();
                Ok(Expression::Them { span: Span::new(p, p) })
            }
            TokenKind::StringIdWildcard => {
                let p = self.bump();
                let text = self.tokens.get(p).text.clone();
                let prefix = text.trim_end_matches('*').to_string();
                Ok(Expression::StringWildcard { span: Span::new(p, p), prefix })
            }
            TokenKind::StringId => {
                let p = self.bump();
                let id = self.tokens.get(p).text.clone();
                self.check_string_id(&id)?;
                if self.at(TokenKind::At) {
                    self.bump();
                    let at_expr = self.parse_bitor()?;
                    let span = Span::new(p, at_expr.span().last);
                    return Ok(Expression::StringAt { span, id, at_expr: Box::new(at_expr) });
                }
                if self.at(TokenKind::In) {
                    self.bump();
                    let range_expr = self.parse_postfix()?;
                    let span = Span::new(p, range_expr.span().last);
                    return Ok(Expression::StringInRange { span, id, range_expr: Box::new(range_expr) });
                }
                Ok(Expression::String { span: Span::new(p, p), id })
            }
            TokenKind::StringCount => {
                let p = self.bump();
                let id = self.tokens.get(p).text.clone();
                self.check_string_id(&id)?;
                Ok(Expression::StringCount { span: Span::new(p, p), id })
            }
            TokenKind::StringOffset => {
                let p = self.bump();
                let id = self.tokens.get(p).text.clone();
                self.check_string_id(&id)?;
                let (index_expr, last) = self.parse_optional_index(p)?;
                Ok(Expression::StringOffset { span: Span::new(p, last), id, index_expr })
            }
            TokenKind::StringLength => {
                let p = self.bump();
                let id = self.tokens.get(p).text.clone();
                self.check_string_id(&id)?;
                let (index_expr, last) = self.parse_optional_index(p)?;
                Ok(Expression::StringLength { span: Span::new(p, last), id, index_expr })
            }
            TokenKind::Int8
            | TokenKind::Int16
            | TokenKind::Int32
            | TokenKind::Int8be
            | TokenKind::Int16be
            | TokenKind::Int32be
            | TokenKind::Uint8
            | TokenKind::Uint16
            | TokenKind::Uint32
            | TokenKind::Uint8be
            | TokenKind::Uint16be
            | TokenKind::Uint32be => {
                let p = self.bump();
                let function_name = self.tokens.get(p).text.clone();
                self.expect(TokenKind::LParen)?;
                let argument = self.parse_expression()?;
                let rp = self.expect(TokenKind::RParen)?;
                Ok(Expression::IntFunction { span: Span::new(p, rp), function_name, argument: Box::new(argument) })
            }
            TokenKind::Identifier => {
                let p = self.bump();
                let name = self.tokens.get(p).text.clone();
                let symbol = if self.local_vars.iter().any(|v| v == &name) {
                    None
                } else {
                    match self.symbols.find(&name) {
                        Some(s) => Some(s),
                        None => return Err(self.semantic_err(format!("unknown identifier '{}'", name)).into()),
                    }
                };
                Ok(Expression::Id { span: Span::new(p, p), name, symbol })
            }
            TokenKind::LParen => {
                let lp = self.bump();
                let first_expr = self.parse_expression()?;
                if self.at(TokenKind::Dash) {
                    self.bump();
                    let high = self.parse_expression()?;
                    let rp = self.expect(TokenKind::RParen)?;
                    return Ok(Expression::Range { span: Span::new(lp, rp), low: Box::new(first_expr), high: Box::new(high) });
                }
                if self.at(TokenKind::Comma) {
                    let mut elements = vec![first_expr];
                    while self.at(TokenKind::Comma) {
                        self.bump();
                        elements.push(self.parse_expression()?);
                    }
                    let rp = self.expect(TokenKind::RParen)?;
                    return Ok(Expression::Set { span: Span::new(lp, rp), elements });
                }
                let rp = self.expect(TokenKind::RParen)?;
                Ok(Expression::Parentheses { span: Span::new(lp, rp), enclosed_expr: Box::new(first_expr) })
            }
            other => Err(self.syntax_err(format!("unexpected token {:?} in expression", other)).into()),
        }
    }

    fn parse_optional_index(&mut self, start: TokenPtr) -> Result<(Option<BoxExpr>, TokenPtr), ParserError> {
        if self.at(TokenKind::LBracket) {
            self.bump();
            let idx = self.parse_expression()?;
            let rb = self.expect(TokenKind::RBracket)?;
            Ok((Some(Box::new(idx)), rb))
        } else {
            Ok((None, start))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expression;

    fn parse(src: &str) -> YaraFile {
        Parser::parse(src.as_bytes(), ImportFeatures::Everything).unwrap()
    }

    #[test]
    fn exact_text_round_trips_whitespace_and_comments() {
        let src = "rule foo // a comment\n{\n\tcondition:\n\t\ttrue\n}\n";
        let file = parse(src);
        assert_eq!(file.text(), src);
    }

    #[test]
    fn rule_modifiers() {
        assert_eq!(parse("rule r { condition: true }").rules[0].modifier, RuleModifier::Empty);
        assert_eq!(parse("private rule r { condition: true }").rules[0].modifier, RuleModifier::Private);
        assert_eq!(parse("global rule r { condition: true }").rules[0].modifier, RuleModifier::Global);
        assert_eq!(parse("private global rule r { condition: true }").rules[0].modifier, RuleModifier::PrivateGlobal);
    }

    #[test]
    fn tags_are_collected_in_order() {
        let file = parse("rule r : t1 t2 { condition: true }");
        assert_eq!(file.rules[0].tags, vec!["t1", "t2"]);
    }

    #[test]
    fn meta_section_values() {
        let file = parse(
            r#"rule r {
                meta:
                    a = "x"
                    b = 5
                    c = -5
                    d = true
                condition:
                    true
            }"#,
        );
        let metas = &file.rules[0].metas;
        assert_eq!(metas.len(), 4);
        assert!(metas[0].value.is_string());
        assert!(matches!(&metas[1].value, crate::literal::Literal::Int { value: 5, .. }));
        assert!(matches!(&metas[2].value, crate::literal::Literal::Int { value: -5, .. }));
        assert_eq!(metas[3].value, crate::literal::Literal::Bool(true));
    }

    #[test]
    fn plain_hex_and_regexp_strings_with_modifiers() {
        let file = parse(
            r#"rule r {
                strings:
                    $a = "foo" ascii wide nocase
                    $b = { 01 02 ?? }
                    $c = /abc/i
                condition:
                    all of them
            }"#,
        );
        let strings = &file.rules[0].strings;
        assert_eq!(strings.len(), 3);
        assert!(strings[0].modifiers.ascii && strings[0].modifiers.wide && strings[0].modifiers.nocase);
        assert!(matches!(&strings[1].value, StringValue::Hex(_)));
        assert!(matches!(&strings[2].value, StringValue::Regexp(_)));
    }

    #[test]
    fn condition_operator_precedence() {
        let file = parse("rule r { condition: 1 + 2 * 3 == 7 and not false }");
        match &file.rules[0].condition {
            Expression::And { left, right, .. } => {
                assert!(matches!(**left, Expression::Eq { .. }));
                assert!(matches!(**right, Expression::Not { .. }));
            }
            other => panic!("expected And at top level, got {:?}", other),
        }
    }

    #[test]
    fn string_references_at_and_in() {
        let file = parse(
            r#"rule r {
                strings:
                    $a = "x"
                condition:
                    $a at 0 and $a in (0..10)
            }"#,
        );
        match &file.rules[0].condition {
            Expression::And { left, right, .. } => {
                assert!(matches!(**left, Expression::StringAt { .. }));
                assert!(matches!(**right, Expression::StringInRange { .. }));
            }
            other => panic!("unexpected condition shape {:?}", other),
        }
    }

    #[test]
    fn undeclared_string_reference_is_semantic_error() {
        let err = Parser::parse(b"rule r { condition: $a }", ImportFeatures::Everything);
        assert!(matches!(err, Err(ParserError::Semantic(_))));
    }

    #[test]
    fn string_wildcard_skips_declaration_check() {
        let file = parse(r#"rule r { strings: $a1 = "x" condition: for any of ($a*) : (true) }"#);
        assert!(file.rules[0].condition.text(&file.tokens).contains("$a*"));
    }

    #[test]
    fn for_string_binds_loop_variable() {
        let file = parse("rule r { condition: for s in (1,2,3) : (s > 1) }");
        assert!(matches!(file.rules[0].condition, Expression::ForString { .. }));
    }

    #[test]
    fn for_int_quantifier_of_set() {
        let file = parse(
            r#"rule r {
                strings:
                    $a = "x"
                    $b = "y"
                condition:
                    for all of ($a, $b) : (true)
            }"#,
        );
        assert!(matches!(file.rules[0].condition, Expression::ForInt { .. }));
        let file2 = parse("rule r { condition: 2 of (true, false, true) }");
        assert!(matches!(file2.rules[0].condition, Expression::Of { .. }));
    }

    #[test]
    fn module_struct_array_and_function_access_resolve_symbols() {
        let file = parse(
            r#"import "pe"
            rule r {
                condition:
                    pe.sections[0].name == "x" and pe.iconhash() != ""
            }"#,
        );
        match &file.rules[0].condition {
            Expression::And { left, .. } => match &**left {
                Expression::Eq { left, .. } => assert!(matches!(**left, Expression::StructAccess { .. })),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_module_is_semantic_error() {
        let err = Parser::parse(br#"import "not_a_module""#, ImportFeatures::Everything);
        assert!(matches!(err, Err(ParserError::Semantic(_))));
    }

    #[test]
    fn unknown_identifier_is_semantic_error() {
        let err = Parser::parse(b"rule r { condition: not_declared }", ImportFeatures::Everything);
        assert!(matches!(err, Err(ParserError::Semantic(_))));
    }

    #[test]
    fn later_rule_can_reference_earlier_rule_as_boolean_symbol() {
        let file = parse("rule a { condition: true } rule b { condition: a }");
        assert!(matches!(file.rules[1].condition, Expression::Id { .. }));
    }

    #[test]
    fn malformed_rule_is_syntax_error() {
        let err = Parser::parse(b"rule r { condition: }", ImportFeatures::Everything);
        assert!(matches!(err, Err(ParserError::Syntax(_))));
    }

    #[test]
    fn malformed_hex_string_propagates_lexical_or_syntax_error() {
        let err = Parser::parse(
            br#"rule r { strings: $a = { Z1 } condition: true }"#,
            ImportFeatures::Everything,
        );
        assert!(err.is_err());
    }
}
