//! Fluent construction of [YaraFile]/[Rule]/[Expression] trees without
//! parsing. Every builder keeps a private [TokenStream]; the moment a
//! built node is attached to a destination tree, its tokens are spliced
//! into the destination's stream and every [Span] inside it is remapped
//! to the new handles.

use crate::expr::{BoxExpr, Expression, Span};
use crate::hex_string::HexString;
use crate::literal::{escape_bytes, Literal};
use crate::regexp::{RegexpLiteral, RegexpParser};
use crate::rule::{Import, Meta, Rule, RuleModifier, StringDefinition, StringModifiers, StringValue, YaraFile};
use crate::token::{Token, TokenKind};
use crate::token_stream::{TokenPtr, TokenStream};
use std::collections::HashMap;

pub(crate) fn remap_spans(expr: &mut Expression, remap: &HashMap<TokenPtr, TokenPtr>) {
    {
        let span = expr.span_mut();
        if let Some(&nf) = remap.get(&span.first) {
            span.first = nf;
        }
        if let Some(&nl) = remap.get(&span.last) {
            span.last = nl;
        }
    }
    if let Some(l) = expr.left_operand_mut() {
        remap_spans(l, remap);
    }
    if let Some(r) = expr.right_operand_mut() {
        remap_spans(r, remap);
    }
    if let Some(o) = expr.operand_mut() {
        remap_spans(o, remap);
    }
    if let Some(e) = expr.enclosed_expr_mut() {
        remap_spans(e, remap);
    }
    match expr {
        Expression::StringAt { at_expr, .. } => remap_spans(at_expr, remap),
        Expression::StringInRange { range_expr, .. } => remap_spans(range_expr, remap),
        Expression::StringOffset { index_expr, .. } | Expression::StringLength { index_expr, .. } => {
            if let Some(i) = index_expr {
                remap_spans(i, remap);
            }
        }
        Expression::ForInt { iterated_set, body, .. } | Expression::ForString { iterated_set, body, .. } => {
            remap_spans(iterated_set, remap);
            remap_spans(body, remap);
        }
        Expression::Of { variable, iterated_set, .. } => {
            remap_spans(variable, remap);
            remap_spans(iterated_set, remap);
        }
        Expression::Set { elements, .. } => {
            for e in elements {
                remap_spans(e, remap);
            }
        }
        Expression::Range { low, high, .. } => {
            remap_spans(low, remap);
            remap_spans(high, remap);
        }
        Expression::StructAccess { base, .. } => remap_spans(base, remap),
        Expression::ArrayAccess { base, index_expr, .. } => {
            remap_spans(base, remap);
            remap_spans(index_expr, remap);
        }
        Expression::FunctionCall { function, arguments, .. } => {
            remap_spans(function, remap);
            for a in arguments {
                remap_spans(a, remap);
            }
        }
        Expression::IntFunction { argument, .. } => remap_spans(argument, remap),
        _ => {}
    }
}

/// Splice `src`'s private stream onto the tail of `dest` and return
/// `src`'s expression with every handle remapped into `dest`.
pub(crate) fn splice_into(dest: &mut TokenStream, mut src: ExprBuilder) -> Expression {
    if let (Some(first), Some(last)) = (src.tokens.head(), src.tokens.tail()) {
        let remap = dest.splice_from(None, &src.tokens, first, last);
        remap_spans(&mut src.expr, &remap);
    }
    src.expr
}

/// A fluent expression under construction. Owns a private token stream
/// until it's attached to a [YaraRuleBuilder] or another `ExprBuilder`.
pub struct ExprBuilder {
    tokens: TokenStream,
    expr: Expression,
}

impl ExprBuilder {
    fn leaf(kind: TokenKind, text: impl Into<String>, make: impl FnOnce(Span) -> Expression) -> Self {
        let mut tokens = TokenStream::new();
        let p = tokens.push_back(Token::new(kind, text));
        Self { tokens, expr: make(Span::new(p, p)) }
    }

    pub fn boolean(value: bool) -> Self {
        let (kind, text) = if value { (TokenKind::True, "true") } else { (TokenKind::False, "false") };
        Self::leaf(kind, text, move |span| Expression::BoolLiteral { span, value })
    }
    pub fn int(value: i64) -> Self {
        let text = value.to_string();
        Self::leaf(TokenKind::IntegerLiteral, text.clone(), move |span| Expression::IntLiteral { span, value, text })
    }
    pub fn hex_int(value: i64) -> Self {
        let text = Literal::hex_int(value).text();
        Self::leaf(TokenKind::IntegerLiteral, text.clone(), move |span| Expression::IntLiteral { span, value, text })
    }
    pub fn double(value: f64) -> Self {
        let text = value.to_string();
        Self::leaf(TokenKind::DoubleLiteral, text, move |span| Expression::DoubleLiteral { span, value })
    }
    pub fn string_lit(raw: impl Into<Vec<u8>>) -> Self {
        let raw = raw.into();
        let text = format!("\"{}\"", escape_bytes(&raw));
        Self::leaf(TokenKind::StringLiteral, text, move |span| Expression::StringLiteral { span, value: raw })
    }
    pub fn id(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::leaf(TokenKind::Identifier, name.clone(), move |span| Expression::Id { span, name, symbol: None })
    }
    pub fn string_ref(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::leaf(TokenKind::StringId, id.clone(), move |span| Expression::String { span, id })
    }
    pub fn string_count(id: impl Into<String>) -> Self {
        let id = id.into();
        let text = format!("#{}", &id[1..]);
        Self::leaf(TokenKind::StringCount, text, move |span| Expression::StringCount { span, id })
    }
    pub fn filesize() -> Self {
        Self::leaf(TokenKind::Filesize, "filesize", |span| Expression::Filesize { span })
    }
    pub fn entrypoint() -> Self {
        Self::leaf(TokenKind::Entrypoint, "entrypoint", |span| Expression::Entrypoint { span })
    }
    pub fn them() -> Self {
        Self::leaf(TokenKind::Them, "them", |span| Expression::Them { span })
    }
    /// `regexp(text, "i")`-style literal, matching the constructor
    /// shape of `yaramod::YaraExpressionBuilder::regexp`.
    pub fn regexp(pattern: impl AsRef<str>, case_insensitive: bool) -> Self {
        let mut full = format!("/{}/", pattern.as_ref());
        if case_insensitive {
            full.push('i');
        }
        let regexp_string = RegexpParser::parse(&full, 1, 1).expect("builder-constructed regexp pattern must be valid");
        Self::leaf(TokenKind::RegexpLiteral, full, move |span| Expression::Regexp { span, regexp_string })
    }

    pub fn paren(mut self) -> Self {
        let lp = self.tokens.insert_before(self.tokens.head().unwrap(), Token::new(TokenKind::LParen, "("));
        let rp = self.tokens.push_back(Token::new(TokenKind::RParen, ")"));
        self.expr = Expression::Parentheses { span: Span::new(lp, rp), enclosed_expr: Box::new(self.expr) };
        self
    }

    fn unary(mut self, kind: TokenKind, text: &str, make: impl FnOnce(Span, BoxExpr) -> Expression) -> Self {
        let first = self.tokens.insert_before(self.tokens.head().unwrap(), Token::new(kind, text));
        let last = self.expr.span().last;
        self.expr = make(Span::new(first, last), Box::new(self.expr));
        self
    }
    pub fn negate(self) -> Self {
        self.unary(TokenKind::Minus, "-", |span, operand| Expression::UnaryMinus { span, operand })
    }
    pub fn bitwise_not(self) -> Self {
        self.unary(TokenKind::Tilde, "~", |span, operand| Expression::BitwiseNot { span, operand })
    }
    pub fn not(self) -> Self {
        self.unary(TokenKind::Not, "not ", |span, operand| Expression::Not { span, operand })
    }

    fn binary(mut self, op_kind: TokenKind, op_text: &str, rhs: ExprBuilder, make: impl FnOnce(Span, BoxExpr, BoxExpr) -> Expression) -> Self {
        self.tokens.push_back(Token::new(TokenKind::Whitespace, " "));
        self.tokens.push_back(Token::new(op_kind, op_text));
        self.tokens.push_back(Token::new(TokenKind::Whitespace, " "));
        let right = splice_into(&mut self.tokens, rhs);
        let first = self.expr.span().first;
        let last = right.span().last;
        self.expr = make(Span::new(first, last), Box::new(self.expr), Box::new(right));
        self
    }

    pub fn plus(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Plus, "+", rhs, |s, l, r| Expression::Plus { span: s, left: l, right: r })
    }
    pub fn minus(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Minus, "-", rhs, |s, l, r| Expression::Minus { span: s, left: l, right: r })
    }
    pub fn multiply(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Star, "*", rhs, |s, l, r| Expression::Multiply { span: s, left: l, right: r })
    }
    pub fn divide(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Backslash, "\\", rhs, |s, l, r| Expression::Divide { span: s, left: l, right: r })
    }
    pub fn modulo(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Percent, "%", rhs, |s, l, r| Expression::Modulo { span: s, left: l, right: r })
    }
    pub fn bitwise_and(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Amp, "&", rhs, |s, l, r| Expression::BitwiseAnd { span: s, left: l, right: r })
    }
    pub fn bitwise_or(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Pipe, "|", rhs, |s, l, r| Expression::BitwiseOr { span: s, left: l, right: r })
    }
    pub fn bitwise_xor(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Caret, "^", rhs, |s, l, r| Expression::BitwiseXor { span: s, left: l, right: r })
    }
    pub fn shift_left(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Shl, "<<", rhs, |s, l, r| Expression::ShiftLeft { span: s, left: l, right: r })
    }
    pub fn shift_right(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Shr, ">>", rhs, |s, l, r| Expression::ShiftRight { span: s, left: l, right: r })
    }
    pub fn lt(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Lt, "<", rhs, |s, l, r| Expression::Lt { span: s, left: l, right: r })
    }
    pub fn le(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Le, "<=", rhs, |s, l, r| Expression::Le { span: s, left: l, right: r })
    }
    pub fn gt(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Gt, ">", rhs, |s, l, r| Expression::Gt { span: s, left: l, right: r })
    }
    pub fn ge(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Ge, ">=", rhs, |s, l, r| Expression::Ge { span: s, left: l, right: r })
    }
    pub fn eq(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Equals, "==", rhs, |s, l, r| Expression::Eq { span: s, left: l, right: r })
    }
    pub fn neq(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::NotEquals, "!=", rhs, |s, l, r| Expression::Neq { span: s, left: l, right: r })
    }
    pub fn matches(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Matches, "matches", rhs, |s, l, r| Expression::Matches { span: s, left: l, right: r })
    }
    pub fn contains(self, rhs: ExprBuilder) -> Self {
        self.binary(TokenKind::Contains, "contains", rhs, |s, l, r| Expression::Contains { span: s, left: l, right: r })
    }

    fn and_with_comment(self, rhs: ExprBuilder, left_comment: Option<String>, right_comment: Option<String>) -> Self {
        self.binary(TokenKind::And, "and", rhs, move |s, l, r| Expression::And { span: s, left: l, right: r, left_comment, right_comment })
    }
    fn or_with_comment(self, rhs: ExprBuilder, left_comment: Option<String>, right_comment: Option<String>) -> Self {
        self.binary(TokenKind::Or, "or", rhs, move |s, l, r| Expression::Or { span: s, left: l, right: r, left_comment, right_comment })
    }
    pub fn and(self, rhs: ExprBuilder) -> Self {
        self.and_with_comment(rhs, None, None)
    }
    pub fn or(self, rhs: ExprBuilder) -> Self {
        self.or_with_comment(rhs, None, None)
    }
}

/// Left-fold `parts` into a chain of `and`s. Each `(operand, comment)`
/// pair's comment is attached to that operand in the formatted rendering
/// only — it never appears in the exact `text` output, see
/// `YaraFile::text_formatted`.
pub fn conjunction(mut parts: Vec<(ExprBuilder, Option<String>)>) -> ExprBuilder {
    assert!(!parts.is_empty(), "conjunction needs at least one operand");
    let (mut acc, mut pending) = parts.remove(0);
    for (next, comment) in parts {
        acc = acc.and_with_comment(next, pending.take(), comment);
    }
    acc
}
pub fn disjunction(mut parts: Vec<(ExprBuilder, Option<String>)>) -> ExprBuilder {
    assert!(!parts.is_empty(), "disjunction needs at least one operand");
    let (mut acc, mut pending) = parts.remove(0);
    for (next, comment) in parts {
        acc = acc.or_with_comment(next, pending.take(), comment);
    }
    acc
}

/// Fluent `Rule` construction.
pub struct YaraRuleBuilder {
    modifier: RuleModifier,
    name: String,
    tags: Vec<String>,
    metas: Vec<(String, Literal)>,
    strings: Vec<(String, StringValue, StringModifiers)>,
    condition: Option<ExprBuilder>,
}

impl YaraRuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { modifier: RuleModifier::Empty, name: name.into(), tags: Vec::new(), metas: Vec::new(), strings: Vec::new(), condition: None }
    }
    pub fn with_modifier(mut self, modifier: RuleModifier) -> Self {
        self.modifier = modifier;
        self
    }
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
    pub fn with_string_meta(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.metas.push((key.into(), Literal::string(value)));
        self
    }
    pub fn with_int_meta(mut self, key: impl Into<String>, value: i64) -> Self {
        self.metas.push((key.into(), Literal::int(value)));
        self
    }
    pub fn with_hex_int_meta(mut self, key: impl Into<String>, value: i64) -> Self {
        self.metas.push((key.into(), Literal::hex_int(value)));
        self
    }
    pub fn with_bool_meta(mut self, key: impl Into<String>, value: bool) -> Self {
        self.metas.push((key.into(), Literal::bool(value)));
        self
    }
    pub fn with_plain_string(mut self, id: impl Into<String>, value: impl Into<Vec<u8>>, modifiers: StringModifiers) -> Self {
        self.strings.push((id.into(), StringValue::Plain(value.into()), modifiers));
        self
    }
    pub fn with_hex_string(mut self, id: impl Into<String>, hex: HexString, modifiers: StringModifiers) -> Self {
        self.strings.push((id.into(), StringValue::Hex(hex), modifiers));
        self
    }
    pub fn with_regexp_string(mut self, id: impl Into<String>, regexp: RegexpLiteral, modifiers: StringModifiers) -> Self {
        self.strings.push((id.into(), StringValue::Regexp(regexp), modifiers));
        self
    }
    pub fn with_condition(mut self, condition: ExprBuilder) -> Self {
        self.condition = Some(condition);
        self
    }

    fn push(dest: &mut TokenStream, kind: TokenKind, text: impl Into<String>) -> TokenPtr {
        dest.push_back(Token::new(kind, text))
    }

    fn push_literal(dest: &mut TokenStream, literal: &Literal) -> TokenPtr {
        match literal {
            Literal::Bool(b) => Self::push(dest, if *b { TokenKind::True } else { TokenKind::False }, literal.text()),
            Literal::Str { raw, .. } => {
                let text = format!("\"{}\"", escape_bytes(raw));
                dest.push_back(Token::with_literal(TokenKind::StringLiteral, text, literal.clone()))
            }
            _ => dest.push_back(Token::with_literal(TokenKind::IntegerLiteral, literal.text(), literal.clone())),
        }
    }

    /// Assemble the [Rule], splicing its own header/meta/string tokens
    /// and the condition's private stream onto the tail of `dest`. A
    /// rule built without `with_condition` defaults to `condition: true`,
    /// matching `yaramod`'s builder default.
    pub fn build(self, dest: &mut TokenStream) -> Rule {
        let first = match self.modifier {
            RuleModifier::Private => {
                let p = Self::push(dest, TokenKind::Private, "private");
                Self::push(dest, TokenKind::Whitespace, " ");
                p
            }
            RuleModifier::Global => {
                let p = Self::push(dest, TokenKind::Global, "global");
                Self::push(dest, TokenKind::Whitespace, " ");
                p
            }
            RuleModifier::PrivateGlobal => {
                let p = Self::push(dest, TokenKind::Private, "private");
                Self::push(dest, TokenKind::Whitespace, " ");
                Self::push(dest, TokenKind::Global, "global");
                Self::push(dest, TokenKind::Whitespace, " ");
                p
            }
            RuleModifier::Empty => Self::push(dest, TokenKind::Rule, "rule"),
        };
        if !matches!(self.modifier, RuleModifier::Empty) {
            Self::push(dest, TokenKind::Rule, "rule");
        }
        Self::push(dest, TokenKind::Whitespace, " ");
        Self::push(dest, TokenKind::Identifier, self.name.clone());

        if !self.tags.is_empty() {
            Self::push(dest, TokenKind::Whitespace, " ");
            Self::push(dest, TokenKind::Colon, ":");
            for tag in &self.tags {
                Self::push(dest, TokenKind::Whitespace, " ");
                Self::push(dest, TokenKind::Identifier, tag.clone());
            }
        }

        Self::push(dest, TokenKind::Whitespace, " ");
        Self::push(dest, TokenKind::LBrace, "{");
        Self::push(dest, TokenKind::NewLine, "\n");

        let mut metas = Vec::new();
        if !self.metas.is_empty() {
            Self::push(dest, TokenKind::Whitespace, "\t");
            Self::push(dest, TokenKind::Meta, "meta");
            Self::push(dest, TokenKind::Colon, ":");
            Self::push(dest, TokenKind::NewLine, "\n");
            for (key, value) in &self.metas {
                Self::push(dest, TokenKind::Whitespace, "\t\t");
                let key_ptr = Self::push(dest, TokenKind::Identifier, key.clone());
                Self::push(dest, TokenKind::Whitespace, " ");
                Self::push(dest, TokenKind::Assign, "=");
                Self::push(dest, TokenKind::Whitespace, " ");
                let value_ptr = Self::push_literal(dest, value);
                Self::push(dest, TokenKind::NewLine, "\n");
                metas.push(Meta { span: Span::new(key_ptr, value_ptr), key: key.clone(), value: value.clone() });
            }
        }

        let mut strings = Vec::new();
        if !self.strings.is_empty() {
            Self::push(dest, TokenKind::Whitespace, "\t");
            Self::push(dest, TokenKind::Strings, "strings");
            Self::push(dest, TokenKind::Colon, ":");
            Self::push(dest, TokenKind::NewLine, "\n");
            for (id, value, modifiers) in &self.strings {
                Self::push(dest, TokenKind::Whitespace, "\t\t");
                let id_ptr = Self::push(dest, TokenKind::StringId, id.clone());
                Self::push(dest, TokenKind::Whitespace, " ");
                Self::push(dest, TokenKind::Assign, "=");
                Self::push(dest, TokenKind::Whitespace, " ");
                let mut last = match value {
                    StringValue::Plain(raw) => {
                        let text = format!("\"{}\"", escape_bytes(raw));
                        dest.push_back(Token::new(TokenKind::StringLiteral, text))
                    }
                    StringValue::Hex(hex) => dest.push_back(Token::new(TokenKind::HexStringBody, hex.text())),
                    StringValue::Regexp(re) => dest.push_back(Token::new(TokenKind::RegexpLiteral, re.text())),
                };
                for (kind, word) in modifier_tokens(modifiers) {
                    Self::push(dest, TokenKind::Whitespace, " ");
                    last = Self::push(dest, kind, word);
                }
                Self::push(dest, TokenKind::NewLine, "\n");
                strings.push(StringDefinition { span: Span::new(id_ptr, last), id: id.clone(), value: value.clone(), modifiers: *modifiers });
            }
        }

        Self::push(dest, TokenKind::Whitespace, "\t");
        Self::push(dest, TokenKind::Condition, "condition");
        Self::push(dest, TokenKind::Colon, ":");
        Self::push(dest, TokenKind::NewLine, "\n");
        Self::push(dest, TokenKind::Whitespace, "\t\t");
        let condition = match self.condition {
            Some(builder) => splice_into(dest, builder),
            None => {
                let p = Self::push(dest, TokenKind::True, "true");
                Expression::BoolLiteral { span: Span::new(p, p), value: true }
            }
        };
        Self::push(dest, TokenKind::NewLine, "\n");
        let rbrace = Self::push(dest, TokenKind::RBrace, "}");

        Rule { span: Span::new(first, rbrace), modifier: self.modifier, name: self.name, tags: self.tags, metas, strings, condition }
    }
}

fn modifier_tokens(m: &StringModifiers) -> Vec<(TokenKind, &'static str)> {
    let mut parts = Vec::new();
    if m.ascii {
        parts.push((TokenKind::Ascii, "ascii"));
    }
    if m.wide {
        parts.push((TokenKind::Wide, "wide"));
    }
    if m.nocase {
        parts.push((TokenKind::Nocase, "nocase"));
    }
    if m.fullword {
        parts.push((TokenKind::Fullword, "fullword"));
    }
    if m.private {
        parts.push((TokenKind::Private, "private"));
    }
    if m.xor {
        parts.push((TokenKind::Xor, "xor"));
    }
    parts
}

/// Fluent [YaraFile] construction.
pub struct YaraFileBuilder {
    imports: Vec<String>,
    rules: Vec<YaraRuleBuilder>,
}

impl YaraFileBuilder {
    pub fn new() -> Self {
        Self { imports: Vec::new(), rules: Vec::new() }
    }
    pub fn with_module(mut self, name: impl Into<String>) -> Self {
        self.imports.push(name.into());
        self
    }
    pub fn with_rule(mut self, rule: YaraRuleBuilder) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn get(self) -> YaraFile {
        let mut tokens = TokenStream::new();
        let mut imports = Vec::new();
        for name in self.imports {
            let kw = tokens.push_back(Token::new(TokenKind::Import, "import"));
            tokens.push_back(Token::new(TokenKind::Whitespace, " "));
            let text = format!("\"{}\"", name);
            let str_ptr = tokens.push_back(Token::new(TokenKind::StringLiteral, text));
            tokens.push_back(Token::new(TokenKind::NewLine, "\n"));
            imports.push(Import { span: Span::new(kw, str_ptr), name });
        }
        if !imports.is_empty() {
            tokens.push_back(Token::new(TokenKind::NewLine, "\n"));
        }

        let mut file = YaraFile::new(TokenStream::new());
        file.imports = imports;
        let mut rules = Vec::new();
        for (i, rule_builder) in self.rules.into_iter().enumerate() {
            if i > 0 {
                tokens.push_back(Token::new(TokenKind::NewLine, "\n"));
            }
            rules.push(rule_builder.build(&mut tokens));
        }
        for rule in &rules {
            file.symbols.insert(crate::symbol::Symbol::scalar(rule.name.clone(), crate::symbol::DataType::Bool));
        }
        file.rules = rules;
        file.tokens = tokens;
        file
    }
}

impl Default for YaraFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleModifier;

    #[test]
    fn leaf_builders_render_expected_text() {
        let mut dest = TokenStream::new();
        let expr = splice_into(&mut dest, ExprBuilder::int(42));
        assert_eq!(expr.text(&dest), "42");
        assert!(matches!(expr, Expression::IntLiteral { value: 42, .. }));
    }

    #[test]
    fn hex_int_renders_hex_text() {
        let mut dest = TokenStream::new();
        let expr = splice_into(&mut dest, ExprBuilder::hex_int(255));
        assert_eq!(expr.text(&dest), "0xFF");
    }

    #[test]
    fn unary_builders_prefix_operator_token() {
        let mut dest = TokenStream::new();
        let expr = splice_into(&mut dest, ExprBuilder::int(5).negate());
        assert_eq!(expr.text(&dest), "-5");
        assert!(matches!(expr, Expression::UnaryMinus { .. }));

        let mut dest2 = TokenStream::new();
        let expr2 = splice_into(&mut dest2, ExprBuilder::boolean(true).not());
        assert_eq!(expr2.text(&dest2), "not true");
    }

    #[test]
    fn binary_chain_joins_operands_with_operator() {
        let mut dest = TokenStream::new();
        let expr = splice_into(&mut dest, ExprBuilder::int(1).plus(ExprBuilder::int(2)).multiply(ExprBuilder::int(3)));
        assert_eq!(expr.text(&dest), "1 + 2 * 3");
    }

    #[test]
    fn paren_wraps_expression_in_literal_parentheses() {
        let mut dest = TokenStream::new();
        let expr = splice_into(&mut dest, ExprBuilder::int(1).plus(ExprBuilder::int(2)).paren());
        assert_eq!(expr.text(&dest), "(1 + 2)");
    }

    #[test]
    fn conjunction_folds_left_to_right() {
        let mut dest = TokenStream::new();
        let expr = splice_into(
            &mut dest,
            conjunction(vec![
                (ExprBuilder::boolean(true), None),
                (ExprBuilder::boolean(false), None),
                (ExprBuilder::id("x"), None),
            ]),
        );
        match &expr {
            Expression::And { left, right, .. } => {
                assert!(matches!(**left, Expression::And { .. }));
                assert!(matches!(**right, Expression::Id { .. }));
            }
            other => panic!("expected nested And, got {:?}", other),
        }
        assert_eq!(expr.text(&dest), "true and false and x");
    }

    #[test]
    fn disjunction_with_comments_attaches_to_correct_operand() {
        let parts = vec![
            (ExprBuilder::boolean(true), Some("first".to_string())),
            (ExprBuilder::boolean(false), Some("second".to_string())),
        ];
        let expr = disjunction(parts);
        match expr.expr {
            Expression::Or { ref left_comment, ref right_comment, .. } => {
                assert_eq!(left_comment.as_deref(), Some("first"));
                assert_eq!(right_comment.as_deref(), Some("second"));
            }
            ref other => panic!("expected Or, got {:?}", other),
        }
    }

    #[test]
    fn rule_builder_defaults_to_true_condition() {
        let mut dest = TokenStream::new();
        let rule = YaraRuleBuilder::new("r").build(&mut dest);
        assert!(matches!(rule.condition, Expression::BoolLiteral { value: true, .. }));
        assert_eq!(rule.modifier, RuleModifier::Empty);
        assert!(rule.text(&dest).contains("rule r"));
    }

    #[test]
    fn rule_builder_modifiers_render_correct_keywords() {
        for (modifier, expected) in [
            (RuleModifier::Empty, "rule r"),
            (RuleModifier::Private, "private rule r"),
            (RuleModifier::Global, "global rule r"),
            (RuleModifier::PrivateGlobal, "private global rule r"),
        ] {
            let mut dest = TokenStream::new();
            let rule = YaraRuleBuilder::new("r").with_modifier(modifier).build(&mut dest);
            assert_eq!(rule.modifier, modifier);
            assert!(rule.text(&dest).starts_with(expected), "{:?} -> {}", modifier, rule.text(&dest));
        }
    }

    #[test]
    fn rule_builder_collects_metas_and_strings_with_modifiers() {
        let mut dest = TokenStream::new();
        let rule = YaraRuleBuilder::new("r")
            .with_string_meta("author", b"me".to_vec())
            .with_int_meta("score", 10)
            .with_plain_string("$a", b"foo".to_vec(), StringModifiers { ascii: true, nocase: true, ..Default::default() })
            .with_condition(ExprBuilder::string_ref("$a"))
            .build(&mut dest);
        assert_eq!(rule.metas.len(), 2);
        assert_eq!(rule.metas[0].key, "author");
        assert_eq!(rule.strings.len(), 1);
        assert!(rule.strings[0].modifiers.ascii && rule.strings[0].modifiers.nocase);
        assert!(matches!(rule.condition, Expression::String { .. }));
    }

    #[test]
    fn file_builder_collects_imports_and_registers_rule_symbols() {
        let file = YaraFileBuilder::new()
            .with_module("pe")
            .with_rule(YaraRuleBuilder::new("a"))
            .with_rule(YaraRuleBuilder::new("b"))
            .get();
        assert_eq!(file.imports.len(), 1);
        assert_eq!(file.imports[0].name, "pe");
        assert_eq!(file.rules.len(), 2);
        assert!(file.symbols.contains("a"));
        assert!(file.symbols.contains("b"));
        assert!(file.text().contains("import \"pe\""));
    }
}
