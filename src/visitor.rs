//! Observing and modifying visitors over [Expression] trees.
//!
//! `ObservingVisitor` is read-only: its default per-variant methods just
//! recurse into children, so overriding one method still walks the rest
//! of the tree for free. `ModifyingVisitor` additionally lets an override
//! replace or delete the node it's handed; [VisitAction::Delete] bubbles
//! upward according to the operator-specific rules below, substituting
//! `when_deleted` where an operand simply vanishing would be unsound
//! (logical connectives fall back to a literal rather than collapsing).

use crate::builder::remap_spans;
use crate::expr::{Expression, Span};
use crate::token_stream::TokenStream;

/// Read-only traversal. Every `visit_*` method defaults to recursing into
/// the node's children; override only the ones you care about.
pub trait ObservingVisitor {
    fn visit(&mut self, expr: &Expression) {
        default_observe(self, expr);
    }
}

/// Walks into every child of `expr`, calling `visitor.visit` on each —
/// the continuation an overridden `visit` can call to keep descending.
pub fn default_observe<V: ObservingVisitor + ?Sized>(visitor: &mut V, expr: &Expression) {
    if let Some(l) = expr.left_operand() {
        visitor.visit(l);
    }
    if let Some(r) = expr.right_operand() {
        visitor.visit(r);
    }
    if let Some(o) = expr.operand() {
        visitor.visit(o);
    }
    if let Some(e) = expr.enclosed_expr() {
        visitor.visit(e);
    }
    match expr {
        Expression::StringAt { at_expr, .. } => visitor.visit(at_expr),
        Expression::StringInRange { range_expr, .. } => visitor.visit(range_expr),
        Expression::StringOffset { index_expr, .. } | Expression::StringLength { index_expr, .. } => {
            if let Some(i) = index_expr {
                visitor.visit(i);
            }
        }
        Expression::ForInt { iterated_set, body, .. } | Expression::ForString { iterated_set, body, .. } => {
            visitor.visit(iterated_set);
            visitor.visit(body);
        }
        Expression::Of { variable, iterated_set, .. } => {
            visitor.visit(variable);
            visitor.visit(iterated_set);
        }
        Expression::Set { elements, .. } => {
            for e in elements {
                visitor.visit(e);
            }
        }
        Expression::Range { low, high, .. } => {
            visitor.visit(low);
            visitor.visit(high);
        }
        Expression::StructAccess { base, .. } => visitor.visit(base),
        Expression::ArrayAccess { base, index_expr, .. } => {
            visitor.visit(base);
            visitor.visit(index_expr);
        }
        Expression::FunctionCall { function, arguments, .. } => {
            visitor.visit(function);
            for a in arguments {
                visitor.visit(a);
            }
        }
        Expression::IntFunction { argument, .. } => visitor.visit(argument),
        _ => {}
    }
}

/// What a [ModifyingVisitor] override decided to do with the node it was
/// handed.
pub enum VisitAction {
    /// Leave the node as-is (children may still have been rewritten).
    Keep,
    /// Replace the node with a different one entirely.
    Replace(Expression),
    /// Remove the node. How this propagates depends on the parent
    /// operator — see [modify].
    Delete,
}

pub trait ModifyingVisitor {
    /// Called for every node before its children are visited. The
    /// default implementation always returns [VisitAction::Keep], which
    /// hands control to [modify]'s built-in per-variant recursion.
    fn visit(&mut self, _expr: &Expression, _stream: &mut TokenStream) -> VisitAction {
        VisitAction::Keep
    }
}

/// The span a node occupied in the stream before its visitor ran. Mirrors
/// `yaramod`'s `TokenStreamContext`: captured going in, it's what a
/// `Replace`/`Delete` outcome reconciles against coming out.
struct TokenStreamContext {
    original: Span,
}

impl TokenStreamContext {
    fn capture(expr: &Expression) -> Self {
        TokenStreamContext { original: expr.span() }
    }
}

/// Put `replacement`'s tokens where `original` used to live, so `text()`
/// reflects the substitution exactly. Two cases:
///
/// - `replacement` reuses tokens from inside `original` (e.g. a visitor
///   handed back one of the node's own children) — the tokens either
///   side of the reused span, still part of `original`, are erased.
/// - `replacement` is an unrelated range (e.g. freshly spliced in from a
///   builder) — the two ranges trade places via `exchange_ranges`, then
///   `original`'s range (now sitting where `replacement` used to be) is
///   erased.
fn splice_replacement(stream: &mut TokenStream, original: Span, replacement: Span) {
    if original.first == replacement.first && original.last == replacement.last {
        return;
    }
    let reused = stream.iter_range(original.first, original.last).any(|p| p == replacement.first);
    if reused {
        if original.first != replacement.first {
            if let Some(before) = stream.prev(replacement.first) {
                stream.erase_range(original.first, before);
            }
        }
        if original.last != replacement.last {
            if let Some(after) = stream.next(replacement.last) {
                stream.erase_range(after, original.last);
            }
        }
    } else {
        stream.exchange_ranges(original.first, original.last, replacement.first, replacement.last);
        stream.erase_range(original.first, original.last);
    }
}

fn erase_deleted(stream: &mut TokenStream, original: Span) {
    stream.erase_range(original.first, original.last);
}

/// Drives `visitor` over `expr`, applying [VisitAction]s and the
/// delete-absorption rules: logical `and`/`or` substitute a deleted
/// operand with `when_deleted` rather than disappearing; every other
/// binary or unary operator propagates `Delete` to its own parent since
/// there's no sound default to fall back to; a `Set` simply drops a
/// deleted element, propagating `Delete` itself only if that empties it.
/// `Replace` and `Delete` also reconcile the token stream so `text()`
/// keeps matching the rewritten tree.
pub fn modify<V: ModifyingVisitor>(
    visitor: &mut V,
    expr: Expression,
    stream: &mut TokenStream,
    when_deleted: &Expression,
) -> Option<Expression> {
    let context = TokenStreamContext::capture(&expr);
    let expr = match visitor.visit(&expr, stream) {
        VisitAction::Delete => {
            erase_deleted(stream, context.original);
            return None;
        }
        VisitAction::Replace(replacement) => {
            splice_replacement(stream, context.original, replacement.span());
            return Some(replacement);
        }
        VisitAction::Keep => expr,
    };
    Some(modify_children(visitor, expr, stream, when_deleted))
}

/// Substitutes a fresh copy of `when_deleted` in place of the tokens at
/// `deleted_span`, which have already been visited and found wanting (a
/// required child vanished with no sound replacement). A fresh copy is
/// made every time rather than reusing `when_deleted`'s own tokens, since
/// the template may be substituted at more than one place in the same
/// tree and each occurrence needs its own token identities.
fn fallback_at(stream: &mut TokenStream, when_deleted: &Expression, deleted_span: Span) -> Expression {
    let after = stream.next(deleted_span.last);
    stream.erase_range(deleted_span.first, deleted_span.last);
    let template = when_deleted.span();
    let remap = stream.duplicate_range(after, template.first, template.last);
    let mut copy = when_deleted.clone();
    remap_spans(&mut copy, &remap);
    copy
}

fn modify_children<V: ModifyingVisitor>(
    visitor: &mut V,
    expr: Expression,
    stream: &mut TokenStream,
    when_deleted: &Expression,
) -> Expression {
    match expr {
        Expression::And { left, right, left_comment, right_comment, .. } => {
            let left_span = left.span();
            let left = modify(visitor, *left, stream, when_deleted).unwrap_or_else(|| fallback_at(stream, when_deleted, left_span));
            let right_span = right.span();
            let right = modify(visitor, *right, stream, when_deleted).unwrap_or_else(|| fallback_at(stream, when_deleted, right_span));
            let span = Span::new(left.span().first, right.span().last);
            Expression::And { span, left: Box::new(left), right: Box::new(right), left_comment, right_comment }
        }
        Expression::Or { left, right, left_comment, right_comment, .. } => {
            let left_span = left.span();
            let left = modify(visitor, *left, stream, when_deleted).unwrap_or_else(|| fallback_at(stream, when_deleted, left_span));
            let right_span = right.span();
            let right = modify(visitor, *right, stream, when_deleted).unwrap_or_else(|| fallback_at(stream, when_deleted, right_span));
            let span = Span::new(left.span().first, right.span().last);
            Expression::Or { span, left: Box::new(left), right: Box::new(right), left_comment, right_comment }
        }
        other => modify_non_logical(visitor, other, stream, when_deleted),
    }
}

/// Recurses into a non-logical node's children. If any required child
/// was deleted without a sound substitute, the whole node is replaced by
/// `when_deleted` — there is no other place to put the absence.
fn modify_non_logical<V: ModifyingVisitor>(
    visitor: &mut V,
    expr: Expression,
    stream: &mut TokenStream,
    when_deleted: &Expression,
) -> Expression {
    macro_rules! rec {
        ($child:expr, $own_span:expr) => {
            match modify(visitor, *$child, stream, when_deleted) {
                Some(e) => e,
                None => return fallback_at(stream, when_deleted, $own_span),
            }
        };
    }
    macro_rules! rec_opt {
        ($child:expr, $own_span:expr) => {
            match $child {
                Some(c) => match modify(visitor, *c, stream, when_deleted) {
                    Some(e) => Some(Box::new(e)),
                    None => return fallback_at(stream, when_deleted, $own_span),
                },
                None => None,
            }
        };
    }

    use Expression::*;
    match expr {
        Not { span, operand } => {
            let operand = Box::new(rec!(operand, span));
            let span = Span::new(span.first, operand.span().last);
            Not { span, operand }
        }
        UnaryMinus { span, operand } => {
            let operand = Box::new(rec!(operand, span));
            let span = Span::new(span.first, operand.span().last);
            UnaryMinus { span, operand }
        }
        BitwiseNot { span, operand } => {
            let operand = Box::new(rec!(operand, span));
            let span = Span::new(span.first, operand.span().last);
            BitwiseNot { span, operand }
        }
        Lt { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Lt { span, left, right }
        }
        Le { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Le { span, left, right }
        }
        Gt { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Gt { span, left, right }
        }
        Ge { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Ge { span, left, right }
        }
        Eq { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Eq { span, left, right }
        }
        Neq { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Neq { span, left, right }
        }
        Plus { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Plus { span, left, right }
        }
        Minus { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Minus { span, left, right }
        }
        Multiply { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Multiply { span, left, right }
        }
        Divide { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Divide { span, left, right }
        }
        Modulo { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Modulo { span, left, right }
        }
        BitwiseXor { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            BitwiseXor { span, left, right }
        }
        BitwiseAnd { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            BitwiseAnd { span, left, right }
        }
        BitwiseOr { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            BitwiseOr { span, left, right }
        }
        ShiftLeft { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            ShiftLeft { span, left, right }
        }
        ShiftRight { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            ShiftRight { span, left, right }
        }
        Contains { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Contains { span, left, right }
        }
        IContains { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            IContains { span, left, right }
        }
        Matches { span, left, right } => {
            let left = Box::new(rec!(left, span));
            let right = Box::new(rec!(right, span));
            let span = Span::new(left.span().first, right.span().last);
            Matches { span, left, right }
        }
        StringAt { span, id, at_expr } => StringAt { span, id, at_expr: Box::new(rec!(at_expr, span)) },
        StringInRange { span, id, range_expr } => StringInRange { span, id, range_expr: Box::new(rec!(range_expr, span)) },
        StringOffset { span, id, index_expr } => StringOffset { span, id, index_expr: rec_opt!(index_expr, span) },
        StringLength { span, id, index_expr } => StringLength { span, id, index_expr: rec_opt!(index_expr, span) },
        ForInt { span, variable, iterated_set, body } => {
            ForInt { span, variable, iterated_set: Box::new(rec!(iterated_set, span)), body: Box::new(rec!(body, span)) }
        }
        ForString { span, variable, iterated_set, body } => {
            ForString { span, variable, iterated_set: Box::new(rec!(iterated_set, span)), body: Box::new(rec!(body, span)) }
        }
        Of { span, variable, iterated_set } => Of { span, variable: Box::new(rec!(variable, span)), iterated_set: Box::new(rec!(iterated_set, span)) },
        Set { span, elements } => {
            let mut kept = Vec::with_capacity(elements.len());
            for e in elements {
                if let Some(e) = modify(visitor, e, stream, when_deleted) {
                    kept.push(e);
                }
            }
            if kept.is_empty() {
                return fallback_at(stream, when_deleted, span);
            }
            Set { span, elements: kept }
        }
        Range { span, low, high } => Range { span, low: Box::new(rec!(low, span)), high: Box::new(rec!(high, span)) },
        StructAccess { span, base, attribute, symbol } => StructAccess { span, base: Box::new(rec!(base, span)), attribute, symbol },
        ArrayAccess { span, base, index_expr, symbol } => {
            ArrayAccess { span, base: Box::new(rec!(base, span)), index_expr: Box::new(rec!(index_expr, span)), symbol }
        }
        FunctionCall { span, function, arguments, symbol } => {
            let function = Box::new(rec!(function, span));
            let mut kept_args = Vec::with_capacity(arguments.len());
            for a in arguments {
                match modify(visitor, a, stream, when_deleted) {
                    Some(e) => kept_args.push(e),
                    None => return fallback_at(stream, when_deleted, span),
                }
            }
            FunctionCall { span, function, arguments: kept_args, symbol }
        }
        Parentheses { span, enclosed_expr } => Parentheses { span, enclosed_expr: Box::new(rec!(enclosed_expr, span)) },
        IntFunction { span, function_name, argument } => IntFunction { span, function_name, argument: Box::new(rec!(argument, span)) },
        leaf => leaf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Token, TokenKind};

    fn leaf(stream: &mut TokenStream, kind: TokenKind, text: &str, make: impl FnOnce(crate::expr::Span) -> Expression) -> Expression {
        let p = stream.push_back(Token::new(kind, text));
        make(crate::expr::Span::new(p, p))
    }

    fn bool_lit(stream: &mut TokenStream, value: bool) -> Expression {
        leaf(stream, if value { TokenKind::True } else { TokenKind::False }, if value { "true" } else { "false" }, move |span| {
            Expression::BoolLiteral { span, value }
        })
    }

    fn int_lit(stream: &mut TokenStream, value: i64) -> Expression {
        let text = value.to_string();
        leaf(stream, TokenKind::IntegerLiteral, &text.clone(), move |span| Expression::IntLiteral { span, value, text })
    }

    fn string_length(stream: &mut TokenStream, id: &str) -> Expression {
        let owned = id.to_string();
        leaf(stream, TokenKind::StringLength, id, move |span| Expression::StringLength { span, id: owned, index_expr: None })
    }

    struct CountIds(usize);
    impl ObservingVisitor for CountIds {
        fn visit(&mut self, expr: &Expression) {
            if matches!(expr, Expression::Id { .. }) {
                self.0 += 1;
            }
            default_observe(self, expr);
        }
    }

    #[test]
    fn observing_visitor_walks_full_tree() {
        let mut stream = TokenStream::new();
        let p = stream.push_back(Token::new(TokenKind::Identifier, "x"));
        let id_a = Expression::Id { span: crate::expr::Span::new(p, p), name: "x".into(), symbol: None };
        let id_b = Expression::Id { span: crate::expr::Span::new(p, p), name: "x".into(), symbol: None };
        let and = Expression::And {
            span: crate::expr::Span::new(p, p),
            left: Box::new(id_a),
            right: Box::new(id_b),
            left_comment: None,
            right_comment: None,
        };
        let mut counter = CountIds(0);
        counter.visit(&and);
        assert_eq!(counter.0, 2);
    }

    struct DeleteFalse;
    impl ModifyingVisitor for DeleteFalse {
        fn visit(&mut self, expr: &Expression, _stream: &mut TokenStream) -> VisitAction {
            match expr {
                Expression::BoolLiteral { value: false, .. } => VisitAction::Delete,
                _ => VisitAction::Keep,
            }
        }
    }

    #[test]
    fn and_substitutes_when_deleted_for_a_deleted_operand() {
        let mut stream = TokenStream::new();
        let when_deleted = bool_lit(&mut stream, true);
        let left = bool_lit(&mut stream, false);
        stream.push_back(Token::new(TokenKind::Whitespace, " "));
        stream.push_back(Token::new(TokenKind::And, "and"));
        stream.push_back(Token::new(TokenKind::Whitespace, " "));
        let right = bool_lit(&mut stream, true);
        let span = crate::expr::Span::new(left.span().first, right.span().last);
        let and = Expression::And { span, left: Box::new(left), right: Box::new(right), left_comment: None, right_comment: None };
        let result = modify(&mut DeleteFalse, and, &mut stream, &when_deleted).unwrap();
        match &result {
            Expression::And { left, right, .. } => {
                assert!(matches!(**left, Expression::BoolLiteral { value: true, .. }));
                assert!(matches!(**right, Expression::BoolLiteral { value: true, .. }));
            }
            other => panic!("expected And, got {:?}", other),
        }
        assert_eq!(result.text(&stream), "true and true");
    }

    #[test]
    fn non_logical_binary_falls_back_wholesale_on_deleted_operand() {
        let mut stream = TokenStream::new();
        let when_deleted = bool_lit(&mut stream, true);
        let left = bool_lit(&mut stream, false);
        stream.push_back(Token::new(TokenKind::Whitespace, " "));
        stream.push_back(Token::new(TokenKind::Equals, "=="));
        stream.push_back(Token::new(TokenKind::Whitespace, " "));
        let right = int_lit(&mut stream, 1);
        let span = crate::expr::Span::new(left.span().first, right.span().last);
        let eq = Expression::Eq { span, left: Box::new(left), right: Box::new(right) };
        let result = modify(&mut DeleteFalse, eq, &mut stream, &when_deleted).unwrap();
        assert!(matches!(result, Expression::BoolLiteral { value: true, .. }));
        assert_eq!(result.text(&stream), "true");
    }

    #[test]
    fn set_drops_individual_deleted_elements() {
        let mut stream = TokenStream::new();
        let when_deleted = bool_lit(&mut stream, false);
        let lp = stream.push_back(Token::new(TokenKind::LParen, "("));
        let a = bool_lit(&mut stream, false);
        stream.push_back(Token::new(TokenKind::Comma, ","));
        let b = bool_lit(&mut stream, true);
        stream.push_back(Token::new(TokenKind::Comma, ","));
        let c = bool_lit(&mut stream, true);
        let rp = stream.push_back(Token::new(TokenKind::RParen, ")"));
        let span = crate::expr::Span::new(lp, rp);
        let set = Expression::Set { span, elements: vec![a, b, c] };
        let result = modify(&mut DeleteFalse, set, &mut stream, &when_deleted).unwrap();
        match &result {
            Expression::Set { elements, .. } => assert_eq!(elements.len(), 2),
            other => panic!("expected Set, got {:?}", other),
        }
        assert_eq!(result.text(&stream), "(,true,true)");
    }

    #[test]
    fn set_falls_back_when_every_element_is_deleted() {
        let mut stream = TokenStream::new();
        let when_deleted = bool_lit(&mut stream, true);
        let lp = stream.push_back(Token::new(TokenKind::LParen, "("));
        let a = bool_lit(&mut stream, false);
        let rp = stream.push_back(Token::new(TokenKind::RParen, ")"));
        let span = crate::expr::Span::new(lp, rp);
        let set = Expression::Set { span, elements: vec![a] };
        let result = modify(&mut DeleteFalse, set, &mut stream, &when_deleted).unwrap();
        assert!(matches!(result, Expression::BoolLiteral { value: true, .. }));
        assert_eq!(result.text(&stream), "true");
    }

    #[test]
    fn function_call_falls_back_if_any_argument_is_deleted() {
        let mut stream = TokenStream::new();
        let when_deleted = bool_lit(&mut stream, true);
        let func = {
            let p = stream.push_back(Token::new(TokenKind::Identifier, "f"));
            Expression::Id { span: crate::expr::Span::new(p, p), name: "f".into(), symbol: None }
        };
        stream.push_back(Token::new(TokenKind::LParen, "("));
        let arg_ok = int_lit(&mut stream, 1);
        stream.push_back(Token::new(TokenKind::Comma, ","));
        let arg_deleted = bool_lit(&mut stream, false);
        let rp = stream.push_back(Token::new(TokenKind::RParen, ")"));
        let span = crate::expr::Span::new(func.span().first, rp);
        let call = Expression::FunctionCall { span, function: Box::new(func), arguments: vec![arg_ok, arg_deleted], symbol: None };
        let result = modify(&mut DeleteFalse, call, &mut stream, &when_deleted).unwrap();
        assert!(matches!(result, Expression::BoolLiteral { value: true, .. }));
        assert_eq!(result.text(&stream), "true");
    }

    #[test]
    fn replace_action_substitutes_node_and_keep_preserves_it() {
        struct ReplaceInts;
        impl ModifyingVisitor for ReplaceInts {
            fn visit(&mut self, expr: &Expression, stream: &mut TokenStream) -> VisitAction {
                match expr {
                    Expression::IntLiteral { value, .. } if *value == 1 => {
                        let p = stream.push_back(Token::new(TokenKind::IntegerLiteral, "99"));
                        VisitAction::Replace(Expression::IntLiteral { span: crate::expr::Span::new(p, p), value: 99, text: "99".into() })
                    }
                    _ => VisitAction::Keep,
                }
            }
        }
        let mut stream = TokenStream::new();
        let one = int_lit(&mut stream, 1);
        let when_deleted = Expression::BoolLiteral { span: one.span(), value: true };
        let result = modify(&mut ReplaceInts, one, &mut stream, &when_deleted).unwrap();
        assert!(matches!(result, Expression::IntLiteral { value: 99, .. }));
        assert_eq!(result.text(&stream), "99");
        assert_eq!(stream.text(), "99");
    }

    /// Grounded in `yaramod`'s eq-to-neq visitor fixture: a modifying
    /// visitor that rewrites `a == b` into `b != a`, reusing the existing
    /// operand subexpressions but building a fresh relation around them.
    #[test]
    fn replace_swaps_eq_operands_and_reflects_in_exact_text() {
        struct EqToNeq;
        impl ModifyingVisitor for EqToNeq {
            fn visit(&mut self, expr: &Expression, stream: &mut TokenStream) -> VisitAction {
                let Expression::Eq { left, right, .. } = expr else {
                    return VisitAction::Keep;
                };
                let (Expression::StringLength { id: left_id, .. }, Expression::StringLength { id: right_id, .. }) = (&**left, &**right) else {
                    return VisitAction::Keep;
                };
                let new_left = string_length(stream, right_id);
                stream.push_back(Token::new(TokenKind::Whitespace, " "));
                stream.push_back(Token::new(TokenKind::NotEquals, "!="));
                stream.push_back(Token::new(TokenKind::Whitespace, " "));
                let new_right = string_length(stream, left_id);
                let span = crate::expr::Span::new(new_left.span().first, new_right.span().last);
                VisitAction::Replace(Expression::Neq { span, left: Box::new(new_left), right: Box::new(new_right) })
            }
        }

        let mut stream = TokenStream::new();
        let left = string_length(&mut stream, "!str1");
        stream.push_back(Token::new(TokenKind::Whitespace, " "));
        stream.push_back(Token::new(TokenKind::Equals, "=="));
        stream.push_back(Token::new(TokenKind::Whitespace, " "));
        let right = string_length(&mut stream, "!str2222");
        let span = crate::expr::Span::new(left.span().first, right.span().last);
        let eq = Expression::Eq { span, left: Box::new(left), right: Box::new(right) };
        assert_eq!(eq.text(&stream), "!str1 == !str2222");

        let anchor = stream.head().unwrap();
        let when_deleted = Expression::BoolLiteral { span: crate::expr::Span::new(anchor, anchor), value: false };
        let result = modify(&mut EqToNeq, eq, &mut stream, &when_deleted).unwrap();
        assert!(matches!(result, Expression::Neq { .. }));
        assert_eq!(result.text(&stream), "!str2222 != !str1");
    }
}
