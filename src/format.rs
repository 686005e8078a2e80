//! Rendering a tree back to text: exact round-trip via the token stream,
//! and a canonical reformatting that ignores the original tokens and
//! rebuilds text from the AST. Also a `ptree`-backed debug dump of an
//! [Expression] for interactive inspection.

use crate::expr::Expression;
use crate::literal::escape_bytes;
use crate::rule::{Rule, RuleModifier, StringValue, YaraFile};
use crate::token_stream::TokenStream;
use std::borrow::Cow;
use std::io;

impl YaraFile {
    /// Exact source text: the concatenation of every live token, so this
    /// always matches the original input byte-for-byte unless the tree
    /// was mutated.
    pub fn text(&self) -> String {
        self.tokens.text()
    }

    /// Canonical reformatting, built from the AST rather than the
    /// original tokens: one blank line between rules, tab indentation,
    /// string modifiers in canonical order, comments attached by
    /// [crate::conjunction]/`disjunction` rendered inline.
    pub fn text_formatted(&self) -> String {
        let mut out = String::from("\n");
        for import in &self.imports {
            out.push_str(&format!("import \"{}\"\n", import.name));
        }
        if !self.imports.is_empty() {
            out.push('\n');
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&rule.text_formatted());
            out.push('\n');
        }
        out
    }
}

impl Rule {
    /// Exact source text for just this rule's token range.
    pub fn text(&self, stream: &TokenStream) -> String {
        self.span.text(stream)
    }

    pub fn text_formatted(&self) -> String {
        let mut out = String::new();
        match self.modifier {
            RuleModifier::Empty => {}
            RuleModifier::Private => out.push_str("private "),
            RuleModifier::Global => out.push_str("global "),
            RuleModifier::PrivateGlobal => out.push_str("private global "),
        }
        out.push_str("rule ");
        out.push_str(&self.name);
        if !self.tags.is_empty() {
            out.push_str(" : ");
            out.push_str(&self.tags.join(" "));
        }
        out.push_str("\n{\n");

        if !self.metas.is_empty() {
            out.push_str("\tmeta:\n");
            for meta in &self.metas {
                out.push_str(&format!("\t\t{} = {}\n", meta.key, meta.value.text()));
            }
        }

        if !self.strings.is_empty() {
            out.push_str("\tstrings:\n");
            for s in &self.strings {
                let value_text = match &s.value {
                    StringValue::Plain(raw) => format!("\"{}\"", escape_bytes(raw)),
                    StringValue::Hex(hex) => hex.text(),
                    StringValue::Regexp(re) => re.text(),
                };
                let modifiers = s.modifier_text();
                if modifiers.is_empty() {
                    out.push_str(&format!("\t\t{} = {}\n", s.id, value_text));
                } else {
                    out.push_str(&format!("\t\t{} = {} {}\n", s.id, value_text, modifiers));
                }
            }
        }

        out.push_str("\tcondition:\n\t\t");
        out.push_str(&fmt_expr(&self.condition, 2));
        out.push_str("\n}\n");
        out
    }
}

fn indent(level: usize) -> String {
    "\t".repeat(level)
}

fn fmt_list(items: &[Expression], indent_level: usize) -> String {
    items.iter().map(|e| fmt_expr(e, indent_level)).collect::<Vec<_>>().join(", ")
}

fn strip_sigil(id: &str) -> &str {
    &id[1..]
}

/// Reconstruct an expression's text purely from the AST, ignoring
/// whatever tokens it happens to carry. Boolean chains with an attached
/// comment break onto their own line; everything else stays inline.
pub fn fmt_expr(expr: &Expression, indent_level: usize) -> String {
    use Expression::*;
    match expr {
        BoolLiteral { value, .. } => value.to_string(),
        IntLiteral { text, .. } => text.clone(),
        DoubleLiteral { value, .. } => value.to_string(),
        StringLiteral { value, .. } => format!("\"{}\"", escape_bytes(value)),
        String { id, .. } => id.clone(),
        StringWildcard { prefix, .. } => format!("{}*", prefix),
        StringAt { id, at_expr, .. } => format!("{} at {}", id, fmt_expr(at_expr, indent_level)),
        StringInRange { id, range_expr, .. } => format!("{} in {}", id, fmt_expr(range_expr, indent_level)),
        StringCount { id, .. } => format!("#{}", strip_sigil(id)),
        StringOffset { id, index_expr, .. } => match index_expr {
            Some(i) => format!("@{}[{}]", strip_sigil(id), fmt_expr(i, indent_level)),
            None => format!("@{}", strip_sigil(id)),
        },
        StringLength { id, index_expr, .. } => match index_expr {
            Some(i) => format!("!{}[{}]", strip_sigil(id), fmt_expr(i, indent_level)),
            None => format!("!{}", strip_sigil(id)),
        },
        Not { operand, .. } => format!("not {}", fmt_expr(operand, indent_level)),
        UnaryMinus { operand, .. } => format!("-{}", fmt_expr(operand, indent_level)),
        BitwiseNot { operand, .. } => format!("~{}", fmt_expr(operand, indent_level)),
        And { left, right, left_comment, right_comment, .. } => {
            fmt_logical_chain(left, right, left_comment, right_comment, "and", indent_level)
        }
        Or { left, right, left_comment, right_comment, .. } => {
            fmt_logical_chain(left, right, left_comment, right_comment, "or", indent_level)
        }
        Lt { left, right, .. } => format!("{} < {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        Le { left, right, .. } => format!("{} <= {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        Gt { left, right, .. } => format!("{} > {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        Ge { left, right, .. } => format!("{} >= {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        Eq { left, right, .. } => format!("{} == {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        Neq { left, right, .. } => format!("{} != {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        Plus { left, right, .. } => format!("{} + {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        Minus { left, right, .. } => format!("{} - {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        Multiply { left, right, .. } => format!("{} * {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        Divide { left, right, .. } => format!("{} \\ {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        Modulo { left, right, .. } => format!("{} % {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        BitwiseXor { left, right, .. } => format!("{} ^ {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        BitwiseAnd { left, right, .. } => format!("{} & {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        BitwiseOr { left, right, .. } => format!("{} | {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        ShiftLeft { left, right, .. } => format!("{} << {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        ShiftRight { left, right, .. } => format!("{} >> {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        Contains { left, right, .. } => format!("{} contains {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        IContains { left, right, .. } => format!("{} icontains {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        Matches { left, right, .. } => format!("{} matches {}", fmt_expr(left, indent_level), fmt_expr(right, indent_level)),
        ForInt { variable, iterated_set, body, .. } => {
            format!("for {} of {}: ({})", variable, fmt_expr(iterated_set, indent_level), fmt_expr(body, indent_level))
        }
        ForString { variable, iterated_set, body, .. } => {
            format!("for {} in {}: ({})", variable, fmt_expr(iterated_set, indent_level), fmt_expr(body, indent_level))
        }
        Of { variable, iterated_set, .. } => format!("{} of {}", fmt_expr(variable, indent_level), fmt_expr(iterated_set, indent_level)),
        Set { elements, .. } => format!("({})", fmt_list(elements, indent_level)),
        Range { low, high, .. } => format!("({}..{})", fmt_expr(low, indent_level), fmt_expr(high, indent_level)),
        Id { name, .. } => name.clone(),
        StructAccess { base, attribute, .. } => format!("{}.{}", fmt_expr(base, indent_level), attribute),
        ArrayAccess { base, index_expr, .. } => format!("{}[{}]", fmt_expr(base, indent_level), fmt_expr(index_expr, indent_level)),
        FunctionCall { function, arguments, .. } => {
            format!("{}({})", fmt_expr(function, indent_level), fmt_list(arguments, indent_level))
        }
        Filesize { .. } => "filesize".to_string(),
        Entrypoint { .. } => "entrypoint".to_string(),
        All { .. } => "all".to_string(),
        Any { .. } => "any".to_string(),
        Them { .. } => "them".to_string(),
        Parentheses { enclosed_expr, .. } => format!("({})", fmt_expr(enclosed_expr, indent_level)),
        IntFunction { function_name, argument, .. } => format!("{}({})", function_name, fmt_expr(argument, indent_level)),
        Regexp { regexp_string, .. } => regexp_string.text(),
    }
}

/// A logical chain with no attached comments renders inline (`a and b`).
/// One with comments breaks across lines, one operand per line, the
/// comment trailing as `// ...` — this is the one place a builder-only
/// comment becomes visible text.
fn fmt_logical_chain(
    left: &Expression,
    right: &Expression,
    left_comment: &Option<String>,
    right_comment: &Option<String>,
    op: &str,
    indent_level: usize,
) -> String {
    if left_comment.is_none() && right_comment.is_none() {
        return format!("{} {} {}", fmt_expr(left, indent_level), op, fmt_expr(right, indent_level));
    }
    let pad = indent(indent_level);
    let mut out = String::new();
    out.push_str(&fmt_expr(left, indent_level));
    if let Some(c) = left_comment {
        out.push_str(&format!(" // {}", c));
    }
    out.push('\n');
    out.push_str(&pad);
    out.push_str(op);
    out.push(' ');
    out.push_str(&fmt_expr(right, indent_level));
    if let Some(c) = right_comment {
        out.push_str(&format!(" // {}", c));
    }
    out
}

/// A labeled node in a debug dump of an [Expression] tree, printed with
/// `ptree`.
#[derive(Clone)]
struct DebugNode {
    label: String,
    children: Vec<DebugNode>,
}

impl ptree::TreeItem for DebugNode {
    type Child = DebugNode;
    fn write_self<W: io::Write>(&self, f: &mut W, style: &ptree::Style) -> io::Result<()> {
        write!(f, "{}", style.paint(&self.label))
    }
    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(self.children.clone())
    }
}

fn node_label(expr: &Expression) -> String {
    use Expression::*;
    match expr {
        BoolLiteral { value, .. } => format!("BoolLiteral({})", value),
        IntLiteral { text, .. } => format!("IntLiteral({})", text),
        DoubleLiteral { value, .. } => format!("DoubleLiteral({})", value),
        StringLiteral { value, .. } => format!("StringLiteral({})", escape_bytes(value)),
        String { id, .. } => format!("String({})", id),
        StringWildcard { prefix, .. } => format!("StringWildcard({}*)", prefix),
        StringAt { id, .. } => format!("StringAt({})", id),
        StringInRange { id, .. } => format!("StringInRange({})", id),
        StringCount { id, .. } => format!("StringCount({})", id),
        StringOffset { id, .. } => format!("StringOffset({})", id),
        StringLength { id, .. } => format!("StringLength({})", id),
        Id { name, .. } => format!("Id({})", name),
        StructAccess { attribute, .. } => format!("StructAccess(.{})", attribute),
        ArrayAccess { .. } => "ArrayAccess".to_string(),
        FunctionCall { .. } => "FunctionCall".to_string(),
        ForInt { variable, .. } => format!("ForInt({} of)", variable),
        ForString { variable, .. } => format!("ForString({} in)", variable),
        IntFunction { function_name, .. } => format!("IntFunction({})", function_name),
        Regexp { regexp_string, .. } => format!("Regexp({})", regexp_string.text()),
        Not { .. } => "Not".to_string(),
        UnaryMinus { .. } => "UnaryMinus".to_string(),
        BitwiseNot { .. } => "BitwiseNot".to_string(),
        And { .. } => "And".to_string(),
        Or { .. } => "Or".to_string(),
        Lt { .. } => "Lt".to_string(),
        Le { .. } => "Le".to_string(),
        Gt { .. } => "Gt".to_string(),
        Ge { .. } => "Ge".to_string(),
        Eq { .. } => "Eq".to_string(),
        Neq { .. } => "Neq".to_string(),
        Plus { .. } => "Plus".to_string(),
        Minus { .. } => "Minus".to_string(),
        Multiply { .. } => "Multiply".to_string(),
        Divide { .. } => "Divide".to_string(),
        Modulo { .. } => "Modulo".to_string(),
        BitwiseXor { .. } => "BitwiseXor".to_string(),
        BitwiseAnd { .. } => "BitwiseAnd".to_string(),
        BitwiseOr { .. } => "BitwiseOr".to_string(),
        ShiftLeft { .. } => "ShiftLeft".to_string(),
        ShiftRight { .. } => "ShiftRight".to_string(),
        Contains { .. } => "Contains".to_string(),
        IContains { .. } => "IContains".to_string(),
        Matches { .. } => "Matches".to_string(),
        Of { .. } => "Of".to_string(),
        Set { .. } => "Set".to_string(),
        Range { .. } => "Range".to_string(),
        Filesize { .. } => "Filesize".to_string(),
        Entrypoint { .. } => "Entrypoint".to_string(),
        All { .. } => "All".to_string(),
        Any { .. } => "Any".to_string(),
        Them { .. } => "Them".to_string(),
        Parentheses { .. } => "Parentheses".to_string(),
    }
}

fn build_debug_tree(expr: &Expression) -> DebugNode {
    let mut children = Vec::new();
    if let Some(l) = expr.left_operand() {
        children.push(build_debug_tree(l));
    }
    if let Some(r) = expr.right_operand() {
        children.push(build_debug_tree(r));
    }
    if let Some(o) = expr.operand() {
        children.push(build_debug_tree(o));
    }
    if let Some(e) = expr.enclosed_expr() {
        children.push(build_debug_tree(e));
    }
    use Expression::*;
    match expr {
        StringAt { at_expr, .. } => children.push(build_debug_tree(at_expr)),
        StringInRange { range_expr, .. } => children.push(build_debug_tree(range_expr)),
        StringOffset { index_expr, .. } | StringLength { index_expr, .. } => {
            if let Some(i) = index_expr {
                children.push(build_debug_tree(i));
            }
        }
        ForInt { iterated_set, body, .. } | ForString { iterated_set, body, .. } => {
            children.push(build_debug_tree(iterated_set));
            children.push(build_debug_tree(body));
        }
        Of { variable, iterated_set, .. } => {
            children.push(build_debug_tree(variable));
            children.push(build_debug_tree(iterated_set));
        }
        Set { elements, .. } => {
            for e in elements {
                children.push(build_debug_tree(e));
            }
        }
        Range { low, high, .. } => {
            children.push(build_debug_tree(low));
            children.push(build_debug_tree(high));
        }
        StructAccess { base, .. } => children.push(build_debug_tree(base)),
        ArrayAccess { base, index_expr, .. } => {
            children.push(build_debug_tree(base));
            children.push(build_debug_tree(index_expr));
        }
        FunctionCall { function, arguments, .. } => {
            children.push(build_debug_tree(function));
            for a in arguments {
                children.push(build_debug_tree(a));
            }
        }
        IntFunction { argument, .. } => children.push(build_debug_tree(argument)),
        _ => {}
    }
    DebugNode { label: node_label(expr), children }
}

/// Print an [Expression] tree to stdout for interactive debugging.
pub fn print_tree(expr: &Expression) -> io::Result<()> {
    ptree::print_tree(&build_debug_tree(expr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{conjunction, splice_into, ExprBuilder, YaraRuleBuilder};
    use crate::parser::Parser;
    use crate::symbol::ImportFeatures;
    use crate::token_stream::TokenStream;

    #[test]
    fn exact_text_preserves_original_whitespace_and_comments() {
        let src = "rule r // tag\n{\n\tcondition:\n\t\ttrue\n}\n";
        let file = Parser::parse(src.as_bytes(), ImportFeatures::Everything).unwrap();
        assert_eq!(file.text(), src);
    }

    #[test]
    fn text_formatted_differs_from_exact_text_for_irregular_source() {
        let src = "rule   r{condition:true}";
        let file = Parser::parse(src.as_bytes(), ImportFeatures::Everything).unwrap();
        assert_eq!(file.text(), src);
        assert_ne!(file.text_formatted(), file.text());
        assert!(file.text_formatted().contains("rule r\n{\n\tcondition:\n\t\ttrue\n}"));
    }

    #[test]
    fn fmt_logical_chain_renders_inline_without_comments() {
        let mut dest = TokenStream::new();
        let expr = splice_into(&mut dest, ExprBuilder::boolean(true).and(ExprBuilder::boolean(false)));
        assert_eq!(fmt_expr(&expr, 0), "true and false");
    }

    #[test]
    fn fmt_logical_chain_breaks_lines_when_comments_are_attached() {
        let mut dest = TokenStream::new();
        let expr = splice_into(
            &mut dest,
            conjunction(vec![
                (ExprBuilder::boolean(true), Some("left note".to_string())),
                (ExprBuilder::boolean(false), Some("right note".to_string())),
            ]),
        );
        let rendered = fmt_expr(&expr, 1);
        assert!(rendered.contains("true // left note"));
        assert!(rendered.contains("\tand false // right note"));
    }

    #[test]
    fn rule_text_formatted_renders_modifiers_metas_and_strings() {
        let mut dest = TokenStream::new();
        let rule = YaraRuleBuilder::new("r")
            .with_string_meta("author", b"me".to_vec())
            .with_plain_string("$a", b"foo".to_vec(), Default::default())
            .build(&mut dest);
        let formatted = rule.text_formatted();
        assert!(formatted.starts_with("rule r\n{\n"));
        assert!(formatted.contains("meta:\n\t\tauthor = \"me\"\n"));
        assert!(formatted.contains("strings:\n\t\t$a = \"foo\"\n"));
        assert!(formatted.contains("condition:\n\t\ttrue"));
    }

    #[test]
    fn node_label_and_debug_tree_cover_leaf_and_composite_nodes() {
        let mut dest = TokenStream::new();
        let expr = splice_into(&mut dest, ExprBuilder::int(1).plus(ExprBuilder::int(2)));
        let tree = build_debug_tree(&expr);
        assert_eq!(tree.label, "Plus");
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].label, "IntLiteral(1)");
        assert_eq!(tree.children[1].label, "IntLiteral(2)");
    }
}
