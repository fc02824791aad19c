/// Formula pretty-printer.
///
/// Renders an `Expr` back to canonical formula text: upper-case function
/// names, single-quoted strings, `{Braced}` column names unless the name is
/// a plain identifier, and only the parentheses the tree needs. Parsing the
/// output yields the same tree.
use super::types::*;

/// Format an expression as canonical formula text.
pub fn format_formula(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Literal(literal) => write_literal(out, literal),
        Expr::Identifier(name) => write_identifier(out, name),
        Expr::Unary { op, operand } => {
            out.push_str(op.symbol());
            write_operand(out, operand, matches!(**operand, Expr::Binary { .. }));
        }
        Expr::Binary { op, left, right } => {
            let precedence = op.precedence();
            let left_group = binary_precedence(left).is_some_and(|p| p < precedence);
            // Every operator is left-associative, so an equal-precedence
            // right operand must keep its parentheses.
            let right_group = binary_precedence(right).is_some_and(|p| p <= precedence);
            write_operand(out, left, left_group);
            out.push(' ');
            out.push_str(op.symbol());
            out.push(' ');
            write_operand(out, right, right_group);
        }
        Expr::Call { name, args } => {
            if let Some(name) = name {
                out.push_str(&name.to_uppercase());
            }
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, arg);
            }
            out.push(')');
        }
        Expr::Unsupported(kind) => out.push_str(kind),
    }
}

fn binary_precedence(expr: &Expr) -> Option<u8> {
    match expr {
        Expr::Binary { op, .. } => Some(op.precedence()),
        _ => None,
    }
}

fn write_operand(out: &mut String, expr: &Expr, group: bool) {
    if group {
        out.push('(');
        write_expr(out, expr);
        out.push(')');
    } else {
        write_expr(out, expr);
    }
}

fn write_literal(out: &mut String, literal: &Literal) {
    match literal {
        Literal::Number(n) => out.push_str(&format_number(*n)),
        Literal::String(s) => {
            out.push('\'');
            for ch in s.chars() {
                match ch {
                    '\'' => out.push_str("\\'"),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    other => out.push(other),
                }
            }
            out.push('\'');
        }
        Literal::Boolean(true) => out.push_str("true"),
        Literal::Boolean(false) => out.push_str("false"),
        Literal::Null => out.push_str("null"),
    }
}

fn write_identifier(out: &mut String, name: &str) {
    if is_bare_name(name) {
        out.push_str(name);
    } else {
        out.push('{');
        out.push_str(name);
        out.push('}');
    }
}

/// Would the parser read `name` back as the same identifier without braces?
fn is_bare_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c == '_' || c == '$' || c.is_alphabetic());
    starts_ok
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !matches!(name, "true" | "false" | "null")
}
