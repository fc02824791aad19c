/// Type inference for formula trees.
///
/// `annotate` walks an `Expr` once, bottom-up, and produces a parallel
/// `TypedExpr` tree carrying the inferred `FormulaDataType` of every node.
/// Types are computed once per pass and never revised afterwards; the
/// validator reads them, it never recomputes them.
use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::registry;
use super::types::*;

/// Column name → type, used to type identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSchema {
    columns: HashMap<String, FormulaDataType>,
}

impl ColumnSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, data_type: FormulaDataType) -> Self {
        self.insert(name, data_type);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, data_type: FormulaDataType) {
        self.columns.insert(name.into(), data_type);
    }

    pub fn get(&self, name: &str) -> Option<FormulaDataType> {
        self.columns.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, FormulaDataType)> for ColumnSchema {
    fn from_iter<I: IntoIterator<Item = (S, FormulaDataType)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// An `Expr` node with its inferred type and typed children.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr<'a> {
    pub expr: &'a Expr,
    pub data_type: FormulaDataType,
    pub children: Vec<TypedExpr<'a>>,
}

impl TypedExpr<'_> {
    /// Inferred types of the direct children, in order.
    pub fn child_types(&self) -> Vec<FormulaDataType> {
        self.children.iter().map(|c| c.data_type).collect()
    }
}

static DATE_SHAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").ok());

/// Starts with `YYYY-MM-DD`, whether or not that is a real date.
pub fn looks_like_date(text: &str) -> bool {
    DATE_SHAPE
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

/// Starts with a real calendar date, e.g. `2024-02-29` or `2024-02-29 10:00`.
pub fn is_date_literal(text: &str) -> bool {
    text.get(..10)
        .filter(|head| looks_like_date(head))
        .is_some_and(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").is_ok())
}

/// Annotate `expr`. Identifiers are typed from `schema` when given,
/// otherwise `UNKNOWN`.
pub fn annotate<'a>(expr: &'a Expr, schema: Option<&ColumnSchema>) -> TypedExpr<'a> {
    annotate_node(expr, schema, None)
}

fn annotate_node<'a>(
    expr: &'a Expr,
    schema: Option<&ColumnSchema>,
    expected: Option<FormulaDataType>,
) -> TypedExpr<'a> {
    use FormulaDataType as T;

    let (data_type, children) = match expr {
        Expr::Literal(literal) => (literal_type(literal, expected), Vec::new()),
        Expr::Identifier(name) => {
            let ty = schema.and_then(|s| s.get(name)).unwrap_or(T::Unknown);
            (ty, Vec::new())
        }
        Expr::Unary { op, operand } => {
            let child = annotate_node(operand, schema, None);
            let ty = match op {
                UnaryOperator::Minus | UnaryOperator::Plus => T::Numeric,
                UnaryOperator::Not => T::CondExp,
                UnaryOperator::Other(_) => T::Unknown,
            };
            (ty, vec![child])
        }
        Expr::Binary { op, left, right } => {
            let l = annotate_node(left, schema, None);
            let r = annotate_node(right, schema, None);
            let ty = binary_type(op, l.data_type, r.data_type);
            (ty, vec![l, r])
        }
        Expr::Call { name, args } => {
            let sig = name.as_deref().and_then(registry::lookup);
            let children: Vec<TypedExpr<'a>> = args
                .iter()
                .enumerate()
                .map(|(i, arg)| {
                    let expected = sig.and_then(|s| s.expected_arg_type(i));
                    annotate_node(arg, schema, expected)
                })
                .collect();
            let ty = match sig {
                Some(sig) => {
                    let arg_types: Vec<FormulaDataType> =
                        children.iter().map(|c| c.data_type).collect();
                    sig.return_type(&arg_types)
                }
                None => T::Unknown,
            };
            (ty, children)
        }
        Expr::Unsupported(_) => (T::Unknown, Vec::new()),
    };

    TypedExpr {
        expr,
        data_type,
        children,
    }
}

/// A date-shaped string passed where a date is expected is a date.
fn literal_type(literal: &Literal, expected: Option<FormulaDataType>) -> FormulaDataType {
    match literal {
        Literal::Number(_) => FormulaDataType::Numeric,
        Literal::String(s) if expected == Some(FormulaDataType::Date) && is_date_literal(s) => {
            FormulaDataType::Date
        }
        Literal::String(_) => FormulaDataType::String,
        Literal::Boolean(_) => FormulaDataType::Boolean,
        Literal::Null => FormulaDataType::Null,
    }
}

fn binary_type(op: &BinaryOperator, left: FormulaDataType, right: FormulaDataType) -> FormulaDataType {
    use FormulaDataType as T;

    match (op, left, right) {
        (BinaryOperator::Plus, T::Date, T::Interval) | (BinaryOperator::Plus, T::Interval, T::Date) => {
            T::Date
        }
        (BinaryOperator::Minus, T::Date, T::Interval) => T::Date,
        (BinaryOperator::Minus, T::Date, T::Date) => T::Interval,
        (op, _, _) if op.is_comparison() || op.is_logical() => T::CondExp,
        (BinaryOperator::Concat, _, _) => T::String,
        // `1 + '2'` concatenates
        (BinaryOperator::Plus, l, r) => {
            let numeric_like =
                |t: T| matches!(t, T::Numeric | T::Boolean | T::Logical | T::Null | T::Unknown);
            if numeric_like(l) && numeric_like(r) {
                T::Numeric
            } else {
                T::String
            }
        }
        (BinaryOperator::Other(_), _, _) => T::Unknown,
        _ => T::Numeric,
    }
}
