//! Formula AST and type vocabulary.
//!
//! This module defines the representation shared by the parser, the
//! validator, the rewrite passes, and the SQL compiler. The AST is:
//! - Closed (every consumer matches exhaustively on `Expr`)
//! - Immutable once built (passes produce new trees)
//! - Tolerant (malformed input becomes `Expr::Unsupported`, never a panic)

use std::fmt;

use serde::{Deserialize, Serialize};

/// A formula expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Column reference, e.g. `{Unit Price}` or `price`.
    Identifier(String),
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    /// Function call. `name` is `None` when the input tree had a call
    /// without a resolvable callee.
    Call {
        name: Option<String>,
        args: Vec<Expr>,
    },
    /// A node shape the engine does not understand, carrying its kind.
    Unsupported(String),
}

impl Expr {
    pub fn number(value: f64) -> Self {
        Expr::Literal(Literal::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: Some(name.into()),
            args,
        }
    }

    /// Upper-cased callee name, if this is a named call.
    pub fn call_name(&self) -> Option<String> {
        match self {
            Expr::Call {
                name: Some(name), ..
            } => Some(name.to_uppercase()),
            _ => None,
        }
    }

    /// Numeric value of a literal, looking through unary `-`/`+`.
    pub fn number_value(&self) -> Option<f64> {
        match self {
            Expr::Literal(Literal::Number(n)) => Some(*n),
            Expr::Unary {
                op: UnaryOperator::Minus,
                operand,
            } => operand.number_value().map(|n| -n),
            Expr::Unary {
                op: UnaryOperator::Plus,
                operand,
            } => operand.number_value(),
            _ => None,
        }
    }

    pub fn string_value(&self) -> Option<&str> {
        match self {
            Expr::Literal(Literal::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Direct children, left to right.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Binary { left, right, .. } => vec![left, right],
            Expr::Unary { operand, .. } => vec![operand],
            Expr::Call { args, .. } => args.iter().collect(),
            Expr::Literal(_) | Expr::Identifier(_) | Expr::Unsupported(_) => Vec::new(),
        }
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
}

/// Renders a number the way a user would type it: integral values
/// without a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{}", value as i128)
    } else {
        format!("{}", value)
    }
}

/// Binary operators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    /// `=`
    Eq,
    /// `==`
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    /// `&` string concatenation
    Concat,
    /// `&&`
    And,
    /// `||`
    Or,
    /// An operator the engine has no rule for.
    Other(String),
}

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "+" => BinaryOperator::Plus,
            "-" => BinaryOperator::Minus,
            "*" => BinaryOperator::Multiply,
            "/" => BinaryOperator::Divide,
            "%" => BinaryOperator::Modulo,
            "=" => BinaryOperator::Eq,
            "==" => BinaryOperator::EqEq,
            "!=" => BinaryOperator::NotEq,
            "<" => BinaryOperator::Lt,
            ">" => BinaryOperator::Gt,
            "<=" => BinaryOperator::LtEq,
            ">=" => BinaryOperator::GtEq,
            "&" => BinaryOperator::Concat,
            "&&" => BinaryOperator::And,
            "||" => BinaryOperator::Or,
            other => BinaryOperator::Other(other.to_string()),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Eq => "=",
            BinaryOperator::EqEq => "==",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::Concat => "&",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Other(op) => op,
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::EqEq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::Gt
                | BinaryOperator::LtEq
                | BinaryOperator::GtEq
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    /// Binding strength used by the parser and the formatter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq | BinaryOperator::EqEq | BinaryOperator::NotEq => 3,
            BinaryOperator::Lt | BinaryOperator::Gt | BinaryOperator::LtEq | BinaryOperator::GtEq => 4,
            BinaryOperator::Concat => 5,
            BinaryOperator::Plus | BinaryOperator::Minus => 6,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 7,
            BinaryOperator::Other(_) => 0,
        }
    }

    /// `a op (b op c)` differs from `(a op b) op c`.
    pub fn is_left_associative_only(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Minus | BinaryOperator::Divide | BinaryOperator::Modulo
        ) || self.is_comparison()
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary prefix operators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Minus,
    Plus,
    Not,
    Other(String),
}

impl UnaryOperator {
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "-" => UnaryOperator::Minus,
            "+" => UnaryOperator::Plus,
            "!" => UnaryOperator::Not,
            other => UnaryOperator::Other(other.to_string()),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::Not => "!",
            UnaryOperator::Other(op) => op,
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The small type system shared by inference, validation, and the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormulaDataType {
    Numeric,
    String,
    Date,
    Boolean,
    Logical,
    CondExp,
    Interval,
    /// Values of a lookup or link column, one per related row.
    Array,
    Null,
    Unknown,
}

impl FormulaDataType {
    /// `NULL` and `UNKNOWN` suppress type-specific diagnostics.
    pub fn is_silent(self) -> bool {
        matches!(self, FormulaDataType::Null | FormulaDataType::Unknown)
    }

    /// Usable where a condition is expected.
    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            FormulaDataType::CondExp
                | FormulaDataType::Boolean
                | FormulaDataType::Logical
                | FormulaDataType::Numeric
        )
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, FormulaDataType::Boolean | FormulaDataType::Logical)
    }

    /// User-facing name used in diagnostic messages.
    pub fn label(self) -> &'static str {
        match self {
            FormulaDataType::Numeric => "Number",
            FormulaDataType::String => "Text",
            FormulaDataType::Date => "Date",
            FormulaDataType::Boolean | FormulaDataType::Logical => "Boolean",
            FormulaDataType::CondExp => "Condition",
            FormulaDataType::Interval => "Time",
            FormulaDataType::Array => "Array",
            FormulaDataType::Null => "Empty",
            FormulaDataType::Unknown => "Unknown",
        }
    }

    /// Parses the CLI / config spelling of a column type.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "number" | "numeric" | "decimal" | "integer" => Some(FormulaDataType::Numeric),
            "text" | "string" => Some(FormulaDataType::String),
            "date" | "datetime" => Some(FormulaDataType::Date),
            "boolean" | "bool" | "checkbox" => Some(FormulaDataType::Boolean),
            "logical" => Some(FormulaDataType::Logical),
            "interval" | "time" | "duration" => Some(FormulaDataType::Interval),
            "array" | "lookup" | "links" => Some(FormulaDataType::Array),
            "null" => Some(FormulaDataType::Null),
            "unknown" => Some(FormulaDataType::Unknown),
            "cond_exp" | "condition" => Some(FormulaDataType::CondExp),
            _ => None,
        }
    }

    /// Numbers and booleans mix freely (booleans act as 0/1).
    pub fn is_numeric_boolean_pair(a: Self, b: Self) -> bool {
        (a == FormulaDataType::Numeric && b.is_boolean())
            || (a.is_boolean() && b == FormulaDataType::Numeric)
    }
}

impl fmt::Display for FormulaDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
            Severity::Info => f.write_str("info"),
        }
    }
}

/// Byte range into the formula text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A validator finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity,
            message: message.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}..{}]: {}",
            self.severity, self.span.start, self.span.end, self.message
        )
    }
}
