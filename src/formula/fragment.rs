/// Parameterized SQL fragments.
///
/// A fragment is SQL text with `?` placeholders plus the values bound to
/// them, in placeholder order. Every way of combining fragments here keeps
/// bindings in the same order as their placeholders appear in the text.
use serde::{Serialize, Serializer};

use super::dialect::Dialect;
use super::types::format_number;

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl SqlValue {
    /// Literal SQL spelling, used when rendering bindings inline.
    pub fn to_sql_literal(&self, dialect: Dialect) -> String {
        match self {
            SqlValue::Number(n) => format_number(*n),
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Boolean(b) => match (dialect.has_boolean_values(), b) {
                (true, true) => "TRUE".to_string(),
                (true, false) => "FALSE".to_string(),
                (false, true) => "1".to_string(),
                (false, false) => "0".to_string(),
            },
        }
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serializer.serialize_i64(*n as i64)
            }
            SqlValue::Number(n) => serializer.serialize_f64(*n),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Boolean(b) => serializer.serialize_bool(*b),
        }
    }
}

/// Whether a fragment is a plain value or a boolean predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shape {
    #[default]
    Value,
    Predicate,
}

/// SQL text with positional bindings.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SqlFragment {
    #[serde(rename = "sql")]
    pub text: String,
    pub bindings: Vec<SqlValue>,
    #[serde(skip)]
    pub shape: Shape,
}

impl SqlFragment {
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// A single `?` placeholder.
    pub fn bind(value: SqlValue) -> Self {
        Self {
            text: "?".to_string(),
            bindings: vec![value],
            shape: Shape::Value,
        }
    }

    pub fn null() -> Self {
        Self::raw("NULL")
    }

    pub fn into_predicate(mut self) -> Self {
        self.shape = Shape::Predicate;
        self
    }

    pub fn into_value(mut self) -> Self {
        self.shape = Shape::Value;
        self
    }

    pub fn is_predicate(&self) -> bool {
        self.shape == Shape::Predicate
    }

    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Append another fragment's text and bindings.
    pub fn push(&mut self, other: SqlFragment) {
        self.text.push_str(&other.text);
        self.bindings.extend(other.bindings);
    }

    pub fn join(parts: Vec<SqlFragment>, separator: &str) -> SqlFragment {
        let mut out = SqlFragment::default();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            out.push(part);
        }
        out
    }

    /// Fill `{}` holes in `pattern` with `parts`, in order. `{{` and `}}`
    /// produce literal braces. Missing parts render as `NULL`.
    pub fn template(pattern: &str, parts: Vec<SqlFragment>) -> SqlFragment {
        let mut out = SqlFragment::default();
        let mut parts = parts.into_iter();
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            let next = chars.peek().copied();
            match (c, next) {
                ('{', Some('{')) => {
                    chars.next();
                    out.text.push('{');
                }
                ('}', Some('}')) => {
                    chars.next();
                    out.text.push('}');
                }
                ('{', Some('}')) => {
                    chars.next();
                    out.push(parts.next().unwrap_or_else(SqlFragment::null));
                }
                _ => out.text.push(c),
            }
        }
        out
    }

    pub fn parenthesized(self) -> SqlFragment {
        let shape = self.shape;
        let mut out = SqlFragment::raw("(");
        out.push(self);
        out.push_str(")");
        out.shape = shape;
        out
    }

    /// Render with bindings substituted as literals. Placeholders inside
    /// quoted strings or quoted identifiers are left alone.
    pub fn to_inline_sql(&self, dialect: Dialect) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut bindings = self.bindings.iter();
        let mut quote: Option<char> = None;
        for c in self.text.chars() {
            match quote {
                Some(close) => {
                    if c == close {
                        quote = None;
                    }
                    out.push(c);
                }
                None => match c {
                    '\'' | '"' | '`' => {
                        quote = Some(c);
                        out.push(c);
                    }
                    '[' if dialect == Dialect::Mssql => {
                        quote = Some(']');
                        out.push(c);
                    }
                    '?' => match bindings.next() {
                        Some(value) => out.push_str(&value.to_sql_literal(dialect)),
                        None => out.push(c),
                    },
                    _ => out.push(c),
                },
            }
        }
        out
    }
}

/// `sql!("CAST({} AS REAL)", frag)` builds a fragment from a template.
macro_rules! sql {
    ($pattern:expr $(, $part:expr)* $(,)?) => {
        $crate::formula::fragment::SqlFragment::template($pattern, vec![$($part),*])
    };
}

pub(crate) use sql;

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> SqlFragment {
        SqlFragment::bind(SqlValue::Number(n))
    }

    #[test]
    fn test_template_preserves_binding_order() {
        let f = sql!(
            "LOCATE({}, {})",
            SqlFragment::bind(SqlValue::Text("b".into())),
            num(1.0)
        );
        assert_eq!(f.text, "LOCATE(?, ?)");
        assert_eq!(
            f.bindings,
            vec![SqlValue::Text("b".into()), SqlValue::Number(1.0)]
        );
    }

    #[test]
    fn test_template_escaped_braces() {
        let f = sql!("{} #>> '{{}}'", SqlFragment::raw("j"));
        assert_eq!(f.text, "j #>> '{}'");
    }

    #[test]
    fn test_template_missing_part_is_null() {
        let f = sql!("COALESCE({}, {})", SqlFragment::raw("a"));
        assert_eq!(f.text, "COALESCE(a, NULL)");
    }

    #[test]
    fn test_join() {
        let f = SqlFragment::join(vec![num(1.0), SqlFragment::raw("x"), num(2.0)], " + ");
        assert_eq!(f.text, "? + x + ?");
        assert_eq!(f.bindings.len(), 2);
    }

    #[test]
    fn test_parenthesized_keeps_shape() {
        let f = SqlFragment::raw("a = b").into_predicate().parenthesized();
        assert_eq!(f.text, "(a = b)");
        assert!(f.is_predicate());
    }

    #[test]
    fn test_inline_skips_quoted_question_marks() {
        let mut f = SqlFragment::raw("REPLACE(");
        f.push(SqlFragment::bind(SqlValue::Text("it's".into())));
        f.push_str(", '?', '%3F') + ");
        f.push(num(2.0));
        assert_eq!(
            f.to_inline_sql(Dialect::Postgres),
            "REPLACE('it''s', '?', '%3F') + 2"
        );
    }

    #[test]
    fn test_inline_boolean_per_dialect() {
        let f = SqlFragment::bind(SqlValue::Boolean(true));
        assert_eq!(f.to_inline_sql(Dialect::Postgres), "TRUE");
        assert_eq!(f.to_inline_sql(Dialect::Oracle), "1");
    }

    #[test]
    fn test_serialize_bindings() {
        let f = SqlFragment::join(
            vec![num(3.0), num(2.5), SqlFragment::bind(SqlValue::Text("x".into()))],
            ", ",
        );
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, r#"{"sql":"?, ?, ?","bindings":[3,2.5,"x"]}"#);
    }
}
