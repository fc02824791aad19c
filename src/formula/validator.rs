/// Formula diagnostics.
///
/// Annotates the tree with `infer::annotate`, then visits every node once,
/// parent before children, collecting `Diagnostic`s. A diagnostic on a
/// node never stops the walk into its children, and nothing here panics
/// or returns early on malformed input: an unknown shape is one more
/// diagnostic.
///
/// Diagnostics carry the span of the whole formula. The AST does not keep
/// per-node offsets.
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::infer::{annotate, looks_like_date, ColumnSchema, TypedExpr};
use super::parser::parse_formula;
use super::registry::{self, FunctionSignature};
use super::types::*;
use super::units::{parse_weekday, DateUnit, DiffUnit};

/// Largest integer an IEEE-754 double represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

const MAX_ROUND_PRECISION: f64 = 20.0;
const LARGE_REPEAT_COUNT: f64 = 1000.0;

static NUMBER_LIKE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[$€£¥]?[-+]?[0-9,.]*[0-9]%?$").ok());

/// Validate `root` without a column schema. Identifiers are `UNKNOWN` and
/// never produce type diagnostics.
pub fn validate(root: &Expr) -> Vec<Diagnostic> {
    Validator::new().validate(root)
}

/// Parse and validate formula text. A parse failure is reported as a
/// single error diagnostic.
pub fn check_formula(text: &str, schema: Option<&ColumnSchema>) -> Vec<Diagnostic> {
    let mut validator = Validator::new();
    if let Some(schema) = schema {
        validator = validator.with_schema(schema.clone());
    }
    validator.check(text)
}

/// Diagnostics pass with optional column typing.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    schema: Option<ColumnSchema>,
    span: Span,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Type identifiers from `schema`; columns missing from it are errors.
    pub fn with_schema(mut self, schema: ColumnSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Span attached to every diagnostic.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn schema(&self) -> Option<&ColumnSchema> {
        self.schema.as_ref()
    }

    pub fn validate(&self, root: &Expr) -> Vec<Diagnostic> {
        let typed = annotate(root, self.schema.as_ref());
        let mut walk = Walk {
            schema: self.schema.as_ref(),
            span: self.span,
            diagnostics: Vec::new(),
        };
        walk.visit(&typed);
        debug!(
            diagnostics = walk.diagnostics.len(),
            root_type = %typed.data_type,
            "validated formula"
        );
        walk.diagnostics
    }

    /// Parse `text` and validate it over the span `0..text.len()`.
    pub fn check(&self, text: &str) -> Vec<Diagnostic> {
        match parse_formula(text) {
            Ok(expr) => self
                .clone()
                .with_span(Span::new(0, text.len()))
                .validate(&expr),
            Err(e) => {
                debug!(position = e.position, error = %e.message, "formula failed to parse");
                let start = e.position.min(text.len());
                vec![Diagnostic::new(
                    Severity::Error,
                    e.message,
                    Span::new(start, text.len()),
                )]
            }
        }
    }
}

struct Walk<'s> {
    schema: Option<&'s ColumnSchema>,
    span: Span,
    diagnostics: Vec<Diagnostic>,
}

impl Walk<'_> {
    fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(severity, message, self.span));
    }

    fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    fn visit(&mut self, node: &TypedExpr<'_>) {
        match node.expr {
            Expr::Literal(literal) => self.check_literal(literal, node.data_type),
            Expr::Identifier(name) => self.check_identifier(name),
            Expr::Binary { op, .. } => {
                if let [left, right] = node.children.as_slice() {
                    self.check_binary(op, left, right);
                }
            }
            Expr::Unary { op, .. } => {
                if let [operand] = node.children.as_slice() {
                    self.check_unary(op, operand);
                }
            }
            Expr::Call { name, .. } => self.check_call(name.as_deref(), &node.children),
            Expr::Unsupported(kind) => {
                self.error(format!("Unsupported expression type: {}", kind));
            }
        }
        for child in &node.children {
            self.visit(child);
        }
    }

    fn check_literal(&mut self, literal: &Literal, data_type: FormulaDataType) {
        match literal {
            Literal::String(s) if data_type == FormulaDataType::String && looks_like_date(s) => {
                self.info(format!(
                    "\"{}\" looks like a date but is used as Text. Use a date function if date operations are intended.",
                    s
                ));
            }
            Literal::Number(n) if n.abs() > MAX_SAFE_INTEGER => {
                self.warning(format!(
                    "Number {} exceeds safe integer limits and may lose precision",
                    format_number(*n)
                ));
            }
            _ => {}
        }
    }

    fn check_identifier(&mut self, name: &str) {
        if let Some(schema) = self.schema {
            if !schema.contains(name) {
                self.error(format!("Column '{}' not found", name));
            }
        }
    }

    fn check_binary(&mut self, op: &BinaryOperator, left: &TypedExpr<'_>, right: &TypedExpr<'_>) {
        use FormulaDataType as T;

        let (l, r) = (left.data_type, right.data_type);

        // Literal operand checks do not depend on the operand types.
        match op {
            BinaryOperator::Divide if right.expr.number_value() == Some(0.0) => {
                self.error("Division by zero will result in an error");
            }
            BinaryOperator::Concat if l == T::Null || r == T::Null => {
                self.info("Concatenating with a NULL value will result in NULL");
            }
            _ => {}
        }

        if l.is_silent() || r.is_silent() {
            return;
        }

        match op {
            BinaryOperator::Plus => {
                if l == T::String || r == T::String {
                    if l != r {
                        self.info(format!(
                            "Mixed types in addition: {} + {} will be converted to Text",
                            l, r
                        ));
                    }
                } else if matches!((l, r), (T::Date, T::Interval) | (T::Interval, T::Date)) {
                } else if l == T::Date && r == T::Date {
                    self.warning(
                        "Adding two dates is not valid. Use DATETIME_DIFF for date calculations.",
                    );
                } else if l != r {
                    self.warning(format!(
                        "Mixed types in addition: {} + {} may give unexpected results",
                        l, r
                    ));
                }
            }
            BinaryOperator::Minus => {
                if l == T::String || r == T::String {
                    self.error("Cannot subtract with Text type");
                } else if matches!((l, r), (T::Date, T::Date) | (T::Date, T::Interval)) {
                } else if l != r && !T::is_numeric_boolean_pair(l, r) {
                    self.warning(format!(
                        "Mixed types in subtraction: {} - {} may give unexpected results",
                        l, r
                    ));
                }
            }
            BinaryOperator::Multiply | BinaryOperator::Divide => {
                if l != T::Numeric || r != T::Numeric {
                    if T::is_numeric_boolean_pair(l, r) {
                        self.info("Boolean values in multiplication/division will be treated as 0 or 1");
                    } else {
                        let what = if *op == BinaryOperator::Multiply {
                            "Multiplication"
                        } else {
                            "Division"
                        };
                        self.error(format!(
                            "{} requires numeric values, but got {} and {}",
                            what, l, r
                        ));
                    }
                }
            }
            op if op.is_comparison() => {
                if l != r && !T::is_numeric_boolean_pair(l, r) {
                    self.warning(format!(
                        "Comparing different types: {} and {} may give unexpected results",
                        l, r
                    ));
                }
                let equality = matches!(
                    op,
                    BinaryOperator::Eq | BinaryOperator::EqEq | BinaryOperator::NotEq
                );
                if equality && (l == T::Date || r == T::Date) {
                    self.info("Exact date equality checks may be unreliable. Consider using date range comparisons.");
                }
            }
            BinaryOperator::Concat => {}
            op => {
                if l != r {
                    self.warning(format!("Mixed types with operator '{}': {} and {}", op, l, r));
                }
            }
        }
    }

    fn check_unary(&mut self, op: &UnaryOperator, operand: &TypedExpr<'_>) {
        let ty = operand.data_type;
        if ty.is_silent() {
            return;
        }
        match op {
            UnaryOperator::Minus => {
                if ty != FormulaDataType::Numeric {
                    self.error(format!("Negation operator requires a number, but got {}", ty));
                }
            }
            UnaryOperator::Not => {
                if !matches!(
                    ty,
                    FormulaDataType::Boolean
                        | FormulaDataType::Logical
                        | FormulaDataType::CondExp
                        | FormulaDataType::Numeric
                ) {
                    self.error(format!(
                        "NOT operator requires a boolean or condition, but got {}",
                        ty
                    ));
                }
            }
            UnaryOperator::Plus => {}
            UnaryOperator::Other(symbol) => {
                self.error(format!("Unsupported unary operator: {}", symbol));
            }
        }
    }

    fn check_call(&mut self, name: Option<&str>, args: &[TypedExpr<'_>]) {
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            self.error("Invalid function call");
            return;
        };
        let Some(sig) = registry::lookup(name) else {
            debug!(function = %name, "unknown function");
            self.error(format!("Unknown function: {}", name));
            return;
        };

        if let Some(message) = sig.check_arity(args.len()) {
            self.error(message);
        }
        self.check_function(sig.name, args);
        self.check_argument_types(sig, args);
    }

    fn check_function(&mut self, name: &str, args: &[TypedExpr<'_>]) {
        match name {
            "IF" => self.check_if(args),
            "SWITCH" => self.check_switch(args),
            "CONCAT" => {
                if args.iter().any(|a| a.data_type == FormulaDataType::Null) {
                    self.warning("CONCAT with NULL values will result in NULL");
                }
            }
            "LEN" => {
                if arg_type(args, 0) == Some(FormulaDataType::Null) {
                    self.info("LEN() with NULL input will return NULL");
                }
            }
            "TRIM" | "UPPER" | "LOWER" => {
                if arg_type(args, 0) == Some(FormulaDataType::Null) {
                    self.info(format!("{} with NULL input will return NULL", name));
                }
            }
            "LEFT" | "RIGHT" | "MID" | "SUBSTR" => {
                if number_arg(args, 1).is_some_and(|n| n < 0.0) {
                    self.error("Position/length parameter cannot be negative");
                }
                let has_length = matches!(name, "MID" | "SUBSTR");
                if has_length && number_arg(args, 2).is_some_and(|n| n <= 0.0) {
                    self.error("Length parameter must be positive");
                }
            }
            "SEARCH" => {
                if string_arg(args, 1) == Some("") {
                    self.warning("Search string cannot be empty");
                }
            }
            "REPLACE" => {
                if string_arg(args, 2) == Some("") {
                    self.info(
                        "Replacing with empty string will remove all occurrences of the search string",
                    );
                }
            }
            "REPEAT" => match number_arg(args, 1) {
                Some(n) if n < 0.0 => self.error("REPEAT count cannot be negative"),
                Some(n) if n > LARGE_REPEAT_COUNT => {
                    self.warning("Very large REPEAT count may cause performance issues")
                }
                _ => {}
            },
            "URL" => {
                if let Some(url) = string_arg(args, 0) {
                    let lower = url.to_ascii_lowercase();
                    if !lower.starts_with("http://") && !lower.starts_with("https://") {
                        self.warning("URL should start with http:// or https://");
                    }
                }
            }
            "REGEX_MATCH" | "REGEX_EXTRACT" | "REGEX_REPLACE" => {
                if let Some(pattern) = string_arg(args, 1) {
                    if let Err(e) = fancy_regex::Regex::new(pattern) {
                        self.error(format!("Invalid regular expression: {}", e));
                    }
                }
            }
            "ROUND" | "ROUNDUP" | "ROUNDDOWN" => {
                if let Some(p) = number_arg(args, 1) {
                    if p < 0.0 || p > MAX_ROUND_PRECISION || p.fract() != 0.0 {
                        self.warning("Rounding precision should be a non-negative integer (0-20)");
                    }
                }
            }
            "MOD" => {
                if number_arg(args, 1) == Some(0.0) {
                    self.error("MOD by zero will result in an error");
                }
            }
            "LOG" => self.check_log(args),
            "POWER" => {
                if let (Some(base), Some(exp)) = (number_arg(args, 0), number_arg(args, 1)) {
                    if base == 0.0 && exp < 0.0 {
                        self.error("Cannot raise zero to a negative power");
                    }
                }
            }
            "SQRT" => {
                if number_arg(args, 0).is_some_and(|n| n < 0.0) {
                    self.error("Cannot take square root of negative number");
                }
            }
            "DATEADD" => {
                if let Some(unit) = string_arg(args, 2) {
                    if DateUnit::parse(unit).is_none() {
                        self.error(format!(
                            "Invalid time unit: \"{}\". Use {}.",
                            unit,
                            quoted_choices(DateUnit::NAMES)
                        ));
                    }
                }
            }
            "DATETIME_DIFF" => {
                if let Some(unit) = string_arg(args, 2) {
                    if DiffUnit::parse(unit).is_none() {
                        self.error(format!("Invalid time unit: \"{}\".", unit));
                    }
                }
            }
            "WEEKDAY" => {
                if let Some(day) = string_arg(args, 1) {
                    if parse_weekday(day).is_none() {
                        self.error(format!(
                            "Invalid start day: \"{}\". Use a day name like \"monday\"",
                            day
                        ));
                    }
                }
            }
            "AND" | "OR" | "XOR" => {
                for arg in args {
                    if !arg.data_type.is_conditional() && !arg.data_type.is_silent() {
                        self.warning(format!("{} expects boolean values or conditions", name));
                    }
                }
            }
            "VALUE" => {
                if let Some(text) = string_arg(args, 0) {
                    let convertible = NUMBER_LIKE
                        .as_ref()
                        .is_some_and(|re| re.is_match(text));
                    if !convertible {
                        self.warning(format!("\"{}\" may not be convertible to a number", text));
                    }
                }
            }
            "ARRAYSORT" => {
                if let Some(direction) = string_arg(args, 1) {
                    if !matches!(direction.to_ascii_lowercase().as_str(), "asc" | "desc") {
                        self.error(format!(
                            "Invalid sort direction: \"{}\". Use \"asc\" or \"desc\".",
                            direction
                        ));
                    }
                }
            }
            "ARRAYSLICE" => {
                let start = number_arg(args, 1);
                let end = number_arg(args, 2);
                if [start, end]
                    .into_iter()
                    .flatten()
                    .any(|n| n < 1.0 || n.fract() != 0.0)
                {
                    self.error("ARRAYSLICE positions must be whole numbers starting at 1");
                } else if let (Some(start), Some(end)) = (start, end) {
                    if end < start {
                        self.warning("ARRAYSLICE end is before start, the result is empty");
                    }
                }
            }
            "JSON_EXTRACT" => {
                if let Some(document) = string_arg(args, 0) {
                    if let Err(e) = serde_json::from_str::<serde_json::Value>(document) {
                        self.error(format!("Invalid JSON: {}", e));
                    }
                }
                if let Some(path) = string_arg(args, 1) {
                    if !path.starts_with('.') && !path.starts_with('[') {
                        self.warning("JSON path should start with '.' or '['");
                    }
                }
            }
            _ => {}
        }
    }

    fn check_if(&mut self, args: &[TypedExpr<'_>]) {
        if let Some(cond) = arg_type(args, 0) {
            if !cond.is_conditional() && !cond.is_silent() {
                self.warning(format!(
                    "First argument of IF should be a condition, but got {}",
                    cond
                ));
            }
        }
        if let (Some(then), Some(otherwise)) = (arg_type(args, 1), arg_type(args, 2)) {
            if then != otherwise && !then.is_silent() && !otherwise.is_silent() {
                self.info(format!(
                    "IF branches return different types: {} and {}",
                    then, otherwise
                ));
            }
        }
    }

    fn check_switch(&mut self, args: &[TypedExpr<'_>]) {
        // SWITCH(expr, pattern1, value1, ..., [default])
        let types: Vec<FormulaDataType> = args.iter().map(|a| a.data_type).collect();
        let mut seen: Vec<FormulaDataType> = Vec::new();
        for ty in registry::switch_value_types(&types) {
            if !ty.is_silent() && !seen.contains(&ty) {
                seen.push(ty);
            }
        }
        if seen.len() > 1 {
            let labels: Vec<&str> = seen.iter().map(|t| t.label()).collect();
            self.info(format!(
                "SWITCH branches return multiple types: {}",
                labels.join(", ")
            ));
        }
    }

    /// `LOG(x)` is the natural log; `LOG(base, x)` takes the base first.
    fn check_log(&mut self, args: &[TypedExpr<'_>]) {
        let value_index = if args.len() > 1 {
            if number_arg(args, 0).is_some_and(|b| b <= 0.0 || b == 1.0) {
                self.error("Logarithm base must be positive and not equal to 1");
            }
            1
        } else {
            0
        };
        if number_arg(args, value_index).is_some_and(|v| v <= 0.0) {
            self.error("Cannot take logarithm of non-positive number");
        }
    }

    fn check_argument_types(&mut self, sig: &FunctionSignature, args: &[TypedExpr<'_>]) {
        // Logical functions accept conditions, booleans and numbers alike.
        if matches!(sig.name, "AND" | "OR" | "XOR") {
            return;
        }
        for (i, arg) in args.iter().enumerate() {
            let Some(expected) = sig.expected_arg_type(i) else {
                continue;
            };
            let actual = arg.data_type;
            if actual.is_silent() || actual == expected {
                continue;
            }
            if FormulaDataType::is_numeric_boolean_pair(expected, actual) {
                self.info(format!(
                    "Argument {} of {} expects {}. Boolean will be treated as 0 or 1.",
                    i + 1,
                    sig.name,
                    expected
                ));
            } else {
                self.warning(format!(
                    "Argument {} of {} should be {}, but got {}",
                    i + 1,
                    sig.name,
                    expected,
                    actual
                ));
            }
        }
    }
}

fn arg_type(args: &[TypedExpr<'_>], index: usize) -> Option<FormulaDataType> {
    args.get(index).map(|a| a.data_type)
}

fn number_arg(args: &[TypedExpr<'_>], index: usize) -> Option<f64> {
    args.get(index).and_then(|a| a.expr.number_value())
}

fn string_arg<'a>(args: &[TypedExpr<'a>], index: usize) -> Option<&'a str> {
    args.get(index).and_then(|a| a.expr.string_value())
}

/// `"a", "b", or "c"`
fn quoted_choices(names: &[&str]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("\"{}\"", n)).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{}, or {}", rest.join(", "), last),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(formula: &str) -> Vec<Diagnostic> {
        validate(&parse_formula(formula).unwrap())
    }

    fn count(diags: &[Diagnostic], severity: Severity) -> usize {
        diags.iter().filter(|d| d.severity == severity).count()
    }

    fn messages(diags: &[Diagnostic]) -> Vec<&str> {
        diags.iter().map(|d| d.message.as_str()).collect()
    }

    fn typed_schema() -> ColumnSchema {
        ColumnSchema::new()
            .with_column("price", FormulaDataType::Numeric)
            .with_column("name", FormulaDataType::String)
            .with_column("due", FormulaDataType::Date)
            .with_column("start", FormulaDataType::Date)
            .with_column("done", FormulaDataType::Boolean)
            .with_column("grace", FormulaDataType::Interval)
    }

    fn check_typed(formula: &str) -> Vec<Diagnostic> {
        check_formula(formula, Some(&typed_schema()))
    }

    #[test]
    fn test_subtracting_text_is_one_error() {
        let diags = check("'abc' - 5");
        assert_eq!(count(&diags, Severity::Error), 1);
        assert_eq!(diags[0].message, "Cannot subtract with Text type");
    }

    #[test]
    fn test_division_by_zero() {
        let diags = check("5/0");
        assert!(diags
            .iter()
            .any(|d| d.is_error() && d.message == "Division by zero will result in an error"));
        assert!(check("{a} / 0").iter().any(|d| d.is_error()));
        assert!(check("5 / 2").is_empty());
    }

    #[test]
    fn test_if_numeric_condition_and_branch_mismatch() {
        let diags = check("IF(5, 'a', 1)");
        assert_eq!(count(&diags, Severity::Error), 0);
        assert_eq!(count(&diags, Severity::Info), 1);
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags[0].message,
            "IF branches return different types: Text and Number"
        );

        let diags = check("IF('yes', 1, 2)");
        assert_eq!(
            messages(&diags),
            vec!["First argument of IF should be a condition, but got Text"]
        );
        assert!(check("IF({a} > 1, 'x', BLANK())").is_empty());
    }

    #[test]
    fn test_avg_flags_text_argument_only() {
        let diags = check("AVG('x', 1, 2)");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert_eq!(diags[0].message, "Argument 1 of AVG should be Number, but got Text");
    }

    #[test]
    fn test_boolean_argument_is_info() {
        let diags = check("ABS(true)");
        assert_eq!(
            messages(&diags),
            vec!["Argument 1 of ABS expects Number. Boolean will be treated as 0 or 1."]
        );
        assert_eq!(diags[0].severity, Severity::Info);
    }

    #[test]
    fn test_addition_rules() {
        let diags = check("'a' + 1");
        assert_eq!(
            messages(&diags),
            vec!["Mixed types in addition: Text + Number will be converted to Text"]
        );
        assert!(check_typed("{due} + {grace}").is_empty());
        let diags = check_typed("{due} + {start}");
        assert_eq!(count(&diags, Severity::Warning), 1);
        assert!(diags[0].message.starts_with("Adding two dates"));
        assert!(check("1 + {unknown}").is_empty());
    }

    #[test]
    fn test_subtraction_rules() {
        assert!(check_typed("{due} - {start}").is_empty());
        assert!(check_typed("{due} - {grace}").is_empty());
        assert!(check_typed("{price} - {done}").is_empty());
        let diags = check_typed("{price} - {due}");
        assert_eq!(
            messages(&diags),
            vec!["Mixed types in subtraction: Number - Date may give unexpected results"]
        );
    }

    #[test]
    fn test_multiplication_rules() {
        let diags = check_typed("{price} * {done}");
        assert_eq!(count(&diags, Severity::Info), 1);
        let diags = check_typed("{name} * 2");
        assert_eq!(
            messages(&diags),
            vec!["Multiplication requires numeric values, but got Text and Number"]
        );
        let diags = check_typed("{due} / {price}");
        assert_eq!(
            messages(&diags),
            vec!["Division requires numeric values, but got Date and Number"]
        );
    }

    #[test]
    fn test_comparison_rules() {
        let diags = check_typed("{name} > 3");
        assert_eq!(count(&diags, Severity::Warning), 1);
        assert!(check_typed("{price} = {done}").is_empty());
        let diags = check_typed("{due} = {start}");
        assert_eq!(count(&diags, Severity::Info), 1);
        assert!(check_typed("{due} < {start}").is_empty());
    }

    #[test]
    fn test_concat_operator_with_null() {
        let diags = check("{a} & null");
        assert_eq!(
            messages(&diags),
            vec!["Concatenating with a NULL value will result in NULL"]
        );
    }

    #[test]
    fn test_unary_rules() {
        let diags = check("-'abc'");
        assert_eq!(
            messages(&diags),
            vec!["Negation operator requires a number, but got Text"]
        );
        let diags = check("!'abc'");
        assert_eq!(count(&diags, Severity::Error), 1);
        assert!(check("!1").is_empty());
        assert!(check("-{a}").is_empty());

        let expr = Expr::unary(UnaryOperator::Other("~".to_string()), Expr::number(1.0));
        assert_eq!(
            messages(&validate(&expr)),
            vec!["Unsupported unary operator: ~"]
        );
    }

    #[test]
    fn test_unknown_function_still_visits_arguments() {
        let diags = check("FOO('a' - 1)");
        assert_eq!(
            messages(&diags),
            vec!["Unknown function: FOO", "Cannot subtract with Text type"]
        );
        let expr = Expr::Call {
            name: None,
            args: vec![],
        };
        assert_eq!(messages(&validate(&expr)), vec!["Invalid function call"]);
    }

    #[test]
    fn test_unsupported_node_does_not_hide_siblings() {
        let expr = Expr::call(
            "CONCAT",
            vec![
                Expr::Unsupported("MemberExpression".to_string()),
                Expr::binary(BinaryOperator::Divide, Expr::number(1.0), Expr::number(0.0)),
            ],
        );
        let diags = validate(&expr);
        assert_eq!(
            messages(&diags),
            vec![
                "Unsupported expression type: MemberExpression",
                "Division by zero will result in an error"
            ]
        );
    }

    #[test]
    fn test_arity() {
        let diags = check("MID('abc', 1)");
        assert_eq!(
            messages(&diags),
            vec!["MID requires exactly 3 argument(s)"]
        );
        assert!(check("NOW(1)").iter().any(|d| d.is_error()));
    }

    #[test]
    fn test_string_function_literals() {
        assert_eq!(
            messages(&check("LEFT({s}, -1)")),
            vec!["Position/length parameter cannot be negative"]
        );
        assert_eq!(
            messages(&check("MID({s}, 1, 0)")),
            vec!["Length parameter must be positive"]
        );
        assert_eq!(
            messages(&check("SEARCH({s}, '')")),
            vec!["Search string cannot be empty"]
        );
        assert_eq!(count(&check("REPLACE({s}, 'a', '')"), Severity::Info), 1);
        assert_eq!(
            messages(&check("REPEAT({s}, -2)")),
            vec!["REPEAT count cannot be negative"]
        );
        assert_eq!(count(&check("REPEAT({s}, 5000)"), Severity::Warning), 1);
        assert_eq!(count(&check("UPPER(null)"), Severity::Info), 1);
        assert_eq!(count(&check("LEN(null)"), Severity::Info), 1);
        assert_eq!(count(&check("CONCAT({a}, null, null)"), Severity::Warning), 1);
    }

    #[test]
    fn test_regex_and_url_literals() {
        let diags = check("REGEX_MATCH({s}, '(a')");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.starts_with("Invalid regular expression: "));
        assert!(check("REGEX_MATCH({s}, '^a(?=b)')").is_empty());
        assert_eq!(
            messages(&check("URL('example.com')")),
            vec!["URL should start with http:// or https://"]
        );
        assert!(check("URL('HTTPS://example.com')").is_empty());
    }

    #[test]
    fn test_numeric_function_literals() {
        assert_eq!(count(&check("ROUND({a}, 2.5)"), Severity::Warning), 1);
        assert_eq!(count(&check("ROUND({a}, 21)"), Severity::Warning), 1);
        assert!(check("ROUND({a}, 2)").is_empty());
        assert_eq!(
            messages(&check("MOD({a}, 0)")),
            vec!["MOD by zero will result in an error"]
        );
        assert_eq!(
            messages(&check("LOG(1, {a})")),
            vec!["Logarithm base must be positive and not equal to 1"]
        );
        assert_eq!(
            messages(&check("LOG(-3)")),
            vec!["Cannot take logarithm of non-positive number"]
        );
        assert!(check("LOG(10)").is_empty());
        assert_eq!(
            messages(&check("POWER(0, -1)")),
            vec!["Cannot raise zero to a negative power"]
        );
        assert_eq!(
            messages(&check("SQRT(-4)")),
            vec!["Cannot take square root of negative number"]
        );
    }

    #[test]
    fn test_date_function_vocabulary() {
        let diags = check("DATEADD({d}, 1, 'fortnight')");
        assert_eq!(diags.len(), 1);
        assert!(diags[0]
            .message
            .starts_with("Invalid time unit: \"fortnight\". Use \"day\", \"week\""));
        assert!(diags[0].message.ends_with(", or \"second\"."));
        assert!(check("DATEADD({d}, 1, 'months')").is_empty());
        assert_eq!(
            messages(&check("DATETIME_DIFF({a}, {b}, 'eons')")),
            vec!["Invalid time unit: \"eons\"."]
        );
        assert!(check("DATETIME_DIFF({a}, {b}, 'M')").is_empty());
        assert_eq!(
            messages(&check("WEEKDAY({d}, 'someday')")),
            vec!["Invalid start day: \"someday\". Use a day name like \"monday\""]
        );
        assert!(check("WEEKDAY({d}, 'Friday')").is_empty());
    }

    #[test]
    fn test_date_typed_arguments() {
        assert!(check("DATEADD('2024-01-31', 1, 'month')").is_empty());
        let diags = check_typed("DAY({price})");
        assert_eq!(
            messages(&diags),
            vec!["Argument 1 of DAY should be Date, but got Number"]
        );
    }

    #[test]
    fn test_date_shaped_text_literal() {
        let diags = check("CONCAT('2024-01-01', 'x')");
        assert_eq!(count(&diags, Severity::Info), 1);
        assert!(diags[0].message.contains("looks like a date"));
    }

    #[test]
    fn test_logical_functions() {
        assert_eq!(
            messages(&check("AND('x', {a} > 1)")),
            vec!["AND expects boolean values or conditions"]
        );
        assert!(check("OR(1, {a} > 1, true)").is_empty());
        assert!(check("XOR({a}, {b})").is_empty());
    }

    #[test]
    fn test_switch_branch_types() {
        let diags = check("SWITCH({a}, 1, 'one', 2, 2, 'other')");
        assert_eq!(
            messages(&diags),
            vec!["SWITCH branches return multiple types: Text, Number"]
        );
        assert!(check("SWITCH({a}, 1, 'one', 2, 'two', BLANK())").is_empty());
    }

    #[test]
    fn test_value_and_json_literals() {
        assert!(check("VALUE('$1,200.50')").is_empty());
        assert_eq!(
            messages(&check("VALUE('twelve')")),
            vec!["\"twelve\" may not be convertible to a number"]
        );
        let diags = check("JSON_EXTRACT('{bad', '.a')");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.starts_with("Invalid JSON: "));
        assert_eq!(
            messages(&check("JSON_EXTRACT({doc}, 'a.b')")),
            vec!["JSON path should start with '.' or '['"]
        );
    }

    #[test]
    fn test_array_function_arguments() {
        assert!(check("ARRAYSORT({tags}, 'DESC')").is_empty());
        assert!(check("ARRAYSORT({tags})").is_empty());
        assert_eq!(
            messages(&check("ARRAYSORT({tags}, 'up')")),
            vec!["Invalid sort direction: \"up\". Use \"asc\" or \"desc\"."]
        );
        assert!(check("ARRAYSLICE({tags}, 2, 4)").is_empty());
        assert_eq!(
            messages(&check("ARRAYSLICE({tags}, 0)")),
            vec!["ARRAYSLICE positions must be whole numbers starting at 1"]
        );
        assert_eq!(
            messages(&check("ARRAYSLICE({tags}, 3, 1)")),
            vec!["ARRAYSLICE end is before start, the result is empty"]
        );
        assert_eq!(
            messages(&check("ARRAYSLICE({tags}, 'a')")),
            vec!["Argument 2 of ARRAYSLICE should be Number, but got Text"]
        );
        assert_eq!(
            messages(&check("ARRAYSLICE({tags})")),
            vec!["ARRAYSLICE requires at least 2 argument(s)"]
        );

        let schema = ColumnSchema::new()
            .with_column("tags", FormulaDataType::Array)
            .with_column("title", FormulaDataType::String);
        let checker = Validator::new().with_schema(schema);
        assert!(checker.check("ARRAYUNIQUE({tags})").is_empty());
        assert_eq!(
            messages(&checker.check("ARRAYCOMPACT({title})")),
            vec!["Argument 1 of ARRAYCOMPACT should be Array, but got Text"]
        );
    }

    #[test]
    fn test_large_number_literal() {
        let diags = check("9007199254740993 + 1");
        assert_eq!(count(&diags, Severity::Warning), 1);
        assert!(diags[0].message.contains("exceeds safe integer limits"));
    }

    #[test]
    fn test_schema_missing_column() {
        let diags = check_typed("{price} + {missing}");
        assert_eq!(messages(&diags), vec!["Column 'missing' not found"]);
        assert!(check("{missing} + 1").is_empty());
    }

    #[test]
    fn test_check_formula_spans() {
        let text = "'abc' - 5";
        let diags = check_formula(text, None);
        assert_eq!(diags[0].span, Span::new(0, text.len()));

        let diags = check_formula("1 +", None);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].is_error());
        assert_eq!(diags[0].span.end, 3);

        let expr = parse_formula("'abc' - 5").unwrap();
        assert_eq!(validate(&expr)[0].span, Span::new(0, 0));
    }
}
