/// Formula AST → SQL compiler.
///
/// Runs the canonical rewrite passes, then walks the tree and emits a
/// parameterized `SqlFragment` for one target dialect. Function calls are
/// dispatched through the dialect's lowering table; unknown functions are
/// passed through by name and reported as a `CompileNotice`.
///
/// Compilation is deterministic: the same `(expr, dialect, options)`
/// always produces byte-identical text and bindings.
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::dialect::{Dialect, DialectEntry};
use super::fragment::{sql, SqlFragment, SqlValue};
use super::optimizer::Optimizer;
use super::types::*;

/// Per-compilation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Output alias appended as `AS <alias>`.
    pub alias: Option<String>,
    /// Table alias qualifying every column reference.
    pub table_alias: Option<String>,
    /// Column that `RECORD_ID()` refers to.
    pub record_id_column: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            alias: None,
            table_alias: None,
            record_id_column: "id".to_string(),
        }
    }
}

/// Something the compiler could only handle on a best-effort basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CompileNotice {
    /// Unknown function emitted verbatim.
    PassThrough(String),
    /// Malformed or unsupported node, emitted as `NULL` or verbatim.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("unknown function '{0}' cannot be compiled")]
    PassThrough(String),
    #[error("unsupported expression: {0}")]
    Unsupported(String),
}

impl From<CompileNotice> for CompileError {
    fn from(notice: CompileNotice) -> Self {
        match notice {
            CompileNotice::PassThrough(name) => CompileError::PassThrough(name),
            CompileNotice::Unsupported(what) => CompileError::Unsupported(what),
        }
    }
}

/// A compiled fragment plus anything that degraded along the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileOutput {
    #[serde(flatten)]
    pub fragment: SqlFragment,
    pub notices: Vec<CompileNotice>,
}

/// Compile `root` for `dialect`, optionally aliased. Unknown functions
/// pass through unchanged; use `Compiler::compile` to see the notices.
pub fn compile(root: &Expr, dialect: Dialect, alias: Option<&str>) -> SqlFragment {
    let mut compiler = Compiler::new(dialect);
    if let Some(alias) = alias {
        compiler = compiler.with_alias(alias);
    }
    compiler.compile(root).fragment
}

/// Reusable compiler for one dialect and option set.
pub struct Compiler {
    dialect: Dialect,
    options: CompileOptions,
    optimizer: Optimizer,
}

impl Compiler {
    pub fn new(dialect: Dialect) -> Self {
        Self::with_options(dialect, CompileOptions::default())
    }

    pub fn with_options(dialect: Dialect, options: CompileOptions) -> Self {
        Self {
            dialect,
            options,
            optimizer: Optimizer::with_defaults(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.options.alias = Some(alias.into());
        self
    }

    pub fn with_table_alias(mut self, table_alias: impl Into<String>) -> Self {
        self.options.table_alias = Some(table_alias.into());
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile as a select-list value.
    pub fn compile(&self, root: &Expr) -> CompileOutput {
        let canonical = self.optimizer.rewrite(root.clone());
        let mut lowering = Lowering::new(self.dialect, &self.options);
        let mut fragment = lowering.value(&canonical);
        if let Some(alias) = &self.options.alias {
            fragment.push_str(" AS ");
            fragment.push_str(&self.dialect.quote_identifier(alias));
        }
        CompileOutput {
            fragment,
            notices: lowering.notices,
        }
    }

    /// Compile as a filter predicate (no alias).
    pub fn compile_condition(&self, root: &Expr) -> CompileOutput {
        let canonical = self.optimizer.rewrite(root.clone());
        let mut lowering = Lowering::new(self.dialect, &self.options);
        let fragment = lowering.condition(&canonical);
        CompileOutput {
            fragment,
            notices: lowering.notices,
        }
    }

    /// Like `compile`, but any pass-through or unsupported node is an error.
    pub fn compile_strict(&self, root: &Expr) -> Result<SqlFragment, CompileError> {
        let output = self.compile(root);
        match output.notices.into_iter().next() {
            Some(notice) => Err(notice.into()),
            None => Ok(output.fragment),
        }
    }
}

/// Recursive compilation state handed to lowering routines.
pub struct Lowering<'a> {
    dialect: Dialect,
    options: &'a CompileOptions,
    notices: Vec<CompileNotice>,
}

/// Position of a child under a binary operator.
#[derive(Clone, Copy)]
struct ParentOperator<'p> {
    op: &'p BinaryOperator,
    right: bool,
}

impl<'a> Lowering<'a> {
    fn new(dialect: Dialect, options: &'a CompileOptions) -> Self {
        Self {
            dialect,
            options,
            notices: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn options(&self) -> &CompileOptions {
        self.options
    }

    pub fn notice(&mut self, notice: CompileNotice) {
        if !self.notices.contains(&notice) {
            self.notices.push(notice);
        }
    }

    /// Compile without changing the fragment's shape.
    pub fn compile(&mut self, expr: &Expr) -> SqlFragment {
        self.compile_node(expr, None)
    }

    /// Compile in a value position.
    pub fn value(&mut self, expr: &Expr) -> SqlFragment {
        let fragment = self.compile(expr);
        self.to_value(fragment)
    }

    /// Value, parenthesized when it is an operator expression.
    pub fn operand(&mut self, expr: &Expr) -> SqlFragment {
        let fragment = self.value(expr);
        if needs_grouping(expr) {
            fragment.parenthesized()
        } else {
            fragment
        }
    }

    /// Compile in a condition position.
    pub fn condition(&mut self, expr: &Expr) -> SqlFragment {
        let fragment = self.compile(expr);
        let fragment = if !fragment.is_predicate() && needs_grouping(expr) {
            fragment.parenthesized()
        } else {
            fragment
        };
        self.to_condition(fragment)
    }

    /// Condition, parenthesized when it is an operator expression.
    pub fn condition_operand(&mut self, expr: &Expr) -> SqlFragment {
        let fragment = self.condition(expr);
        if needs_grouping(expr) && !fragment.text.starts_with('(') {
            fragment.parenthesized()
        } else {
            fragment
        }
    }

    /// Argument `index` as a value, or `NULL` when absent.
    pub fn arg(&mut self, args: &[Expr], index: usize) -> SqlFragment {
        match args.get(index) {
            Some(expr) => self.value(expr),
            None => SqlFragment::null(),
        }
    }

    /// Argument `index` as an operand, or `NULL` when absent.
    pub fn arg_operand(&mut self, args: &[Expr], index: usize) -> SqlFragment {
        match args.get(index) {
            Some(expr) => self.operand(expr),
            None => SqlFragment::null(),
        }
    }

    pub fn values(&mut self, args: &[Expr]) -> Vec<SqlFragment> {
        args.iter().map(|arg| self.value(arg)).collect()
    }

    /// `NAME(arg, ...)` with every argument compiled as a value.
    pub fn call_native(&mut self, name: &str, args: &[Expr]) -> SqlFragment {
        let args = self.values(args);
        let mut out = SqlFragment::raw(format!("{}(", name));
        out.push(SqlFragment::join(args, ", "));
        out.push_str(")");
        out
    }

    /// Predicate → value, where the dialect needs it.
    pub fn to_value(&self, fragment: SqlFragment) -> SqlFragment {
        if fragment.is_predicate() && !self.dialect.has_boolean_values() {
            sql!("CASE WHEN {} THEN 1 ELSE 0 END", fragment)
        } else {
            fragment.into_value()
        }
    }

    /// Value → predicate, where the dialect needs it.
    pub fn to_condition(&self, fragment: SqlFragment) -> SqlFragment {
        if fragment.is_predicate() {
            return fragment;
        }
        match self.dialect {
            Dialect::Mssql | Dialect::Oracle => sql!("{} <> 0", fragment).into_predicate(),
            Dialect::Postgres => sql!("CAST({} AS BOOLEAN)", fragment).into_predicate(),
            Dialect::Mysql | Dialect::Sqlite => fragment.into_predicate(),
        }
    }

    pub fn float(&self, fragment: SqlFragment) -> SqlFragment {
        sql!(&format!("CAST({{}} AS {})", self.dialect.float_type()), fragment)
    }

    pub fn text(&self, fragment: SqlFragment) -> SqlFragment {
        sql!(&format!("CAST({{}} AS {})", self.dialect.text_type()), fragment)
    }

    /// `a % b`, or `MOD(a, b)` where `%` is unavailable. Operands must
    /// already be grouped.
    pub fn modulo(&self, left: SqlFragment, right: SqlFragment) -> SqlFragment {
        if self.dialect.has_modulo_operator() {
            sql!("{} % {}", left, right)
        } else {
            sql!("MOD({}, {})", left, right)
        }
    }

    /// Quoted column reference, qualified by the table alias if set.
    pub fn column(&self, name: &str) -> SqlFragment {
        let quoted = self.dialect.quote_identifier(name);
        match &self.options.table_alias {
            Some(table) => SqlFragment::raw(format!(
                "{}.{}",
                self.dialect.quote_identifier(table),
                quoted
            )),
            None => SqlFragment::raw(quoted),
        }
    }

    fn compile_node(&mut self, expr: &Expr, parent: Option<ParentOperator<'_>>) -> SqlFragment {
        match expr {
            Expr::Literal(literal) => compile_literal(literal),
            Expr::Identifier(name) => self.column(name),
            Expr::Binary { op, left, right } => {
                let fragment = self.compile_binary(op, left, right);
                let group = parent.is_some_and(|p| p.op != op || (p.right && op.is_left_associative_only()));
                if group {
                    fragment.parenthesized()
                } else {
                    fragment
                }
            }
            Expr::Unary { op, operand } => self.compile_unary(op, operand),
            Expr::Call { name, args } => self.compile_call(name.as_deref(), args),
            Expr::Unsupported(kind) => {
                debug!(kind = %kind, "unsupported expression compiled as NULL");
                self.notice(CompileNotice::Unsupported(format!(
                    "expression type '{}'",
                    kind
                )));
                SqlFragment::null()
            }
        }
    }

    fn child(&mut self, expr: &Expr, op: &BinaryOperator, right: bool, as_condition: bool) -> SqlFragment {
        let fragment = self.compile_node(expr, Some(ParentOperator { op, right }));
        if as_condition {
            self.to_condition(fragment)
        } else {
            self.to_value(fragment)
        }
    }

    fn compile_binary(&mut self, op: &BinaryOperator, left: &Expr, right: &Expr) -> SqlFragment {
        match op {
            BinaryOperator::And | BinaryOperator::Or => {
                let l = self.child(left, op, false, true);
                let r = self.child(right, op, true, true);
                let keyword = if *op == BinaryOperator::And { "AND" } else { "OR" };
                sql!(&format!("{{}} {} {{}}", keyword), l, r).into_predicate()
            }
            op if op.is_comparison() => {
                let l = self.child(left, op, false, false);
                let r = self.child(right, op, true, false);
                let symbol = match op {
                    BinaryOperator::EqEq => "=",
                    BinaryOperator::NotEq => "<>",
                    other => other.symbol(),
                };
                sql!(&format!("{{}} {} {{}}", symbol), l, r).into_predicate()
            }
            BinaryOperator::Concat => {
                self.compile_call(Some("CONCAT"), &[left.clone(), right.clone()])
            }
            BinaryOperator::Modulo if !self.dialect.has_modulo_operator() => {
                let l = self.value(left);
                let r = self.value(right);
                sql!("MOD({}, {})", l, r)
            }
            BinaryOperator::Other(symbol) => {
                self.notice(CompileNotice::Unsupported(format!("operator '{}'", symbol)));
                let l = self.child(left, op, false, false);
                let r = self.child(right, op, true, false);
                sql!(&format!("{{}} {} {{}}", symbol), l, r)
            }
            _ => {
                let l = self.child(left, op, false, false);
                let r = self.child(right, op, true, false);
                sql!(&format!("{{}} {} {{}}", op.symbol()), l, r)
            }
        }
    }

    fn compile_unary(&mut self, op: &UnaryOperator, operand: &Expr) -> SqlFragment {
        match op {
            UnaryOperator::Minus => match operand.number_value() {
                Some(n) => SqlFragment::bind(SqlValue::Number(-n)),
                None => {
                    let inner = self.value(operand);
                    if needs_grouping(operand) {
                        sql!("-({})", inner)
                    } else {
                        sql!("-{}", inner)
                    }
                }
            },
            UnaryOperator::Plus => self.compile(operand),
            UnaryOperator::Not => {
                let inner = self.condition(operand);
                sql!("NOT ({})", inner).into_predicate()
            }
            UnaryOperator::Other(symbol) => {
                self.notice(CompileNotice::Unsupported(format!(
                    "unary operator '{}'",
                    symbol
                )));
                let inner = self.operand(operand);
                sql!(&format!("{}{{}}", symbol), inner)
            }
        }
    }

    fn compile_call(&mut self, name: Option<&str>, args: &[Expr]) -> SqlFragment {
        let Some(name) = name else {
            debug!("call without a function name compiled as NULL");
            self.notice(CompileNotice::Unsupported(
                "function call without a name".to_string(),
            ));
            return SqlFragment::null();
        };
        let upper = name.to_uppercase();
        match self.dialect.entry(&upper) {
            Some(DialectEntry::Rename(native)) => self.call_native(native, args),
            Some(DialectEntry::Lower(lower)) => lower(self, args),
            None => {
                debug!(function = %name, dialect = %self.dialect, "passing unknown function through");
                self.notice(CompileNotice::PassThrough(name.to_string()));
                self.call_native(name, args)
            }
        }
    }
}

fn compile_literal(literal: &Literal) -> SqlFragment {
    match literal {
        Literal::Number(n) => SqlFragment::bind(SqlValue::Number(*n)),
        Literal::String(s) => SqlFragment::bind(SqlValue::Text(s.clone())),
        Literal::Boolean(b) => SqlFragment::bind(SqlValue::Boolean(*b)),
        Literal::Null => SqlFragment::null(),
    }
}

/// Operator expressions need parentheses when embedded in larger SQL.
fn needs_grouping(expr: &Expr) -> bool {
    match expr {
        Expr::Binary { .. } => true,
        Expr::Unary { op, operand } => {
            *op == UnaryOperator::Minus && operand.number_value().is_none()
        }
        _ => false,
    }
}
