/// Input adapters.
///
/// Each adapter turns one input representation into the shared `Expr`
/// tree: formula text through the built-in parser, or the jsep-shaped
/// JSON tree produced by browser-side formula editors.
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::debug;

use super::parser::parse_formula;
use super::types::*;

/// Converts some input format into an `Expr`.
///
/// # Example
///
/// ```ignore
/// struct SExprAdapter;
///
/// impl FormulaAdapter for SExprAdapter {
///     fn name(&self) -> &str { "S-expression" }
///     fn parse(&self, input: &str) -> Result<Expr> { ... }
///     fn can_handle(&self, input: &str) -> bool { input.trim_start().starts_with('(') }
/// }
/// ```
pub trait FormulaAdapter: Send + Sync {
    /// Human-readable name of the input format.
    fn name(&self) -> &str;

    fn parse(&self, input: &str) -> Result<Expr>;

    /// Used for auto-detection of the input format.
    fn can_handle(&self, input: &str) -> bool;
}

/// Formula text, e.g. `IF({qty} > 0, {price} * {qty}, 0)`.
pub struct FormulaTextAdapter;

impl FormulaAdapter for FormulaTextAdapter {
    fn name(&self) -> &str {
        "Formula"
    }

    fn parse(&self, input: &str) -> Result<Expr> {
        Ok(parse_formula(input)?)
    }

    fn can_handle(&self, input: &str) -> bool {
        !input.trim().is_empty()
    }
}

/// A jsep expression tree serialized as JSON.
pub struct JsepJsonAdapter;

impl FormulaAdapter for JsepJsonAdapter {
    fn name(&self) -> &str {
        "jsep JSON"
    }

    fn parse(&self, input: &str) -> Result<Expr> {
        let value: Value = serde_json::from_str(input).context("invalid JSON expression tree")?;
        Ok(expr_from_json(&value))
    }

    fn can_handle(&self, input: &str) -> bool {
        // `{Column} + 1` also starts with a brace, so require a JSON object.
        input.trim_start().starts_with('{')
            && serde_json::from_str::<Value>(input).is_ok_and(|v| v.is_object())
    }
}

/// Convert one jsep node. Missing fields degrade instead of failing:
/// absent arguments are an empty list, an absent callee is a nameless
/// call, and unknown node types become `Expr::Unsupported`.
pub fn expr_from_json(value: &Value) -> Expr {
    let Some(node) = value.as_object() else {
        return Expr::Unsupported("undefined".to_string());
    };
    let kind = node.get("type").and_then(Value::as_str).unwrap_or("undefined");
    match kind {
        "Literal" => literal(node),
        "Identifier" => match node.get("name").and_then(Value::as_str) {
            Some(name) => Expr::Identifier(name.to_string()),
            None => Expr::Unsupported(kind.to_string()),
        },
        "BinaryExpression" | "LogicalExpression" => Expr::Binary {
            op: BinaryOperator::from_symbol(operator(node)),
            left: Box::new(child(node, "left")),
            right: Box::new(child(node, "right")),
        },
        "UnaryExpression" => Expr::Unary {
            op: UnaryOperator::from_symbol(operator(node)),
            operand: Box::new(child(node, "argument")),
        },
        "CallExpression" => {
            let name = node
                .get("callee")
                .and_then(|callee| callee.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let args = node
                .get("arguments")
                .and_then(Value::as_array)
                .map(|args| args.iter().map(expr_from_json).collect())
                .unwrap_or_default();
            Expr::Call { name, args }
        }
        other => {
            debug!(node_type = %other, "unsupported expression node");
            Expr::Unsupported(other.to_string())
        }
    }
}

fn operator(node: &Map<String, Value>) -> &str {
    node.get("operator").and_then(Value::as_str).unwrap_or("")
}

fn child(node: &Map<String, Value>, key: &str) -> Expr {
    match node.get(key) {
        Some(value) => expr_from_json(value),
        None => Expr::Unsupported("undefined".to_string()),
    }
}

fn literal(node: &Map<String, Value>) -> Expr {
    match node.get("value") {
        None | Some(Value::Null) => Expr::Literal(Literal::Null),
        Some(Value::Bool(b)) => Expr::Literal(Literal::Boolean(*b)),
        Some(Value::String(s)) => Expr::Literal(Literal::String(s.clone())),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(n) => Expr::number(n),
            None => Expr::Unsupported("Literal".to_string()),
        },
        Some(_) => Expr::Unsupported("Literal".to_string()),
    }
}

/// Picks the first adapter that accepts the input.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn FormulaAdapter>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        let mut registry = Self {
            adapters: Vec::new(),
        };
        // JSON first: the text adapter accepts anything non-empty.
        registry.register(Box::new(JsepJsonAdapter));
        registry.register(Box::new(FormulaTextAdapter));
        registry
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Box<dyn FormulaAdapter>) {
        self.adapters.push(adapter);
    }

    /// Parse input using the first adapter that can handle it.
    pub fn parse(&self, input: &str) -> Result<Expr> {
        for adapter in &self.adapters {
            if adapter.can_handle(input) {
                debug!(adapter = adapter.name(), "parsing formula input");
                return adapter.parse(input);
            }
        }
        anyhow::bail!("No adapter found that can handle this input")
    }

    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }
}
