/// Canonical rewrite passes and formula analysis.
///
/// Before any dialect sees a formula, the compiler runs an ordered pipeline
/// of rewrite passes that reduce sugar to a small canonical core (so the
/// per-dialect lowering tables can stay small). Each pass is a pure,
/// bottom-up tree transformation.
use serde::Serialize;

use super::registry;
use super::types::*;

/// A single rewrite over a formula tree.
///
/// # Example
///
/// ```ignore
/// struct UppercaseCalls;
///
/// impl RewritePass for UppercaseCalls {
///     fn name(&self) -> &str { "uppercase_calls" }
///     fn transform(&self, expr: Expr) -> Expr {
///         map_bottom_up(expr, &|e| match e {
///             Expr::Call { name, args } => Expr::Call { name: name.map(|n| n.to_uppercase()), args },
///             other => other,
///         })
///     }
/// }
/// ```
pub trait RewritePass: Send + Sync {
    /// Unique name identifying this pass.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Rewrite a tree, returning it unchanged if nothing applies.
    fn transform(&self, expr: Expr) -> Expr;
}

/// Runs rewrite passes in order.
#[derive(Default)]
pub struct Optimizer {
    passes: Vec<Box<dyn RewritePass>>,
}

impl Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical pipeline used by the compiler. Order matters: AVG
    /// expands into SUM and a division, which the later passes rewrite.
    pub fn with_defaults() -> Self {
        let mut opt = Self::new();
        opt.add_pass(Box::new(ExpandAverage));
        opt.add_pass(Box::new(FoldSum));
        opt.add_pass(Box::new(ExpandUrl));
        opt.add_pass(Box::new(ConcatOperator));
        opt.add_pass(Box::new(NormalizeEquality));
        opt.add_pass(Box::new(FloatDivision));
        opt
    }

    pub fn add_pass(&mut self, pass: Box<dyn RewritePass>) {
        self.passes.push(pass);
    }

    pub fn rewrite(&self, expr: Expr) -> Expr {
        self.passes
            .iter()
            .fold(expr, |current, pass| pass.transform(current))
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }
}

/// Apply `f` to every node, children first.
pub fn map_bottom_up(expr: Expr, f: &dyn Fn(Expr) -> Expr) -> Expr {
    let rebuilt = match expr {
        Expr::Binary { op, left, right } => Expr::Binary {
            op,
            left: Box::new(map_bottom_up(*left, f)),
            right: Box::new(map_bottom_up(*right, f)),
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op,
            operand: Box::new(map_bottom_up(*operand, f)),
        },
        Expr::Call { name, args } => Expr::Call {
            name,
            args: args.into_iter().map(|a| map_bottom_up(a, f)).collect(),
        },
        leaf => leaf,
    };
    f(rebuilt)
}

fn is_call_to(expr: &Expr, names: &[&str]) -> bool {
    expr.call_name()
        .is_some_and(|name| names.contains(&name.as_str()))
}

/// `ADD(a, b, c)` → `a + (b + c)`; one argument is the argument itself;
/// none is `NULL`.
pub fn fold_sum(mut args: Vec<Expr>) -> Expr {
    let Some(last) = args.pop() else {
        return Expr::Literal(Literal::Null);
    };
    args.into_iter()
        .rev()
        .fold(last, |acc, arg| Expr::binary(BinaryOperator::Plus, arg, acc))
}

/// `AVG(a, b)` → `SUM(a, b) / 2`; one argument is the argument itself.
pub fn expand_average(mut args: Vec<Expr>) -> Expr {
    match args.len() {
        0 => Expr::Literal(Literal::Null),
        1 => args.remove(0),
        n => Expr::binary(
            BinaryOperator::Divide,
            Expr::call("SUM", args),
            Expr::number(n as f64),
        ),
    }
}

/// `URL(u, label)` → `CONCAT('URI::(', u, ')', ' LABEL::(', label, ')')`.
pub fn expand_url(args: Vec<Expr>) -> Expr {
    let mut args = args.into_iter();
    let mut parts = vec![Expr::string("URI::(")];
    parts.push(args.next().unwrap_or(Expr::Literal(Literal::Null)));
    parts.push(Expr::string(")"));
    if let Some(label) = args.next() {
        parts.push(Expr::string(" LABEL::("));
        parts.push(label);
        parts.push(Expr::string(")"));
    }
    Expr::call("CONCAT", parts)
}

struct ExpandAverage;

impl RewritePass for ExpandAverage {
    fn name(&self) -> &str {
        "expand_average"
    }

    fn description(&self) -> &str {
        "Rewrites AVG(a, b, ...) as SUM(a, b, ...) / n"
    }

    fn transform(&self, expr: Expr) -> Expr {
        map_bottom_up(expr, &|e| match e {
            Expr::Call { name, args } if is_named(&name, "AVG") && !args.is_empty() => {
                expand_average(args)
            }
            other => other,
        })
    }
}

struct FoldSum;

impl RewritePass for FoldSum {
    fn name(&self) -> &str {
        "fold_sum"
    }

    fn description(&self) -> &str {
        "Folds ADD/SUM arguments into a chain of +"
    }

    fn transform(&self, expr: Expr) -> Expr {
        map_bottom_up(expr, &|e| match e {
            Expr::Call { name, args } if is_foldable_sum(&name) && !args.is_empty() => {
                fold_sum(args)
            }
            other => other,
        })
    }
}

fn is_named(name: &Option<String>, expected: &str) -> bool {
    name.as_deref()
        .is_some_and(|n| n.eq_ignore_ascii_case(expected))
}

/// ADD and SUM take any number of numeric arguments per the registry.
fn is_foldable_sum(name: &Option<String>) -> bool {
    match name.as_deref() {
        Some(n) if n.eq_ignore_ascii_case("ADD") || n.eq_ignore_ascii_case("SUM") => {
            registry::lookup(n).is_some_and(|sig| sig.variadic && sig.max_args.is_none())
        }
        _ => false,
    }
}

struct ExpandUrl;

impl RewritePass for ExpandUrl {
    fn name(&self) -> &str {
        "expand_url"
    }

    fn transform(&self, expr: Expr) -> Expr {
        map_bottom_up(expr, &|e| match e {
            Expr::Call { name, args } if is_named(&name, "URL") && !args.is_empty() => {
                expand_url(args)
            }
            other => other,
        })
    }
}

struct ConcatOperator;

impl RewritePass for ConcatOperator {
    fn name(&self) -> &str {
        "concat_operator"
    }

    fn description(&self) -> &str {
        "Rewrites a & b as CONCAT(a, b), flattening chains"
    }

    fn transform(&self, expr: Expr) -> Expr {
        map_bottom_up(expr, &|e| match e {
            Expr::Binary {
                op: BinaryOperator::Concat,
                left,
                right,
            } => {
                let mut parts = Vec::new();
                for side in [*left, *right] {
                    match side {
                        Expr::Call { name, args } if is_named(&name, "CONCAT") => {
                            parts.extend(args)
                        }
                        other => parts.push(other),
                    }
                }
                Expr::call("CONCAT", parts)
            }
            other => other,
        })
    }
}

struct NormalizeEquality;

impl RewritePass for NormalizeEquality {
    fn name(&self) -> &str {
        "normalize_equality"
    }

    fn transform(&self, expr: Expr) -> Expr {
        map_bottom_up(expr, &|e| match e {
            Expr::Binary {
                op: BinaryOperator::EqEq,
                left,
                right,
            } => Expr::Binary {
                op: BinaryOperator::Eq,
                left,
                right,
            },
            other => other,
        })
    }
}

struct FloatDivision;

impl RewritePass for FloatDivision {
    fn name(&self) -> &str {
        "float_division"
    }

    fn description(&self) -> &str {
        "Casts the dividend to a float so no dialect truncates"
    }

    fn transform(&self, expr: Expr) -> Expr {
        map_bottom_up(expr, &|e| match e {
            Expr::Binary {
                op: BinaryOperator::Divide,
                left,
                right,
            } if !is_call_to(&left, &["FLOAT"]) => Expr::Binary {
                op: BinaryOperator::Divide,
                left: Box::new(Expr::call("FLOAT", vec![*left])),
                right,
            },
            other => other,
        })
    }
}

/// Structural facts about a formula.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormulaAnalysis {
    /// Referenced columns, first-seen order, deduplicated.
    pub columns: Vec<String>,
    /// Called functions (upper-case), first-seen order, deduplicated.
    pub functions: Vec<String>,
    /// Called functions missing from the registry.
    pub unknown_functions: Vec<String>,
    pub depth: usize,
}

pub fn analyze_formula(expr: &Expr) -> FormulaAnalysis {
    let mut analysis = FormulaAnalysis::default();
    analysis.depth = analyze_inner(expr, &mut analysis);
    analysis
}

fn analyze_inner(expr: &Expr, analysis: &mut FormulaAnalysis) -> usize {
    match expr {
        Expr::Identifier(name) => {
            if !analysis.columns.contains(name) {
                analysis.columns.push(name.clone());
            }
        }
        Expr::Call { .. } => {
            if let Some(name) = expr.call_name() {
                if registry::lookup(&name).is_none() && !analysis.unknown_functions.contains(&name) {
                    analysis.unknown_functions.push(name.clone());
                }
                if !analysis.functions.contains(&name) {
                    analysis.functions.push(name);
                }
            }
        }
        _ => {}
    }
    1 + expr
        .children()
        .into_iter()
        .map(|child| analyze_inner(child, analysis))
        .max()
        .unwrap_or(0)
}
