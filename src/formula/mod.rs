/// Formula type checking and SQL compilation.
///
/// Two independent passes over one shared AST:
///
/// ```text
/// Input (formula text / jsep JSON)
///       ↓
/// Adapter Layer            (adapter.rs, parser.rs)
///       ↓
/// Formula AST              (types.rs)
///       ├──────────────────────────────┐
///       ↓                              ↓
/// Type Inference (infer.rs)      Canonical Rewrites (optimizer.rs)
///       ↓                              ↓
/// Diagnostics (validator.rs)     Dialect Lowering (compiler.rs, dialect/)
///       ↓                              ↓
/// Diagnostic list                SqlFragment (fragment.rs)
/// ```
///
/// Both passes read arity and type contracts from the function registry
/// (registry.rs). Neither depends on the other's output.
pub mod adapter;
pub mod compiler;
pub mod dialect;
pub mod formatter;
pub mod fragment;
pub mod infer;
pub mod optimizer;
pub mod parser;
pub mod registry;
pub mod types;
pub mod units;
pub mod validator;
pub mod verify;

// Re-export key types for convenience
pub use adapter::{AdapterRegistry, FormulaAdapter, FormulaTextAdapter, JsepJsonAdapter};
pub use compiler::{compile, CompileError, CompileNotice, CompileOptions, CompileOutput, Compiler};
pub use dialect::Dialect;
pub use formatter::format_formula;
pub use fragment::{SqlFragment, SqlValue};
pub use infer::{annotate, ColumnSchema, TypedExpr};
pub use optimizer::{analyze_formula, FormulaAnalysis, Optimizer, RewritePass};
pub use parser::{parse_formula, ParseError};
pub use registry::{lookup, FunctionSignature};
pub use types::*;
pub use validator::{check_formula, validate, Validator};
pub use verify::verify;
