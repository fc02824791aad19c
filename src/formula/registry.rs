//! Function registry.
//!
//! One `FunctionSignature` per formula function: arity rules, expected
//! argument types, and the return type. Both the validator and the SQL
//! compiler read arity and type contracts from here.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;

use super::types::FormulaDataType;
use FormulaDataType::{Array, Boolean, CondExp, Date, Null, Numeric, Unknown};

const TEXT: FormulaDataType = FormulaDataType::String;

/// Expected argument types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgTypes {
    /// One type for every checked position.
    Single(FormulaDataType),
    /// A type per position; positions past the end are unchecked.
    PerPosition(&'static [FormulaDataType]),
}

/// Return type of a function call.
#[derive(Debug, Clone, Copy)]
pub enum ReturnType {
    Fixed(FormulaDataType),
    /// Computed from the inferred argument types.
    Dynamic(fn(&[FormulaDataType]) -> FormulaDataType),
}

/// Arity and type contract of a formula function.
#[derive(Debug, Clone, Copy)]
pub struct FunctionSignature {
    pub name: &'static str,
    pub min_args: Option<usize>,
    pub max_args: Option<usize>,
    /// Exact argument count; takes precedence over min/max.
    pub required_args: Option<usize>,
    pub arg_types: Option<ArgTypes>,
    /// A `Single` arg type applies to every argument, not just the first.
    pub variadic: bool,
    pub return_type: ReturnType,
}

/// Serializable summary used by the CLI listing.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSummary {
    pub name: &'static str,
    pub arity: String,
    pub returns: String,
}

impl FunctionSignature {
    const fn new(name: &'static str, return_type: FormulaDataType) -> Self {
        Self {
            name,
            min_args: None,
            max_args: None,
            required_args: None,
            arg_types: None,
            variadic: false,
            return_type: ReturnType::Fixed(return_type),
        }
    }

    const fn dynamic(name: &'static str, f: fn(&[FormulaDataType]) -> FormulaDataType) -> Self {
        let mut sig = Self::new(name, Unknown);
        sig.return_type = ReturnType::Dynamic(f);
        sig
    }

    const fn required(mut self, n: usize) -> Self {
        self.required_args = Some(n);
        self
    }

    const fn min(mut self, n: usize) -> Self {
        self.min_args = Some(n);
        self
    }

    const fn max(mut self, n: usize) -> Self {
        self.max_args = Some(n);
        self
    }

    const fn args(mut self, ty: FormulaDataType) -> Self {
        self.arg_types = Some(ArgTypes::Single(ty));
        self
    }

    const fn each(mut self, ty: FormulaDataType) -> Self {
        self.arg_types = Some(ArgTypes::Single(ty));
        self.variadic = true;
        self
    }

    const fn positions(mut self, types: &'static [FormulaDataType]) -> Self {
        self.arg_types = Some(ArgTypes::PerPosition(types));
        self
    }

    /// Arity violation message for `count` arguments, if any.
    pub fn check_arity(&self, count: usize) -> Option<String> {
        if let Some(required) = self.required_args {
            if count != required {
                return Some(format!(
                    "{} requires exactly {} argument{}",
                    self.name,
                    required,
                    plural(required)
                ));
            }
            return None;
        }
        if let Some(min) = self.min_args {
            if count < min {
                return Some(format!(
                    "{} requires at least {} argument{}",
                    self.name,
                    min,
                    plural(min)
                ));
            }
        }
        if let Some(max) = self.max_args {
            if count > max {
                return Some(format!(
                    "{} accepts at most {} argument{}",
                    self.name,
                    max,
                    plural(max)
                ));
            }
        }
        None
    }

    /// Expected type of the argument at `index`, if the registry constrains it.
    pub fn expected_arg_type(&self, index: usize) -> Option<FormulaDataType> {
        match self.arg_types? {
            ArgTypes::PerPosition(types) => types.get(index).copied(),
            ArgTypes::Single(ty) => {
                if self.variadic {
                    return Some(ty);
                }
                let checked = self.max_args.or(self.required_args).unwrap_or(1);
                (index < checked).then_some(ty)
            }
        }
    }

    /// Result type given the inferred argument types.
    pub fn return_type(&self, arg_types: &[FormulaDataType]) -> FormulaDataType {
        match self.return_type {
            ReturnType::Fixed(ty) => ty,
            ReturnType::Dynamic(f) => f(arg_types),
        }
    }

    pub fn summary(&self) -> FunctionSummary {
        let arity = match (self.required_args, self.min_args, self.max_args) {
            (Some(n), _, _) => n.to_string(),
            (None, Some(min), Some(max)) if min == max => min.to_string(),
            (None, Some(min), Some(max)) => format!("{}..{}", min, max),
            (None, Some(min), None) => format!("{}+", min),
            (None, None, Some(max)) => format!("0..{}", max),
            (None, None, None) => "any".to_string(),
        };
        let returns = match self.return_type {
            ReturnType::Fixed(ty) => ty.label().to_string(),
            ReturnType::Dynamic(_) => "dynamic".to_string(),
        };
        FunctionSummary {
            name: self.name,
            arity,
            returns,
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "(s)"
    }
}

/// IF: branch types without NULL decide the result.
fn if_return_type(args: &[FormulaDataType]) -> FormulaDataType {
    branch_type(args.iter().skip(1).copied(), args.get(1).copied())
}

/// SWITCH: result positions decide the type.
fn switch_return_type(args: &[FormulaDataType]) -> FormulaDataType {
    let values = switch_value_types(args);
    branch_type(values.iter().copied(), values.first().copied())
}

/// Types of the result positions of a SWITCH call.
pub fn switch_value_types(args: &[FormulaDataType]) -> Vec<FormulaDataType> {
    let mut values: Vec<FormulaDataType> = args
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(i, _)| i % 2 == 0)
        .map(|(_, t)| *t)
        .collect();
    if args.len() > 1 && args.len() % 2 == 0 {
        if let Some(default) = args.last() {
            values.push(*default);
        }
    }
    values
}

fn branch_type(
    branches: impl Iterator<Item = FormulaDataType>,
    fallback: Option<FormulaDataType>,
) -> FormulaDataType {
    let mut seen: Vec<FormulaDataType> = Vec::new();
    for ty in branches.filter(|t| *t != Null) {
        if !seen.contains(&ty) {
            seen.push(ty);
        }
    }
    if seen.len() > 1 || seen.contains(&TEXT) {
        TEXT
    } else if seen.contains(&Numeric) {
        Numeric
    } else if seen.iter().any(|t| t.is_boolean()) {
        Boolean
    } else if seen.contains(&Date) {
        Date
    } else {
        fallback.unwrap_or(Unknown)
    }
}

const DATEADD_ARGS: &[FormulaDataType] = &[Date, Numeric, TEXT];
const DATETIME_DIFF_ARGS: &[FormulaDataType] = &[Date, Date, TEXT];
const WEEKDAY_ARGS: &[FormulaDataType] = &[Date, TEXT];
const STRING_NUMBER: &[FormulaDataType] = &[TEXT, Numeric];
const STRING_NUMBER_NUMBER: &[FormulaDataType] = &[TEXT, Numeric, Numeric];
const STRING_STRING: &[FormulaDataType] = &[TEXT, TEXT];
const REPEAT_ARGS: &[FormulaDataType] = &[TEXT, Numeric];
const ARRAYSORT_ARGS: &[FormulaDataType] = &[Array, TEXT];
const ARRAYSLICE_ARGS: &[FormulaDataType] = &[Array, Numeric, Numeric];

static SIGNATURES: &[FunctionSignature] = &[
    // numeric
    FunctionSignature::new("ADD", Numeric).min(1).each(Numeric),
    FunctionSignature::new("SUM", Numeric).min(1).each(Numeric),
    FunctionSignature::new("AVG", Numeric).min(1).each(Numeric),
    FunctionSignature::new("MIN", Numeric).min(1).each(Numeric),
    FunctionSignature::new("MAX", Numeric).min(1).each(Numeric),
    FunctionSignature::new("COUNT", Numeric).min(1),
    FunctionSignature::new("COUNTA", Numeric).min(1),
    FunctionSignature::new("COUNTALL", Numeric).min(1),
    FunctionSignature::new("ROUND", Numeric).min(1).max(2).args(Numeric),
    FunctionSignature::new("ROUNDUP", Numeric).min(1).max(2).args(Numeric),
    FunctionSignature::new("ROUNDDOWN", Numeric).min(1).max(2).args(Numeric),
    FunctionSignature::new("CEILING", Numeric).required(1).args(Numeric),
    FunctionSignature::new("FLOOR", Numeric).required(1).args(Numeric),
    FunctionSignature::new("ABS", Numeric).required(1).args(Numeric),
    FunctionSignature::new("INT", Numeric).required(1).args(Numeric),
    FunctionSignature::new("EVEN", Numeric).required(1).args(Numeric),
    FunctionSignature::new("ODD", Numeric).required(1).args(Numeric),
    FunctionSignature::new("SQRT", Numeric).required(1).args(Numeric),
    FunctionSignature::new("EXP", Numeric).required(1).args(Numeric),
    FunctionSignature::new("MOD", Numeric).required(2).args(Numeric),
    FunctionSignature::new("POWER", Numeric).required(2).args(Numeric),
    FunctionSignature::new("LOG", Numeric).min(1).max(2).args(Numeric),
    FunctionSignature::new("VALUE", Numeric).required(1),
    // string
    FunctionSignature::new("CONCAT", TEXT).min(1),
    FunctionSignature::new("TRIM", TEXT).required(1).args(TEXT),
    FunctionSignature::new("UPPER", TEXT).required(1).args(TEXT),
    FunctionSignature::new("LOWER", TEXT).required(1).args(TEXT),
    FunctionSignature::new("LEN", Numeric).required(1).args(TEXT),
    FunctionSignature::new("LEFT", TEXT).required(2).positions(STRING_NUMBER),
    FunctionSignature::new("RIGHT", TEXT).required(2).positions(STRING_NUMBER),
    FunctionSignature::new("MID", TEXT).required(3).positions(STRING_NUMBER_NUMBER),
    FunctionSignature::new("SUBSTR", TEXT).min(2).max(3).positions(STRING_NUMBER_NUMBER),
    FunctionSignature::new("SEARCH", Numeric).required(2).args(TEXT),
    FunctionSignature::new("REPLACE", TEXT).required(3).args(TEXT),
    FunctionSignature::new("REPEAT", TEXT).required(2).positions(REPEAT_ARGS),
    FunctionSignature::new("URL", TEXT).min(1).max(2).positions(STRING_STRING),
    FunctionSignature::new("URLENCODE", TEXT).required(1).args(TEXT),
    FunctionSignature::new("REGEX_MATCH", Numeric).required(2).args(TEXT),
    FunctionSignature::new("REGEX_EXTRACT", TEXT).required(2).args(TEXT),
    FunctionSignature::new("REGEX_REPLACE", TEXT).required(3).args(TEXT),
    FunctionSignature::new("JSON_EXTRACT", TEXT).min(2).max(2).positions(STRING_STRING),
    // date
    FunctionSignature::new("NOW", Date).required(0),
    FunctionSignature::new("DATEADD", Date).required(3).positions(DATEADD_ARGS),
    FunctionSignature::new("DATETIME_DIFF", Numeric).min(2).max(3).positions(DATETIME_DIFF_ARGS),
    FunctionSignature::new("DATESTR", TEXT).required(1).args(Date),
    FunctionSignature::new("DAY", Numeric).required(1).args(Date),
    FunctionSignature::new("MONTH", Numeric).required(1).args(Date),
    FunctionSignature::new("YEAR", Numeric).required(1).args(Date),
    FunctionSignature::new("HOUR", Numeric).required(1).args(Date),
    FunctionSignature::new("WEEKDAY", Numeric).min(1).max(2).positions(WEEKDAY_ARGS),
    // logical
    FunctionSignature::dynamic("IF", if_return_type).min(2).max(3),
    FunctionSignature::dynamic("SWITCH", switch_return_type).min(3),
    FunctionSignature::new("AND", CondExp).min(1).each(CondExp),
    FunctionSignature::new("OR", CondExp).min(1).each(CondExp),
    FunctionSignature::new("XOR", Boolean).min(1).each(CondExp),
    FunctionSignature::new("TRUE", Numeric).max(0),
    FunctionSignature::new("FALSE", Numeric).max(0),
    FunctionSignature::new("BLANK", Null).required(0),
    FunctionSignature::new("ISBLANK", Boolean).required(1),
    FunctionSignature::new("ISNOTBLANK", Boolean).required(1),
    // array
    FunctionSignature::new("ARRAYUNIQUE", Array).required(1).args(Array),
    FunctionSignature::new("ARRAYSORT", Array).min(1).max(2).positions(ARRAYSORT_ARGS),
    FunctionSignature::new("ARRAYCOMPACT", Array).required(1).args(Array),
    FunctionSignature::new("ARRAYSLICE", Array).min(2).max(3).positions(ARRAYSLICE_ARGS),
    // misc
    FunctionSignature::new("RECORD_ID", TEXT).required(0),
];

static REGISTRY: LazyLock<HashMap<&'static str, &'static FunctionSignature>> =
    LazyLock::new(|| SIGNATURES.iter().map(|sig| (sig.name, sig)).collect());

/// Look up a function by name (case-insensitive). `None` is an ordinary
/// outcome: the compiler passes such calls through, the validator rejects them.
pub fn lookup(name: &str) -> Option<&'static FunctionSignature> {
    REGISTRY.get(name.to_uppercase().as_str()).copied()
}

/// All registered functions in declaration order.
pub fn functions() -> impl Iterator<Item = &'static FunctionSignature> {
    SIGNATURES.iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_case_insensitive() {
        assert_eq!(lookup("concat").map(|s| s.name), Some("CONCAT"));
        assert_eq!(lookup("Dateadd").map(|s| s.name), Some("DATEADD"));
        assert!(lookup("NOPE").is_none());
    }

    #[test]
    fn test_names_unique() {
        assert_eq!(REGISTRY.len(), SIGNATURES.len());
    }

    #[test]
    fn test_arity_messages() {
        let mid = lookup("MID").unwrap();
        assert_eq!(
            mid.check_arity(2).as_deref(),
            Some("MID requires exactly 3 argument(s)")
        );
        assert_eq!(mid.check_arity(3), None);

        let avg = lookup("AVG").unwrap();
        assert_eq!(
            avg.check_arity(0).as_deref(),
            Some("AVG requires at least 1 argument")
        );

        let round = lookup("ROUND").unwrap();
        assert_eq!(
            round.check_arity(3).as_deref(),
            Some("ROUND accepts at most 2 argument(s)")
        );
        assert_eq!(lookup("TRUE").unwrap().check_arity(0), None);
    }

    #[test]
    fn test_expected_arg_types() {
        let left = lookup("LEFT").unwrap();
        assert_eq!(left.expected_arg_type(0), Some(TEXT));
        assert_eq!(left.expected_arg_type(1), Some(Numeric));
        assert_eq!(left.expected_arg_type(2), None);

        let avg = lookup("AVG").unwrap();
        assert_eq!(avg.expected_arg_type(5), Some(Numeric));

        let replace = lookup("REPLACE").unwrap();
        assert_eq!(replace.expected_arg_type(2), Some(TEXT));
        assert_eq!(replace.expected_arg_type(3), None);

        let round = lookup("ROUND").unwrap();
        assert_eq!(round.expected_arg_type(1), Some(Numeric));

        assert_eq!(lookup("CONCAT").unwrap().expected_arg_type(0), None);
    }

    #[test]
    fn test_if_return_type() {
        let sig = lookup("IF").unwrap();
        assert_eq!(sig.return_type(&[CondExp, Numeric, Numeric]), Numeric);
        assert_eq!(sig.return_type(&[CondExp, TEXT, Numeric]), TEXT);
        assert_eq!(sig.return_type(&[CondExp, Null, Date]), Date);
        assert_eq!(sig.return_type(&[CondExp, Boolean]), Boolean);
        assert_eq!(sig.return_type(&[CondExp, Null]), Null);
    }

    #[test]
    fn test_switch_value_types() {
        // SWITCH(expr, p1, v1, p2, v2, default)
        let args = [Numeric, Numeric, TEXT, Numeric, TEXT, TEXT];
        assert_eq!(switch_value_types(&args), vec![TEXT, TEXT, TEXT]);
        let args = [Numeric, Numeric, Date, Numeric, Date];
        assert_eq!(switch_value_types(&args), vec![Date, Date]);
        assert_eq!(lookup("SWITCH").unwrap().return_type(&args), Date);
    }

    #[test]
    fn test_summary() {
        assert_eq!(lookup("SUBSTR").unwrap().summary().arity, "2..3");
        assert_eq!(lookup("AVG").unwrap().summary().arity, "1+");
        assert_eq!(lookup("IF").unwrap().summary().returns, "dynamic");
        assert_eq!(lookup("ARRAYSLICE").unwrap().summary().arity, "2..3");
        assert_eq!(lookup("ARRAYSORT").unwrap().summary().returns, "Array");
    }
}
