//! Lowerings shared by every dialect unless overridden.

use super::{Dialect, DialectEntry};
use crate::formula::compiler::{CompileNotice, Lowering};
use crate::formula::fragment::{sql, SqlFragment};
use crate::formula::optimizer::{expand_average, expand_url, fold_sum};
use crate::formula::types::{BinaryOperator, Expr};
use crate::formula::units::{
    parse_weekday, weekday_needs_wrap, weekday_offset, DateUnit, DiffUnit,
};

use DialectEntry::{Lower, Rename};

pub(super) fn entries() -> Vec<(&'static str, DialectEntry)> {
    vec![
        ("FLOAT", Lower(float)),
        // arithmetic
        ("ADD", Lower(add)),
        ("SUM", Lower(add)),
        ("AVG", Lower(avg)),
        ("MIN", Lower(min)),
        ("MAX", Lower(max)),
        ("COUNT", Lower(count)),
        ("COUNTA", Lower(counta)),
        ("COUNTALL", Lower(countall)),
        ("ROUND", Lower(round)),
        ("ROUNDUP", Lower(roundup)),
        ("ROUNDDOWN", Lower(rounddown)),
        ("CEILING", Lower(ceiling)),
        ("FLOOR", Lower(floor)),
        ("ABS", Rename("ABS")),
        ("EVEN", Lower(even)),
        ("ODD", Lower(odd)),
        ("MOD", Lower(modulo)),
        ("POWER", Rename("POWER")),
        ("SQRT", Rename("SQRT")),
        ("EXP", Rename("EXP")),
        ("LOG", Lower(log)),
        // text
        ("CONCAT", Rename("CONCAT")),
        ("TRIM", Rename("TRIM")),
        ("UPPER", Rename("UPPER")),
        ("LOWER", Rename("LOWER")),
        ("LEN", Rename("LENGTH")),
        ("LEFT", Rename("LEFT")),
        ("RIGHT", Rename("RIGHT")),
        ("MID", Rename("SUBSTR")),
        ("SUBSTR", Rename("SUBSTR")),
        ("REPLACE", Rename("REPLACE")),
        ("REPEAT", Rename("REPEAT")),
        ("URL", Lower(url)),
        ("URLENCODE", Lower(urlencode)),
        ("REGEX_EXTRACT", Rename("REGEXP_SUBSTR")),
        ("REGEX_REPLACE", Rename("REGEXP_REPLACE")),
        // logical
        ("IF", Lower(if_)),
        ("SWITCH", Lower(switch)),
        ("AND", Lower(and)),
        ("OR", Lower(or)),
        ("XOR", Lower(xor)),
        ("TRUE", Lower(true_)),
        ("FALSE", Lower(false_)),
        ("BLANK", Lower(blank)),
        ("ISBLANK", Lower(isblank)),
        ("ISNOTBLANK", Lower(isnotblank)),
        ("RECORD_ID", Lower(record_id)),
        // lookup arrays
        ("ARRAYUNIQUE", Lower(lookup_array)),
        ("ARRAYSORT", Lower(lookup_array)),
        ("ARRAYCOMPACT", Lower(lookup_array)),
        ("ARRAYSLICE", Lower(lookup_array)),
    ]
}

fn float(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let value = l.arg(args, 0);
    l.float(value)
}

fn add(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    l.value(&fold_sum(args.to_vec()))
}

fn avg(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    l.value(&expand_average(args.to_vec()))
}

fn url(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    l.value(&expand_url(args.to_vec()))
}

/// A single argument is returned unchanged; otherwise `NAME(a, b, ...)`.
pub(super) fn variadic_or_single(l: &mut Lowering<'_>, name: &str, args: &[Expr]) -> SqlFragment {
    if args.len() == 1 {
        l.value(&args[0])
    } else {
        l.call_native(name, args)
    }
}

fn min(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    variadic_or_single(l, "LEAST", args)
}

fn max(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    variadic_or_single(l, "GREATEST", args)
}

/// `(CASE WHEN a THEN 1 ELSE 0 END + ...)` over one predicate per argument.
fn count_matching(
    l: &mut Lowering<'_>,
    args: &[Expr],
    test: fn(&mut Lowering<'_>, &Expr) -> SqlFragment,
) -> SqlFragment {
    if args.is_empty() {
        return SqlFragment::raw("0");
    }
    let terms = args
        .iter()
        .map(|arg| {
            let predicate = test(l, arg);
            sql!("CASE WHEN {} THEN 1 ELSE 0 END", predicate)
        })
        .collect();
    SqlFragment::join(terms, " + ").parenthesized()
}

fn is_not_null(l: &mut Lowering<'_>, arg: &Expr) -> SqlFragment {
    let value = l.operand(arg);
    sql!("{} IS NOT NULL", value)
}

fn is_not_blank(l: &mut Lowering<'_>, arg: &Expr) -> SqlFragment {
    not_blank_predicate(l, arg)
}

fn count(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    count_matching(l, args, is_not_null)
}

fn counta(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    count_matching(l, args, is_not_blank)
}

fn countall(_l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    SqlFragment::raw(args.len().to_string())
}

fn precision(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    if args.len() > 1 {
        l.arg(args, 1)
    } else {
        SqlFragment::raw("0")
    }
}

fn round(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let value = l.arg(args, 0);
    let digits = precision(l, args);
    sql!("ROUND({}, {})", value, digits)
}

/// Native ceiling; SQLite has no CEIL without the math extension.
pub(super) fn ceil_of(dialect: Dialect, value: SqlFragment) -> SqlFragment {
    match dialect {
        Dialect::Mssql => sql!("CEILING({})", value),
        Dialect::Sqlite => sql!(
            "(CAST({} AS INTEGER) + ({} > CAST({} AS INTEGER)))",
            value.clone(),
            value.clone(),
            value
        ),
        _ => sql!("CEIL({})", value),
    }
}

pub(super) fn floor_of(dialect: Dialect, value: SqlFragment) -> SqlFragment {
    match dialect {
        Dialect::Sqlite => sql!(
            "(CAST({} AS INTEGER) - ({} < CAST({} AS INTEGER)))",
            value.clone(),
            value.clone(),
            value
        ),
        _ => sql!("FLOOR({})", value),
    }
}

fn round_directed(
    l: &mut Lowering<'_>,
    args: &[Expr],
    direction: fn(Dialect, SqlFragment) -> SqlFragment,
) -> SqlFragment {
    let value = l.arg_operand(args, 0);
    let digits = precision(l, args);
    let scaled = sql!("{} * POWER(10.0, {})", value, digits.clone());
    let rounded = direction(l.dialect(), scaled);
    sql!("({} / POWER(10.0, {}))", rounded, digits)
}

fn roundup(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    round_directed(l, args, ceil_of)
}

fn rounddown(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    round_directed(l, args, floor_of)
}

fn ceiling(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let value = l.arg(args, 0);
    ceil_of(l.dialect(), value)
}

fn floor(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let value = l.arg(args, 0);
    floor_of(l.dialect(), value)
}

/// Round away from zero to the nearest even integer.
fn even(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let value = l.arg(args, 0);
    let dialect = l.dialect();
    let half = sql!("{} / 2", l.float(value.clone()));
    let up = ceil_of(dialect, half.clone());
    let down = floor_of(dialect, half);
    sql!(
        "CASE WHEN {} >= 0 THEN {} * 2 ELSE {} * 2 END",
        value,
        up,
        down
    )
}

/// Round away from zero to the nearest odd integer.
fn odd(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let value = l.arg(args, 0);
    let dialect = l.dialect();
    let up = ceil_of(dialect, sql!("({} + 1) / 2", l.float(value.clone())));
    let down = floor_of(dialect, sql!("({} - 1) / 2", l.float(value.clone())));
    sql!(
        "CASE WHEN {} >= 0 THEN {} * 2 - 1 ELSE {} * 2 + 1 END",
        value,
        up,
        down
    )
}

fn modulo(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let left = l.arg_operand(args, 0);
    let right = l.arg_operand(args, 1);
    grouped_modulo(l, left, right)
}

/// `l.modulo`, parenthesized where it is an infix `%`.
pub(super) fn grouped_modulo(
    l: &Lowering<'_>,
    left: SqlFragment,
    right: SqlFragment,
) -> SqlFragment {
    let out = l.modulo(left, right);
    if l.dialect().has_modulo_operator() {
        out.parenthesized()
    } else {
        out
    }
}

/// `LOG(x)` is the natural log; `LOG(base, x)` uses the given base.
fn log(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    if args.len() < 2 {
        let value = l.arg(args, 0);
        return sql!("LN({})", value);
    }
    let base = l.arg(args, 0);
    let value = l.arg(args, 1);
    sql!("LOG({}, {})", base, value)
}

/// Characters escaped by URLENCODE; `%` must be replaced first.
const URL_ESCAPES: &[(&str, &str)] = &[
    ("%", "%25"),
    (" ", "%20"),
    ("\"", "%22"),
    ("#", "%23"),
    ("&", "%26"),
    ("+", "%2B"),
    (",", "%2C"),
    ("/", "%2F"),
    (":", "%3A"),
    (";", "%3B"),
    ("=", "%3D"),
    ("?", "%3F"),
    ("@", "%40"),
];

fn urlencode(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    URL_ESCAPES
        .iter()
        .fold(l.arg(args, 0), |inner, (from, to)| {
            sql!(&format!("REPLACE({{}}, '{}', '{}')", from, to), inner)
        })
}

fn if_(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let condition = match args.first() {
        Some(expr) => l.condition(expr),
        None => SqlFragment::raw("1 = 0"),
    };
    let then = l.arg(args, 1);
    if args.len() > 2 {
        let otherwise = l.arg(args, 2);
        sql!("CASE WHEN {} THEN {} ELSE {} END", condition, then, otherwise)
    } else {
        sql!("CASE WHEN {} THEN {} END", condition, then)
    }
}

/// `SWITCH(expr, p1, v1, p2, v2, ..., [default])` → simple CASE.
fn switch(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let mut out = SqlFragment::raw("CASE ");
    out.push(l.arg(args, 0));
    let rest = args.get(1..).unwrap_or_default();
    let mut pairs = rest.chunks_exact(2);
    for pair in pairs.by_ref() {
        let pattern = l.value(&pair[0]);
        let result = l.value(&pair[1]);
        out.push(sql!(" WHEN {} THEN {}", pattern, result));
    }
    if let [default] = pairs.remainder() {
        let default = l.value(default);
        out.push(sql!(" ELSE {}", default));
    }
    out.push_str(" END");
    out
}

fn logical_chain(l: &mut Lowering<'_>, args: &[Expr], op: BinaryOperator) -> SqlFragment {
    let keyword = if op == BinaryOperator::And { " AND " } else { " OR " };
    if args.len() == 1 {
        return l.condition(&args[0]);
    }
    let parts = args.iter().map(|arg| l.condition_operand(arg)).collect();
    SqlFragment::join(parts, keyword)
        .parenthesized()
        .into_predicate()
}

fn and(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    logical_chain(l, args, BinaryOperator::And)
}

fn or(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    logical_chain(l, args, BinaryOperator::Or)
}

/// True when an odd number of arguments are true.
fn xor(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let terms = args
        .iter()
        .map(|arg| {
            let condition = l.condition(arg);
            sql!("CASE WHEN {} THEN 1 ELSE 0 END", condition)
        })
        .collect();
    let total = SqlFragment::join(terms, " + ").parenthesized();
    let parity = l.modulo(total, SqlFragment::raw("2"));
    sql!("({} = 1)", parity).into_predicate()
}

fn true_(_l: &mut Lowering<'_>, _args: &[Expr]) -> SqlFragment {
    SqlFragment::raw("1")
}

fn false_(_l: &mut Lowering<'_>, _args: &[Expr]) -> SqlFragment {
    SqlFragment::raw("0")
}

fn blank(_l: &mut Lowering<'_>, _args: &[Expr]) -> SqlFragment {
    SqlFragment::null()
}

/// Oracle stores '' as NULL, so a NULL test is enough there.
fn not_blank_predicate(l: &mut Lowering<'_>, arg: &Expr) -> SqlFragment {
    let value = l.operand(arg);
    if l.dialect() == Dialect::Oracle {
        return sql!("{} IS NOT NULL", value).into_predicate();
    }
    let text = l.text(value.clone());
    sql!("{} IS NOT NULL AND {} <> ''", value, text).into_predicate()
}

fn isblank(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let Some(arg) = args.first() else {
        return SqlFragment::raw("1 = 1").into_predicate();
    };
    let value = l.operand(arg);
    if l.dialect() == Dialect::Oracle {
        return sql!("{} IS NULL", value).into_predicate();
    }
    let text = l.text(value.clone());
    sql!("({} IS NULL OR {} = '')", value, text).into_predicate()
}

fn isnotblank(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let Some(arg) = args.first() else {
        return SqlFragment::raw("1 = 0").into_predicate();
    };
    not_blank_predicate(l, arg).parenthesized()
}

fn record_id(l: &mut Lowering<'_>, _args: &[Expr]) -> SqlFragment {
    let column = l.options().record_id_column.clone();
    l.column(&column)
}

/// Array functions operate on the rows a lookup column gathers from a
/// linked table. A row-level expression has no such rows, so the call
/// compiles to `NULL` with a notice.
fn lookup_array(l: &mut Lowering<'_>, _args: &[Expr]) -> SqlFragment {
    l.notice(CompileNotice::Unsupported(
        "array functions over lookup columns".to_string(),
    ));
    SqlFragment::null()
}

/// `(native + k) % 7` so that `start` maps to 0, given a dialect's
/// native weekday expression.
pub(super) fn weekday_index(
    l: &mut Lowering<'_>,
    args: &[Expr],
    native: fn(SqlFragment) -> SqlFragment,
) -> SqlFragment {
    let date = l.arg(args, 0);
    let start = match args.get(1) {
        None => chrono::Weekday::Mon,
        Some(arg) => match arg.string_value().and_then(parse_weekday) {
            Some(day) => day,
            None => {
                l.notice(CompileNotice::Unsupported(
                    "WEEKDAY start day that is not a literal day name".to_string(),
                ));
                chrono::Weekday::Mon
            }
        },
    };
    let native = native(date);
    if !weekday_needs_wrap(l.dialect(), start) {
        return native;
    }
    let offset = weekday_offset(l.dialect(), start);
    let shifted = if offset == 0 {
        native
    } else {
        sql!(&format!("({{}} + {})", offset), native)
    };
    grouped_modulo(l, shifted, SqlFragment::raw("7"))
}

/// Characters a number-like string may carry besides digits, `.` and `-`.
pub(super) const NUMBER_FORMATTING: [&str; 8] = ["$", "€", "£", "¥", ",", "%", "+", " "];

/// `text` with currency symbols, separators, signs and spaces removed,
/// `NULL` when nothing is left. For dialects without a regex replace.
pub(super) fn strip_number_formatting(text: SqlFragment) -> SqlFragment {
    let stripped = NUMBER_FORMATTING.iter().fold(text, |inner, ch| {
        sql!(&format!("REPLACE({{}}, '{}', '')", ch), inner)
    });
    sql!("NULLIF({}, '')", stripped)
}

/// Unit argument of `DATEADD`; day when absent or not a literal.
pub(super) fn date_unit(args: &[Expr], index: usize) -> DateUnit {
    args.get(index)
        .and_then(Expr::string_value)
        .and_then(DateUnit::parse)
        .unwrap_or(DateUnit::Day)
}

/// Unit argument of `DATETIME_DIFF`; seconds when absent or not a literal.
pub(super) fn diff_unit(args: &[Expr], index: usize) -> DiffUnit {
    args.get(index)
        .and_then(Expr::string_value)
        .and_then(DiffUnit::parse)
        .unwrap_or(DiffUnit::Seconds)
}

/// A day count converted to a fixed-length unit. `None` for calendar
/// units, which have no fixed length.
pub(super) fn scale_days(days: SqlFragment, unit: DiffUnit) -> Option<SqlFragment> {
    let scaled = match unit {
        DiffUnit::Milliseconds => sql!("{} * 86400000", days),
        DiffUnit::Seconds => sql!("{} * 86400", days),
        DiffUnit::Minutes => sql!("{} * 1440", days),
        DiffUnit::Hours => sql!("{} * 24", days),
        DiffUnit::Days => return Some(days),
        DiffUnit::Weeks => sql!("{} / 7", days),
        DiffUnit::Months | DiffUnit::Quarters | DiffUnit::Years => return None,
    };
    Some(scaled.parenthesized())
}

/// `a || b || ...` for dialects without a variadic CONCAT. With
/// `null_safe`, NULL parts become '' instead of nulling the result;
/// nested CONCAT calls are already null-safe and stay unwrapped.
pub(super) fn pipe_concat(l: &mut Lowering<'_>, args: &[Expr], null_safe: bool) -> SqlFragment {
    let parts: Vec<SqlFragment> = args
        .iter()
        .map(|arg| {
            let nested = is_concat(arg);
            let part = l.operand(arg);
            if null_safe && !nested {
                sql!("COALESCE({}, '')", part)
            } else {
                part
            }
        })
        .collect();
    match parts.len() {
        0 => SqlFragment::raw("''"),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => SqlFragment::join(parts, " || ").parenthesized(),
    }
}

fn is_concat(expr: &Expr) -> bool {
    expr.call_name().is_some_and(|name| name == "CONCAT")
}

/// `LEFT(s, n)` as `SUBSTR(s, 1, n)`.
pub(super) fn substr_left(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    let count = l.arg(args, 1);
    sql!("SUBSTR({}, 1, {})", text, count)
}

/// `RIGHT(s, n)` as `SUBSTR(s, -n)`.
pub(super) fn substr_right(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    let count = l.arg_operand(args, 1);
    sql!("SUBSTR({}, -{})", text, count)
}

/// `DAY(d)` and friends as `EXTRACT(FIELD FROM d)`.
pub(super) fn extract_field(
    l: &mut Lowering<'_>,
    args: &[Expr],
    field: &str,
    cast: Option<&str>,
) -> SqlFragment {
    let date = l.arg(args, 0);
    let source = match cast {
        Some(ty) => sql!(&format!("CAST({{}} AS {})", ty), date),
        None => date,
    };
    sql!(&format!("EXTRACT({} FROM {{}})", field), source)
}

#[cfg(test)]
mod tests {
    use crate::formula::compiler::{compile, CompileNotice, Compiler};
    use crate::formula::dialect::Dialect;
    use crate::formula::fragment::SqlValue;
    use crate::formula::parser::parse_formula;

    fn sql_of(formula: &str, dialect: Dialect) -> String {
        compile(&parse_formula(formula).unwrap(), dialect, None).text
    }

    #[test]
    fn test_if_compiles_to_case() {
        assert_eq!(
            sql_of("IF({a} > 1, 'big', 'small')", Dialect::Postgres),
            "CASE WHEN \"a\" > ? THEN ? ELSE ? END"
        );
        assert_eq!(
            sql_of("IF({flag}, 1)", Dialect::Mssql),
            "CASE WHEN [flag] <> 0 THEN ? END"
        );
    }

    #[test]
    fn test_switch_compiles_to_simple_case() {
        assert_eq!(
            sql_of("SWITCH({s}, 1, 'one', 2, 'two', 'many')", Dialect::Sqlite),
            "CASE \"s\" WHEN ? THEN ? WHEN ? THEN ? ELSE ? END"
        );
        assert_eq!(
            sql_of("SWITCH({s}, 1, 'one')", Dialect::Sqlite),
            "CASE \"s\" WHEN ? THEN ? END"
        );
    }

    #[test]
    fn test_and_or_chains() {
        assert_eq!(
            sql_of("AND({a} > 1, {b})", Dialect::Mysql),
            "((`a` > ?) AND `b`)"
        );
        assert_eq!(
            sql_of("OR({a} > 1, {b} < 2)", Dialect::Oracle),
            "CASE WHEN ((\"a\" > ?) OR (\"b\" < ?)) THEN 1 ELSE 0 END"
        );
    }

    #[test]
    fn test_xor_parity() {
        assert_eq!(
            sql_of("XOR({a}, {b})", Dialect::Oracle),
            "CASE WHEN (MOD((CASE WHEN \"a\" <> 0 THEN 1 ELSE 0 END + CASE WHEN \"b\" <> 0 THEN 1 ELSE 0 END), 2) = 1) THEN 1 ELSE 0 END"
        );
    }

    #[test]
    fn test_blank_checks() {
        assert_eq!(
            sql_of("ISBLANK({a})", Dialect::Postgres),
            "(\"a\" IS NULL OR CAST(\"a\" AS TEXT) = '')"
        );
        assert_eq!(
            sql_of("ISBLANK({a})", Dialect::Oracle),
            "CASE WHEN \"a\" IS NULL THEN 1 ELSE 0 END"
        );
        assert_eq!(
            sql_of("ISNOTBLANK({a})", Dialect::Sqlite),
            "(\"a\" IS NOT NULL AND CAST(\"a\" AS TEXT) <> '')"
        );
    }

    #[test]
    fn test_counts() {
        assert_eq!(sql_of("COUNTALL(a, b, c)", Dialect::Mysql), "3");
        assert_eq!(
            sql_of("COUNT(a, b)", Dialect::Sqlite),
            "(CASE WHEN \"a\" IS NOT NULL THEN 1 ELSE 0 END + CASE WHEN \"b\" IS NOT NULL THEN 1 ELSE 0 END)"
        );
    }

    #[test]
    fn test_min_max() {
        assert_eq!(sql_of("MIN(a, b)", Dialect::Postgres), "LEAST(\"a\", \"b\")");
        assert_eq!(sql_of("MAX(a)", Dialect::Mysql), "`a`");
    }

    #[test]
    fn test_round_variants() {
        assert_eq!(sql_of("ROUND(a)", Dialect::Mysql), "ROUND(`a`, 0)");
        assert_eq!(
            sql_of("ROUNDUP(a, 2)", Dialect::Mysql),
            "(CEIL(`a` * POWER(10.0, ?)) / POWER(10.0, ?))"
        );
        assert_eq!(
            sql_of("ROUNDDOWN(a + 1, 1)", Dialect::Mssql),
            "(FLOOR(([a] + ?) * POWER(10.0, ?)) / POWER(10.0, ?))"
        );
    }

    #[test]
    fn test_negative_precision_uses_decimal_power() {
        let fragment = compile(
            &parse_formula("ROUNDUP(a, -1)").unwrap(),
            Dialect::Mssql,
            None,
        );
        assert_eq!(
            fragment.text,
            "(CEILING([a] * POWER(10.0, ?)) / POWER(10.0, ?))"
        );
        assert_eq!(
            fragment.bindings,
            vec![SqlValue::Number(-1.0), SqlValue::Number(-1.0)]
        );
    }

    #[test]
    fn test_weekday_start_day_must_be_literal() {
        let compiler = Compiler::new(Dialect::Mysql);
        let out = compiler.compile(&parse_formula("WEEKDAY({d}, {start})").unwrap());
        assert_eq!(out.fragment.text, "WEEKDAY(`d`)");
        assert!(matches!(out.notices.as_slice(), [CompileNotice::Unsupported(_)]));

        let out = compiler.compile(&parse_formula("WEEKDAY({d}, 'someday')").unwrap());
        assert_eq!(out.notices.len(), 1);
        assert!(compiler
            .compile_strict(&parse_formula("WEEKDAY({d}, 'someday')").unwrap())
            .is_err());

        let out = compiler.compile(&parse_formula("WEEKDAY({d}, 'friday')").unwrap());
        assert!(out.notices.is_empty());
    }

    #[test]
    fn test_array_functions_compile_to_null_with_notice() {
        for formula in [
            "ARRAYUNIQUE({tags})",
            "ARRAYSORT({tags}, 'desc')",
            "ARRAYCOMPACT({tags})",
            "ARRAYSLICE({tags}, 1, 3)",
        ] {
            for dialect in Dialect::ALL {
                let compiler = Compiler::new(dialect);
                let expr = parse_formula(formula).unwrap();
                let out = compiler.compile(&expr);
                assert_eq!(out.fragment.text, "NULL", "{} on {}", formula, dialect);
                assert!(out.fragment.bindings.is_empty());
                assert!(matches!(out.notices.as_slice(), [CompileNotice::Unsupported(_)]));
                assert!(compiler.compile_strict(&expr).is_err());
            }
        }
    }

    #[test]
    fn test_mod_is_grouped() {
        assert_eq!(sql_of("2 * MOD(a, 3)", Dialect::Postgres), "? * (\"a\" % ?)");
        assert_eq!(sql_of("MOD(a, 3)", Dialect::Oracle), "MOD(\"a\", ?)");
    }

    #[test]
    fn test_true_false_blank() {
        assert_eq!(sql_of("TRUE()", Dialect::Postgres), "1");
        assert_eq!(sql_of("FALSE()", Dialect::Postgres), "0");
        assert_eq!(sql_of("BLANK()", Dialect::Postgres), "NULL");
    }

    #[test]
    fn test_record_id() {
        assert_eq!(sql_of("RECORD_ID()", Dialect::Mssql), "[id]");
    }

    #[test]
    fn test_urlencode_replaces_percent_first() {
        let sql = sql_of("URLENCODE({q})", Dialect::Postgres);
        assert!(sql.starts_with("REPLACE(REPLACE("));
        let innermost = sql.find("REPLACE(\"q\", '%', '%25')");
        assert!(innermost.is_some(), "{}", sql);
        assert!(sql.ends_with(", '@', '%40')"));
    }

    #[test]
    fn test_url_lowers_to_concat() {
        let sql = sql_of("URL({link})", Dialect::Postgres);
        assert_eq!(sql, "CONCAT(?, \"link\", ?)");
    }

    #[test]
    fn test_even_odd() {
        let sql = sql_of("EVEN(a)", Dialect::Postgres);
        assert!(sql.starts_with("CASE WHEN \"a\" >= 0 THEN CEIL(CAST(\"a\" AS DOUBLE PRECISION) / 2) * 2"));
        let sql = sql_of("ODD(a)", Dialect::Mssql);
        assert!(sql.contains("CEILING((CAST([a] AS FLOAT) + 1) / 2) * 2 - 1"));
    }
}
