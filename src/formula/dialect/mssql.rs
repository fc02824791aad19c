use super::common::{date_unit, diff_unit, strip_number_formatting, weekday_index};
use super::DialectEntry;
use crate::formula::compiler::Lowering;
use crate::formula::fragment::{sql, SqlFragment, SqlValue};
use crate::formula::types::Expr;

use DialectEntry::{Lower, Rename};

pub(super) fn entries() -> Vec<(&'static str, DialectEntry)> {
    vec![
        ("MIN", Lower(min)),
        ("MAX", Lower(max)),
        ("INT", Lower(int)),
        ("VALUE", Lower(value)),
        ("LOG", Lower(log)),
        ("CONCAT", Lower(concat)),
        ("TRIM", Lower(trim)),
        ("LEN", Rename("LEN")),
        ("MID", Lower(substring)),
        ("SUBSTR", Lower(substring)),
        ("SEARCH", Lower(search)),
        ("REPEAT", Rename("REPLICATE")),
        ("REGEX_MATCH", Lower(regex_match)),
        ("JSON_EXTRACT", Rename("JSON_VALUE")),
        ("NOW", Rename("GETDATE")),
        ("DATEADD", Lower(dateadd)),
        ("DATETIME_DIFF", Lower(datetime_diff)),
        ("DATESTR", Lower(datestr)),
        ("DAY", Rename("DAY")),
        ("MONTH", Rename("MONTH")),
        ("YEAR", Rename("YEAR")),
        ("HOUR", Lower(hour)),
        ("WEEKDAY", Lower(weekday)),
    ]
}

/// No LEAST/GREATEST before SQL Server 2022; aggregate over a VALUES row set.
fn extreme(l: &mut Lowering<'_>, aggregate: &str, args: &[Expr]) -> SqlFragment {
    if args.len() == 1 {
        return l.value(&args[0]);
    }
    let rows = args
        .iter()
        .map(|arg| {
            let value = l.value(arg);
            sql!("({})", value)
        })
        .collect();
    let mut out = SqlFragment::raw(format!("(SELECT {}(v) FROM (VALUES ", aggregate));
    out.push(SqlFragment::join(rows, ", "));
    out.push_str(") AS t(v))");
    out
}

fn min(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    extreme(l, "MIN", args)
}

fn max(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    extreme(l, "MAX", args)
}

fn int(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let value = l.arg(args, 0);
    sql!("CAST({} AS BIGINT)", value)
}

fn value(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    let text = l.text(text);
    sql!("TRY_CAST({} AS FLOAT)", strip_number_formatting(text))
}

/// `LOG(x)` is already natural; the base comes second.
fn log(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    if args.len() < 2 {
        let value = l.arg(args, 0);
        return sql!("LOG({})", value);
    }
    let base = l.arg(args, 0);
    let value = l.arg(args, 1);
    sql!("LOG({}, {})", value, base)
}

/// CONCAT needs at least two arguments.
fn concat(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let mut parts = l.values(args);
    if parts.len() < 2 {
        parts.push(SqlFragment::raw("''"));
    }
    let mut out = SqlFragment::raw("CONCAT(");
    out.push(SqlFragment::join(parts, ", "));
    out.push_str(")");
    out
}

fn trim(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    sql!("LTRIM(RTRIM({}))", text)
}

/// SUBSTRING requires a length; default to the rest of the string.
fn substring(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    let start = l.arg(args, 1);
    let length = match args.get(2) {
        Some(expr) => l.value(expr),
        None => sql!("LEN({})", text.clone()),
    };
    sql!("SUBSTRING({}, {}, {})", text, start, length)
}

fn search(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let haystack = l.arg(args, 0);
    let needle = l.arg(args, 1);
    sql!("CHARINDEX({}, {})", needle, haystack)
}

fn regex_match(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    let pattern = l.arg(args, 1);
    sql!("REGEXP_LIKE({}, {})", text, pattern).into_predicate()
}

/// A negative literal offset is emitted as an explicit subtraction.
fn dateadd(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    let unit = date_unit(args, 2).keyword(l.dialect());
    match args.get(1).and_then(Expr::number_value) {
        Some(n) if n < 0.0 => {
            let amount = SqlFragment::bind(SqlValue::Number(-n));
            sql!(&format!("DATEADD({}, -{{}}, {{}})", unit), amount, date)
        }
        _ => {
            let amount = l.arg(args, 1);
            sql!(&format!("DATEADD({}, {{}}, {{}})", unit), amount, date)
        }
    }
}

fn datetime_diff(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let end = l.arg(args, 0);
    let start = l.arg(args, 1);
    let unit = diff_unit(args, 2).keyword(l.dialect());
    sql!(&format!("DATEDIFF({}, {{}}, {{}})", unit), start, end)
}

fn datestr(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    sql!("CONVERT(VARCHAR(10), {}, 23)", date)
}

fn hour(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    sql!("DATEPART(hour, {})", date)
}

/// Independent of the session's DATEFIRST setting: Monday is 0.
fn weekday(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    weekday_index(l, args, |date| {
        sql!("((DATEPART(WEEKDAY, {}) + @@DATEFIRST + 5) % 7)", date)
    })
}

#[cfg(test)]
mod tests {
    use crate::formula::compiler::compile;
    use crate::formula::dialect::Dialect;
    use crate::formula::fragment::SqlValue;
    use crate::formula::parser::parse_formula;

    fn sql_of(formula: &str) -> String {
        compile(&parse_formula(formula).unwrap(), Dialect::Mssql, None).text
    }

    #[test]
    fn test_dateadd_branches_on_sign() {
        assert_eq!(sql_of("DATEADD({d}, 5, 'day')"), "DATEADD(day, ?, [d])");
        let f = compile(
            &parse_formula("DATEADD({d}, -5, 'hours')").unwrap(),
            Dialect::Mssql,
            None,
        );
        assert_eq!(f.text, "DATEADD(hour, -?, [d])");
        assert_eq!(f.bindings, vec![SqlValue::Number(5.0)]);
    }

    #[test]
    fn test_datetime_diff_uses_datediff() {
        assert_eq!(
            sql_of("DATETIME_DIFF({a}, {b}, 'M')"),
            "DATEDIFF(month, [b], [a])"
        );
        assert_eq!(
            sql_of("DATETIME_DIFF({a}, {b}, 'milliseconds')"),
            "DATEDIFF(millisecond, [b], [a])"
        );
    }

    #[test]
    fn test_min_max_over_values() {
        assert_eq!(
            sql_of("MIN({a}, {b}, 3)"),
            "(SELECT MIN(v) FROM (VALUES ([a]), ([b]), (?)) AS t(v))"
        );
        assert_eq!(sql_of("MAX({a})"), "[a]");
    }

    #[test]
    fn test_string_overrides() {
        assert_eq!(sql_of("TRIM({s})"), "LTRIM(RTRIM([s]))");
        assert_eq!(sql_of("LEN({s})"), "LEN([s])");
        assert_eq!(sql_of("SUBSTR({s}, 2)"), "SUBSTRING([s], ?, LEN([s]))");
        assert_eq!(sql_of("MID({s}, 2, 3)"), "SUBSTRING([s], ?, ?)");
        assert_eq!(sql_of("REPEAT({s}, 3)"), "REPLICATE([s], ?)");
        assert_eq!(sql_of("SEARCH({s}, 'x')"), "CHARINDEX(?, [s])");
        assert_eq!(sql_of("CONCAT({s})"), "CONCAT([s], '')");
    }

    #[test]
    fn test_log_argument_order() {
        assert_eq!(sql_of("LOG(2, {x})"), "LOG([x], ?)");
        assert_eq!(sql_of("LOG({x})"), "LOG([x])");
    }

    #[test]
    fn test_regex_match_is_a_predicate() {
        assert_eq!(
            sql_of("REGEX_MATCH({s}, 'a+')"),
            "CASE WHEN REGEXP_LIKE([s], ?) THEN 1 ELSE 0 END"
        );
    }

    #[test]
    fn test_weekday_and_now() {
        assert_eq!(
            sql_of("WEEKDAY({d})"),
            "((DATEPART(WEEKDAY, [d]) + @@DATEFIRST + 5) % 7)"
        );
        assert_eq!(sql_of("NOW()"), "GETDATE()");
        assert_eq!(sql_of("HOUR({d})"), "DATEPART(hour, [d])");
    }
}
