use super::common::{date_unit, diff_unit, extract_field, weekday_index};
use super::DialectEntry;
use crate::formula::compiler::Lowering;
use crate::formula::fragment::{sql, SqlFragment};
use crate::formula::types::Expr;
use crate::formula::units::DiffUnit;

use DialectEntry::{Lower, Rename};

pub(super) fn entries() -> Vec<(&'static str, DialectEntry)> {
    vec![
        ("ROUND", Lower(round)),
        ("INT", Rename("TRUNC")),
        ("VALUE", Lower(value)),
        ("SEARCH", Lower(search)),
        ("REGEX_MATCH", Lower(regex_match)),
        ("REGEX_EXTRACT", Lower(regex_extract)),
        ("REGEX_REPLACE", Lower(regex_replace)),
        ("JSON_EXTRACT", Lower(json_extract)),
        ("NOW", Rename("NOW")),
        ("DATEADD", Lower(dateadd)),
        ("DATETIME_DIFF", Lower(datetime_diff)),
        ("DATESTR", Lower(datestr)),
        ("DAY", Lower(day)),
        ("MONTH", Lower(month)),
        ("YEAR", Lower(year)),
        ("HOUR", Lower(hour)),
        ("WEEKDAY", Lower(weekday)),
    ]
}

/// Two-argument ROUND only exists for NUMERIC.
fn round(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let value = l.arg(args, 0);
    let digits = if args.len() > 1 {
        l.arg(args, 1)
    } else {
        SqlFragment::raw("0")
    };
    sql!("ROUND(CAST({} AS NUMERIC), CAST({} AS INTEGER))", value, digits)
}

fn value(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    let text = l.text(text);
    sql!(
        "CAST(NULLIF(REGEXP_REPLACE({}, '[^0-9.-]', '', 'g'), '') AS DOUBLE PRECISION)",
        text
    )
}

fn search(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let haystack = l.arg(args, 0);
    let needle = l.arg(args, 1);
    sql!("POSITION({} IN {})", needle, haystack)
}

fn regex_match(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg_operand(args, 0);
    let pattern = l.arg_operand(args, 1);
    sql!("({} ~ {})", text, pattern).into_predicate()
}

fn regex_extract(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    let pattern = l.arg(args, 1);
    sql!("SUBSTRING({} FROM {})", text, pattern)
}

fn regex_replace(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    let pattern = l.arg(args, 1);
    let replacement = l.arg(args, 2);
    sql!("REGEXP_REPLACE({}, {}, {}, 'g')", text, pattern, replacement)
}

fn json_extract(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let document = l.arg(args, 0);
    let path = l.arg(args, 1);
    sql!(
        "(JSONB_PATH_QUERY_FIRST(CAST({} AS JSONB), CAST({} AS JSONPATH)) #>> '{{}}')",
        document,
        path
    )
}

fn timestamp(fragment: SqlFragment) -> SqlFragment {
    sql!("CAST({} AS TIMESTAMP)", fragment)
}

fn dateadd(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = timestamp(l.arg(args, 0));
    let amount = l.arg_operand(args, 1);
    let unit = date_unit(args, 2).keyword(l.dialect());
    sql!(
        &format!("({{}} + {{}} * INTERVAL '1 {}')", unit),
        date,
        amount
    )
}

fn datetime_diff(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let end = timestamp(l.arg(args, 0));
    let start = timestamp(l.arg(args, 1));
    let unit = diff_unit(args, 2);
    let seconds = || sql!("EXTRACT(EPOCH FROM ({} - {}))", end.clone(), start.clone());
    let age = || sql!("AGE({}, {})", end.clone(), start.clone());
    let months = || {
        sql!(
            "(DATE_PART('year', {}) * 12 + DATE_PART('month', {}))",
            age(),
            age()
        )
    };
    match unit {
        DiffUnit::Milliseconds => sql!("({} * 1000)", seconds()),
        DiffUnit::Seconds => seconds(),
        DiffUnit::Minutes => sql!("({} / 60)", seconds()),
        DiffUnit::Hours => sql!("({} / 3600)", seconds()),
        DiffUnit::Days => sql!("({} / 86400)", seconds()),
        DiffUnit::Weeks => sql!("({} / 604800)", seconds()),
        DiffUnit::Months => months(),
        DiffUnit::Quarters => sql!("TRUNC({} / 3)", months()),
        DiffUnit::Years => sql!("DATE_PART('year', {})", age()),
    }
}

fn datestr(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    sql!("TO_CHAR(CAST({} AS DATE), 'YYYY-MM-DD')", date)
}

fn day(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    extract_field(l, args, "DAY", Some("TIMESTAMP"))
}

fn month(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    extract_field(l, args, "MONTH", Some("TIMESTAMP"))
}

fn year(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    extract_field(l, args, "YEAR", Some("TIMESTAMP"))
}

fn hour(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    extract_field(l, args, "HOUR", Some("TIMESTAMP"))
}

fn weekday(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    weekday_index(l, args, |date| {
        sql!("EXTRACT(ISODOW FROM {})", timestamp(date))
    })
}

#[cfg(test)]
mod tests {
    use crate::formula::compiler::compile;
    use crate::formula::dialect::Dialect;
    use crate::formula::parser::parse_formula;

    fn sql_of(formula: &str) -> String {
        compile(&parse_formula(formula).unwrap(), Dialect::Postgres, None).text
    }

    #[test]
    fn test_round_casts_to_numeric() {
        assert_eq!(
            sql_of("ROUND({a}, 2)"),
            "ROUND(CAST(\"a\" AS NUMERIC), CAST(? AS INTEGER))"
        );
    }

    #[test]
    fn test_dateadd_uses_interval_arithmetic() {
        assert_eq!(
            sql_of("DATEADD({d}, -2, 'week')"),
            "(CAST(\"d\" AS TIMESTAMP) + ? * INTERVAL '1 week')"
        );
    }

    #[test]
    fn test_datetime_diff_units() {
        assert_eq!(
            sql_of("DATETIME_DIFF({a}, {b}, 'h')"),
            "(EXTRACT(EPOCH FROM (CAST(\"a\" AS TIMESTAMP) - CAST(\"b\" AS TIMESTAMP))) / 3600)"
        );
        assert_eq!(
            sql_of("DATETIME_DIFF({a}, {b}, 'years')"),
            "DATE_PART('year', AGE(CAST(\"a\" AS TIMESTAMP), CAST(\"b\" AS TIMESTAMP)))"
        );
        let quarters = sql_of("DATETIME_DIFF({a}, {b}, 'Q')");
        assert!(quarters.starts_with("TRUNC((DATE_PART('year', AGE("));
        assert!(quarters.ends_with(") / 3)"));
    }

    #[test]
    fn test_weekday_offsets_isodow() {
        assert_eq!(
            sql_of("WEEKDAY({d})"),
            "((EXTRACT(ISODOW FROM CAST(\"d\" AS TIMESTAMP)) + 6) % 7)"
        );
        // ISODOW is 1-based, so even an unshifted start day wraps Sunday (7) to 0.
        assert_eq!(
            sql_of("WEEKDAY({d}, 'sunday')"),
            "(EXTRACT(ISODOW FROM CAST(\"d\" AS TIMESTAMP)) % 7)"
        );
    }

    #[test]
    fn test_regex_functions() {
        assert_eq!(sql_of("REGEX_MATCH({s}, 'a+')"), "(\"s\" ~ ?)");
        assert_eq!(sql_of("REGEX_EXTRACT({s}, 'a+')"), "SUBSTRING(\"s\" FROM ?)");
        assert_eq!(
            sql_of("REGEX_REPLACE({s}, 'a', 'b')"),
            "REGEXP_REPLACE(\"s\", ?, ?, 'g')"
        );
    }

    #[test]
    fn test_json_extract_keeps_literal_braces() {
        assert_eq!(
            sql_of("JSON_EXTRACT({doc}, '$.a')"),
            "(JSONB_PATH_QUERY_FIRST(CAST(\"doc\" AS JSONB), CAST(? AS JSONPATH)) #>> '{}')"
        );
    }

    #[test]
    fn test_text_and_date_parts() {
        assert_eq!(sql_of("SEARCH({s}, 'x')"), "POSITION(? IN \"s\")");
        assert_eq!(sql_of("LEN({s})"), "LENGTH(\"s\")");
        assert_eq!(sql_of("INT({a})"), "TRUNC(\"a\")");
        assert_eq!(
            sql_of("DAY({d})"),
            "EXTRACT(DAY FROM CAST(\"d\" AS TIMESTAMP))"
        );
        assert_eq!(
            sql_of("DATESTR({d})"),
            "TO_CHAR(CAST(\"d\" AS DATE), 'YYYY-MM-DD')"
        );
    }
}
