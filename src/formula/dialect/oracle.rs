use super::common::{
    date_unit, diff_unit, extract_field, pipe_concat, scale_days, substr_left, substr_right,
    weekday_index,
};
use super::DialectEntry;
use crate::formula::compiler::{CompileNotice, Lowering};
use crate::formula::fragment::{sql, SqlFragment};
use crate::formula::types::Expr;
use crate::formula::units::{DateUnit, DiffUnit};

use DialectEntry::{Lower, Rename};

pub(super) fn entries() -> Vec<(&'static str, DialectEntry)> {
    vec![
        ("INT", Rename("TRUNC")),
        ("VALUE", Lower(value)),
        ("CONCAT", Lower(concat)),
        ("LEFT", Lower(substr_left)),
        ("RIGHT", Lower(substr_right)),
        ("SEARCH", Lower(search)),
        ("REPEAT", Lower(repeat)),
        ("REGEX_MATCH", Lower(regex_match)),
        ("JSON_EXTRACT", Lower(json_extract)),
        ("NOW", Lower(now)),
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

fn value(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    sql!(
        "TO_NUMBER(REGEXP_REPLACE({}, '[^0-9.-]', '') DEFAULT NULL ON CONVERSION ERROR)",
        text
    )
}

/// `||` already treats NULL as ''.
fn concat(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    pipe_concat(l, args, false)
}

fn search(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let haystack = l.arg(args, 0);
    let needle = l.arg(args, 1);
    sql!("INSTR({}, {})", haystack, needle)
}

fn repeat(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    let count = l.arg_operand(args, 1);
    sql!(
        "RPAD({}, LENGTH({}) * {}, {})",
        text.clone(),
        text.clone(),
        count,
        text
    )
}

fn regex_match(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    let pattern = l.arg(args, 1);
    sql!("REGEXP_LIKE({}, {})", text, pattern).into_predicate()
}

/// JSON_VALUE only accepts a literal path, so it is inlined rather than bound.
fn json_extract(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let document = l.arg(args, 0);
    match args.get(1).and_then(Expr::string_value) {
        Some(path) => {
            let literal = path.replace('\'', "''").replace('{', "{{").replace('}', "}}");
            sql!(&format!("JSON_VALUE({{}}, '{}')", literal), document)
        }
        None => {
            l.notice(CompileNotice::Unsupported(
                "JSON_EXTRACT with a non-literal path".to_string(),
            ));
            let path = l.arg(args, 1);
            sql!("JSON_VALUE({}, {})", document, path)
        }
    }
}

fn now(_l: &mut Lowering<'_>, _args: &[Expr]) -> SqlFragment {
    SqlFragment::raw("CURRENT_TIMESTAMP")
}

/// Calendar units go through ADD_MONTHS, the rest through day-second intervals.
fn dateadd(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg_operand(args, 0);
    let amount = l.arg_operand(args, 1);
    match date_unit(args, 2) {
        DateUnit::Month => sql!("ADD_MONTHS({}, {})", date, amount),
        DateUnit::Year => sql!("ADD_MONTHS({}, {} * 12)", date, amount),
        DateUnit::Week => sql!("({} + NUMTODSINTERVAL({} * 7, 'DAY'))", date, amount),
        unit => sql!(
            &format!("({{}} + NUMTODSINTERVAL({{}}, '{}'))", unit.keyword(l.dialect())),
            date,
            amount
        ),
    }
}

fn as_date(fragment: SqlFragment) -> SqlFragment {
    sql!("CAST({} AS DATE)", fragment)
}

fn datetime_diff(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let end = as_date(l.arg(args, 0));
    let start = as_date(l.arg(args, 1));
    let unit = diff_unit(args, 2);
    let days = sql!("({} - {})", end.clone(), start.clone());
    if let Some(scaled) = scale_days(days, unit) {
        return scaled;
    }
    let months = sql!("MONTHS_BETWEEN({}, {})", end, start);
    match unit {
        DiffUnit::Quarters => sql!("TRUNC({} / 3)", months),
        DiffUnit::Years => sql!("TRUNC({} / 12)", months),
        _ => sql!("TRUNC({})", months),
    }
}

fn datestr(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    sql!("TO_CHAR({}, 'YYYY-MM-DD')", date)
}

fn day(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    extract_field(l, args, "DAY", None)
}

fn month(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    extract_field(l, args, "MONTH", None)
}

fn year(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    extract_field(l, args, "YEAR", None)
}

/// EXTRACT(HOUR ...) rejects plain DATE values.
fn hour(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    extract_field(l, args, "HOUR", Some("TIMESTAMP"))
}

fn weekday(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    weekday_index(l, args, |date| {
        sql!("(TRUNC({}) - TRUNC({}, 'IW'))", date.clone(), date)
    })
}

#[cfg(test)]
mod tests {
    use crate::formula::compiler::{compile, CompileNotice, Compiler};
    use crate::formula::dialect::Dialect;
    use crate::formula::parser::parse_formula;

    fn sql_of(formula: &str) -> String {
        compile(&parse_formula(formula).unwrap(), Dialect::Oracle, None).text
    }

    #[test]
    fn test_concat_uses_pipes() {
        assert_eq!(sql_of("CONCAT({a}, '-', {b})"), "(\"a\" || ? || \"b\")");
        assert_eq!(sql_of("{a} & ({b} + 1)"), "(\"a\" || (\"b\" + ?))");
    }

    #[test]
    fn test_dateadd_interval_kinds() {
        assert_eq!(
            sql_of("DATEADD({d}, 2, 'month')"),
            "ADD_MONTHS(\"d\", ?)"
        );
        assert_eq!(
            sql_of("DATEADD({d}, 2, 'year')"),
            "ADD_MONTHS(\"d\", ? * 12)"
        );
        assert_eq!(
            sql_of("DATEADD({d}, -2, 'day')"),
            "(\"d\" + NUMTODSINTERVAL(?, 'DAY'))"
        );
        assert_eq!(
            sql_of("DATEADD({d}, 1, 'week')"),
            "(\"d\" + NUMTODSINTERVAL(? * 7, 'DAY'))"
        );
    }

    #[test]
    fn test_datetime_diff() {
        assert_eq!(
            sql_of("DATETIME_DIFF({a}, {b}, 'hours')"),
            "((CAST(\"a\" AS DATE) - CAST(\"b\" AS DATE)) * 24)"
        );
        assert_eq!(
            sql_of("DATETIME_DIFF({a}, {b}, 'months')"),
            "TRUNC(MONTHS_BETWEEN(CAST(\"a\" AS DATE), CAST(\"b\" AS DATE)))"
        );
    }

    #[test]
    fn test_json_extract_inlines_literal_path() {
        let out = Compiler::new(Dialect::Oracle)
            .compile(&parse_formula("JSON_EXTRACT({doc}, '$.a')").unwrap());
        assert_eq!(out.fragment.text, "JSON_VALUE(\"doc\", '$.a')");
        assert!(out.fragment.bindings.is_empty());
        assert!(out.notices.is_empty());

        let out = Compiler::new(Dialect::Oracle)
            .compile(&parse_formula("JSON_EXTRACT({doc}, {path})").unwrap());
        assert_eq!(out.fragment.text, "JSON_VALUE(\"doc\", \"path\")");
        assert!(matches!(out.notices[0], CompileNotice::Unsupported(_)));
    }

    #[test]
    fn test_weekday_and_misc() {
        assert_eq!(
            sql_of("WEEKDAY({d}, 'tuesday')"),
            "MOD(((TRUNC(\"d\") - TRUNC(\"d\", 'IW')) + 6), 7)"
        );
        assert_eq!(sql_of("NOW()"), "CURRENT_TIMESTAMP");
        assert_eq!(sql_of("INT({a})"), "TRUNC(\"a\")");
        assert_eq!(
            sql_of("REPEAT({s}, 2)"),
            "RPAD(\"s\", LENGTH(\"s\") * ?, \"s\")"
        );
        assert_eq!(
            sql_of("ISNOTBLANK({s})"),
            "CASE WHEN (\"s\" IS NOT NULL) THEN 1 ELSE 0 END"
        );
    }
}
