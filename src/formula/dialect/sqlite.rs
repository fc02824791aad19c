use super::common::{
    date_unit, diff_unit, pipe_concat, scale_days, strip_number_formatting, substr_left, substr_right,
    variadic_or_single, weekday_index,
};
use super::DialectEntry;
use crate::formula::compiler::Lowering;
use crate::formula::fragment::{sql, SqlFragment, SqlValue};
use crate::formula::types::{format_number, Expr};
use crate::formula::units::{DateUnit, DiffUnit};

use DialectEntry::{Lower, Rename};

pub(super) fn entries() -> Vec<(&'static str, DialectEntry)> {
    vec![
        ("MIN", Lower(min)),
        ("MAX", Lower(max)),
        ("INT", Lower(int)),
        ("VALUE", Lower(value)),
        ("CONCAT", Lower(concat)),
        ("LEFT", Lower(substr_left)),
        ("RIGHT", Lower(substr_right)),
        ("SEARCH", Lower(search)),
        ("REPEAT", Lower(repeat)),
        ("REGEX_MATCH", Lower(regex_match)),
        ("JSON_EXTRACT", Rename("JSON_EXTRACT")),
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

/// Multi-argument MIN/MAX are scalar; the one-argument forms are aggregates.
fn min(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    variadic_or_single(l, "MIN", args)
}

fn max(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    variadic_or_single(l, "MAX", args)
}

fn int(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let value = l.arg(args, 0);
    sql!("CAST({} AS INTEGER)", value)
}

fn value(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    let text = l.text(text);
    sql!("CAST({} AS REAL)", strip_number_formatting(text))
}

fn concat(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    pipe_concat(l, args, true)
}

fn search(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let haystack = l.arg(args, 0);
    let needle = l.arg(args, 1);
    sql!("INSTR({}, {})", haystack, needle)
}

fn repeat(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    let count = l.arg(args, 1);
    sql!("REPLACE(HEX(ZEROBLOB({})), '00', {})", count, text)
}

fn regex_match(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg_operand(args, 0);
    let pattern = l.arg_operand(args, 1);
    sql!("({} REGEXP {})", text, pattern)
}

fn now(_l: &mut Lowering<'_>, _args: &[Expr]) -> SqlFragment {
    SqlFragment::raw("DATETIME('now')")
}

/// A literal offset is bound as a complete modifier such as `'-3 days'`.
fn dateadd(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    let unit = date_unit(args, 2);
    let keyword = unit.keyword(l.dialect());
    let weeks = unit == DateUnit::Week;
    match args.get(1).and_then(Expr::number_value) {
        Some(n) => {
            let n = if weeks { n * 7.0 } else { n };
            let sign = if n < 0.0 { '-' } else { '+' };
            let modifier = format!("{}{} {}", sign, format_number(n.abs()), keyword);
            sql!(
                "DATETIME({}, {})",
                date,
                SqlFragment::bind(SqlValue::Text(modifier))
            )
        }
        None => {
            let amount = l.arg_operand(args, 1);
            let amount = if weeks {
                sql!("({} * 7)", amount)
            } else {
                amount
            };
            sql!(
                &format!("DATETIME({{}}, {{}} || ' {}')", keyword),
                date,
                amount
            )
        }
    }
}

fn julian_days(end: SqlFragment, start: SqlFragment) -> SqlFragment {
    sql!("(JULIANDAY({}) - JULIANDAY({}))", end, start)
}

fn strftime_int(pattern: &str, date: SqlFragment) -> SqlFragment {
    sql!(&format!("CAST(STRFTIME('{}', {{}}) AS INTEGER)", pattern), date)
}

fn datetime_diff(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let end = l.arg(args, 0);
    let start = l.arg(args, 1);
    let unit = diff_unit(args, 2);
    if let Some(scaled) = scale_days(julian_days(end.clone(), start.clone()), unit) {
        return scaled;
    }
    let years = sql!(
        "({} - {})",
        strftime_int("%Y", end.clone()),
        strftime_int("%Y", start.clone())
    );
    if unit == DiffUnit::Years {
        return years;
    }
    let months = sql!(
        "({} * 12 + {} - {})",
        years,
        strftime_int("%m", end),
        strftime_int("%m", start)
    );
    if unit == DiffUnit::Quarters {
        sql!("({} / 3)", months)
    } else {
        months
    }
}

fn datestr(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    sql!("STRFTIME('%Y-%m-%d', {})", date)
}

fn day(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    strftime_int("%d", date)
}

fn month(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    strftime_int("%m", date)
}

fn year(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    strftime_int("%Y", date)
}

fn hour(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    strftime_int("%H", date)
}

fn weekday(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    weekday_index(l, args, |date| strftime_int("%w", date))
}

#[cfg(test)]
mod tests {
    use crate::formula::compiler::compile;
    use crate::formula::dialect::Dialect;
    use crate::formula::fragment::SqlValue;
    use crate::formula::parser::parse_formula;

    fn sql_of(formula: &str) -> String {
        compile(&parse_formula(formula).unwrap(), Dialect::Sqlite, None).text
    }

    #[test]
    fn test_concat_becomes_pipe_chain() {
        assert_eq!(
            sql_of("CONCAT({a}, ' ', {b})"),
            "(COALESCE(\"a\", '') || COALESCE(?, '') || COALESCE(\"b\", ''))"
        );
        assert_eq!(
            sql_of("CONCAT({a}, CONCAT({b}, {c}))"),
            "(COALESCE(\"a\", '') || (COALESCE(\"b\", '') || COALESCE(\"c\", '')))"
        );
    }

    #[test]
    fn test_dateadd_literal_offsets_bind_modifiers() {
        let f = compile(
            &parse_formula("DATEADD({d}, -2, 'week')").unwrap(),
            Dialect::Sqlite,
            None,
        );
        assert_eq!(f.text, "DATETIME(\"d\", ?)");
        assert_eq!(f.bindings, vec![SqlValue::Text("-14 days".to_string())]);
        let f = compile(
            &parse_formula("DATEADD({d}, 1.5, 'hour')").unwrap(),
            Dialect::Sqlite,
            None,
        );
        assert_eq!(f.bindings, vec![SqlValue::Text("+1.5 hours".to_string())]);
        assert_eq!(
            sql_of("DATEADD({d}, {n}, 'month')"),
            "DATETIME(\"d\", \"n\" || ' months')"
        );
    }

    #[test]
    fn test_datetime_diff_julian_days() {
        assert_eq!(
            sql_of("DATETIME_DIFF({a}, {b}, 'days')"),
            "(JULIANDAY(\"a\") - JULIANDAY(\"b\"))"
        );
        assert_eq!(
            sql_of("DATETIME_DIFF({a}, {b}, 'minutes')"),
            "((JULIANDAY(\"a\") - JULIANDAY(\"b\")) * 1440)"
        );
        assert_eq!(
            sql_of("DATETIME_DIFF({a}, {b}, 'y')"),
            "(CAST(STRFTIME('%Y', \"a\") AS INTEGER) - CAST(STRFTIME('%Y', \"b\") AS INTEGER))"
        );
    }

    #[test]
    fn test_weekday_is_sunday_based() {
        assert_eq!(
            sql_of("WEEKDAY({d}, 'sunday')"),
            "CAST(STRFTIME('%w', \"d\") AS INTEGER)"
        );
        assert_eq!(
            sql_of("WEEKDAY({d})"),
            "((CAST(STRFTIME('%w', \"d\") AS INTEGER) + 6) % 7)"
        );
    }

    #[test]
    fn test_string_overrides() {
        assert_eq!(sql_of("LEFT({s}, 3)"), "SUBSTR(\"s\", 1, ?)");
        assert_eq!(sql_of("RIGHT({s}, {n})"), "SUBSTR(\"s\", -\"n\")");
        assert_eq!(sql_of("SEARCH({s}, 'x')"), "INSTR(\"s\", ?)");
        assert_eq!(
            sql_of("REPEAT({s}, 3)"),
            "REPLACE(HEX(ZEROBLOB(?)), '00', \"s\")"
        );
        assert_eq!(sql_of("MIN({a}, {b})"), "MIN(\"a\", \"b\")");
        assert_eq!(sql_of("NOW()"), "DATETIME('now')");
    }
}
