use super::common::{date_unit, diff_unit, weekday_index};
use super::DialectEntry;
use crate::formula::compiler::Lowering;
use crate::formula::fragment::{sql, SqlFragment, SqlValue};
use crate::formula::types::Expr;
use crate::formula::units::DiffUnit;

use DialectEntry::{Lower, Rename};

pub(super) fn entries() -> Vec<(&'static str, DialectEntry)> {
    vec![
        ("LEN", Rename("CHAR_LENGTH")),
        ("INT", Lower(int)),
        ("VALUE", Lower(value)),
        ("CONCAT", Lower(concat)),
        ("SEARCH", Lower(search)),
        ("XOR", Lower(xor)),
        ("REGEX_MATCH", Rename("REGEXP_LIKE")),
        ("JSON_EXTRACT", Lower(json_extract)),
        ("NOW", Rename("NOW")),
        ("DATEADD", Lower(dateadd)),
        ("DATETIME_DIFF", Lower(datetime_diff)),
        ("DATESTR", Lower(datestr)),
        ("DAY", Rename("DAY")),
        ("MONTH", Rename("MONTH")),
        ("YEAR", Rename("YEAR")),
        ("HOUR", Rename("HOUR")),
        ("WEEKDAY", Lower(weekday)),
    ]
}

fn int(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let value = l.arg(args, 0);
    sql!("TRUNCATE({}, 0)", value)
}

fn value(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let text = l.arg(args, 0);
    sql!("(NULLIF(REGEXP_REPLACE({}, '[^0-9.-]', ''), '') + 0)", text)
}

/// MySQL's CONCAT is NULL if any part is; blank parts read as ''.
fn concat(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let parts = args
        .iter()
        .map(|arg| {
            let part = l.value(arg);
            sql!("IFNULL({}, '')", part)
        })
        .collect();
    let mut out = SqlFragment::raw("CONCAT(");
    out.push(SqlFragment::join(parts, ", "));
    out.push_str(")");
    out
}

fn search(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let haystack = l.arg(args, 0);
    let needle = l.arg(args, 1);
    sql!("LOCATE({}, {})", needle, haystack)
}

fn xor(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    if args.len() == 1 {
        return l.condition(&args[0]);
    }
    let parts = args.iter().map(|arg| l.condition_operand(arg)).collect();
    SqlFragment::join(parts, " XOR ")
        .parenthesized()
        .into_predicate()
}

fn json_extract(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let document = l.arg(args, 0);
    let path = l.arg(args, 1);
    sql!("JSON_UNQUOTE(JSON_EXTRACT({}, {}))", document, path)
}

/// A negative literal offset becomes `DATE_SUB` with its magnitude.
fn dateadd(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    let unit = date_unit(args, 2).keyword(l.dialect());
    match args.get(1).and_then(Expr::number_value) {
        Some(n) if n < 0.0 => {
            let amount = SqlFragment::bind(SqlValue::Number(-n));
            sql!(&format!("DATE_SUB({{}}, INTERVAL {{}} {})", unit), date, amount)
        }
        _ => {
            let amount = l.arg_operand(args, 1);
            sql!(&format!("DATE_ADD({{}}, INTERVAL {{}} {})", unit), date, amount)
        }
    }
}

fn datetime_diff(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let end = l.arg(args, 0);
    let start = l.arg(args, 1);
    let unit = diff_unit(args, 2);
    let diff = sql!(
        &format!("TIMESTAMPDIFF({}, {{}}, {{}})", unit.keyword(l.dialect())),
        start,
        end
    );
    if unit == DiffUnit::Milliseconds {
        sql!("({} / 1000)", diff)
    } else {
        diff
    }
}

fn datestr(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    let date = l.arg(args, 0);
    sql!("DATE_FORMAT({}, '%Y-%m-%d')", date)
}

fn weekday(l: &mut Lowering<'_>, args: &[Expr]) -> SqlFragment {
    weekday_index(l, args, |date| sql!("WEEKDAY({})", date))
}
