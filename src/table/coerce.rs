//! Value coercions applied while building a row buffer (spec §4.4,
//! step 2), grounded in `original_source/src/observer/storage/common/table.cpp`'s
//! `Table::make_record` (`DATES`-from-`CHARS`, `FLOATS`-from-`INTS`).

use crate::catalog::field::{FieldMeta, FieldType};
use crate::error::{DbError, DbResult};
use crate::filter::Value;

/// Earliest date accepted, inclusive.
const MIN_DATE: (i32, u32, u32) = (1970, 1, 1);
/// Latest date accepted, exclusive (spec §3: `DATES` string
/// `YYYY-MM-DD`; spec §4.4: "`[1970-01-01, 2038-03-01)`").
const MAX_DATE_EXCLUSIVE: (i32, u32, u32) = (2038, 3, 1);

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

fn parse_date(s: &str) -> Option<(i32, u32, u32)> {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    let year: i32 = parts[0].parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    let day: u32 = parts[2].parse().ok()?;
    if parts[0].len() != 4 || parts[1].len() != 2 || parts[2].len() != 2 {
        return None;
    }
    if !(1..=12).contains(&month) {
        return None;
    }
    if day == 0 || day > days_in_month(year, month) {
        return None;
    }
    Some((year, month, day))
}

/// Validate and canonicalize a `CHARS` literal into a `DATES` value
/// (spec §4.4: "`CHARS → DATES` if the string parses as `YYYY-MM-DD` in
/// `[1970-01-01, 2038-03-01)`").
pub fn check_and_format_date(s: &str) -> DbResult<String> {
    let ymd = parse_date(s).ok_or_else(|| DbError::InvalidArgument(format!("`{}` is not a valid date", s)))?;
    if ymd < MIN_DATE || ymd >= MAX_DATE_EXCLUSIVE {
        return Err(DbError::InvalidArgument(format!("`{}` is outside the accepted date range", s)));
    }
    Ok(s.to_string())
}

/// Coerce `value` to match `field`'s declared type, per the two
/// conversions spec §4.4 names. Returns the original value unchanged if
/// no coercion applies (the caller then does the normal type-match
/// check).
pub fn coerce(field: &FieldMeta, value: Value) -> DbResult<Value> {
    match (field.field_type, &value) {
        (FieldType::Dates, Value::Chars(s)) => Ok(Value::Dates(check_and_format_date(s)?)),
        (FieldType::Float, Value::Int(i)) => Ok(Value::Float(*i as f32)),
        _ => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_leap_day() {
        assert!(check_and_format_date("2020-02-29").is_ok());
    }

    #[test]
    fn rejects_non_leap_day() {
        assert!(check_and_format_date("2021-02-29").is_err());
    }

    #[test]
    fn rejects_date_at_or_past_upper_bound() {
        assert!(check_and_format_date("2039-01-01").is_err());
        assert!(check_and_format_date("2038-03-01").is_err());
    }

    #[test]
    fn accepts_lower_bound() {
        assert!(check_and_format_date("1970-01-01").is_ok());
    }

    #[test]
    fn int_to_float_converts_numerically() {
        let field = FieldMeta {
            name: "x".into(),
            field_type: FieldType::Float,
            offset: 0,
            len: 4,
            visible: true,
            nullable: false,
        };
        let coerced = coerce(&field, Value::Int(3)).unwrap();
        assert_eq!(coerced, Value::Float(3.0));
    }
}
