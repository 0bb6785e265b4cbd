use std::fmt::Write;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
    macros::format_description,
};

/// Append `values` to `out` through `f`, inserting `separator` between the
/// items that produced output.
pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");
const TIMESTAMP_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

pub fn format_date(out: &mut String, value: &Date) {
    let _ = write!(
        out,
        "{:04}-{:02}-{:02}",
        value.year(),
        value.month() as u8,
        value.day()
    );
}

pub fn format_timestamp(out: &mut String, value: &PrimitiveDateTime) {
    format_date(out, &value.date());
    let _ = write!(
        out,
        "T{:02}:{:02}:{:02}",
        value.hour(),
        value.minute(),
        value.second()
    );
}

/// Timestamps with timezone are normalized to UTC before printing.
pub fn format_date_time(out: &mut String, value: &OffsetDateTime) {
    let utc = value.to_offset(time::UtcOffset::UTC);
    let _ = write!(out, "{}", utc.format(&Rfc3339).unwrap_or_default());
}

pub fn parse_date(text: &str) -> Option<Date> {
    Date::parse(text, DATE_FORMAT).ok()
}

pub fn parse_timestamp(text: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(text, TIMESTAMP_FORMAT).ok()
}

pub fn parse_date_time(text: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(text, &Rfc3339).ok()
}
