use crate::{
    DefaultNaming, DriverError, Field, NamingMapping, RecordType, Value, ViolationKind,
    schema::DateKind,
    util::{format_date, format_date_time, format_timestamp, separated_by},
    value::ValueKind,
};
use std::fmt::Write;

macro_rules! write_integer {
    ($out:ident, $value:expr) => {{
        let mut buffer = itoa::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}
macro_rules! write_float {
    ($out:ident, $value:expr) => {{
        let mut buffer = ryu::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}

/// Per-engine strategy: identifier naming, type keywords, operator spellings,
/// capabilities and error classification. The default methods together form
/// the generic ANSI-flavoured dialect ([`GenericDialect`]); engine crates
/// override the few methods where they differ, the way the original per-driver
/// connections overrode their field-creation visitors.
pub trait Dialect {
    fn as_dyn(&self) -> &dyn Dialect;

    fn naming(&self) -> &dyn NamingMapping;

    /// Physical table name: the explicit override verbatim when present,
    /// otherwise the naming mapping applied to the type name.
    fn table_name(&self, ty: &RecordType, escaped: bool) -> String {
        match ty.table_override() {
            Some(name) => name.to_owned(),
            None => self.naming().table_name(ty.name(), escaped),
        }
    }

    /// Physical column name, same override rule as [`Dialect::table_name`].
    fn column_name(&self, field: &Field, escaped: bool) -> String {
        match field.column_override() {
            Some(name) => name.to_owned(),
            None => self.naming().column_name(field.name(), escaped),
        }
    }

    /// `table.column`, both names escaped.
    fn write_qualified_column(&self, out: &mut String, field: &Field) {
        out.push_str(&self.table_name(field.record_type(), true));
        out.push('.');
        out.push_str(&self.column_name(field, true));
    }

    /// Column type keyword(s) for DDL.
    fn write_column_type(&self, out: &mut String, field: &Field) {
        write_generic_column_type(self.as_dyn(), out, field);
    }

    /// Bounded `VARCHAR(n)` below the long-string threshold, the unbounded
    /// text type otherwise.
    fn write_text_column_type(&self, out: &mut String, max_size: Option<u32>) {
        match max_size {
            Some(size) if size < self.long_text_threshold() => {
                let _ = write!(out, "VARCHAR({})", size);
            }
            _ => out.push_str(self.long_text_type()),
        }
    }

    /// Keyword appended to the base type of auto-increment key columns.
    fn auto_increment_suffix(&self) -> &'static str {
        " GENERATED BY DEFAULT AS IDENTITY"
    }

    fn long_text_threshold(&self) -> u32 {
        30_000
    }

    fn long_text_type(&self) -> &'static str {
        "TEXT"
    }

    fn blob_type(&self) -> &'static str {
        "BLOB"
    }

    fn double_type(&self) -> &'static str {
        "DOUBLE PRECISION"
    }

    fn date_time_type(&self) -> &'static str {
        "TIMESTAMP WITH TIME ZONE"
    }

    fn timestamp_type(&self) -> &'static str {
        "TIMESTAMP"
    }

    /// Whether prepared statements may be created with the generated-keys
    /// request mode. HSQLDB rejects it.
    fn supports_generated_keys(&self) -> bool {
        true
    }

    fn like_ignore_case(&self) -> Option<&'static str> {
        self.naming().like_ignore_case()
    }

    /// Spelling of the regular-expression match operator. Case sensitivity is
    /// only distinguished where the engine has distinct operators.
    fn regex_operator(&self, _case_sensitive: bool, negated: bool) -> &'static str {
        if negated { "NOT REGEXP" } else { "REGEXP" }
    }

    /// Recognize constraint violations in driver errors, when the engine
    /// exposes a usable code. `None` leaves the error a generic execution
    /// failure.
    fn classify(&self, _error: &DriverError) -> Option<ViolationKind> {
        None
    }

    /// Render a value as a dialect-agnostic literal. Diagnostics only: this
    /// output is never sent to the server, parameter values always travel as
    /// placeholders.
    fn write_value(&self, out: &mut String, value: &Value) {
        if value.is_null() {
            out.push_str("NULL");
            return;
        }
        match value {
            Value::Integer(Some(v)) => write_integer!(out, *v),
            Value::Long(Some(v)) => write_integer!(out, *v),
            Value::Double(Some(v)) => write_float!(out, *v),
            Value::Boolean(Some(v)) => out.push_str(["false", "true"][*v as usize]),
            Value::Text(Some(v)) => self.write_text_literal(out, v),
            Value::Bytes(Some(v)) => {
                out.push_str("'\\x");
                out.push_str(&hex::encode_upper(v));
                out.push('\'');
            }
            Value::Date(Some(v)) => {
                out.push('\'');
                format_date(out, v);
                out.push('\'');
            }
            Value::DateTime(Some(v)) => {
                out.push('\'');
                format_date_time(out, v);
                out.push('\'');
            }
            Value::Timestamp(Some(v)) => {
                out.push('\'');
                format_timestamp(out, v);
                out.push('\'');
            }
            Value::TextArray(Some(v)) => self.write_text_literal(out, &v.join(",")),
            Value::LongArray(Some(v)) => separated_by(
                out,
                v,
                |out, item| {
                    write_integer!(out, *item);
                },
                ",",
            ),
            Value::Record(Some(v)) => out.push_str(&v.to_json()),
            Value::RecordArray(Some(v)) => {
                out.push('[');
                separated_by(out, v, |out, r| out.push_str(&r.to_json()), ",");
                out.push(']');
            }
            _ => out.push_str("NULL"),
        }
    }

    /// Single-quoted string literal, inner quotes doubled.
    fn write_text_literal(&self, out: &mut String, value: &str) {
        out.push('\'');
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == '\'' {
                out.push_str(&value[position..i]);
                out.push_str("''");
                position = i + 1;
            }
        }
        out.push_str(&value[position..]);
        out.push('\'');
    }
}

/// The generic column type table, shared so dialects overriding
/// [`Dialect::write_column_type`] for a few kinds can fall back to it for the
/// rest.
pub fn write_generic_column_type(dialect: &dyn Dialect, out: &mut String, field: &Field) {
    match field.kind() {
        ValueKind::Integer => {
            out.push_str("INTEGER");
            if field.auto_increment() {
                out.push_str(dialect.auto_increment_suffix());
            }
        }
        ValueKind::Long => {
            if field.auto_increment() {
                out.push_str("BIGINT");
                out.push_str(dialect.auto_increment_suffix());
            } else {
                // Longs annotated with a date kind are stored as temporal
                // columns.
                match field.date_kind() {
                    Some(DateKind::Date) => out.push_str("DATE"),
                    Some(DateKind::DateTime) => out.push_str(dialect.date_time_type()),
                    Some(DateKind::Timestamp) => out.push_str(dialect.timestamp_type()),
                    None => out.push_str("BIGINT"),
                }
            }
        }
        ValueKind::Double => out.push_str(dialect.double_type()),
        ValueKind::Boolean => out.push_str("BOOLEAN"),
        ValueKind::Text => dialect.write_text_column_type(out, field.max_size()),
        ValueKind::Bytes => out.push_str(dialect.blob_type()),
        ValueKind::Date => out.push_str("DATE"),
        ValueKind::DateTime => out.push_str(dialect.date_time_type()),
        ValueKind::Timestamp => out.push_str(dialect.timestamp_type()),
        // Arrays and nested records are stored JSON-encoded.
        ValueKind::TextArray | ValueKind::LongArray | ValueKind::Record | ValueKind::RecordArray => {
            out.push_str(dialect.long_text_type())
        }
    }
}

/// Wrap an execution-time driver error, letting the dialect upgrade it to a
/// constraint violation when it recognizes the code.
pub(crate) fn wrap_execute(
    dialect: &dyn Dialect,
    debug_sql: String,
    source: DriverError,
) -> crate::SqlError {
    match dialect.classify(&source) {
        Some(kind) => crate::SqlError::ConstraintViolation {
            kind,
            debug_sql,
            source,
        },
        None => crate::SqlError::Execute { debug_sql, source },
    }
}

/// Fallback dialect: identity naming, ANSI keywords.
pub struct GenericDialect;

impl GenericDialect {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for GenericDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for GenericDialect {
    fn as_dyn(&self) -> &dyn Dialect {
        self
    }

    fn naming(&self) -> &dyn NamingMapping {
        static NAMING: DefaultNaming = DefaultNaming;
        &NAMING
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Record, RecordTypeBuilder, Value};
    use time::macros::{date, datetime};

    fn literal(value: &Value) -> String {
        let mut out = String::new();
        GenericDialect.write_value(&mut out, value);
        out
    }

    #[test]
    fn debug_literals() {
        assert_eq!(literal(&Value::Null), "NULL");
        assert_eq!(literal(&Value::Integer(None)), "NULL");
        assert_eq!(literal(&Value::Integer(Some(-3))), "-3");
        assert_eq!(literal(&Value::Long(Some(1_000_000_000_000))), "1000000000000");
        assert_eq!(literal(&Value::Double(Some(2.5))), "2.5");
        assert_eq!(literal(&Value::Boolean(Some(true))), "true");
        assert_eq!(literal(&Value::Text(Some("it's".to_owned()))), "'it''s'");
        assert_eq!(
            literal(&Value::Bytes(Some(vec![0xDE, 0xAD].into_boxed_slice()))),
            "'\\xDEAD'"
        );
        assert_eq!(literal(&Value::Date(Some(date!(2024 - 01 - 02)))), "'2024-01-02'");
        assert_eq!(
            literal(&Value::DateTime(Some(datetime!(2024-01-02 03:04:05 UTC)))),
            "'2024-01-02T03:04:05Z'"
        );
        assert_eq!(
            literal(&Value::Timestamp(Some(datetime!(2024-01-02 03:04:05)))),
            "'2024-01-02T03:04:05'"
        );
        assert_eq!(
            literal(&Value::TextArray(Some(vec!["a".to_owned(), "b".to_owned()]))),
            "'a,b'"
        );
        assert_eq!(literal(&Value::LongArray(Some(vec![1, 2, 3]))), "1,2,3");
    }

    #[test]
    fn record_literal_is_json() {
        let mut builder = RecordTypeBuilder::new("point");
        builder.integer("x");
        builder.integer("y");
        let ty = builder.build();
        let mut record = Record::new(&ty);
        record.set(&ty.field("x").unwrap(), 1).set(&ty.field("y").unwrap(), 2);
        assert_eq!(
            literal(&Value::Record(Some(Box::new(record)))),
            r#"{"x":1,"y":2}"#
        );
    }

    #[test]
    fn override_names_bypass_the_mapping() {
        struct Upper;
        impl NamingMapping for Upper {
            fn table_name(&self, name: &str, _escaped: bool) -> String {
                name.to_uppercase()
            }
            fn column_name(&self, name: &str, _escaped: bool) -> String {
                name.to_uppercase()
            }
        }
        struct UpperDialect;
        impl Dialect for UpperDialect {
            fn as_dyn(&self) -> &dyn Dialect {
                self
            }
            fn naming(&self) -> &dyn NamingMapping {
                static NAMING: Upper = Upper;
                &NAMING
            }
        }
        let mut builder = RecordTypeBuilder::new("movie");
        builder.table_name("films");
        builder.integer("id").column_name("movie_id");
        builder.text("title");
        let ty = builder.build();
        let dialect = UpperDialect;
        assert_eq!(dialect.table_name(&ty, true), "films");
        assert_eq!(dialect.column_name(&ty.field("id").unwrap(), true), "movie_id");
        assert_eq!(dialect.column_name(&ty.field("title").unwrap(), true), "TITLE");
    }
}
