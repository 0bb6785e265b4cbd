use crate::PostgresNaming;
use strata_core::{Dialect, DriverError, Field, NamingMapping, ValueKind, ViolationKind};

/// PostgreSQL dialect: `SERIAL`/`BIGSERIAL` keys, `BYTEA`, `TEXT`,
/// `DOUBLE PRECISION`, the `~` regex operator family and SQLSTATE-based
/// constraint classification.
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn as_dyn(&self) -> &dyn Dialect {
        self
    }

    fn naming(&self) -> &dyn NamingMapping {
        static NAMING: PostgresNaming = PostgresNaming;
        &NAMING
    }

    fn write_column_type(&self, out: &mut String, field: &Field) {
        // SERIAL replaces the integer type entirely instead of suffixing it.
        if field.auto_increment() {
            match field.kind() {
                ValueKind::Integer => {
                    out.push_str("SERIAL");
                    return;
                }
                ValueKind::Long => {
                    out.push_str("BIGSERIAL");
                    return;
                }
                _ => {}
            }
        }
        strata_core::write_generic_column_type(self.as_dyn(), out, field);
    }

    fn blob_type(&self) -> &'static str {
        "BYTEA"
    }

    fn regex_operator(&self, case_sensitive: bool, negated: bool) -> &'static str {
        match (case_sensitive, negated) {
            (true, false) => "~",
            (false, false) => "~*",
            (true, true) => "!~",
            (false, true) => "!~*",
        }
    }

    fn classify(&self, error: &DriverError) -> Option<ViolationKind> {
        match error.state.as_deref() {
            Some("23505") => Some(ViolationKind::Unique),
            Some("23503") => Some(ViolationKind::ForeignKey),
            _ => None,
        }
    }
}
