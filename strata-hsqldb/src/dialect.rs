use crate::HsqlNaming;
use strata_core::{Dialect, DriverError, NamingMapping, ViolationKind};

/// HSQLDB dialect: `IDENTITY` keys, LONGVARCHAR/LONGVARBINARY storage types,
/// and no generated-keys request mode (the engine rejects it; inserts into
/// identity tables still succeed, the key reader just stays empty).
pub struct HsqlDialect;

impl Dialect for HsqlDialect {
    fn as_dyn(&self) -> &dyn Dialect {
        self
    }

    fn naming(&self) -> &dyn NamingMapping {
        static NAMING: HsqlNaming = HsqlNaming;
        &NAMING
    }

    fn auto_increment_suffix(&self) -> &'static str {
        " IDENTITY"
    }

    fn long_text_type(&self) -> &'static str {
        "LONGVARCHAR"
    }

    fn blob_type(&self) -> &'static str {
        "LONGVARBINARY"
    }

    fn supports_generated_keys(&self) -> bool {
        false
    }

    fn classify(&self, error: &DriverError) -> Option<ViolationKind> {
        match error.state.as_deref() {
            Some("23505") => Some(ViolationKind::Unique),
            Some("23503") => Some(ViolationKind::ForeignKey),
            _ => None,
        }
    }
}
