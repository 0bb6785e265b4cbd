use strata_core::{
    DefaultNaming, Dialect, DriverError, NamingMapping, ViolationKind,
};

/// MySQL/MariaDB dialect. Identifier mapping is the identity (MySQL keeps
/// case on Linux); type keywords and error numbers are MySQL's.
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn as_dyn(&self) -> &dyn Dialect {
        self
    }

    fn naming(&self) -> &dyn NamingMapping {
        static NAMING: DefaultNaming = DefaultNaming;
        &NAMING
    }

    fn auto_increment_suffix(&self) -> &'static str {
        " AUTO_INCREMENT"
    }

    fn long_text_type(&self) -> &'static str {
        "LONGTEXT"
    }

    fn blob_type(&self) -> &'static str {
        "LONGBLOB"
    }

    fn double_type(&self) -> &'static str {
        "DOUBLE"
    }

    /// MySQL's TIMESTAMP has an epoch-bounded range, DATETIME does not.
    fn date_time_type(&self) -> &'static str {
        "DATETIME"
    }

    fn timestamp_type(&self) -> &'static str {
        "DATETIME"
    }

    fn classify(&self, error: &DriverError) -> Option<ViolationKind> {
        match error.code {
            Some(1062) => Some(ViolationKind::Unique),
            Some(1216) | Some(1217) | Some(1451) | Some(1452) => Some(ViolationKind::ForeignKey),
            _ => None,
        }
    }
}
