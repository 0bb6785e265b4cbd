use strata_core::{NamingMapping, upper_case_reserved_safe};

/// HSQLDB stores identifiers upper-cased; identifiers colliding with a
/// reserved keyword get a `__` suffix (`WHERE` becomes `WHERE__`). Explicit
/// physical-name overrides on the schema bypass this mapping.
pub struct HsqlNaming;

impl NamingMapping for HsqlNaming {
    fn table_name(&self, name: &str, _escaped: bool) -> String {
        upper_case_reserved_safe(name)
    }

    fn column_name(&self, name: &str, _escaped: bool) -> String {
        upper_case_reserved_safe(name)
    }
}
