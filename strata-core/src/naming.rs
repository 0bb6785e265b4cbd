/// Pure identifier translation, invoked on every identifier emission.
///
/// Implementations must be stateless: the same input always produces the same
/// SQL identifier. Physical-name overrides on the schema bypass the mapping
/// entirely (see [`crate::Dialect::table_name`]).
pub trait NamingMapping {
    fn table_name(&self, name: &str, escaped: bool) -> String;
    fn column_name(&self, name: &str, escaped: bool) -> String;

    /// Name of the dialect's case-insensitive LIKE operator, `None` when the
    /// engine has none; callers then fall back to case-folding both sides.
    fn like_ignore_case(&self) -> Option<&'static str> {
        None
    }
}

/// Identity mapping.
pub struct DefaultNaming;

impl NamingMapping for DefaultNaming {
    fn table_name(&self, name: &str, _escaped: bool) -> String {
        name.to_owned()
    }

    fn column_name(&self, name: &str, _escaped: bool) -> String {
        name.to_owned()
    }
}

/// Identifiers that clash with SQL keywords when upper-cased.
pub const RESERVED_KEYWORDS: &[&str] = &["COUNT", "WHERE", "FROM", "SELECT", "ORDER"];

/// Upper-case an identifier and suffix it when it collides with a reserved
/// keyword (`WHERE` becomes `WHERE__`). A leading underscore is not an option
/// for HSQLDB, hence the suffix.
pub fn upper_case_reserved_safe(name: &str) -> String {
    let upper = name.to_uppercase();
    if RESERVED_KEYWORDS.contains(&upper.as_str()) {
        format!("{}__", upper)
    } else {
        upper
    }
}
