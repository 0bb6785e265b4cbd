use strata_core::NamingMapping;

/// PostgreSQL folds unquoted identifiers to lower case. This mapping keeps
/// names as-is but double-quotes any escaped identifier that is not already
/// all-lowercase, so mixed-case schema names survive the round trip.
pub struct PostgresNaming;

fn escape_uppercase(name: &str) -> String {
    if name.starts_with('"') && name.ends_with('"') {
        return name.to_owned();
    }
    if name.to_lowercase() == name {
        name.to_owned()
    } else {
        format!("\"{}\"", name)
    }
}

impl NamingMapping for PostgresNaming {
    fn table_name(&self, name: &str, escaped: bool) -> String {
        if escaped {
            escape_uppercase(name)
        } else {
            name.to_owned()
        }
    }

    fn column_name(&self, name: &str, escaped: bool) -> String {
        if escaped {
            escape_uppercase(name)
        } else {
            name.to_owned()
        }
    }

    fn like_ignore_case(&self) -> Option<&'static str> {
        Some("ILIKE")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_case_is_quoted() {
        let naming = PostgresNaming;
        assert_eq!(naming.table_name("MyTable", true), "\"MyTable\"");
        assert_eq!(naming.table_name("mytable", true), "mytable");
        assert_eq!(naming.table_name("\"MyTable\"", true), "\"MyTable\"");
        assert_eq!(naming.table_name("MyTable", false), "MyTable");
    }

    #[test]
    fn ilike_is_exposed() {
        assert_eq!(PostgresNaming.like_ignore_case(), Some("ILIKE"));
    }
}
