use crate::{Dialect, Field, RecordType, util::separated_by};

/// Render `CREATE TABLE` for a record type. A single key field is declared
/// inline, a composite key as a trailing `PRIMARY KEY (…)` clause.
pub(crate) fn render_create_table(dialect: &dyn Dialect, ty: &RecordType) -> String {
    let key_count = ty.key_fields().count();
    let mut out = String::with_capacity(64 + ty.len() * 24);
    out.push_str("CREATE TABLE ");
    out.push_str(&dialect.table_name(ty, true));
    out.push_str(" (");
    separated_by(
        &mut out,
        ty.fields(),
        |out, field| {
            write_column_fragment(dialect, out, &field, key_count == 1);
        },
        ", ",
    );
    if key_count > 1 {
        out.push_str(", PRIMARY KEY (");
        separated_by(
            &mut out,
            ty.key_fields(),
            |out, field| out.push_str(&dialect.column_name(&field, true)),
            ", ",
        );
        out.push(')');
    }
    out.push(')');
    out
}

fn write_column_fragment(dialect: &dyn Dialect, out: &mut String, field: &Field, inline_key: bool) {
    out.push_str(&dialect.column_name(field, true));
    out.push(' ');
    dialect.write_column_type(out, field);
    if !field.nullable() && !field.is_key() {
        out.push_str(" NOT NULL");
    }
    if field.is_key() && inline_key {
        out.push_str(" PRIMARY KEY");
    }
}

/// Render `ALTER TABLE … ADD COLUMN`. Callers may ensure a column exists more
/// than once; a duplicate-column error from the engine is surfaced, not
/// swallowed.
pub(crate) fn render_add_column(dialect: &dyn Dialect, ty: &RecordType, field: &Field) -> String {
    let mut out = String::with_capacity(48);
    out.push_str("ALTER TABLE ");
    out.push_str(&dialect.table_name(ty, true));
    out.push_str(" ADD COLUMN ");
    write_column_fragment(dialect, &mut out, field, false);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GenericDialect, RecordTypeBuilder};

    #[test]
    fn create_table_with_single_key() {
        let mut builder = RecordTypeBuilder::new("movie");
        builder.integer("id").key().auto_increment();
        builder.text("title").max_size(255);
        builder.double("rating").nullable();
        let ty = builder.build();
        assert_eq!(
            render_create_table(&GenericDialect, &ty),
            "CREATE TABLE movie (id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY, \
             title VARCHAR(255) NOT NULL, rating DOUBLE PRECISION)"
        );
    }

    #[test]
    fn create_table_with_composite_key() {
        let mut builder = RecordTypeBuilder::new("role");
        builder.integer("movie_id").key();
        builder.integer("actor_id").key();
        builder.text("part").nullable();
        let ty = builder.build();
        assert_eq!(
            render_create_table(&GenericDialect, &ty),
            "CREATE TABLE role (movie_id INTEGER, actor_id INTEGER, part TEXT, \
             PRIMARY KEY (movie_id, actor_id))"
        );
    }

    #[test]
    fn unbounded_and_threshold_strings() {
        let mut builder = RecordTypeBuilder::new("doc");
        builder.text("summary").max_size(29_999);
        builder.text("body").max_size(30_000);
        builder.text("notes").nullable();
        let ty = builder.build();
        let sql = render_create_table(&GenericDialect, &ty);
        assert!(sql.contains("summary VARCHAR(29999)"));
        assert!(sql.contains("body TEXT"));
        assert!(sql.contains("notes TEXT"));
    }

    #[test]
    fn add_column() {
        let mut builder = RecordTypeBuilder::new("movie");
        builder.integer("id").key();
        builder.date("released").nullable();
        let ty = builder.build();
        assert_eq!(
            render_add_column(&GenericDialect, &ty, &ty.field("released").unwrap()),
            "ALTER TABLE movie ADD COLUMN released DATE"
        );
    }
}
