//! The constraint-to-SQL compiler: three exhaustive passes over the same
//! tree, all in left-to-right depth-first order.
//!
//! `render` and `bind` are the load-bearing pair: the values `bind` feeds to
//! the statement must line up one-to-one with the `?` placeholders `render`
//! produced. Both passes therefore walk the identical structure; any new
//! constraint variant must be added to both (the exhaustive matches make the
//! compiler catch a missing case).

use crate::{Constraint, Dialect, DriverResult, Field, Operand, RecordType, Statement, Value};

/// Render the constraint as a WHERE-clause fragment with `?` placeholders,
/// accumulating every referenced record type into `tables` in first-seen
/// order (the select builder turns that set into its FROM list).
pub(crate) fn render(
    constraint: &Constraint,
    dialect: &dyn Dialect,
    tables: &mut Vec<RecordType>,
    out: &mut String,
) {
    walk(constraint, dialect, &mut Some(tables), out, false);
}

/// Render the constraint with current operand values inlined as literals.
/// Diagnostics only; never executed.
pub(crate) fn render_debug(constraint: &Constraint, dialect: &dyn Dialect, out: &mut String) {
    walk(constraint, dialect, &mut None, out, true);
}

/// Debug-mode render that still accumulates referenced types, for callers
/// that must reproduce the FROM list of the executable text.
pub(crate) fn render_debug_with_tables(
    constraint: &Constraint,
    dialect: &dyn Dialect,
    tables: &mut Vec<RecordType>,
    out: &mut String,
) {
    walk(constraint, dialect, &mut Some(tables), out, true);
}

/// Bind the constraint's parameter values into `statement`, consuming
/// 0-based indexes from `index` in the order `render` emitted placeholders.
pub(crate) fn bind(
    constraint: &Constraint,
    dialect: &dyn Dialect,
    statement: &mut dyn Statement,
    index: &mut usize,
) -> DriverResult<()> {
    match constraint {
        Constraint::Compare { left, right, .. } => {
            bind_operand(left, statement, index)?;
            bind_operand(right, statement, index)?;
        }
        Constraint::And(children) | Constraint::Or(children) => {
            for child in children {
                bind(child, dialect, statement, index)?;
            }
        }
        Constraint::In { values, .. } => {
            // The empty set renders as a constant predicate with no
            // placeholders, so there is nothing to bind either.
            for value in values {
                bind_value(statement, index, value.clone())?;
            }
        }
        Constraint::Like {
            value,
            start_anchored,
            ignore_case,
            ..
        } => {
            let fold = *ignore_case && dialect.like_ignore_case().is_none();
            bind_value(
                statement,
                index,
                Value::Text(Some(like_pattern(value, *start_anchored, fold))),
            )?;
        }
        Constraint::Regex { pattern, .. } => {
            bind_value(statement, index, Value::Text(Some(pattern.clone())))?;
        }
        Constraint::Null { .. } => {}
    }
    Ok(())
}

fn bind_operand(
    operand: &Operand,
    statement: &mut dyn Statement,
    index: &mut usize,
) -> DriverResult<()> {
    if let Some(value) = operand.current_value() {
        bind_value(statement, index, value)?;
    }
    Ok(())
}

fn bind_value(statement: &mut dyn Statement, index: &mut usize, value: Value) -> DriverResult<()> {
    statement.bind(*index, &value.driver_encoding())?;
    *index += 1;
    Ok(())
}

fn walk(
    constraint: &Constraint,
    dialect: &dyn Dialect,
    tables: &mut Option<&mut Vec<RecordType>>,
    out: &mut String,
    debug: bool,
) {
    match constraint {
        Constraint::Compare { op, left, right } => {
            write_operand(left, dialect, tables, out, debug);
            out.push(' ');
            out.push_str(op.sql());
            out.push(' ');
            write_operand(right, dialect, tables, out, debug);
        }
        Constraint::And(children) => write_combinator(children, " AND ", dialect, tables, out, debug),
        Constraint::Or(children) => write_combinator(children, " OR ", dialect, tables, out, debug),
        Constraint::In {
            field,
            values,
            negated,
        } => {
            if values.is_empty() {
                // An empty membership set cannot be rendered as `IN ()`;
                // IN degenerates to always-false, NOT IN to always-true.
                out.push_str(if *negated { "1 = 1" } else { "1 = 0" });
                return;
            }
            write_column(field, dialect, tables, out);
            out.push_str(if *negated { " NOT IN (" } else { " IN (" });
            let mut first = true;
            for value in values {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                if debug {
                    dialect.write_value(out, value);
                } else {
                    out.push('?');
                }
            }
            out.push(')');
        }
        Constraint::Like {
            field,
            value,
            start_anchored,
            negated,
            ignore_case,
        } => {
            let ilike = if *ignore_case {
                dialect.like_ignore_case()
            } else {
                None
            };
            let fold = *ignore_case && ilike.is_none();
            if fold {
                out.push_str("LOWER(");
                write_column(field, dialect, tables, out);
                out.push(')');
            } else {
                write_column(field, dialect, tables, out);
            }
            out.push(' ');
            if *negated {
                out.push_str("NOT ");
            }
            out.push_str(ilike.unwrap_or("LIKE"));
            out.push(' ');
            if debug {
                dialect.write_text_literal(out, &like_pattern(value, *start_anchored, fold));
            } else {
                out.push('?');
            }
        }
        Constraint::Regex {
            field,
            pattern,
            case_sensitive,
            negated,
        } => {
            write_column(field, dialect, tables, out);
            out.push(' ');
            out.push_str(dialect.regex_operator(*case_sensitive, *negated));
            out.push(' ');
            if debug {
                dialect.write_text_literal(out, pattern);
            } else {
                out.push('?');
            }
        }
        Constraint::Null { field, negated } => {
            write_column(field, dialect, tables, out);
            out.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
        }
    }
}

fn write_combinator(
    children: &[Constraint],
    separator: &str,
    dialect: &dyn Dialect,
    tables: &mut Option<&mut Vec<RecordType>>,
    out: &mut String,
    debug: bool,
) {
    let mut first = true;
    for child in children {
        if !first {
            out.push_str(separator);
        }
        first = false;
        // A nested combinator is parenthesized so precedence stays explicit
        // whatever the target dialect's associativity.
        if child.is_combinator() {
            out.push('(');
            walk(child, dialect, tables, out, debug);
            out.push(')');
        } else {
            walk(child, dialect, tables, out, debug);
        }
    }
}

fn write_operand(
    operand: &Operand,
    dialect: &dyn Dialect,
    tables: &mut Option<&mut Vec<RecordType>>,
    out: &mut String,
    debug: bool,
) {
    match operand {
        Operand::Field(field) => write_column(field, dialect, tables, out),
        Operand::Value(value) => {
            if debug {
                dialect.write_value(out, value);
            } else {
                out.push('?');
            }
        }
        Operand::Source(.., source) => {
            if debug {
                dialect.write_value(out, &source.value());
            } else {
                out.push('?');
            }
        }
    }
}

fn write_column(
    field: &Field,
    dialect: &dyn Dialect,
    tables: &mut Option<&mut Vec<RecordType>>,
    out: &mut String,
) {
    if let Some(tables) = tables.as_deref_mut() {
        note_type(tables, field.record_type());
    }
    dialect.write_qualified_column(out, field);
}

/// Record a referenced type, preserving first-seen order.
pub(crate) fn note_type(tables: &mut Vec<RecordType>, ty: &RecordType) {
    if !tables.contains(ty) {
        tables.push(ty.clone());
    }
}

/// Escape SQL LIKE wildcards in a literal before wrapping it into a pattern.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build the LIKE pattern: escape wildcards, optionally case-fold (the
/// fallback when the dialect has no case-insensitive operator), then anchor.
pub(crate) fn like_pattern(value: &str, start_anchored: bool, fold: bool) -> String {
    let mut escaped = escape_like(value);
    if fold {
        escaped = escaped.to_lowercase();
    }
    if start_anchored {
        format!("{}%", escaped)
    } else {
        format!("%{}%", escaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Cursor, DriverError, GenericDialect, NamingMapping, RecordType, RecordTypeBuilder,
        SharedValue, constraint::build as constraints,
    };
    use std::rc::Rc;

    fn movie() -> RecordType {
        let mut builder = RecordTypeBuilder::new("movie");
        builder.integer("id").key();
        builder.text("title");
        builder.double("rating").nullable();
        builder.long("year");
        builder.build()
    }

    fn studio() -> RecordType {
        let mut builder = RecordTypeBuilder::new("studio");
        builder.integer("id").key();
        builder.text("name");
        builder.build()
    }

    /// Statement stub that records bound values.
    #[derive(Default)]
    struct Recording {
        bound: Vec<(usize, Value)>,
    }

    impl crate::Statement for Recording {
        fn bind(&mut self, index: usize, value: &Value) -> Result<(), DriverError> {
            self.bound.push((index, value.clone()));
            Ok(())
        }
        fn execute_query(&mut self) -> Result<Box<dyn Cursor>, DriverError> {
            unimplemented!()
        }
        fn execute_update(&mut self) -> Result<u64, DriverError> {
            unimplemented!()
        }
        fn generated_keys(&mut self) -> Result<Option<Box<dyn Cursor>>, DriverError> {
            Ok(None)
        }
        fn close(&mut self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    /// Dialect with a case-insensitive LIKE operator.
    struct IlikeDialect;
    struct IlikeNaming;
    impl NamingMapping for IlikeNaming {
        fn table_name(&self, name: &str, _escaped: bool) -> String {
            name.to_owned()
        }
        fn column_name(&self, name: &str, _escaped: bool) -> String {
            name.to_owned()
        }
        fn like_ignore_case(&self) -> Option<&'static str> {
            Some("ILIKE")
        }
    }
    impl Dialect for IlikeDialect {
        fn as_dyn(&self) -> &dyn Dialect {
            self
        }
        fn naming(&self) -> &dyn NamingMapping {
            static NAMING: IlikeNaming = IlikeNaming;
            &NAMING
        }
    }

    fn rendered(constraint: &Constraint) -> (String, Vec<RecordType>) {
        let mut out = String::new();
        let mut tables = Vec::new();
        render(constraint, &GenericDialect, &mut tables, &mut out);
        (out, tables)
    }

    fn bound(constraint: &Constraint) -> Vec<Value> {
        let mut statement = Recording::default();
        let mut index = 0;
        bind(constraint, &GenericDialect, &mut statement, &mut index).unwrap();
        // Indexes must be consecutive from zero, in traversal order.
        for (expected, (index, ..)) in statement.bound.iter().enumerate() {
            assert_eq!(expected, *index);
        }
        statement.bound.into_iter().map(|(.., v)| v).collect()
    }

    #[test]
    fn comparison_operators() {
        let movie = movie();
        let rating = movie.field("rating").unwrap();
        for (constraint, op) in [
            (constraints::equal(&rating, 7.0), "="),
            (constraints::not_equal(&rating, 7.0), "<>"),
            (constraints::greater(&rating, 7.0), ">="),
            (constraints::less(&rating, 7.0), "<="),
            (constraints::strictly_greater(&rating, 7.0), ">"),
            (constraints::strictly_less(&rating, 7.0), "<"),
        ] {
            let (sql, tables) = rendered(&constraint);
            assert_eq!(sql, format!("movie.rating {} ?", op));
            assert_eq!(tables, vec![movie.clone()]);
            assert_eq!(bound(&constraint), vec![Value::Double(Some(7.0))]);
        }
    }

    #[test]
    fn placeholder_and_bind_order_match() {
        let movie = movie();
        let id = movie.field("id").unwrap();
        let title = movie.field("title").unwrap();
        let year = movie.field("year").unwrap();
        let constraint = constraints::equal(&id, 4)
            .and(constraints::in_values(&title, ["a", "b"]))
            .and(constraints::greater(&year, 1990i64));
        let (sql, ..) = rendered(&constraint);
        let placeholders = sql.matches('?').count();
        let values = bound(&constraint);
        assert_eq!(placeholders, 4);
        assert_eq!(
            values,
            vec![
                Value::Integer(Some(4)),
                Value::Text(Some("a".to_owned())),
                Value::Text(Some("b".to_owned())),
                Value::Long(Some(1990)),
            ]
        );
    }

    #[test]
    fn sources_are_read_at_bind_time() {
        let movie = movie();
        let id = movie.field("id").unwrap();
        let source = SharedValue::new(1);
        let constraint = constraints::equal_source(&id, Rc::new(source.clone()));
        assert_eq!(bound(&constraint), vec![Value::Integer(Some(1))]);
        source.set(2);
        assert_eq!(bound(&constraint), vec![Value::Integer(Some(2))]);
    }

    #[test]
    fn and_flattening_is_associative() {
        let movie = movie();
        let id = movie.field("id").unwrap();
        let a = || constraints::equal(&id, 1);
        let b = || constraints::equal(&id, 2);
        let c = || constraints::equal(&id, 3);
        let left = a().and(b()).and(c());
        let right = a().and(b().and(c()));
        assert_eq!(rendered(&left).0, rendered(&right).0);
        assert_eq!(bound(&left), bound(&right));
    }

    #[test]
    fn mixed_combinators_are_parenthesized() {
        let movie = movie();
        let id = movie.field("id").unwrap();
        let constraint = constraints::equal(&id, 1)
            .and(constraints::equal(&id, 2).or(constraints::equal(&id, 3)));
        let (sql, ..) = rendered(&constraint);
        assert_eq!(sql, "movie.id = ? AND (movie.id = ? OR movie.id = ?)");
    }

    #[test]
    fn cross_type_predicates_accumulate_tables_once() {
        let movie = movie();
        let studio = studio();
        let constraint = constraints::field_equal(
            &movie.field("id").unwrap(),
            &studio.field("id").unwrap(),
        )
        .and(constraints::equal(&movie.field("year").unwrap(), 2001i64));
        let (sql, tables) = rendered(&constraint);
        assert_eq!(sql, "movie.id = studio.id AND movie.year = ?");
        assert_eq!(tables, vec![movie, studio]);
    }

    #[test]
    fn empty_in_is_always_false_and_empty_not_in_always_true() {
        let movie = movie();
        let id = movie.field("id").unwrap();
        let empty: [i32; 0] = [];
        let (sql, ..) = rendered(&constraints::in_values(&id, empty));
        assert_eq!(sql, "1 = 0");
        let (sql, ..) = rendered(&constraints::not_in(&id, empty));
        assert_eq!(sql, "1 = 1");
        assert!(bound(&constraints::in_values(&id, empty)).is_empty());
        assert!(bound(&constraints::not_in(&id, empty)).is_empty());
    }

    #[test]
    fn in_renders_one_placeholder_per_member() {
        let movie = movie();
        let id = movie.field("id").unwrap();
        let (sql, ..) = rendered(&constraints::in_values(&id, [1, 2, 3]));
        assert_eq!(sql, "movie.id IN (?, ?, ?)");
        let (sql, ..) = rendered(&constraints::not_in(&id, [1]));
        assert_eq!(sql, "movie.id NOT IN (?)");
    }

    #[test]
    fn like_escapes_wildcards() {
        let movie = movie();
        let title = movie.field("title").unwrap();
        let constraint = constraints::contains(&title, "50%_done\\");
        let (sql, ..) = rendered(&constraint);
        assert_eq!(sql, "movie.title LIKE ?");
        assert_eq!(
            bound(&constraint),
            vec![Value::Text(Some("%50\\%\\_done\\\\%".to_owned()))]
        );
        let constraint = constraints::starts_with(&title, "The");
        assert_eq!(
            bound(&constraint),
            vec![Value::Text(Some("The%".to_owned()))]
        );
    }

    #[test]
    fn ignore_case_uses_the_dialect_operator_or_folds() {
        let movie = movie();
        let title = movie.field("title").unwrap();
        let constraint = constraints::contains_ignore_case(&title, "Neo");

        let mut out = String::new();
        let mut tables = Vec::new();
        render(&constraint, &IlikeDialect, &mut tables, &mut out);
        assert_eq!(out, "movie.title ILIKE ?");
        let mut statement = Recording::default();
        bind(&constraint, &IlikeDialect, &mut statement, &mut 0).unwrap();
        assert_eq!(statement.bound[0].1, Value::Text(Some("%Neo%".to_owned())));

        let (sql, ..) = rendered(&constraint);
        assert_eq!(sql, "LOWER(movie.title) LIKE ?");
        assert_eq!(
            bound(&constraint),
            vec![Value::Text(Some("%neo%".to_owned()))]
        );
    }

    #[test]
    fn negated_like() {
        let movie = movie();
        let title = movie.field("title").unwrap();
        let (sql, ..) = rendered(&constraints::not_starts_with(&title, "The"));
        assert_eq!(sql, "movie.title NOT LIKE ?");
    }

    #[test]
    fn regex_operators() {
        let movie = movie();
        let title = movie.field("title").unwrap();
        let constraint = constraints::regex_case_sensitive(&title, "^The.*");
        let (sql, ..) = rendered(&constraint);
        assert_eq!(sql, "movie.title REGEXP ?");
        assert_eq!(
            bound(&constraint),
            vec![Value::Text(Some("^The.*".to_owned()))]
        );
        let (sql, ..) = rendered(&constraints::not_regex_case_insensitive(&title, "x"));
        assert_eq!(sql, "movie.title NOT REGEXP ?");
    }

    #[test]
    fn null_checks_bind_nothing() {
        let movie = movie();
        let rating = movie.field("rating").unwrap();
        let (sql, ..) = rendered(&constraints::is_null(&rating));
        assert_eq!(sql, "movie.rating IS NULL");
        let (sql, ..) = rendered(&constraints::is_not_null(&rating));
        assert_eq!(sql, "movie.rating IS NOT NULL");
        assert!(bound(&constraints::is_null(&rating)).is_empty());
    }

    #[test]
    fn debug_render_inlines_current_values() {
        let movie = movie();
        let id = movie.field("id").unwrap();
        let title = movie.field("title").unwrap();
        let source = SharedValue::new("O'Brien");
        let constraint = constraints::equal(&id, 4)
            .and(constraints::equal_source(&title, Rc::new(source)))
            .and(constraints::in_values(&id, [1, 2]));
        let mut out = String::new();
        render_debug(&constraint, &GenericDialect, &mut out);
        assert_eq!(
            out,
            "movie.id = 4 AND movie.title = 'O''Brien' AND movie.id IN (1, 2)"
        );
    }
}
