//! Constructor catalogue for [`Constraint`] trees.
//!
//! ```
//! # use strata_core::{RecordTypeBuilder, constraints};
//! # let mut b = RecordTypeBuilder::new("user");
//! # b.text("name");
//! # b.integer("age");
//! # let user = b.build();
//! # let name = user.field("name").unwrap();
//! # let age = user.field("age").unwrap();
//! let adults_named_ann = constraints::starts_with(&name, "Ann")
//!     .and(constraints::greater(&age, 18));
//! ```

use crate::{
    CompareOp, Constraint, Field, Operand, Record, Value, ValueSource, constraint::combine,
};
use std::rc::Rc;

fn compare(op: CompareOp, left: Operand, right: Operand) -> Constraint {
    Constraint::Compare { op, left, right }
}

pub fn equal(field: &Field, value: impl Into<Value>) -> Constraint {
    compare(CompareOp::Equal, field.into(), value.into().into())
}

pub fn equal_source(field: &Field, source: Rc<dyn ValueSource>) -> Constraint {
    compare(
        CompareOp::Equal,
        field.into(),
        Operand::Source(field.clone(), source),
    )
}

pub fn field_equal(left: &Field, right: &Field) -> Constraint {
    compare(CompareOp::Equal, left.into(), right.into())
}

pub fn not_equal(field: &Field, value: impl Into<Value>) -> Constraint {
    compare(CompareOp::NotEqual, field.into(), value.into().into())
}

pub fn field_not_equal(left: &Field, right: &Field) -> Constraint {
    compare(CompareOp::NotEqual, left.into(), right.into())
}

/// Inclusive `>=`.
pub fn greater(field: &Field, value: impl Into<Value>) -> Constraint {
    compare(CompareOp::GreaterOrEqual, field.into(), value.into().into())
}

pub fn greater_source(field: &Field, source: Rc<dyn ValueSource>) -> Constraint {
    compare(
        CompareOp::GreaterOrEqual,
        field.into(),
        Operand::Source(field.clone(), source),
    )
}

/// Inclusive `<=`.
pub fn less(field: &Field, value: impl Into<Value>) -> Constraint {
    compare(CompareOp::LessOrEqual, field.into(), value.into().into())
}

pub fn less_source(field: &Field, source: Rc<dyn ValueSource>) -> Constraint {
    compare(
        CompareOp::LessOrEqual,
        field.into(),
        Operand::Source(field.clone(), source),
    )
}

/// Exclusive `>`.
pub fn strictly_greater(field: &Field, value: impl Into<Value>) -> Constraint {
    compare(CompareOp::StrictlyGreater, field.into(), value.into().into())
}

/// Exclusive `<`.
pub fn strictly_less(field: &Field, value: impl Into<Value>) -> Constraint {
    compare(CompareOp::StrictlyLess, field.into(), value.into().into())
}

pub fn and(left: Constraint, right: Constraint) -> Constraint {
    left.and(right)
}

pub fn or(left: Constraint, right: Constraint) -> Constraint {
    left.or(right)
}

/// Conjunction of any number of constraints; `None` for an empty input.
pub fn all(items: impl IntoIterator<Item = Constraint>) -> Option<Constraint> {
    combine(true, items)
}

/// Disjunction of any number of constraints; `None` for an empty input.
pub fn any(items: impl IntoIterator<Item = Constraint>) -> Option<Constraint> {
    combine(false, items)
}

/// Chain onto an optional accumulator, the usual shape of loops building a
/// conjunction.
pub fn and_opt(acc: Option<Constraint>, next: Constraint) -> Constraint {
    match acc {
        Some(c) => c.and(next),
        None => next,
    }
}

pub fn in_values(
    field: &Field,
    values: impl IntoIterator<Item = impl Into<Value>>,
) -> Constraint {
    Constraint::In {
        field: field.clone(),
        values: values.into_iter().map(Into::into).collect(),
        negated: false,
    }
}

pub fn not_in(field: &Field, values: impl IntoIterator<Item = impl Into<Value>>) -> Constraint {
    Constraint::In {
        field: field.clone(),
        values: values.into_iter().map(Into::into).collect(),
        negated: true,
    }
}

fn like(field: &Field, value: &str, start_anchored: bool, negated: bool, ignore_case: bool) -> Constraint {
    Constraint::Like {
        field: field.clone(),
        value: value.to_owned(),
        start_anchored,
        negated,
        ignore_case,
    }
}

pub fn contains(field: &Field, value: &str) -> Constraint {
    like(field, value, false, false, false)
}

pub fn contains_ignore_case(field: &Field, value: &str) -> Constraint {
    like(field, value, false, false, true)
}

pub fn not_contains(field: &Field, value: &str) -> Constraint {
    like(field, value, false, true, false)
}

pub fn not_contains_ignore_case(field: &Field, value: &str) -> Constraint {
    like(field, value, false, true, true)
}

pub fn starts_with(field: &Field, value: &str) -> Constraint {
    like(field, value, true, false, false)
}

pub fn starts_with_ignore_case(field: &Field, value: &str) -> Constraint {
    like(field, value, true, false, true)
}

pub fn not_starts_with(field: &Field, value: &str) -> Constraint {
    like(field, value, true, true, false)
}

pub fn not_starts_with_ignore_case(field: &Field, value: &str) -> Constraint {
    like(field, value, true, true, true)
}

fn regex(field: &Field, pattern: &str, case_sensitive: bool, negated: bool) -> Constraint {
    Constraint::Regex {
        field: field.clone(),
        pattern: pattern.to_owned(),
        case_sensitive,
        negated,
    }
}

pub fn regex_case_sensitive(field: &Field, pattern: &str) -> Constraint {
    regex(field, pattern, true, false)
}

pub fn regex_case_insensitive(field: &Field, pattern: &str) -> Constraint {
    regex(field, pattern, false, false)
}

pub fn not_regex_case_sensitive(field: &Field, pattern: &str) -> Constraint {
    regex(field, pattern, true, true)
}

pub fn not_regex_case_insensitive(field: &Field, pattern: &str) -> Constraint {
    regex(field, pattern, false, true)
}

pub fn is_null(field: &Field) -> Constraint {
    Constraint::Null {
        field: field.clone(),
        negated: false,
    }
}

pub fn is_not_null(field: &Field) -> Constraint {
    Constraint::Null {
        field: field.clone(),
        negated: true,
    }
}

/// Conjunction over the record type's key fields with the record's current
/// values; `None` when the type declares no key.
pub fn key_equals(record: &Record) -> Option<Constraint> {
    all(record
        .record_type()
        .key_fields()
        .map(|field| equal(&field, record.get(&field).clone())))
}

/// Conjunction over every field of the record.
pub fn fields_equal(record: &Record) -> Option<Constraint> {
    all(record
        .record_type()
        .fields()
        .map(|field| equal(&field, record.get(&field).clone())))
}
