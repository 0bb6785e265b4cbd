use crate::{Field, Operand, Value};

/// Comparison operator of a binary constraint. `Greater`/`Less` are the
/// inclusive forms; the `Strictly*` constructors produce the exclusive ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    GreaterOrEqual,
    LessOrEqual,
    StrictlyGreater,
    StrictlyLess,
}

impl CompareOp {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "<>",
            CompareOp::GreaterOrEqual => ">=",
            CompareOp::LessOrEqual => "<=",
            CompareOp::StrictlyGreater => ">",
            CompareOp::StrictlyLess => "<",
        }
    }
}

/// An immutable predicate tree. Stateless and reusable: the compiler visits it
/// once to render text and once per execution to bind values, in the same
/// traversal order.
///
/// Combinators are n-ary; [`Constraint::and`]/[`Constraint::or`] flatten
/// nested combinators of the same kind, so `a.and(b).and(c)` and
/// `a.and(b.and(c))` produce the same tree.
#[derive(Debug, Clone)]
pub enum Constraint {
    Compare {
        op: CompareOp,
        left: Operand,
        right: Operand,
    },
    And(Vec<Constraint>),
    Or(Vec<Constraint>),
    In {
        field: Field,
        values: Vec<Value>,
        negated: bool,
    },
    /// Pattern containment (`LIKE`). `start_anchored` pins the pattern to the
    /// beginning of the column value.
    Like {
        field: Field,
        value: String,
        start_anchored: bool,
        negated: bool,
        ignore_case: bool,
    },
    Regex {
        field: Field,
        pattern: String,
        case_sensitive: bool,
        negated: bool,
    },
    Null {
        field: Field,
        negated: bool,
    },
}

impl Constraint {
    pub fn and(self, other: Constraint) -> Constraint {
        merge(true, self, other)
    }

    pub fn or(self, other: Constraint) -> Constraint {
        merge(false, self, other)
    }

    pub(crate) fn is_combinator(&self) -> bool {
        matches!(self, Constraint::And(..) | Constraint::Or(..))
    }
}

fn merge(conjunction: bool, left: Constraint, right: Constraint) -> Constraint {
    let mut children = Vec::with_capacity(2);
    let mut absorb = |c: Constraint| match (conjunction, c) {
        (true, Constraint::And(inner)) => children.extend(inner),
        (false, Constraint::Or(inner)) => children.extend(inner),
        (_, other) => children.push(other),
    };
    absorb(left);
    absorb(right);
    if conjunction {
        Constraint::And(children)
    } else {
        Constraint::Or(children)
    }
}

/// Flatten an iterator of constraints into a single combinator. A single
/// child is returned unwrapped, an empty input yields `None`.
pub(crate) fn combine(
    conjunction: bool,
    items: impl IntoIterator<Item = Constraint>,
) -> Option<Constraint> {
    let mut children: Vec<Constraint> = Vec::new();
    for item in items {
        match (conjunction, item) {
            (true, Constraint::And(inner)) => children.extend(inner),
            (false, Constraint::Or(inner)) => children.extend(inner),
            (_, other) => children.push(other),
        }
    }
    match children.len() {
        0 => None,
        1 => children.pop(),
        _ => Some(if conjunction {
            Constraint::And(children)
        } else {
            Constraint::Or(children)
        }),
    }
}
