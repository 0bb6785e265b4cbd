use crate::{Field, Value, ValueSource};
use std::{
    fmt::{self, Debug, Formatter},
    rc::Rc,
};

/// A leaf of a constraint tree.
///
/// Fields render as `table.column`; values and dynamic sources render as
/// positional placeholders and are bound during the binding pass (sources are
/// read at bind time, so a reusable constraint picks up their current value on
/// every execution).
#[derive(Clone)]
pub enum Operand {
    Field(Field),
    Value(Value),
    Source(Field, Rc<dyn ValueSource>),
}

impl Operand {
    /// The value bound for this operand; fields bind nothing.
    pub(crate) fn current_value(&self) -> Option<Value> {
        match self {
            Operand::Field(..) => None,
            Operand::Value(v) => Some(v.clone()),
            Operand::Source(.., source) => Some(source.value()),
        }
    }
}

impl Debug for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(field) => write!(f, "Field({:?})", field),
            Operand::Value(value) => write!(f, "Value({:?})", value),
            Operand::Source(field, ..) => write!(f, "Source({:?})", field),
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<&Field> for Operand {
    fn from(field: &Field) -> Self {
        Operand::Field(field.clone())
    }
}
