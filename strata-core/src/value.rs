use crate::Record;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Discriminant of [`Value`], used as the semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Long,
    Double,
    Boolean,
    Text,
    Bytes,
    Date,
    DateTime,
    Timestamp,
    TextArray,
    LongArray,
    Record,
    RecordArray,
}

/// A typed database value. Each variant carries `Option<T>` so that nullness
/// travels with the type: a null integer stays distinguishable from a null
/// string, which matters when binding parameters and rendering DDL.
#[derive(Default, Debug, Clone, PartialEq)]
pub enum Value {
    /// A null with no type information (e.g. a column absent from a result).
    #[default]
    Null,
    Integer(Option<i32>),
    Long(Option<i64>),
    Double(Option<f64>),
    Boolean(Option<bool>),
    Text(Option<String>),
    Bytes(Option<Box<[u8]>>),
    Date(Option<Date>),
    /// Date and time with timezone.
    DateTime(Option<OffsetDateTime>),
    /// Date and time without timezone.
    Timestamp(Option<PrimitiveDateTime>),
    TextArray(Option<Vec<String>>),
    LongArray(Option<Vec<i64>>),
    Record(Option<Box<Record>>),
    RecordArray(Option<Vec<Record>>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Integer(v) => v.is_none(),
            Value::Long(v) => v.is_none(),
            Value::Double(v) => v.is_none(),
            Value::Boolean(v) => v.is_none(),
            Value::Text(v) => v.is_none(),
            Value::Bytes(v) => v.is_none(),
            Value::Date(v) => v.is_none(),
            Value::DateTime(v) => v.is_none(),
            Value::Timestamp(v) => v.is_none(),
            Value::TextArray(v) => v.is_none(),
            Value::LongArray(v) => v.is_none(),
            Value::Record(v) => v.is_none(),
            Value::RecordArray(v) => v.is_none(),
        }
    }

    /// The semantic kind, `None` for the untyped null.
    pub fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            Value::Null => return None,
            Value::Integer(..) => ValueKind::Integer,
            Value::Long(..) => ValueKind::Long,
            Value::Double(..) => ValueKind::Double,
            Value::Boolean(..) => ValueKind::Boolean,
            Value::Text(..) => ValueKind::Text,
            Value::Bytes(..) => ValueKind::Bytes,
            Value::Date(..) => ValueKind::Date,
            Value::DateTime(..) => ValueKind::DateTime,
            Value::Timestamp(..) => ValueKind::Timestamp,
            Value::TextArray(..) => ValueKind::TextArray,
            Value::LongArray(..) => ValueKind::LongArray,
            Value::Record(..) => ValueKind::Record,
            Value::RecordArray(..) => ValueKind::RecordArray,
        })
    }

    /// A typed null of the given kind.
    pub fn null_of(kind: ValueKind) -> Value {
        match kind {
            ValueKind::Integer => Value::Integer(None),
            ValueKind::Long => Value::Long(None),
            ValueKind::Double => Value::Double(None),
            ValueKind::Boolean => Value::Boolean(None),
            ValueKind::Text => Value::Text(None),
            ValueKind::Bytes => Value::Bytes(None),
            ValueKind::Date => Value::Date(None),
            ValueKind::DateTime => Value::DateTime(None),
            ValueKind::Timestamp => Value::Timestamp(None),
            ValueKind::TextArray => Value::TextArray(None),
            ValueKind::LongArray => Value::LongArray(None),
            ValueKind::Record => Value::Record(None),
            ValueKind::RecordArray => Value::RecordArray(None),
        }
    }

    pub fn same_kind(&self, other: &Value) -> bool {
        match (self.kind(), other.kind()) {
            (Some(l), Some(r)) => l == r,
            _ => true,
        }
    }

    /// The encoding handed to the driver when binding: arrays and nested
    /// records travel as JSON text columns, everything else as-is. The
    /// accessor layer parses the text back on the decode side.
    pub(crate) fn driver_encoding(self) -> Value {
        match self {
            Value::TextArray(v) => {
                Value::Text(v.map(|v| serde_json::to_string(&v).unwrap_or_default()))
            }
            Value::LongArray(v) => {
                Value::Text(v.map(|v| serde_json::to_string(&v).unwrap_or_default()))
            }
            Value::Record(v) => Value::Text(v.map(|r| r.to_json())),
            Value::RecordArray(v) => Value::Text(v.map(|records| {
                let mut out = String::from("[");
                for (i, record) in records.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&record.to_json());
                }
                out.push(']');
                out
            })),
            other => other,
        }
    }
}

macro_rules! value_from {
    ($rust:ty, $variant:ident) => {
        impl From<$rust> for Value {
            fn from(value: $rust) -> Self {
                Value::$variant(Some(value.into()))
            }
        }
        impl From<Option<$rust>> for Value {
            fn from(value: Option<$rust>) -> Self {
                Value::$variant(value.map(Into::into))
            }
        }
    };
}

value_from!(i32, Integer);
value_from!(i64, Long);
value_from!(f64, Double);
value_from!(bool, Boolean);
value_from!(String, Text);
value_from!(&str, Text);
value_from!(Vec<u8>, Bytes);
value_from!(Date, Date);
value_from!(OffsetDateTime, DateTime);
value_from!(PrimitiveDateTime, Timestamp);
value_from!(Vec<String>, TextArray);
value_from!(Vec<i64>, LongArray);

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(Some(Box::new(value)))
    }
}

impl From<Vec<Record>> for Value {
    fn from(value: Vec<Record>) -> Self {
        Value::RecordArray(Some(value))
    }
}
