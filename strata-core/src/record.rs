use crate::{
    Field, RecordType, Result, SqlError, Value, ValueKind,
    util::{
        format_date, format_date_time, format_timestamp, parse_date, parse_date_time,
        parse_timestamp,
    },
};
use serde_json::{Map, Number, json};
use std::fmt::{self, Debug, Formatter};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// An owned row of a [`RecordType`]: one [`Value`] per field, in field order.
#[derive(Clone, PartialEq)]
pub struct Record {
    ty: RecordType,
    values: Box<[Value]>,
}

impl Record {
    /// A record with every field set to its typed null.
    pub fn new(ty: &RecordType) -> Self {
        Self {
            ty: ty.clone(),
            values: ty.fields().map(|f| f.null_value()).collect(),
        }
    }

    pub fn record_type(&self) -> &RecordType {
        &self.ty
    }

    pub fn get(&self, field: &Field) -> &Value {
        assert!(
            field.record_type() == &self.ty,
            "field {:?} does not belong to record type `{}`",
            field,
            self.ty.name()
        );
        &self.values[field.index()]
    }

    pub fn set(&mut self, field: &Field, value: impl Into<Value>) -> &mut Self {
        assert!(
            field.record_type() == &self.ty,
            "field {:?} does not belong to record type `{}`",
            field,
            self.ty.name()
        );
        self.values[field.index()] = value.into();
        self
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn integer(&self, field: &Field) -> Option<i32> {
        match self.get(field) {
            Value::Integer(v) => *v,
            _ => None,
        }
    }

    pub fn long_value(&self, field: &Field) -> Option<i64> {
        match self.get(field) {
            Value::Long(v) => *v,
            _ => None,
        }
    }

    pub fn double_value(&self, field: &Field) -> Option<f64> {
        match self.get(field) {
            Value::Double(v) => *v,
            _ => None,
        }
    }

    pub fn boolean(&self, field: &Field) -> Option<bool> {
        match self.get(field) {
            Value::Boolean(v) => *v,
            _ => None,
        }
    }

    pub fn text(&self, field: &Field) -> Option<&str> {
        match self.get(field) {
            Value::Text(v) => v.as_deref(),
            _ => None,
        }
    }

    /// JSON object used as the storage encoding of nested-record columns.
    pub fn to_json(&self) -> String {
        serde_json::Value::Object(self.to_json_object()).to_string()
    }

    fn to_json_object(&self) -> Map<String, serde_json::Value> {
        let mut object = Map::with_capacity(self.values.len());
        for field in self.ty.fields() {
            object.insert(
                field.name().to_owned(),
                value_to_json(&self.values[field.index()]),
            );
        }
        object
    }

    pub fn from_json(ty: &RecordType, text: &str) -> Result<Record> {
        let parsed: serde_json::Value =
            serde_json::from_str(text).map_err(|e| SqlError::SchemaMismatch {
                detail: format!("invalid JSON for record type `{}`: {}", ty.name(), e),
            })?;
        Self::from_json_value(ty, &parsed)
    }

    fn from_json_value(ty: &RecordType, parsed: &serde_json::Value) -> Result<Record> {
        let serde_json::Value::Object(object) = parsed else {
            return Err(SqlError::mismatch(format!(
                "expected a JSON object for record type `{}`",
                ty.name()
            )));
        };
        let mut record = Record::new(ty);
        for field in ty.fields() {
            if let Some(v) = object.get(field.name()) {
                record.values[field.index()] = json_to_value(&field, v)?;
            }
        }
        Ok(record)
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.ty.name(), self.to_json())
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    if value.is_null() {
        return serde_json::Value::Null;
    }
    match value {
        Value::Integer(Some(v)) => json!(v),
        Value::Long(Some(v)) => json!(v),
        Value::Double(Some(v)) => Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Boolean(Some(v)) => json!(v),
        Value::Text(Some(v)) => json!(v),
        Value::Bytes(Some(v)) => json!(hex::encode(v)),
        Value::Date(Some(v)) => {
            let mut out = String::with_capacity(10);
            format_date(&mut out, v);
            json!(out)
        }
        Value::DateTime(Some(v)) => {
            let mut out = String::with_capacity(25);
            format_date_time(&mut out, v);
            json!(out)
        }
        Value::Timestamp(Some(v)) => {
            let mut out = String::with_capacity(19);
            format_timestamp(&mut out, v);
            json!(out)
        }
        Value::TextArray(Some(v)) => json!(v),
        Value::LongArray(Some(v)) => json!(v),
        Value::Record(Some(v)) => serde_json::Value::Object(v.to_json_object()),
        Value::RecordArray(Some(v)) => serde_json::Value::Array(
            v.iter()
                .map(|r| serde_json::Value::Object(r.to_json_object()))
                .collect(),
        ),
        _ => serde_json::Value::Null,
    }
}

fn json_to_value(field: &Field, parsed: &serde_json::Value) -> Result<Value> {
    if parsed.is_null() {
        return Ok(field.null_value());
    }
    let mismatch = || {
        SqlError::mismatch(format!(
            "JSON value {} does not decode as {:?} for field {:?}",
            parsed,
            field.kind(),
            field
        ))
    };
    Ok(match field.kind() {
        ValueKind::Integer => Value::Integer(Some(
            parsed
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(mismatch)?,
        )),
        ValueKind::Long => Value::Long(Some(parsed.as_i64().ok_or_else(mismatch)?)),
        ValueKind::Double => Value::Double(Some(parsed.as_f64().ok_or_else(mismatch)?)),
        ValueKind::Boolean => Value::Boolean(Some(parsed.as_bool().ok_or_else(mismatch)?)),
        ValueKind::Text => Value::Text(Some(parsed.as_str().ok_or_else(mismatch)?.to_owned())),
        ValueKind::Bytes => Value::Bytes(Some(
            hex::decode(parsed.as_str().ok_or_else(mismatch)?)
                .map_err(|_| mismatch())?
                .into_boxed_slice(),
        )),
        ValueKind::Date => parsed
            .as_str()
            .and_then(parse_date)
            .map(|v: Date| Value::Date(Some(v)))
            .ok_or_else(mismatch)?,
        ValueKind::DateTime => parsed
            .as_str()
            .and_then(parse_date_time)
            .map(|v: OffsetDateTime| Value::DateTime(Some(v)))
            .ok_or_else(mismatch)?,
        ValueKind::Timestamp => parsed
            .as_str()
            .and_then(parse_timestamp)
            .map(|v: PrimitiveDateTime| Value::Timestamp(Some(v)))
            .ok_or_else(mismatch)?,
        ValueKind::TextArray => Value::TextArray(Some(
            parsed
                .as_array()
                .ok_or_else(mismatch)?
                .iter()
                .map(|v| v.as_str().map(str::to_owned).ok_or_else(mismatch))
                .collect::<Result<Vec<_>>>()?,
        )),
        ValueKind::LongArray => Value::LongArray(Some(
            parsed
                .as_array()
                .ok_or_else(mismatch)?
                .iter()
                .map(|v| v.as_i64().ok_or_else(mismatch))
                .collect::<Result<Vec<_>>>()?,
        )),
        ValueKind::Record => {
            let target = field.target_type().ok_or_else(mismatch)?;
            Value::Record(Some(Box::new(Record::from_json_value(target, parsed)?)))
        }
        ValueKind::RecordArray => {
            let target = field.target_type().ok_or_else(mismatch)?;
            Value::RecordArray(Some(
                parsed
                    .as_array()
                    .ok_or_else(mismatch)?
                    .iter()
                    .map(|v| Record::from_json_value(target, v))
                    .collect::<Result<Vec<_>>>()?,
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordTypeBuilder;
    use time::macros::{date, datetime};

    fn address() -> RecordType {
        let mut builder = RecordTypeBuilder::new("address");
        builder.text("city");
        builder.integer("zip").nullable();
        builder.build()
    }

    fn person(address: &RecordType) -> RecordType {
        let mut builder = RecordTypeBuilder::new("person");
        builder.long("id").key();
        builder.text("name");
        builder.double("height").nullable();
        builder.boolean("active");
        builder.bytes("avatar").nullable();
        builder.date("born");
        builder.date_time("last_seen");
        builder.text_array("tags");
        builder.long_array("scores");
        builder.record("home", address);
        builder.build()
    }

    #[test]
    fn json_round_trip_preserves_every_kind() {
        let address_ty = address();
        let ty = person(&address_ty);
        let mut home = Record::new(&address_ty);
        home.set(&address_ty.field("city").unwrap(), "Paris");
        let mut record = Record::new(&ty);
        record
            .set(&ty.field("id").unwrap(), 42i64)
            .set(&ty.field("name").unwrap(), "Ada")
            .set(&ty.field("height").unwrap(), 1.63)
            .set(&ty.field("active").unwrap(), true)
            .set(&ty.field("avatar").unwrap(), vec![0xDEu8, 0xAD])
            .set(&ty.field("born").unwrap(), date!(1815 - 12 - 10))
            .set(
                &ty.field("last_seen").unwrap(),
                datetime!(2024-03-01 12:30:00 UTC),
            )
            .set(
                &ty.field("tags").unwrap(),
                vec!["math".to_owned(), "engine".to_owned()],
            )
            .set(&ty.field("scores").unwrap(), vec![1i64, 2, 3])
            .set(&ty.field("home").unwrap(), home);

        let decoded = Record::from_json(&ty, &record.to_json()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn null_fields_survive_the_round_trip() {
        let ty = person(&address());
        let record = Record::new(&ty);
        let decoded = Record::from_json(&ty, &record.to_json()).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.get(&ty.field("height").unwrap()).is_null());
    }

    #[test]
    fn missing_json_keys_read_as_null() {
        let ty = address();
        let decoded = Record::from_json(&ty, r#"{"city":"Rome"}"#).unwrap();
        assert_eq!(decoded.text(&ty.field("city").unwrap()), Some("Rome"));
        assert!(decoded.get(&ty.field("zip").unwrap()).is_null());
    }

    #[test]
    fn malformed_json_is_a_schema_mismatch() {
        let ty = address();
        assert!(matches!(
            Record::from_json(&ty, "not json"),
            Err(SqlError::SchemaMismatch { .. })
        ));
        assert!(matches!(
            Record::from_json(&ty, r#"{"zip":"not a number"}"#),
            Err(SqlError::SchemaMismatch { .. })
        ));
    }
}
