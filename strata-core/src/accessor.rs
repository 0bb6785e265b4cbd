use crate::{Cursor, Field, Record, Result, SqlError, Statement, Value, ValueKind};
use std::{
    cell::{Cell, RefCell},
    fmt::{self, Debug, Formatter},
    rc::Rc,
};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// A caller-supplied dynamic value source, read at bind time. The same
/// request can be run repeatedly with different values by mutating the
/// source between runs.
pub trait ValueSource {
    fn value(&self) -> Value;
}

impl<F: Fn() -> Value> ValueSource for F {
    fn value(&self) -> Value {
        self()
    }
}

/// A shared mutable cell implementing [`ValueSource`], the common way to feed
/// a sequence of runs of one prepared request.
#[derive(Clone)]
pub struct SharedValue(Rc<RefCell<Value>>);

impl SharedValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(Rc::new(RefCell::new(value.into())))
    }

    pub fn set(&self, value: impl Into<Value>) {
        *self.0.borrow_mut() = value.into();
    }
}

impl ValueSource for SharedValue {
    fn value(&self) -> Value {
        self.0.borrow().clone()
    }
}

/// A staged parameter: either a fixed value or a dynamic source.
#[derive(Clone)]
pub enum ParamSource {
    Value(Value),
    Source(Rc<dyn ValueSource>),
}

impl ParamSource {
    pub fn current(&self) -> Value {
        match self {
            ParamSource::Value(v) => v.clone(),
            ParamSource::Source(s) => s.value(),
        }
    }
}

impl Debug for ParamSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ParamSource::Value(v) => write!(f, "{:?}", v),
            ParamSource::Source(..) => f.write_str("<source>"),
        }
    }
}

/// How a reader resolves its result column.
///
/// Statically projected queries start `Bound`. Queries compiled from free-form
/// SQL start `Unbound` and transition exactly once after the first execution:
/// to `Bound` when the result metadata carries a matching column, to `Absent`
/// otherwise (such readers yield null).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnBinding {
    Unbound,
    Bound(usize),
    Absent,
}

/// The resource scope shared by one prepared statement, its open cursor and
/// the readers bound to it. Closing releases statement and cursor; every exit
/// path of a query funnels here.
pub(crate) struct QueryShared {
    pub sql: String,
    pub statement: RefCell<Option<Box<dyn Statement>>>,
    pub cursor: RefCell<Option<Box<dyn Cursor>>>,
    pub auto_close: bool,
    pub closed: Cell<bool>,
}

impl QueryShared {
    pub fn new(sql: String, auto_close: bool) -> Self {
        Self {
            sql,
            statement: RefCell::new(None),
            cursor: RefCell::new(None),
            auto_close,
            closed: Cell::new(false),
        }
    }

    pub fn ensure_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(SqlError::StatementClosed {
                sql: self.sql.clone(),
            });
        }
        Ok(())
    }

    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        self.cursor.borrow_mut().take();
        if let Some(mut statement) = self.statement.borrow_mut().take() {
            if let Err(e) = statement.close() {
                log::error!("closing prepared statement failed: {}", e);
            }
        }
    }
}

struct ReaderState {
    binding: ColumnBinding,
    cached_row: Option<u64>,
    cached: Value,
}

struct ReaderInner {
    field: Field,
    /// Decode kind; differs from the field's kind for aggregates (COUNT over
    /// any field decodes as a long).
    kind: ValueKind,
    shared: Rc<QueryShared>,
    state: RefCell<ReaderState>,
}

/// Typed reader over one column of a live result cursor.
///
/// Reads are cached per row: the decoded value (nullness included) is keyed by
/// the cursor's current row id, so reading the same field twice within a row
/// decodes once and never re-touches the cursor.
#[derive(Clone)]
pub struct ColumnReader {
    inner: Rc<ReaderInner>,
}

impl ColumnReader {
    pub(crate) fn new(field: Field, shared: Rc<QueryShared>, binding: ColumnBinding) -> Self {
        let kind = field.kind();
        Self::with_kind(field, kind, shared, binding)
    }

    pub(crate) fn with_kind(
        field: Field,
        kind: ValueKind,
        shared: Rc<QueryShared>,
        binding: ColumnBinding,
    ) -> Self {
        Self {
            inner: Rc::new(ReaderInner {
                field,
                kind,
                shared,
                state: RefCell::new(ReaderState {
                    binding,
                    cached_row: None,
                    cached: Value::Null,
                }),
            }),
        }
    }

    pub fn field(&self) -> &Field {
        &self.inner.field
    }

    pub(crate) fn is_unbound(&self) -> bool {
        self.inner.state.borrow().binding == ColumnBinding::Unbound
    }

    /// Late-bind the result column index. Binding twice is a programming
    /// error.
    pub(crate) fn bind_column(&self, index: usize) -> Result<()> {
        let mut state = self.inner.state.borrow_mut();
        if let ColumnBinding::Bound(..) = state.binding {
            return Err(SqlError::mismatch(format!(
                "column for field {:?} bound twice",
                self.inner.field
            )));
        }
        state.binding = ColumnBinding::Bound(index);
        Ok(())
    }

    /// Mark the field as missing from the result; subsequent reads are null.
    pub(crate) fn mark_absent(&self) {
        self.inner.state.borrow_mut().binding = ColumnBinding::Absent;
    }

    /// Drop the cached row. Called when the query re-executes: row ids of the
    /// fresh cursor would otherwise collide with the previous cursor's.
    pub(crate) fn reset_cache(&self) {
        self.inner.state.borrow_mut().cached_row = None;
    }

    /// Current row's decoded value, from cache when the row was read before.
    pub fn value(&self) -> Result<Value> {
        let inner = &self.inner;
        let mut state = inner.state.borrow_mut();
        match state.binding {
            ColumnBinding::Unbound => Err(SqlError::mismatch(format!(
                "field {:?} read before its query was executed",
                inner.field
            ))),
            ColumnBinding::Absent => Ok(Value::null_of(inner.kind)),
            ColumnBinding::Bound(index) => {
                let mut cursor = inner.shared.cursor.borrow_mut();
                let cursor = cursor.as_mut().ok_or_else(|| {
                    SqlError::mismatch(format!(
                        "field {:?} read before its query was executed",
                        inner.field
                    ))
                })?;
                let row = cursor.row_id();
                if state.cached_row == Some(row) {
                    return Ok(state.cached.clone());
                }
                let value = decode(
                    cursor.as_mut(),
                    index,
                    &inner.field,
                    inner.kind,
                    &inner.shared.sql,
                )?;
                state.cached_row = Some(row);
                state.cached = value.clone();
                Ok(value)
            }
        }
    }

    pub fn is_null(&self) -> Result<bool> {
        Ok(self.value()?.is_null())
    }

    pub fn integer(&self) -> Result<Option<i32>> {
        match self.value()? {
            Value::Integer(v) => Ok(v),
            Value::Null => Ok(None),
            other => Err(self.kind_error(&other)),
        }
    }

    pub fn long_value(&self) -> Result<Option<i64>> {
        match self.value()? {
            Value::Long(v) => Ok(v),
            Value::Null => Ok(None),
            other => Err(self.kind_error(&other)),
        }
    }

    pub fn double_value(&self) -> Result<Option<f64>> {
        match self.value()? {
            Value::Double(v) => Ok(v),
            Value::Null => Ok(None),
            other => Err(self.kind_error(&other)),
        }
    }

    pub fn boolean(&self) -> Result<Option<bool>> {
        match self.value()? {
            Value::Boolean(v) => Ok(v),
            Value::Null => Ok(None),
            other => Err(self.kind_error(&other)),
        }
    }

    pub fn text(&self) -> Result<Option<String>> {
        match self.value()? {
            Value::Text(v) => Ok(v),
            Value::Null => Ok(None),
            other => Err(self.kind_error(&other)),
        }
    }

    pub fn bytes(&self) -> Result<Option<Box<[u8]>>> {
        match self.value()? {
            Value::Bytes(v) => Ok(v),
            Value::Null => Ok(None),
            other => Err(self.kind_error(&other)),
        }
    }

    pub fn date(&self) -> Result<Option<Date>> {
        match self.value()? {
            Value::Date(v) => Ok(v),
            Value::Null => Ok(None),
            other => Err(self.kind_error(&other)),
        }
    }

    pub fn date_time(&self) -> Result<Option<OffsetDateTime>> {
        match self.value()? {
            Value::DateTime(v) => Ok(v),
            Value::Null => Ok(None),
            other => Err(self.kind_error(&other)),
        }
    }

    pub fn timestamp(&self) -> Result<Option<PrimitiveDateTime>> {
        match self.value()? {
            Value::Timestamp(v) => Ok(v),
            Value::Null => Ok(None),
            other => Err(self.kind_error(&other)),
        }
    }

    pub fn record(&self) -> Result<Option<Record>> {
        match self.value()? {
            Value::Record(v) => Ok(v.map(|r| *r)),
            Value::Null => Ok(None),
            other => Err(self.kind_error(&other)),
        }
    }

    fn kind_error(&self, value: &Value) -> SqlError {
        SqlError::mismatch(format!(
            "field {:?} decoded as {:?}, not as {:?}",
            self.inner.field,
            value.kind(),
            self.inner.kind
        ))
    }
}

/// Decode the cursor's current value at `index` according to the semantic
/// kind. JSON-backed kinds (arrays, nested records) read the text column and
/// parse it.
fn decode(
    cursor: &mut dyn Cursor,
    index: usize,
    field: &Field,
    kind: ValueKind,
    sql: &str,
) -> Result<Value> {
    let execute = |e| SqlError::Execute {
        debug_sql: sql.to_owned(),
        source: e,
    };
    Ok(match kind {
        ValueKind::Integer => Value::Integer(cursor.get_i32(index).map_err(execute)?),
        ValueKind::Long => Value::Long(cursor.get_i64(index).map_err(execute)?),
        ValueKind::Double => Value::Double(cursor.get_f64(index).map_err(execute)?),
        ValueKind::Boolean => Value::Boolean(cursor.get_bool(index).map_err(execute)?),
        ValueKind::Text => Value::Text(cursor.get_text(index).map_err(execute)?),
        ValueKind::Bytes => Value::Bytes(
            cursor
                .get_bytes(index)
                .map_err(execute)?
                .map(Vec::into_boxed_slice),
        ),
        ValueKind::Date => Value::Date(cursor.get_date(index).map_err(execute)?),
        ValueKind::DateTime => Value::DateTime(cursor.get_date_time(index).map_err(execute)?),
        ValueKind::Timestamp => Value::Timestamp(cursor.get_timestamp(index).map_err(execute)?),
        ValueKind::TextArray | ValueKind::LongArray | ValueKind::Record | ValueKind::RecordArray => {
            match cursor.get_text(index).map_err(execute)? {
                None => Value::null_of(kind),
                Some(text) => decode_json(field, &text)?,
            }
        }
    })
}

fn decode_json(field: &Field, text: &str) -> Result<Value> {
    let parse = |detail: String| SqlError::mismatch(detail);
    match field.kind() {
        ValueKind::TextArray => serde_json::from_str::<Vec<String>>(text)
            .map(|v| Value::TextArray(Some(v)))
            .map_err(|e| parse(format!("field {:?}: invalid JSON array: {}", field, e))),
        ValueKind::LongArray => serde_json::from_str::<Vec<i64>>(text)
            .map(|v| Value::LongArray(Some(v)))
            .map_err(|e| parse(format!("field {:?}: invalid JSON array: {}", field, e))),
        ValueKind::Record => {
            let target = field
                .target_type()
                .ok_or_else(|| parse(format!("field {:?} has no target type", field)))?;
            Ok(Value::Record(Some(Box::new(Record::from_json(
                target, text,
            )?))))
        }
        ValueKind::RecordArray => {
            let target = field
                .target_type()
                .ok_or_else(|| parse(format!("field {:?} has no target type", field)))?;
            let items: Vec<serde_json::Value> = serde_json::from_str(text)
                .map_err(|e| parse(format!("field {:?}: invalid JSON array: {}", field, e)))?;
            let mut records = Vec::with_capacity(items.len());
            for item in &items {
                records.push(Record::from_json(target, &item.to_string())?);
            }
            Ok(Value::RecordArray(Some(records)))
        }
        _ => unreachable!("decode_json is only called for JSON-backed kinds"),
    }
}
