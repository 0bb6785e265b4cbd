use crate::{Value, ValueKind};
use std::{
    fmt::{self, Debug, Formatter},
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Which temporal column a long field maps to when it carries a date
/// annotation. Plain longs stay BIGINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Date,
    /// Timestamp with timezone.
    DateTime,
    /// Timestamp without timezone.
    Timestamp,
}

#[derive(Debug)]
pub(crate) struct FieldDef {
    pub name: String,
    pub column_name: Option<String>,
    pub kind: ValueKind,
    /// Target type of nested-record fields.
    pub target: Option<RecordType>,
    pub nullable: bool,
    pub is_key: bool,
    pub auto_increment: bool,
    pub max_size: Option<u32>,
    pub min_size: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub date_kind: Option<DateKind>,
}

struct TypeInner {
    name: String,
    table_name: Option<String>,
    fields: Vec<FieldDef>,
}

/// An immutable named schema: an ordered set of fields, optionally with a
/// (possibly composite) key. Cheap to clone; identity is pointer identity, so
/// two separately built types never compare equal even with identical fields.
#[derive(Clone)]
pub struct RecordType {
    inner: Arc<TypeInner>,
}

impl RecordType {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Explicit physical table name, bypassing the naming mapping.
    pub fn table_override(&self) -> Option<&str> {
        self.inner.table_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.inner.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<Field> {
        self.inner
            .fields
            .iter()
            .position(|f| f.name == name)
            .map(|index| Field {
                owner: self.clone(),
                index,
            })
    }

    pub fn field_at(&self, index: usize) -> Option<Field> {
        (index < self.inner.fields.len()).then(|| Field {
            owner: self.clone(),
            index,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        (0..self.inner.fields.len()).map(|index| Field {
            owner: self.clone(),
            index,
        })
    }

    pub fn key_fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields().filter(Field::is_key)
    }

    pub(crate) fn def(&self, index: usize) -> &FieldDef {
        &self.inner.fields[index]
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for RecordType {}

impl Hash for RecordType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl Debug for RecordType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.inner.name)
            .field("fields", &self.inner.fields)
            .finish()
    }
}

/// A typed, named column descriptor belonging to exactly one record type.
/// A cheap handle: owning type plus position.
#[derive(Clone)]
pub struct Field {
    owner: RecordType,
    index: usize,
}

impl Field {
    pub fn record_type(&self) -> &RecordType {
        &self.owner
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.owner.def(self.index).name
    }

    /// Explicit physical column name, bypassing the naming mapping.
    pub fn column_override(&self) -> Option<&str> {
        self.owner.def(self.index).column_name.as_deref()
    }

    pub fn kind(&self) -> ValueKind {
        self.owner.def(self.index).kind
    }

    /// Target type of a nested-record field.
    pub fn target_type(&self) -> Option<&RecordType> {
        self.owner.def(self.index).target.as_ref()
    }

    pub fn nullable(&self) -> bool {
        self.owner.def(self.index).nullable
    }

    pub fn is_key(&self) -> bool {
        self.owner.def(self.index).is_key
    }

    pub fn auto_increment(&self) -> bool {
        self.owner.def(self.index).auto_increment
    }

    pub fn max_size(&self) -> Option<u32> {
        self.owner.def(self.index).max_size
    }

    pub fn min_size(&self) -> Option<u32> {
        self.owner.def(self.index).min_size
    }

    pub fn precision(&self) -> Option<u32> {
        self.owner.def(self.index).precision
    }

    pub fn scale(&self) -> Option<u32> {
        self.owner.def(self.index).scale
    }

    pub fn date_kind(&self) -> Option<DateKind> {
        self.owner.def(self.index).date_kind
    }

    /// A typed null matching this field.
    pub fn null_value(&self) -> Value {
        Value::null_of(self.kind())
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.index == other.index
    }
}

impl Eq for Field {}

impl Hash for Field {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.index.hash(state);
    }
}

impl Debug for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner.name(), self.name())
    }
}

/// Assembles a [`RecordType`] from ordinary data at setup time.
///
/// ```
/// # use strata_core::RecordTypeBuilder;
/// let mut builder = RecordTypeBuilder::new("movie");
/// builder.long("id").key().auto_increment();
/// builder.text("title").max_size(255);
/// builder.double("rating").nullable();
/// let movie = builder.build();
/// ```
pub struct RecordTypeBuilder {
    name: String,
    table_name: Option<String>,
    fields: Vec<FieldDef>,
}

impl RecordTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            fields: Vec::new(),
        }
    }

    /// Override the physical table name.
    pub fn table_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.table_name = Some(name.into());
        self
    }

    fn push(&mut self, name: &str, kind: ValueKind, target: Option<RecordType>) -> FieldOptions<'_> {
        assert!(
            self.fields.iter().all(|f| f.name != name),
            "duplicate field `{}` in record type `{}`",
            name,
            self.name
        );
        self.fields.push(FieldDef {
            name: name.to_owned(),
            column_name: None,
            kind,
            target,
            nullable: false,
            is_key: false,
            auto_increment: false,
            max_size: None,
            min_size: None,
            precision: None,
            scale: None,
            date_kind: None,
        });
        FieldOptions {
            def: self.fields.last_mut().unwrap(),
        }
    }

    pub fn integer(&mut self, name: &str) -> FieldOptions<'_> {
        self.push(name, ValueKind::Integer, None)
    }

    pub fn long(&mut self, name: &str) -> FieldOptions<'_> {
        self.push(name, ValueKind::Long, None)
    }

    pub fn double(&mut self, name: &str) -> FieldOptions<'_> {
        self.push(name, ValueKind::Double, None)
    }

    pub fn boolean(&mut self, name: &str) -> FieldOptions<'_> {
        self.push(name, ValueKind::Boolean, None)
    }

    pub fn text(&mut self, name: &str) -> FieldOptions<'_> {
        self.push(name, ValueKind::Text, None)
    }

    pub fn bytes(&mut self, name: &str) -> FieldOptions<'_> {
        self.push(name, ValueKind::Bytes, None)
    }

    pub fn date(&mut self, name: &str) -> FieldOptions<'_> {
        self.push(name, ValueKind::Date, None)
    }

    pub fn date_time(&mut self, name: &str) -> FieldOptions<'_> {
        self.push(name, ValueKind::DateTime, None)
    }

    pub fn timestamp(&mut self, name: &str) -> FieldOptions<'_> {
        self.push(name, ValueKind::Timestamp, None)
    }

    pub fn text_array(&mut self, name: &str) -> FieldOptions<'_> {
        self.push(name, ValueKind::TextArray, None)
    }

    pub fn long_array(&mut self, name: &str) -> FieldOptions<'_> {
        self.push(name, ValueKind::LongArray, None)
    }

    pub fn record(&mut self, name: &str, target: &RecordType) -> FieldOptions<'_> {
        self.push(name, ValueKind::Record, Some(target.clone()))
    }

    pub fn record_array(&mut self, name: &str, target: &RecordType) -> FieldOptions<'_> {
        self.push(name, ValueKind::RecordArray, Some(target.clone()))
    }

    pub fn build(self) -> RecordType {
        RecordType {
            inner: Arc::new(TypeInner {
                name: self.name,
                table_name: self.table_name,
                fields: self.fields,
            }),
        }
    }
}

/// Per-field knobs, chained off the declaration call.
pub struct FieldOptions<'a> {
    def: &'a mut FieldDef,
}

impl FieldOptions<'_> {
    pub fn nullable(self) -> Self {
        self.def.nullable = true;
        self
    }

    pub fn key(self) -> Self {
        self.def.is_key = true;
        self
    }

    pub fn auto_increment(self) -> Self {
        self.def.auto_increment = true;
        self
    }

    pub fn max_size(self, size: u32) -> Self {
        self.def.max_size = Some(size);
        self
    }

    pub fn min_size(self, size: u32) -> Self {
        self.def.min_size = Some(size);
        self
    }

    pub fn precision(self, precision: u32) -> Self {
        self.def.precision = Some(precision);
        self
    }

    pub fn scale(self, scale: u32) -> Self {
        self.def.scale = Some(scale);
        self
    }

    /// Override the physical column name.
    pub fn column_name(self, name: impl Into<String>) -> Self {
        self.def.column_name = Some(name.into());
        self
    }

    pub fn date_kind(self, kind: DateKind) -> Self {
        self.def.date_kind = Some(kind);
        self
    }
}
