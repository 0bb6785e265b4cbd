use crate::Value;
use thiserror::Error;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Error produced by a driver implementation. The only error type that
/// crosses the driver boundary; the core wraps it into [`crate::SqlError`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DriverError {
    /// Engine-specific error number, when the driver exposes one.
    pub code: Option<i32>,
    /// SQLSTATE, when the driver exposes one.
    pub state: Option<String>,
    pub message: String,
}

impl DriverError {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            state: None,
            message: message.into(),
        }
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Driver-level column type code, the reverse-mapping input of
/// [`crate::record_type_from_columns`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    Char,
    Varchar,
    LongVarchar,
    Decimal,
    Numeric,
    Float,
    Double,
    Bit,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Binary,
    VarBinary,
    LongVarBinary,
    Blob,
    Date,
    Timestamp,
    /// Anything the driver reports that the core does not map. Introspection
    /// fails hard on these.
    Other(i32),
}

/// Column description exposed by a live cursor.
#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub label: String,
    pub type_code: TypeCode,
    /// For character types the maximum length, for numeric types the digit
    /// count. `None` when the driver reports the column as unbounded.
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
}

/// Entry point of a database driver. Shared process-wide through the
/// [`crate::DriverRegistry`], hence `Send + Sync`; the connections it hands
/// out are single-threaded.
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;
    fn connect(&self, url: &str) -> DriverResult<Box<dyn DriverConnection>>;
}

/// A live connection. One in-flight statement at a time, blocking calls.
pub trait DriverConnection {
    fn prepare(&mut self, sql: &str, want_generated_keys: bool) -> DriverResult<Box<dyn Statement>>;
    fn commit(&mut self) -> DriverResult<()>;
    fn rollback(&mut self) -> DriverResult<()>;
    /// Names of the tables visible to this connection, for existence checks.
    fn table_names(&mut self) -> DriverResult<Vec<String>>;
    fn close(&mut self) -> DriverResult<()>;
}

/// A prepared statement. Parameter indexes are 0-based and follow the `?`
/// placeholder order of the SQL text.
pub trait Statement {
    fn bind(&mut self, index: usize, value: &Value) -> DriverResult<()>;
    fn execute_query(&mut self) -> DriverResult<Box<dyn Cursor>>;
    fn execute_update(&mut self) -> DriverResult<u64>;
    /// First generated-key cursor of the last execution, when the statement
    /// was prepared with `want_generated_keys` and the engine produced one.
    fn generated_keys(&mut self) -> DriverResult<Option<Box<dyn Cursor>>>;
    fn close(&mut self) -> DriverResult<()>;
}

/// Forward-only, single-pass result cursor. Column indexes are 0-based.
///
/// `row_id` must change on every `advance`; the accessor layer uses it as the
/// key of its per-row decode cache.
pub trait Cursor {
    fn advance(&mut self) -> DriverResult<bool>;
    fn row_id(&self) -> u64;
    fn columns(&self) -> &[ColumnMeta];
    fn is_null(&mut self, index: usize) -> DriverResult<bool>;
    fn get_i32(&mut self, index: usize) -> DriverResult<Option<i32>>;
    fn get_i64(&mut self, index: usize) -> DriverResult<Option<i64>>;
    fn get_f64(&mut self, index: usize) -> DriverResult<Option<f64>>;
    fn get_bool(&mut self, index: usize) -> DriverResult<Option<bool>>;
    fn get_text(&mut self, index: usize) -> DriverResult<Option<String>>;
    fn get_bytes(&mut self, index: usize) -> DriverResult<Option<Vec<u8>>>;
    fn get_date(&mut self, index: usize) -> DriverResult<Option<Date>>;
    fn get_date_time(&mut self, index: usize) -> DriverResult<Option<OffsetDateTime>>;
    fn get_timestamp(&mut self, index: usize) -> DriverResult<Option<PrimitiveDateTime>>;
}
