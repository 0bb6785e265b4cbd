use crate::DriverError;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Which database constraint an execution tripped over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Unique,
    ForeignKey,
}

impl Display for ViolationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViolationKind::Unique => "unique",
            ViolationKind::ForeignKey => "foreign key",
        })
    }
}

/// Everything this crate can fail with.
///
/// Raw [`DriverError`]s never escape on their own: every boundary wraps them
/// with the SQL text (debug-rendered where parameter values are known) or the
/// identifier that was being processed.
#[derive(Debug, Error)]
pub enum SqlError {
    /// The driver rejected the statement at prepare time.
    #[error("failed to prepare statement: {sql}")]
    Prepare {
        sql: String,
        #[source]
        source: DriverError,
    },

    /// The driver failed during bind or execute. `debug_sql` carries the
    /// statement with current parameter values substituted as literals.
    #[error("execution failed for: {debug_sql}")]
    Execute {
        debug_sql: String,
        #[source]
        source: DriverError,
    },

    /// An execution failure the dialect recognized as a constraint violation.
    #[error("{kind} constraint violated by: {debug_sql}")]
    ConstraintViolation {
        kind: ViolationKind,
        debug_sql: String,
        #[source]
        source: DriverError,
    },

    #[error("commit failed")]
    Commit {
        #[source]
        source: DriverError,
    },

    /// Reported distinctly: after a failed rollback the connection's
    /// consistency state is unknown.
    #[error("rollback failed, connection state is unknown")]
    Rollback {
        #[source]
        source: DriverError,
    },

    #[error("could not connect to {url}")]
    Connect {
        url: String,
        #[source]
        source: DriverError,
    },

    /// Introspection met a driver type code with no mapping. Fatal, unlike a
    /// missing result column which is logged and read as null.
    #[error("column {column} has unsupported driver type code {code}")]
    UnsupportedColumnType { column: String, code: i32 },

    /// Programming errors around the schema: reading an accessor before its
    /// column was bound, binding a column twice, referencing a foreign field.
    #[error("schema mismatch: {detail}")]
    SchemaMismatch { detail: String },

    /// The request or query was already closed when `run` was called.
    #[error("statement already closed: {sql}")]
    StatementClosed { sql: String },
}

impl SqlError {
    pub(crate) fn mismatch(detail: impl Into<String>) -> Self {
        SqlError::SchemaMismatch {
            detail: detail.into(),
        }
    }
}
