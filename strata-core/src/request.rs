use crate::Result;

/// A one-shot mutation handle owning exactly one prepared statement.
///
/// Requests must be explicitly closed; `run` after `close` is a
/// [`crate::SqlError::StatementClosed`] error.
pub trait SqlRequest {
    /// Execute, returning the number of affected rows.
    fn run(&mut self) -> Result<u64>;
    fn close(&mut self) -> Result<()>;
}

/// A mutation handle for batched writes: repeated `run` calls with an
/// explicit flush point. Drivers that execute eagerly implement `flush` as a
/// no-op.
pub trait BulkRequest: SqlRequest {
    fn flush(&mut self) -> Result<()>;
}

/// The defined outcome of a mutation with nothing staged: affects zero rows
/// and never issues SQL.
pub struct NoopRequest;

impl SqlRequest for NoopRequest {
    fn run(&mut self) -> Result<u64> {
        Ok(0)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl BulkRequest for NoopRequest {
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Adapter turning any request into a [`BulkRequest`] with an immediate
/// (no-op) flush.
pub struct EagerBulk<R: SqlRequest>(pub R);

impl<R: SqlRequest> SqlRequest for EagerBulk<R> {
    fn run(&mut self) -> Result<u64> {
        self.0.run()
    }

    fn close(&mut self) -> Result<()> {
        self.0.close()
    }
}

impl<R: SqlRequest> BulkRequest for EagerBulk<R> {
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
