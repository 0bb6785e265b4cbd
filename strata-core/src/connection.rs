use crate::{
    Constraint, CreateBuilder, DeleteRequest, Dialect, DriverConnection, QueryBuilder, Record,
    RecordType, Result, SelectQuery, SqlError, SqlRequest, TypeExtractor, UpdateBuilder,
    ddl::{render_add_column, render_create_table},
    introspect::record_type_from_columns,
    schema::Field,
};
use std::{cell::Cell, cell::RefCell, rc::Rc, sync::Arc, time::Instant};

/// A live connection: hands out statement builders, carries the DDL surface
/// and owns the commit/rollback/close lifecycle.
///
/// Transactions are explicit. A statement failure inside a transaction does
/// not auto-rollback; the caller decides between [`SqlConnection::commit`]
/// and [`SqlConnection::rollback_and_close`].
pub struct SqlConnection {
    conn: Rc<RefCell<Box<dyn DriverConnection>>>,
    dialect: Arc<dyn Dialect>,
    auto_commit: bool,
    closed: Cell<bool>,
}

impl SqlConnection {
    pub(crate) fn new(
        conn: Box<dyn DriverConnection>,
        dialect: Arc<dyn Dialect>,
        auto_commit: bool,
    ) -> Self {
        Self {
            conn: Rc::new(RefCell::new(conn)),
            dialect,
            auto_commit,
            closed: Cell::new(false),
        }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(SqlError::StatementClosed {
                sql: "<connection closed>".to_owned(),
            });
        }
        Ok(())
    }

    pub fn query_builder(&self, ty: &RecordType) -> QueryBuilder {
        QueryBuilder::new(self.conn.clone(), self.dialect.clone(), ty.clone(), None)
    }

    pub fn query_builder_where(&self, ty: &RecordType, constraint: Constraint) -> QueryBuilder {
        QueryBuilder::new(
            self.conn.clone(),
            self.dialect.clone(),
            ty.clone(),
            Some(constraint),
        )
    }

    /// Compile a query from free-form SQL; column-to-field binding resolves
    /// against `ty` from the result metadata on first execution.
    pub fn query_sql(&self, sql: &str, ty: &RecordType) -> Result<SelectQuery> {
        self.check_open()?;
        SelectQuery::from_sql(self.conn.clone(), self.dialect.clone(), sql, ty)
    }

    pub fn create_builder(&self, ty: &RecordType) -> CreateBuilder {
        CreateBuilder::new(self.conn.clone(), self.dialect.clone(), ty.clone())
    }

    pub fn update_builder(&self, ty: &RecordType, constraint: Option<Constraint>) -> UpdateBuilder {
        UpdateBuilder::new(self.conn.clone(), self.dialect.clone(), ty.clone(), constraint)
    }

    pub fn delete_request(
        &self,
        ty: &RecordType,
        constraint: Option<Constraint>,
    ) -> Result<DeleteRequest> {
        self.check_open()?;
        DeleteRequest::new(&self.conn, self.dialect.clone(), ty, constraint)
    }

    /// Insert a batch of records, one request per record type ordering.
    pub fn populate<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> Result<u64> {
        self.check_open()?;
        let mut affected = 0;
        for record in records {
            let mut builder = self.create_builder(record.record_type());
            builder.set_record(record);
            let mut request = builder.build()?;
            affected += request.run()?;
            request.close()?;
        }
        Ok(affected)
    }

    pub fn create_table(&self, ty: &RecordType) -> Result<()> {
        self.check_open()?;
        let sql = render_create_table(self.dialect.as_ref(), ty);
        log::info!("creating table: {}", sql);
        self.execute_ddl(&sql)?;
        Ok(())
    }

    /// Add columns to an existing table. Safe to call for columns that may
    /// already exist in intent, but a duplicate-column error from the engine
    /// is reported, not swallowed.
    pub fn add_column(&self, fields: &[Field]) -> Result<()> {
        self.check_open()?;
        for field in fields {
            let sql = render_add_column(self.dialect.as_ref(), field.record_type(), field);
            log::info!("adding column: {}", sql);
            self.execute_ddl(&sql)?;
        }
        Ok(())
    }

    /// Delete every row, keeping the table.
    pub fn empty_table(&self, ty: &RecordType) -> Result<u64> {
        self.check_open()?;
        let mut request = self.delete_request(ty, None)?;
        let affected = request.run()?;
        request.close()?;
        Ok(affected)
    }

    pub fn table_exists(&self, ty: &RecordType) -> Result<bool> {
        self.check_open()?;
        let expected = self.dialect.table_name(ty, true);
        let names = self
            .conn
            .borrow_mut()
            .table_names()
            .map_err(|e| SqlError::Execute {
                debug_sql: "<table metadata>".to_owned(),
                source: e,
            })?;
        Ok(names.iter().any(|name| name.eq_ignore_ascii_case(&expected)))
    }

    /// Introspect an existing table.
    pub fn extract_type(&self, table: impl Into<String>) -> TypeExtractor {
        TypeExtractor::new(self.conn.clone(), self.dialect.clone(), table)
    }

    /// Introspect the result shape of a free-form query.
    pub fn extract_from_query(&self, sql: &str) -> Result<RecordType> {
        self.check_open()?;
        let mut statement =
            self.conn
                .borrow_mut()
                .prepare(sql, false)
                .map_err(|e| SqlError::Prepare {
                    sql: sql.to_owned(),
                    source: e,
                })?;
        let result = statement
            .execute_query()
            .map_err(|e| SqlError::Execute {
                debug_sql: sql.to_owned(),
                source: e,
            })
            .and_then(|cursor| record_type_from_columns("result", cursor.columns()));
        if let Err(e) = statement.close() {
            log::error!("closing introspection statement failed: {}", e);
        }
        result
    }

    pub fn commit(&self) -> Result<()> {
        self.check_open()?;
        self.conn
            .borrow_mut()
            .commit()
            .map_err(|e| SqlError::Commit { source: e })
    }

    pub fn commit_and_close(&self) -> Result<()> {
        let result = self.commit();
        self.close();
        result
    }

    /// Roll the transaction back and close. A failed rollback is its own
    /// error class: the connection's consistency state is unknown after it.
    pub fn rollback_and_close(&self) -> Result<()> {
        self.check_open()?;
        let result = self
            .conn
            .borrow_mut()
            .rollback()
            .map_err(|e| SqlError::Rollback { source: e });
        self.close();
        result
    }

    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        if let Err(e) = self.conn.borrow_mut().close() {
            log::error!("closing connection failed: {}", e);
        }
    }

    fn execute_ddl(&self, sql: &str) -> Result<u64> {
        let started = Instant::now();
        let mut statement =
            self.conn
                .borrow_mut()
                .prepare(sql, false)
                .map_err(|e| SqlError::Prepare {
                    sql: sql.to_owned(),
                    source: e,
                })?;
        let result = statement.execute_update().map_err(|e| SqlError::Execute {
            debug_sql: sql.to_owned(),
            source: e,
        });
        // Release before propagating so a failed statement cannot leak.
        if let Err(e) = statement.close() {
            log::error!("closing DDL statement failed: {}", e);
        }
        log::debug!("`{}` took {:?}", sql, started.elapsed());
        result
    }
}
