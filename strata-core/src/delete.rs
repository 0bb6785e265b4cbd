use crate::{
    Constraint, Dialect, DriverConnection, DriverResult, RecordType, Result, SqlError, SqlRequest,
    compiler,
    dialect::wrap_execute,
};
use std::{cell::RefCell, rc::Rc, sync::Arc};

/// One prepared `DELETE FROM … [WHERE …]` statement. Without a constraint it
/// empties the table (the table itself is kept).
pub struct DeleteRequest {
    statement: Option<Box<dyn crate::Statement>>,
    sql: String,
    dialect: Arc<dyn Dialect>,
    ty: RecordType,
    constraint: Option<Constraint>,
}

impl DeleteRequest {
    pub(crate) fn new(
        conn: &Rc<RefCell<Box<dyn DriverConnection>>>,
        dialect: Arc<dyn Dialect>,
        ty: &RecordType,
        constraint: Option<Constraint>,
    ) -> Result<Self> {
        let sql = render_delete(dialect.as_ref(), ty, constraint.as_ref(), false);
        let statement = conn
            .borrow_mut()
            .prepare(&sql, false)
            .map_err(|e| SqlError::Prepare {
                sql: sql.clone(),
                source: e,
            })?;
        Ok(Self {
            statement: Some(statement),
            sql,
            dialect,
            ty: ty.clone(),
            constraint,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    fn debug_sql(&self) -> String {
        render_delete(
            self.dialect.as_ref(),
            &self.ty,
            self.constraint.as_ref(),
            true,
        )
    }
}

impl SqlRequest for DeleteRequest {
    fn run(&mut self) -> Result<u64> {
        let Some(statement) = self.statement.as_mut() else {
            return Err(SqlError::StatementClosed {
                sql: self.sql.clone(),
            });
        };
        let constraint = self.constraint.as_ref();
        let dialect = self.dialect.as_ref();
        let outcome: DriverResult<u64> = (|| {
            if let Some(constraint) = constraint {
                let mut index = 0;
                compiler::bind(constraint, dialect, statement.as_mut(), &mut index)?;
            }
            statement.execute_update()
        })();
        outcome.map_err(|e| {
            let debug_sql = self.debug_sql();
            log::error!("delete failed: {}", debug_sql);
            wrap_execute(self.dialect.as_ref(), debug_sql, e)
        })
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut statement) = self.statement.take() {
            statement.close().map_err(|e| SqlError::Execute {
                debug_sql: self.sql.clone(),
                source: e,
            })?;
        }
        Ok(())
    }
}

impl Drop for DeleteRequest {
    fn drop(&mut self) {
        if let Some(mut statement) = self.statement.take() {
            if let Err(e) = statement.close() {
                log::error!("closing delete statement failed: {}", e);
            }
        }
    }
}

fn render_delete(
    dialect: &dyn Dialect,
    ty: &RecordType,
    constraint: Option<&Constraint>,
    debug: bool,
) -> String {
    let mut out = String::with_capacity(32);
    out.push_str("DELETE FROM ");
    out.push_str(&dialect.table_name(ty, true));
    if let Some(constraint) = constraint {
        out.push_str(" WHERE ");
        if debug {
            compiler::render_debug(constraint, dialect, &mut out);
        } else {
            let mut tables = Vec::new();
            compiler::render(constraint, dialect, &mut tables, &mut out);
        }
    }
    out
}
