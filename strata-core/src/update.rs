use crate::{
    BulkRequest, Constraint, Dialect, DriverConnection, DriverResult, EagerBulk, Field,
    NoopRequest, ParamSource, RecordType, Result, SqlError, SqlRequest, Value, ValueSource,
    compiler,
    dialect::wrap_execute,
    util::separated_by,
};
use std::{cell::RefCell, rc::Rc, sync::Arc};

/// Stages field updates for an `UPDATE … SET … [WHERE …]` statement.
///
/// Staging is drained by [`UpdateBuilder::build`], so the same builder emits a
/// sequence of independent requests against the same constraint. With nothing
/// staged, `build` returns a defined no-op request: zero rows affected, no SQL
/// issued (an empty `SET` list would not even parse).
pub struct UpdateBuilder {
    conn: Rc<RefCell<Box<dyn DriverConnection>>>,
    dialect: Arc<dyn Dialect>,
    ty: RecordType,
    constraint: Option<Constraint>,
    staged: Vec<(Field, ParamSource)>,
}

impl UpdateBuilder {
    pub(crate) fn new(
        conn: Rc<RefCell<Box<dyn DriverConnection>>>,
        dialect: Arc<dyn Dialect>,
        ty: RecordType,
        constraint: Option<Constraint>,
    ) -> Self {
        Self {
            conn,
            dialect,
            ty,
            constraint,
            staged: Vec::new(),
        }
    }

    fn stage(&mut self, field: &Field, source: ParamSource) -> &mut Self {
        assert!(
            field.record_type() == &self.ty,
            "field {:?} does not belong to record type `{}`",
            field,
            self.ty.name()
        );
        match self.staged.iter_mut().find(|(f, ..)| f == field) {
            Some((.., slot)) => *slot = source,
            None => self.staged.push((field.clone(), source)),
        }
        self
    }

    pub fn update(&mut self, field: &Field, value: impl Into<Value>) -> &mut Self {
        self.stage(field, ParamSource::Value(value.into()))
    }

    pub fn update_source(&mut self, field: &Field, source: Rc<dyn ValueSource>) -> &mut Self {
        self.stage(field, ParamSource::Source(source))
    }

    /// Prepare the statement and drain the staged fields into a request.
    pub fn build(&mut self) -> Result<Box<dyn SqlRequest>> {
        let sets = std::mem::take(&mut self.staged);
        if sets.is_empty() {
            return Ok(Box::new(NoopRequest));
        }
        let sql = render_update(
            self.dialect.as_ref(),
            &self.ty,
            &sets,
            self.constraint.as_ref(),
            false,
        );
        let statement = self
            .conn
            .borrow_mut()
            .prepare(&sql, false)
            .map_err(|e| SqlError::Prepare {
                sql: sql.clone(),
                source: e,
            })?;
        Ok(Box::new(UpdateRequest {
            statement: Some(statement),
            sql,
            dialect: self.dialect.clone(),
            ty: self.ty.clone(),
            sets,
            constraint: self.constraint.clone(),
        }))
    }

    pub fn build_bulk(&mut self) -> Result<Box<dyn BulkRequest>> {
        if self.staged.is_empty() {
            return Ok(Box::new(NoopRequest));
        }
        Ok(Box::new(EagerBulk(BoxedRequest(self.build()?))))
    }
}

struct BoxedRequest(Box<dyn SqlRequest>);

impl SqlRequest for BoxedRequest {
    fn run(&mut self) -> Result<u64> {
        self.0.run()
    }

    fn close(&mut self) -> Result<()> {
        self.0.close()
    }
}

/// One prepared `UPDATE` statement. Binding order is the load-bearing
/// contract: SET parameters in staging order first, then the constraint's
/// parameters in compiler traversal order.
pub struct UpdateRequest {
    statement: Option<Box<dyn crate::Statement>>,
    sql: String,
    dialect: Arc<dyn Dialect>,
    ty: RecordType,
    sets: Vec<(Field, ParamSource)>,
    constraint: Option<Constraint>,
}

impl UpdateRequest {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    fn debug_sql(&self) -> String {
        render_update(
            self.dialect.as_ref(),
            &self.ty,
            &self.sets,
            self.constraint.as_ref(),
            true,
        )
    }
}

impl SqlRequest for UpdateRequest {
    fn run(&mut self) -> Result<u64> {
        let Some(statement) = self.statement.as_mut() else {
            return Err(SqlError::StatementClosed {
                sql: self.sql.clone(),
            });
        };
        let sets = &self.sets;
        let constraint = self.constraint.as_ref();
        let dialect = self.dialect.as_ref();
        let outcome: DriverResult<u64> = (|| {
            let mut index = 0;
            for (.., source) in sets {
                statement.bind(index, &source.current().driver_encoding())?;
                index += 1;
            }
            if let Some(constraint) = constraint {
                compiler::bind(constraint, dialect, statement.as_mut(), &mut index)?;
            }
            statement.execute_update()
        })();
        outcome.map_err(|e| {
            let debug_sql = self.debug_sql();
            log::error!("update failed: {}", debug_sql);
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

impl Drop for UpdateRequest {
    fn drop(&mut self) {
        if let Some(mut statement) = self.statement.take() {
            if let Err(e) = statement.close() {
                log::error!("closing update statement failed: {}", e);
            }
        }
    }
}

fn render_update(
    dialect: &dyn Dialect,
    ty: &RecordType,
    sets: &[(Field, ParamSource)],
    constraint: Option<&Constraint>,
    debug: bool,
) -> String {
    let mut out = String::with_capacity(64 + sets.len() * 16);
    out.push_str("UPDATE ");
    out.push_str(&dialect.table_name(ty, true));
    out.push_str(" SET ");
    separated_by(
        &mut out,
        sets,
        |out, (field, source)| {
            out.push_str(&dialect.column_name(field, true));
            out.push_str(" = ");
            if debug {
                dialect.write_value(out, &source.current());
            } else {
                out.push('?');
            }
        },
        ", ",
    );
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
