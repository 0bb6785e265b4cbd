use crate::{
    BulkRequest, Dialect, DriverConnection, DriverResult, EagerBulk, Field, ParamSource, Record,
    RecordType, Result, SqlError, SqlRequest, Value, ValueKind, ValueSource,
    dialect::wrap_execute,
    util::separated_by,
};
use std::{cell::RefCell, rc::Rc, sync::Arc};

/// Stages field values for an `INSERT INTO … VALUES (…)` statement.
///
/// Staging is drained by [`CreateBuilder::build`], so one builder can emit a
/// sequence of independent requests. The generated-key reader, once
/// requested, stays attached to every request the builder produces.
pub struct CreateBuilder {
    conn: Rc<RefCell<Box<dyn DriverConnection>>>,
    dialect: Arc<dyn Dialect>,
    ty: RecordType,
    staged: Vec<(Field, ParamSource)>,
    key: Option<(Field, Rc<RefCell<Value>>)>,
}

impl CreateBuilder {
    pub(crate) fn new(
        conn: Rc<RefCell<Box<dyn DriverConnection>>>,
        dialect: Arc<dyn Dialect>,
        ty: RecordType,
    ) -> Self {
        Self {
            conn,
            dialect,
            ty,
            staged: Vec::new(),
            key: None,
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

    pub fn set(&mut self, field: &Field, value: impl Into<Value>) -> &mut Self {
        self.stage(field, ParamSource::Value(value.into()))
    }

    pub fn set_source(&mut self, field: &Field, source: Rc<dyn ValueSource>) -> &mut Self {
        self.stage(field, ParamSource::Source(source))
    }

    /// Stage every field of the record. Auto-increment fields holding null
    /// are skipped so the engine generates them.
    pub fn set_record(&mut self, record: &Record) -> &mut Self {
        let fields: Vec<Field> = record.record_type().fields().collect();
        for field in fields {
            let value = record.get(&field).clone();
            if field.auto_increment() && value.is_null() {
                continue;
            }
            self.set(&field, value);
        }
        self
    }

    /// Request retrieval of the engine-generated key into the returned
    /// reader. On dialects that reject the generated-keys request mode the
    /// insert still runs, but the reader stays empty.
    pub fn retrieve_generated_key(&mut self, field: &Field) -> GeneratedKeyReader {
        let slot = match &self.key {
            Some((.., slot)) => slot.clone(),
            None => {
                let slot = Rc::new(RefCell::new(Value::Null));
                self.key = Some((field.clone(), slot.clone()));
                slot
            }
        };
        GeneratedKeyReader {
            field: field.clone(),
            slot,
        }
    }

    /// Prepare the statement and drain the staged fields into a request.
    pub fn build(&mut self) -> Result<InsertRequest> {
        let fields = std::mem::take(&mut self.staged);
        let sql = render_insert(self.dialect.as_ref(), &self.ty, &fields, false);
        let want_keys = self.key.is_some() && self.dialect.supports_generated_keys();
        let statement = self
            .conn
            .borrow_mut()
            .prepare(&sql, want_keys)
            .map_err(|e| SqlError::Prepare {
                sql: sql.clone(),
                source: e,
            })?;
        Ok(InsertRequest {
            statement: Some(statement),
            sql,
            dialect: self.dialect.clone(),
            ty: self.ty.clone(),
            fields,
            key: self.key.clone(),
            want_keys,
        })
    }

    pub fn build_bulk(&mut self) -> Result<Box<dyn BulkRequest>> {
        Ok(Box::new(EagerBulk(self.build()?)))
    }
}

/// Reads the key produced by the last run of the owning insert request.
/// Empty ([`Value::Null`]) until a run produces a key, and reset to empty
/// when a run produces none.
#[derive(Clone)]
pub struct GeneratedKeyReader {
    field: Field,
    slot: Rc<RefCell<Value>>,
}

impl GeneratedKeyReader {
    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn value(&self) -> Value {
        self.slot.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.borrow().is_null()
    }
}

/// One prepared `INSERT` statement plus its staged parameter sources.
pub struct InsertRequest {
    statement: Option<Box<dyn crate::Statement>>,
    sql: String,
    dialect: Arc<dyn Dialect>,
    ty: RecordType,
    fields: Vec<(Field, ParamSource)>,
    key: Option<(Field, Rc<RefCell<Value>>)>,
    want_keys: bool,
}

impl InsertRequest {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    fn debug_sql(&self) -> String {
        render_insert(self.dialect.as_ref(), &self.ty, &self.fields, true)
    }
}

impl SqlRequest for InsertRequest {
    fn run(&mut self) -> Result<u64> {
        let Some(statement) = self.statement.as_mut() else {
            return Err(SqlError::StatementClosed {
                sql: self.sql.clone(),
            });
        };
        let fields = &self.fields;
        let outcome: DriverResult<u64> = (|| {
            for (index, (.., source)) in fields.iter().enumerate() {
                statement.bind(index, &source.current().driver_encoding())?;
            }
            statement.execute_update()
        })();
        let affected = match outcome {
            Ok(affected) => affected,
            Err(e) => {
                let debug_sql = render_insert(self.dialect.as_ref(), &self.ty, &self.fields, true);
                log::error!("insert failed: {}", debug_sql);
                return Err(wrap_execute(self.dialect.as_ref(), debug_sql, e));
            }
        };
        if self.want_keys {
            if let Some((field, slot)) = &self.key {
                let generated: DriverResult<Option<Value>> = (|| {
                    let Some(mut cursor) = statement.generated_keys()? else {
                        return Ok(None);
                    };
                    if !cursor.advance()? {
                        return Ok(None);
                    }
                    Ok(match field.kind() {
                        ValueKind::Integer => cursor.get_i32(0)?.map(Value::from),
                        _ => cursor.get_i64(0)?.map(Value::from),
                    })
                })();
                match generated {
                    Ok(value) => *slot.borrow_mut() = value.unwrap_or(Value::Null),
                    Err(e) => {
                        let debug_sql =
                            render_insert(self.dialect.as_ref(), &self.ty, &self.fields, true);
                        return Err(wrap_execute(self.dialect.as_ref(), debug_sql, e));
                    }
                }
            }
        }
        Ok(affected)
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

impl std::fmt::Display for InsertRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.debug_sql())
    }
}

impl Drop for InsertRequest {
    fn drop(&mut self) {
        if let Some(mut statement) = self.statement.take() {
            if let Err(e) = statement.close() {
                log::error!("closing insert statement failed: {}", e);
            }
        }
    }
}

/// Render `INSERT INTO t (cols) VALUES (…)`, with placeholders for execution
/// or current values as literals for diagnostics.
fn render_insert(
    dialect: &dyn Dialect,
    ty: &RecordType,
    fields: &[(Field, ParamSource)],
    debug: bool,
) -> String {
    let mut out = String::with_capacity(64 + fields.len() * 16);
    out.push_str("INSERT INTO ");
    out.push_str(&dialect.table_name(ty, true));
    out.push_str(" (");
    separated_by(
        &mut out,
        fields,
        |out, (field, ..)| out.push_str(&dialect.column_name(field, true)),
        ", ",
    );
    out.push_str(") VALUES (");
    separated_by(
        &mut out,
        fields,
        |out, (.., source)| {
            if debug {
                dialect.write_value(out, &source.current());
            } else {
                out.push('?');
            }
        },
        ", ",
    );
    out.push(')');
    out
}
