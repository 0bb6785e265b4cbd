use crate::{
    ColumnReader, Constraint, Dialect, DriverConnection, Field, Record, RecordType, Result,
    SqlError, Value, ValueKind,
    accessor::{ColumnBinding, QueryShared},
    compiler,
    util::separated_by,
};
use std::{
    cell::{Cell, RefCell},
    fmt::Write,
    rc::Rc,
    sync::Arc,
    time::Instant,
};

/// A computed projection over one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Count,
}

impl AggregateOp {
    fn sql(&self) -> &'static str {
        match self {
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::Sum => "SUM",
            AggregateOp::Count => "COUNT",
        }
    }

    fn result_kind(&self, field: &Field) -> ValueKind {
        match self {
            AggregateOp::Count => ValueKind::Long,
            _ => field.kind(),
        }
    }
}

/// Everything needed to render the statement, kept by the compiled query so
/// failures can re-render it in debug mode with current parameter values.
struct SelectPlan {
    constraint: Option<Constraint>,
    projected: Vec<Field>,
    aggregates: Vec<(AggregateOp, Field)>,
    distinct: Vec<Field>,
    group_by: Vec<Field>,
    orders: Vec<(Field, bool)>,
    top: Option<u64>,
    skip: Option<u64>,
}

impl SelectPlan {
    /// Fixed render order: `SELECT [aggregates,] [DISTINCT] columns FROM
    /// tables [WHERE] [GROUP BY] [ORDER BY] [LIMIT] [OFFSET]`. The FROM list
    /// is the dedup'd, first-seen-ordered set of types referenced by the
    /// projection or the predicate, which is why the WHERE clause is rendered
    /// into its own buffer first.
    fn render(&self, dialect: &dyn Dialect, debug: bool) -> String {
        let mut tables: Vec<RecordType> = Vec::new();
        let mut columns = String::with_capacity(64);
        separated_by(
            &mut columns,
            &self.aggregates,
            |out, (op, field)| {
                compiler::note_type(&mut tables, field.record_type());
                out.push_str(op.sql());
                out.push('(');
                dialect.write_qualified_column(out, field);
                out.push(')');
            },
            ", ",
        );
        if !self.aggregates.is_empty() && !self.projected.is_empty() {
            columns.push_str(", ");
        }
        // Any one field marked distinct makes the whole selection DISTINCT;
        // the keyword is emitted once, before the column list.
        if !self.distinct.is_empty() {
            columns.push_str("DISTINCT ");
        }
        separated_by(
            &mut columns,
            &self.projected,
            |out, field| {
                compiler::note_type(&mut tables, field.record_type());
                dialect.write_qualified_column(out, field);
            },
            ", ",
        );
        let mut where_clause = String::new();
        if let Some(constraint) = &self.constraint {
            where_clause.push_str(" WHERE ");
            if debug {
                compiler::render_debug_with_tables(
                    constraint,
                    dialect,
                    &mut tables,
                    &mut where_clause,
                );
            } else {
                compiler::render(constraint, dialect, &mut tables, &mut where_clause);
            }
        }
        let mut out = String::with_capacity(128 + columns.len() + where_clause.len());
        out.push_str("SELECT ");
        out.push_str(&columns);
        out.push_str(" FROM ");
        separated_by(
            &mut out,
            &tables,
            |out, ty| out.push_str(&dialect.table_name(ty, true)),
            ", ",
        );
        out.push_str(&where_clause);
        if !self.group_by.is_empty() {
            out.push_str(" GROUP BY ");
            separated_by(
                &mut out,
                &self.group_by,
                |out, field| dialect.write_qualified_column(out, field),
                ", ",
            );
        }
        if !self.orders.is_empty() {
            out.push_str(" ORDER BY ");
            separated_by(
                &mut out,
                &self.orders,
                |out, (field, asc)| {
                    out.push_str(&dialect.column_name(field, true));
                    out.push_str(if *asc { " ASC" } else { " DESC" });
                },
                ", ",
            );
        }
        if let Some(top) = self.top {
            let _ = write!(out, " LIMIT {}", top);
        }
        if let Some(skip) = self.skip {
            let _ = write!(out, " OFFSET {}", skip);
        }
        out
    }
}

/// Accumulates a typed projection, then compiles it into a [`SelectQuery`].
/// Compiling consumes the builder, so projection changes after compile are
/// impossible by construction.
pub struct QueryBuilder {
    conn: Rc<RefCell<Box<dyn DriverConnection>>>,
    dialect: Arc<dyn Dialect>,
    ty: RecordType,
    plan: SelectPlan,
    auto_close: bool,
}

impl QueryBuilder {
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
            plan: SelectPlan {
                constraint,
                projected: Vec::new(),
                aggregates: Vec::new(),
                distinct: Vec::new(),
                group_by: Vec::new(),
                orders: Vec::new(),
                top: None,
                skip: None,
            },
            auto_close: false,
        }
    }

    /// Project a field. Selecting the same field twice keeps one column.
    pub fn select(&mut self, field: &Field) -> &mut Self {
        if !self.plan.projected.contains(field) {
            self.plan.projected.push(field.clone());
        }
        self
    }

    /// Project every field of the builder's record type.
    pub fn select_all(&mut self) -> &mut Self {
        let fields: Vec<Field> = self.ty.fields().collect();
        for field in &fields {
            self.select(field);
        }
        self
    }

    /// Project a field and mark the selection DISTINCT. The keyword is
    /// table-wide: one marked field makes the whole row set distinct.
    pub fn distinct(&mut self, field: &Field) -> &mut Self {
        self.select(field);
        if !self.plan.distinct.contains(field) {
            self.plan.distinct.push(field.clone());
        }
        self
    }

    pub fn min(&mut self, field: &Field) -> &mut Self {
        self.plan.aggregates.push((AggregateOp::Min, field.clone()));
        self
    }

    pub fn max(&mut self, field: &Field) -> &mut Self {
        self.plan.aggregates.push((AggregateOp::Max, field.clone()));
        self
    }

    pub fn sum(&mut self, field: &Field) -> &mut Self {
        self.plan.aggregates.push((AggregateOp::Sum, field.clone()));
        self
    }

    pub fn count(&mut self, field: &Field) -> &mut Self {
        self.plan
            .aggregates
            .push((AggregateOp::Count, field.clone()));
        self
    }

    pub fn group_by(&mut self, field: &Field) -> &mut Self {
        self.plan.group_by.push(field.clone());
        self
    }

    pub fn order_asc(&mut self, field: &Field) -> &mut Self {
        self.plan.orders.push((field.clone(), true));
        self
    }

    pub fn order_desc(&mut self, field: &Field) -> &mut Self {
        self.plan.orders.push((field.clone(), false));
        self
    }

    pub fn top(&mut self, rows: u64) -> &mut Self {
        self.plan.top = Some(rows);
        self
    }

    pub fn skip(&mut self, rows: u64) -> &mut Self {
        self.plan.skip = Some(rows);
        self
    }

    /// Close the query automatically once its row stream is exhausted or
    /// dropped.
    pub fn auto_close(&mut self) -> &mut Self {
        self.auto_close = true;
        self
    }

    /// Render the SQL and prepare the statement.
    pub fn build(self) -> Result<SelectQuery> {
        if self.plan.projected.is_empty() && self.plan.aggregates.is_empty() {
            return Err(SqlError::mismatch(format!(
                "query on `{}` has an empty projection",
                self.ty.name()
            )));
        }
        let sql = self.plan.render(self.dialect.as_ref(), false);
        let started = Instant::now();
        let statement = self
            .conn
            .borrow_mut()
            .prepare(&sql, false)
            .map_err(|e| SqlError::Prepare {
                sql: sql.clone(),
                source: e,
            })?;
        log::debug!("preparing `{}` took {:?}", sql, started.elapsed());
        let shared = Rc::new(QueryShared::new(sql, self.auto_close));
        *shared.statement.borrow_mut() = Some(statement);
        let mut aggregates = Vec::with_capacity(self.plan.aggregates.len());
        let mut index = 0;
        for (op, field) in &self.plan.aggregates {
            aggregates.push((
                *op,
                ColumnReader::with_kind(
                    field.clone(),
                    op.result_kind(field),
                    shared.clone(),
                    ColumnBinding::Bound(index),
                ),
            ));
            index += 1;
        }
        let mut readers = Vec::with_capacity(self.plan.projected.len());
        for field in &self.plan.projected {
            readers.push((
                field.clone(),
                ColumnReader::new(field.clone(), shared.clone(), ColumnBinding::Bound(index)),
            ));
            index += 1;
        }
        Ok(SelectQuery {
            shared,
            dialect: self.dialect,
            readers,
            aggregates,
            plan: Some(self.plan),
            late_bound: Cell::new(true),
        })
    }
}

/// A compiled query: a prepared statement plus the readers bound to it.
///
/// Executing yields a lazy, forward-only, single-pass [`Rows`]; the sequence
/// is not restartable, re-iterating means calling [`SelectQuery::rows`] again
/// (parameter values are re-read and re-bound on every execution).
pub struct SelectQuery {
    shared: Rc<QueryShared>,
    dialect: Arc<dyn Dialect>,
    readers: Vec<(Field, ColumnReader)>,
    aggregates: Vec<(AggregateOp, ColumnReader)>,
    /// `None` for queries compiled from free-form SQL.
    plan: Option<SelectPlan>,
    /// False until the first execution resolved late bindings.
    late_bound: Cell<bool>,
}

impl SelectQuery {
    /// Compile from free-form SQL. Column-to-field binding is resolved from
    /// the result metadata on first execution: result columns are matched
    /// against the naming strategy's column names, unmatched result columns
    /// are logged and skipped, and declared fields without a matching column
    /// read as null.
    pub(crate) fn from_sql(
        conn: Rc<RefCell<Box<dyn DriverConnection>>>,
        dialect: Arc<dyn Dialect>,
        sql: &str,
        ty: &RecordType,
    ) -> Result<SelectQuery> {
        let started = Instant::now();
        let statement = conn
            .borrow_mut()
            .prepare(sql, false)
            .map_err(|e| SqlError::Prepare {
                sql: sql.to_owned(),
                source: e,
            })?;
        log::debug!("preparing `{}` took {:?}", sql, started.elapsed());
        let shared = Rc::new(QueryShared::new(sql.to_owned(), true));
        *shared.statement.borrow_mut() = Some(statement);
        let readers = ty
            .fields()
            .map(|field| {
                (
                    field.clone(),
                    ColumnReader::new(field, shared.clone(), ColumnBinding::Unbound),
                )
            })
            .collect();
        Ok(SelectQuery {
            shared,
            dialect,
            readers,
            aggregates: Vec::new(),
            plan: None,
            late_bound: Cell::new(false),
        })
    }

    pub fn sql(&self) -> &str {
        &self.shared.sql
    }

    /// The statement with current parameter values substituted as literals.
    pub fn debug_sql(&self) -> String {
        match &self.plan {
            Some(plan) => plan.render(self.dialect.as_ref(), true),
            None => self.shared.sql.clone(),
        }
    }

    /// Reader for a projected field.
    pub fn reader(&self, field: &Field) -> Option<ColumnReader> {
        self.readers
            .iter()
            .find(|(f, ..)| f == field)
            .map(|(.., r)| r.clone())
    }

    /// Readers of the computed projections, in declaration order.
    pub fn aggregate_readers(&self) -> impl Iterator<Item = &ColumnReader> {
        self.aggregates.iter().map(|(.., r)| r)
    }

    /// Bind current parameter values and execute.
    pub fn rows(&mut self) -> Result<Rows> {
        self.shared.ensure_open()?;
        {
            let mut statement = self.shared.statement.borrow_mut();
            let statement = statement.as_mut().ok_or_else(|| SqlError::StatementClosed {
                sql: self.shared.sql.clone(),
            })?;
            if let Some(constraint) = self.plan.as_ref().and_then(|p| p.constraint.as_ref()) {
                let mut index = 0;
                compiler::bind(
                    constraint,
                    self.dialect.as_ref(),
                    statement.as_mut(),
                    &mut index,
                )
                .map_err(|e| SqlError::Execute {
                    debug_sql: self.debug_sql(),
                    source: e,
                })?;
            }
            let started = Instant::now();
            let cursor = statement.execute_query().map_err(|e| SqlError::Execute {
                debug_sql: self.debug_sql(),
                source: e,
            })?;
            log::debug!(
                "execution of `{}` took {:?}",
                self.shared.sql,
                started.elapsed()
            );
            *self.shared.cursor.borrow_mut() = Some(cursor);
        }
        for (.., reader) in &self.readers {
            reader.reset_cache();
        }
        for (.., reader) in &self.aggregates {
            reader.reset_cache();
        }
        if !self.late_bound.replace(true) {
            self.resolve_late_bindings()?;
        }
        Ok(Rows {
            shared: self.shared.clone(),
            readers: self.readers.clone(),
            finished: false,
            count: 0,
        })
    }

    /// Execute and decode every row into a [`Record`].
    pub fn records(&mut self) -> Result<RecordRows> {
        Ok(RecordRows { rows: self.rows()? })
    }

    /// Convenience: execute and collect all records.
    pub fn fetch_records(&mut self) -> Result<Vec<Record>> {
        self.records()?.collect()
    }

    fn resolve_late_bindings(&self) -> Result<()> {
        let cursor = self.shared.cursor.borrow();
        let cursor = cursor
            .as_ref()
            .expect("cursor is present right after execution");
        for (index, meta) in cursor.columns().iter().enumerate() {
            let matched = self.readers.iter().find(|(field, reader)| {
                reader.is_unbound() && self.dialect.column_name(field, false) == meta.label
            });
            match matched {
                Some((.., reader)) => reader.bind_column(index)?,
                None => log::warn!(
                    "column `{}` of `{}` does not match any declared field, skipping",
                    meta.label,
                    self.shared.sql
                ),
            }
        }
        for (field, reader) in &self.readers {
            if reader.is_unbound() {
                log::debug!("field {:?} is absent from the result, reads as null", field);
                reader.mark_absent();
            }
        }
        Ok(())
    }

    /// Release the prepared statement. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }
}

impl Drop for SelectQuery {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// The lazy row stream of one execution. Forward-only and single-pass.
pub struct Rows {
    shared: Rc<QueryShared>,
    readers: Vec<(Field, ColumnReader)>,
    finished: bool,
    count: u64,
}

impl Rows {
    /// Move to the next row; `false` once the cursor is exhausted (which
    /// closes the query when auto-close was requested).
    pub fn advance(&mut self) -> Result<bool> {
        if self.finished || self.shared.closed.get() {
            return Ok(false);
        }
        let more = {
            let mut cursor = self.shared.cursor.borrow_mut();
            match cursor.as_mut() {
                Some(cursor) => cursor.advance().map_err(|e| SqlError::Execute {
                    debug_sql: self.shared.sql.clone(),
                    source: e,
                })?,
                None => false,
            }
        };
        if more {
            self.count += 1;
        } else {
            self.finished = true;
            log::debug!("read {} rows from `{}`", self.count, self.shared.sql);
            if self.shared.auto_close {
                self.shared.close();
            }
        }
        Ok(more)
    }

    pub fn reader(&self, field: &Field) -> Option<&ColumnReader> {
        self.readers
            .iter()
            .find(|(f, ..)| f == field)
            .map(|(.., r)| r)
    }

    /// Snapshot of the current row as field/value pairs.
    pub fn row_values(&self) -> Result<Vec<(Field, Value)>> {
        self.readers
            .iter()
            .map(|(field, reader)| Ok((field.clone(), reader.value()?)))
            .collect()
    }

    /// Decode the current row into a [`Record`]. All projected fields must
    /// belong to one record type.
    pub fn record(&self) -> Result<Record> {
        let (first, ..) = self.readers.first().ok_or_else(|| {
            SqlError::mismatch("cannot build records from an empty projection".to_owned())
        })?;
        let ty = first.record_type().clone();
        let mut record = Record::new(&ty);
        for (field, reader) in &self.readers {
            if field.record_type() != &ty {
                return Err(SqlError::mismatch(format!(
                    "projection mixes record types `{}` and `{}`",
                    ty.name(),
                    field.record_type().name()
                )));
            }
            record.set(field, reader.value()?);
        }
        Ok(record)
    }
}

impl Drop for Rows {
    fn drop(&mut self) {
        // Abandoning the stream early must still release the statement.
        if self.shared.auto_close && !self.shared.closed.get() {
            log::debug!(
                "row stream of `{}` dropped after {} rows",
                self.shared.sql,
                self.count
            );
            self.shared.close();
        }
    }
}

/// Iterator of decoded [`Record`]s over a [`Rows`] stream.
pub struct RecordRows {
    rows: Rows,
}

impl Iterator for RecordRows {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rows.advance() {
            Ok(true) => Some(self.rows.record()),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
