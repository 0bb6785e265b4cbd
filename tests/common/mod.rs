//! In-memory driver stub for exercising the full stack: records every
//! prepared statement and bound parameter, replays configured results, and
//! counts the typed getter calls the accessor layer issues.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};
use strata::{
    ColumnMeta, Cursor, Driver, DriverConnection, DriverError, DriverResult, Statement, TypeCode,
    Value,
};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

#[derive(Debug, Clone)]
pub struct Execution {
    pub sql: String,
    pub binds: Vec<Value>,
    pub query: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Default)]
pub struct MockState {
    pub prepared: Mutex<Vec<(String, bool)>>,
    pub executions: Mutex<Vec<Execution>>,
    pub results: Mutex<VecDeque<MockResult>>,
    pub update_counts: Mutex<VecDeque<u64>>,
    pub generated_keys: Mutex<VecDeque<Option<Value>>>,
    pub fail_next_execute: Mutex<Option<DriverError>>,
    pub getter_calls: Mutex<u64>,
    pub closed_statements: Mutex<u64>,
    pub commits: Mutex<u64>,
    pub rollbacks: Mutex<u64>,
    pub fail_rollback: Mutex<bool>,
    pub tables: Mutex<Vec<String>>,
}

impl MockState {
    pub fn queue_result(&self, result: MockResult) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn queue_update_count(&self, count: u64) {
        self.update_counts.lock().unwrap().push_back(count);
    }

    pub fn queue_generated_key(&self, key: Option<Value>) {
        self.generated_keys.lock().unwrap().push_back(key);
    }

    pub fn prepared_sql(&self) -> Vec<String> {
        self.prepared
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, ..)| sql.clone())
            .collect()
    }

    pub fn last_execution(&self) -> Execution {
        self.executions
            .lock()
            .unwrap()
            .last()
            .expect("no statement was executed")
            .clone()
    }

    pub fn getter_calls(&self) -> u64 {
        *self.getter_calls.lock().unwrap()
    }
}

pub struct MockDriver {
    pub state: Arc<MockState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
        }
    }
}

impl Driver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    fn connect(&self, _url: &str) -> DriverResult<Box<dyn DriverConnection>> {
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
        }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
}

impl DriverConnection for MockConnection {
    fn prepare(&mut self, sql: &str, want_generated_keys: bool) -> DriverResult<Box<dyn Statement>> {
        self.state
            .prepared
            .lock()
            .unwrap()
            .push((sql.to_owned(), want_generated_keys));
        Ok(Box::new(MockStatement {
            state: self.state.clone(),
            sql: sql.to_owned(),
            binds: Vec::new(),
        }))
    }

    fn commit(&mut self) -> DriverResult<()> {
        *self.state.commits.lock().unwrap() += 1;
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        if *self.state.fail_rollback.lock().unwrap() {
            return Err(DriverError::message("rollback refused"));
        }
        *self.state.rollbacks.lock().unwrap() += 1;
        Ok(())
    }

    fn table_names(&mut self) -> DriverResult<Vec<String>> {
        Ok(self.state.tables.lock().unwrap().clone())
    }

    fn close(&mut self) -> DriverResult<()> {
        Ok(())
    }
}

struct MockStatement {
    state: Arc<MockState>,
    sql: String,
    binds: Vec<Value>,
}

impl MockStatement {
    fn record(&self, query: bool) {
        self.state.executions.lock().unwrap().push(Execution {
            sql: self.sql.clone(),
            binds: self.binds.clone(),
            query,
        });
    }

    fn take_failure(&self) -> DriverResult<()> {
        match self.state.fail_next_execute.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Statement for MockStatement {
    fn bind(&mut self, index: usize, value: &Value) -> DriverResult<()> {
        if self.binds.len() <= index {
            self.binds.resize(index + 1, Value::Null);
        }
        self.binds[index] = value.clone();
        Ok(())
    }

    fn execute_query(&mut self) -> DriverResult<Box<dyn Cursor>> {
        self.record(true);
        self.take_failure()?;
        let result = self
            .state
            .results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(Box::new(MockCursor {
            state: self.state.clone(),
            columns: result.columns,
            rows: result.rows,
            row: None,
        }))
    }

    fn execute_update(&mut self) -> DriverResult<u64> {
        self.record(false);
        self.take_failure()?;
        Ok(self
            .state
            .update_counts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(1))
    }

    fn generated_keys(&mut self) -> DriverResult<Option<Box<dyn Cursor>>> {
        let Some(key) = self.state.generated_keys.lock().unwrap().pop_front() else {
            return Ok(None);
        };
        let rows = match key {
            Some(value) => vec![vec![value]],
            None => Vec::new(),
        };
        Ok(Some(Box::new(MockCursor {
            state: self.state.clone(),
            columns: vec![ColumnMeta {
                label: "generated_key".to_owned(),
                type_code: TypeCode::BigInt,
                precision: None,
                scale: None,
                nullable: false,
            }],
            rows,
            row: None,
        })))
    }

    fn close(&mut self) -> DriverResult<()> {
        *self.state.closed_statements.lock().unwrap() += 1;
        Ok(())
    }
}

struct MockCursor {
    state: Arc<MockState>,
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<Value>>,
    row: Option<usize>,
}

impl MockCursor {
    fn cell(&self, index: usize) -> DriverResult<&Value> {
        let row = self
            .row
            .ok_or_else(|| DriverError::message("cursor not advanced"))?;
        self.rows
            .get(row)
            .and_then(|columns| columns.get(index))
            .ok_or_else(|| DriverError::message(format!("no column {} in current row", index)))
    }

    fn count_getter(&self) {
        *self.state.getter_calls.lock().unwrap() += 1;
    }
}

macro_rules! typed_getter {
    ($name:ident, $variant:ident, $ty:ty) => {
        fn $name(&mut self, index: usize) -> DriverResult<Option<$ty>> {
            self.count_getter();
            match self.cell(index)? {
                Value::$variant(v) => Ok(v.clone()),
                Value::Null => Ok(None),
                other => Err(DriverError::message(format!(
                    "column {} holds {:?}, not a {}",
                    index,
                    other,
                    stringify!($variant)
                ))),
            }
        }
    };
}

impl Cursor for MockCursor {
    fn advance(&mut self) -> DriverResult<bool> {
        let next = self.row.map(|r| r + 1).unwrap_or(0);
        self.row = Some(next);
        Ok(next < self.rows.len())
    }

    fn row_id(&self) -> u64 {
        self.row.unwrap_or(0) as u64
    }

    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn is_null(&mut self, index: usize) -> DriverResult<bool> {
        Ok(self.cell(index)?.is_null())
    }

    typed_getter!(get_i32, Integer, i32);
    typed_getter!(get_i64, Long, i64);
    typed_getter!(get_f64, Double, f64);
    typed_getter!(get_bool, Boolean, bool);
    typed_getter!(get_text, Text, String);
    typed_getter!(get_date, Date, Date);
    typed_getter!(get_date_time, DateTime, OffsetDateTime);
    typed_getter!(get_timestamp, Timestamp, PrimitiveDateTime);

    fn get_bytes(&mut self, index: usize) -> DriverResult<Option<Vec<u8>>> {
        self.count_getter();
        match self.cell(index)? {
            Value::Bytes(v) => Ok(v.as_ref().map(|b| b.to_vec())),
            Value::Null => Ok(None),
            other => Err(DriverError::message(format!(
                "column {} holds {:?}, not bytes",
                index, other
            ))),
        }
    }
}

/// Column metadata shorthand for configured results.
pub fn column(label: &str, type_code: TypeCode) -> ColumnMeta {
    ColumnMeta {
        label: label.to_owned(),
        type_code,
        precision: None,
        scale: None,
        nullable: true,
    }
}

use strata::{Dialect, GenericDialect, RecordType, RecordTypeBuilder, SqlService};

pub fn movie_type() -> RecordType {
    let mut builder = RecordTypeBuilder::new("movie");
    builder.integer("id").key();
    builder.text("title");
    builder.double("rating").nullable();
    builder.long("year");
    builder.integer("studio_id");
    builder.build()
}

pub fn studio_type() -> RecordType {
    let mut builder = RecordTypeBuilder::new("studio");
    builder.integer("id").key();
    builder.text("name");
    builder.build()
}

pub fn service_with(dialect: Arc<dyn Dialect>) -> (Arc<MockState>, SqlService) {
    let driver = MockDriver::new();
    let state = driver.state.clone();
    let service = SqlService::new("mock://test", Arc::new(driver), dialect);
    (state, service)
}

pub fn generic_service() -> (Arc<MockState>, SqlService) {
    let _ = env_logger::builder().is_test(true).try_init();
    service_with(Arc::new(GenericDialect))
}
