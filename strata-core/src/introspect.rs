use crate::{
    ColumnMeta, Dialect, DriverConnection, RecordType, RecordTypeBuilder, Result, SqlError,
    TypeCode,
};
use std::{cell::RefCell, collections::HashSet, rc::Rc, sync::Arc};

/// Reverse-map result-set column metadata into a record type.
///
/// The priority table is deterministic: exact decimals with zero scale map to
/// integer (1-9 digits) or long (10-18 digits) and fall back to double beyond
/// that or with a non-zero scale, keeping precision and scale as metadata;
/// character types become strings with their captured sizes; binary types
/// become blobs; temporal types split into date and datetime. A type code
/// without a mapping is a hard failure, never a silent default.
pub fn record_type_from_columns(name: &str, columns: &[ColumnMeta]) -> Result<RecordType> {
    record_type_from_columns_filtered(name, columns, &HashSet::new())
}

pub(crate) fn record_type_from_columns_filtered(
    name: &str,
    columns: &[ColumnMeta],
    ignore: &HashSet<String>,
) -> Result<RecordType> {
    let mut builder = RecordTypeBuilder::new(name);
    for meta in columns {
        if ignore.contains(&meta.label) {
            continue;
        }
        declare_column(&mut builder, meta)?;
    }
    Ok(builder.build())
}

fn declare_column(builder: &mut RecordTypeBuilder, meta: &ColumnMeta) -> Result<()> {
    let label = meta.label.as_str();
    let options = match meta.type_code {
        TypeCode::Char => {
            let mut options = builder.text(label);
            if let Some(size) = meta.precision {
                options = options.min_size(size).max_size(size);
            }
            options
        }
        TypeCode::Varchar | TypeCode::LongVarchar => {
            let mut options = builder.text(label);
            if let Some(size) = meta.precision {
                options = options.max_size(size);
            }
            options
        }
        TypeCode::Decimal | TypeCode::Numeric => {
            let scale = meta.scale.unwrap_or(0);
            match (scale, meta.precision) {
                (0, Some(1..=9)) => builder.integer(label),
                (0, Some(10..=18)) => builder.long(label),
                (.., precision) => {
                    let mut options = builder.double(label).scale(scale);
                    if let Some(precision) = precision {
                        options = options.precision(precision);
                    }
                    options
                }
            }
        }
        TypeCode::Float | TypeCode::Double => builder.double(label),
        TypeCode::Bit | TypeCode::Boolean => builder.boolean(label),
        TypeCode::TinyInt | TypeCode::SmallInt | TypeCode::Integer => builder.integer(label),
        TypeCode::BigInt => builder.long(label),
        TypeCode::Binary | TypeCode::VarBinary | TypeCode::LongVarBinary | TypeCode::Blob => {
            builder.bytes(label)
        }
        TypeCode::Date => builder.date(label),
        TypeCode::Timestamp => builder.date_time(label),
        TypeCode::Other(code) => {
            return Err(SqlError::UnsupportedColumnType {
                column: meta.label.clone(),
                code,
            });
        }
    };
    let mut options = options.column_name(label);
    if meta.nullable {
        options = options.nullable();
    }
    let _ = options;
    Ok(())
}

/// Introspects an existing table into a record type, optionally skipping
/// columns. Obtained from [`crate::SqlConnection::extract_type`].
pub struct TypeExtractor {
    conn: Rc<RefCell<Box<dyn DriverConnection>>>,
    dialect: Arc<dyn Dialect>,
    table: String,
    ignore: HashSet<String>,
}

impl TypeExtractor {
    pub(crate) fn new(
        conn: Rc<RefCell<Box<dyn DriverConnection>>>,
        dialect: Arc<dyn Dialect>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            dialect,
            table: table.into(),
            ignore: HashSet::new(),
        }
    }

    pub fn ignore_column(mut self, name: impl Into<String>) -> Self {
        self.ignore.insert(name.into());
        self
    }

    pub fn extract(self) -> Result<RecordType> {
        // A probe that returns column metadata without fetching rows.
        let sql = format!(
            "SELECT * FROM {} WHERE 1 = 0",
            self.dialect.naming().table_name(&self.table, true)
        );
        let mut statement =
            self.conn
                .borrow_mut()
                .prepare(&sql, false)
                .map_err(|e| SqlError::Prepare {
                    sql: sql.clone(),
                    source: e,
                })?;
        let result = statement
            .execute_query()
            .map_err(|e| SqlError::Execute {
                debug_sql: sql.clone(),
                source: e,
            })
            .and_then(|cursor| {
                record_type_from_columns_filtered(&self.table, cursor.columns(), &self.ignore)
            });
        if let Err(e) = statement.close() {
            log::error!("closing introspection statement failed: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueKind;

    fn meta(label: &str, type_code: TypeCode, precision: Option<u32>, scale: Option<u32>) -> ColumnMeta {
        ColumnMeta {
            label: label.to_owned(),
            type_code,
            precision,
            scale,
            nullable: false,
        }
    }

    #[test]
    fn decimal_priority_table() {
        let columns = [
            meta("small", TypeCode::Numeric, Some(9), Some(0)),
            meta("wide", TypeCode::Numeric, Some(18), Some(0)),
            meta("huge", TypeCode::Numeric, Some(19), Some(0)),
            meta("money", TypeCode::Decimal, Some(10), Some(2)),
        ];
        let ty = record_type_from_columns("t", &columns).unwrap();
        assert_eq!(ty.field("small").unwrap().kind(), ValueKind::Integer);
        assert_eq!(ty.field("wide").unwrap().kind(), ValueKind::Long);
        assert_eq!(ty.field("huge").unwrap().kind(), ValueKind::Double);
        let money = ty.field("money").unwrap();
        assert_eq!(money.kind(), ValueKind::Double);
        assert_eq!(money.precision(), Some(10));
        assert_eq!(money.scale(), Some(2));
    }

    #[test]
    fn character_binary_and_temporal_codes() {
        let columns = [
            meta("code", TypeCode::Char, Some(2), None),
            meta("name", TypeCode::Varchar, Some(120), None),
            meta("body", TypeCode::LongVarchar, None, None),
            meta("flag", TypeCode::Boolean, None, None),
            meta("count", TypeCode::Integer, None, None),
            meta("total", TypeCode::BigInt, None, None),
            meta("ratio", TypeCode::Double, None, None),
            meta("payload", TypeCode::Blob, None, None),
            meta("born", TypeCode::Date, None, None),
            meta("seen", TypeCode::Timestamp, None, None),
        ];
        let ty = record_type_from_columns("t", &columns).unwrap();
        let code = ty.field("code").unwrap();
        assert_eq!(code.kind(), ValueKind::Text);
        assert_eq!(code.min_size(), Some(2));
        assert_eq!(code.max_size(), Some(2));
        let name = ty.field("name").unwrap();
        assert_eq!(name.max_size(), Some(120));
        assert_eq!(ty.field("body").unwrap().max_size(), None);
        assert_eq!(ty.field("flag").unwrap().kind(), ValueKind::Boolean);
        assert_eq!(ty.field("count").unwrap().kind(), ValueKind::Integer);
        assert_eq!(ty.field("total").unwrap().kind(), ValueKind::Long);
        assert_eq!(ty.field("ratio").unwrap().kind(), ValueKind::Double);
        assert_eq!(ty.field("payload").unwrap().kind(), ValueKind::Bytes);
        assert_eq!(ty.field("born").unwrap().kind(), ValueKind::Date);
        assert_eq!(ty.field("seen").unwrap().kind(), ValueKind::DateTime);
    }

    #[test]
    fn nullability_and_physical_names_are_captured() {
        let mut column = meta("NAME", TypeCode::Varchar, Some(10), None);
        column.nullable = true;
        let ty = record_type_from_columns("t", &[column]).unwrap();
        let field = ty.field("NAME").unwrap();
        assert!(field.nullable());
        assert_eq!(field.column_override(), Some("NAME"));
    }

    #[test]
    fn unknown_code_is_a_hard_failure() {
        let columns = [meta("mystery", TypeCode::Other(2009), None, None)];
        assert!(matches!(
            record_type_from_columns("t", &columns),
            Err(SqlError::UnsupportedColumnType { code: 2009, .. })
        ));
    }
}
