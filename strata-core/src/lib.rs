mod accessor;
mod compiler;
mod connection;
mod constraint;
mod ddl;
mod delete;
mod dialect;
mod driver;
mod error;
mod insert;
mod introspect;
mod naming;
mod record;
mod request;
mod schema;
mod select;
mod service;
mod update;
mod util;
mod value;

pub use accessor::*;
pub use connection::*;
pub use constraint::build as constraints;
pub use constraint::{CompareOp, Constraint, Operand};
pub use delete::*;
pub use dialect::*;
pub use driver::*;
pub use error::*;
pub use insert::*;
pub use introspect::{TypeExtractor, record_type_from_columns};
pub use naming::*;
pub use record::*;
pub use request::*;
pub use schema::*;
pub use select::*;
pub use service::*;
pub use update::*;
pub use util::separated_by;
pub use value::*;

pub type Result<T> = std::result::Result<T, SqlError>;
