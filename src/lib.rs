//! Strata: the typed record layer for SQL databases.
//!
//! Declare a schema with [`RecordTypeBuilder`], combine predicates from
//! [`constraints`], and let the connection's builders compile them into
//! dialect SQL, bind the parameters and decode the rows back into
//! [`Record`]s. Per-engine behavior (identifier mapping, type keywords,
//! operator spellings, error classification) lives in the dialect crates
//! `strata-postgres`, `strata-mysql` and `strata-hsqldb`.

pub use strata_core::*;
