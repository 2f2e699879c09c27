//! Query splitting, schema-aware logical validation and streaming
//! execution over flat-file tables: the part of flatbase that turns a
//! validated `SELECT` into a lazy sequence of JSON row objects.

pub mod catalog;
pub mod error;
pub mod framing;
pub mod scan;
pub mod splitter;
pub mod validator;
pub mod value;

pub use catalog::{Catalog, ColumnType, Database, TableSchema};
pub use error::{ErrorKind, EngineError, EngineResult};
pub use framing::json_array_chunks;
pub use scan::scan_table;
pub use splitter::{split_query, ColumnRef, Projection, RawQuery, TableRef};
pub use validator::{validate, StaticType, ValidatedProjection, ValidatedQuery};
pub use value::Value;
