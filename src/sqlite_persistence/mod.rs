mod schema_spec;

pub use schema_spec::{Column, Schema, SqlType, Table, DEFAULT_TIMESTAMP};
