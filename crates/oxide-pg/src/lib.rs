//! # oxide-pg
//!
//! Keeps PostgreSQL tables in step with Rust record types and turns
//! abstract queries into SQL text.
//!
//! This crate provides:
//! - `Record` and `RecordSchema`: the column layout of a record type,
//!   usually produced by `#[derive(Record)]` from `oxide-pg-derive`
//! - `MapperRegistry`: pluggable field type to column type rules
//! - `ValueCoder`: scanned values to native values, native values to
//!   escaped literals
//! - `Reconciler`: `CREATE TABLE` / `ALTER TABLE` planning against the live
//!   catalog, and declarative index rebuilds
//! - `FilterCompiler`: filter trees, projection, sort, paging and grouping
//!   to SQL
//! - `Connection` and `Cursor`: running it all over a `SqlConnection`,
//!   with `PgClient` as the sqlx implementation
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxide_pg::{Command, Connection, Filter, PgClient, Record};
//! use oxide_pg_derive::Record;
//!
//! #[derive(Record)]
//! struct Article {
//!     #[field(key)]
//!     id: String,
//!     #[field(required)]
//!     title: String,
//!     score: f64,
//!     tags: Vec<String>,
//! }
//!
//! async fn example(url: &str) -> oxide_pg::Result<()> {
//!     let mut conn = Connection::new(PgClient::connect(url).await?);
//!
//!     // Create or alter the table; a second call is a no-op.
//!     conn.ensure_table::<Article>("articles", &["id"]).await?;
//!
//!     let query = Command::select("articles")
//!         .filter(Filter::and([Filter::eq("title", "Hello"), Filter::gte("score", 50)]))
//!         .order_by(&["-score"])
//!         .take(10);
//!     let articles: Vec<Article> = conn.cursor(&query).await?.fetch_records()?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```
//! use std::sync::Arc;
//! use oxide_pg::{Config, MapperRegistry, PgDialect};
//! use oxide_pg::mapper::{DefaultMapper, RuleMapper};
//!
//! let registry = MapperRegistry::new()
//!     .with("uuid", RuleMapper::for_base("Uuid", "uuid"))
//!     .with("default", DefaultMapper);
//! let dialect = PgDialect::with_registry(Arc::new(registry))
//!     .with_config(Config::default().prune_orphan_columns(true));
//! ```

pub mod coder;
pub mod config;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod mapper;
pub mod query;
pub mod record;
pub mod schema;
pub mod value;

pub use coder::{RawValue, ScanKind, ValueCoder};
pub use config::Config;
pub use dialect::PgDialect;
pub use error::{Error, Result};
pub use executor::{ColumnInfo, Connection, Cursor, PgClient, RowSet, SqlConnection};
pub use mapper::{MapperRegistry, TypeMapper};
pub use query::{
    ClauseSet, Command, CommandKind, CompareOp, CompiledCommand, Filter, FilterCompiler,
    QueryParam,
};
pub use record::{FieldDescriptor, NativeKind, Record, RecordSchema, TypeTag};
pub use schema::{AlterAction, CatalogEntry, IndexSpec, Reconciler, SchemaPlan, TableCatalog};
pub use value::{FromValue, Row, ToValue, Value};
