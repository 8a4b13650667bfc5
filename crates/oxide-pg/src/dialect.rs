//! The Postgres dialect.
//!
//! [`PgDialect`] carries the mapper registry and configuration and
//! implements [`ValueCoder`], [`Reconciler`](crate::schema::Reconciler) and
//! [`FilterCompiler`](crate::query::FilterCompiler) directly.

use std::sync::Arc;

use crate::coder::{self, RawValue, ScanKind, ValueCoder};
use crate::config::Config;
use crate::error::Result;
use crate::mapper::MapperRegistry;
use crate::value::Value;

/// Postgres SQL generation and value coercion.
#[derive(Debug, Clone)]
pub struct PgDialect {
    registry: Arc<MapperRegistry>,
    config: Config,
}

impl Default for PgDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl PgDialect {
    /// Creates a dialect backed by the process-wide registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(MapperRegistry::global())
    }

    /// Creates a dialect backed by the given registry.
    #[must_use]
    pub fn with_registry(registry: Arc<MapperRegistry>) -> Self {
        Self {
            registry,
            config: Config::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// The mapper registry.
    #[must_use]
    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Scan class of a declared column type; registered hooks come first.
    #[must_use]
    pub fn scan_kind(&self, column_type: &str) -> ScanKind {
        self.registry
            .resolve_scan_kind(column_type)
            .unwrap_or_else(|| ScanKind::classify(column_type))
    }
}

impl ValueCoder for PgDialect {
    fn to_native(&self, raw: RawValue, column_type: &str) -> Result<Value> {
        coder::decode(raw, self.scan_kind(column_type), &self.config.time_format)
    }

    fn to_literal(&self, value: &Value) -> String {
        self.registry
            .resolve_literal(value)
            .unwrap_or_else(|| coder::literal(value))
    }
}
