//! Type mapper registry.
//!
//! Maps field types to column types and default literals, and lets callers
//! hook scan classification and literal rendering. Rules are consulted in
//! registration order and the first one that answers wins; per-field
//! `db_type` and `default` overrides beat every rule.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::coder::ScanKind;
use crate::error::{Error, Result};
use crate::record::{FieldDescriptor, NativeKind};
use crate::value::Value;

/// Key under which [`MapperRegistry::with_defaults`] registers [`DefaultMapper`].
pub const DEFAULT_MAPPER: &str = "default";

/// A mapping rule. Every hook answers `None` by default.
pub trait TypeMapper: Send + Sync {
    /// SQL column type for a field.
    fn column_type(&self, _field: &FieldDescriptor) -> Option<String> {
        None
    }

    /// Default literal for a column of `sql_type`.
    fn default_literal(&self, _field: &FieldDescriptor, _sql_type: &str) -> Option<String> {
        None
    }

    /// Scan classification of a declared column type.
    fn scan_kind(&self, _column_type: &str) -> Option<ScanKind> {
        None
    }

    /// Literal text for a value.
    fn literal(&self, _value: &Value) -> Option<String> {
        None
    }
}

/// Built-in rules for the standard field types.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMapper;

impl TypeMapper for DefaultMapper {
    fn column_type(&self, field: &FieldDescriptor) -> Option<String> {
        let sql_type = match field.native_type.kind() {
            NativeKind::Text => "text",
            // Platform-sized and unsigned 32-bit integers must not truncate.
            NativeKind::BigInt => "bigint",
            NativeKind::Integer => "integer",
            NativeKind::Float32 => "numeric(32,8)",
            NativeKind::Float64 => "numeric(64,8)",
            NativeKind::Bool => "boolean",
            NativeKind::Timestamp => "timestamptz",
            NativeKind::Date => "date",
            NativeKind::Json => "jsonb",
            NativeKind::Other => return None,
        };
        Some(sql_type.to_string())
    }

    fn default_literal(&self, field: &FieldDescriptor, sql_type: &str) -> Option<String> {
        let lower = sql_type.trim().to_lowercase();
        let base = lower.split('(').next().unwrap_or(&lower).trim();
        let literal = match base {
            "text" | "varchar" | "character varying" | "char" | "character" | "citext" => "''",
            "bigint" | "integer" | "int" | "smallint" | "int2" | "int4" | "int8" | "numeric"
            | "decimal" | "real" | "double precision" | "float4" | "float8" => "0",
            "boolean" | "bool" => "'F'",
            "timestamptz" | "timestamp" | "timestamp with time zone"
            | "timestamp without time zone" => "'1970-01-01 00:00:00+00'",
            "date" => "'1970-01-01'",
            "jsonb" | "json" => {
                if field.native_type.base() == "Vec" {
                    "'[]'"
                } else {
                    "'{}'"
                }
            }
            _ => return None,
        };
        Some(literal.to_string())
    }
}

type ColumnTypeFn = dyn Fn(&FieldDescriptor) -> Option<String> + Send + Sync;
type DefaultLiteralFn = dyn Fn(&FieldDescriptor, &str) -> Option<String> + Send + Sync;
type ScanKindFn = dyn Fn(&str) -> Option<ScanKind> + Send + Sync;
type LiteralFn = dyn Fn(&Value) -> Option<String> + Send + Sync;

/// A rule assembled from closures.
///
/// ```
/// use oxide_pg::mapper::RuleMapper;
///
/// let uuid = RuleMapper::for_base("Uuid", "uuid")
///     .on_default_literal(|_, _| Some("gen_random_uuid()".to_string()));
/// ```
#[derive(Default)]
pub struct RuleMapper {
    column_type: Option<Box<ColumnTypeFn>>,
    default_literal: Option<Box<DefaultLiteralFn>>,
    scan_kind: Option<Box<ScanKindFn>>,
    literal: Option<Box<LiteralFn>>,
}

impl RuleMapper {
    /// Creates a rule that answers nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps every field whose base type is `base` to `sql_type`.
    #[must_use]
    pub fn for_base(base: impl Into<String>, sql_type: impl Into<String>) -> Self {
        let base = base.into();
        let sql_type = sql_type.into();
        Self::new().on_column_type(move |field| {
            (field.native_type.base() == base).then(|| sql_type.clone())
        })
    }

    /// Sets the column type hook.
    #[must_use]
    pub fn on_column_type(
        mut self,
        f: impl Fn(&FieldDescriptor) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.column_type = Some(Box::new(f));
        self
    }

    /// Sets the default literal hook.
    #[must_use]
    pub fn on_default_literal(
        mut self,
        f: impl Fn(&FieldDescriptor, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.default_literal = Some(Box::new(f));
        self
    }

    /// Sets the scan classification hook.
    #[must_use]
    pub fn on_scan_kind(
        mut self,
        f: impl Fn(&str) -> Option<ScanKind> + Send + Sync + 'static,
    ) -> Self {
        self.scan_kind = Some(Box::new(f));
        self
    }

    /// Sets the literal rendering hook.
    #[must_use]
    pub fn on_literal(mut self, f: impl Fn(&Value) -> Option<String> + Send + Sync + 'static) -> Self {
        self.literal = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for RuleMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleMapper")
            .field("column_type", &self.column_type.is_some())
            .field("default_literal", &self.default_literal.is_some())
            .field("scan_kind", &self.scan_kind.is_some())
            .field("literal", &self.literal.is_some())
            .finish()
    }
}

impl TypeMapper for RuleMapper {
    fn column_type(&self, field: &FieldDescriptor) -> Option<String> {
        self.column_type.as_ref().and_then(|f| f(field))
    }

    fn default_literal(&self, field: &FieldDescriptor, sql_type: &str) -> Option<String> {
        self.default_literal.as_ref().and_then(|f| f(field, sql_type))
    }

    fn scan_kind(&self, column_type: &str) -> Option<ScanKind> {
        self.scan_kind.as_ref().and_then(|f| f(column_type))
    }

    fn literal(&self, value: &Value) -> Option<String> {
        self.literal.as_ref().and_then(|f| f(value))
    }
}

static GLOBAL: OnceLock<Arc<MapperRegistry>> = OnceLock::new();

/// Ordered set of keyed mapping rules.
///
/// Registering under an existing key replaces that rule in place, keeping
/// its position. The registry is built at start-up and shared read-only
/// behind an `Arc` afterwards.
#[derive(Clone, Default)]
pub struct MapperRegistry {
    mappers: Vec<(String, Arc<dyn TypeMapper>)>,
}

impl MapperRegistry {
    /// Creates an empty registry. Nothing is mapped until rules are added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding only [`DefaultMapper`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new().with(DEFAULT_MAPPER, DefaultMapper)
    }

    /// Registers a rule, replacing any rule under the same key.
    pub fn register(&mut self, key: impl Into<String>, mapper: impl TypeMapper + 'static) {
        let key = key.into();
        let mapper: Arc<dyn TypeMapper> = Arc::new(mapper);
        match self.mappers.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = mapper,
            None => self.mappers.push((key, mapper)),
        }
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, mapper: impl TypeMapper + 'static) -> Self {
        self.register(key, mapper);
        self
    }

    /// Registered keys in consultation order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.mappers.iter().map(|(k, _)| k.as_str())
    }

    /// Column type of a field, or `None` when it is unmapped.
    #[must_use]
    pub fn resolve_column_type(&self, field: &FieldDescriptor) -> Option<String> {
        if let Some(db_type) = non_empty(field.db_type.as_deref()) {
            return Some(db_type.to_string());
        }
        self.mappers
            .iter()
            .find_map(|(_, m)| m.column_type(field).filter(|t| !t.is_empty()))
    }

    /// Default literal for a field whose column type is `sql_type`.
    #[must_use]
    pub fn resolve_default_literal(&self, field: &FieldDescriptor, sql_type: &str) -> Option<String> {
        if let Some(default) = non_empty(field.default.as_deref()) {
            return Some(default.to_string());
        }
        self.mappers
            .iter()
            .find_map(|(_, m)| m.default_literal(field, sql_type).filter(|l| !l.is_empty()))
    }

    /// Scan classification from a registered hook, if any.
    #[must_use]
    pub fn resolve_scan_kind(&self, column_type: &str) -> Option<ScanKind> {
        self.mappers.iter().find_map(|(_, m)| m.scan_kind(column_type))
    }

    /// Literal from a registered hook, if any.
    #[must_use]
    pub fn resolve_literal(&self, value: &Value) -> Option<String> {
        self.mappers
            .iter()
            .find_map(|(_, m)| m.literal(value).filter(|l| !l.is_empty()))
    }

    /// The process-wide registry. Holds the defaults unless
    /// [`install`](Self::install) ran first.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::with_defaults())))
    }

    /// Installs the process-wide registry. Call once at start-up, before
    /// any query traffic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryInitialized`] if a registry is already in
    /// place, including the default one created by an earlier
    /// [`global`](Self::global) call.
    pub fn install(registry: Self) -> Result<()> {
        GLOBAL
            .set(Arc::new(registry))
            .map_err(|_| Error::RegistryInitialized)
    }
}

impl fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
