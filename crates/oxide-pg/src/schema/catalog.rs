//! Live column catalog of a table.

use indexmap::IndexMap;

use crate::coder::quote;
use crate::error::{Error, Result};
use crate::value::Row;

/// One live column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Column name.
    pub column_name: String,
    /// Underlying type name (`int8`, `text`, `numeric`, ...).
    pub udt_name: String,
    /// Whether the column accepts NULL.
    pub is_nullable: bool,
}

impl CatalogEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(column_name: impl Into<String>, udt_name: impl Into<String>, is_nullable: bool) -> Self {
        Self {
            column_name: column_name.into(),
            udt_name: udt_name.into(),
            is_nullable,
        }
    }

    /// Reads an entry from a scanned catalog row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Coercion`] when a catalog column is missing or of
    /// the wrong type.
    pub fn from_row(row: &Row) -> Result<Self> {
        let nullable: String = row.get_as("is_nullable")?;
        Ok(Self {
            column_name: row.get_as("column_name")?,
            udt_name: row.get_as("udt_name")?,
            is_nullable: nullable.eq_ignore_ascii_case("yes"),
        })
    }
}

/// The live columns of one table, keyed by lower-cased name in ordinal
/// order. Fetched fresh for every reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCatalog {
    entries: IndexMap<String, CatalogEntry>,
}

impl TableCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    pub fn insert(&mut self, entry: CatalogEntry) {
        self.entries.insert(entry.column_name.to_lowercase(), entry);
    }

    /// Looks up a column, ignoring case.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&CatalogEntry> {
        self.entries.get(&column.to_lowercase())
    }

    /// Entries in ordinal order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the table reported no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<CatalogEntry> for TableCatalog {
    fn from_iter<I: IntoIterator<Item = CatalogEntry>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for entry in iter {
            catalog.insert(entry);
        }
        catalog
    }
}

/// Query listing a table's columns in ordinal order.
#[must_use]
pub fn columns_query(table: &str) -> String {
    format!(
        "SELECT column_name, udt_name, is_nullable FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = {} ORDER BY ordinal_position",
        quote(&table.to_lowercase())
    )
}

/// Query counting tables with the given name in the current schema.
#[must_use]
pub fn table_exists_query(table: &str) -> String {
    format!(
        "SELECT count(*) AS count FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name = {}",
        quote(&table.to_lowercase())
    )
}

/// Normalises a type name to the engine's `udt_name` spelling so declared
/// types compare equal to catalog entries.
///
/// Length and precision modifiers are dropped; `text[]` becomes `_text`.
#[must_use]
pub fn udt_name(sql_type: &str) -> String {
    let lower = sql_type.trim().to_lowercase();
    if let Some(element) = lower.strip_suffix("[]") {
        return format!("_{}", udt_name(element));
    }
    let base = lower.find('(').map_or_else(
        || lower.clone(),
        |open| {
            let close = lower[open..].find(')').map_or(lower.len(), |i| open + i + 1);
            format!("{}{}", lower[..open].trim_end(), &lower[close..])
        },
    );
    let normalized = match base.trim() {
        "bigint" | "int8" | "bigserial" | "serial8" => "int8",
        "integer" | "int" | "int4" | "serial" | "serial4" => "int4",
        "smallint" | "int2" | "smallserial" | "serial2" => "int2",
        "boolean" | "bool" => "bool",
        "numeric" | "decimal" => "numeric",
        "double precision" | "float8" | "float" => "float8",
        "real" | "float4" => "float4",
        "character varying" | "varchar" => "varchar",
        "character" | "char" | "bpchar" => "bpchar",
        "timestamptz" | "timestamp with time zone" => "timestamptz",
        "timestamp" | "timestamp without time zone" => "timestamp",
        "timetz" | "time with time zone" => "timetz",
        "time" | "time without time zone" => "time",
        other => return other.to_string(),
    };
    normalized.to_string()
}

/// Reads a catalog from scanned rows.
///
/// # Errors
///
/// Returns the first row conversion error.
pub fn catalog_from_rows<'a>(rows: impl IntoIterator<Item = &'a Row>) -> Result<TableCatalog> {
    rows.into_iter()
        .map(CatalogEntry::from_row)
        .collect::<Result<TableCatalog>>()
        .map_err(|e| match e {
            Error::Coercion { column, message } => Error::Coercion {
                column,
                message: format!("catalog row: {message}"),
            },
            other => other,
        })
}
