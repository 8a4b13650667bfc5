//! Schema reconciliation.
//!
//! Compares the fields of a record with the live catalog of its table and
//! plans the DDL that makes the table match: a `CREATE TABLE` when the
//! table is missing, a single `ALTER TABLE` with one action per difference
//! otherwise, or nothing at all. Planning is pure; the executor runs the
//! statements.

pub mod catalog;

use std::collections::HashSet;
use std::fmt;

use tracing::warn;

use crate::coder::quote;
use crate::dialect::PgDialect;
use crate::error::{Error, Result};
use crate::record::{validate_fields, FieldDescriptor};

pub use catalog::{CatalogEntry, TableCatalog};

/// Plans table and index DDL.
pub trait Reconciler {
    /// Plans the statements that converge `table` on `fields`.
    ///
    /// `catalog` is `None` when the table does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StructuralType`] for the first unmapped field, or
    /// [`Error::DuplicateColumn`]. Nothing is planned in either case.
    fn plan_table(
        &self,
        table: &str,
        keys: &[&str],
        fields: &[FieldDescriptor],
        catalog: Option<&TableCatalog>,
    ) -> Result<SchemaPlan>;

    /// Plans the statements that (re)build an index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandShape`] for an index without fields.
    fn plan_index(&self, table: &str, index: &IndexSpec) -> Result<Vec<String>>;
}

/// Outcome of planning a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaPlan {
    /// The table is missing; holds the `CREATE TABLE` statement.
    Create(String),
    /// The table exists and differs.
    Alter {
        /// Table name.
        table: String,
        /// Differences, in field order followed by orphan drops.
        actions: Vec<AlterAction>,
    },
    /// The table already matches.
    Unchanged,
}

impl SchemaPlan {
    /// Statements to execute, in order. Empty for [`SchemaPlan::Unchanged`].
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        match self {
            Self::Create(sql) => vec![sql.clone()],
            Self::Alter { table, actions } => {
                let actions: Vec<String> = actions.iter().map(ToString::to_string).collect();
                vec![format!("ALTER TABLE {table} {}", actions.join(", "))]
            }
            Self::Unchanged => Vec::new(),
        }
    }

    /// Returns `true` when no DDL is needed.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// One action of an `ALTER TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterAction {
    /// `ALTER COLUMN <column> TYPE <sql_type>`.
    AlterType {
        /// Column name.
        column: String,
        /// New SQL type.
        sql_type: String,
    },
    /// `ADD COLUMN <column> <definition>`.
    AddColumn {
        /// Column name.
        column: String,
        /// Type followed by any `NOT NULL` / `DEFAULT` clause.
        definition: String,
    },
    /// `DROP COLUMN <column>`.
    DropColumn {
        /// Column name.
        column: String,
    },
}

impl fmt::Display for AlterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlterType { column, sql_type } => {
                write!(f, "ALTER COLUMN {column} TYPE {sql_type}")
            }
            Self::AddColumn { column, definition } => write!(f, "ADD COLUMN {column} {definition}"),
            Self::DropColumn { column } => write!(f, "DROP COLUMN {column}"),
        }
    }
}

/// A declarative index definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Short name; the full name is derived from the table.
    pub name: String,
    /// `CREATE UNIQUE INDEX` when set.
    pub unique: bool,
    /// Column names or dotted JSON paths; a leading `-` sorts descending.
    pub fields: Vec<String>,
}

impl IndexSpec {
    /// Creates a non-unique index over `fields`.
    #[must_use]
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            unique: false,
            fields: fields.iter().map(ToString::to_string).collect(),
        }
    }

    /// Makes the index unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

// ================================================================
// Postgres implementation
// ================================================================

/// A column name read from the catalog, double-quoted unless it is a plain
/// lower-case identifier that folds to itself.
fn catalog_ident(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// A field with its resolved column type.
struct Column<'a> {
    field: &'a FieldDescriptor,
    sql_type: String,
}

impl PgDialect {
    fn resolve_columns<'a>(&self, fields: &'a [FieldDescriptor]) -> Result<Vec<Column<'a>>> {
        validate_fields(fields)?;
        fields
            .iter()
            .map(|field| {
                let sql_type = self.registry().resolve_column_type(field).ok_or_else(|| {
                    Error::StructuralType {
                        field: field.name.clone(),
                        rust_type: field.native_type.to_string(),
                    }
                })?;
                Ok(Column { field, sql_type })
            })
            .collect()
    }

    /// `NOT NULL [DEFAULT <literal>]` for columns that cannot hold NULL.
    fn null_clause(&self, column: &Column<'_>) -> Option<String> {
        let field = column.field;
        if !field.required && field.native_type.is_optional() {
            return None;
        }
        Some(
            self.registry()
                .resolve_default_literal(field, &column.sql_type)
                .map_or_else(
                    || "NOT NULL".to_string(),
                    |literal| format!("NOT NULL DEFAULT {literal}"),
                ),
        )
    }

    /// Column definition; `is_key` columns get an inline `PRIMARY KEY` only
    /// when they are the sole key column.
    fn column_definition(&self, column: &Column<'_>, is_key: bool, composite: bool) -> String {
        let mut sql = format!("{} {}", column.field.sql_name(), column.sql_type);
        if is_key {
            if !composite {
                sql.push_str(" PRIMARY KEY");
            }
        } else if let Some(clause) = self.null_clause(column) {
            sql.push(' ');
            sql.push_str(&clause);
        }
        sql
    }

    fn create_table_sql(&self, table: &str, keys: &[&str], columns: &[Column<'_>]) -> String {
        let key_columns: Vec<String> = columns
            .iter()
            .filter(|c| c.field.is_key || c.field.matches_key(keys))
            .map(|c| c.field.sql_name())
            .collect();
        let composite = key_columns.len() > 1;
        let mut definitions: Vec<String> = columns
            .iter()
            .map(|c| {
                let is_key = c.field.is_key || c.field.matches_key(keys);
                self.column_definition(c, is_key, composite)
            })
            .collect();
        if composite {
            definitions.push(format!("PRIMARY KEY ({})", key_columns.join(", ")));
        }
        format!("CREATE TABLE {table} ({})", definitions.join(", "))
    }

    fn alter_actions(
        &self,
        table: &str,
        columns: &[Column<'_>],
        catalog: &TableCatalog,
    ) -> Vec<AlterAction> {
        let mut actions = Vec::new();
        let mut seen = HashSet::new();

        for column in columns {
            let name = column.field.sql_name();
            match catalog.get(&name) {
                Some(entry) => {
                    seen.insert(entry.column_name.to_lowercase());
                    // Only the udt name is compared; precision modifiers are not in
                    // the catalog, so numeric(32,8) and numeric(64,8) are the same type.
                    if catalog::udt_name(&column.sql_type) != catalog::udt_name(&entry.udt_name) {
                        actions.push(AlterAction::AlterType {
                            column: catalog_ident(&entry.column_name),
                            sql_type: column.sql_type.clone(),
                        });
                    }
                    if column.field.required && entry.is_nullable {
                        warn!(
                            table = %table,
                            column = %name,
                            "Required field maps to a nullable column"
                        );
                    }
                }
                None => {
                    let definition = self.null_clause(column).map_or_else(
                        || column.sql_type.clone(),
                        |clause| format!("{} {clause}", column.sql_type),
                    );
                    actions.push(AlterAction::AddColumn {
                        column: name,
                        definition,
                    });
                }
            }
        }

        for entry in catalog.entries() {
            if seen.contains(&entry.column_name.to_lowercase()) {
                continue;
            }
            if self.config().prune_orphan_columns {
                actions.push(AlterAction::DropColumn {
                    column: catalog_ident(&entry.column_name),
                });
            } else {
                warn!(
                    table = %table,
                    column = %entry.column_name,
                    "Column is not declared by the record, leaving it in place"
                );
            }
        }

        actions
    }

    fn index_expression(field: &str) -> String {
        let (field, descending) = field
            .strip_prefix('-')
            .map_or((field, false), |rest| (rest, true));
        let mut parts = field.split('.');
        let mut expr = parts.next().unwrap_or(field).to_lowercase();
        let path: Vec<&str> = parts.collect();
        if let Some((last, middle)) = path.split_last() {
            expr = format!("({expr}");
            for key in middle {
                expr.push_str("->");
                expr.push_str(&quote(key));
            }
            expr.push_str("->>");
            expr.push_str(&quote(last));
            expr.push(')');
        }
        if descending {
            expr.push_str(" DESC");
        }
        expr
    }

    /// Full index name: `<prefix>_<table>_<name>`, lower-cased, with
    /// anything but letters, digits and `_` replaced by `_`.
    #[must_use]
    pub fn index_name(&self, table: &str, name: &str) -> String {
        format!("{}_{table}_{name}", self.config().index_prefix)
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect()
    }
}

impl Reconciler for PgDialect {
    fn plan_table(
        &self,
        table: &str,
        keys: &[&str],
        fields: &[FieldDescriptor],
        catalog: Option<&TableCatalog>,
    ) -> Result<SchemaPlan> {
        let columns = self.resolve_columns(fields)?;
        let Some(catalog) = catalog else {
            return Ok(SchemaPlan::Create(self.create_table_sql(table, keys, &columns)));
        };
        let actions = self.alter_actions(table, &columns, catalog);
        if actions.is_empty() {
            Ok(SchemaPlan::Unchanged)
        } else {
            Ok(SchemaPlan::Alter {
                table: table.to_string(),
                actions,
            })
        }
    }

    fn plan_index(&self, table: &str, index: &IndexSpec) -> Result<Vec<String>> {
        if index.fields.is_empty() {
            return Err(Error::CommandShape(format!(
                "index '{}' has no fields",
                index.name
            )));
        }
        let name = self.index_name(table, &index.name);
        let expressions: Vec<String> = index
            .fields
            .iter()
            .map(|f| Self::index_expression(f))
            .collect();
        let unique = if index.unique { "UNIQUE " } else { "" };
        Ok(vec![
            format!("DROP INDEX IF EXISTS {name}"),
            format!(
                "CREATE {unique}INDEX {name} ON {table} ({})",
                expressions.join(", ")
            ),
        ])
    }
}
