//! Connection wrapper running reconciliation, commands and queries.

use tracing::{debug, info};

use crate::dialect::PgDialect;
use crate::error::{Error, Result};
use crate::query::{Command, CommandKind, FilterCompiler};
use crate::record::{FieldDescriptor, Record};
use crate::schema::catalog::{self, TableCatalog};
use crate::schema::{IndexSpec, Reconciler, SchemaPlan};
use crate::value::Row;

use super::{Cursor, SqlConnection};

/// A [`SqlConnection`] paired with the dialect that generates its SQL.
///
/// Every operation runs to completion before returning; statements go
/// through the open transaction when there is one.
#[derive(Debug)]
pub struct Connection<C> {
    conn: C,
    dialect: PgDialect,
}

impl<C: SqlConnection> Connection<C> {
    /// Wraps a connection with the default dialect.
    #[must_use]
    pub fn new(conn: C) -> Self {
        Self::with_dialect(conn, PgDialect::new())
    }

    /// Wraps a connection with the given dialect.
    #[must_use]
    pub const fn with_dialect(conn: C, dialect: PgDialect) -> Self {
        Self { conn, dialect }
    }

    /// The dialect.
    #[must_use]
    pub const fn dialect(&self) -> &PgDialect {
        &self.dialect
    }

    /// The wrapped connection.
    #[must_use]
    pub const fn inner(&self) -> &C {
        &self.conn
    }

    /// Mutable access to the wrapped connection.
    pub const fn inner_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Unwraps the connection.
    #[must_use]
    pub fn into_inner(self) -> C {
        self.conn
    }

    async fn query(&mut self, sql: &str) -> Result<Cursor> {
        debug!(sql = %sql, "Executing query");
        let set = self.conn.query_rows(sql).await?;
        Ok(Cursor::new(set, self.dialect.clone()))
    }

    async fn run_ddl(&mut self, statements: &[String]) -> Result<()> {
        for sql in statements {
            debug!(sql = %sql, "Executing SQL");
            self.conn
                .exec(sql)
                .await
                .map_err(|e| Error::DdlExecution {
                    statement: sql.clone(),
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }

    /// Whether `table` exists in the current schema.
    ///
    /// # Errors
    ///
    /// Returns the engine error, or a coercion error for an unexpected
    /// reply.
    pub async fn has_table(&mut self, table: &str) -> Result<bool> {
        let mut cursor = self.query(&catalog::table_exists_query(table)).await?;
        match cursor.fetch() {
            Some(row) => Ok(row?.get_as::<i64>("count")? > 0),
            None => Ok(false),
        }
    }

    /// Reads the live catalog of `table`; `None` when it does not exist.
    async fn introspect(&mut self, table: &str) -> Result<Option<TableCatalog>> {
        if !self.has_table(table).await? {
            return Ok(None);
        }
        let rows = self
            .query(&catalog::columns_query(table))
            .await?
            .fetch_all()?;
        catalog::catalog_from_rows(&rows).map(Some)
    }

    /// Creates or alters `table` to match the record type `T`.
    ///
    /// # Errors
    ///
    /// See [`ensure_table_with`](Self::ensure_table_with).
    pub async fn ensure_table<T: Record>(
        &mut self,
        table: &str,
        keys: &[&str],
    ) -> Result<SchemaPlan> {
        self.ensure_table_with(table, keys, T::schema().fields()).await
    }

    /// Creates or alters `table` to match `fields` and returns the plan
    /// that was applied.
    ///
    /// The catalog is read fresh on every call. A second call with the
    /// same fields finds nothing to do and issues no DDL.
    ///
    /// # Errors
    ///
    /// - [`Error::SchemaIntrospection`] when the catalog cannot be read.
    /// - [`Error::StructuralType`] / [`Error::DuplicateColumn`] before any
    ///   DDL is sent.
    /// - [`Error::DdlExecution`] carrying the failing statement.
    pub async fn ensure_table_with(
        &mut self,
        table: &str,
        keys: &[&str],
        fields: &[FieldDescriptor],
    ) -> Result<SchemaPlan> {
        let catalog = self
            .introspect(table)
            .await
            .map_err(|e| Error::SchemaIntrospection {
                table: table.to_string(),
                source: Box::new(e),
            })?;
        let plan = self
            .dialect
            .plan_table(table, keys, fields, catalog.as_ref())?;
        match &plan {
            SchemaPlan::Create(_) => info!(table = %table, "Creating table"),
            SchemaPlan::Alter { actions, .. } => {
                info!(table = %table, changes = actions.len(), "Altering table");
            }
            SchemaPlan::Unchanged => debug!(table = %table, "Table is up to date"),
        }
        self.run_ddl(&plan.statements()).await?;
        Ok(plan)
    }

    /// Drops and recreates an index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandShape`] for an index without fields or
    /// [`Error::DdlExecution`] for a failing statement.
    pub async fn ensure_index(&mut self, table: &str, index: &IndexSpec) -> Result<()> {
        let statements = self.dialect.plan_index(table, index)?;
        info!(table = %table, index = %index.name, "Rebuilding index");
        self.run_ddl(&statements).await
    }

    /// Drops `table` if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DdlExecution`] when the statement fails.
    pub async fn drop_table(&mut self, table: &str) -> Result<()> {
        info!(table = %table, "Dropping table");
        self.run_ddl(&[format!("DROP TABLE IF EXISTS {table}")]).await
    }

    /// Runs an insert, update, delete or raw statement and returns the
    /// number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandShape`] for selects and for inserts or
    /// updates without payload, otherwise the engine error.
    pub async fn execute(&mut self, command: &Command, data: Option<&Row>) -> Result<u64> {
        if command.kind() == CommandKind::Select {
            return Err(Error::CommandShape(
                "select commands return rows, open a cursor instead".to_string(),
            ));
        }
        let compiled = self.dialect.compile_command(command, data)?;
        debug!(sql = %compiled.sql, kind = %compiled.kind, "Executing SQL");
        self.conn.exec(&compiled.sql).await
    }

    /// Inserts a record into `table`.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn insert<T: Record>(&mut self, table: &str, record: &T) -> Result<u64> {
        self.execute(&Command::insert(table), Some(&record.to_row()))
            .await
    }

    /// Runs a select or raw query and returns a cursor over its rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandShape`] for commands that return no rows.
    pub async fn cursor(&mut self, command: &Command) -> Result<Cursor> {
        if !command.kind().returns_rows() {
            return Err(Error::CommandShape(format!(
                "{} commands return no rows",
                command.kind()
            )));
        }
        let compiled = self.dialect.compile_command(command, None)?;
        self.query(&compiled.sql).await
    }

    /// Counts the rows matching the command's table and filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandShape`] for raw SQL commands.
    pub async fn count(&mut self, command: &Command) -> Result<i64> {
        let sql = self.dialect.compile_count(command)?;
        let mut cursor = self.query(&sql).await?;
        match cursor.fetch() {
            Some(row) => row?.get_as("count"),
            None => Ok(0),
        }
    }

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionState`] when one is already open.
    pub async fn begin(&mut self) -> Result<()> {
        if self.conn.in_transaction() {
            return Err(Error::TransactionState(
                "begin called inside a transaction".to_string(),
            ));
        }
        debug!("Beginning transaction");
        self.conn.begin().await
    }

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionState`] when none is open.
    pub async fn commit(&mut self) -> Result<()> {
        if !self.conn.in_transaction() {
            return Err(Error::TransactionState(
                "commit called outside a transaction".to_string(),
            ));
        }
        debug!("Committing transaction");
        self.conn.commit().await
    }

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionState`] when none is open.
    pub async fn rollback(&mut self) -> Result<()> {
        if !self.conn.in_transaction() {
            return Err(Error::TransactionState(
                "rollback called outside a transaction".to_string(),
            ));
        }
        debug!("Rolling back transaction");
        self.conn.rollback().await
    }

    /// Whether a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.conn.in_transaction()
    }
}
