//! Commands: what to run against which table.

use std::fmt;

use super::clause::{to_strings, QueryParam};
use super::filter::Filter;

/// Placeholder for the column list of an insert.
pub const FIELDS_TOKEN: &str = "{{FIELDS}}";
/// Placeholder for the literal list of an insert.
pub const VALUES_TOKEN: &str = "{{VALUES}}";
/// Placeholder for the `column=literal` list of an update.
pub const FIELD_VALUES_TOKEN: &str = "{{FIELDVALUES}}";

/// Kind of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `SELECT`, returns rows.
    Select,
    /// `INSERT`, needs a payload.
    Insert,
    /// `UPDATE`, needs a payload.
    Update,
    /// `DELETE`.
    Delete,
    /// Caller-written SQL, passed through.
    Sql,
}

impl CommandKind {
    /// Whether the command produces rows.
    #[must_use]
    pub const fn returns_rows(self) -> bool {
        matches!(self, Self::Select | Self::Sql)
    }

    /// Whether the command needs a data payload.
    #[must_use]
    pub const fn needs_payload(self) -> bool {
        matches!(self, Self::Insert | Self::Update)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "select"),
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Sql => write!(f, "sql"),
        }
    }
}

/// A command to compile and run.
///
/// ```
/// use oxide_pg::{Command, Filter};
///
/// let query = Command::select("articles")
///     .columns(&["id", "title"])
///     .filter(Filter::gte("score", 50))
///     .order_by(&["-created"])
///     .take(10);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    kind: CommandKind,
    table: String,
    sql: String,
    param: QueryParam,
    allowed_fields: Vec<String>,
}

impl Command {
    fn new(kind: CommandKind, table: &str) -> Self {
        Self {
            kind,
            table: table.to_string(),
            sql: String::new(),
            param: QueryParam::default(),
            allowed_fields: Vec::new(),
        }
    }

    /// Selects rows from `table`.
    #[must_use]
    pub fn select(table: &str) -> Self {
        Self::new(CommandKind::Select, table)
    }

    /// Inserts the payload into `table`.
    #[must_use]
    pub fn insert(table: &str) -> Self {
        Self::new(CommandKind::Insert, table)
    }

    /// Updates rows of `table` matching the filter.
    #[must_use]
    pub fn update(table: &str) -> Self {
        Self::new(CommandKind::Update, table)
    }

    /// Deletes rows of `table` matching the filter.
    #[must_use]
    pub fn delete(table: &str) -> Self {
        Self::new(CommandKind::Delete, table)
    }

    /// Runs `sql` as written.
    #[must_use]
    pub fn sql(sql: impl Into<String>) -> Self {
        let mut command = Self::new(CommandKind::Sql, "");
        command.sql = sql.into();
        command
    }

    /// Sets the projection of a select.
    #[must_use]
    pub fn columns(mut self, fields: &[&str]) -> Self {
        self.param.select = to_strings(fields);
        self
    }

    /// Sets the row filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.param.filter = Some(filter);
        self
    }

    /// Sets the sort keys; `-name` sorts descending.
    #[must_use]
    pub fn order_by(mut self, fields: &[&str]) -> Self {
        self.param.sort = to_strings(fields);
        self
    }

    /// Skips the first `n` rows.
    #[must_use]
    pub const fn skip(mut self, n: u64) -> Self {
        self.param.skip = n;
        self
    }

    /// Returns at most `n` rows; 0 is unbounded.
    #[must_use]
    pub const fn take(mut self, n: u64) -> Self {
        self.param.take = n;
        self
    }

    /// Groups by the given columns.
    #[must_use]
    pub fn group_by(mut self, fields: &[&str]) -> Self {
        self.param.group_by = to_strings(fields);
        self
    }

    /// Replaces all query parameters.
    #[must_use]
    pub fn param(mut self, param: QueryParam) -> Self {
        self.param = param;
        self
    }

    /// Restricts which payload columns an insert or update writes.
    /// Matching ignores case; the listed spelling is what gets emitted.
    #[must_use]
    pub fn allow_fields(mut self, fields: &[&str]) -> Self {
        self.allowed_fields = to_strings(fields);
        self
    }

    /// Command kind.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Target table; empty for raw SQL.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Raw SQL text; empty unless the kind is [`CommandKind::Sql`].
    #[must_use]
    pub fn raw_sql(&self) -> &str {
        &self.sql
    }

    /// Query parameters.
    #[must_use]
    pub const fn query(&self) -> &QueryParam {
        &self.param
    }

    /// Payload allow-list; empty writes every payload column.
    #[must_use]
    pub fn allowed_fields(&self) -> &[String] {
        &self.allowed_fields
    }
}

/// A command rendered to SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCommand {
    /// Kind of the source command.
    pub kind: CommandKind,
    /// Statement text.
    pub sql: String,
}
