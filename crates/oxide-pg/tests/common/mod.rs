#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use oxide_pg::schema::catalog::udt_name;
use oxide_pg::{
    ColumnInfo, Config, Connection, Error, MapperRegistry, PgDialect, RawValue, Result, RowSet,
    SqlConnection, Value,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// A live column as the fake engine tracks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeColumn {
    pub name: String,
    pub udt: String,
    pub nullable: bool,
}

/// In-memory stand-in for a Postgres connection.
///
/// Understands just enough DDL to keep a column catalog per table and
/// answers the catalog queries the reconciler sends. Everything else is
/// recorded and answered from `responses`.
#[derive(Debug, Default)]
pub struct FakeEngine {
    pub tables: BTreeMap<String, Vec<FakeColumn>>,
    /// Statements sent through `exec`, in order.
    pub executed: Vec<String>,
    /// Statements sent through `query_rows`, in order.
    pub queries: Vec<String>,
    /// `exec` fails for statements containing this text.
    pub fail_on: Option<String>,
    /// Every `query_rows` call fails.
    pub fail_queries: bool,
    /// Canned results for non-catalog queries.
    pub responses: VecDeque<RowSet>,
    pub in_tx: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: &str, columns: &[(&str, &str, bool)]) -> Self {
        let columns = columns
            .iter()
            .map(|(name, sql_type, nullable)| FakeColumn {
                name: name.to_string(),
                udt: udt_name(sql_type),
                nullable: *nullable,
            })
            .collect();
        self.tables.insert(table.to_lowercase(), columns);
        self
    }

    pub fn respond(&mut self, set: RowSet) {
        self.responses.push_back(set);
    }

    pub fn column(&self, table: &str, column: &str) -> Option<&FakeColumn> {
        self.tables
            .get(&table.to_lowercase())?
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
    }

    pub fn column_names(&self, table: &str) -> Vec<String> {
        self.tables
            .get(&table.to_lowercase())
            .map(|cols| cols.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Statements sent through `exec` that start with DDL keywords.
    pub fn ddl(&self) -> Vec<&str> {
        self.executed
            .iter()
            .map(String::as_str)
            .filter(|sql| {
                ["CREATE", "ALTER", "DROP"]
                    .iter()
                    .any(|kw| sql.starts_with(kw))
            })
            .collect()
    }

    fn catalog_count(&self, sql: &str) -> RowSet {
        let table = quoted_after(sql, "table_name = ").unwrap_or_default();
        let count = i64::from(self.tables.contains_key(&table));
        RowSet {
            columns: vec![ColumnInfo::new("count", "INT8")],
            rows: vec![vec![RawValue::Typed(Value::Int(count))]],
        }
    }

    fn catalog_columns(&self, sql: &str) -> RowSet {
        let table = quoted_after(sql, "table_name = ").unwrap_or_default();
        let rows = self
            .tables
            .get(&table)
            .map(|cols| {
                cols.iter()
                    .map(|c| {
                        vec![
                            RawValue::text(c.name.clone()),
                            RawValue::text(c.udt.clone()),
                            RawValue::text(if c.nullable { "YES" } else { "NO" }),
                        ]
                    })
                    .collect()
            })
            .unwrap_or_default();
        RowSet {
            columns: vec![
                ColumnInfo::new("column_name", "sql_identifier"),
                ColumnInfo::new("udt_name", "sql_identifier"),
                ColumnInfo::new("is_nullable", "yes_or_no"),
            ],
            rows,
        }
    }

    fn apply(&mut self, sql: &str) {
        if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            let open = rest.find('(').unwrap_or(rest.len());
            let table = rest[..open].trim().to_lowercase();
            let body = rest[open + 1..].trim_end();
            let body = body.strip_suffix(')').unwrap_or(body);
            let mut columns = Vec::new();
            let mut keys = Vec::new();
            for def in split_top_level(body) {
                match def.strip_prefix("PRIMARY KEY (") {
                    Some(list) => keys.extend(
                        list.trim_end_matches(')')
                            .split(',')
                            .map(|k| k.trim().to_string()),
                    ),
                    None => columns.push(parse_column(&def)),
                }
            }
            for column in &mut columns {
                if keys.contains(&column.name) {
                    column.nullable = false;
                }
            }
            self.tables.insert(table, columns);
        } else if let Some(rest) = sql.strip_prefix("ALTER TABLE ") {
            let (table, actions) = rest.split_once(' ').unwrap_or((rest, ""));
            let table = table.to_lowercase();
            for action in split_top_level(actions) {
                self.apply_action(&table, &action);
            }
        } else if let Some(table) = sql.strip_prefix("DROP TABLE IF EXISTS ") {
            self.tables.remove(&table.trim().to_lowercase());
        }
    }

    fn apply_action(&mut self, table: &str, action: &str) {
        let Some(columns) = self.tables.get_mut(table) else {
            return;
        };
        if let Some(rest) = action.strip_prefix("ADD COLUMN ") {
            columns.push(parse_column(rest));
        } else if let Some(rest) = action.strip_prefix("DROP COLUMN ") {
            let name = rest.trim().trim_matches('"');
            columns.retain(|c| !c.name.eq_ignore_ascii_case(name));
        } else if let Some(rest) = action.strip_prefix("ALTER COLUMN ") {
            if let Some((name, sql_type)) = rest.split_once(" TYPE ") {
                if let Some(column) = columns
                    .iter_mut()
                    .find(|c| c.name.eq_ignore_ascii_case(name.trim().trim_matches('"')))
                {
                    column.udt = udt_name(sql_type);
                }
            }
        }
    }
}

impl SqlConnection for FakeEngine {
    async fn query_rows(&mut self, sql: &str) -> Result<RowSet> {
        self.queries.push(sql.to_string());
        if self.fail_queries {
            return Err(Error::Database(sqlx::Error::Protocol(
                "connection reset".to_string(),
            )));
        }
        if sql.contains("information_schema.tables") {
            return Ok(self.catalog_count(sql));
        }
        if sql.contains("information_schema.columns") {
            return Ok(self.catalog_columns(sql));
        }
        Ok(self.responses.pop_front().unwrap_or_default())
    }

    async fn exec(&mut self, sql: &str) -> Result<u64> {
        self.executed.push(sql.to_string());
        if let Some(pattern) = &self.fail_on {
            if sql.contains(pattern.as_str()) {
                return Err(Error::Database(sqlx::Error::Protocol(format!(
                    "syntax error near \"{pattern}\""
                ))));
            }
        }
        self.apply(sql);
        Ok(1)
    }

    async fn begin(&mut self) -> Result<()> {
        self.in_tx = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.in_tx = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.in_tx = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }
}

fn quoted_after(sql: &str, marker: &str) -> Option<String> {
    let start = sql.find(marker)? + marker.len();
    let rest = sql[start..].strip_prefix('\'')?;
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}

/// Splits on commas outside parentheses and quotes.
fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quoted = false;
    for c in text.chars() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn parse_column(definition: &str) -> FakeColumn {
    let mut tokens = definition.split_whitespace();
    let name = tokens.next().unwrap_or_default().to_string();
    let sql_type: Vec<&str> = tokens
        .take_while(|t| !matches!(*t, "NOT" | "PRIMARY" | "DEFAULT"))
        .collect();
    FakeColumn {
        name,
        udt: udt_name(&sql_type.join(" ")),
        nullable: !definition.contains("NOT NULL") && !definition.contains("PRIMARY KEY"),
    }
}

/// Routes log output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .without_time()
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn dialect() -> PgDialect {
    PgDialect::with_registry(Arc::new(MapperRegistry::with_defaults()))
}

pub fn connection(engine: FakeEngine) -> Connection<FakeEngine> {
    init_tracing();
    Connection::with_dialect(engine, dialect())
}

pub fn pruning_connection(engine: FakeEngine) -> Connection<FakeEngine> {
    init_tracing();
    Connection::with_dialect(
        engine,
        dialect().with_config(Config::default().prune_orphan_columns(true)),
    )
}

/// A result set whose values are all text buffers, the way the simple
/// query protocol delivers them.
pub fn text_rows(columns: &[(&str, &str)], rows: &[&[Option<&str>]]) -> RowSet {
    RowSet {
        columns: columns
            .iter()
            .map(|(name, type_name)| ColumnInfo::new(*name, *type_name))
            .collect(),
        rows: rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| v.map_or(RawValue::Null, RawValue::text))
                    .collect()
            })
            .collect(),
    }
}
