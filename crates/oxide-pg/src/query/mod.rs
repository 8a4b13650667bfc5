//! Query compilation.
//!
//! Filter trees, clause fragments and commands are turned into SQL text
//! here. Values are always spliced in as escaped literals.

pub mod clause;
pub mod command;
pub mod filter;

use crate::coder::ValueCoder;
use crate::dialect::PgDialect;
use crate::error::{Error, Result};
use crate::value::Row;

pub use clause::{ClauseSet, QueryParam};
pub use command::{Command, CommandKind, CompiledCommand};
pub use filter::{CompareOp, Filter};

use command::{FIELDS_TOKEN, FIELD_VALUES_TOKEN, VALUES_TOKEN};

/// Compiles filters, clauses and commands to SQL.
pub trait FilterCompiler {
    /// Renders a filter as a boolean expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilter`] for mixed `In` / `NotIn` lists and
    /// ordering comparisons against NULL.
    fn compile_filter(&self, filter: &Filter) -> Result<String>;

    /// Compiles every clause of a query.
    ///
    /// # Errors
    ///
    /// Propagates filter errors.
    fn compile_clauses(&self, param: &QueryParam) -> Result<ClauseSet>;

    /// Compiles a command with its optional payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandShape`] when an insert or update has no
    /// payload, or nothing is left of it after the allow-list.
    fn compile_command(&self, command: &Command, data: Option<&Row>) -> Result<CompiledCommand>;

    /// Compiles `SELECT count(*) AS count` over the command's table and
    /// filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandShape`] for raw SQL commands.
    fn compile_count(&self, command: &Command) -> Result<String>;
}

impl PgDialect {
    fn where_clause(&self, command: &Command) -> Result<String> {
        let sql = match &command.query().filter {
            Some(filter) => self.render_filter(filter)?,
            None => String::new(),
        };
        Ok(if sql.is_empty() {
            sql
        } else {
            format!("WHERE {sql}")
        })
    }

    /// Payload columns after the allow-list, in output order.
    fn payload<'a>(&self, command: &'a Command, data: &'a Row) -> Vec<(&'a str, String)> {
        let allowed = command.allowed_fields();
        if allowed.is_empty() {
            return data
                .iter()
                .map(|(column, value)| (column, self.to_literal(value)))
                .collect();
        }
        allowed
            .iter()
            .filter_map(|name| {
                data.get_ci(name)
                    .map(|value| (name.as_str(), self.to_literal(value)))
            })
            .collect()
    }
}

impl FilterCompiler for PgDialect {
    fn compile_filter(&self, filter: &Filter) -> Result<String> {
        self.render_filter(filter)
    }

    fn compile_clauses(&self, param: &QueryParam) -> Result<ClauseSet> {
        let where_sql = match &param.filter {
            Some(filter) => self.render_filter(filter)?,
            None => String::new(),
        };
        Ok(ClauseSet {
            select_fields: clause::projection(&param.select),
            where_sql: if where_sql.is_empty() {
                where_sql
            } else {
                format!("WHERE {where_sql}")
            },
            sort_sql: clause::order_by(&param.sort),
            skip_sql: clause::skip(param.skip),
            take_sql: clause::take(param.take),
            group_sql: clause::group_by(&param.group_by),
        })
    }

    fn compile_command(&self, command: &Command, data: Option<&Row>) -> Result<CompiledCommand> {
        let kind = command.kind();
        let table = command.table();
        if kind != CommandKind::Sql && table.trim().is_empty() {
            return Err(Error::CommandShape(format!("{kind} command has no table")));
        }

        let sql = match kind {
            CommandKind::Sql => {
                if command.raw_sql().trim().is_empty() {
                    return Err(Error::CommandShape("sql command has no text".to_string()));
                }
                command.raw_sql().to_string()
            }
            CommandKind::Select => self.compile_clauses(command.query())?.select_sql(table),
            CommandKind::Delete => {
                join_clause(format!("DELETE FROM {table}"), &self.where_clause(command)?)
            }
            CommandKind::Insert | CommandKind::Update => {
                let data = data.ok_or_else(|| {
                    Error::CommandShape(format!("{kind} on '{table}' needs a data payload"))
                })?;
                let payload = self.payload(command, data);
                if payload.is_empty() {
                    return Err(Error::CommandShape(format!(
                        "{kind} on '{table}' has no fields to write"
                    )));
                }
                if kind == CommandKind::Insert {
                    let fields: Vec<&str> = payload.iter().map(|(f, _)| *f).collect();
                    let values: Vec<&str> = payload.iter().map(|(_, v)| v.as_str()).collect();
                    format!("INSERT INTO {table} ({FIELDS_TOKEN}) VALUES ({VALUES_TOKEN})")
                        .replacen(FIELDS_TOKEN, &fields.join(","), 1)
                        .replacen(VALUES_TOKEN, &values.join(","), 1)
                } else {
                    let assignments: Vec<String> =
                        payload.iter().map(|(f, v)| format!("{f}={v}")).collect();
                    let template = join_clause(
                        format!("UPDATE {table} SET {FIELD_VALUES_TOKEN}"),
                        &self.where_clause(command)?,
                    );
                    template.replacen(FIELD_VALUES_TOKEN, &assignments.join(","), 1)
                }
            }
        };
        Ok(CompiledCommand { kind, sql })
    }

    fn compile_count(&self, command: &Command) -> Result<String> {
        if command.kind() == CommandKind::Sql {
            return Err(Error::CommandShape(
                "count needs a table command, not raw sql".to_string(),
            ));
        }
        Ok(join_clause(
            format!("SELECT count(*) AS count FROM {}", command.table()),
            &self.where_clause(command)?,
        ))
    }
}

fn join_clause(mut sql: String, clause: &str) -> String {
    if !clause.is_empty() {
        sql.push(' ');
        sql.push_str(clause);
    }
    sql
}
