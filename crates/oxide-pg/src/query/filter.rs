//! Filter trees and their SQL rendering.

use std::fmt;

use crate::coder::{quote, ValueCoder};
use crate::dialect::PgDialect;
use crate::error::{Error, Result};
use crate::value::{ToValue, Value};

/// A filter expression.
///
/// ```
/// use oxide_pg::Filter;
///
/// let filter = Filter::and([
///     Filter::eq("status", "active"),
///     Filter::gte("age", 18),
///     Filter::in_list("color", ["red", "blue"]),
/// ]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// All children hold.
    And(Vec<Filter>),
    /// Any child holds.
    Or(Vec<Filter>),
    /// `field <op> value`.
    Compare {
        /// Column name.
        field: String,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand side.
        value: Value,
    },
    /// Field equals one of the values.
    In {
        /// Column name.
        field: String,
        /// Candidates.
        values: Vec<Value>,
    },
    /// Field equals none of the values.
    NotIn {
        /// Column name.
        field: String,
        /// Excluded values.
        values: Vec<Value>,
    },
    /// `field between low and high`.
    Range {
        /// Column name.
        field: String,
        /// Inclusive lower bound.
        low: Value,
        /// Inclusive upper bound.
        high: Value,
    },
    /// Case-insensitive substring match.
    Contains {
        /// Column name.
        field: String,
        /// Substring.
        value: String,
    },
    /// Case-insensitive `ilike '<value>%'` match.
    EndsWith {
        /// Column name.
        field: String,
        /// Pattern text.
        value: String,
    },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (=)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "!="),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
        }
    }
}

impl Filter {
    fn compare(field: &str, op: CompareOp, value: impl ToValue) -> Self {
        Self::Compare {
            field: field.to_string(),
            op,
            value: value.to_value(),
        }
    }

    /// `field = value`.
    #[must_use]
    pub fn eq(field: &str, value: impl ToValue) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// `field != value`, or `not like` for text.
    #[must_use]
    pub fn ne(field: &str, value: impl ToValue) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    /// `field > value`.
    #[must_use]
    pub fn gt(field: &str, value: impl ToValue) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    /// `field >= value`.
    #[must_use]
    pub fn gte(field: &str, value: impl ToValue) -> Self {
        Self::compare(field, CompareOp::Gte, value)
    }

    /// `field < value`.
    #[must_use]
    pub fn lt(field: &str, value: impl ToValue) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    /// `field <= value`.
    #[must_use]
    pub fn lte(field: &str, value: impl ToValue) -> Self {
        Self::compare(field, CompareOp::Lte, value)
    }

    /// Field matches any of `values`.
    #[must_use]
    pub fn in_list<V: ToValue>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::In {
            field: field.to_string(),
            values: values.into_iter().map(|v| v.to_value()).collect(),
        }
    }

    /// Field matches none of `values`.
    #[must_use]
    pub fn not_in<V: ToValue>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::NotIn {
            field: field.to_string(),
            values: values.into_iter().map(|v| v.to_value()).collect(),
        }
    }

    /// `field between low and high`.
    #[must_use]
    pub fn range(field: &str, low: impl ToValue, high: impl ToValue) -> Self {
        Self::Range {
            field: field.to_string(),
            low: low.to_value(),
            high: high.to_value(),
        }
    }

    /// `field ilike '%value%'`.
    #[must_use]
    pub fn contains(field: &str, value: impl Into<String>) -> Self {
        Self::Contains {
            field: field.to_string(),
            value: value.into(),
        }
    }

    /// `field ilike 'value%'`.
    #[must_use]
    pub fn ends_with(field: &str, value: impl Into<String>) -> Self {
        Self::EndsWith {
            field: field.to_string(),
            value: value.into(),
        }
    }

    /// Conjunction of `filters`.
    #[must_use]
    pub fn and(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Disjunction of `filters`.
    #[must_use]
    pub fn or(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::Or(filters.into_iter().collect())
    }
}

// ================================================================
// Rendering
// ================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    And,
    Or,
}

impl Connective {
    const fn separator(self) -> &'static str {
        match self {
            Self::And => " and ",
            Self::Or => " or ",
        }
    }
}

/// Rendered SQL plus the connective at its top level, if it is a chain.
struct Rendered {
    sql: String,
    chain: Option<Connective>,
}

impl Rendered {
    const fn leaf(sql: String) -> Self {
        Self { sql, chain: None }
    }

    fn join(parts: &[String], connective: Connective) -> Self {
        let chain = (parts.len() > 1).then_some(connective);
        Self {
            sql: parts.join(connective.separator()),
            chain,
        }
    }
}

impl PgDialect {
    /// Renders a filter as a boolean SQL expression. Empty groups render
    /// as an empty string.
    pub(crate) fn render_filter(&self, filter: &Filter) -> Result<String> {
        self.render(filter).map(|r| r.sql)
    }

    fn render(&self, filter: &Filter) -> Result<Rendered> {
        match filter {
            Filter::And(children) => self.render_group(children, Connective::And),
            Filter::Or(children) => self.render_group(children, Connective::Or),
            Filter::Compare { field, op, value } => {
                self.render_compare(field, *op, value).map(Rendered::leaf)
            }
            Filter::In { field, values } => {
                if values.is_empty() {
                    return Ok(Rendered::leaf("1 = 0".to_string()));
                }
                check_uniform(field, values)?;
                let parts: Vec<String> = values
                    .iter()
                    .map(|v| self.render_match(field, v, true))
                    .collect();
                Ok(Rendered::join(&parts, Connective::Or))
            }
            Filter::NotIn { field, values } => {
                if values.is_empty() {
                    return Ok(Rendered::leaf("1 = 1".to_string()));
                }
                check_uniform(field, values)?;
                let parts: Vec<String> = values
                    .iter()
                    .map(|v| self.render_match(field, v, false))
                    .collect();
                Ok(Rendered::join(&parts, Connective::And))
            }
            Filter::Range { field, low, high } => {
                if low.is_null() || high.is_null() {
                    return Err(Error::InvalidFilter(format!(
                        "range on '{field}' needs two non-null bounds"
                    )));
                }
                Ok(Rendered::leaf(format!(
                    "{field} between {} and {}",
                    self.operand(low),
                    self.operand(high)
                )))
            }
            Filter::Contains { field, value } => Ok(Rendered::leaf(format!(
                "{field} ilike {}",
                quote(&format!("%{value}%"))
            ))),
            Filter::EndsWith { field, value } => Ok(Rendered::leaf(format!(
                "{field} ilike {}",
                quote(&format!("{value}%"))
            ))),
        }
    }

    fn render_group(&self, children: &[Filter], connective: Connective) -> Result<Rendered> {
        let mut rendered = Vec::with_capacity(children.len());
        for child in children {
            let child = self.render(child)?;
            if !child.sql.is_empty() {
                rendered.push(child);
            }
        }
        // A lone child keeps its own connective so the parent still sees it.
        if rendered.len() == 1 {
            return Ok(rendered.swap_remove(0));
        }
        let parts: Vec<String> = rendered
            .into_iter()
            .map(|child| match child.chain {
                Some(inner) if inner != connective => format!("({})", child.sql),
                _ => child.sql,
            })
            .collect();
        Ok(Rendered::join(&parts, connective))
    }

    fn render_compare(&self, field: &str, op: CompareOp, value: &Value) -> Result<String> {
        match (op, value) {
            (CompareOp::Eq, Value::Null) => Ok(format!("{field} is null")),
            (CompareOp::Ne, Value::Null) => Ok(format!("{field} is not null")),
            (_, Value::Null) => Err(Error::InvalidFilter(format!(
                "'{field} {op} null' is never true"
            ))),
            (CompareOp::Ne, Value::Text(_)) => {
                Ok(format!("{field} not like {}", self.operand(value)))
            }
            _ => Ok(format!("{field} {op} {}", self.operand(value))),
        }
    }

    /// One member of an `In` (`positive`) or `NotIn` chain.
    fn render_match(&self, field: &str, value: &Value, positive: bool) -> String {
        match (value, positive) {
            (Value::Null, true) => format!("{field} is null"),
            (Value::Null, false) => format!("{field} is not null"),
            (Value::Text(_), true) => format!("{field} like {}", self.operand(value)),
            (Value::Text(_), false) => format!("{field} not like {}", self.operand(value)),
            (_, true) => format!("{field} = {}", self.operand(value)),
            (_, false) => format!("{field} != {}", self.operand(value)),
        }
    }

    /// Comparison operand: numbers stay bare, everything else is quoted.
    fn operand(&self, value: &Value) -> String {
        match value {
            Value::Bool(b) => quote(&b.to_string()),
            other => self.to_literal(other),
        }
    }
}

/// `In` and `NotIn` lists may not mix text with non-text values.
fn check_uniform(field: &str, values: &[Value]) -> Result<()> {
    let mut kinds = values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| if v.is_numeric() { "number" } else { v.kind_name() });
    let Some(first) = kinds.next() else {
        return Ok(());
    };
    kinds.find(|k| *k != first).map_or(Ok(()), |other| {
        Err(Error::InvalidFilter(format!(
            "list for '{field}' mixes {first} and {other} values"
        )))
    })
}
