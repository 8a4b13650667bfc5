//! Query parameters and compiled clause fragments.

use super::filter::Filter;

/// The abstract query: projection, filter, sort, paging and grouping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParam {
    /// Projected columns; empty selects `*`.
    pub select: Vec<String>,
    /// Row filter.
    pub filter: Option<Filter>,
    /// Sort keys; a leading `-` sorts descending.
    pub sort: Vec<String>,
    /// Rows to skip; 0 skips nothing.
    pub skip: u64,
    /// Rows to return; 0 means unbounded.
    pub take: u64,
    /// Grouping columns.
    pub group_by: Vec<String>,
}

impl QueryParam {
    /// Creates an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the projection.
    #[must_use]
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = to_strings(fields);
        self
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the sort keys.
    #[must_use]
    pub fn sort(mut self, fields: &[&str]) -> Self {
        self.sort = to_strings(fields);
        self
    }

    /// Sets the number of rows to skip.
    #[must_use]
    pub const fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the maximum number of rows.
    #[must_use]
    pub const fn take(mut self, take: u64) -> Self {
        self.take = take;
        self
    }

    /// Sets the grouping columns.
    #[must_use]
    pub fn group_by(mut self, fields: &[&str]) -> Self {
        self.group_by = to_strings(fields);
        self
    }
}

pub(crate) fn to_strings(fields: &[&str]) -> Vec<String> {
    fields.iter().map(ToString::to_string).collect()
}

/// Compiled SQL fragments of a [`QueryParam`].
///
/// Every fragment except `select_fields` is empty when its clause is
/// omitted, and otherwise carries its own keyword.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClauseSet {
    /// Comma-joined projection or `*`.
    pub select_fields: String,
    /// `WHERE <expr>`.
    pub where_sql: String,
    /// `ORDER BY <keys>`.
    pub sort_sql: String,
    /// `OFFSET <n>`.
    pub skip_sql: String,
    /// `LIMIT <n>`.
    pub take_sql: String,
    /// `GROUP BY <fields>`.
    pub group_sql: String,
}

impl ClauseSet {
    /// Assembles a `SELECT` over `table`.
    #[must_use]
    pub fn select_sql(&self, table: &str) -> String {
        let mut sql = format!("SELECT {} FROM {table}", self.select_fields);
        for fragment in [
            &self.where_sql,
            &self.group_sql,
            &self.sort_sql,
            &self.take_sql,
            &self.skip_sql,
        ] {
            if !fragment.is_empty() {
                sql.push(' ');
                sql.push_str(fragment);
            }
        }
        sql
    }
}

/// Projection: trimmed names joined by `, `, or `*`.
#[must_use]
pub fn projection(fields: &[String]) -> String {
    let fields: Vec<&str> = fields
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect();
    if fields.is_empty() {
        "*".to_string()
    } else {
        fields.join(", ")
    }
}

/// `ORDER BY` clause; `-name` becomes `name desc`.
#[must_use]
pub fn order_by(fields: &[String]) -> String {
    let keys: Vec<String> = fields
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty() && *f != "-")
        .map(|f| {
            f.strip_prefix('-')
                .map_or_else(|| f.to_string(), |column| format!("{} desc", column.trim()))
        })
        .collect();
    if keys.is_empty() {
        String::new()
    } else {
        format!("ORDER BY {}", keys.join(", "))
    }
}

/// `GROUP BY` clause, empty for no fields.
#[must_use]
pub fn group_by(fields: &[String]) -> String {
    let fields: Vec<&str> = fields
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect();
    if fields.is_empty() {
        String::new()
    } else {
        format!("GROUP BY {}", fields.join(","))
    }
}

/// `LIMIT` clause; 0 is unbounded and omits it.
#[must_use]
pub fn take(n: u64) -> String {
    if n == 0 {
        String::new()
    } else {
        format!("LIMIT {n}")
    }
}

/// `OFFSET` clause, omitted for 0.
#[must_use]
pub fn skip(n: u64) -> String {
    if n == 0 {
        String::new()
    } else {
        format!("OFFSET {n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection() {
        assert_eq!(projection(&[]), "*");
        assert_eq!(projection(&to_strings(&[" id ", "title", ""])), "id, title");
    }

    #[test]
    fn test_order_by() {
        assert_eq!(order_by(&to_strings(&["name", "-created"])), "ORDER BY name, created desc");
        assert_eq!(order_by(&[]), "");
    }

    #[test]
    fn test_take_zero_is_unbounded() {
        assert_eq!(take(0), "");
        assert_eq!(take(10), "LIMIT 10");
        assert_eq!(skip(0), "");
        assert_eq!(skip(20), "OFFSET 20");
    }

    #[test]
    fn test_group_by() {
        assert_eq!(group_by(&[]), "");
        assert_eq!(group_by(&to_strings(&["kind", "owner"])), "GROUP BY kind,owner");
    }

    #[test]
    fn test_select_sql_clause_order() {
        let clauses = ClauseSet {
            select_fields: "kind, count(*)".to_string(),
            where_sql: "WHERE age > 3".to_string(),
            sort_sql: "ORDER BY kind".to_string(),
            skip_sql: "OFFSET 5".to_string(),
            take_sql: "LIMIT 10".to_string(),
            group_sql: "GROUP BY kind".to_string(),
        };
        assert_eq!(
            clauses.select_sql("pets"),
            "SELECT kind, count(*) FROM pets WHERE age > 3 GROUP BY kind ORDER BY kind LIMIT 10 OFFSET 5"
        );
    }
}
