//! SQL generation utilities.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::filter::FilterValue;

/// Escape a string for use in SQL (for identifiers, not values).
pub fn escape_identifier(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Check if an identifier needs quoting.
pub fn needs_quoting(name: &str) -> bool {
    // Reserved keywords or names with special characters need quoting
    let reserved = [
        "user", "order", "group", "select", "from", "where", "table", "index",
        "key", "primary", "foreign", "check", "default", "null", "not", "and",
        "or", "in", "is", "like", "between", "case", "when", "then", "else",
        "end", "as", "on", "join", "left", "right", "inner", "outer", "cross",
        "natural", "using", "limit", "offset", "union", "intersect", "except",
        "all", "distinct", "having", "exists", "values", "set", "returning",
    ];

    if reserved.contains(&name.to_lowercase().as_str()) {
        return true;
    }

    !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote an identifier if needed.
pub fn quote_identifier(name: &str) -> String {
    if needs_quoting(name) {
        escape_identifier(name)
    } else {
        name.to_string()
    }
}

/// Quote a possibly table-qualified column (`table.column`) segment by segment.
pub fn quote_qualified(name: &str) -> String {
    name.split('.').map(quote_identifier).collect::<Vec<_>>().join(".")
}

/// The SQL dialect used for parameter placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// PostgreSQL uses $1, $2, etc.
    #[default]
    #[serde(alias = "postgres")]
    PostgreSQL,
    /// MySQL uses ?, ?, etc.
    MySQL,
    /// SQLite uses ?, ?, etc.
    #[serde(alias = "sqlite3")]
    SQLite,
}

impl DatabaseType {
    /// Get the parameter placeholder for this database type.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::PostgreSQL => format!("${}", index),
            Self::MySQL | Self::SQLite => "?".to_string(),
        }
    }
}

/// A SQL builder for constructing queries.
///
/// Tracks the subqueries it is currently inside so that column references
/// `table.column` render against the name the table is visible under.
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    db_type: DatabaseType,
    parts: Vec<String>,
    params: Vec<FilterValue>,
    scopes: Vec<(SmolStr, Option<SmolStr>)>,
}

impl SqlBuilder {
    /// Create a new SQL builder.
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            parts: Vec::new(),
            params: Vec::new(),
            scopes: Vec::new(),
        }
    }

    /// Push a literal SQL string.
    pub fn push(&mut self, sql: impl AsRef<str>) -> &mut Self {
        self.parts.push(sql.as_ref().to_string());
        self
    }

    /// Push a bound parameter.
    pub fn push_param(&mut self, value: impl Into<FilterValue>) -> &mut Self {
        let index = self.params.len() + 1;
        self.parts.push(self.db_type.placeholder(index));
        self.params.push(value.into());
        self
    }

    /// Push an identifier (properly quoted if needed).
    pub fn push_identifier(&mut self, name: &str) -> &mut Self {
        self.parts.push(quote_identifier(name));
        self
    }

    /// Push a column reference, quoting each `table.column` segment.
    ///
    /// The table segment is replaced by its alias when the innermost scope
    /// declaring that table aliased it.
    pub fn push_column(&mut self, name: &str) -> &mut Self {
        let rendered = match name.split_once('.') {
            Some((table, column)) => format!(
                "{}.{}",
                quote_identifier(self.table_reference(table)),
                quote_qualified(column)
            ),
            None => quote_qualified(name),
        };
        self.parts.push(rendered);
        self
    }

    /// The name `table` is visible under at the current nesting level.
    pub fn table_reference<'a>(&'a self, table: &'a str) -> &'a str {
        self.scopes
            .iter()
            .rev()
            .find(|(name, _)| name.as_str() == table)
            .map_or(table, |(name, alias)| alias.as_deref().unwrap_or(name.as_str()))
    }

    /// Number of enclosing subqueries.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Enter a subquery scanning `table`, optionally under `alias`.
    pub fn enter_scope(&mut self, table: impl Into<SmolStr>, alias: Option<SmolStr>) -> &mut Self {
        self.scopes.push((table.into(), alias));
        self
    }

    /// Leave the innermost subquery.
    pub fn leave_scope(&mut self) -> &mut Self {
        self.scopes.pop();
        self
    }

    /// Build the final SQL string and parameters.
    pub fn build(self) -> (String, Vec<FilterValue>) {
        (self.parts.join(""), self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("user"), "\"user\"");
        assert_eq!(escape_identifier("has\"quote"), "\"has\"\"quote\"");
    }

    #[test]
    fn test_quote_qualified() {
        assert_eq!(quote_qualified("authors.name"), "authors.name");
        assert_eq!(quote_qualified("user.order"), "\"user\".\"order\"");
        assert_eq!(quote_qualified("title"), "title");
    }

    #[test]
    fn test_database_placeholder() {
        assert_eq!(DatabaseType::PostgreSQL.placeholder(1), "$1");
        assert_eq!(DatabaseType::PostgreSQL.placeholder(5), "$5");
        assert_eq!(DatabaseType::MySQL.placeholder(1), "?");
        assert_eq!(DatabaseType::SQLite.placeholder(1), "?");
    }

    #[test]
    fn test_sql_builder() {
        let mut builder = SqlBuilder::new(DatabaseType::PostgreSQL);
        builder
            .push("SELECT * FROM ")
            .push_identifier("user")
            .push(" WHERE ")
            .push_column("user.id")
            .push(" = ")
            .push_param(42i32);

        let (sql, params) = builder.build();
        assert_eq!(sql, "SELECT * FROM \"user\" WHERE \"user\".id = $1");
        assert_eq!(params, vec![FilterValue::Int(42)]);
    }

    #[test]
    fn test_scoped_columns_use_innermost_alias() {
        let mut builder = SqlBuilder::new(DatabaseType::PostgreSQL);
        builder.enter_scope("authors", Some("sieve_reserved_0".into()));
        builder.push_column("authors.id").push(" ");
        builder.enter_scope("authors", None);
        builder.push_column("authors.id").push(" ");
        builder.leave_scope();
        builder.push_column("posts.id");
        assert_eq!(builder.depth(), 1);
        builder.leave_scope();
        builder.push(" ").push_column("authors.id");

        let (sql, _) = builder.build();
        assert_eq!(sql, "sieve_reserved_0.id authors.id posts.id authors.id");
    }
}
