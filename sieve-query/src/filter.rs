//! Filter types for building WHERE clauses.
//!
//! A [`Filter`] is a plain value tree. Relationship predicates are expressed
//! as correlated existence subqueries ([`ExistsFilter`]) so that to-many
//! relations never multiply the rows of the outer query.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::sql::{quote_identifier, DatabaseType, SqlBuilder};

/// A filter value that can be used in comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// List of values.
    List(Vec<FilterValue>),
    /// JSON value.
    Json(serde_json::Value),
}

impl FilterValue {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this value carries nothing a user selected.
    ///
    /// Null, empty strings and empty lists are blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.trim().is_empty(),
            Self::List(items) => items.iter().all(Self::is_blank),
            _ => false,
        }
    }

    /// Compare two values the way a database compares a key column with a
    /// bound parameter: `3`, `3.0` and `"3"` are the same key.
    ///
    /// Null never equals anything, including another null.
    pub fn loosely_equals(&self, other: &FilterValue) -> bool {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::Int(a), Self::String(s)) | (Self::String(s), Self::Int(a)) => {
                s.trim().parse::<i64>().is_ok_and(|parsed| parsed == *a)
            }
            (Self::Float(a), Self::String(s)) | (Self::String(s), Self::Float(a)) => {
                s.trim().parse::<f64>().is_ok_and(|parsed| parsed == *a)
            }
            (a, b) => a == b,
        }
    }

    /// Order two values for comparisons and sorting.
    ///
    /// Returns `None` when the values are not comparable (e.g. a string and a
    /// boolean), mirroring a failed SQL comparison.
    pub fn compare(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total ordering used for ORDER BY; nulls sort first.
    pub fn sort_cmp(&self, other: &FilterValue) -> Ordering {
        self.compare(other)
            .unwrap_or_else(|| self.sort_rank().cmp(&other.sort_rank()))
    }

    fn sort_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::String(_) => 3,
            Self::List(_) => 4,
            Self::Json(_) => 5,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => f.write_str(v),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Self::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<serde_json::Value> for FilterValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Into::into).collect())
            }
            other @ serde_json::Value::Object(_) => Self::Json(other),
        }
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// How the rows of a related table are correlated with the outer row.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationLink {
    /// Key pairs `(parent column, related column)` compared directly.
    Direct {
        /// Column pairs; every pair must match.
        pairs: Vec<(SmolStr, SmolStr)>,
    },
    /// Correlation through an intermediate join table.
    Pivot {
        /// The join table.
        table: SmolStr,
        /// Key on the parent row referenced by `source_column`.
        parent_key: SmolStr,
        /// Join table column pointing at the parent.
        source_column: SmolStr,
        /// Join table column pointing at the related row.
        target_column: SmolStr,
        /// Key on the related row referenced by `target_column`.
        related_key: SmolStr,
    },
}

/// A correlated existence subquery over one relation hop.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistsFilter {
    /// Relation name, kept for diagnostics.
    pub relation: SmolStr,
    /// Table of the outer row.
    pub parent_table: SmolStr,
    /// Table scanned by the subquery.
    pub related_table: SmolStr,
    /// Correlation between outer and related rows.
    pub link: RelationLink,
    /// Extra condition on the related rows.
    pub filter: Filter,
}

/// A complete filter that can be converted to SQL.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No filter (always true).
    #[default]
    None,

    /// Equals comparison.
    Equals(String, FilterValue),
    /// Not equals comparison.
    NotEquals(String, FilterValue),

    /// Less than comparison.
    Lt(String, FilterValue),
    /// Less than or equal comparison.
    Lte(String, FilterValue),
    /// Greater than comparison.
    Gt(String, FilterValue),
    /// Greater than or equal comparison.
    Gte(String, FilterValue),

    /// In a list of values.
    In(String, Vec<FilterValue>),
    /// Not in a list of values.
    NotIn(String, Vec<FilterValue>),

    /// Contains (LIKE %value%).
    Contains(String, FilterValue),
    /// Case-insensitive contains (LOWER(col) LIKE LOWER(%value%)).
    ContainsInsensitive(String, FilterValue),
    /// Starts with (LIKE value%).
    StartsWith(String, FilterValue),
    /// Ends with (LIKE %value).
    EndsWith(String, FilterValue),

    /// Is null check.
    IsNull(String),
    /// Is not null check.
    IsNotNull(String),

    /// At least one related row matches.
    Exists(Box<ExistsFilter>),
    /// No related row matches.
    NotExists(Box<ExistsFilter>),

    /// Logical AND of multiple filters.
    And(Vec<Filter>),
    /// Logical OR of multiple filters.
    Or(Vec<Filter>),
    /// Logical NOT of a filter.
    Not(Box<Filter>),
}

impl Filter {
    /// Create an empty filter (matches everything).
    pub fn none() -> Self {
        Self::None
    }

    /// Check if this filter is empty.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Create an existence filter, negated when `inverse` is set.
    pub fn exists(exists: ExistsFilter, inverse: bool) -> Self {
        if inverse {
            Self::NotExists(Box::new(exists))
        } else {
            Self::Exists(Box::new(exists))
        }
    }

    /// Create an AND filter.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.remove(0),
            _ => Self::And(filters),
        }
    }

    /// Create an OR filter.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.remove(0),
            _ => Self::Or(filters),
        }
    }

    /// Create a NOT filter.
    pub fn not(filter: Filter) -> Self {
        if filter.is_none() {
            return Self::None;
        }
        Self::Not(Box::new(filter))
    }

    /// Combine with another filter using AND.
    pub fn and_then(self, other: Filter) -> Self {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            _ => Self::And(vec![self, other]),
        }
    }

    /// Combine with another filter using OR.
    pub fn or_else(self, other: Filter) -> Self {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        match self {
            Self::Or(mut filters) => {
                filters.push(other);
                Self::Or(filters)
            }
            _ => Self::Or(vec![self, other]),
        }
    }

    /// Generate SQL for this filter with parameter placeholders.
    /// Returns (sql, params) where params are the values to bind.
    pub fn to_sql(&self, db_type: DatabaseType) -> (String, Vec<FilterValue>) {
        let mut builder = SqlBuilder::new(db_type);
        self.write_sql(&mut builder);
        builder.build()
    }

    /// Append this filter to a builder, numbering parameters after the
    /// ones already pushed.
    pub fn write_sql(&self, builder: &mut SqlBuilder) {
        match self {
            Self::None => {
                builder.push("TRUE");
            }

            Self::Equals(col, val) => {
                builder.push_column(col);
                if val.is_null() {
                    builder.push(" IS NULL");
                } else {
                    builder.push(" = ").push_param(val.clone());
                }
            }
            Self::NotEquals(col, val) => {
                builder.push_column(col);
                if val.is_null() {
                    builder.push(" IS NOT NULL");
                } else {
                    builder.push(" != ").push_param(val.clone());
                }
            }

            Self::Lt(col, val) => write_comparison(builder, col, " < ", val),
            Self::Lte(col, val) => write_comparison(builder, col, " <= ", val),
            Self::Gt(col, val) => write_comparison(builder, col, " > ", val),
            Self::Gte(col, val) => write_comparison(builder, col, " >= ", val),

            Self::In(col, values) => {
                if values.is_empty() {
                    builder.push("FALSE");
                } else {
                    builder.push_column(col).push(" IN (");
                    write_param_list(builder, values);
                    builder.push(")");
                }
            }
            Self::NotIn(col, values) => {
                if values.is_empty() {
                    builder.push("TRUE");
                } else {
                    builder.push_column(col).push(" NOT IN (");
                    write_param_list(builder, values);
                    builder.push(")");
                }
            }

            Self::Contains(col, val) => {
                builder.push_column(col).push(" LIKE ").push_param(like_pattern("%", val, "%"));
            }
            Self::ContainsInsensitive(col, val) => {
                builder
                    .push("LOWER(")
                    .push_column(col)
                    .push(") LIKE LOWER(")
                    .push_param(like_pattern("%", val, "%"))
                    .push(")");
            }
            Self::StartsWith(col, val) => {
                builder.push_column(col).push(" LIKE ").push_param(like_pattern("", val, "%"));
            }
            Self::EndsWith(col, val) => {
                builder.push_column(col).push(" LIKE ").push_param(like_pattern("%", val, ""));
            }

            Self::IsNull(col) => {
                builder.push_column(col).push(" IS NULL");
            }
            Self::IsNotNull(col) => {
                builder.push_column(col).push(" IS NOT NULL");
            }

            Self::Exists(exists) => {
                builder.push("EXISTS ");
                exists.write_subquery(builder);
            }
            Self::NotExists(exists) => {
                builder.push("NOT EXISTS ");
                exists.write_subquery(builder);
            }

            Self::And(filters) => write_joined(builder, filters, " AND ", "TRUE"),
            Self::Or(filters) => write_joined(builder, filters, " OR ", "FALSE"),
            Self::Not(filter) => {
                builder.push("NOT (");
                filter.write_sql(builder);
                builder.push(")");
            }
        }
    }
}

impl ExistsFilter {
    /// Prefix of the alias given to a table that is queried inside a
    /// subquery over the same table.
    pub const ALIAS_PREFIX: &'static str = "sieve_reserved_";

    /// Whether the related rows live in the same table as the outer row.
    pub fn is_self_relation(&self) -> bool {
        self.parent_table == self.related_table
    }

    fn write_subquery(&self, builder: &mut SqlBuilder) {
        let parent = builder.table_reference(&self.parent_table).to_string();
        let alias = self
            .is_self_relation()
            .then(|| SmolStr::new(format!("{}{}", Self::ALIAS_PREFIX, builder.depth())));

        builder.push("(SELECT 1 FROM ").push_identifier(&self.related_table);
        if let Some(alias) = &alias {
            builder.push(" AS ").push_identifier(alias);
        }
        builder.enter_scope(self.related_table.clone(), alias);

        match &self.link {
            RelationLink::Direct { pairs } => {
                builder.push(" WHERE ");
                for (i, (parent_col, related_col)) in pairs.iter().enumerate() {
                    if i > 0 {
                        builder.push(" AND ");
                    }
                    builder
                        .push_column(&format!("{}.{}", self.related_table, related_col))
                        .push(" = ");
                    push_outer_column(builder, &parent, parent_col);
                }
            }
            RelationLink::Pivot {
                table,
                parent_key,
                source_column,
                target_column,
                related_key,
            } => {
                builder
                    .push(" INNER JOIN ")
                    .push_identifier(table)
                    .push(" ON ")
                    .push_column(&format!("{}.{}", table, target_column))
                    .push(" = ")
                    .push_column(&format!("{}.{}", self.related_table, related_key))
                    .push(" WHERE ")
                    .push_column(&format!("{}.{}", table, source_column))
                    .push(" = ");
                push_outer_column(builder, &parent, parent_key);
            }
        }

        if !self.filter.is_none() {
            builder.push(" AND ");
            self.filter.write_sql(builder);
        }
        builder.leave_scope();
        builder.push(")");
    }
}

/// Push a column of the outer row; `table` is already the name the outer
/// row is visible under.
fn push_outer_column(builder: &mut SqlBuilder, table: &str, column: &str) {
    builder.push(quote_identifier(table)).push(".").push(quote_identifier(column));
}

fn write_comparison(builder: &mut SqlBuilder, col: &str, op: &str, val: &FilterValue) {
    builder.push_column(col).push(op).push_param(val.clone());
}

fn write_param_list(builder: &mut SqlBuilder, values: &[FilterValue]) {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push_param(value.clone());
    }
}

fn write_joined(builder: &mut SqlBuilder, filters: &[Filter], sep: &str, empty: &str) {
    if filters.is_empty() {
        builder.push(empty);
        return;
    }
    builder.push("(");
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            builder.push(sep);
        }
        filter.write_sql(builder);
    }
    builder.push(")");
}

fn like_pattern(prefix: &str, val: &FilterValue, suffix: &str) -> FilterValue {
    match val {
        FilterValue::String(s) => FilterValue::String(format!("{}{}{}", prefix, s, suffix)),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn author_exists(inner: Filter) -> ExistsFilter {
        ExistsFilter {
            relation: "author".into(),
            parent_table: "posts".into(),
            related_table: "authors".into(),
            link: RelationLink::Direct {
                pairs: vec![("author_id".into(), "id".into())],
            },
            filter: inner,
        }
    }

    #[test]
    fn test_filter_value_from() {
        assert_eq!(FilterValue::from(42i32), FilterValue::Int(42));
        assert_eq!(FilterValue::from("hello"), FilterValue::String("hello".to_string()));
        assert_eq!(FilterValue::from(true), FilterValue::Bool(true));
        assert_eq!(
            FilterValue::from(serde_json::json!([3, "5"])),
            FilterValue::List(vec![FilterValue::Int(3), FilterValue::String("5".into())])
        );
    }

    #[test]
    fn test_loose_key_equality() {
        assert!(FilterValue::Int(3).loosely_equals(&FilterValue::String("3".into())));
        assert!(FilterValue::Float(3.0).loosely_equals(&FilterValue::Int(3)));
        assert!(!FilterValue::Int(3).loosely_equals(&FilterValue::String("three".into())));
        assert!(!FilterValue::Null.loosely_equals(&FilterValue::Null));
    }

    #[test]
    fn test_sort_cmp_puts_nulls_first() {
        let mut values = vec![
            FilterValue::String("b".into()),
            FilterValue::Null,
            FilterValue::String("a".into()),
        ];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            values,
            vec![FilterValue::Null, FilterValue::String("a".into()), FilterValue::String("b".into())]
        );
    }

    #[test]
    fn test_display_list() {
        let value = FilterValue::List(vec![FilterValue::Int(1), FilterValue::String("two".into())]);
        assert_eq!(value.to_string(), "1, two");
        assert_eq!(FilterValue::Null.to_string(), "");
    }

    #[test]
    fn test_filter_and_numbers_params_in_order() {
        let f1 = Filter::Equals("name".to_string(), "Alice".into());
        let f2 = Filter::Gt("age".to_string(), FilterValue::Int(18));
        let combined = Filter::and([f1, f2]);

        let (sql, params) = combined.to_sql(DatabaseType::PostgreSQL);
        assert_eq!(sql, "(name = $1 AND age > $2)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_filter_in_empty_is_false() {
        let (sql, params) = Filter::In("id".into(), vec![]).to_sql(DatabaseType::PostgreSQL);
        assert_eq!(sql, "FALSE");
        assert!(params.is_empty());
    }

    #[test]
    fn test_filter_contains_insensitive() {
        let filter = Filter::ContainsInsensitive("authors.name".into(), "ja".into());
        let (sql, params) = filter.to_sql(DatabaseType::PostgreSQL);
        assert_eq!(sql, "LOWER(authors.name) LIKE LOWER($1)");
        assert_eq!(params, vec![FilterValue::String("%ja%".into())]);
    }

    #[test]
    fn test_exists_direct() {
        let filter = Filter::exists(
            author_exists(Filter::In("authors.id".into(), vec![3.into()])),
            false,
        );
        let (sql, params) = filter.to_sql(DatabaseType::PostgreSQL);
        assert_eq!(
            sql,
            "EXISTS (SELECT 1 FROM authors WHERE authors.id = posts.author_id AND authors.id IN ($1))"
        );
        assert_eq!(params, vec![FilterValue::Int(3)]);
    }

    #[test]
    fn test_not_exists_without_condition() {
        let filter = Filter::exists(author_exists(Filter::None), true);
        let (sql, _) = filter.to_sql(DatabaseType::SQLite);
        assert_eq!(sql, "NOT EXISTS (SELECT 1 FROM authors WHERE authors.id = posts.author_id)");
    }

    #[test]
    fn test_exists_pivot() {
        let exists = ExistsFilter {
            relation: "tags".into(),
            parent_table: "posts".into(),
            related_table: "tags".into(),
            link: RelationLink::Pivot {
                table: "post_tag".into(),
                parent_key: "id".into(),
                source_column: "post_id".into(),
                target_column: "tag_id".into(),
                related_key: "id".into(),
            },
            filter: Filter::In("tags.id".into(), vec![1.into(), 2.into()]),
        };
        let (sql, _) = Filter::exists(exists, false).to_sql(DatabaseType::MySQL);
        assert_eq!(
            sql,
            "EXISTS (SELECT 1 FROM tags INNER JOIN post_tag ON post_tag.tag_id = tags.id \
             WHERE post_tag.post_id = posts.id AND tags.id IN (?, ?))"
        );
    }

    fn mentor_exists(parent_table: &str, inner: Filter) -> ExistsFilter {
        ExistsFilter {
            relation: "mentor".into(),
            parent_table: parent_table.into(),
            related_table: "authors".into(),
            link: RelationLink::Direct {
                pairs: vec![("mentor_id".into(), "id".into())],
            },
            filter: inner,
        }
    }

    #[test]
    fn test_self_relation_aliases_inner_table() {
        let exists = mentor_exists("authors", Filter::In("authors.id".into(), vec![1.into()]));
        assert!(exists.is_self_relation());

        let (sql, params) = Filter::exists(exists, false).to_sql(DatabaseType::PostgreSQL);
        assert_eq!(
            sql,
            "EXISTS (SELECT 1 FROM authors AS sieve_reserved_0 \
             WHERE sieve_reserved_0.id = authors.mentor_id AND sieve_reserved_0.id IN ($1))"
        );
        assert_eq!(params, vec![FilterValue::Int(1)]);
    }

    #[test]
    fn test_nested_self_relation_correlates_with_enclosing_alias() {
        let inner = mentor_exists("authors", Filter::In("authors.id".into(), vec![1.into()]));
        let outer = mentor_exists("authors", Filter::exists(inner, false));

        let (sql, _) = Filter::exists(outer, true).to_sql(DatabaseType::SQLite);
        assert_eq!(
            sql,
            "NOT EXISTS (SELECT 1 FROM authors AS sieve_reserved_0 \
             WHERE sieve_reserved_0.id = authors.mentor_id AND \
             EXISTS (SELECT 1 FROM authors AS sieve_reserved_1 \
             WHERE sieve_reserved_1.id = sieve_reserved_0.mentor_id AND sieve_reserved_1.id IN (?)))"
        );
    }

    #[test]
    fn test_self_relation_through_pivot() {
        let exists = ExistsFilter {
            relation: "friends".into(),
            parent_table: "users".into(),
            related_table: "users".into(),
            link: RelationLink::Pivot {
                table: "friendships".into(),
                parent_key: "id".into(),
                source_column: "user_id".into(),
                target_column: "friend_id".into(),
                related_key: "id".into(),
            },
            filter: Filter::Equals("users.name".into(), "Ann".into()),
        };
        let (sql, _) = Filter::exists(exists, false).to_sql(DatabaseType::PostgreSQL);
        assert_eq!(
            sql,
            "EXISTS (SELECT 1 FROM users AS sieve_reserved_0 \
             INNER JOIN friendships ON friendships.friend_id = sieve_reserved_0.id \
             WHERE friendships.user_id = users.id AND sieve_reserved_0.name = $1)"
        );
    }
}
