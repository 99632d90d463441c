//! The query builder filters compose against.
//!
//! A [`Query`] is a plain value: every builder method consumes it and returns
//! a new one, so handing a clone to another component can never change the
//! original.
//!
//! ```rust
//! use std::sync::Arc;
//! use sieve_query::{DatabaseType, ModelDef, Query, RelationSpec, Schema};
//!
//! let schema = Arc::new(
//!     Schema::new()
//!         .model(ModelDef::new("Author", "authors"))
//!         .model(ModelDef::new("Post", "posts").relation(RelationSpec::many_to_one("author", "Author"))),
//! );
//!
//! let query = Query::new(schema, "Post")
//!     .unwrap()
//!     .where_has("author", |q| q.where_key([3]))
//!     .unwrap();
//!
//! let (sql, params) = query.to_sql(DatabaseType::PostgreSQL);
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM posts WHERE EXISTS (SELECT 1 FROM authors WHERE authors.id = posts.author_id AND authors.id IN ($1))"
//! );
//! assert_eq!(params.len(), 1);
//! ```

use std::sync::Arc;

use smol_str::SmolStr;
use tracing::trace;

use crate::error::{QueryError, QueryResult};
use crate::filter::{Filter, FilterValue};
use crate::relations::RelationshipResolver;
use crate::schema::{ModelDef, Schema};
use crate::sql::{quote_identifier, DatabaseType, SqlBuilder};
use crate::types::{OrderBy, Select};

/// An `INNER JOIN table ON left = right` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Joined table.
    pub table: SmolStr,
    /// Qualified column on the joined table.
    pub left: String,
    /// Qualified column it must equal.
    pub right: String,
}

impl Join {
    /// Create an inner join.
    pub fn inner(table: impl Into<SmolStr>, left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            left: left.into(),
            right: right.into(),
        }
    }
}

/// A select query over one model.
#[derive(Debug, Clone)]
pub struct Query {
    schema: Arc<Schema>,
    model: Arc<ModelDef>,
    joins: Vec<Join>,
    filter: Filter,
    order_by: OrderBy,
    distinct: bool,
    limit: Option<u64>,
}

impl Query {
    /// Start a query over a registered model.
    pub fn new(schema: Arc<Schema>, model: &str) -> QueryResult<Self> {
        let model = Arc::clone(schema.require_model(model)?);
        Ok(Self::for_model(schema, model))
    }

    /// Start a query over an already resolved model.
    pub fn for_model(schema: Arc<Schema>, model: Arc<ModelDef>) -> Self {
        Self {
            schema,
            model,
            joins: Vec::new(),
            filter: Filter::None,
            order_by: OrderBy::none(),
            distinct: false,
            limit: None,
        }
    }

    /// The schema this query resolves relations against.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The model being queried.
    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    /// The accumulated WHERE filter.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// The ORDER BY clause.
    pub fn order(&self) -> &OrderBy {
        &self.order_by
    }

    /// Joined tables, in order.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Whether the query selects distinct rows.
    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Row limit, if any.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Add a filter condition (AND-ed with existing ones).
    pub fn r#where(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = self.filter.and_then(filter.into());
        self
    }

    /// Restrict to rows whose primary key is one of `keys`.
    pub fn where_key<V: Into<FilterValue>>(self, keys: impl IntoIterator<Item = V>) -> Self {
        let column = self.model.qualify_column(&self.model.primary_key);
        let keys = keys.into_iter().map(Into::into).collect();
        self.r#where(Filter::In(column, keys))
    }

    /// Restrict to rows with at least one related row along `path` matching
    /// the conditions `f` adds.
    pub fn where_has(self, path: &str, f: impl FnOnce(Query) -> Query) -> QueryResult<Self> {
        self.where_relation_exists(path, false, f)
    }

    /// Restrict to rows with no related row along `path` matching the
    /// conditions `f` adds.
    pub fn where_doesnt_have(self, path: &str, f: impl FnOnce(Query) -> Query) -> QueryResult<Self> {
        self.where_relation_exists(path, true, f)
    }

    /// Add a correlated existence check over `path`.
    ///
    /// `f` receives a query over the related model; only its filter is kept.
    /// The check is negated when `inverse` is set.
    pub fn where_relation_exists(
        self,
        path: &str,
        inverse: bool,
        f: impl FnOnce(Query) -> Query,
    ) -> QueryResult<Self> {
        let handle = RelationshipResolver::resolve(&self.schema, &self.model.name, path)
            .ok_or_else(|| QueryError::unknown_relation(self.model.name.as_str(), path))?;

        let related = Query::for_model(Arc::clone(&self.schema), Arc::clone(handle.related_model()));
        let inner = f(related).filter;

        trace!(model = %self.model.name, path = %path, inverse, "Composing relationship existence check");
        Ok(self.r#where(handle.exists_filter(inner, inverse)))
    }

    /// Replace the ORDER BY clause.
    pub fn order_by(mut self, order: impl Into<OrderBy>) -> Self {
        self.order_by = order.into();
        self
    }

    /// Check whether an ordering has been set.
    pub fn has_orders(&self) -> bool {
        !self.order_by.is_empty()
    }

    /// Select distinct rows.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Take at most `n` rows.
    pub fn take(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Add an inner join.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Prefix a column with the model's table unless already qualified.
    pub fn qualify_column(&self, column: &str) -> String {
        self.model.qualify_column(column)
    }

    /// Render the full-row SELECT.
    pub fn to_sql(&self, db_type: DatabaseType) -> (String, Vec<FilterValue>) {
        let projection = if self.joins.is_empty() {
            "*".to_string()
        } else {
            format!("{}.*", quote_identifier(&self.model.table))
        };
        self.render(db_type, |builder| {
            builder.push(&projection);
        })
    }

    /// Columns selected when plucking `column`.
    ///
    /// Distinct queries also select their ordering columns, since
    /// `SELECT DISTINCT` may only order by selected columns.
    pub fn pluck_projection(&self, column: &str) -> Select {
        let mut columns = vec![column.to_string()];
        if self.distinct {
            for field in self.order_by.fields() {
                if !columns.iter().any(|c| c.as_str() == field.column) {
                    columns.push(field.column.to_string());
                }
            }
        }
        Select::Fields(columns)
    }

    /// Render a SELECT of a single column.
    pub fn to_pluck_sql(&self, column: &str, db_type: DatabaseType) -> (String, Vec<FilterValue>) {
        let projection = self.pluck_projection(column);
        self.render(db_type, |builder| {
            builder.push(projection.to_sql());
        })
    }

    fn render(&self, db_type: DatabaseType, projection: impl FnOnce(&mut SqlBuilder)) -> (String, Vec<FilterValue>) {
        let mut builder = SqlBuilder::new(db_type);

        builder.push("SELECT ");
        if self.distinct {
            builder.push("DISTINCT ");
        }
        projection(&mut builder);
        builder.push(" FROM ").push_identifier(&self.model.table);

        for join in &self.joins {
            builder
                .push(" INNER JOIN ")
                .push_identifier(&join.table)
                .push(" ON ")
                .push_column(&join.left)
                .push(" = ")
                .push_column(&join.right);
        }

        if !self.filter.is_none() {
            builder.push(" WHERE ");
            self.filter.write_sql(&mut builder);
        }

        if !self.order_by.is_empty() {
            builder.push(" ORDER BY ").push(self.order_by.to_sql());
        }

        if let Some(limit) = self.limit {
            builder.push(format!(" LIMIT {}", limit));
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::relations::RelationSpec;
    use crate::types::OrderByField;
    use pretty_assertions::assert_eq;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new()
                .model(ModelDef::new("Author", "authors").columns(["id", "name"]))
                .model(
                    ModelDef::new("Post", "posts")
                        .columns(["id", "title", "author_id"])
                        .relation(RelationSpec::many_to_one("author", "Author")),
                ),
        )
    }

    #[test]
    fn test_new_rejects_unknown_model() {
        let err = Query::new(schema(), "Comment").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownModel);
    }

    #[test]
    fn test_plain_select() {
        let query = Query::new(schema(), "Author")
            .unwrap()
            .r#where(Filter::Contains("authors.name".into(), "an".into()))
            .order_by(OrderByField::asc("authors.name"))
            .take(10);
        let (sql, params) = query.to_sql(DatabaseType::PostgreSQL);
        assert_eq!(
            sql,
            "SELECT * FROM authors WHERE authors.name LIKE $1 ORDER BY authors.name ASC LIMIT 10"
        );
        assert_eq!(params, vec![FilterValue::String("%an%".into())]);
    }

    #[test]
    fn test_where_doesnt_have() {
        let query = Query::new(schema(), "Post")
            .unwrap()
            .where_doesnt_have("author", |q| q.where_key([3, 5]))
            .unwrap();
        let (sql, params) = query.to_sql(DatabaseType::SQLite);
        assert_eq!(
            sql,
            "SELECT * FROM posts WHERE NOT EXISTS (SELECT 1 FROM authors WHERE authors.id = posts.author_id AND authors.id IN (?, ?))"
        );
        assert_eq!(params, vec![FilterValue::Int(3), FilterValue::Int(5)]);
    }

    #[test]
    fn test_where_has_unknown_relation() {
        let err = Query::new(schema(), "Post")
            .unwrap()
            .where_has("editor", |q| q)
            .unwrap_err();
        assert!(err.is_unknown_relation());
    }

    #[test]
    fn test_builder_leaves_clone_untouched() {
        let base = Query::new(schema(), "Post").unwrap();
        let narrowed = base.clone().where_key([1]).distinct();
        assert!(base.filter().is_none());
        assert!(!base.is_distinct());
        assert!(narrowed.is_distinct());
    }

    #[test]
    fn test_pluck_sql() {
        let query = Query::new(schema(), "Author").unwrap().distinct().where_key(["3"]);
        let (sql, _) = query.to_pluck_sql("authors.name", DatabaseType::MySQL);
        assert_eq!(sql, "SELECT DISTINCT authors.name FROM authors WHERE authors.id IN (?)");
    }

    #[test]
    fn test_distinct_pluck_selects_ordering_columns() {
        let query = Query::new(schema(), "Author")
            .unwrap()
            .distinct()
            .order_by(vec![OrderByField::asc("authors.id"), OrderByField::desc("authors.name")]);
        let (sql, _) = query.to_pluck_sql("authors.name", DatabaseType::PostgreSQL);
        assert_eq!(
            sql,
            "SELECT DISTINCT authors.name, authors.id FROM authors ORDER BY authors.id ASC, authors.name DESC"
        );

        let plain = Query::new(schema(), "Author").unwrap().order_by(OrderByField::asc("authors.id"));
        assert_eq!(plain.pluck_projection("authors.name").columns(), ["authors.name".to_string()]);
    }

    #[test]
    fn test_self_relation_correlates_with_outer_row() {
        let schema = Arc::new(
            Schema::new().model(
                ModelDef::new("Author", "authors").relation(RelationSpec::many_to_one("mentor", "Author")),
            ),
        );
        let query = Query::new(schema, "Author")
            .unwrap()
            .where_has("mentor", |q| q.where_key([1]))
            .unwrap();
        let (sql, params) = query.to_sql(DatabaseType::PostgreSQL);
        assert_eq!(
            sql,
            "SELECT * FROM authors WHERE EXISTS (SELECT 1 FROM authors AS sieve_reserved_0 \
             WHERE sieve_reserved_0.id = authors.mentor_id AND sieve_reserved_0.id IN ($1))"
        );
        assert_eq!(params, vec![FilterValue::Int(1)]);
    }

    #[test]
    fn test_has_orders() {
        let query = Query::new(schema(), "Author").unwrap();
        assert!(!query.has_orders());
        assert!(query.order_by(OrderByField::desc("authors.id")).has_orders());
    }
}
