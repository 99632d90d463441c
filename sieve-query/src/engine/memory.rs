//! In-process query evaluation.

use std::cmp::Ordering;

use indexmap::IndexMap;
use parking_lot::RwLock;
use smol_str::SmolStr;
use tracing::{debug, info};

use crate::error::QueryResult;
use crate::filter::{ExistsFilter, Filter, FilterValue, RelationLink};
use crate::query::Query;
use crate::sql::DatabaseType;
use crate::types::SortOrder;

use super::{bare_column, QueryEngine, Record};

/// Tables of rows held in memory.
///
/// Evaluates the whole [`Filter`] tree, including correlated existence
/// subqueries, inner joins, DISTINCT, ordering and limits. Keys compare the
/// way a database compares a key column with a bound parameter, so `3` and
/// `"3"` match.
///
/// ```rust
/// use std::sync::Arc;
/// use sieve_query::{FilterValue, MemoryEngine, ModelDef, Query, QueryEngine, Schema};
///
/// let schema = Arc::new(Schema::new().model(ModelDef::new("Author", "authors")));
/// let engine = MemoryEngine::new()
///     .with_row("authors", [("id", 3.into()), ("name", "Jane".into())])
///     .with_row("authors", [("id", 5.into()), ("name", "Bob".into())]);
///
/// let query = Query::new(schema, "Author").unwrap().where_key(["5"]);
/// let names = engine.pluck(&query, "authors.name").unwrap();
/// assert_eq!(names, vec![FilterValue::from("Bob")]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: RwLock<IndexMap<SmolStr, Vec<Record>>>,
    log_queries: bool,
}

/// Rows visible while evaluating a filter: the current row first, then the
/// rows of every enclosing query.
type Scope<'a> = Vec<(&'a str, &'a Record)>;

impl MemoryEngine {
    /// Create an engine with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every evaluated query at `info` instead of `debug`.
    pub fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    /// Insert a row (builder style).
    pub fn with_row<K, I>(self, table: &str, row: I) -> Self
    where
        K: Into<SmolStr>,
        I: IntoIterator<Item = (K, FilterValue)>,
    {
        self.insert(table, row);
        self
    }

    /// Append a row to `table`, creating the table if needed.
    pub fn insert<K, I>(&self, table: &str, row: I)
    where
        K: Into<SmolStr>,
        I: IntoIterator<Item = (K, FilterValue)>,
    {
        let record: Record = row.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.tables
            .write()
            .entry(SmolStr::new(table))
            .or_default()
            .push(record);
    }

    /// Snapshot of a table's rows.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    /// Number of rows in a table.
    pub fn len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, Vec::len)
    }

    /// Check whether a table has no rows.
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}

impl QueryEngine for MemoryEngine {
    fn fetch(&self, query: &Query) -> QueryResult<Vec<Record>> {
        if self.log_queries {
            let (sql, params) = query.to_sql(DatabaseType::PostgreSQL);
            info!(sql = %sql, params = ?params, "Evaluating query in memory");
        } else if tracing::enabled!(tracing::Level::DEBUG) {
            let (sql, params) = query.to_sql(DatabaseType::PostgreSQL);
            debug!(sql = %sql, params = ?params, "Evaluating query in memory");
        }

        let tables = self.tables.read();
        let eval = Evaluator { tables: &tables };
        let table = query.model().table.as_str();
        let empty = Vec::new();
        let base = tables.get(table).unwrap_or(&empty);

        let mut rows: Vec<(Record, Vec<FilterValue>)> = Vec::new();
        for record in base {
            let mut scopes: Vec<Scope<'_>> = vec![vec![(table, record)]];

            for join in query.joins() {
                let joined = tables.get(join.table.as_str()).unwrap_or(&empty);
                scopes = scopes
                    .into_iter()
                    .flat_map(|scope| {
                        joined
                            .iter()
                            .filter_map(|row| {
                                let mut widened = scope.clone();
                                widened.push((join.table.as_str(), row));
                                let left = lookup(&widened, &join.left);
                                let right = lookup(&widened, &join.right);
                                left.loosely_equals(&right).then_some(widened)
                            })
                            .collect::<Vec<_>>()
                    })
                    .collect();
            }

            for scope in scopes {
                if !eval.matches(query.filter(), &scope) {
                    continue;
                }
                let keys = query
                    .order()
                    .fields()
                    .iter()
                    .map(|field| lookup(&scope, &field.column))
                    .collect();
                rows.push((record.clone(), keys));
            }
        }

        if query.is_distinct() {
            let mut unique: Vec<(Record, Vec<FilterValue>)> = Vec::with_capacity(rows.len());
            for row in rows {
                if !unique.iter().any(|(seen, _)| *seen == row.0) {
                    unique.push(row);
                }
            }
            rows = unique;
        }

        let order = query.order().fields();
        if !order.is_empty() {
            rows.sort_by(|(_, a), (_, b)| {
                order
                    .iter()
                    .zip(a.iter().zip(b.iter()))
                    .map(|(field, (x, y))| match field.order {
                        SortOrder::Asc => x.sort_cmp(y),
                        SortOrder::Desc => y.sort_cmp(x),
                    })
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let limit = query.limit().map_or(usize::MAX, |n| n as usize);
        Ok(rows.into_iter().take(limit).map(|(record, _)| record).collect())
    }
}

/// Resolve a (possibly qualified) column against a scope.
fn lookup(scope: &Scope<'_>, column: &str) -> FilterValue {
    let record = match column.split_once('.') {
        Some((table, _)) => scope.iter().find(|(name, _)| *name == table).map(|(_, r)| *r),
        None => scope.first().map(|(_, r)| *r),
    };
    record
        .and_then(|r| r.get(bare_column(column)))
        .cloned()
        .unwrap_or(FilterValue::Null)
}

struct Evaluator<'t> {
    tables: &'t IndexMap<SmolStr, Vec<Record>>,
}

impl<'t> Evaluator<'t> {
    fn matches(&self, filter: &Filter, scope: &Scope<'_>) -> bool {
        match filter {
            Filter::None => true,

            Filter::Equals(col, val) => {
                let actual = lookup(scope, col);
                if val.is_null() {
                    actual.is_null()
                } else {
                    actual.loosely_equals(val)
                }
            }
            Filter::NotEquals(col, val) => {
                let actual = lookup(scope, col);
                if val.is_null() {
                    !actual.is_null()
                } else {
                    !actual.is_null() && !actual.loosely_equals(val)
                }
            }

            Filter::Lt(col, val) => compares(scope, col, val, |o| o == Ordering::Less),
            Filter::Lte(col, val) => compares(scope, col, val, |o| o != Ordering::Greater),
            Filter::Gt(col, val) => compares(scope, col, val, |o| o == Ordering::Greater),
            Filter::Gte(col, val) => compares(scope, col, val, |o| o != Ordering::Less),

            Filter::In(col, values) => {
                let actual = lookup(scope, col);
                values.iter().any(|v| actual.loosely_equals(v))
            }
            Filter::NotIn(col, values) => {
                if values.is_empty() {
                    return true;
                }
                let actual = lookup(scope, col);
                !actual.is_null() && !values.iter().any(|v| actual.loosely_equals(v))
            }

            Filter::Contains(col, val) => text_matches(scope, col, val, false, |h, n| h.contains(n)),
            Filter::ContainsInsensitive(col, val) => text_matches(scope, col, val, true, |h, n| h.contains(n)),
            Filter::StartsWith(col, val) => text_matches(scope, col, val, false, |h, n| h.starts_with(n)),
            Filter::EndsWith(col, val) => text_matches(scope, col, val, false, |h, n| h.ends_with(n)),

            Filter::IsNull(col) => lookup(scope, col).is_null(),
            Filter::IsNotNull(col) => !lookup(scope, col).is_null(),

            Filter::Exists(exists) => self.exists(exists, scope),
            Filter::NotExists(exists) => !self.exists(exists, scope),

            Filter::And(filters) => filters.iter().all(|f| self.matches(f, scope)),
            Filter::Or(filters) => filters.iter().any(|f| self.matches(f, scope)),
            Filter::Not(inner) => !self.matches(inner, scope),
        }
    }

    fn exists(&self, exists: &ExistsFilter, scope: &Scope<'_>) -> bool {
        let Some(parent) = scope
            .iter()
            .find(|(name, _)| *name == exists.parent_table.as_str())
            .map(|(_, r)| *r)
        else {
            return false;
        };
        let Some(related) = self.tables.get(exists.related_table.as_str()) else {
            return false;
        };
        let related_table = exists.related_table.as_str();

        match &exists.link {
            RelationLink::Direct { pairs } => related.iter().any(|row| {
                let linked = pairs.iter().all(|(parent_col, related_col)| {
                    value_of(parent, parent_col).loosely_equals(&value_of(row, related_col))
                });
                linked && self.matches(&exists.filter, &nested(scope, related_table, row, None))
            }),
            RelationLink::Pivot {
                table,
                parent_key,
                source_column,
                target_column,
                related_key,
            } => {
                let Some(pivot_rows) = self.tables.get(table.as_str()) else {
                    return false;
                };
                let parent_value = value_of(parent, parent_key);
                pivot_rows
                    .iter()
                    .filter(|pivot| value_of(pivot, source_column).loosely_equals(&parent_value))
                    .any(|pivot| {
                        let target = value_of(pivot, target_column);
                        related.iter().any(|row| {
                            value_of(row, related_key).loosely_equals(&target)
                                && self.matches(
                                    &exists.filter,
                                    &nested(scope, related_table, row, Some((table.as_str(), pivot))),
                                )
                        })
                    })
            }
        }
    }
}

fn nested<'a>(
    outer: &Scope<'a>,
    table: &'a str,
    row: &'a Record,
    pivot: Option<(&'a str, &'a Record)>,
) -> Scope<'a> {
    let mut scope: Scope<'a> = Vec::with_capacity(outer.len() + 2);
    scope.push((table, row));
    scope.extend(pivot);
    scope.extend(outer.iter().copied());
    scope
}

fn value_of(record: &Record, column: &str) -> FilterValue {
    record.get(column).cloned().unwrap_or(FilterValue::Null)
}

fn compares(scope: &Scope<'_>, col: &str, val: &FilterValue, accept: impl Fn(Ordering) -> bool) -> bool {
    lookup(scope, col).compare(val).is_some_and(accept)
}

fn text_matches(
    scope: &Scope<'_>,
    col: &str,
    val: &FilterValue,
    case_insensitive: bool,
    test: impl Fn(&str, &str) -> bool,
) -> bool {
    let actual = lookup(scope, col);
    if actual.is_null() || val.is_null() {
        return false;
    }
    let (haystack, needle) = (actual.to_string(), val.to_string());
    if case_insensitive {
        test(&haystack.to_lowercase(), &needle.to_lowercase())
    } else {
        test(&haystack, &needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::relations::{JoinTableSpec, RelationSpec};
    use crate::schema::{ModelDef, Schema};
    use crate::types::OrderByField;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new()
                .model(ModelDef::new("Author", "authors"))
                .model(ModelDef::new("Tag", "tags"))
                .model(
                    ModelDef::new("Post", "posts")
                        .relation(RelationSpec::many_to_one("author", "Author"))
                        .relation(RelationSpec::many_to_many(
                            "tags",
                            "Tag",
                            JoinTableSpec::new("post_tag", "post_id", "tag_id"),
                        )),
                ),
        )
    }

    fn engine() -> MemoryEngine {
        MemoryEngine::new()
            .with_row("authors", [("id", 3.into()), ("name", "Jane".into())])
            .with_row("authors", [("id", 5.into()), ("name", "Bob".into())])
            .with_row("posts", [("id", 1.into()), ("author_id", 3.into())])
            .with_row("posts", [("id", 2.into()), ("author_id", 5.into())])
            .with_row("posts", [("id", 3.into()), ("author_id", FilterValue::Null)])
            .with_row("tags", [("id", 10.into()), ("name", "rust".into())])
            .with_row("tags", [("id", 11.into()), ("name", "sql".into())])
            .with_row("post_tag", [("post_id", 1.into()), ("tag_id", 10.into())])
            .with_row("post_tag", [("post_id", 2.into()), ("tag_id", 10.into())])
            .with_row("post_tag", [("post_id", 2.into()), ("tag_id", 11.into())])
    }

    fn ids(records: &[Record]) -> Vec<FilterValue> {
        records.iter().map(|r| value_of(r, "id")).collect()
    }

    #[test]
    fn test_exists_direct() {
        let query = Query::new(schema(), "Post")
            .unwrap()
            .where_has("author", |q| q.where_key(["3"]))
            .unwrap();
        assert_eq!(ids(&engine().fetch(&query).unwrap()), vec![FilterValue::Int(1)]);
    }

    #[test]
    fn test_not_exists_includes_unrelated_rows() {
        let query = Query::new(schema(), "Post")
            .unwrap()
            .where_doesnt_have("author", |q| q.where_key([3]))
            .unwrap();
        assert_eq!(
            ids(&engine().fetch(&query).unwrap()),
            vec![FilterValue::Int(2), FilterValue::Int(3)]
        );
    }

    #[test]
    fn test_exists_pivot() {
        let query = Query::new(schema(), "Post")
            .unwrap()
            .where_has("tags", |q| q.where_key([11]))
            .unwrap();
        assert_eq!(ids(&engine().fetch(&query).unwrap()), vec![FilterValue::Int(2)]);
    }

    #[test]
    fn test_join_repeats_rows_until_distinct() {
        let schema = schema();
        let tags = Arc::clone(schema.get_model("Tag").unwrap());
        let joined = Query::for_model(Arc::clone(&schema), tags).join(crate::query::Join::inner(
            "post_tag",
            "post_tag.tag_id",
            "tags.id",
        ));
        let engine = engine();
        assert_eq!(engine.pluck(&joined, "tags.name").unwrap().len(), 3);
        assert_eq!(
            engine.pluck(&joined.distinct(), "tags.name").unwrap(),
            vec![FilterValue::from("rust"), FilterValue::from("sql")]
        );
    }

    #[test]
    fn test_order_and_limit() {
        let query = Query::new(schema(), "Author")
            .unwrap()
            .order_by(OrderByField::asc("authors.name"))
            .take(1);
        assert_eq!(engine().pluck(&query, "name").unwrap(), vec![FilterValue::from("Bob")]);
    }

    #[test]
    fn test_contains_insensitive() {
        let query = Query::new(schema(), "Author")
            .unwrap()
            .r#where(Filter::ContainsInsensitive("authors.name".into(), "JA".into()));
        assert_eq!(engine().pluck(&query, "name").unwrap(), vec![FilterValue::from("Jane")]);
    }

    #[test]
    fn test_insert_and_len() {
        let engine = MemoryEngine::new();
        assert!(engine.is_empty("authors"));
        engine.insert("authors", [("id", FilterValue::Int(1))]);
        assert_eq!(engine.len("authors"), 1);
        assert_eq!(engine.rows("authors")[0].get("id"), Some(&FilterValue::Int(1)));
    }
}
