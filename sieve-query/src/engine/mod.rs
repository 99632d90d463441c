//! Query execution.
//!
//! [`QueryEngine`] is the seam between composed queries and whatever stores
//! the rows. [`MemoryEngine`] evaluates queries against in-process tables.

mod memory;

pub use memory::MemoryEngine;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::error::QueryResult;
use crate::filter::FilterValue;
use crate::query::Query;

/// A fetched row, keyed by bare column name.
pub type Record = IndexMap<SmolStr, FilterValue>;

/// Executes composed queries.
pub trait QueryEngine: Send + Sync {
    /// Fetch the rows of the queried model.
    fn fetch(&self, query: &Query) -> QueryResult<Vec<Record>>;

    /// Fetch a single column from every row.
    ///
    /// `column` may be table-qualified. Distinct queries yield a value once
    /// per distinct combination of [`Query::pluck_projection`], in
    /// first-seen order.
    fn pluck(&self, query: &Query, column: &str) -> QueryResult<Vec<FilterValue>> {
        let name = bare_column(column);
        let projection = query.pluck_projection(column);
        let mut seen: Vec<Vec<FilterValue>> = Vec::new();
        let mut values = Vec::new();
        for record in self.fetch(query)? {
            if query.is_distinct() {
                let key: Vec<FilterValue> = projection
                    .columns()
                    .iter()
                    .map(|c| record.get(bare_column(c)).cloned().unwrap_or(FilterValue::Null))
                    .collect();
                if seen.contains(&key) {
                    continue;
                }
                seen.push(key);
            }
            values.push(record.get(name).cloned().unwrap_or(FilterValue::Null));
        }
        Ok(values)
    }
}

/// Strip a `table.` prefix from a column reference.
pub fn bare_column(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column)
}
