//! # sieve-query
//!
//! The query layer Sieve's filter operators compose against.
//!
//! This crate provides:
//! - Filter values and a filter tree that renders parameterized SQL
//! - Runtime model metadata ([`Schema`], [`ModelDef`], [`RelationSpec`])
//! - Relationship-path resolution ([`RelationshipResolver`])
//! - An immutable query builder ([`Query`]) with correlated existence checks
//! - An execution seam ([`QueryEngine`]) and an in-memory engine
//! - `sieve.toml` configuration and logging setup
//!
//! ## Filters
//!
//! ```rust
//! use sieve_query::{DatabaseType, Filter, FilterValue};
//!
//! let filter = Filter::and([
//!     Filter::Equals("active".into(), FilterValue::Bool(true)),
//!     Filter::Gt("age".into(), FilterValue::Int(18)),
//! ]);
//!
//! let (sql, params) = filter.to_sql(DatabaseType::PostgreSQL);
//! assert_eq!(sql, "(active = $1 AND age > $2)");
//! assert_eq!(params.len(), 2);
//! ```
//!
//! ## Relationship Checks
//!
//! Relationship predicates are correlated `EXISTS` subqueries, never joins,
//! so to-many relations don't multiply the outer rows:
//!
//! ```rust
//! use std::sync::Arc;
//! use sieve_query::{DatabaseType, JoinTableSpec, ModelDef, Query, RelationSpec, Schema};
//!
//! let schema = Arc::new(
//!     Schema::new()
//!         .model(ModelDef::new("Tag", "tags"))
//!         .model(ModelDef::new("Post", "posts").relation(RelationSpec::many_to_many(
//!             "tags",
//!             "Tag",
//!             JoinTableSpec::new("post_tag", "post_id", "tag_id"),
//!         ))),
//! );
//!
//! let query = Query::new(schema, "Post")?.where_has("tags", |q| q.where_key([1, 2]))?;
//! let (sql, _) = query.to_sql(DatabaseType::PostgreSQL);
//! assert!(sql.starts_with("SELECT * FROM posts WHERE EXISTS (SELECT 1 FROM tags INNER JOIN post_tag"));
//! # Ok::<(), sieve_query::QueryError>(())
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use sieve_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::missing_configuration("title attribute is required");
//! assert_eq!(err.code, ErrorCode::MissingConfiguration);
//! assert!(err.is_configuration_error());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod logging;
pub mod query;
pub mod relations;
pub mod schema;
pub mod sql;
pub mod types;

pub use config::{DebugConfig, OperatorDefaults, SieveConfig};
pub use engine::{MemoryEngine, QueryEngine, Record};
pub use error::{ErrorCode, ErrorContext, QueryError, QueryResult};
pub use filter::{ExistsFilter, Filter, FilterValue, RelationLink};
pub use query::{Join, Query};
pub use relations::{
    JoinTableSpec, RelationHop, RelationSpec, RelationType, RelationshipHandle, RelationshipResolver,
};
pub use schema::{ModelDef, Schema};
pub use sql::{DatabaseType, SqlBuilder};
pub use types::{OrderBy, OrderByField, Select, SortOrder};

// Re-export logging utilities
pub use logging::{get_log_format, get_log_level, init as init_logging, is_debug_enabled};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::SieveConfig;
    pub use crate::engine::{MemoryEngine, QueryEngine, Record};
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::filter::{Filter, FilterValue};
    pub use crate::query::Query;
    pub use crate::relations::{JoinTableSpec, RelationSpec, RelationType, RelationshipResolver};
    pub use crate::schema::{ModelDef, Schema};
    pub use crate::sql::DatabaseType;
    pub use crate::types::{OrderBy, OrderByField, SortOrder};
}
