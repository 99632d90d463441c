//! # Sieve
//!
//! Pluggable, relationship-aware query filters.
//!
//! Sieve provides:
//! - Model metadata and relationship resolution over dotted paths
//! - A composable query builder with correlated `EXISTS` subqueries
//! - Constraints and operators that turn submitted rules into predicates
//! - Human-readable summaries of the active rules
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use sieve::prelude::*;
//!
//! let schema = Arc::new(
//!     Schema::new()
//!         .model(ModelDef::new("Author", "authors"))
//!         .model(ModelDef::new("Post", "posts").relation(RelationSpec::many_to_one("author", "Author"))),
//! );
//!
//! let filter = QueryBuilderFilter::make("posts", schema, "Post")?
//!     .constraint(
//!         RelationshipConstraint::make("author")
//!             .selectable(IsRelatedToOperator::make().title_attribute("name")),
//!     );
//!
//! let engine = MemoryEngine::new()
//!     .with_row("authors", [("id", 3.into()), ("name", "Jane".into())])
//!     .with_row("posts", [("id", 1.into()), ("author_id", 3.into())])
//!     .with_row("posts", [("id", 2.into()), ("author_id", FilterValue::Null)]);
//!
//! let rules = vec![Rule::new("author", "isRelatedTo").inverse().with_settings(Settings::new().with("value", 3))];
//! let query = filter.apply(filter.query()?, &rules)?;
//!
//! assert_eq!(engine.pluck(&query, "id")?, vec![FilterValue::Int(2)]);
//! assert_eq!(filter.summaries(&rules, &engine)?, vec!["Author is not \"Jane\""]);
//! # Ok::<(), sieve::QueryError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Query building, model metadata and execution.
pub mod query {
    pub use sieve_query::*;
}

/// Constraints, operators and rule application.
pub mod filters {
    pub use sieve_filters::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use sieve_filters::prelude::*;
}

// Re-export key types at the crate root
pub use sieve_filters::{Operator, QueryBuilderFilter, Rule, Settings};
pub use sieve_query::{QueryError, QueryResult, SieveConfig};
