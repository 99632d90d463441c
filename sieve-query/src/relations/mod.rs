//! Relation metadata and relationship-path resolution.
//!
//! This module provides:
//! - [`RelationSpec`] describing how two models relate
//! - [`RelationshipResolver`] walking a dotted path (`author.company`) over a
//!   [`Schema`](crate::Schema) into a [`RelationshipHandle`]
//!
//! ## Example
//!
//! ```rust
//! use sieve_query::{ModelDef, RelationSpec, RelationshipResolver, Schema};
//!
//! let schema = Schema::new()
//!     .model(ModelDef::new("Author", "authors"))
//!     .model(ModelDef::new("Post", "posts").relation(RelationSpec::many_to_one("author", "Author")));
//!
//! let handle = RelationshipResolver::resolve(&schema, "Post", "author").unwrap();
//! assert_eq!(handle.related_model().name, "Author");
//! assert!(RelationshipResolver::resolve(&schema, "Post", "title").is_none());
//! ```

mod resolver;
mod spec;

pub use resolver::{RelationHop, RelationshipHandle, RelationshipResolver};
pub use spec::{JoinTableSpec, RelationSpec, RelationType};
