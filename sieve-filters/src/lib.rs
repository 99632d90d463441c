//! # sieve-filters
//!
//! Constraint and operator abstractions on top of [`sieve_query`].
//!
//! A [`QueryBuilderFilter`] owns a set of constraints over one model. Each
//! constraint offers operators; a submitted [`Rule`] picks a constraint, an
//! operator and its settings, and the filter turns the rule into a predicate
//! on the query and into a human-readable summary.
//!
//! ```rust
//! use std::sync::Arc;
//! use sieve_filters::prelude::*;
//!
//! let schema = Arc::new(
//!     Schema::new()
//!         .model(ModelDef::new("Author", "authors"))
//!         .model(ModelDef::new("Post", "posts").relation(RelationSpec::many_to_one("author", "Author"))),
//! );
//!
//! let filter = QueryBuilderFilter::make("posts", schema, "Post")
//!     .unwrap()
//!     .constraint(
//!         RelationshipConstraint::make("author")
//!             .selectable(IsRelatedToOperator::make().title_attribute("name")),
//!     );
//!
//! let engine = MemoryEngine::new()
//!     .with_row("authors", [("id", 3.into()), ("name", "Jane".into())])
//!     .with_row("posts", [("id", 1.into()), ("author_id", 3.into())]);
//!
//! let rules = vec![Rule::new("author", "isRelatedTo").with_settings(Settings::new().with("value", 3))];
//! let query = filter.apply(filter.query().unwrap(), &rules).unwrap();
//!
//! assert_eq!(engine.fetch(&query).unwrap().len(), 1);
//! assert_eq!(filter.summaries(&rules, &engine).unwrap(), vec!["Author is \"Jane\""]);
//! ```

pub mod constraint;
pub mod context;
pub mod filter;
pub mod form;
pub mod lazy;
pub mod operator;
pub mod operators;
pub mod settings;

pub use constraint::{Constraint, FilterBinding, RelationshipConstraint, TextConstraint};
pub use context::EvaluationContext;
pub use filter::{QueryBuilderFilter, Rule};
pub use form::{
    FormField, OptionHooks, OptionSource, QueryModifier, SelectField, SelectOption, TextInputField,
};
pub use lazy::{Computation, LazyValue};
pub use operator::{join_with_final, Operator, OperatorState};
pub use operators::{ContainsOperator, IsEmptyOperator, IsRelatedToOperator};
pub use settings::Settings;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::constraint::{Constraint, RelationshipConstraint, TextConstraint};
    pub use crate::filter::{QueryBuilderFilter, Rule};
    pub use crate::form::{FormField, SelectField, SelectOption};
    pub use crate::lazy::LazyValue;
    pub use crate::operator::Operator;
    pub use crate::operators::{ContainsOperator, IsEmptyOperator, IsRelatedToOperator};
    pub use crate::settings::Settings;
    pub use sieve_query::prelude::*;
}
