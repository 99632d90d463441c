//! "Is empty" / "Is not empty" over a relationship.

use sieve_query::{Query, QueryEngine, QueryResult};

use crate::constraint::Constraint;
use crate::form::FormField;
use crate::operator::{Operator, OperatorState};
use crate::operators::relationship_constraint;

/// Matches rows with no related record.
#[derive(Debug, Clone, Default)]
pub struct IsEmptyOperator {
    state: OperatorState,
}

impl IsEmptyOperator {
    /// Name used in messages.
    pub const TITLE: &'static str = "Is empty";

    /// Operator identifier.
    pub const NAME: &'static str = "isEmpty";

    /// Create the operator.
    pub fn make() -> Self {
        Self::default()
    }
}

impl Operator for IsEmptyOperator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn label(&self) -> String {
        let label = if self.is_inverse() { "Is not empty" } else { "Is empty" };
        label.to_string()
    }

    fn form_schema(&self) -> QueryResult<Vec<FormField>> {
        relationship_constraint(self, Self::TITLE)?;
        Ok(Vec::new())
    }

    fn apply(&self, query: Query, _qualified_column: &str) -> QueryResult<Query> {
        let constraint = relationship_constraint(self, Self::TITLE)?;
        query.where_relation_exists(constraint.relationship_name(), !self.is_inverse(), |related| related)
    }

    fn summary(&self, _engine: &dyn QueryEngine) -> QueryResult<String> {
        let constraint = relationship_constraint(self, Self::TITLE)?;
        let state = if self.is_inverse() { "is not empty" } else { "is empty" };
        Ok(format!("{} {}", constraint.attribute_label(), state))
    }

    fn state(&self) -> &OperatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OperatorState {
        &mut self.state
    }

    fn box_clone(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::constraint::{FilterBinding, RelationshipConstraint, TextConstraint};
    use sieve_query::{ErrorCode, FilterValue, MemoryEngine, ModelDef, RelationSpec, Schema};

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new()
                .model(ModelDef::new("Author", "authors"))
                .model(ModelDef::new("Post", "posts").relation(RelationSpec::many_to_one("author", "Author"))),
        )
    }

    fn operator(inverse: bool) -> IsEmptyOperator {
        let mut constraint = RelationshipConstraint::make("author");
        constraint.bind(FilterBinding::new(schema(), "Post"));
        let mut operator = IsEmptyOperator::make();
        operator.attach(Arc::new(constraint));
        operator.set_inverse(inverse);
        operator
    }

    fn engine() -> MemoryEngine {
        MemoryEngine::new()
            .with_row("authors", [("id", 3.into())])
            .with_row("posts", [("id", 1.into()), ("author_id", 3.into())])
            .with_row("posts", [("id", 2.into()), ("author_id", 9.into())])
            .with_row("posts", [("id", 3.into()), ("author_id", FilterValue::Null)])
    }

    fn matching(operator: &IsEmptyOperator) -> Vec<FilterValue> {
        let query = operator
            .apply(Query::new(schema(), "Post").unwrap(), "posts.author")
            .unwrap();
        engine().pluck(&query, "id").unwrap()
    }

    #[test]
    fn test_labels() {
        assert_eq!(operator(false).label(), "Is empty");
        assert_eq!(operator(true).label(), "Is not empty");
    }

    #[test]
    fn test_empty_relationship() {
        assert_eq!(matching(&operator(false)), vec![FilterValue::Int(2), FilterValue::Int(3)]);
        assert_eq!(matching(&operator(true)), vec![FilterValue::Int(1)]);
    }

    #[test]
    fn test_summary() {
        let engine = engine();
        assert_eq!(operator(false).summary(&engine).unwrap(), "Author is empty");
        assert_eq!(operator(true).summary(&engine).unwrap(), "Author is not empty");
    }

    #[test]
    fn test_form_schema_is_empty() {
        assert!(operator(false).form_schema().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_text_constraint_by_its_own_name() {
        let mut operator = IsEmptyOperator::make();
        operator.attach(Arc::new(TextConstraint::make("title")));
        let err = operator.form_schema().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConstraintMismatch);
        assert_eq!(err.message, "Is empty operator can only be used with relationship constraints.");
    }
}
