//! "Contains" / "Does not contain" over a text column.

use sieve_query::{Filter, FilterValue, Query, QueryEngine, QueryResult};

use crate::constraint::Constraint;
use crate::form::{FormField, TextInputField};
use crate::operator::{Operator, OperatorState};
use crate::operators::text_constraint;

/// Matches rows whose column contains the submitted text.
#[derive(Debug, Clone, Default)]
pub struct ContainsOperator {
    state: OperatorState,
}

impl ContainsOperator {
    /// Name used in messages.
    pub const TITLE: &'static str = "Contains";

    /// Operator identifier.
    pub const NAME: &'static str = "contains";

    /// Create the operator.
    pub fn make() -> Self {
        Self::default()
    }

    fn text(&self) -> String {
        match self.settings().get("text") {
            Some(FilterValue::Null) | None => String::new(),
            Some(value) => value.to_string(),
        }
    }
}

impl Operator for ContainsOperator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn label(&self) -> String {
        let label = if self.is_inverse() { "Does not contain" } else { "Contains" };
        label.to_string()
    }

    fn form_schema(&self) -> QueryResult<Vec<FormField>> {
        text_constraint(self, Self::TITLE)?;
        Ok(vec![TextInputField::make("text").label("Text").required(true).into()])
    }

    fn apply(&self, query: Query, qualified_column: &str) -> QueryResult<Query> {
        text_constraint(self, Self::TITLE)?;
        let condition = Filter::Contains(qualified_column.to_string(), self.text().into());
        Ok(query.r#where(if self.is_inverse() { Filter::not(condition) } else { condition }))
    }

    fn summary(&self, _engine: &dyn QueryEngine) -> QueryResult<String> {
        let constraint = text_constraint(self, Self::TITLE)?;
        let verb = if self.is_inverse() { "does not contain" } else { "contains" };
        Ok(format!("{} {} \"{}\"", constraint.attribute_label(), verb, self.text()))
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
