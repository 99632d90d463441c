//! The operator contract.
//!
//! An operator is one way of filtering a constraint ("is", "is empty",
//! "contains"). Constraints hold operator *templates*; for every request the
//! filter clones a template, attaches the constraint, and fills in the
//! submitted settings before applying it.

use std::fmt;
use std::sync::Arc;

use sieve_query::{Query, QueryEngine, QueryResult, Record};

use crate::constraint::Constraint;
use crate::context::EvaluationContext;
use crate::form::FormField;
use crate::settings::Settings;

/// Per-request state shared by every operator.
#[derive(Debug, Clone, Default)]
pub struct OperatorState {
    /// The constraint this instance filters.
    pub constraint: Option<Arc<dyn Constraint>>,
    /// Whether the predicate is negated.
    pub inverse: bool,
    /// Submitted settings.
    pub settings: Settings,
    /// Record being edited, if any.
    pub record: Option<Record>,
}

/// A pluggable predicate over a constraint.
pub trait Operator: Send + Sync + fmt::Debug {
    /// Stable identifier, unique within a constraint.
    fn name(&self) -> &str;

    /// Display text; may depend on [`is_inverse`](Self::is_inverse).
    fn label(&self) -> String;

    /// Fields that capture this operator's settings.
    fn form_schema(&self) -> QueryResult<Vec<FormField>>;

    /// Compose this operator's predicate into `query`.
    ///
    /// Reads only the settings; the same query and settings always yield the
    /// same result.
    fn apply(&self, query: Query, qualified_column: &str) -> QueryResult<Query>;

    /// Describe the configured predicate for humans.
    fn summary(&self, engine: &dyn QueryEngine) -> QueryResult<String>;

    /// Shared state.
    fn state(&self) -> &OperatorState;

    /// Shared state, mutably.
    fn state_mut(&mut self) -> &mut OperatorState;

    /// Clone into a box.
    fn box_clone(&self) -> Box<dyn Operator>;

    /// Whether the predicate is negated.
    fn is_inverse(&self) -> bool {
        self.state().inverse
    }

    /// Submitted settings.
    fn settings(&self) -> &Settings {
        &self.state().settings
    }

    /// The attached constraint, whatever its kind.
    fn attached_constraint(&self) -> Option<&Arc<dyn Constraint>> {
        self.state().constraint.as_ref()
    }

    /// Attach the constraint this instance filters.
    fn attach(&mut self, constraint: Arc<dyn Constraint>) {
        self.state_mut().constraint = Some(constraint);
    }

    /// Negate (or un-negate) the predicate.
    fn set_inverse(&mut self, inverse: bool) {
        self.state_mut().inverse = inverse;
    }

    /// Replace the submitted settings.
    fn fill(&mut self, settings: Settings) {
        self.state_mut().settings = settings;
    }

    /// The context lazily configured values are resolved against.
    fn context(&self) -> EvaluationContext<'_> {
        let state = self.state();
        let constraint = state.constraint.as_deref();
        EvaluationContext {
            operator: self.name(),
            constraint: constraint.map(|c| c.name()),
            model: constraint.and_then(|c| c.binding()).map(|b| b.model.as_str()),
            inverse: state.inverse,
            settings: &state.settings,
            record: state.record.as_ref(),
        }
    }
}

impl Clone for Box<dyn Operator> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Join items as prose: `A`, `A or B`, `A, B or C`.
pub fn join_with_final(items: &[String], glue: &str, final_glue: &str) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{}{}{}", init.join(glue), final_glue, last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_join_with_final() {
        assert_eq!(join_with_final(&strings(&[]), ", ", " or "), "");
        assert_eq!(join_with_final(&strings(&["A"]), ", ", " or "), "A");
        assert_eq!(join_with_final(&strings(&["A", "B"]), ", ", " or "), "A or B");
        assert_eq!(join_with_final(&strings(&["A", "B", "C"]), ", ", " or "), "A, B or C");
    }
}
