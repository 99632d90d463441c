//! Built-in operators.
//!
//! - [`IsRelatedToOperator`]: the row is (not) related to one of the selected records.
//! - [`IsEmptyOperator`]: the row has no (some) related records.
//! - [`ContainsOperator`]: a text column (does not) contain a substring.

mod contains;
mod is_empty;
mod is_related_to;

pub use contains::ContainsOperator;
pub use is_empty::IsEmptyOperator;
pub use is_related_to::IsRelatedToOperator;

use sieve_query::{QueryError, QueryResult};

use crate::constraint::{Constraint, RelationshipConstraint, TextConstraint};
use crate::operator::Operator;

/// The attached constraint as a relationship constraint.
///
/// `title` names the operator in the mismatch message.
pub(crate) fn relationship_constraint<'a>(
    operator: &'a dyn Operator,
    title: &str,
) -> QueryResult<&'a RelationshipConstraint> {
    attached(operator)?.as_relationship().ok_or_else(|| {
        QueryError::constraint_mismatch(format!(
            "{} operator can only be used with relationship constraints.",
            title
        ))
        .with_context(operator.name().to_string())
    })
}

/// The attached constraint as a text constraint.
pub(crate) fn text_constraint<'a>(operator: &'a dyn Operator, title: &str) -> QueryResult<&'a TextConstraint> {
    attached(operator)?.as_text().ok_or_else(|| {
        QueryError::constraint_mismatch(format!("{} operator can only be used with text constraints.", title))
            .with_context(operator.name().to_string())
    })
}

fn attached(operator: &dyn Operator) -> QueryResult<&dyn Constraint> {
    operator.attached_constraint().map(|c| c.as_ref()).ok_or_else(|| {
        QueryError::missing_configuration(format!(
            "The [{}] operator is not attached to a constraint.",
            operator.name()
        ))
    })
}
