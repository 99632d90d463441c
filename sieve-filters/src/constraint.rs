//! Filterable attributes and the operators they offer.

use std::fmt;
use std::sync::Arc;

use convert_case::{Case, Casing};
use sieve_query::{QueryError, QueryResult, Schema};
use smol_str::SmolStr;

use crate::operator::Operator;
use crate::operators::{ContainsOperator, IsEmptyOperator, IsRelatedToOperator};

/// Where a constraint lives: the owning filter's schema and root model.
#[derive(Debug, Clone)]
pub struct FilterBinding {
    /// Schema relationships are resolved against.
    pub schema: Arc<Schema>,
    /// Root model of the owning filter.
    pub model: SmolStr,
}

impl FilterBinding {
    /// Create a binding.
    pub fn new(schema: Arc<Schema>, model: impl Into<SmolStr>) -> Self {
        Self {
            schema,
            model: model.into(),
        }
    }
}

/// A filterable attribute.
pub trait Constraint: Send + Sync + fmt::Debug {
    /// Identifier, unique within a filter.
    fn name(&self) -> &str;

    /// Human label for the attribute.
    fn attribute_label(&self) -> String;

    /// The column or relationship path this constraint filters.
    fn attribute(&self) -> &str;

    /// The owning filter, once registered.
    fn binding(&self) -> Option<&FilterBinding>;

    /// Register with a filter.
    fn bind(&mut self, binding: FilterBinding);

    /// Operator templates, in display order.
    fn operators(&self) -> &[Box<dyn Operator>];

    /// Find an operator template by name.
    fn get_operator(&self, name: &str) -> Option<&dyn Operator> {
        self.operators()
            .iter()
            .find(|op| op.name() == name)
            .map(|op| op.as_ref())
    }

    /// The owning filter, or an error naming this constraint.
    fn require_binding(&self) -> QueryResult<&FilterBinding> {
        self.binding().ok_or_else(|| {
            QueryError::missing_configuration(format!(
                "The [{}] constraint is not registered with a filter.",
                self.name()
            ))
        })
    }

    /// Narrow to a relationship constraint.
    fn as_relationship(&self) -> Option<&RelationshipConstraint> {
        None
    }

    /// Narrow to a text constraint.
    fn as_text(&self) -> Option<&TextConstraint> {
        None
    }
}

/// `author_name` / `authorName` -> `Author name`.
pub(crate) fn headline(name: &str) -> String {
    let words = name.to_case(Case::Lower);
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Filters rows by what they are related to.
///
/// ```rust
/// use sieve_filters::{Constraint, IsRelatedToOperator, RelationshipConstraint};
///
/// let author = RelationshipConstraint::make("author")
///     .selectable(IsRelatedToOperator::make().title_attribute("name"));
///
/// assert_eq!(author.attribute_label(), "Author");
/// assert_eq!(author.relationship_name(), "author");
/// assert!(author.get_operator("isRelatedTo").is_some());
/// assert!(author.get_operator("isEmpty").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct RelationshipConstraint {
    name: SmolStr,
    relationship: Option<SmolStr>,
    label: Option<String>,
    multiple: bool,
    binding: Option<FilterBinding>,
    operators: Vec<Box<dyn Operator>>,
}

impl RelationshipConstraint {
    /// Create a constraint over the relationship called `name`.
    pub fn make(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            relationship: None,
            label: None,
            multiple: false,
            binding: None,
            operators: vec![Box::new(IsEmptyOperator::make())],
        }
    }

    /// Follow a different (possibly dotted) relationship path.
    pub fn relationship(mut self, path: impl Into<SmolStr>) -> Self {
        self.relationship = Some(path.into());
        self
    }

    /// Set the attribute label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Select several related records instead of one.
    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// Offer an "is related to" operator.
    pub fn selectable(mut self, operator: IsRelatedToOperator) -> Self {
        self.operators.insert(0, Box::new(operator));
        self
    }

    /// Offer an additional operator.
    pub fn operator(mut self, operator: impl Operator + 'static) -> Self {
        self.operators.push(Box::new(operator));
        self
    }

    /// The relationship path, defaulting to the constraint name.
    pub fn relationship_name(&self) -> &str {
        self.relationship.as_deref().unwrap_or(&self.name)
    }

    /// Whether several related records can be selected.
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }
}

impl Constraint for RelationshipConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn attribute_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| headline(&self.name))
    }

    fn attribute(&self) -> &str {
        self.relationship_name()
    }

    fn binding(&self) -> Option<&FilterBinding> {
        self.binding.as_ref()
    }

    fn bind(&mut self, binding: FilterBinding) {
        self.binding = Some(binding);
    }

    fn operators(&self) -> &[Box<dyn Operator>] {
        &self.operators
    }

    fn as_relationship(&self) -> Option<&RelationshipConstraint> {
        Some(self)
    }
}

/// Filters rows by a text column.
#[derive(Debug, Clone)]
pub struct TextConstraint {
    name: SmolStr,
    column: Option<SmolStr>,
    label: Option<String>,
    binding: Option<FilterBinding>,
    operators: Vec<Box<dyn Operator>>,
}

impl TextConstraint {
    /// Create a constraint over the column called `name`.
    pub fn make(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            column: None,
            label: None,
            binding: None,
            operators: vec![Box::new(ContainsOperator::make())],
        }
    }

    /// Filter a differently named column.
    pub fn column(mut self, column: impl Into<SmolStr>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Set the attribute label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Offer an additional operator.
    pub fn operator(mut self, operator: impl Operator + 'static) -> Self {
        self.operators.push(Box::new(operator));
        self
    }
}

impl Constraint for TextConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn attribute_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| headline(&self.name))
    }

    fn attribute(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    fn binding(&self) -> Option<&FilterBinding> {
        self.binding.as_ref()
    }

    fn bind(&mut self, binding: FilterBinding) {
        self.binding = Some(binding);
    }

    fn operators(&self) -> &[Box<dyn Operator>] {
        &self.operators
    }

    fn as_text(&self) -> Option<&TextConstraint> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headline() {
        assert_eq!(headline("author"), "Author");
        assert_eq!(headline("author_name"), "Author name");
        assert_eq!(headline("publishedAt"), "Published at");
        assert_eq!(headline(""), "");
    }

    #[test]
    fn test_relationship_defaults_to_name() {
        let constraint = RelationshipConstraint::make("author");
        assert_eq!(constraint.relationship_name(), "author");
        assert_eq!(
            RelationshipConstraint::make("company").relationship("author.company").attribute(),
            "author.company"
        );
    }

    #[test]
    fn test_label_override() {
        let constraint = RelationshipConstraint::make("author").label("Writer");
        assert_eq!(constraint.attribute_label(), "Writer");
    }

    #[test]
    fn test_selectable_operator_listed_first() {
        let constraint = RelationshipConstraint::make("author")
            .selectable(IsRelatedToOperator::make().title_attribute("name"));
        let names: Vec<_> = constraint.operators().iter().map(|op| op.name()).collect();
        assert_eq!(names, vec!["isRelatedTo", "isEmpty"]);
    }

    #[test]
    fn test_narrowing() {
        let text = TextConstraint::make("title");
        assert!(text.as_relationship().is_none());
        assert!(text.as_text().is_some());
        assert!(RelationshipConstraint::make("author").as_relationship().is_some());
    }

    #[test]
    fn test_unbound_constraint() {
        let err = TextConstraint::make("title").require_binding().unwrap_err();
        assert!(err.is_configuration_error());
    }
}
