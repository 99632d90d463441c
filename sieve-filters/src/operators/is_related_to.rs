//! "Is" / "Is not" over a relationship.

use std::fmt;
use std::sync::Arc;

use sieve_query::engine::bare_column;
use sieve_query::{
    FilterValue, OperatorDefaults, Query, QueryEngine, QueryError, QueryResult, RelationshipHandle,
    RelationshipResolver,
};
use tracing::{debug, warn};

use crate::constraint::{Constraint, RelationshipConstraint};
use crate::form::{FormField, OptionHooks, OptionSource, QueryModifier, SelectField, SelectOption};
use crate::lazy::LazyValue;
use crate::operator::{join_with_final, Operator, OperatorState};
use crate::operators::relationship_constraint;

/// Matches rows related to at least one of the selected records.
///
/// Non-inverse composes `EXISTS (related row with key IN values)`; inverse
/// composes `NOT EXISTS`, so rows with no related record at all are kept.
///
/// ```rust
/// use sieve_filters::{IsRelatedToOperator, LazyValue};
///
/// let operator = IsRelatedToOperator::make()
///     .title_attribute("name")
///     .searchable(true)
///     .preload(LazyValue::computed(|ctx| !ctx.inverse));
///
/// assert!(operator.is_searchable());
/// assert!(operator.is_preloaded());
/// assert_eq!(operator.get_options_limit(), 50);
/// ```
#[derive(Clone)]
pub struct IsRelatedToOperator {
    state: OperatorState,
    title_attribute: Option<LazyValue<String>>,
    modifier: Option<QueryModifier>,
    multiple: Option<LazyValue<bool>>,
    preloaded: LazyValue<bool>,
    native: LazyValue<bool>,
    is_static: LazyValue<bool>,
    searchable: LazyValue<bool>,
    options_limit: LazyValue<usize>,
    search_case_insensitive: LazyValue<Option<bool>>,
    hooks: OptionHooks,
}

impl Default for IsRelatedToOperator {
    fn default() -> Self {
        Self::make()
    }
}

impl IsRelatedToOperator {
    /// Name used in messages.
    pub const TITLE: &'static str = "Is";

    /// Operator identifier.
    pub const NAME: &'static str = "isRelatedTo";

    /// Create the operator with default configuration.
    pub fn make() -> Self {
        Self::from_defaults(&OperatorDefaults::default())
    }

    fn from_defaults(defaults: &OperatorDefaults) -> Self {
        Self {
            state: OperatorState::default(),
            title_attribute: None,
            modifier: None,
            multiple: None,
            preloaded: defaults.preload.into(),
            native: defaults.native.into(),
            is_static: false.into(),
            searchable: defaults.searchable.into(),
            options_limit: defaults.options_limit.into(),
            search_case_insensitive: defaults.search_case_insensitive.into(),
            hooks: OptionHooks::default(),
        }
    }

    /// Seed option behavior from configuration.
    pub fn with_defaults(mut self, defaults: &OperatorDefaults) -> Self {
        self.preloaded = defaults.preload.into();
        self.native = defaults.native.into();
        self.searchable = defaults.searchable.into();
        self.options_limit = defaults.options_limit.into();
        self.search_case_insensitive = defaults.search_case_insensitive.into();
        self
    }

    /// Column of the related model used to label options and summaries.
    pub fn title_attribute(mut self, attribute: impl Into<LazyValue<String>>) -> Self {
        self.title_attribute = Some(attribute.into());
        self
    }

    /// Rewrite the standalone relationship query (scoping, ordering).
    pub fn modify_relationship_query_using(mut self, f: impl Fn(Query) -> Query + Send + Sync + 'static) -> Self {
        self.modifier = Some(Arc::new(f));
        self
    }

    /// Load options before the user searches.
    pub fn preload(mut self, condition: impl Into<LazyValue<bool>>) -> Self {
        self.preloaded = condition.into();
        self
    }

    /// Allow several selections; defaults to the constraint's multiplicity.
    pub fn multiple(mut self, condition: impl Into<LazyValue<bool>>) -> Self {
        self.multiple = Some(condition.into());
        self
    }

    /// Render with the native control.
    pub fn native(mut self, condition: impl Into<LazyValue<bool>>) -> Self {
        self.native = condition.into();
        self
    }

    /// Treat options as fixed once loaded.
    pub fn static_options(mut self, condition: impl Into<LazyValue<bool>>) -> Self {
        self.is_static = condition.into();
        self
    }

    /// Let the user search options.
    pub fn searchable(mut self, condition: impl Into<LazyValue<bool>>) -> Self {
        self.searchable = condition.into();
        self
    }

    /// Cap the number of loaded options.
    pub fn options_limit(mut self, limit: impl Into<LazyValue<usize>>) -> Self {
        self.options_limit = limit.into();
        self
    }

    /// Force case-insensitive search; `None` defers to the database.
    pub fn force_search_case_insensitive(mut self, condition: impl Into<LazyValue<Option<bool>>>) -> Self {
        self.search_case_insensitive = condition.into();
        self
    }

    /// Label a single selected key.
    pub fn option_label_using(mut self, f: impl Fn(&FilterValue) -> Option<String> + Send + Sync + 'static) -> Self {
        self.hooks.option_label = Some(Arc::new(f));
        self
    }

    /// Label several selected keys at once.
    pub fn option_labels_using(mut self, f: impl Fn(&[FilterValue]) -> Vec<SelectOption> + Send + Sync + 'static) -> Self {
        self.hooks.option_labels = Some(Arc::new(f));
        self
    }

    /// Label an option from its fetched record.
    pub fn option_label_from_record_using(
        mut self,
        f: impl Fn(&sieve_query::Record) -> String + Send + Sync + 'static,
    ) -> Self {
        self.hooks.label_from_record = Some(Arc::new(f));
        self
    }

    /// Produce search results without querying.
    pub fn search_results_using(mut self, f: impl Fn(&str) -> Vec<SelectOption> + Send + Sync + 'static) -> Self {
        self.hooks.search_results = Some(Arc::new(f));
        self
    }

    fn eval<T: Clone>(&self, value: &LazyValue<T>) -> T {
        value.resolve(&self.context())
    }

    /// Whether several records can be selected.
    pub fn is_multiple(&self) -> bool {
        match &self.multiple {
            Some(multiple) => self.eval(multiple),
            None => self.constraint().is_ok_and(RelationshipConstraint::is_multiple),
        }
    }

    /// Whether options can be searched.
    pub fn is_searchable(&self) -> bool {
        self.eval(&self.searchable)
    }

    /// Whether options load up front.
    pub fn is_preloaded(&self) -> bool {
        self.eval(&self.preloaded)
    }

    /// Whether the native control is used.
    pub fn is_native(&self) -> bool {
        self.eval(&self.native)
    }

    /// Whether options are fixed once loaded.
    pub fn is_static(&self) -> bool {
        self.eval(&self.is_static)
    }

    /// Maximum number of loaded options.
    pub fn get_options_limit(&self) -> usize {
        self.eval(&self.options_limit)
    }

    /// The case-insensitive search override.
    pub fn is_search_forced_case_insensitive(&self) -> Option<bool> {
        self.eval(&self.search_case_insensitive)
    }

    /// The resolved title attribute.
    ///
    /// # Errors
    ///
    /// `MissingConfiguration` when unset or resolved to an empty string.
    pub fn get_title_attribute(&self) -> QueryResult<String> {
        self.title_attribute
            .as_ref()
            .map(|attribute| self.eval(attribute))
            .filter(|attribute| !attribute.trim().is_empty())
            .ok_or_else(|| {
                let constraint = self.attached_constraint().map(|c| c.name().to_string()).unwrap_or_default();
                QueryError::missing_configuration(format!(
                    "The [title_attribute()] is required for the [{}] operator on the [{}] constraint.",
                    Self::NAME,
                    constraint
                ))
                .with_suggestion("Call `.title_attribute(\"name\")` on the operator")
            })
    }

    /// The attached relationship constraint.
    ///
    /// # Errors
    ///
    /// `MissingConfiguration` when nothing is attached, `ConstraintMismatch`
    /// when the constraint is of another kind.
    pub fn constraint(&self) -> QueryResult<&RelationshipConstraint> {
        relationship_constraint(self, Self::TITLE)
    }

    /// Resolve the constraint's relationship path from the filter's model.
    ///
    /// `Ok(None)` when a path segment is not a relation.
    pub fn relationship(&self) -> QueryResult<Option<RelationshipHandle>> {
        let constraint = self.constraint()?;
        let binding = constraint.require_binding()?;
        Ok(RelationshipResolver::resolve(
            &binding.schema,
            &binding.model,
            constraint.relationship_name(),
        ))
    }

    fn option_source(&self) -> QueryResult<OptionSource> {
        let constraint = self.constraint()?;
        let binding = constraint.require_binding()?;
        let title = self.get_title_attribute()?;
        let handle = self.relationship()?.ok_or_else(|| {
            QueryError::unknown_relation(binding.model.as_str(), constraint.relationship_name())
        })?;
        let related = handle.related_model();
        if !related.has_column(bare_column(&title)) {
            return Err(QueryError::unknown_column(related.name.as_str(), title));
        }
        Ok(OptionSource::new(Arc::clone(&binding.schema), handle, title, self.modifier.clone()))
    }

    /// A standalone query over the related model.
    ///
    /// Carries no correlation with the filtered model. The modifier runs
    /// first; without an ordering, rows are ordered by the title attribute.
    pub fn relationship_query(&self) -> QueryResult<Query> {
        Ok(self.option_source()?.query())
    }

    fn values_key(constraint: &RelationshipConstraint) -> (&'static str, &'static str) {
        if constraint.is_multiple() {
            ("values", "Values")
        } else {
            ("value", "Value")
        }
    }

    /// The selected keys, as a list regardless of multiplicity.
    pub fn values(&self) -> QueryResult<Vec<FilterValue>> {
        let (key, _) = Self::values_key(self.constraint()?);
        Ok(self.settings().values_for(key))
    }
}

impl Operator for IsRelatedToOperator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn label(&self) -> String {
        let label = if self.is_inverse() { "Is not" } else { "Is" };
        label.to_string()
    }

    fn form_schema(&self) -> QueryResult<Vec<FormField>> {
        let constraint = self.constraint()?;
        let (identifier, label) = Self::values_key(constraint);

        let field = SelectField::make(identifier)
            .label(label)
            .multiple(self.is_multiple())
            .searchable(self.is_searchable())
            .preload(self.is_preloaded())
            .native(self.is_native())
            .is_static(self.is_static())
            .options_limit(self.get_options_limit())
            .force_search_case_insensitive(self.is_search_forced_case_insensitive())
            .required(true)
            .hooks(self.hooks.clone());

        let field = match self.relationship()? {
            Some(_) => field.relationship(self.option_source()?),
            None => {
                warn!(
                    constraint = %constraint.name(),
                    relationship = %constraint.relationship_name(),
                    "Relationship does not resolve; hiding the select"
                );
                field.hidden(true)
            }
        };

        Ok(vec![field.into()])
    }

    fn apply(&self, query: Query, _qualified_column: &str) -> QueryResult<Query> {
        let constraint = self.constraint()?;
        let values = self.values()?;
        debug!(
            constraint = %constraint.name(),
            inverse = self.is_inverse(),
            values = values.len(),
            "Applying isRelatedTo"
        );
        query.where_relation_exists(constraint.relationship_name(), self.is_inverse(), |related| {
            related.where_key(values)
        })
    }

    fn summary(&self, engine: &dyn QueryEngine) -> QueryResult<String> {
        let constraint = self.constraint()?;
        let source = self.option_source()?;
        let values = self.values()?;

        let mut query = source.query();
        if source.relationship().produces_duplicate_rows() {
            query = query.distinct();
        }
        let titles: Vec<String> = engine
            .pluck(&query.where_key(values), &source.title_column())?
            .iter()
            .filter(|title| !title.is_null())
            .map(ToString::to_string)
            .collect();

        let verb = if self.is_inverse() { "is not" } else { "is" };
        Ok(format!(
            "{} {} \"{}\"",
            constraint.attribute_label(),
            verb,
            join_with_final(&titles, ", ", " or ")
        ))
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

impl fmt::Debug for IsRelatedToOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsRelatedToOperator")
            .field("state", &self.state)
            .field("title_attribute", &self.title_attribute)
            .field("modifier", &self.modifier.is_some())
            .field("multiple", &self.multiple)
            .field("preloaded", &self.preloaded)
            .field("native", &self.native)
            .field("is_static", &self.is_static)
            .field("searchable", &self.searchable)
            .field("options_limit", &self.options_limit)
            .field("search_case_insensitive", &self.search_case_insensitive)
            .field("hooks", &self.hooks)
            .finish()
    }
}
