//! Applying submitted rules to a query.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sieve_query::{sieve_debug, Query, QueryEngine, QueryError, QueryResult, Record, Schema};
use smol_str::SmolStr;
use tracing::debug;

use crate::constraint::{Constraint, FilterBinding};
use crate::operator::Operator;
use crate::settings::Settings;

const INVERSE_SUFFIX: &str = ".inverse";

/// One submitted condition: a constraint, an operator and its settings.
///
/// The operator name may carry an `.inverse` suffix to negate it.
///
/// ```rust
/// use sieve_filters::Rule;
///
/// let rule = Rule::from_json(serde_json::json!({
///     "constraint": "author",
///     "operator": "isRelatedTo.inverse",
///     "settings": { "value": 3 }
/// }))
/// .unwrap();
///
/// assert_eq!(rule.operator_name(), ("isRelatedTo", true));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Constraint name.
    pub constraint: String,
    /// Operator name, optionally suffixed with `.inverse`.
    pub operator: String,
    /// Submitted settings.
    #[serde(default)]
    pub settings: Settings,
}

impl Rule {
    /// Create a rule with no settings.
    pub fn new(constraint: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            constraint: constraint.into(),
            operator: operator.into(),
            settings: Settings::new(),
        }
    }

    /// Negate the operator.
    pub fn inverse(mut self) -> Self {
        if !self.operator.ends_with(INVERSE_SUFFIX) {
            self.operator.push_str(INVERSE_SUFFIX);
        }
        self
    }

    /// Replace the settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Parse a rule from JSON.
    pub fn from_json(value: serde_json::Value) -> QueryResult<Self> {
        serde_json::from_value(value).map_err(|e| QueryError::deserialization(e.to_string()).with_source(e))
    }

    /// The bare operator name and whether it is inverted.
    pub fn operator_name(&self) -> (&str, bool) {
        match self.operator.strip_suffix(INVERSE_SUFFIX) {
            Some(name) => (name, true),
            None => (self.operator.as_str(), false),
        }
    }
}

/// A set of constraints over one model.
#[derive(Debug, Clone)]
pub struct QueryBuilderFilter {
    name: SmolStr,
    schema: Arc<Schema>,
    model: SmolStr,
    constraints: IndexMap<SmolStr, Arc<dyn Constraint>>,
}

impl QueryBuilderFilter {
    /// Create a filter over `model`.
    ///
    /// # Errors
    ///
    /// `UnknownModel` when the schema has no such model.
    pub fn make(name: impl Into<SmolStr>, schema: Arc<Schema>, model: &str) -> QueryResult<Self> {
        schema.require_model(model)?;
        Ok(Self {
            name: name.into(),
            schema,
            model: model.into(),
            constraints: IndexMap::new(),
        })
    }

    /// Register a constraint, replacing one with the same name.
    pub fn constraint(mut self, mut constraint: impl Constraint + 'static) -> Self {
        constraint.bind(FilterBinding::new(Arc::clone(&self.schema), self.model.clone()));
        self.constraints.insert(constraint.name().into(), Arc::new(constraint));
        self
    }

    /// Filter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Look up a constraint.
    pub fn get_constraint(&self, name: &str) -> Option<&Arc<dyn Constraint>> {
        self.constraints.get(name)
    }

    /// Registered constraints, in registration order.
    pub fn constraints(&self) -> impl Iterator<Item = &Arc<dyn Constraint>> {
        self.constraints.values()
    }

    /// A fresh query over the root model.
    pub fn query(&self) -> QueryResult<Query> {
        Query::new(Arc::clone(&self.schema), &self.model)
    }

    /// Build the operator instance for `rule`.
    pub fn operator_for(&self, rule: &Rule) -> QueryResult<Box<dyn Operator>> {
        self.operator_for_record(rule, None)
    }

    /// Build the operator instance for `rule` while editing `record`.
    ///
    /// Clones the constraint's template, attaches the constraint, fills the
    /// settings and validates them against the operator's form.
    pub fn operator_for_record(&self, rule: &Rule, record: Option<&Record>) -> QueryResult<Box<dyn Operator>> {
        let constraint = self.get_constraint(&rule.constraint).ok_or_else(|| {
            QueryError::invalid_input("constraint", format!("unknown constraint '{}'", rule.constraint))
                .with_model(self.model.as_str())
        })?;

        let (name, inverse) = rule.operator_name();
        let template = constraint.get_operator(name).ok_or_else(|| {
            QueryError::invalid_input(
                "operator",
                format!("constraint '{}' has no operator '{}'", rule.constraint, name),
            )
        })?;

        let mut operator = template.box_clone();
        operator.attach(Arc::clone(constraint));
        operator.set_inverse(inverse);
        operator.fill(rule.settings.clone());
        operator.state_mut().record = record.cloned();

        for field in operator.form_schema()? {
            field
                .validate(operator.settings())
                .map_err(|e| e.with_context(format!("{}.{}", rule.constraint, rule.operator)))?;
        }

        Ok(operator)
    }

    /// AND every rule into `query`.
    pub fn apply(&self, query: Query, rules: &[Rule]) -> QueryResult<Query> {
        rules.iter().try_fold(query, |query, rule| {
            let operator = self.operator_for(rule)?;
            let column = query.qualify_column(self.attribute_of(rule)?);
            sieve_debug!(filter = %self.name, constraint = %rule.constraint, operator = %rule.operator, "Applying rule");
            operator.apply(query, &column)
        })
    }

    /// Render a summary for every rule.
    pub fn summaries(&self, rules: &[Rule], engine: &dyn QueryEngine) -> QueryResult<Vec<String>> {
        debug!(filter = %self.name, rules = rules.len(), "Rendering rule summaries");
        rules
            .iter()
            .map(|rule| self.operator_for(rule)?.summary(engine))
            .collect()
    }

    fn attribute_of(&self, rule: &Rule) -> QueryResult<&str> {
        self.get_constraint(&rule.constraint)
            .map(|constraint| constraint.attribute())
            .ok_or_else(|| QueryError::invalid_input("constraint", format!("unknown constraint '{}'", rule.constraint)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{RelationshipConstraint, TextConstraint};
    use crate::operators::IsRelatedToOperator;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use sieve_query::{DatabaseType, ErrorCode, FilterValue, MemoryEngine, ModelDef, RelationSpec};

    fn filter() -> QueryBuilderFilter {
        let schema = Arc::new(
            Schema::new()
                .model(ModelDef::new("Author", "authors"))
                .model(ModelDef::new("Post", "posts").relation(RelationSpec::many_to_one("author", "Author"))),
        );
        QueryBuilderFilter::make("posts", schema, "Post")
            .unwrap()
            .constraint(
                RelationshipConstraint::make("author")
                    .selectable(IsRelatedToOperator::make().title_attribute("name")),
            )
            .constraint(TextConstraint::make("title"))
    }

    fn engine() -> MemoryEngine {
        MemoryEngine::new()
            .with_row("authors", [("id", 3.into()), ("name", "Jane".into())])
            .with_row("authors", [("id", 5.into()), ("name", "Bob".into())])
            .with_row("posts", [("id", 1.into()), ("title", "Rust".into()), ("author_id", 3.into())])
            .with_row("posts", [("id", 2.into()), ("title", "Rust again".into()), ("author_id", 5.into())])
            .with_row("posts", [("id", 3.into()), ("title", "SQL".into()), ("author_id", 3.into())])
    }

    fn author_is(value: i32) -> Rule {
        Rule::new("author", "isRelatedTo").with_settings(Settings::new().with("value", value))
    }

    #[test]
    fn test_rule_operator_name() {
        assert_eq!(Rule::new("a", "isEmpty").operator_name(), ("isEmpty", false));
        assert_eq!(Rule::new("a", "isEmpty").inverse().operator_name(), ("isEmpty", true));
        assert_eq!(Rule::new("a", "isEmpty").inverse().inverse().operator, "isEmpty.inverse");
    }

    #[test]
    fn test_rule_from_json_defaults_settings() {
        let rule = Rule::from_json(json!({ "constraint": "author", "operator": "isEmpty" })).unwrap();
        assert!(rule.settings.is_empty());
        assert!(Rule::from_json(json!({ "operator": "isEmpty" })).is_err());
    }

    #[test]
    fn test_make_rejects_unknown_model() {
        let err = QueryBuilderFilter::make("x", Arc::new(Schema::new()), "Post").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownModel);
    }

    #[test]
    fn test_apply_folds_rules() {
        let filter = filter();
        let rules = vec![
            author_is(3),
            Rule::new("title", "contains").with_settings(Settings::new().with("text", "Rust")),
        ];
        let query = filter.apply(filter.query().unwrap(), &rules).unwrap();
        assert_eq!(engine().pluck(&query, "id").unwrap(), vec![FilterValue::Int(1)]);

        let (sql, _) = query.to_sql(DatabaseType::SQLite);
        assert_eq!(
            sql,
            "SELECT * FROM posts WHERE (EXISTS (SELECT 1 FROM authors WHERE authors.id = posts.author_id AND authors.id IN (?)) AND posts.title LIKE ?)"
        );
    }

    #[test]
    fn test_operator_for_validates_settings() {
        let filter = filter();
        let err = filter.operator_for(&Rule::new("author", "isRelatedTo")).unwrap_err();
        assert_eq!(err.code, ErrorCode::RequiredFieldMissing);

        let err = filter
            .operator_for(&Rule::new("author", "isRelatedTo").with_settings(Settings::new().with("value", vec![3, 5])))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }

    #[test]
    fn test_operator_for_unknown_names() {
        let filter = filter();
        assert!(filter.operator_for(&Rule::new("editor", "isEmpty")).is_err());
        assert!(filter.operator_for(&Rule::new("title", "isRelatedTo")).is_err());
    }

    #[test]
    fn test_operator_for_record_sets_context() {
        let filter = filter();
        let mut record = Record::new();
        record.insert("id".into(), FilterValue::Int(1));
        let operator = filter.operator_for_record(&author_is(3), Some(&record)).unwrap();
        assert_eq!(operator.context().record, Some(&record));
        assert_eq!(operator.context().model, Some("Post"));
        assert_eq!(operator.context().constraint, Some("author"));
    }

    #[test]
    fn test_summaries() {
        let filter = filter();
        let rules = vec![author_is(3), Rule::new("author", "isEmpty").inverse()];
        assert_eq!(
            filter.summaries(&rules, &engine()).unwrap(),
            vec!["Author is \"Jane\"".to_string(), "Author is not empty".to_string()]
        );
    }
}
