//! Declarative form fields operators use to capture their settings.
//!
//! Fields describe what a rendering layer should show; they also know how to
//! load their own options through a [`QueryEngine`] and how to validate what
//! was submitted.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use sieve_query::engine::bare_column;
use sieve_query::{
    Filter, FilterValue, OrderByField, Query, QueryEngine, QueryError, QueryResult, Record,
    RelationshipHandle, Schema,
};
use tracing::debug;

use crate::settings::Settings;

/// Rewrites a relationship query before it runs.
pub type QueryModifier = Arc<dyn Fn(Query) -> Query + Send + Sync>;

/// Label for a single option key.
pub type OptionLabelHook = Arc<dyn Fn(&FilterValue) -> Option<String> + Send + Sync>;

/// Labels for several option keys at once.
pub type OptionLabelsHook = Arc<dyn Fn(&[FilterValue]) -> Vec<SelectOption> + Send + Sync>;

/// Label for a fetched related record.
pub type RecordLabelHook = Arc<dyn Fn(&Record) -> String + Send + Sync>;

/// Options matching a search term.
pub type SearchResultsHook = Arc<dyn Fn(&str) -> Vec<SelectOption> + Send + Sync>;

/// A selectable value and its display label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    /// Key submitted when the option is chosen.
    pub value: FilterValue,
    /// Text shown to the user.
    pub label: String,
}

impl SelectOption {
    /// Create an option.
    pub fn new(value: impl Into<FilterValue>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Overrides for the default option-label and search behavior.
#[derive(Clone, Default)]
pub struct OptionHooks {
    /// Label for one key.
    pub option_label: Option<OptionLabelHook>,
    /// Labels for many keys.
    pub option_labels: Option<OptionLabelsHook>,
    /// Label for a fetched record.
    pub label_from_record: Option<RecordLabelHook>,
    /// Search results for a term.
    pub search_results: Option<SearchResultsHook>,
}

impl fmt::Debug for OptionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionHooks")
            .field("option_label", &self.option_label.is_some())
            .field("option_labels", &self.option_labels.is_some())
            .field("label_from_record", &self.label_from_record.is_some())
            .field("search_results", &self.search_results.is_some())
            .finish()
    }
}

/// Options backed by the rows of a related model.
#[derive(Clone)]
pub struct OptionSource {
    schema: Arc<Schema>,
    handle: RelationshipHandle,
    title_attribute: String,
    modifier: Option<QueryModifier>,
}

impl OptionSource {
    /// Create an option source over a resolved relationship.
    pub fn new(
        schema: Arc<Schema>,
        handle: RelationshipHandle,
        title_attribute: impl Into<String>,
        modifier: Option<QueryModifier>,
    ) -> Self {
        Self {
            schema,
            handle,
            title_attribute: title_attribute.into(),
            modifier,
        }
    }

    /// The resolved relationship.
    pub fn relationship(&self) -> &RelationshipHandle {
        &self.handle
    }

    /// The title column, qualified with the related table.
    pub fn title_column(&self) -> String {
        self.handle.related_model().qualify_column(&self.title_attribute)
    }

    /// The key column, qualified with the related table.
    pub fn key_column(&self) -> String {
        let related = self.handle.related_model();
        related.qualify_column(&related.primary_key)
    }

    /// A standalone query over the related model.
    ///
    /// The modifier runs first; when it sets no ordering, rows are ordered by
    /// the title column.
    pub fn query(&self) -> Query {
        let mut query = self.handle.unconstrained_query(&self.schema);
        if let Some(modifier) = &self.modifier {
            query = modifier(query);
        }
        if !query.has_orders() {
            query = query.order_by(OrderByField::asc(self.title_column()));
        }
        query
    }

    fn deduplicated(&self, query: Query) -> Query {
        if self.handle.produces_duplicate_rows() {
            query.distinct()
        } else {
            query
        }
    }

    fn to_option(&self, record: &Record, hooks: &OptionHooks) -> SelectOption {
        let related = self.handle.related_model();
        let value = record
            .get(related.primary_key.as_str())
            .cloned()
            .unwrap_or(FilterValue::Null);
        let label = match &hooks.label_from_record {
            Some(hook) => hook(record),
            None => record
                .get(bare_column(&self.title_attribute))
                .map(ToString::to_string)
                .unwrap_or_default(),
        };
        SelectOption { value, label }
    }
}

impl fmt::Debug for OptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionSource")
            .field("relationship", &self.handle.path())
            .field("related_model", &self.handle.related_model().name)
            .field("title_attribute", &self.title_attribute)
            .field("modifier", &self.modifier.is_some())
            .finish()
    }
}

/// A dropdown whose options come from a relationship.
#[derive(Debug, Clone, Serialize)]
pub struct SelectField {
    /// Settings key the selection is stored under.
    pub identifier: String,
    /// Display label.
    pub label: String,
    /// Allow selecting several options.
    pub multiple: bool,
    /// Let the user search options.
    pub searchable: bool,
    /// Load options before the user searches.
    pub preload: bool,
    /// Render with the platform-native control.
    pub native: bool,
    /// Options are fixed once loaded; search filters them locally.
    #[serde(rename = "static")]
    pub is_static: bool,
    /// Maximum number of options loaded at once.
    pub options_limit: usize,
    /// A selection must be made.
    pub required: bool,
    /// Do not render the field.
    pub hidden: bool,
    /// Force case-insensitive search; `None` defers to the database.
    pub search_case_insensitive: Option<bool>,
    #[serde(skip)]
    source: Option<OptionSource>,
    #[serde(skip)]
    hooks: OptionHooks,
}

impl SelectField {
    /// Create a single, non-searchable select.
    pub fn make(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            label: identifier.clone(),
            identifier,
            multiple: false,
            searchable: false,
            preload: false,
            native: true,
            is_static: false,
            options_limit: 50,
            required: false,
            hidden: false,
            search_case_insensitive: None,
            source: None,
            hooks: OptionHooks::default(),
        }
    }

    /// Set the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Allow several selections.
    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// Allow searching.
    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    /// Load options up front.
    pub fn preload(mut self, preload: bool) -> Self {
        self.preload = preload;
        self
    }

    /// Use the native control.
    pub fn native(mut self, native: bool) -> Self {
        self.native = native;
        self
    }

    /// Treat options as fixed.
    pub fn is_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// Cap the number of loaded options.
    pub fn options_limit(mut self, limit: usize) -> Self {
        self.options_limit = limit;
        self
    }

    /// Require a selection.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Hide the field.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Override search case sensitivity.
    pub fn force_search_case_insensitive(mut self, condition: Option<bool>) -> Self {
        self.search_case_insensitive = condition;
        self
    }

    /// Load options from a relationship.
    pub fn relationship(mut self, source: OptionSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the label/search behavior.
    pub fn hooks(mut self, hooks: OptionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// The relationship options come from, if any.
    pub fn option_source(&self) -> Option<&OptionSource> {
        self.source.as_ref()
    }

    /// The label/search overrides.
    pub fn option_hooks(&self) -> &OptionHooks {
        &self.hooks
    }

    fn limited(&self, query: Query) -> Query {
        query.take(self.options_limit as u64)
    }

    /// Options shown before any search.
    ///
    /// Searchable fields that are not preloaded start empty.
    pub fn options(&self, engine: &dyn QueryEngine) -> QueryResult<Vec<SelectOption>> {
        if self.searchable && !self.preload {
            return Ok(Vec::new());
        }
        let Some(source) = &self.source else {
            return Ok(Vec::new());
        };

        let query = self.limited(source.deduplicated(source.query()));
        let rows = engine.fetch(&query)?;
        Ok(rows.iter().map(|row| source.to_option(row, &self.hooks)).collect())
    }

    /// Options matching `term`.
    pub fn search(&self, engine: &dyn QueryEngine, term: &str) -> QueryResult<Vec<SelectOption>> {
        if let Some(hook) = &self.hooks.search_results {
            return Ok(hook(term));
        }
        let Some(source) = &self.source else {
            return Ok(Vec::new());
        };

        if self.is_static {
            let needle = term.to_lowercase();
            let rows = engine.fetch(&self.limited(source.deduplicated(source.query())))?;
            return Ok(rows
                .iter()
                .map(|row| source.to_option(row, &self.hooks))
                .filter(|option| option.label.to_lowercase().contains(&needle))
                .collect());
        }

        let column = source.title_column();
        let condition = if self.search_case_insensitive == Some(true) {
            Filter::ContainsInsensitive(column, term.into())
        } else {
            Filter::Contains(column, term.into())
        };
        debug!(field = %self.identifier, term = %term, "Searching relationship options");

        let query = self.limited(source.deduplicated(source.query().r#where(condition)));
        let rows = engine.fetch(&query)?;
        Ok(rows.iter().map(|row| source.to_option(row, &self.hooks)).collect())
    }

    /// Labels for already selected keys, in the option query's order.
    pub fn option_labels(&self, engine: &dyn QueryEngine, keys: &[FilterValue]) -> QueryResult<Vec<SelectOption>> {
        if let Some(hook) = &self.hooks.option_labels {
            return Ok(hook(keys));
        }
        if let Some(hook) = &self.hooks.option_label {
            return Ok(keys
                .iter()
                .filter_map(|key| hook(key).map(|label| SelectOption::new(key.clone(), label)))
                .collect());
        }
        let Some(source) = &self.source else {
            return Ok(Vec::new());
        };

        let query = source.deduplicated(source.query().where_key(keys.iter().cloned()));
        let rows = engine.fetch(&query)?;
        Ok(rows.iter().map(|row| source.to_option(row, &self.hooks)).collect())
    }

    /// Check the submitted value.
    pub fn validate(&self, settings: &Settings) -> QueryResult<()> {
        let value = settings.get(&self.identifier).unwrap_or(&FilterValue::Null);
        if self.required && value.is_blank() {
            return Err(QueryError::required_field(&self.identifier));
        }
        if !self.multiple {
            if let FilterValue::List(items) = value {
                if items.len() > 1 {
                    return Err(QueryError::invalid_input(&self.identifier, "only one value may be selected")
                        .with_suggestion("Submit a single key, or make the select multiple"));
                }
            }
        }
        Ok(())
    }
}

/// A free-text input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextInputField {
    /// Settings key the text is stored under.
    pub identifier: String,
    /// Display label.
    pub label: String,
    /// Text must be entered.
    pub required: bool,
}

impl TextInputField {
    /// Create an optional text input.
    pub fn make(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            label: identifier.clone(),
            identifier,
            required: false,
        }
    }

    /// Set the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Require text.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Check the submitted value.
    pub fn validate(&self, settings: &Settings) -> QueryResult<()> {
        match settings.get(&self.identifier) {
            Some(FilterValue::List(_)) | Some(FilterValue::Json(_)) => {
                Err(QueryError::invalid_input(&self.identifier, "expected text"))
            }
            Some(value) if !value.is_blank() => Ok(()),
            _ if self.required => Err(QueryError::required_field(&self.identifier)),
            _ => Ok(()),
        }
    }
}

/// A field in an operator's form.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormField {
    /// Relationship-backed dropdown.
    Select(SelectField),
    /// Free-text input.
    TextInput(TextInputField),
}

impl FormField {
    /// Settings key this field writes.
    pub fn identifier(&self) -> &str {
        match self {
            Self::Select(field) => &field.identifier,
            Self::TextInput(field) => &field.identifier,
        }
    }

    /// Display label.
    pub fn label(&self) -> &str {
        match self {
            Self::Select(field) => &field.label,
            Self::TextInput(field) => &field.label,
        }
    }

    /// Whether the field is hidden.
    pub fn is_hidden(&self) -> bool {
        matches!(self, Self::Select(field) if field.hidden)
    }

    /// Narrow to a select.
    pub fn as_select(&self) -> Option<&SelectField> {
        match self {
            Self::Select(field) => Some(field),
            Self::TextInput(_) => None,
        }
    }

    /// Check the submitted value.
    pub fn validate(&self, settings: &Settings) -> QueryResult<()> {
        match self {
            Self::Select(field) if field.hidden => Ok(()),
            Self::Select(field) => field.validate(settings),
            Self::TextInput(field) => field.validate(settings),
        }
    }
}

impl From<SelectField> for FormField {
    fn from(field: SelectField) -> Self {
        Self::Select(field)
    }
}

impl From<TextInputField> for FormField {
    fn from(field: TextInputField) -> Self {
        Self::TextInput(field)
    }
}
