//! Runtime model metadata.
//!
//! A [`Schema`] is the registry the relationship resolver walks: every
//! [`ModelDef`] knows its table, primary key, columns and the relations it
//! declares. Schemas are built once at startup (in code or from
//! configuration) and shared behind an `Arc`.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::{QueryError, QueryResult};
use crate::relations::RelationSpec;

fn default_primary_key() -> SmolStr {
    SmolStr::new_static("id")
}

/// Metadata for a single model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDef {
    /// Model name (e.g. `Author`).
    pub name: SmolStr,
    /// Backing table (e.g. `authors`).
    pub table: SmolStr,
    /// Primary key column.
    #[serde(default = "default_primary_key")]
    pub primary_key: SmolStr,
    /// Known columns. Empty means "not declared".
    #[serde(default)]
    pub columns: Vec<SmolStr>,
    /// Relations declared on this model.
    #[serde(default)]
    pub relations: Vec<RelationSpec>,
}

impl ModelDef {
    /// Create a model with an `id` primary key.
    pub fn new(name: impl Into<SmolStr>, table: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: default_primary_key(),
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Set the primary key column.
    pub fn primary_key(mut self, key: impl Into<SmolStr>) -> Self {
        self.primary_key = key.into();
        self
    }

    /// Declare the model's columns.
    pub fn columns(mut self, columns: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Declare a relation.
    pub fn relation(mut self, spec: RelationSpec) -> Self {
        self.relations.push(spec);
        self
    }

    /// Check whether `name` denotes a relation on this model.
    pub fn is_relation(&self, name: &str) -> bool {
        self.get_relation(name).is_some()
    }

    /// Get a relation by name.
    pub fn get_relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.iter().find(|r| r.name.as_str() == name)
    }

    /// Check whether a column is declared. Models without declared columns
    /// accept any column.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.is_empty()
            || self.primary_key.as_str() == column
            || self.columns.iter().any(|c| c.as_str() == column)
    }

    /// Prefix a column with this model's table unless already qualified.
    pub fn qualify_column(&self, column: &str) -> String {
        if column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{}", self.table, column)
        }
    }
}

/// Registry of models keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    models: IndexMap<SmolStr, Arc<ModelDef>>,
}

impl Schema {
    /// Create a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from model definitions, validating relation targets.
    pub fn from_models(models: impl IntoIterator<Item = ModelDef>) -> QueryResult<Self> {
        let mut schema = Self::new();
        for model in models {
            schema.add_model(model);
        }
        schema.validate()?;
        Ok(schema)
    }

    /// Add a model (builder style).
    pub fn model(mut self, model: ModelDef) -> Self {
        self.add_model(model);
        self
    }

    /// Add a model to the schema, replacing one with the same name.
    pub fn add_model(&mut self, model: ModelDef) {
        self.models.insert(model.name.clone(), Arc::new(model));
    }

    /// Get a model by name.
    pub fn get_model(&self, name: &str) -> Option<&Arc<ModelDef>> {
        self.models.get(name)
    }

    /// Get a model by name or fail with [`ErrorCode::UnknownModel`](crate::ErrorCode::UnknownModel).
    pub fn require_model(&self, name: &str) -> QueryResult<&Arc<ModelDef>> {
        self.get_model(name).ok_or_else(|| QueryError::unknown_model(name))
    }

    /// Get all model names.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(|s| s.as_str())
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Check if no models are registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Check that every relation points at a registered model.
    pub fn validate(&self) -> QueryResult<()> {
        for model in self.models.values() {
            for relation in &model.relations {
                if !self.models.contains_key(&relation.related_model) {
                    return Err(QueryError::unknown_model(relation.related_model.as_str())
                        .with_context(format!("Validating relation {}.{}", model.name, relation.name)));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn blog() -> Schema {
        Schema::new()
            .model(ModelDef::new("Author", "authors").columns(["id", "name"]))
            .model(
                ModelDef::new("Post", "posts")
                    .columns(["id", "title", "author_id"])
                    .relation(RelationSpec::many_to_one("author", "Author")),
            )
    }

    #[test]
    fn test_is_relation() {
        let schema = blog();
        let post = schema.get_model("Post").unwrap();
        assert!(post.is_relation("author"));
        assert!(!post.is_relation("title"));
    }

    #[test]
    fn test_qualify_column() {
        let model = ModelDef::new("Author", "authors");
        assert_eq!(model.qualify_column("name"), "authors.name");
        assert_eq!(model.qualify_column("people.name"), "people.name");
    }

    #[test]
    fn test_has_column() {
        let schema = blog();
        let author = schema.get_model("Author").unwrap();
        assert!(author.has_column("name"));
        assert!(!author.has_column("nickname"));
        assert!(ModelDef::new("Loose", "loose").has_column("anything"));
    }

    #[test]
    fn test_validate_rejects_dangling_relation() {
        let err = Schema::from_models([
            ModelDef::new("Post", "posts").relation(RelationSpec::many_to_one("author", "Writer")),
        ])
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownModel);
    }

    #[test]
    fn test_require_model() {
        let schema = blog();
        assert!(schema.require_model("Author").is_ok());
        assert_eq!(schema.require_model("Comment").unwrap_err().code, ErrorCode::UnknownModel);
        assert_eq!(schema.model_names().collect::<Vec<_>>(), vec!["Author", "Post"]);
    }
}
