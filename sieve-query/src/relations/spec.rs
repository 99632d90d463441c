//! Relation specification types.

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::filter::RelationLink;
use crate::schema::ModelDef;

/// Type of relation between models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// One-to-one relation (e.g., User has one Profile).
    OneToOne,
    /// One-to-many relation (e.g., User has many Posts).
    OneToMany,
    /// Many-to-one relation (e.g., Post belongs to User).
    ManyToOne,
    /// Many-to-many relation (e.g., Post has many Tags).
    ManyToMany,
}

impl RelationType {
    /// Check if this relation returns multiple records.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    /// Check if this relation returns a single record.
    pub fn is_one(&self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneToOne => write!(f, "1:1"),
            Self::OneToMany => write!(f, "1:n"),
            Self::ManyToOne => write!(f, "n:1"),
            Self::ManyToMany => write!(f, "m:n"),
        }
    }
}

/// Specification for a relation between models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationSpec {
    /// Name of the relation (field name).
    pub name: SmolStr,
    /// Type of relation.
    #[serde(rename = "kind")]
    pub relation_type: RelationType,
    /// Name of the related model.
    #[serde(rename = "model")]
    pub related_model: SmolStr,
    /// Key fields on this model.
    #[serde(default)]
    pub fields: Vec<SmolStr>,
    /// Referenced fields on the related model.
    #[serde(default)]
    pub references: Vec<SmolStr>,
    /// Join table for many-to-many relations.
    #[serde(default)]
    pub join_table: Option<JoinTableSpec>,
    /// Whether a standalone query over the related model yields duplicate
    /// rows. `None` falls back to the per-kind default.
    #[serde(default)]
    pub distinct: Option<bool>,
}

impl RelationSpec {
    fn new(name: impl Into<SmolStr>, relation_type: RelationType, related_model: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            relation_type,
            related_model: related_model.into(),
            fields: Vec::new(),
            references: Vec::new(),
            join_table: None,
            distinct: None,
        }
    }

    /// Create a one-to-one relation spec.
    pub fn one_to_one(name: impl Into<SmolStr>, related_model: impl Into<SmolStr>) -> Self {
        Self::new(name, RelationType::OneToOne, related_model)
    }

    /// Create a one-to-many relation spec.
    pub fn one_to_many(name: impl Into<SmolStr>, related_model: impl Into<SmolStr>) -> Self {
        Self::new(name, RelationType::OneToMany, related_model)
    }

    /// Create a many-to-one relation spec.
    pub fn many_to_one(name: impl Into<SmolStr>, related_model: impl Into<SmolStr>) -> Self {
        Self::new(name, RelationType::ManyToOne, related_model)
    }

    /// Create a many-to-many relation spec.
    pub fn many_to_many(
        name: impl Into<SmolStr>,
        related_model: impl Into<SmolStr>,
        join_table: JoinTableSpec,
    ) -> Self {
        let mut spec = Self::new(name, RelationType::ManyToMany, related_model);
        spec.join_table = Some(join_table);
        spec
    }

    /// Set the key fields on this model.
    pub fn fields(mut self, fields: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the referenced fields on the related model.
    pub fn references(mut self, refs: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.references = refs.into_iter().map(Into::into).collect();
        self
    }

    /// Override whether standalone queries over this relation need DISTINCT.
    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = Some(distinct);
        self
    }

    /// Whether a standalone query over the related model repeats rows.
    ///
    /// Relations through a join table repeat the related row once per
    /// join row unless overridden.
    pub fn produces_duplicate_rows(&self) -> bool {
        self.distinct
            .unwrap_or(self.relation_type == RelationType::ManyToMany)
    }

    /// Work out how rows of `parent` correlate with rows of `related`.
    ///
    /// Missing key fields fall back to conventional names: `<relation>_id`
    /// for many-to-one, `<parent>_id` on the related model for to-many, and
    /// a `_<A>_to_<B>` join table for many-to-many. Model names become
    /// snake case, so `BlogPost` owns `blog_post_id`.
    pub fn link(&self, parent: &ModelDef, related: &ModelDef) -> RelationLink {
        match self.relation_type {
            RelationType::ManyToMany => {
                let jt = self.join_table.clone().unwrap_or_else(|| JoinTableSpec::implicit(parent, related));
                RelationLink::Pivot {
                    table: jt.table_name,
                    parent_key: self.fields.first().cloned().unwrap_or_else(|| parent.primary_key.clone()),
                    source_column: jt.source_column,
                    target_column: jt.target_column,
                    related_key: self
                        .references
                        .first()
                        .cloned()
                        .unwrap_or_else(|| related.primary_key.clone()),
                }
            }
            RelationType::ManyToOne => {
                let fields = non_empty_or(&self.fields, || vec![format!("{}_id", self.name).into()]);
                let references = non_empty_or(&self.references, || vec![related.primary_key.clone()]);
                RelationLink::Direct {
                    pairs: fields.into_iter().zip(references).collect(),
                }
            }
            RelationType::OneToOne | RelationType::OneToMany => {
                let fields = non_empty_or(&self.fields, || vec![parent.primary_key.clone()]);
                let references =
                    non_empty_or(&self.references, || vec![foreign_key(&parent.name)]);
                RelationLink::Direct {
                    pairs: fields.into_iter().zip(references).collect(),
                }
            }
        }
    }
}

/// `<model>_id` in snake case.
fn foreign_key(model: &str) -> SmolStr {
    format!("{}_id", model.to_case(Case::Snake)).into()
}

fn non_empty_or(values: &[SmolStr], fallback: impl FnOnce() -> Vec<SmolStr>) -> Vec<SmolStr> {
    if values.is_empty() { fallback() } else { values.to_vec() }
}

/// Specification for a join table (many-to-many).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinTableSpec {
    /// Name of the join table.
    #[serde(rename = "table")]
    pub table_name: SmolStr,
    /// Column referencing the source model.
    pub source_column: SmolStr,
    /// Column referencing the target model.
    pub target_column: SmolStr,
}

impl JoinTableSpec {
    /// Create a new join table spec.
    pub fn new(
        table_name: impl Into<SmolStr>,
        source_column: impl Into<SmolStr>,
        target_column: impl Into<SmolStr>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            source_column: source_column.into(),
            target_column: target_column.into(),
        }
    }

    /// The conventional join table between two models.
    pub fn implicit(parent: &ModelDef, related: &ModelDef) -> Self {
        let mut names = [parent.name.as_str(), related.name.as_str()];
        names.sort();
        Self::new(
            format!("_{}_to_{}", names[0], names[1]),
            foreign_key(&parent.name),
            foreign_key(&related.name),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> ModelDef {
        ModelDef::new("Post", "posts")
    }

    fn author() -> ModelDef {
        ModelDef::new("Author", "authors")
    }

    #[test]
    fn test_relation_type() {
        assert!(RelationType::OneToMany.is_many());
        assert!(RelationType::ManyToMany.is_many());
        assert!(!RelationType::OneToOne.is_many());
        assert!(RelationType::ManyToOne.is_one());
    }

    #[test]
    fn test_many_to_one_link_defaults() {
        let spec = RelationSpec::many_to_one("author", "Author");
        assert_eq!(
            spec.link(&post(), &author()),
            RelationLink::Direct {
                pairs: vec![("author_id".into(), "id".into())]
            }
        );
    }

    #[test]
    fn test_one_to_many_link_explicit() {
        let spec = RelationSpec::one_to_many("posts", "Post")
            .fields(["id"])
            .references(["writer_id"]);
        assert_eq!(
            spec.link(&author(), &post()),
            RelationLink::Direct {
                pairs: vec![("id".into(), "writer_id".into())]
            }
        );
    }

    #[test]
    fn test_to_many_default_key_is_snake_case() {
        let blog_post = ModelDef::new("BlogPost", "blog_posts");
        let spec = RelationSpec::one_to_many("comments", "Comment");
        assert_eq!(
            spec.link(&blog_post, &ModelDef::new("Comment", "comments")),
            RelationLink::Direct {
                pairs: vec![("id".into(), "blog_post_id".into())]
            }
        );

        let tag = ModelDef::new("Tag", "tags");
        let jt = JoinTableSpec::implicit(&blog_post, &tag);
        assert_eq!(jt.source_column.as_str(), "blog_post_id");
        assert_eq!(jt.table_name.as_str(), "_BlogPost_to_Tag");
    }

    #[test]
    fn test_many_to_many_implicit_join_table() {
        let tag = ModelDef::new("Tag", "tags");
        let spec = RelationSpec {
            join_table: None,
            ..RelationSpec::many_to_many("tags", "Tag", JoinTableSpec::new("x", "y", "z"))
        };
        match spec.link(&post(), &tag) {
            RelationLink::Pivot { table, source_column, target_column, .. } => {
                assert_eq!(table.as_str(), "_Post_to_Tag");
                assert_eq!(source_column.as_str(), "post_id");
                assert_eq!(target_column.as_str(), "tag_id");
            }
            other => panic!("expected pivot link, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_rows_default_and_override() {
        let jt = JoinTableSpec::new("post_tag", "post_id", "tag_id");
        assert!(RelationSpec::many_to_many("tags", "Tag", jt.clone()).produces_duplicate_rows());
        assert!(!RelationSpec::many_to_many("tags", "Tag", jt).distinct(false).produces_duplicate_rows());
        assert!(!RelationSpec::many_to_one("author", "Author").produces_duplicate_rows());
        assert!(RelationSpec::one_to_many("posts", "Post").distinct(true).produces_duplicate_rows());
    }
}
