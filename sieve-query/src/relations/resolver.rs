//! Walking relationship paths over model metadata.

use std::sync::Arc;

use smallvec::SmallVec;
use smol_str::SmolStr;
use tracing::debug;

use crate::filter::{ExistsFilter, Filter, RelationLink};
use crate::query::{Join, Query};
use crate::schema::{ModelDef, Schema};

use super::spec::RelationSpec;

/// One step of a relationship path.
#[derive(Debug, Clone)]
pub struct RelationHop {
    /// Model declaring the relation.
    pub parent: Arc<ModelDef>,
    /// The relation followed.
    pub spec: RelationSpec,
    /// Model reached by the relation.
    pub related: Arc<ModelDef>,
}

impl RelationHop {
    /// How rows of the parent correlate with rows of the related model.
    pub fn link(&self) -> RelationLink {
        self.spec.link(&self.parent, &self.related)
    }

    fn exists(&self, filter: Filter) -> ExistsFilter {
        ExistsFilter {
            relation: self.spec.name.clone(),
            parent_table: self.parent.table.clone(),
            related_table: self.related.table.clone(),
            link: self.link(),
            filter,
        }
    }
}

/// A resolved relationship path.
///
/// Always holds at least one hop; the last one (`terminal`) reaches the
/// model whose rows are the relationship's values.
#[derive(Debug, Clone)]
pub struct RelationshipHandle {
    root: Arc<ModelDef>,
    path: SmolStr,
    through: SmallVec<[RelationHop; 2]>,
    terminal: RelationHop,
}

impl RelationshipHandle {
    /// The model the path starts from.
    pub fn root(&self) -> &Arc<ModelDef> {
        &self.root
    }

    /// The dotted path this handle was resolved from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Every hop, outermost first.
    pub fn hops(&self) -> impl Iterator<Item = &RelationHop> {
        self.through.iter().chain(std::iter::once(&self.terminal))
    }

    /// The last hop of the path.
    pub fn terminal(&self) -> &RelationHop {
        &self.terminal
    }

    /// The model reached at the end of the path.
    pub fn related_model(&self) -> &Arc<ModelDef> {
        &self.terminal.related
    }

    /// Whether a standalone query over the related model repeats rows.
    pub fn produces_duplicate_rows(&self) -> bool {
        self.terminal.spec.produces_duplicate_rows()
    }

    /// Build the existence predicate for this path.
    ///
    /// `filter` constrains rows of the related model. Every intermediate hop
    /// nests one more correlated subquery; only the outermost one is negated
    /// when `inverse` is set, so "not related" means "no path reaches a
    /// matching row".
    pub fn exists_filter(&self, filter: Filter, inverse: bool) -> Filter {
        let mut exists = self.terminal.exists(filter);
        for hop in self.through.iter().rev() {
            exists = hop.exists(Filter::exists(exists, false));
        }
        Filter::exists(exists, inverse)
    }

    /// A query over the related model with no correlation to any parent row.
    ///
    /// Relations through a join table keep the join, which is what makes
    /// such queries repeat related rows.
    pub fn unconstrained_query(&self, schema: &Arc<Schema>) -> Query {
        let related = &self.terminal.related;
        let query = Query::for_model(Arc::clone(schema), Arc::clone(related));

        match self.terminal.link() {
            RelationLink::Pivot {
                table,
                target_column,
                related_key,
                ..
            } => {
                let left = format!("{}.{}", table, target_column);
                query.join(Join::inner(table, left, related.qualify_column(&related_key)))
            }
            RelationLink::Direct { .. } => query,
        }
    }
}

/// Resolves dotted relationship paths against a [`Schema`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationshipResolver;

impl RelationshipResolver {
    /// Walk `path` from `model`, one relation per segment.
    ///
    /// Returns `None` when the path is empty, the model is unknown, a segment
    /// is not a relation, or a relation targets an unregistered model.
    pub fn resolve(schema: &Schema, model: &str, path: &str) -> Option<RelationshipHandle> {
        let root = match schema.get_model(model) {
            Some(root) => Arc::clone(root),
            None => {
                debug!(model = %model, path = %path, "Relationship root model is not registered");
                return None;
            }
        };

        let mut hops: SmallVec<[RelationHop; 2]> = SmallVec::new();
        let mut current = Arc::clone(&root);

        for segment in path.split('.') {
            let Some(spec) = current.get_relation(segment) else {
                debug!(model = %current.name, segment = %segment, path = %path, "Path segment is not a relation");
                return None;
            };
            let Some(related) = schema.get_model(&spec.related_model) else {
                debug!(
                    relation = %spec.name,
                    related = %spec.related_model,
                    "Relation targets an unregistered model"
                );
                return None;
            };

            hops.push(RelationHop {
                parent: Arc::clone(&current),
                spec: spec.clone(),
                related: Arc::clone(related),
            });
            current = Arc::clone(related);
        }

        let terminal = hops.pop()?;
        Some(RelationshipHandle {
            root,
            path: path.into(),
            through: hops,
            terminal,
        })
    }
}
