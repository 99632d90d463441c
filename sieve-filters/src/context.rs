//! What lazily configured values can see when they are resolved.

use sieve_query::Record;

use crate::settings::Settings;

/// The state an operator is in when one of its configured values is read.
///
/// Built fresh for every read, so computed values always observe the
/// current settings and record.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Name of the operator being configured.
    pub operator: &'a str,
    /// Name of the attached constraint, if any.
    pub constraint: Option<&'a str>,
    /// Root model of the owning filter, if bound.
    pub model: Option<&'a str>,
    /// Whether the operator is negated.
    pub inverse: bool,
    /// Submitted settings.
    pub settings: &'a Settings,
    /// Record being edited, when the filter runs in a record context.
    pub record: Option<&'a Record>,
}

impl<'a> EvaluationContext<'a> {
    /// A context with nothing but an operator name and settings.
    pub fn new(operator: &'a str, settings: &'a Settings) -> Self {
        Self {
            operator,
            constraint: None,
            model: None,
            inverse: false,
            settings,
            record: None,
        }
    }
}
