//! Configuration values that may be computed at the point of use.
//!
//! ```rust
//! use sieve_filters::{EvaluationContext, LazyValue, Settings};
//!
//! let literal: LazyValue<usize> = 50.into();
//! let computed = LazyValue::computed(|ctx: &EvaluationContext<'_>| if ctx.inverse { 10 } else { 20 });
//!
//! let settings = Settings::new();
//! let mut ctx = EvaluationContext::new("isRelatedTo", &settings);
//! assert_eq!(literal.resolve(&ctx), 50);
//! assert_eq!(computed.resolve(&ctx), 20);
//!
//! ctx.inverse = true;
//! assert_eq!(computed.resolve(&ctx), 10);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::context::EvaluationContext;

/// Signature of a computed value.
pub type Computation<T> = Arc<dyn Fn(&EvaluationContext<'_>) -> T + Send + Sync>;

/// A literal, or a function of the [`EvaluationContext`].
///
/// Computed values are never cached: every [`resolve`](Self::resolve)
/// runs the function against the context it is given.
pub enum LazyValue<T> {
    /// A fixed value.
    Literal(T),
    /// A value computed from the context on every read.
    Computed(Computation<T>),
}

impl<T: Clone> LazyValue<T> {
    /// Wrap a function of the context.
    pub fn computed(f: impl Fn(&EvaluationContext<'_>) -> T + Send + Sync + 'static) -> Self {
        Self::Computed(Arc::new(f))
    }

    /// Produce the value for `ctx`.
    #[inline]
    pub fn resolve(&self, ctx: &EvaluationContext<'_>) -> T {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Computed(f) => f(ctx),
        }
    }

    /// Check whether the value depends on the context.
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }
}

impl<T: Clone> Clone for LazyValue<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Computed(f) => Self::Computed(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for LazyValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl<T> From<T> for LazyValue<T> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for LazyValue<String> {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<bool> for LazyValue<Option<bool>> {
    fn from(value: bool) -> Self {
        Self::Literal(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    #[test]
    fn test_literal_resolves_to_itself() {
        let settings = Settings::new();
        let ctx = EvaluationContext::new("op", &settings);
        let value: LazyValue<String> = "name".into();
        assert_eq!(value.resolve(&ctx), "name");
        assert!(!value.is_computed());
    }

    #[test]
    fn test_computed_sees_current_settings() {
        let value = LazyValue::computed(|ctx: &EvaluationContext<'_>| ctx.settings.len());
        let empty = Settings::new();
        let filled = Settings::new().with("value", 1);
        assert_eq!(value.resolve(&EvaluationContext::new("op", &empty)), 0);
        assert_eq!(value.resolve(&EvaluationContext::new("op", &filled)), 1);
        assert!(value.is_computed());
    }

    #[test]
    fn test_clone_shares_computation() {
        let value = LazyValue::computed(|ctx: &EvaluationContext<'_>| ctx.operator.len());
        let copy = value.clone();
        let settings = Settings::new();
        assert_eq!(copy.resolve(&EvaluationContext::new("four", &settings)), 4);
    }

    #[test]
    fn test_optional_flag_from_bool() {
        let settings = Settings::new();
        let ctx = EvaluationContext::new("op", &settings);
        let value: LazyValue<Option<bool>> = true.into();
        assert_eq!(value.resolve(&ctx), Some(true));
    }
}
