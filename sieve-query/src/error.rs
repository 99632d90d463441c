//! Error types for query composition and filter configuration.
//!
//! Every failure carries:
//! - An error code for programmatic handling
//! - Context about the model, field or operation involved
//! - Optional suggestions
//!
//! # Error Codes
//!
//! Error codes follow a pattern: S{category}{number}
//! - 1xxx: Query errors (unknown model, relation, column)
//! - 5xxx: Parameter errors
//! - 6xxx: Data errors (deserialization)
//! - 7xxx: Configuration errors (missing settings, mismatched constraints)
//! - 9xxx: Internal errors
//!
//! ```rust
//! use sieve_query::{QueryError, ErrorCode};
//!
//! let err = QueryError::unknown_relation("Post", "writer");
//! assert_eq!(err.code, ErrorCode::UnknownRelation);
//! assert!(err.to_string().contains("writer"));
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Query errors (1xxx)
    /// Required field missing (S1005).
    RequiredFieldMissing = 1005,
    /// Model is not registered in the schema (S1006).
    UnknownModel = 1006,
    /// Relation does not exist on the model (S1007).
    UnknownRelation = 1007,
    /// Column does not exist on the model (S1008).
    UnknownColumn = 1008,

    // Parameter errors (5xxx)
    /// Invalid parameter (S5003).
    InvalidParameter = 5003,

    // Data errors (6xxx)
    /// Deserialization error (S6003).
    DeserializationError = 6003,

    // Configuration errors (7xxx)
    /// Invalid configuration (S7001).
    InvalidConfiguration = 7001,
    /// Missing configuration (S7002).
    MissingConfiguration = 7002,
    /// Operator attached to the wrong kind of constraint (S7004).
    ConstraintMismatch = 7004,

    // Internal errors (9xxx)
    /// Internal error (S9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "S1007").
    pub fn code(&self) -> String {
        format!("S{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RequiredFieldMissing => "Required field missing",
            Self::UnknownModel => "Unknown model",
            Self::UnknownRelation => "Unknown relation",
            Self::UnknownColumn => "Unknown column",
            Self::InvalidParameter => "Invalid parameter",
            Self::DeserializationError => "Deserialization error",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::MissingConfiguration => "Missing configuration",
            Self::ConstraintMismatch => "Constraint mismatch",
            Self::Internal => "Internal error",
        }
    }

    /// Check if the code belongs to the configuration category.
    pub fn is_configuration(&self) -> bool {
        (*self as u16) / 1000 == 7
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The model involved.
    pub model: Option<String>,
    /// The field, relation or constraint involved.
    pub field: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
}

/// Errors that can occur while composing queries or configuring filters.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create an unknown model error.
    pub fn unknown_model(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::UnknownModel,
            format!("Model {} is not registered in the schema", model),
        )
        .with_model(&model)
        .with_suggestion("Register the model with Schema::model() before building queries")
    }

    /// Create an unknown relation error.
    pub fn unknown_relation(model: impl Into<String>, relation: impl Into<String>) -> Self {
        let model = model.into();
        let relation = relation.into();
        Self::new(
            ErrorCode::UnknownRelation,
            format!("Relation {} does not exist on model {}", relation, model),
        )
        .with_model(&model)
        .with_field(&relation)
        .with_suggestion(format!("Check the relationship path for typos: {}", relation))
    }

    /// Create an unknown column error, raised when a model declares its
    /// columns and `column` is not one of them.
    pub fn unknown_column(model: impl Into<String>, column: impl Into<String>) -> Self {
        let model = model.into();
        let column = column.into();
        Self::new(
            ErrorCode::UnknownColumn,
            format!("Column {} does not exist on model {}", column, model),
        )
        .with_model(&model)
        .with_field(&column)
    }

    /// Create a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            ErrorCode::RequiredFieldMissing,
            format!("The {} field is required", field),
        )
        .with_field(&field)
    }

    /// Create an invalid input error.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidParameter,
            format!("Invalid input for {}: {}", field, message),
        )
        .with_field(&field)
    }

    /// Create a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorCode::DeserializationError,
            format!("Failed to deserialize input: {}", message),
        )
    }

    /// Create an invalid configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message.into())
    }

    /// Create a missing configuration error.
    pub fn missing_configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MissingConfiguration, message.into())
    }

    /// Create a constraint mismatch error.
    pub fn constraint_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConstraintMismatch, message.into())
            .with_suggestion("Attach the operator to a constraint of the kind it was written for")
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message))
    }

    // ============== Error Checks ==============

    /// Check if this is a configuration error.
    pub fn is_configuration_error(&self) -> bool {
        self.code.is_configuration()
    }

    /// Check if this is an unknown relation error.
    pub fn is_unknown_relation(&self) -> bool {
        self.code == ErrorCode::UnknownRelation
    }
}
