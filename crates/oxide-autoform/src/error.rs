//! Error types for schema loading and engine operations.

use thiserror::Error;

/// Errors produced by the form engine.
///
/// Invalid user input is never an error: it is reported as
/// [`ValidationErrors`](crate::ValidationErrors) through the `validation`
/// event.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormError {
    /// The schema is malformed or inconsistent.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Conditional visibility or dependencies form a cycle.
    #[error(transparent)]
    CyclicDependency(#[from] CyclicDependencyError),

    /// No field with this name exists in the schema.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// The field is disabled and does not accept input.
    #[error("field is disabled: {0}")]
    DisabledField(String),

    /// The operation is not allowed in the engine's current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the engine was in.
        state: String,
    },
}

/// Every problem found while loading a schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "invalid form schema ({} violation(s)):\n{}",
    .violations.len(),
    .violations.iter().map(|v| format!("  - {v}")).collect::<Vec<_>>().join("\n")
)]
pub struct SchemaError {
    /// Violations in the order they were detected.
    pub violations: Vec<SchemaViolation>,
}

impl SchemaError {
    /// Returns whether a violation equal to `violation` was reported.
    #[must_use]
    pub fn contains(&self, violation: &SchemaViolation) -> bool {
        self.violations.contains(violation)
    }
}

/// A single schema defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    /// A field has an empty name.
    #[error("field #{index} has an empty name")]
    EmptyName {
        /// Position of the field in the schema.
        index: usize,
    },

    /// Two fields share a name.
    #[error("duplicate field name '{0}'")]
    DuplicateField(String),

    /// A `dependencies` entry names a field that does not exist.
    #[error("field '{field}' depends on unknown field '{dependency}'")]
    UnknownDependency {
        /// The declaring field.
        field: String,
        /// The missing field.
        dependency: String,
    },

    /// The `conditional` clause names a field that does not exist.
    #[error("field '{field}' is conditional on unknown field '{target}'")]
    UnknownConditionalField {
        /// The declaring field.
        field: String,
        /// The missing field.
        target: String,
    },

    /// A select or radio field has no options.
    #[error("field '{0}' requires at least one option")]
    MissingOptions(String),

    /// Two options of one field share a value.
    #[error("field '{field}' has duplicate option value {value}")]
    DuplicateOption {
        /// The declaring field.
        field: String,
        /// The repeated value, rendered as JSON.
        value: String,
    },

    /// The default value is not one of the field's options.
    #[error("default value of field '{0}' is not one of its options")]
    DefaultNotInOptions(String),

    /// A rule that needs a value has none.
    #[error("rule '{rule}' on field '{field}' requires a value")]
    MissingRuleValue {
        /// The declaring field.
        field: String,
        /// The rule kind.
        rule: &'static str,
    },

    /// A rule value has the wrong shape.
    #[error("rule '{rule}' on field '{field}': {message}")]
    InvalidRuleValue {
        /// The declaring field.
        field: String,
        /// The rule kind.
        rule: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// A dependency cycle between fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cyclic field dependency: {}", .cycle.join(" -> "))]
pub struct CyclicDependencyError {
    /// Field names along the cycle; the first name is repeated at the end.
    pub cycle: Vec<String>,
}

/// Result type alias for form operations.
pub type Result<T> = std::result::Result<T, FormError>;
