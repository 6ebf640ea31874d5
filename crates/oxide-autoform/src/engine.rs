//! Form state manager.
//!
//! [`FormEngine`] owns the current [`FormData`] of one form and drives the
//! change, revalidate, resolve-visibility, emit cycle.

use std::fmt;
use std::iter;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{FormError, Result};
use crate::events::{EventBus, EventKind, FormEvent, Subscription};
use crate::schema::{FieldValue, FormData, FormSchema, ValidatedSchema};
use crate::validation::{validate_field, ValidationErrors};
use crate::visibility::{resolve_visible, VisibleFields};

/// Lifecycle state of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Accepting changes.
    Editing,
    /// Inside `submit`; returns to `Editing` before `submit` returns.
    Submitting,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Editing => "editing",
            Self::Submitting => "submitting",
        })
    }
}

/// Result of [`FormEngine::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The form was valid; holds the submitted payload.
    Submitted(FormData),
    /// The form was invalid; nothing was submitted.
    Rejected(ValidationErrors),
}

impl SubmitOutcome {
    /// Returns whether the form was submitted.
    #[must_use]
    pub const fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }
}

/// Loads `schema` and creates an engine for it.
///
/// # Errors
///
/// Returns [`FormError::Schema`] or [`FormError::CyclicDependency`] when
/// the schema does not load.
pub fn create_engine(schema: FormSchema, initial: Option<FormData>) -> Result<FormEngine> {
    let schema = ValidatedSchema::load(schema)?;
    Ok(FormEngine::new(Arc::new(schema), initial))
}

/// The mutable state of one form.
#[derive(Debug)]
pub struct FormEngine {
    schema: Arc<ValidatedSchema>,
    initial: FormData,
    data: FormData,
    visible: VisibleFields,
    errors: ValidationErrors,
    state: EngineState,
    events: EventBus,
}

impl FormEngine {
    /// Creates an engine.
    ///
    /// Form data starts from the schema's default values, overlaid by
    /// `initial`. No event is emitted.
    #[must_use]
    pub fn new(schema: Arc<ValidatedSchema>, initial: Option<FormData>) -> Self {
        let initial = schema.initial_data(initial);
        let data = initial.clone();
        let visible = resolve_visible(&schema, &data);
        let errors = validate_visible(&schema, &data, &visible);

        Self {
            schema,
            initial,
            data,
            visible,
            errors,
            state: EngineState::Editing,
            events: EventBus::new(),
        }
    }

    /// Sets a field value.
    ///
    /// Re-resolves visibility, re-validates the field and every field that
    /// depends on it, then emits one `change` event followed by one
    /// `validation` event carrying the whole-form status.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::UnknownField`] or [`FormError::DisabledField`] for
    /// fields that do not accept input, and [`FormError::InvalidState`] while
    /// the form is submitting.
    pub fn set_value(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        self.require_editing("set a value")?;

        let schema = Arc::clone(&self.schema);
        let field = schema
            .field(name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))?;
        if field.schema().disabled {
            return Err(FormError::DisabledField(name.to_string()));
        }

        let value = value.into();
        self.data.insert(name, value.clone());
        self.visible = resolve_visible(&schema, &self.data);

        let affected = schema.graph().affected_by(name);
        debug!(field = name, affected = ?affected, "value changed");

        for target in iter::once(name).chain(affected) {
            match schema.field(target) {
                Some(field) if self.visible.contains(target) => {
                    let messages = validate_field(field, self.data.get(target));
                    self.errors.set(target, messages);
                }
                _ => self.errors.clear(target),
            }
        }

        self.events.emit(&FormEvent::Change {
            field: name.to_string(),
            value,
            form_data: self.data.clone(),
        });
        self.events
            .emit(&FormEvent::validation(self.errors.clone()));
        Ok(())
    }

    /// Validates every visible field and submits when all pass.
    ///
    /// On failure a `validation` event is emitted and no `submit` event;
    /// on success a `submit` event carries the values of visible fields
    /// only.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidState`] when a submission is already running.
    pub fn submit(&mut self) -> Result<SubmitOutcome> {
        self.require_editing("submit")?;
        self.state = EngineState::Submitting;

        self.visible = resolve_visible(&self.schema, &self.data);
        self.errors = validate_visible(&self.schema, &self.data, &self.visible);

        let outcome = if self.errors.is_empty() {
            let payload = self.data.restricted_to(&self.visible);
            info!(fields = payload.len(), "form submitted");
            self.events.emit(&FormEvent::Submit {
                data: payload.clone(),
            });
            SubmitOutcome::Submitted(payload)
        } else {
            info!(invalid = self.errors.len(), "submission rejected");
            self.events
                .emit(&FormEvent::validation(self.errors.clone()));
            SubmitOutcome::Rejected(self.errors.clone())
        };

        self.state = EngineState::Editing;
        Ok(outcome)
    }

    /// Restores the starting values and emits a `validation` event.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidState`] while the form is submitting.
    pub fn reset(&mut self) -> Result<()> {
        self.require_editing("reset")?;
        self.data = self.initial.clone();
        self.visible = resolve_visible(&self.schema, &self.data);
        self.errors = validate_visible(&self.schema, &self.data, &self.visible);
        debug!("form reset");
        self.events
            .emit(&FormEvent::validation(self.errors.clone()));
        Ok(())
    }

    /// Recomputes whole-form validation without emitting events.
    pub fn validate(&mut self) -> &ValidationErrors {
        self.visible = resolve_visible(&self.schema, &self.data);
        self.errors = validate_visible(&self.schema, &self.data, &self.visible);
        &self.errors
    }

    /// Registers an event handler; it stays registered while the returned
    /// guard lives.
    #[must_use = "dropping the subscription unsubscribes the handler"]
    pub fn on(
        &self,
        kind: EventKind,
        handler: impl FnMut(&FormEvent) + 'static,
    ) -> Subscription {
        self.events.subscribe(kind, handler)
    }

    /// Returns the currently visible fields.
    #[must_use]
    pub fn visible_fields(&self) -> &VisibleFields {
        &self.visible
    }

    /// Returns whether a field is currently visible.
    #[must_use]
    pub fn is_visible(&self, name: &str) -> bool {
        self.visible.contains(name)
    }

    /// Returns the current form data, hidden fields included.
    #[must_use]
    pub fn form_data(&self) -> &FormData {
        &self.data
    }

    /// Returns the current value of a field.
    #[must_use]
    pub fn value(&self, name: &str) -> &FieldValue {
        self.data.get(name)
    }

    /// Returns the current validation errors of visible fields.
    #[must_use]
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Returns whether the visible fields currently pass validation.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &Arc<ValidatedSchema> {
        &self.schema
    }

    fn require_editing(&self, operation: &'static str) -> Result<()> {
        match self.state {
            EngineState::Editing => Ok(()),
            state => Err(FormError::InvalidState {
                operation,
                state: state.to_string(),
            }),
        }
    }
}

fn validate_visible(
    schema: &ValidatedSchema,
    data: &FormData,
    visible: &VisibleFields,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for field in schema.fields() {
        if visible.contains(field.name()) {
            errors.set(field.name(), validate_field(field, data.get(field.name())));
        }
    }
    errors
}
