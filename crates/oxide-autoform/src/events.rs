//! Form events and their subscriber registry.
//!
//! Dispatch is synchronous: [`EventBus::emit`] calls every matching handler
//! before returning, in subscription order. A handler stays registered for
//! as long as its [`Subscription`] guard is alive.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use tracing::trace;

use crate::schema::{FieldValue, FormData};
use crate::validation::ValidationErrors;

/// The kinds of event a form emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Change,
    Validation,
    Submit,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Change => "change",
            Self::Validation => "validation",
            Self::Submit => "submit",
        })
    }
}

/// An event published to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum FormEvent {
    /// A field value was set.
    Change {
        field: String,
        value: FieldValue,
        #[serde(rename = "formData")]
        form_data: FormData,
    },
    /// Whole-form validation status.
    Validation {
        #[serde(rename = "isValid")]
        is_valid: bool,
        errors: ValidationErrors,
    },
    /// The form passed validation; carries the visible fields' data.
    Submit { data: FormData },
}

impl FormEvent {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Change { .. } => EventKind::Change,
            Self::Validation { .. } => EventKind::Validation,
            Self::Submit { .. } => EventKind::Submit,
        }
    }

    /// Builds a validation event from a set of errors.
    #[must_use]
    pub fn validation(errors: ValidationErrors) -> Self {
        Self::Validation {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

type Handler = Rc<RefCell<dyn FnMut(&FormEvent)>>;

struct Entry {
    id: u64,
    kind: EventKind,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<Entry>,
}

impl Registry {
    fn is_registered(&self, id: u64) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }
}

/// Registry of event handlers.
#[derive(Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.registry.borrow().entries.len())
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for one kind of event.
    ///
    /// The handler is removed when the returned guard is dropped.
    #[must_use = "dropping the subscription unsubscribes the handler"]
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl FnMut(&FormEvent) + 'static,
    ) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push(Entry {
            id,
            kind,
            handler: Rc::new(RefCell::new(handler)),
        });
        trace!(id, %kind, "subscribed");

        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Delivers an event to every handler registered for its kind.
    ///
    /// Handlers may drop subscriptions while the event is delivered; a
    /// handler removed that way is not called. Handlers must not emit on
    /// the bus that is calling them.
    pub fn emit(&self, event: &FormEvent) {
        let kind = event.kind();
        let targets: Vec<(u64, Handler)> = self
            .registry
            .borrow()
            .entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| (e.id, Rc::clone(&e.handler)))
            .collect();
        trace!(%kind, handlers = targets.len(), "emitting event");

        for (id, handler) in targets {
            if self.registry.borrow().is_registered(id) {
                (&mut *handler.borrow_mut())(event);
            }
        }
    }

    /// Returns the number of handlers registered for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.registry
            .borrow()
            .entries
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

/// Guard for a registered handler; unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    /// Removes the handler now.
    pub fn unsubscribe(self) {}

    /// Returns whether the handler is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|r| r.borrow().is_registered(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().entries.retain(|e| e.id != self.id);
            trace!(id = self.id, "unsubscribed");
        }
    }
}
