//! # oxide-autoform
//!
//! Schema-driven form engine: declarative validation rules, conditional
//! field visibility and form events, with no rendering attached.
//!
//! This crate provides:
//! - A serde-friendly form schema model, checked once at load time
//! - A dependency graph between fields, with cycle detection
//! - Rule-based validation that reports every failing rule
//! - Conditional visibility resolution
//! - A form engine emitting `change`, `validation` and `submit` events
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use oxide_autoform::prelude::*;
//!
//! let schema = FormSchema::new()
//!     .field(
//!         FieldSchema::new(FieldType::Select, "country", "Country")
//!             .option("US", "us")
//!             .option("CA", "ca"),
//!     )
//!     .field(
//!         FieldSchema::new(FieldType::Text, "province", "Province")
//!             .visible_when("country", "ca")
//!             .rule(RuleSpec::new(RuleType::Required, "Province required")),
//!     );
//!
//! let mut engine = create_engine(schema, None).unwrap();
//!
//! let submitted = Rc::new(RefCell::new(None));
//! let sink = Rc::clone(&submitted);
//! let _subscription = engine.on(EventKind::Submit, move |event| {
//!     if let FormEvent::Submit { data } = event {
//!         *sink.borrow_mut() = Some(data.clone());
//!     }
//! });
//!
//! engine.set_value("country", "us").unwrap();
//! assert!(!engine.is_visible("province"));
//! assert!(engine.submit().unwrap().is_submitted());
//! assert_eq!(
//!     submitted.borrow().as_ref(),
//!     Some(&FormData::from([("country", "us")])),
//! );
//! ```
//!
//! ## Loading JSON Schemas
//!
//! Schemas use the `camelCase` JSON layout of the `AutoForm` type contract:
//!
//! ```rust
//! use oxide_autoform::{FormSchema, ValidatedSchema};
//!
//! let schema = FormSchema::from_json(r#"{
//!     "fields": [
//!         {"type": "number", "name": "age", "label": "Age",
//!          "validation": [{"type": "min", "value": 18, "message": "Adults only"}]}
//!     ]
//! }"#).unwrap();
//! let schema = ValidatedSchema::load(schema).unwrap();
//! assert_eq!(schema.fields().len(), 1);
//! ```

mod engine;
mod error;
pub mod events;
pub mod graph;
mod schema;
pub mod validation;
pub mod visibility;

pub use engine::{create_engine, EngineState, FormEngine, SubmitOutcome};
pub use error::{CyclicDependencyError, FormError, Result, SchemaError, SchemaViolation};
pub use schema::{
    Field, FieldConditional, FieldOption, FieldSchema, FieldType, FieldValue, FormData,
    FormSchema, RuleSpec, RuleType, SubmitButton, ValidatedSchema, DEFAULT_REQUIRED_MESSAGE,
};
pub use validation::ValidationErrors;
pub use visibility::{resolve_visible, VisibleFields};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::engine::{create_engine, EngineState, FormEngine, SubmitOutcome};
    pub use crate::error::{FormError, Result};
    pub use crate::events::{EventKind, FormEvent, Subscription};
    pub use crate::schema::{
        FieldSchema, FieldType, FieldValue, FormData, FormSchema, RuleSpec, RuleType,
        ValidatedSchema,
    };
    pub use crate::validation::ValidationErrors;
}
