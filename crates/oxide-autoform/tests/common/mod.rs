#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use oxide_autoform::prelude::*;

/// Country select plus a province text field shown only for Canada.
pub fn country_schema() -> FormSchema {
    FormSchema::new()
        .title("Address")
        .field(
            FieldSchema::new(FieldType::Select, "country", "Country")
                .option("US", "us")
                .option("CA", "ca"),
        )
        .field(
            FieldSchema::new(FieldType::Text, "province", "Province")
                .visible_when("country", "ca")
                .rule(RuleSpec::new(RuleType::Required, "Province required")),
        )
}

pub fn engine(schema: FormSchema) -> FormEngine {
    create_engine(schema, None).unwrap_or_else(|e| panic!("schema failed to load: {e}"))
}

/// Records every event an engine emits, in order.
pub struct EventLog {
    events: Rc<RefCell<Vec<FormEvent>>>,
    _subscriptions: Vec<Subscription>,
}

impl EventLog {
    pub fn attach(engine: &FormEngine) -> Self {
        let events = Rc::new(RefCell::new(Vec::new()));
        let subscriptions = [EventKind::Change, EventKind::Validation, EventKind::Submit]
            .into_iter()
            .map(|kind| {
                let sink = Rc::clone(&events);
                engine.on(kind, move |e| sink.borrow_mut().push(e.clone()))
            })
            .collect();
        Self {
            events,
            _subscriptions: subscriptions,
        }
    }

    /// The shared buffer; stays readable after the log is dropped.
    pub fn buffer(&self) -> Rc<RefCell<Vec<FormEvent>>> {
        Rc::clone(&self.events)
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.borrow().iter().map(FormEvent::kind).collect()
    }

    pub fn take(&self) -> Vec<FormEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}
