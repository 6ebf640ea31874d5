//! End-to-end behaviour of the form engine: visibility, validation,
//! submission and event ordering.

mod common;

use std::rc::Rc;

use common::{country_schema, engine, EventLog};
use oxide_autoform::prelude::*;

#[test]
fn us_address_submits_without_province() {
    let mut engine = engine(country_schema());
    let log = EventLog::attach(&engine);

    engine.set_value("country", "us").unwrap();
    assert!(!engine.is_visible("province"));

    let outcome = engine.submit().unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Submitted(FormData::from([("country", "us")]))
    );
    assert_eq!(
        log.kinds(),
        vec![EventKind::Change, EventKind::Validation, EventKind::Submit]
    );
}

#[test]
fn canadian_address_requires_province() {
    let mut engine = engine(country_schema());
    engine.set_value("country", "ca").unwrap();
    let log = EventLog::attach(&engine);

    let outcome = engine.submit().unwrap();
    assert!(!outcome.is_submitted());

    let events = log.take();
    assert_eq!(events.len(), 1, "no submit event may follow a failure");
    match &events[0] {
        FormEvent::Validation { is_valid, errors } => {
            assert!(!is_valid);
            assert_eq!(errors.get("province").unwrap(), ["Province required"]);
        }
        other => panic!("expected validation event, got {other:?}"),
    }

    engine.set_value("province", "ON").unwrap();
    log.take();
    let outcome = engine.submit().unwrap();
    let expected = FormData::from([("country", "ca"), ("province", "ON")]);
    assert_eq!(outcome, SubmitOutcome::Submitted(expected.clone()));
    assert_eq!(log.take(), vec![FormEvent::Submit { data: expected }]);
}

#[test]
fn stale_hidden_values_are_not_submitted() {
    let mut engine = engine(country_schema());
    engine.set_value("country", "ca").unwrap();
    engine.set_value("province", "QC").unwrap();
    engine.set_value("country", "us").unwrap();

    // The value is kept, but it is not part of the payload.
    assert_eq!(engine.value("province"), &FieldValue::from("QC"));
    let outcome = engine.submit().unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Submitted(FormData::from([("country", "us")]))
    );
}

#[test]
fn each_set_value_emits_change_then_validation_once() {
    let mut engine = engine(country_schema());
    let log = EventLog::attach(&engine);

    for value in ["ca", "us", "ca"] {
        engine.set_value("country", value).unwrap();
        let events = log.take();
        assert_eq!(events.len(), 2);
        match &events[0] {
            FormEvent::Change {
                field,
                value: new_value,
                form_data,
            } => {
                assert_eq!(field, "country");
                assert_eq!(new_value, &FieldValue::from(value));
                assert_eq!(form_data.get("country"), &FieldValue::from(value));
            }
            other => panic!("expected change event, got {other:?}"),
        }
        assert_eq!(events[1].kind(), EventKind::Validation);
    }
}

#[test]
fn validation_event_reports_whole_form() {
    let schema = FormSchema::new()
        .field(
            FieldSchema::new(FieldType::Text, "name", "Name")
                .rule(RuleSpec::new(RuleType::Required, "Name required")),
        )
        .field(
            FieldSchema::new(FieldType::Number, "age", "Age")
                .rule(RuleSpec::with_value(RuleType::Min, 18, "Too young")),
        );
    let mut engine = engine(schema);
    let log = EventLog::attach(&engine);

    engine.set_value("age", 12).unwrap();

    let events = log.take();
    let FormEvent::Validation { is_valid, errors } = &events[1] else {
        panic!("expected validation event");
    };
    assert!(!is_valid);
    // "name" did not change but its failure is still reported.
    assert_eq!(errors.get("name").unwrap(), ["Name required"]);
    assert_eq!(errors.get("age").unwrap(), ["Too young"]);
}

#[test]
fn nested_conditionals_hide_grandchildren() {
    let schema = FormSchema::new()
        .field(FieldSchema::new(FieldType::Checkbox, "employed", "Employed"))
        .field(
            FieldSchema::new(FieldType::Radio, "kind", "Kind")
                .option("Full time", "full")
                .option("Contract", "contract")
                .visible_when("employed", true),
        )
        .field(
            FieldSchema::new(FieldType::Text, "agency", "Agency")
                .visible_when("kind", "contract")
                .required(),
        );
    let mut engine = engine(schema);

    engine.set_value("employed", true).unwrap();
    engine.set_value("kind", "contract").unwrap();
    assert!(engine.is_visible("agency"));
    assert!(!engine.is_valid());

    engine.set_value("employed", false).unwrap();
    assert!(!engine.is_visible("kind"));
    assert!(!engine.is_visible("agency"));
    assert!(engine.is_valid());

    let outcome = engine.submit().unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Submitted(FormData::from([("employed", false)]))
    );
}

#[test]
fn required_checkbox_must_be_ticked() {
    let schema = FormSchema::new().field(
        FieldSchema::new(FieldType::Checkbox, "terms", "Accept terms")
            .rule(RuleSpec::new(RuleType::Required, "You must accept")),
    );
    let mut engine = engine(schema);

    engine.set_value("terms", false).unwrap();
    assert_eq!(engine.errors().get("terms").unwrap(), ["You must accept"]);

    engine.set_value("terms", true).unwrap();
    assert!(engine.is_valid());
}

#[test]
fn initial_data_is_validated_and_visible() {
    let schema = country_schema();
    let engine = create_engine(schema, Some(FormData::from([("country", "ca")]))).unwrap();
    assert!(engine.is_visible("province"));
    assert_eq!(
        engine.errors().get("province").unwrap(),
        ["Province required"]
    );
}

#[test]
fn dropped_subscription_stops_delivery() {
    let mut engine = engine(country_schema());
    let log = EventLog::attach(&engine);
    engine.set_value("country", "us").unwrap();
    assert_eq!(log.take().len(), 2);

    let buffer = log.buffer();
    drop(log);
    engine.set_value("country", "ca").unwrap();
    engine.submit().unwrap();

    assert!(buffer.borrow().is_empty());
    assert_eq!(Rc::strong_count(&buffer), 1, "handlers were not released");
}

#[test]
fn min_rejects_null_and_numeric_text() {
    let schema = FormSchema::new().field(
        FieldSchema::new(FieldType::Number, "age", "Age")
            .rule(RuleSpec::with_value(RuleType::Min, 18, "Too young"))
            .rule(RuleSpec::with_value(RuleType::MinLength, 2, "Too short")),
    );
    let mut engine = engine(schema);
    assert_eq!(
        engine.errors().get("age").unwrap(),
        ["Too young", "Too short"]
    );

    engine.set_value("age", FieldValue::Null).unwrap();
    assert_eq!(
        engine.errors().get("age").unwrap(),
        ["Too young", "Too short"]
    );
    assert!(!engine.submit().unwrap().is_submitted());

    engine.set_value("age", "21").unwrap();
    assert_eq!(engine.errors().get("age").unwrap(), ["Too young"]);
    let SubmitOutcome::Rejected(errors) = engine.submit().unwrap() else {
        panic!("numeric text must not satisfy min");
    };
    assert_eq!(errors.get("age").unwrap(), ["Too young"]);

    engine.set_value("age", 21).unwrap();
    assert!(engine.is_valid());
    assert_eq!(
        engine.submit().unwrap(),
        SubmitOutcome::Submitted(FormData::from([("age", 21.0)]))
    );
}
