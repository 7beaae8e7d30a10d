//! Integration tests for `for` / `if` operators inside specifications.

use runspec::error::ErrorCode;
use runspec::spec::{OperatorResolver, SpecKind, Specification, contains_operators};
use serde_json::{Map, Value, json};

fn experiment(run: Value) -> Value {
    json!({
        "version": 1,
        "kind": "experiment",
        "declarations": {"scaled": [10, 20, 30], "gpu": true, "lr": 0.01},
        "run": run,
    })
}

#[test]
fn test_for_yields_in_order_and_is_deterministic() {
    let doc = experiment(json!({"cmd": {"for": "x", "in": "scaled", "do": "train --units={{ x }}"}}));
    let first = Specification::from_value(SpecKind::Experiment, doc.clone()).unwrap();
    let second = Specification::from_value(SpecKind::Experiment, doc).unwrap();

    let expected = json!(["train --units=10", "train --units=20", "train --units=30"]);
    assert_eq!(first.parsed_sections()["run"]["cmd"], expected);
    assert_eq!(first.parsed_sections(), second.parsed_sections());
    assert_eq!(first.run().unwrap().cmd.as_ref().unwrap().steps().len(), 3);
}

#[test]
fn test_whole_template_keeps_value_type() {
    let doc = experiment(json!({
        "cmd": "python train.py",
        "optimizer": {"Adam": {"learning_rate": "{{ lr }}"}},
    }));
    let spec = Specification::from_value(SpecKind::Experiment, doc).unwrap();
    assert_eq!(spec.parsed_sections()["run"]["optimizer"]["Adam"]["learning_rate"], json!(0.01));
    assert_eq!(spec.run().unwrap().optimizer.as_ref().unwrap().learning_rate(), 0.01);
}

#[test]
fn test_if_in_sequence_splices_or_drops() {
    let doc = experiment(json!({
        "cmd": [
            "pip install -r requirements.txt",
            {"if": "gpu", "do": "pip install cupy", "else": "pip install numpy"},
            {"if": false, "do": "never"},
            "python train.py",
        ],
    }));
    let spec = Specification::from_value(SpecKind::Experiment, doc).unwrap();
    assert_eq!(
        spec.parsed_sections()["run"]["cmd"],
        json!(["pip install -r requirements.txt", "pip install cupy", "python train.py"])
    );
}

#[test]
fn test_if_without_yield_drops_mapping_key() {
    let doc = experiment(json!({
        "cmd": "python train.py",
        "loss": {"if": "{{ gpu }}", "do": "HingeLoss"},
    }));
    let spec = Specification::from_value(SpecKind::Experiment, doc.clone()).unwrap();
    assert_eq!(spec.parsed_sections()["run"]["loss"], json!("HingeLoss"));

    let mut doc = doc;
    doc["declarations"]["gpu"] = json!(false);
    let spec = Specification::from_value(SpecKind::Experiment, doc).unwrap();
    assert_eq!(spec.parsed_sections()["run"]["loss"], Value::Null);
    assert!(spec.run().unwrap().loss.is_none());
}

#[test]
fn test_operators_outside_operator_sections_are_kept() {
    let mut doc = experiment(json!({"cmd": "python train.py"}));
    doc["declarations"]["steps"] = json!({"for": "x", "in": [1, 2], "do": "{{ x }}"});
    let spec = Specification::from_value(SpecKind::Experiment, doc).unwrap();
    assert!(contains_operators(&spec.parsed_sections()["declarations"]));
}

#[test]
fn test_unresolved_reference_fails_in_section() {
    let doc = experiment(json!({"cmd": "python train.py --lr={{ learning_rate }}"}));
    let err = Specification::from_value(SpecKind::Experiment, doc).unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperatorReference);
    assert_eq!(err.section().as_deref(), Some("run"));
}

#[test]
fn test_non_sequence_iterable_fails() {
    let doc = experiment(json!({"cmd": {"for": "x", "in": "lr", "do": "{{ x }}"}}));
    let err = Specification::from_value(SpecKind::Experiment, doc).unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperatorType);
}

#[test]
fn test_malformed_operator_fails() {
    let doc = experiment(json!({"cmd": {"for": "x", "in": "scaled"}}));
    let err = Specification::from_value(SpecKind::Experiment, doc).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MalformedOperator);
}

#[test]
fn test_resolver_on_bare_document() {
    let mut document = Map::new();
    document.insert("declarations".to_string(), json!({"names": ["a", "b"]}));
    let resolver = OperatorResolver::new(&document);

    let yields = resolver
        .expand(&json!({"for": "n", "in": "names", "do": {"file": "{{ n }}.csv"}}))
        .unwrap();
    assert_eq!(yields, vec![json!({"file": "a.csv"}), json!({"file": "b.csv"})]);
    assert_eq!(resolver.resolve_section(&json!({"if": false, "do": 1})).unwrap(), Value::Null);
}
