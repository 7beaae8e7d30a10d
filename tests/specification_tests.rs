//! Integration tests for specification resolution.
//!
//! Covers the engine end to end:
//! - minimal documents for every kind
//! - header validation order and section legality
//! - layered sources and patching
//! - build specification derivation

use runspec::error::ErrorCode;
use runspec::schemas::BuildConfig;
use runspec::sources::Source;
use runspec::spec::{Section, SpecKind, Specification};
use runspec::variants::Loss;
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

/// Smallest legal document for each kind.
fn minimal(kind: SpecKind) -> Value {
    let mut doc = json!({"version": 1, "kind": kind.as_str()});
    for section in kind.contract().required {
        let value = match section {
            Section::Version | Section::Kind => continue,
            Section::Build => json!({"image": "python:3"}),
            Section::Run => json!({"cmd": "python main.py"}),
            Section::Hptuning => json!({"matrix": {"lr": {"values": [0.1, 0.01]}}}),
            other => panic!("no fixture for required section {other}"),
        };
        doc[section.as_str()] = value;
    }
    doc
}

#[test]
fn test_minimal_document_for_every_kind() {
    for kind in SpecKind::ALL {
        let spec = Specification::from_value(kind, minimal(kind))
            .unwrap_or_else(|e| panic!("{kind}: {e}"));
        assert_eq!(spec.kind(), kind);
        assert_eq!(spec.version(), 1);
    }
}

#[test]
fn test_missing_version_reported_before_shape() {
    let err = Specification::from_value(
        SpecKind::Experiment,
        json!({"kind": "experiment", "bogus": 1}),
    )
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingVersion);

    let err = Specification::from_value(SpecKind::Experiment, json!({"version": 1, "bogus": 1}))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingKind);
}

#[test]
fn test_version_bounds() {
    for version in [json!(0), json!(2), json!("1")] {
        let mut doc = minimal(SpecKind::Experiment);
        doc["version"] = version.clone();
        let err = Specification::from_value(SpecKind::Experiment, doc).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedVersion, "version {version}");
    }
    assert!(Specification::from_value(SpecKind::Experiment, minimal(SpecKind::Experiment)).is_ok());
}

#[test]
fn test_unexpected_section_is_named() {
    let mut doc = minimal(SpecKind::Job);
    doc["pipeline"] = json!({});
    let err = Specification::from_value(SpecKind::Job, doc).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnexpectedSection);
    assert_eq!(err.section().as_deref(), Some("pipeline"));
}

#[test]
fn test_unsupported_section_for_kind() {
    let mut doc = minimal(SpecKind::Experiment);
    doc["hptuning"] = json!({"matrix": {"lr": {"values": [0.1]}}});
    let err = Specification::from_value(SpecKind::Experiment, doc).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedSection);
    assert_eq!(err.section().as_deref(), Some("hptuning"));
    assert!(err.to_string().contains("experiment"));
}

#[test]
fn test_missing_required_section() {
    let err = Specification::from_value(SpecKind::Group, json!({"version": 1, "kind": "group", "run": {"cmd": "x"}}))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingRequiredSection);
    assert_eq!(err.section().as_deref(), Some("hptuning"));
}

#[test]
fn test_kind_mismatch() {
    let err = Specification::from_value(SpecKind::Group, minimal(SpecKind::Experiment)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::KindMismatch);
}

#[test]
fn test_layered_files_override_in_order() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("base.yaml");
    let local = temp.path().join("local.yaml");
    fs::write(
        &base,
        r#"
version: 1
kind: experiment
tags: [baseline]
environment:
  resources:
    gpu:
      requests: 1
      limits: 2
run:
  cmd: python train.py
  loss: HingeLoss
"#,
    )
    .unwrap();
    fs::write(
        &local,
        r#"
tags: [local]
environment:
  resources:
    gpu:
      limits: 4
run:
  loss:
    HuberLoss:
      clip: 0.5
"#,
    )
    .unwrap();

    let spec = Specification::new(SpecKind::Experiment, [Source::path(&base), Source::path(&local)])
        .unwrap();
    assert_eq!(
        spec.tags().unwrap().iter().cloned().collect::<Vec<_>>(),
        vec!["local".to_string()]
    );
    let gpu = spec.environment().unwrap().resources.as_ref().unwrap().gpu.as_ref().unwrap();
    // Sections are replaced wholesale, not merged field by field.
    assert_eq!(gpu.requests, None);
    assert_eq!(gpu.limits, Some(4.0));
    let run = spec.run().unwrap();
    assert!(matches!(run.loss, Some(Loss::HuberLoss { clip, .. }) if clip == 0.5));
    assert!(run.cmd.is_none());
}

#[test]
fn test_empty_source_is_skipped() {
    let spec = Specification::new(
        SpecKind::Tensorboard,
        [Source::text("version: 1\nkind: tensorboard\n"), Source::text("")],
    )
    .unwrap();
    assert!(spec.is_tensorboard());

    let err = Specification::new(SpecKind::Tensorboard, [Source::text("- a\n- b\n")]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidSource);
}

#[test]
fn test_patch_leaves_original_untouched() {
    let original = Specification::from_value(SpecKind::Experiment, minimal(SpecKind::Experiment))
        .unwrap();
    let snapshot = original.clone();

    let patched = original
        .patch([Source::Value(json!({"run": {"cmd": "python eval.py"}, "tags": ["eval"]}))])
        .unwrap();

    assert_eq!(original, snapshot);
    assert_eq!(original.data()["run"]["cmd"], json!("python main.py"));
    assert_eq!(patched.data()["run"]["cmd"], json!("python eval.py"));
    assert!(patched.tags().unwrap().contains("eval"));
    assert!(original.tags().is_none());
}

#[test]
fn test_patch_replaces_sections_and_null_clears() {
    let original = Specification::from_value(
        SpecKind::Build,
        json!({
            "version": 1,
            "kind": "build",
            "tags": ["a"],
            "build": {"image": "python:3", "build_steps": ["pip install numpy"]},
        }),
    )
    .unwrap();

    let patched = original
        .patch([Source::Value(json!({"build": {"image": "python:3.11"}, "tags": null}))])
        .unwrap();

    assert_eq!(patched.data()["build"], json!({"image": "python:3.11"}));
    assert!(patched.build().unwrap().build_steps.is_empty());
    assert!(patched.tags().is_none());
    assert_eq!(
        patched.data().keys().collect::<Vec<_>>(),
        vec!["version", "kind", "build"]
    );
    assert!(original.tags().unwrap().contains("a"));
    assert_eq!(original.build().unwrap().build_steps, vec!["pip install numpy"]);
}

#[test]
fn test_failed_patch_keeps_original() {
    let original = Specification::from_value(SpecKind::Job, minimal(SpecKind::Job)).unwrap();
    let err = original
        .patch([Source::Value(json!({"hptuning": {"matrix": {}}}))])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedSection);
    assert!(original.is_job());
}

#[test]
fn test_read_returns_same_kind_unchanged() {
    let spec = Specification::from_value(SpecKind::Notebook, minimal(SpecKind::Notebook)).unwrap();
    let again = Specification::read(SpecKind::Notebook, spec.clone()).unwrap();
    assert_eq!(again, spec);

    let err = Specification::read(SpecKind::Tensorboard, spec).unwrap_err();
    assert_eq!(err.code(), ErrorCode::KindMismatch);
}

#[test]
fn test_raw_data_is_json_text() {
    let spec = Specification::from_value(SpecKind::Tensorboard, minimal(SpecKind::Tensorboard))
        .unwrap();
    let parsed: Value = serde_json::from_str(&spec.raw_data()).unwrap();
    assert_eq!(parsed, json!({"version": 1, "kind": "tensorboard"}));
}

#[test]
fn test_header_fields() {
    let spec = Specification::from_value(
        SpecKind::Experiment,
        json!({
            "version": 1,
            "kind": "experiment",
            "backend": "native",
            "framework": "pytorch",
            "logging": {"level": "warning"},
            "run": {"cmd": "python main.py"},
        }),
    )
    .unwrap();
    assert_eq!(spec.header().log_level(), runspec::logging::LogLevel::Warning);
    assert_eq!(spec.framework().map(|f| f.to_string()).as_deref(), Some("pytorch"));
    assert!(spec.backend().is_some());
}

#[test]
fn test_create_build_specification() {
    let mut config = BuildConfig::new("tensorflow/tensorflow:2.0");
    config.build_steps = vec!["pip install polyaxon-client".to_string()];

    let document = Specification::create_specification_document(config.clone()).unwrap();
    assert_eq!(document["version"], json!(1));
    assert_eq!(document["kind"], json!("build"));
    assert_eq!(document["build"]["image"], json!("tensorflow/tensorflow:2.0"));

    let spec = Specification::create_specification(config).unwrap();
    assert!(spec.is_build());
    assert_eq!(spec.build().unwrap().build_steps.len(), 1);
}

#[test]
fn test_create_build_specification_drops_foreign_keys() {
    let spec = Specification::create_specification(json!({
        "image": "python:3",
        "cmd": "python main.py",
        "resources": {"cpu": 1},
    }))
    .unwrap();
    assert_eq!(
        spec.data()["build"].as_object().unwrap().keys().collect::<Vec<_>>(),
        vec!["image"]
    );

    let err = Specification::create_specification(json!(["python:3"])).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidBuildInput);
}

#[test]
fn test_group_grid() {
    let spec = Specification::from_value(
        SpecKind::Group,
        json!({
            "version": 1,
            "kind": "group",
            "hptuning": {
                "concurrency": 2,
                "matrix": {
                    "lr": {"values": [0.1, 0.01]},
                    "units": {"values": [32, 64, 128]},
                },
                "grid_search": {"n_experiments": 4},
            },
            "run": {"cmd": "python train.py"},
        }),
    )
    .unwrap();
    let hptuning = spec.hptuning().unwrap();
    assert_eq!(hptuning.concurrency, 2);
    let grid = hptuning.grid_suggestions();
    assert_eq!(grid.len(), 4);
    assert_eq!(grid[0]["lr"], json!(0.1));
    assert_eq!(grid[0]["units"], json!(32));
    assert_eq!(grid[3]["lr"], json!(0.01));
    assert_eq!(grid[3]["units"], json!(32));
}

#[test]
fn test_invalid_hptuning_section() {
    let mut doc = minimal(SpecKind::Group);
    doc["hptuning"]["concurrency"] = json!(0);
    let err = Specification::from_value(SpecKind::Group, doc).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidSection);
    assert_eq!(err.section().as_deref(), Some("hptuning"));
}
