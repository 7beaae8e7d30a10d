//! Build-spec subcommand: derive a minimal build specification.

use crate::error::{ConfigurationError, SpecError, value_kind};
use crate::sources::Source;
use crate::spec::{BuildInput, Section, Specification};
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;

/// Arguments for the build-spec subcommand
#[derive(Args, Debug)]
pub struct BuildSpecArgs {
    /// A build mapping, or any specification with a `build` section
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Resolve the build specification and print its expanded sections
    #[arg(long)]
    pub resolve: bool,
}

pub fn run(args: &BuildSpecArgs) -> anyhow::Result<Value> {
    let source = Source::path(&args.file);
    let raw = match source.load().map_err(SpecError::from)? {
        Value::Object(mut document) => match document.remove(Section::Build.as_str()) {
            Some(build @ Value::Object(_)) => build,
            _ => Value::Object(document),
        },
        other => {
            return Err(SpecError::from(ConfigurationError::InvalidSource {
                source_name: source.to_string(),
                found: value_kind(&other),
            })
            .into());
        }
    };

    if args.resolve {
        let spec = Specification::create_specification(BuildInput::Raw(raw))?;
        Ok(Value::Object(spec.parsed_sections().clone()))
    } else {
        let document = Specification::create_specification_document(BuildInput::Raw(raw))?;
        Ok(Value::Object(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_build_spec_from_job_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("job.yaml");
        std::fs::write(
            &path,
            r#"
version: 1
kind: job
build:
  image: python:3
  build_steps: [pip install -r requirements.txt]
run:
  cmd: python main.py
"#,
        )
        .unwrap();

        let args = BuildSpecArgs {
            file: path,
            resolve: false,
        };
        assert_eq!(
            run(&args).unwrap(),
            json!({
                "version": 1,
                "kind": "build",
                "build": {"image": "python:3", "build_steps": ["pip install -r requirements.txt"]},
            })
        );
    }

    #[test]
    fn test_build_spec_requires_image() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("build.yaml");
        std::fs::write(&path, "build_steps: [make]\n").unwrap();

        let args = BuildSpecArgs {
            file: path,
            resolve: true,
        };
        let err = run(&args).unwrap_err();
        let err = err.downcast_ref::<SpecError>().unwrap();
        assert_eq!(err.code(), ErrorCode::InvalidSection);
    }
}
