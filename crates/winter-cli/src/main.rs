//! Winter validation CLI
//!
//! Validates a JSON document against a JSON rule file.
//!
//! Exit status: 0 when valid, 1 when violations were found, 2 when the rules,
//! dictionaries, config or document could not be loaded.

mod formatter;
mod rules;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use formatter::{format_report, OutputFormat};
use rules::RuleSet;
use tracing::{debug, info};
use winter_core::{ConfigurationError, ValidationConfig, ValidationEngine, Value};

/// Winter document validator
#[derive(Parser, Debug)]
#[command(name = "winter-validate")]
#[command(version, about = "Validate a JSON document against Winter constraint rules")]
pub struct Args {
    /// Rule file (JSON)
    #[arg(short, long)]
    pub rules: PathBuf,

    /// Dictionary file for dynamic enum values (JSON)
    #[arg(short, long)]
    pub dicts: Option<PathBuf>,

    /// Validation config file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,

    /// Document to validate (JSON)
    pub data: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("winter=info")),
        )
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(report) => {
            println!("{}", format_report(&report, args.format));
            if report.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            match e.downcast_ref::<ConfigurationError>() {
                Some(config_error) => eprintln!("Error: {}", config_error.detailed()),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> anyhow::Result<Vec<winter_core::FieldViolation>> {
    let config = match &args.config {
        Some(path) => ValidationConfig::from_path(path)?,
        None => ValidationConfig::default(),
    };

    let mut engine = ValidationEngine::new(config);
    if let Some(path) = &args.dicts {
        let provider = rules::load_dicts(path)?;
        info!(path = %path.display(), "loaded dictionaries");
        engine = engine.with_provider(provider);
    }

    let validator = RuleSet::from_path(&args.rules)?.build(&engine)?;
    let document = load_document(&args.data)?;

    let violations = validator.validate(&document);
    debug!(
        violations = violations.len(),
        compiled_expressions = engine.cache().len(),
        "validation finished"
    );
    Ok(violations)
}

fn load_document(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read document {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("document {} is not valid JSON", path.display()))?;
    Ok(Value::from(json))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn args(dir: &Path, data: &str, config: Option<&str>) -> Args {
        Args {
            rules: write(
                dir,
                "rules.json",
                r#"{"fields": {"status": [{"enum": {"dictType": "status", "values": ["ACTIVE"]}}]}}"#,
            ),
            dicts: Some(write(dir, "dicts.json", r#"{"status": ["INACTIVE"]}"#)),
            config: config.map(|c| write(dir, "config.json", c)),
            format: OutputFormat::Text,
            data: write(dir, "data.json", data),
        }
    }

    #[test]
    fn test_run_valid_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&args(dir.path(), r#"{"status": "INACTIVE"}"#, None))
            .unwrap()
            .is_empty());
        assert_eq!(
            run(&args(dir.path(), r#"{"status": "PENDING"}"#, None))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_config_disables_checks() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(dir.path(), r#"{"status": "PENDING"}"#, Some(r#"{"enabled": false}"#));
        assert!(run(&args).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_document() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&args(dir.path(), "{not json", None)).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_configuration_errors_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(dir.path(), "{}", None);
        args.rules = write(
            dir.path(),
            "bad.json",
            r#"{"fields": {"n": [{"expression": {"expression": "value >"}}]}}"#,
        );
        let err = run(&args).unwrap_err();
        assert!(err.downcast_ref::<ConfigurationError>().is_some());
    }

    #[test]
    fn test_cli_parses() {
        let args = Args::try_parse_from([
            "winter-validate",
            "--rules",
            "r.json",
            "--format",
            "json",
            "doc.json",
        ])
        .unwrap();
        assert_eq!(args.format, OutputFormat::Json);
        assert!(args.dicts.is_none());
    }
}
