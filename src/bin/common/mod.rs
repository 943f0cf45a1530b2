//! Logging setup and failure reporting shared by the command-line tools

use anyhow::{Context, Result};
use clap::ValueEnum;
use crashsql::{Error, ErrorReport, MappingTable};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ErrorFormat {
    Text,
    Json,
}

/// Log to stderr; `RUST_LOG` overrides the verbosity flag
pub fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();
}

/// The table from `path`, or the built-in one
pub fn load_table(path: Option<&PathBuf>) -> Result<MappingTable> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read mapping table {}", path.display()))?;
            Ok(MappingTable::from_toml_str(&text)?)
        }
        None => Ok(MappingTable::default()),
    }
}

/// Payload text from `path`, or stdin
pub fn read_input(path: Option<&PathBuf>) -> Result<String> {
    let mut raw = String::new();
    match path {
        Some(path) => {
            File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?
                .read_to_string(&mut raw)
                .with_context(|| format!("Failed to read {}", path.display()))?;
        }
        None => {
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read stdin")?;
        }
    }
    Ok(raw)
}

/// Structured report and exit status for a failure
pub fn describe(err: &anyhow::Error) -> (ErrorReport, u8) {
    match err.downcast_ref::<Error>() {
        Some(core) => {
            let code = match core {
                Error::Configuration(_) => 2,
                Error::MalformedPayload { .. } | Error::FieldFormat { .. } => 1,
            };
            (core.report(), code)
        }
        None => (
            ErrorReport {
                kind: "io",
                message: format!("{:#}", err),
                record: None,
                field: None,
                preview: None,
            },
            2,
        ),
    }
}

pub fn print_report(report: &ErrorReport, format: ErrorFormat) {
    match format {
        ErrorFormat::Text => {
            eprintln!("error ({}): {}", report.kind, report.message);
            if let Some(preview) = &report.preview {
                eprintln!("  last attempt: {}", preview);
            }
        }
        ErrorFormat::Json => match serde_json::to_string(report) {
            Ok(json) => eprintln!("{}", json),
            Err(_) => eprintln!("error ({}): {}", report.kind, report.message),
        },
    }
}
