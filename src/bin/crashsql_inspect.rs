//! crashsql-inspect: Summarize the fields of a collision data payload
//!
//! Unwraps the payload the same way `crashsql` does, then reports per-field
//! presence, JSON types and value formats, plus which mapped fields some
//! records lack. Useful when upstream changes shape.
//!
//! Usage:
//!   crashsql-inspect response.json
//!   curl -s "$WSDOT_URL" | crashsql-inspect --compact

mod common;

use anyhow::Result;
use clap::Parser;
use common::{describe, init_logging, load_table, print_report, read_input, ErrorFormat};
use crashsql::normalize::{normalize, NormalizeOptions, DEFAULT_MAX_DEPTH};
use crashsql::{profile_records, PayloadProfile};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "crashsql-inspect")]
#[command(about = "Summarize the fields of a collision data payload", long_about = None)]
struct Args {
    /// Payload file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Mapping table TOML to check field coverage against
    #[arg(long, env = "CRASHSQL_MAPPING")]
    mapping: Option<PathBuf>,

    /// Maximum number of quote/escape layers to remove from the payload
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_unwrap_depth: usize,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,

    /// How failures are printed on stderr
    #[arg(long, value_enum, default_value_t = ErrorFormat::Text)]
    error_format: ErrorFormat,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct Inspection<'a> {
    unwrap_depth: usize,
    missing_fields: Vec<&'a str>,
    profile: &'a PayloadProfile,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let (report, code) = describe(&err);
            print_report(&report, args.error_format);
            ExitCode::from(code)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let table = load_table(args.mapping.as_ref())?;
    let raw = read_input(args.input.as_ref())?;

    let normalized = normalize(&raw, NormalizeOptions::new(args.max_unwrap_depth)?)?;
    let unwrap_depth = normalized.depth;
    let records = normalized.into_records()?;

    if records.is_empty() {
        warn!("payload contains no records");
    }

    let profile = profile_records(&records);
    let inspection = Inspection {
        unwrap_depth,
        missing_fields: profile.missing_fields(&table),
        profile: &profile,
    };

    let output = if args.compact {
        serde_json::to_string(&inspection)?
    } else {
        serde_json::to_string_pretty(&inspection)?
    };

    println!("{}", output);

    Ok(())
}
