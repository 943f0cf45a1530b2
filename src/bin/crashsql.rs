//! crashsql: Generate idempotent SQL inserts from collision data payloads
//!
//! Usage:
//!   # Read a saved API response, write SQL to stdout
//!   crashsql --mode Pedestrian response.json
//!
//!   # Read from stdin, smaller batches, write to a file
//!   curl -s "$WSDOT_URL" | crashsql --mode Bicyclist --batch-size 200 -o bicyclist.sql
//!
//!   # Retarget to another table without rebuilding
//!   crashsql --mode Pedestrian --mapping demos/wsdot_crashdata.toml response.json
//!
//! Failures are reported on stderr as a one-line message, or as a JSON object
//! with `--error-format json`. Exit status is 1 for payload and field errors,
//! 2 for configuration and I/O errors.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod common;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use common::{describe, init_logging, load_table, print_report, read_input, ErrorFormat};
use crashsql::normalize::DEFAULT_MAX_DEPTH;
use crashsql::render::DEFAULT_BATCH_SIZE;
use crashsql::{generate, GenerateRequest};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "crashsql")]
#[command(about = "Generate idempotent SQL inserts from collision data payloads", long_about = None)]
struct Args {
    /// Payload file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Classification tag stamped on every row, e.g. Pedestrian or Bicyclist
    #[arg(long, short = 'm', env = "CRASHSQL_MODE")]
    mode: String,

    /// Rows per INSERT statement
    #[arg(
        long,
        short = 'b',
        env = "CRASHSQL_BATCH_SIZE",
        default_value_t = DEFAULT_BATCH_SIZE as i64,
        allow_negative_numbers = true
    )]
    batch_size: i64,

    /// Mapping table TOML (default: built-in WSDOT crashdata table)
    #[arg(long, env = "CRASHSQL_MAPPING")]
    mapping: Option<PathBuf>,

    /// Output file (stdout if omitted)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Date written into the header (default: today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    generated_on: Option<NaiveDate>,

    /// Maximum number of quote/escape layers to remove from the payload
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_unwrap_depth: usize,

    /// How failures are printed on stderr
    #[arg(long, value_enum, default_value_t = ErrorFormat::Text)]
    error_format: ErrorFormat,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
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

    let generated_on = args.generated_on.unwrap_or_else(|| Local::now().date_naive());
    let request = GenerateRequest::new(args.mode.clone(), generated_on)
        .with_batch_size(args.batch_size)
        .with_max_unwrap_depth(args.max_unwrap_depth)
        .with_table(table);

    let raw = read_input(args.input.as_ref())?;
    let generation = generate(&raw, &request)?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    write!(out, "{}", generation.document).context("Failed to write SQL")?;
    out.flush().context("Failed to flush SQL output")?;

    info!(
        statements = generation.document.statements.len(),
        warnings = generation.warnings.len(),
        output = %args.output.as_ref().map_or("stdout".to_string(), |p| p.display().to_string()),
        "SQL written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_with_defaults() {
        let args = Args::try_parse_from(["crashsql", "--mode", "Pedestrian", "in.json"]).unwrap();
        assert_eq!(args.batch_size, 500);
        assert_eq!(args.max_unwrap_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(args.error_format, ErrorFormat::Text);
        assert_eq!(args.input, Some(PathBuf::from("in.json")));
    }

    #[test]
    fn test_negative_batch_size_reaches_validation() {
        let args = Args::try_parse_from(["crashsql", "-m", "Bicyclist", "-b", "-1"]).unwrap();
        assert_eq!(args.batch_size, -1);
    }

    #[test]
    fn test_generated_on_parses_as_date() {
        let args = Args::try_parse_from(["crashsql", "-m", "Bicyclist", "--generated-on", "2025-03-01"]).unwrap();
        assert_eq!(args.generated_on, NaiveDate::from_ymd_opt(2025, 3, 1));
    }
}
