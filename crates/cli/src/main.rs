// Dedupe CLI - label candidate pairs, review duplicate groups, export

mod exit_codes;
mod render;
mod review;
mod upload;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use dedupe_client::DedupClient;
use dedupe_config::Settings;
use dedupe_io::{DecodedFile, UploadError};
use dedupe_review::{Workflow, WorkflowError};

use exit_codes::{upload_exit_code, workflow_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};
use review::{split_list, ReviewLoop};

#[derive(Parser)]
#[command(name = "dedupe")]
#[command(about = "Human-in-the-loop record deduplication (terminal client)")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the fields available for matching
    #[command(after_help = "\
Examples:
  dedupe columns customers.csv
  dedupe columns customers.csv --preview 5
  dedupe columns kna1.xlsx kna2.xlsx
  dedupe columns a.csv b.csv --map 'Cust Name=Name 1'")]
    Columns {
        /// One or two files (.csv, .xlsx, .xls)
        #[arg(required = true, num_args = 1..=2)]
        files: Vec<PathBuf>,

        /// Map a column of the narrower file onto the wider one. Repeatable.
        #[arg(long, value_name = "SOURCE=TARGET")]
        map: Vec<String>,

        /// Also print the first N rows of each file
        #[arg(long, value_name = "N", default_value_t = 0)]
        preview: usize,
    },

    /// Find duplicates, label training pairs and review groups interactively
    #[command(after_help = "\
Examples:
  dedupe review customers.csv --columns 'Name 1,City'
  dedupe review a.xlsx b.xlsx --columns Name,Street --map 'Cust Name=Name'
  DEDUPE_API_BASE_URL=http://matcher:8000 dedupe review data.csv -c name,zip --out exports/

Type ? at the prompt for the commands of the current step.")]
    Review {
        /// One or two files (.csv, .xlsx, .xls)
        #[arg(required = true, num_args = 1..=2)]
        files: Vec<PathBuf>,

        /// Fields to match on (at least two, comma-separated)
        #[arg(long, short = 'c', value_name = "COLS", required = true)]
        columns: String,

        /// Map a column of the narrower file onto the wider one. Repeatable.
        #[arg(long, value_name = "SOURCE=TARGET")]
        map: Vec<String>,

        /// Matching service base URL (overrides settings and DEDUPE_API_BASE_URL)
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,

        /// Settings file (default: <config dir>/dedupe-review/settings.json)
        #[arg(long, value_name = "PATH", env = "DEDUPE_SETTINGS")]
        settings: Option<PathBuf>,

        /// Directory exports are written to
        #[arg(long, short = 'o', value_name = "DIR", default_value = ".")]
        out: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: dedupe <command> [options]");
            eprintln!("       dedupe --help for more information");
            Ok(())
        }
        Some(Commands::Columns { files, map, preview }) => cmd_columns(files, map, preview),
        Some(Commands::Review { files, columns, map, api_url, settings, out }) => {
            cmd_review(files, columns, map, api_url, settings, out)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn upload(err: UploadError) -> Self {
        Self { code: upload_exit_code(&err), message: err.to_string(), hint: None }
    }

    /// Create error from a workflow error with the matching exit code.
    pub fn workflow(err: WorkflowError) -> Self {
        let hint = match &err {
            WorkflowError::Remote(_) => {
                Some("is the matching service running? check --api-url or DEDUPE_API_BASE_URL".to_string())
            }
            WorkflowError::Validation(_) => {
                Some("run `dedupe columns <files>` to list the available fields".to_string())
            }
            _ => None,
        };
        Self { code: workflow_exit_code(&err), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// columns
// ============================================================================

fn cmd_columns(files: Vec<PathBuf>, map: Vec<String>, preview: usize) -> Result<(), CliError> {
    let assignments = upload::parse_map_args(&map)?;
    let files = upload::load(&files)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let w = |e: io::Error| CliError::io(e.to_string());

    if let [file] = files.as_slice() {
        for name in file.headers() {
            writeln!(out, "{}", name).map_err(w)?;
        }
        if preview > 0 {
            writeln!(out).map_err(w)?;
            write!(out, "{}", preview_of(file, preview)).map_err(w)?;
        }
        return Ok(());
    }

    let mapping = upload::seed_mapping(&files[0], &files[1], &assignments)?;
    let (source, target) = match mapping.source_slot() {
        dedupe_core::FileSlot::First => (&files[0], &files[1]),
        dedupe_core::FileSlot::Second => (&files[1], &files[0]),
    };
    writeln!(out, "target: {} ({} columns)", target.file_name, target.headers().len()).map_err(w)?;
    writeln!(out, "source: {} ({} columns)", source.file_name, source.headers().len()).map_err(w)?;
    for column in mapping.source_columns() {
        let arrow = mapping.target_of(column).unwrap_or("(unmapped)");
        writeln!(out, "  {} -> {}", column, arrow).map_err(w)?;
    }
    if preview > 0 {
        for file in [target, source] {
            writeln!(out, "\n{}:", file.file_name).map_err(w)?;
            write!(out, "{}", preview_of(file, preview)).map_err(w)?;
        }
    }
    Ok(())
}

fn preview_of(file: &DecodedFile, limit: usize) -> String {
    let rows = &file.table.rows[..limit.min(file.row_count())];
    render::preview(file.headers(), rows)
}

// ============================================================================
// review
// ============================================================================

fn cmd_review(
    files: Vec<PathBuf>,
    columns: String,
    map: Vec<String>,
    api_url: Option<String>,
    settings_path: Option<PathBuf>,
    out: PathBuf,
) -> Result<(), CliError> {
    let columns = split_list(&columns);
    let assignments = upload::parse_map_args(&map)?;
    if !out.is_dir() {
        return Err(CliError::args(format!("output directory not found: {}", out.display())));
    }

    let settings = match settings_path {
        Some(path) => Settings::load_from(&path).map_err(CliError::args)?,
        None => Settings::load(),
    }
    .with_env_overrides()
    .with_api_base_override(api_url.as_deref());

    let decoded = upload::load(&files)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout().lock();
    let dataset = upload::build_dataset(decoded, &assignments, &mut input, &mut output)?;

    let mut workflow = Workflow::new(&settings);
    workflow.load_dataset(dataset).map_err(CliError::workflow)?;
    workflow.select_columns(&columns).map_err(CliError::workflow)?;

    let service = DedupClient::with_timeout(&settings.api_base_url, settings.request_timeout());
    log::info!("matching service: {}", service.endpoint());

    ReviewLoop::new(workflow, &service, input, output, out).run()?;
    Ok(())
}
