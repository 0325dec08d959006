use clap::Parser;
use line_edit::{
    Config, EditRequest, EditResponse, EditSession, FsAdapter, RecordingReporter, TracingReporter,
    config::ApplyPolicy,
    telemetry::{self, LogFormat},
};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Applies line-range edits from an LLM planner to source files
#[derive(Parser, Debug)]
#[command(name = "line-edit")]
#[command(version = "0.1.0")]
#[command(about = "All-or-nothing line edits for LLM workflows", long_about = None)]
struct Args {
    /// JSON file containing the change request (omit to read from stdin)
    #[arg(short, long)]
    changes: Option<PathBuf>,

    /// Directory that filenames in the request are relative to
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Output structured JSON instead of human-readable
    #[arg(short, long)]
    json: bool,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Check and report without writing any file
    #[arg(long)]
    dry_run: bool,

    /// Copy each file to <name>.bak before overwriting it
    #[arg(long)]
    backup: bool,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reject ranges past the end of the file instead of clamping them
    #[arg(long)]
    strict_ranges: bool,

    /// Log format on stderr
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

/// Read EditRequest from file path or stdin
///
/// If `path` is Some, reads from the file at that path.
/// If `path` is None, reads from stdin.
fn read_edit_request(path: Option<&Path>) -> Result<EditRequest, Box<dyn std::error::Error>> {
    let json_str = if let Some(p) = path {
        fs::read_to_string(p)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    Ok(EditRequest::from_json(&json_str)?)
}

fn load_config(args: &Args) -> Result<Config, line_edit::config::ConfigError> {
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if args.backup {
        config.files.backup = true;
    }
    if args.strict_ranges {
        config.policy = ApplyPolicy::strict();
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }
    Ok(config)
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = telemetry::initialise(&config.logging) {
        eprintln!("Error initialising logging: {}", e);
        std::process::exit(1);
    }

    // Read edit request from file or stdin
    let edit_request = match read_edit_request(args.changes.as_deref()) {
        Ok(req) => req,
        Err(e) => {
            let response = EditResponse::failure(
                line_edit::generate_execution_id(),
                format!("Error reading edit request: {}", e),
            );
            output_response(&response, args.json, args.output.as_deref());
            std::process::exit(1);
        }
    };

    let execution_id = edit_request.resolved_execution_id();
    tracing::info!(%execution_id, changes = edit_request.changes.len(), "applying edit request");

    let plan = match edit_request.into_plan() {
        Ok(plan) => plan,
        Err(e) => {
            let response =
                EditResponse::failure(execution_id, format!("Error reading edit request: {}", e));
            output_response(&response, args.json, args.output.as_deref());
            std::process::exit(1);
        }
    };

    // Progress goes to the log as it happens and into the response afterwards
    let adapter = FsAdapter::new(&args.root).with_backup(config.files.backup);
    let reporter = (TracingReporter, RecordingReporter::new());
    let session = EditSession::new(&adapter, &reporter)
        .with_policy(config.policy)
        .with_dry_run(args.dry_run);

    let report = session.apply_plan(plan);
    let response = EditResponse::from_report(execution_id, &report, reporter.1.take());

    // Output response
    output_response(&response, args.json, args.output.as_deref());

    // Exit with error code if not successful
    if !response.success {
        std::process::exit(1);
    }
}

fn render_human(response: &EditResponse) -> String {
    if let Some(error) = &response.error {
        return format!("Error: {}", error);
    }

    let mut out: Vec<String> = response
        .messages
        .iter()
        .map(|entry| entry.message.clone())
        .collect();

    for file in &response.files {
        match (&file.error, &file.final_checksum) {
            (Some(error), _) => out.push(format!("{}: rejected: {}", file.filename, error)),
            (None, Some(checksum)) => match file.total_line_shift {
                Some(shift) => out.push(format!(
                    "{}: {} {} operation(s), line shift {:+}, checksum {}",
                    file.filename,
                    file.status,
                    file.operations.len(),
                    shift,
                    checksum
                )),
                // Created files carry no operations
                None => out.push(format!(
                    "{}: {}, checksum {}",
                    file.filename, file.status, checksum
                )),
            },
            (None, None) => out.push(format!("{}: {}", file.filename, file.status)),
        }
    }

    if response.created_count > 0 {
        out.push(format!("Created {} file(s)", response.created_count));
    }
    out.push(format!(
        "Applied {} operation(s) across {} file(s), {} file(s) rejected",
        response.applied_count,
        response.files.len() - response.rejected_count - response.created_count,
        response.rejected_count
    ));
    out.join("\n")
}

/// Format and output the response
fn output_response(response: &EditResponse, json_mode: bool, output_path: Option<&Path>) {
    let output = if json_mode {
        serde_json::to_string_pretty(response).unwrap_or_else(|_| {
            r#"{"success": false, "error": "Failed to serialize response"}"#.to_string()
        })
    } else {
        render_human(response)
    };

    // Write to file or stdout
    if let Some(path) = output_path {
        if let Err(e) = fs::write(path, &output) {
            eprintln!("Failed to write output to '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    } else {
        println!("{}", output);
    }
}
