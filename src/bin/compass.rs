//! Compass CLI - Command-line interface for Compass analytics
//!
//! Commands:
//! - analyze: Run one analysis task over a dataset file (batch mode)
//! - run: Process NDJSON requests and cache commands from stdin (streaming mode)
//! - validate: Validate a configuration file
//! - config: Print the default or a preset configuration
//! - doctor: Diagnose environment and configuration health

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use compass_analytics::config::{deep_merge, CONFIG_SCHEMA_VERSION};
use compass_analytics::{
    AnalyticsConfiguration, AnalyticsProcessor, AnalyticsWorker, ConfigPreset, ConfigStore,
    Normalizer, Outbox, TaskRequest, WorkerRequest, WorkerResponse, COMPASS_VERSION,
};

/// Compass - analytics engine for behavioral and sensory tracking data
#[derive(Parser)]
#[command(name = "compass")]
#[command(version = COMPASS_VERSION)]
#[command(about = "Compute patterns, correlations and insights from tracking data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one analysis task over a dataset (batch mode)
    Analyze {
        /// Dataset file with entries, emotions and sensoryInputs (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Configuration file; may be partial
        #[arg(long)]
        config: Option<PathBuf>,

        /// Start from a named preset
        #[arg(long, value_enum)]
        preset: Option<PresetArg>,

        /// Cache key echoed on every message
        #[arg(long)]
        cache_key: Option<String>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Only print the final message
        #[arg(long)]
        final_only: bool,
    },

    /// Process NDJSON requests from stdin (streaming mode)
    Run {
        /// Initial configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Flush stdout after each batch
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default or a preset configuration
    Config {
        #[arg(long, value_enum)]
        preset: Option<PresetArg>,
    },

    /// Diagnose environment and configuration health
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    Conservative,
    Balanced,
    Sensitive,
}

impl From<PresetArg> for ConfigPreset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Conservative => ConfigPreset::Conservative,
            PresetArg::Balanced => ConfigPreset::Balanced,
            PresetArg::Sensitive => ConfigPreset::Sensitive,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one message per line)
    Ndjson,
    /// JSON array of messages
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CompassCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            config,
            preset,
            cache_key,
            output_format,
            final_only,
        } => cmd_analyze(
            &input,
            &output,
            config.as_deref(),
            preset,
            cache_key,
            output_format,
            final_only,
        ),
        Commands::Run { config, flush } => cmd_run(config.as_deref(), flush),
        Commands::Validate { input, json } => cmd_validate(&input, json),
        Commands::Config { preset } => cmd_config(preset),
        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime, CompassCliError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn read_source(path: &Path) -> Result<String, CompassCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

/// Preset (or defaults) with an optional partial file laid over it
fn task_config(config: Option<&Path>, preset: Option<PresetArg>) -> Result<Value, CompassCliError> {
    let base = preset
        .map(|p| ConfigPreset::from(p).config())
        .unwrap_or_default();
    let mut merged = serde_json::to_value(base)?;
    if let Some(path) = config {
        let patch: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        deep_merge(&mut merged, &patch);
    }
    Ok(merged)
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    preset: Option<PresetArg>,
    cache_key: Option<String>,
    output_format: OutputFormat,
    final_only: bool,
) -> Result<(), CompassCliError> {
    let dataset = read_source(input)?;
    let inputs = Normalizer::parse_inputs(&dataset, Utc::now())?;

    let mut request = TaskRequest::new(inputs).with_config(task_config(config, preset)?);
    request.cache_key = cache_key;

    let runtime = build_runtime()?;
    let mut messages = runtime.block_on(async {
        let mut processor = AnalyticsProcessor::new();
        let mut outbox = Outbox::new();
        processor.process(request, &mut outbox).await;
        outbox.drain()
    });

    if final_only {
        messages = messages.split_off(messages.len().saturating_sub(1));
    }

    let output_data = format_output(&messages, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    match messages.last() {
        Some(last) if last.error.is_some() => Err(CompassCliError::AnalysisFailed),
        _ => Ok(()),
    }
}

fn cmd_run(config: Option<&Path>, flush: bool) -> Result<(), CompassCliError> {
    let initial = match config {
        Some(path) => {
            let store = ConfigStore::default();
            let validated = store.import_json(&fs::read_to_string(path)?)?;
            if !validated.meta.is_valid {
                return Err(CompassCliError::ValidationFailed(validated.meta.errors.len()));
            }
            store.snapshot()
        }
        None => AnalyticsConfiguration::default(),
    };

    let runtime = build_runtime()?;
    runtime.block_on(async move {
        let mut handle = AnalyticsWorker::spawn(initial, None);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = io::stdout();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let request: WorkerRequest = serde_json::from_str(trimmed).map_err(|e| {
                        CompassCliError::ParseError(format!("Failed to parse request: {}", e))
                    })?;
                    handle.submit(request)?;
                }
                Some(batch) = handle.next_batch() => {
                    write!(stdout, "{}", format_output(&batch, &OutputFormat::Ndjson)?)?;
                    if flush {
                        stdout.flush()?;
                    }
                }
            }
        }

        let pending = handle.shutdown().await?;
        write!(stdout, "{}", format_output(&pending, &OutputFormat::Ndjson)?)?;
        stdout.flush()?;
        Ok::<(), CompassCliError>(())
    })
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), CompassCliError> {
    let content = read_source(input)?;
    let validated = ConfigStore::default().import_json(&content)?;

    let report = ValidationReport {
        is_valid: validated.meta.is_valid,
        schema_version: validated.config.schema_version.clone(),
        errors: validated.meta.errors.clone(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Configuration Validation Report");
        println!("===============================");
        println!("Valid:          {}", report.is_valid);
        println!("Schema version: {}", report.schema_version);
        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - {}", err);
            }
        }
    }

    if report.is_valid {
        Ok(())
    } else {
        Err(CompassCliError::ValidationFailed(report.errors.len()))
    }
}

fn cmd_config(preset: Option<PresetArg>) -> Result<(), CompassCliError> {
    let store = ConfigStore::default();
    if let Some(preset) = preset {
        store.set_preset(preset.into());
    }
    println!("{}", store.export_json()?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), CompassCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "compass_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Compass version {}", COMPASS_VERSION),
    });

    checks.push(DoctorCheck {
        name: "config_schema".to_string(),
        status: CheckStatus::Ok,
        message: format!("Configuration schema: {}", CONFIG_SCHEMA_VERSION),
    });

    // Every preset must survive its own validation
    let broken: Vec<&str> = ConfigPreset::all()
        .iter()
        .filter(|preset| {
            serde_json::to_value(preset.config())
                .map(|value| !compass_analytics::validate_config(&value).meta.is_valid)
                .unwrap_or(true)
        })
        .map(|preset| preset.as_str())
        .collect();
    checks.push(if broken.is_empty() {
        DoctorCheck {
            name: "presets".to_string(),
            status: CheckStatus::Ok,
            message: "All presets validate".to_string(),
        }
    } else {
        DoctorCheck {
            name: "presets".to_string(),
            status: CheckStatus::Error,
            message: format!("Presets failing validation: {}", broken.join(", ")),
        }
    });

    if let Some(config_path) = config {
        let check = if !config_path.exists() {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Configuration file does not exist".to_string(),
            }
        } else {
            match fs::read_to_string(config_path) {
                Ok(content) => match ConfigStore::default().import_json(&content) {
                    Ok(validated) if validated.meta.is_valid => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Configuration valid (cache ttl {} ms, max {} entries)",
                            validated.config.cache.ttl, validated.config.cache.max_size
                        ),
                    },
                    Ok(validated) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!(
                            "Configuration rejected: {}",
                            validated.meta.errors.join("; ")
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid configuration JSON: {}", e),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read configuration file: {}", e),
                },
            }
        };
        checks.push(check);
    }

    // Check stdin is available (for streaming mode)
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: if atty::is(atty::Stream::Stdin) {
            "stdin is a TTY (interactive mode)".to_string()
        } else {
            "stdin is a pipe (streaming mode ready)".to_string()
        },
    });

    let report = DoctorReport {
        version: COMPASS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Compass Doctor Report");
        println!("=====================");
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CompassCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn format_output(messages: &[WorkerResponse], format: &OutputFormat) -> Result<String, CompassCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut output = String::new();
            for message in messages {
                output.push_str(&serde_json::to_string(message)?);
                output.push('\n');
            }
            Ok(output)
        }
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string(messages)?)),
        OutputFormat::JsonPretty => Ok(format!("{}\n", serde_json::to_string_pretty(messages)?)),
    }
}

// Error types

#[derive(Debug)]
enum CompassCliError {
    Io(io::Error),
    Analytics(compass_analytics::AnalyticsError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    AnalysisFailed,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for CompassCliError {
    fn from(e: io::Error) -> Self {
        CompassCliError::Io(e)
    }
}

impl From<compass_analytics::AnalyticsError> for CompassCliError {
    fn from(e: compass_analytics::AnalyticsError) -> Self {
        CompassCliError::Analytics(e)
    }
}

impl From<serde_json::Error> for CompassCliError {
    fn from(e: serde_json::Error) -> Self {
        CompassCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CompassCliError> for CliError {
    fn from(e: CompassCliError) -> Self {
        match e {
            CompassCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CompassCliError::Analytics(e) => CliError {
                code: "ANALYTICS_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input has entries, emotions or sensoryInputs arrays".to_string()),
            },
            CompassCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CompassCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("Configuration rejected with {} error(s)", count),
                hint: Some("Run 'compass validate' for details".to_string()),
            },
            CompassCliError::AnalysisFailed => CliError {
                code: "ANALYSIS_FAILED".to_string(),
                message: "Analysis ended with an error message".to_string(),
                hint: Some("Rerun with RUST_LOG=debug for stage details".to_string()),
            },
            CompassCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            CompassCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each line must be a task request or cache command".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationReport {
    is_valid: bool,
    schema_version: String,
    errors: Vec<String>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
