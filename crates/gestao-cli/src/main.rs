// crates/gestao-cli/src/main.rs
// ============================================================================
// Module: Gestão 360 CLI Entry Point
// Description: Command dispatcher for the record API and schema tooling.
// Purpose: Serve the HTTP API and report drift between descriptors and tables.
// Dependencies: clap, gestao-api, gestao-config, gestao-store, tokio, tracing.
// ============================================================================

//! ## Overview
//! `gestao360` loads `gestao360.toml`, initializes `tracing`, and either serves
//! the record API or inspects the live schema against the entity catalog.
//! Schema commands open the database read-only and never create it.
//! Errors are written to stderr and map to exit code 1.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use gestao_api::ApiServer;
use gestao_api::build_diagnostic_sink;
use gestao_config::Gestao360Config;
use gestao_config::LoggingConfig;
use gestao_store::DiagnosticSink;
use gestao_store::EntityCatalog;
use gestao_store::SchemaDrift;
use gestao_store::SqliteRecordStore;
use thiserror::Error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "gestao360", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP record API.
    Serve(ConfigArgs),
    /// Live schema inspection.
    Schema {
        /// Selected schema subcommand.
        #[command(subcommand)]
        command: SchemaCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Shared `--config` argument.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Path to `gestao360.toml` (overrides `GESTAO360_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Schema subcommands.
#[derive(Subcommand, Debug)]
enum SchemaCommand {
    /// Print drift for one collection as JSON.
    Show(SchemaShowCommand),
    /// Print drift for every collection; exits 1 when a table is missing.
    Check(ConfigArgs),
}

/// Arguments for `schema show`.
#[derive(Args, Debug)]
struct SchemaShowCommand {
    /// Collection name from the entity catalog.
    collection: String,
    /// Config arguments.
    #[command(flatten)]
    args: ConfigArgs,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration.
    Validate(ConfigArgs),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("gestao360 {version}")).map_err(|err| output_error("stdout", &err))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(args) => command_serve(&args).await,
        Commands::Schema {
            command,
        } => command_schema(command),
        Commands::Config {
            command,
        } => command_config(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(args: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    init_tracing(&config.logging)?;
    info!(bind = %config.server.bind, store = %config.store.path.display(), "starting record api");
    let sink = build_diagnostic_sink(&config.diagnostics)
        .map_err(|err| CliError::new(format!("serve init failed: {err}")))?;
    let server = tokio::task::spawn_blocking(move || ApiServer::from_config(config, sink))
        .await
        .map_err(|err| CliError::new(format!("serve init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("serve init failed: {err}")))?;
    server.serve().await.map_err(|err| CliError::new(format!("serve failed: {err}")))?;
    info!("record api stopped");
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Schema Commands
// ============================================================================

/// Dispatches schema subcommands.
fn command_schema(command: SchemaCommand) -> CliResult<ExitCode> {
    match command {
        SchemaCommand::Show(command) => command_schema_show(&command),
        SchemaCommand::Check(args) => command_schema_check(&args),
    }
}

/// Executes `schema show <collection>`.
fn command_schema_show(command: &SchemaShowCommand) -> CliResult<ExitCode> {
    let (store, catalog) = open_store(command.args.config.as_deref())?;
    let descriptor = catalog
        .get(&command.collection)
        .ok_or_else(|| CliError::new(format!("unknown collection: {}", command.collection)))?;
    let drift = store.drift(&descriptor).map_err(|err| CliError::new(format!("schema inspection failed: {err}")))?;
    log_drift(&drift);
    write_json(&drift)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `schema check`.
fn command_schema_check(args: &ConfigArgs) -> CliResult<ExitCode> {
    let (store, catalog) = open_store(args.config.as_deref())?;
    let mut report = Vec::with_capacity(catalog.len());
    for descriptor in catalog.iter() {
        let drift =
            store.drift(descriptor).map_err(|err| CliError::new(format!("schema inspection failed: {err}")))?;
        log_drift(&drift);
        report.push(drift);
    }
    let missing_tables = report.iter().filter(|drift| !drift.table_exists).count();
    info!(entities = report.len(), missing_tables, "schema check complete");
    write_json(&report)?;
    Ok(check_exit_code(&report))
}

/// Logs one entity's drift at a level matching its severity.
fn log_drift(drift: &SchemaDrift) {
    if drift.table_exists {
        info!(
            entity = %drift.entity,
            table = %drift.table,
            missing_fields = drift.missing_fields.len(),
            unmanaged_columns = drift.unmanaged_columns.len(),
            "schema inspected"
        );
    } else {
        warn!(entity = %drift.entity, table = %drift.table, "table missing");
    }
}

/// Returns failure when any catalog table is absent.
fn check_exit_code(report: &[SchemaDrift]) -> ExitCode {
    if report.iter().all(|drift| drift.table_exists) { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(args) => command_config_validate(&args),
    }
}

/// Executes the config validation command.
fn command_config_validate(args: &ConfigArgs) -> CliResult<ExitCode> {
    let _config = load_config(args.config.as_deref())?;
    write_stdout_line("config ok").map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Setup Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<Gestao360Config> {
    Gestao360Config::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Opens the store read-only with the configured diagnostic sink.
fn open_store(path: Option<&Path>) -> CliResult<(SqliteRecordStore, EntityCatalog)> {
    let config = load_config(path)?;
    init_tracing(&config.logging)?;
    let sink: Arc<dyn DiagnosticSink> = build_diagnostic_sink(&config.diagnostics)
        .map_err(|err| CliError::new(format!("store open failed: {err}")))?;
    let store = SqliteRecordStore::open_read_only(config.store_config(), sink)
        .map_err(|err| CliError::new(format!("store open failed: {err}")))?;
    let catalog = EntityCatalog::gestao360().map_err(|err| CliError::new(format!("catalog invalid: {err}")))?;
    Ok((store, catalog))
}

/// Builds the tracing filter: `RUST_LOG` when set, otherwise `[logging].filter`.
fn log_filter(config: &LoggingConfig) -> CliResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.filter).map_err(|err| CliError::new(format!("invalid logging.filter: {err}")))
}

/// Installs the global tracing subscriber writing to stderr.
fn init_tracing(config: &LoggingConfig) -> CliResult<()> {
    let filter = log_filter(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| CliError::new(format!("tracing init failed: {err}")))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| output_error("stdout", &err))?;
    write_stdout_line("").map_err(|err| output_error("stdout", &err))?;
    Ok(())
}

/// Writes a value as pretty JSON to stdout.
fn write_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::new(format!("json render failed: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| output_error("stdout", &err))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Builds an output failure error.
fn output_error(stream: &str, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write to {stream}: {error}"))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
