// crates/cieps-gate-cli/src/main.rs
// ============================================================================
// Module: CIEPS Gate CLI Entry Point
// Description: Command dispatcher for the CIEPS policy server.
// Purpose: Run the server, validate configuration, and inspect the demo CA.
// Dependencies: clap, cieps-gate-config, cieps-gate-core, cieps-gate-server, tokio
// ============================================================================

//! ## Overview
//! The `cieps-gate` binary starts the policy server, validates configuration
//! files offline, and prints the root certificate of a freshly generated
//! demonstration CA. Command-line flags take precedence over the config file.
//! Security posture: inputs are untrusted and validated before use.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use cieps_gate_config::ConfigOverrides;
use cieps_gate_config::GateConfig;
use cieps_gate_core::CertificateAuthorityProvider;
use cieps_gate_server::PolicyServer;
use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "cieps-gate", disable_help_subcommand = true, disable_version_flag = true)]
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
    /// Start the CIEPS policy server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Demonstration CA utilities.
    Ca {
        /// Selected CA subcommand.
        #[command(subcommand)]
        command: CaCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to cieps-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Listen address, overriding `server.bind`.
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,
    /// TLS certificate chain (PEM); requires --server-key.
    #[arg(long, value_name = "PATH")]
    server_cert: Option<String>,
    /// TLS private key (PEM); requires --server-cert.
    #[arg(long, value_name = "PATH")]
    server_key: Option<String>,
    /// Permit a plaintext listener on a non-loopback address.
    #[arg(long, action = ArgAction::SetTrue)]
    allow_plaintext: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file.
    Validate(ConfigPathArgs),
}

/// CA subcommands.
#[derive(Subcommand, Debug)]
enum CaCommand {
    /// Generate a demonstration CA and print its root certificate (PEM).
    Show(ConfigPathArgs),
}

/// Arguments naming an optional config file.
#[derive(Args, Debug)]
struct ConfigPathArgs {
    /// Optional config file path (defaults to cieps-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
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
        write_stdout_line(&format!("cieps-gate {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Ca {
            command,
        } => command_ca(command),
    }
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = load_serve_config(command)?;
    let tls = if config.server.tls.is_some() { "https" } else { "http" };
    write_stderr_line(&format!(
        "cieps-gate: listening on {tls}://{}{}",
        config.server.bind,
        cieps_gate_server::EVALUATE_ROUTE
    ))
    .map_err(|err| CliError::new(output_error("stderr", &err)))?;

    let server = tokio::task::spawn_blocking(move || PolicyServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;

    Ok(ExitCode::SUCCESS)
}

/// Loads configuration and applies `serve` flag overrides.
fn load_serve_config(command: ServeCommand) -> CliResult<GateConfig> {
    let mut config = GateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    config
        .apply_overrides(ConfigOverrides {
            listen: command.listen,
            server_cert: command.server_cert,
            server_key: command.server_key,
            allow_plaintext: command.allow_plaintext,
        })
        .map_err(|err| CliError::new(format!("invalid command-line options: {err}")))?;
    Ok(config)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigPathArgs) -> CliResult<ExitCode> {
    let _config = GateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: CA Commands
// ============================================================================

/// Dispatches CA subcommands.
fn command_ca(command: CaCommand) -> CliResult<ExitCode> {
    match command {
        CaCommand::Show(command) => command_ca_show(&command),
    }
}

/// Executes the CA show command.
fn command_ca_show(command: &ConfigPathArgs) -> CliResult<ExitCode> {
    let config = GateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let pem = render_root_pem(&config)?;
    write_stdout_bytes(pem.as_bytes())
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Generates a demonstration CA from `config` and returns its root PEM.
fn render_root_pem(config: &GateConfig) -> CliResult<String> {
    let provider = CertificateAuthorityProvider::new(config.authority_config());
    let authority = provider
        .get_or_create_root()
        .map_err(|err| CliError::new(format!("ca generation failed: {err}")))?;
    Ok(authority.root().pem.clone())
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Writes an error to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
