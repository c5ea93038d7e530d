mod commands;
mod helpers;

use clap::Parser;
use xsim_core::domain::SimError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_sim_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            if let Some(summary_line) = diagnostic.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            diagnostic.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("xsim".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "xsim", version, about = "X-ray emission spectrum synthesis")]
struct Cli {
    /// Emit debug-level diagnostics on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Assemble one spectrum and write it as a table or JSON
    Simulate(commands::SimulateArgs),
    /// Fit offset, resolution and height against a measured spectrum
    Fit(commands::FitArgs),
    /// Assemble one spectrum per energy offset in parallel
    Batch(commands::BatchArgs),
    /// List the transition catalog
    Catalog(commands::CatalogArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Simulate(args) => commands::run_simulate_command(args),
        CliCommand::Fit(args) => commands::run_fit_command(args),
        CliCommand::Batch(args) => commands::run_batch_command(args),
        CliCommand::Catalog(args) => commands::run_catalog_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(SimError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<SimError> for CliError {
    fn from(error: SimError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_sim_error(&self) -> SimError {
        match self {
            Self::Usage(message) => SimError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => SimError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
