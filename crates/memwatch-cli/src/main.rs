//! memwatch - stop a run when its memory grows past a limit

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use memwatch_cli::{exit_code, watch, Cli, RunError, Script, EXIT_FAILURE};
use memwatch_monitor::Monitor;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("memwatch: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<u8> {
    let config = cli
        .watch_options()?
        .into_config()
        .context("invalid watch options")?;
    let script = Script::load(&cli.script)?;
    let mut monitor = Monitor::for_current_process(config)?;

    let stdout = io::stdout();
    let mut output = stdout.lock();
    let result = watch(&mut monitor, &script, &cli.args, &mut output);

    match &result {
        Ok(summary) => tracing::info!(steps = summary.steps, "script completed"),
        Err(RunError::Aborted(signal)) => eprintln!("{signal}"),
        Err(err) => eprintln!("memwatch: {err}"),
    }
    Ok(exit_code(&result))
}
