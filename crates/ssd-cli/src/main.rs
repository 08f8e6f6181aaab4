use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use ssd_hit::HitError;
use ssd_store::{ErrorKind, StoreError};
use tracing::Level;

mod cli;
mod commands;
mod config;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let format = cli.format;
    match commands::run_command(cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err, format);
            ExitCode::FAILURE
        }
    }
}

/// The typed kind behind an error, if any layer of it carries one.
pub(crate) fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<HitError>()
            .map(HitError::kind)
            .or_else(|| cause.downcast_ref::<StoreError>().map(StoreError::kind))
    })
}

fn report_error(err: &anyhow::Error, format: cli::OutputFormat) {
    let kind = error_kind(err);
    match format {
        cli::OutputFormat::Json => {
            let body = serde_json::json!({
                "error": { "kind": kind, "message": format!("{err:#}") }
            });
            eprintln!("{body}");
        }
        cli::OutputFormat::Text => match kind {
            Some(kind) => eprintln!("{}: {err:#}", format!("error[{kind}]").red().bold()),
            None => eprintln!("{}: {err:#}", "error".red().bold()),
        },
    }
}
