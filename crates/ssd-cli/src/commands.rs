use std::env;
use std::path::{self, Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use ssd_hit::{resolve_alias, run_all, unlink, BatchReport, HitConfig, Linker, Materializer};
use ssd_store::{FileRecordStore, Record, RecordStore, Status, StoreError};
use tracing::{debug, warn};

use crate::cli::*;
use crate::config::{Settings, STORE_ENV};

/// A record together with its store position, as listed.
#[derive(Serialize)]
struct Listed<'a> {
    index: usize,
    #[serde(flatten)]
    record: &'a Record,
}

pub fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let (store_config, hit_config) = settings.resolve(env::var_os(STORE_ENV), cli.store.clone())?;
    debug!(store = %store_config.path().display(), "using reference store");
    let store = FileRecordStore::open(store_config)?;
    let format = cli.format;

    match cli.command {
        Command::Link(args) => cmd_link(&store, args, format),
        Command::Hit(args) if args.all => cmd_doit(&store, hit_config, format),
        Command::Hit(args) => cmd_hit(&store, args, hit_config, format),
        Command::Doit => cmd_doit(&store, hit_config, format),
        Command::Unlink(args) => cmd_unlink(&store, args, format),
        Command::List(args) => cmd_list(&store, args, format),
        Command::Prune => cmd_prune(&store, format),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Stored aliases are absolute; make a command-line alias comparable.
fn absolute_alias(alias: &Path) -> anyhow::Result<PathBuf> {
    path::absolute(alias).with_context(|| format!("resolving alias {}", alias.display()))
}

fn colored_status(status: Status) -> colored::ColoredString {
    match status {
        Status::Linked => status.as_str().cyan(),
        Status::Transferred => status.as_str().green(),
        Status::Deleted => status.as_str().dimmed(),
    }
}

fn cmd_link(store: &FileRecordStore, args: LinkArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let (origin, alias) = resolve_alias(&args.origin, args.alias.as_deref())?;
    let record = Linker::new(store).create_link(&origin, &alias)?;
    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Text => println!(
            "{} Linked {} → {}",
            "✓".green().bold(),
            record.alias.display().to_string().bold(),
            record.origin.display()
        ),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_hit(
    store: &FileRecordStore,
    args: HitArgs,
    config: HitConfig,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let alias = args.alias.context("an alias or --all is required")?;
    let alias = absolute_alias(&alias)?;
    let record = Materializer::new(config).hit(store, &alias)?;
    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Text => println!(
            "{} Copied {} into {}",
            "✓".green().bold(),
            record.origin.display(),
            record.alias.display().to_string().bold()
        ),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_doit(store: &FileRecordStore, config: HitConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let report = run_all(store, &Materializer::new(config))?;
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_report(&report),
    }
    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &BatchReport) {
    for done in &report.transferred {
        println!(
            "  {} {}",
            "copied:".green(),
            done.record.alias.display()
        );
    }
    for failure in &report.failed {
        let target = match (&failure.alias, failure.index) {
            (Some(alias), _) => alias.display().to_string(),
            (None, Some(index)) => format!("record {index}"),
            (None, None) => "store".to_string(),
        };
        eprintln!(
            "  {} {} [{}] {}",
            "failed:".red(),
            target,
            failure.kind,
            failure.message
        );
    }

    let summary = format!(
        "{} copied, {} failed, {} skipped",
        report.transferred.len(),
        report.failed.len(),
        report.skipped
    );
    if report.is_clean() {
        println!("{} {}", "✓".green().bold(), summary);
    } else {
        println!("{} {}", "✗".red().bold(), summary);
    }
}

fn cmd_unlink(store: &FileRecordStore, args: UnlinkArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let alias = absolute_alias(&args.alias)?;
    let record = unlink(store, &alias, args.purge)?;
    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Text => {
            let action = if args.purge { "Purged" } else { "Unlinked" };
            println!(
                "{} {} {}",
                "✓".green().bold(),
                action,
                record.alias.display().to_string().bold()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_list(store: &FileRecordStore, args: ListArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let mut records = Vec::new();
    for item in store.iter()? {
        match item {
            Ok((index, record)) => {
                if args.status.map_or(true, |s| record.status == s) {
                    records.push((index, record));
                }
            }
            Err(e @ StoreError::Corrupt { .. }) => warn!(error = %e, "skipping corrupt record"),
            Err(e) => return Err(e.into()),
        }
    }

    match format {
        OutputFormat::Json => {
            let listed: Vec<_> = records
                .iter()
                .map(|(index, record)| Listed { index: *index, record })
                .collect();
            print_json(&listed)?;
        }
        OutputFormat::Text if records.is_empty() => println!("No tracked aliases."),
        OutputFormat::Text => {
            for (index, record) in &records {
                println!(
                    "{:>4}  {:<11}  {} → {}",
                    index.to_string().dimmed(),
                    colored_status(record.status),
                    record.alias.display().to_string().bold(),
                    record.origin.display()
                );
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_prune(store: &FileRecordStore, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let removed = store.retain(&mut |record| record.status != Status::Deleted)?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "removed": removed }))?,
        OutputFormat::Text => println!(
            "{} Pruned {} deleted record{}",
            "✓".green().bold(),
            removed,
            if removed == 1 { "" } else { "s" }
        ),
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;

    fn run(store: &Path, args: &[&str]) -> anyhow::Result<ExitCode> {
        let mut argv = vec!["ssd", "--store", store.to_str().unwrap(), "--format", "json"];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn link_hit_list_prune_round() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("ref-store");
        let origin = dir.path().join("a.txt");
        let alias = dir.path().join("b.txt");
        fs::write(&origin, b"0123456789").unwrap();
        let (o, a) = (origin.to_str().unwrap(), alias.to_str().unwrap());

        assert_eq!(run(&store_path, &["link", o, a]).unwrap(), ExitCode::SUCCESS);
        assert!(fs::symlink_metadata(&alias).unwrap().file_type().is_symlink());

        assert_eq!(run(&store_path, &["hit", a]).unwrap(), ExitCode::SUCCESS);
        assert!(fs::symlink_metadata(&alias).unwrap().is_file());

        assert_eq!(run(&store_path, &["list"]).unwrap(), ExitCode::SUCCESS);
        assert_eq!(run(&store_path, &["unlink", a]).unwrap(), ExitCode::SUCCESS);
        assert_eq!(run(&store_path, &["prune"]).unwrap(), ExitCode::SUCCESS);

        let store = FileRecordStore::open_path(&store_path).unwrap();
        assert!(store.records().unwrap().is_empty());
        assert_eq!(fs::read(&alias).unwrap(), b"0123456789");
    }

    #[test]
    fn failing_batch_exits_nonzero() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("ref-store");
        let origin = dir.path().join("a.txt");
        let alias = dir.path().join("b.txt");
        fs::write(&origin, b"data").unwrap();

        run(&store_path, &["link", origin.to_str().unwrap(), alias.to_str().unwrap()]).unwrap();
        fs::remove_file(&origin).unwrap();

        assert_eq!(run(&store_path, &["doit"]).unwrap(), ExitCode::FAILURE);
    }

    #[test]
    fn typed_errors_surface_through_anyhow() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("ref-store");
        let missing = dir.path().join("missing.txt");

        let err = run(&store_path, &["link", missing.to_str().unwrap()]).unwrap_err();
        assert_eq!(
            crate::error_kind(&err),
            Some(ssd_store::ErrorKind::OriginNotFound)
        );
    }
}
