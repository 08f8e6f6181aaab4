use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ssd_store::Status;

#[derive(Parser)]
#[command(
    name = "ssd",
    about = "ss-hits-doit: link now, copy later",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Reference store file (overrides SSD_STORE and the config file)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Symlink an alias to an origin and track it
    Link(LinkArgs),
    /// Replace a tracked symlink with a real copy
    Hit(HitArgs),
    /// Replace every tracked symlink with a real copy
    Doit,
    /// Remove a tracked symlink and stop tracking it
    Unlink(UnlinkArgs),
    /// List tracked aliases
    List(ListArgs),
    /// Drop deleted records from the store
    Prune,
}

#[derive(Args)]
pub struct LinkArgs {
    pub origin: PathBuf,
    /// Alias path or existing directory (default: current directory)
    pub alias: Option<PathBuf>,
}

#[derive(Args)]
pub struct HitArgs {
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub alias: Option<PathBuf>,
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Args)]
pub struct UnlinkArgs {
    pub alias: PathBuf,
    /// Remove the record instead of marking it deleted
    #[arg(long)]
    pub purge: bool,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long, value_parser = parse_status)]
    pub status: Option<Status>,
}

fn parse_status(s: &str) -> Result<Status, String> {
    s.parse().map_err(|e: ssd_store::types::ParseStatusError| e.to_string())
}
