use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Upload static assets under content-hashed names.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None, after_help = "Examples:
    $ cachet sync --source ./public --prefix assets
    $ CACHET_TARGET__BUCKET=static cachet sync --dry-run
    $ cachet digest --source ./public > asset-map.json")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML, YAML or JSON). Defaults to ./cachet.toml.
    #[arg(short, long, global = true, env = "CACHET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log verbose
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload originals, hashed copies and the manifest.
    Sync {
        #[command(flatten)]
        overrides: Overrides,

        /// Work everything out but upload nothing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the manifest for a directory without uploading anything.
    Digest {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Flags that take precedence over configuration.
#[derive(Debug, Args)]
pub struct Overrides {
    /// Directory to synchronise.
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Prefix for every uploaded asset key.
    #[arg(short, long)]
    pub prefix: Option<String>,
}
