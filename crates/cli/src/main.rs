mod cli;
mod error;
mod store;

use crate::cli::{Cli, Command, Overrides};
use crate::error::{ErrorKind, Result};
use cachet_config::Config;
use cachet_sync::{CancellationToken, Syncer, build_digest};
use clap::Parser;
use exn::ResultExt;
use std::io::Write;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::Sync { overrides, dry_run } => {
            apply(&mut config, overrides);
            config.no_upload |= dry_run;
            sync(&config).await
        },
        Command::Digest { overrides } => {
            apply(&mut config, overrides);
            digest(&config).await
        },
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_filter = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_filter.into())
        .from_env()
        .or_raise(|| ErrorKind::Logging)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish()
        .try_init()
        .or_raise(|| ErrorKind::Logging)
}

fn apply(config: &mut Config, overrides: Overrides) {
    if let Some(source) = overrides.source {
        config.base_path = Some(source);
    }
    if let Some(prefix) = overrides.prefix {
        config.prefix = prefix;
    }
}

async fn sync(config: &Config) -> Result<()> {
    let options = config.options().or_raise(|| ErrorKind::Config)?;
    let target = config.target().or_raise(|| ErrorKind::Config)?;
    let store = store::connect(target)?;
    let mut syncer = Syncer::new(store, options).or_raise(|| ErrorKind::Config)?;

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, waiting for in-flight uploads to finish");
            interrupt.cancel();
        }
    });

    let report = match syncer.run_until_cancelled(&token).await {
        Ok(report) => report,
        Err(err) => {
            if err.is_retryable() {
                warn!("the object store failed; running the sync again is safe");
            }
            return Err(err.raise(ErrorKind::Sync));
        },
    };
    for record in &report.uploads {
        debug!(key = %record.key, variant = %record.variant, outcome = %record.outcome, "upload");
    }
    info!(
        files = report.digest.len(),
        uploaded = report.uploaded().count(),
        unchanged = report.unchanged().count(),
        skipped = report.skipped().count(),
        "sync complete"
    );
    Ok(())
}

async fn digest(config: &Config) -> Result<()> {
    let options = config.options().or_raise(|| ErrorKind::Config)?;
    let digest = build_digest(&options).await.or_raise(|| ErrorKind::Sync)?;
    let json = digest.to_json().or_raise(|| ErrorKind::Output)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&json).or_raise(|| ErrorKind::Output)?;
    stdout.write_all(b"\n").or_raise(|| ErrorKind::Output)
}
