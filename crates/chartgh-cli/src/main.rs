#![deny(clippy::all)]

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use chartgh_core::{retrieve, Config, Deadline, RetrieveRequest, Retrieval, SystemEffects};
use clap::Parser;
use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use tracing::{debug, error, info};

mod cli;

use cli::HelmGithubCli;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = HelmGithubCli::parse();
    let config = Config::from_env().map_err(|err| eyre!("{err:#}"))?;
    let deadline = Deadline::after(config.timeout());
    init_tracing(config.logging().debug_log(), cli.verbose)?;
    debug!(
        cert_file = %cli.cert_file,
        key_file = %cli.key_file,
        ca_file = %cli.ca_file,
        cache = %config.cache().location.path.display(),
        cache_source = config.cache().location.source,
        "starting helm-github"
    );

    let effects = SystemEffects::new(&config).map_err(|err| eyre!("{err:#}"))?;
    let request = RetrieveRequest {
        url: cli.url.clone(),
        git_ref: config.index().git_ref.clone(),
        deadline,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match retrieve(&effects, &request, &mut out) {
        Ok(Retrieval::Catalog {
            repository,
            versions,
        }) => {
            info!(%repository, versions, "wrote catalog");
            Ok(())
        }
        Ok(Retrieval::Artifact(report)) => {
            info!(
                artifact = %report.artifact,
                source = report.source.as_str(),
                bytes = report.bytes,
                digest = %report.digest,
                "wrote chart"
            );
            Ok(())
        }
        Err(err) => {
            error!(code = err.code(), url = %cli.url, error = %err, "retrieval failed");
            Err(err).wrap_err_with(|| format!("failed to retrieve {}", cli.url))
        }
    }
}

/// Stdout carries the payload Helm reads, so diagnostics go to stderr or,
/// when configured, to the debug log file.
fn init_tracing(debug_log: Option<&Path>, verbose: u8) -> Result<()> {
    let level = match verbose {
        0 if debug_log.is_some() => "debug",
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        format!("helm_github={level},chartgh_core={level},chartgh_store={level}");

    if let Some(path) = debug_log {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("opening debug log {}", path.display()))?;
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
        return Ok(());
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}
