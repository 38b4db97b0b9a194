use std::future::Future;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use colored::Colorize;
use url::Url;

use crate::{
    cli::Args,
    client::HttpFetcher,
    config::NicheConfig,
    logging::{init_logging, LogOptions},
    niche::NicheFinder,
};

pub mod api_models;
pub mod cli;
pub mod client;
pub mod config;
pub mod errors;
pub mod logging;
pub mod niche;
pub mod scrape;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match init_logging(&LogOptions {
        verbose: args.verbose,
        log_file: args.log_file.clone(),
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {:#}", "❌".red(), e);
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = run(&args) => match result {
            Ok(code) => code,
            Err(e) => {
                tracing::error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
        _ = interrupted(tokio::signal::ctrl_c()) => {
            println!("\nOperation cancelled by user.");
            ExitCode::SUCCESS
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let seed = args.seed.trim();
    if seed.is_empty() {
        bail!("seed keyword must not be empty");
    }

    let config = Arc::new(args.resolve_config().context("invalid configuration")?);

    if !args.skip_preflight {
        preflight(&config).await?;
    }

    let fetcher = Arc::new(HttpFetcher::new(config.clone()).context("failed to create HTTP client")?);
    let finder = NicheFinder::new(fetcher, config.clone());
    let report = finder.run(seed, config.threshold).await;

    if report.network_lost() {
        tracing::error!("No results found. Every request failed to connect; check your internet connection.");
        return Ok(ExitCode::FAILURE);
    }

    cli::print_report(&report, args.format)?;

    if let Some(path) = &args.append_report {
        cli::append_report(path, &report)
            .with_context(|| format!("failed to append report to {}", path.display()))?;
    }

    Ok(ExitCode::SUCCESS)
}

/// Resolves once the user interrupts. If the handler cannot be installed the
/// run is left to finish on its own.
async fn interrupted<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Resolve the suggestion host before spending any time on pacing delays.
async fn preflight(config: &NicheConfig) -> anyhow::Result<()> {
    let url = Url::parse(&config.suggestion_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("suggestion URL has no host: {}", url))?;
    let port = url.port_or_known_default().unwrap_or(443);

    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("network unreachable: cannot resolve {}", host))?;
    if addrs.next().is_none() {
        bail!("network unreachable: {} resolved to no addresses", host);
    }

    tracing::debug!(host, port, "Preflight resolved suggestion host");
    Ok(())
}
