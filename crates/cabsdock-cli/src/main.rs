//! cabsdock - submit peptide docking jobs to CABS-dock and collect their results.
//! Entry point for the `cabsdock` binary.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use cabsdock_client::download::Downloader;
use cabsdock_client::joblist::{read_job_urls, read_receptors};
use cabsdock_client::request::validate_ligand;
use cabsdock_client::{
    JobSubmitter, ResultPoller, SandboxClient, StructureResolver, TokioSleeper,
};

#[derive(Debug, Parser)]
#[command(name = "cabsdock", version, about = "Submit CABS-dock jobs and download their results")]
struct Cli {
    /// Config file (default: $CABSDOCK_CONFIG or ./cabsdock.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit one job per receptor and print each job URL.
    Submit {
        /// Ligand amino-acid sequence, at least 4 residues.
        ligand: String,
        /// File with one receptor per line, e.g. `2AM9:A`.
        receptors_file: PathBuf,
        /// Simulation cycles (default: submission.default_cycles).
        #[arg(long)]
        cycles: Option<u32>,
        /// Only use structure files already in the cache directory.
        #[arg(long)]
        no_download: bool,
        /// Where `<code>.pdb` files live (default: next to the receptors file).
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Poll jobs until they finish, downloading result archives.
    Fetch {
        /// File with one job URL per line.
        job_urls_file: PathBuf,
        /// Seconds between passes (default: polling.interval_secs).
        #[arg(long)]
        interval: Option<u64>,
        /// Give up after this many passes.
        #[arg(long)]
        max_passes: Option<u32>,
        /// Where archives are written (default: next to the job list).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cabsdock=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::Config::load(cli.config.as_deref())?;
    let client = build_client(&config)?;

    match cli.command {
        Command::Submit { ligand, receptors_file, cycles, no_download, cache_dir } => {
            validate_ligand(&ligand)?;
            let cycles = cycles.unwrap_or(config.submission.default_cycles);
            let receptors = read_receptors(&receptors_file).await?;
            let cache_dir = cache_dir.unwrap_or_else(|| parent_dir(&receptors_file));

            let resolver = if no_download {
                StructureResolver::offline(&cache_dir)
            } else {
                StructureResolver::new(Downloader::new(client.clone()), &cache_dir)
                    .with_download_url(&config.service.pdb_download_url)
            };
            let submitter = JobSubmitter::new(client, config.submission.form.clone())
                .with_base_url(&config.service.base_url);

            info!("Submitting {} jobs for ligand {} ({} cycles)", receptors.len(), ligand, cycles);
            let outcomes = submitter
                .submit_receptors(&receptors, &resolver, &ligand, cycles)
                .await;

            let mut failures = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(handle) => println!("{}", handle),
                    Err(_) => failures += 1,
                }
            }
            if failures > 0 {
                warn!("{} of {} submissions failed", failures, outcomes.len());
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Fetch { job_urls_file, interval, max_passes, output_dir } => {
            let pending = read_job_urls(&job_urls_file).await?;
            let output_dir = output_dir.unwrap_or_else(|| parent_dir(&job_urls_file));

            let mut settings = config.polling.clone();
            if let Some(secs) = interval {
                settings.interval_secs = secs;
            }
            if max_passes.is_some() {
                settings.max_passes = max_passes;
            }

            let poller = ResultPoller::new(client, &output_dir);
            let summary = poller.run_until_empty(pending, &settings, &TokioSleeper).await;

            info!(
                "{} jobs downloaded, {} failed, {} still pending after {} passes",
                summary.completed.len(),
                summary.failed.len(),
                summary.pending.len(),
                summary.passes
            );
            for handle in summary.pending.iter() {
                println!("{}", handle);
            }
            if let Some(e) = summary.aborted {
                return Err(e.into());
            }
            if summary.failed.is_empty() && summary.pending.is_empty() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Sandbox client that also admits the configured service and structure hosts.
fn build_client(config: &config::Config) -> anyhow::Result<SandboxClient> {
    let mut domains = config.service.extra_allowed_domains.clone();
    for endpoint in [&config.service.base_url, &config.service.pdb_download_url] {
        let url = Url::parse(endpoint)
            .map_err(|e| anyhow::anyhow!("Invalid service URL {}: {}", endpoint, e))?;
        if let Some(host) = url.host_str() {
            domains.push(host.to_string());
        }
    }
    Ok(SandboxClient::with_domains(
        Duration::from_secs(config.service.timeout_secs),
        domains,
    )?)
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
