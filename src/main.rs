use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use indicatif::MultiProgress;
use tracing::info;

use drivedl::config::{DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS};
use drivedl::link::node_id_from_arg;
use drivedl::logging::init_logging;
use drivedl::remote::{DEFAULT_API_URL, DEFAULT_READ_TIMEOUT};
use drivedl::{Downloader, DriveClient, TransferConfig};

#[derive(Parser)]
#[command(name = "drivedl")]
#[command(about = "A resumable, concurrent downloader for Google Drive files and folders")]
#[command(version = "1.1")]
struct Cli {
    #[arg(help = "File or folder id, or a share link")]
    id_or_link: String,
    #[arg(long, default_value = ".", help = "Folder path to store the download")]
    path: PathBuf,
    #[arg(
        long,
        default_value_t = DEFAULT_CONCURRENCY,
        help = "Number of concurrent file downloads"
    )]
    conn: usize,
    #[arg(long, help = "Local name for the downloaded root instead of its remote name")]
    output_name: Option<String>,
    #[arg(long, help = "Download files flagged as abusive")]
    acknowledge_abuse: bool,
    #[arg(short, long, help = "Hide progress bars")]
    silent: bool,
    #[arg(long, env = "DRIVEDL_TOKEN", hide_env_values = true, help = "OAuth access token")]
    token: Option<String>,
    #[arg(long, default_value = DEFAULT_API_URL, help = "Base URL of the Drive API")]
    api_url: String,
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        help = "Attempts per file before giving up"
    )]
    max_attempts: u32,
    #[arg(
        long,
        default_value_t = DEFAULT_READ_TIMEOUT.as_secs(),
        help = "Seconds a stalled download may stay idle before it is retried"
    )]
    read_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let bars = MultiProgress::new();
    init_logging(&bars);

    let id = node_id_from_arg(&cli.id_or_link);
    info!(id = %id, "detected node id");

    let config = TransferConfig {
        max_attempts: cli.max_attempts,
        ..TransferConfig::default()
    };
    let client = DriveClient::with_read_timeout(
        cli.api_url,
        cli.token,
        Duration::from_secs(cli.read_timeout.max(1)),
    )
    .context("cannot build the HTTP client")?;
    let mut downloader = Downloader::with_config(client, config);
    downloader.set_progress_bars(bars);
    downloader.set_concurrency(cli.conn);
    downloader.set_abusive_download_acknowledgment(cli.acknowledge_abuse);
    downloader.set_silent(cli.silent);

    let summary = downloader
        .download(&id, &cli.path, cli.output_name.as_deref())
        .await
        .with_context(|| format!("download of {} failed", id))?;

    println!("{}", summary);
    if summary.failed > 0 {
        bail!("{} file(s) could not be downloaded, run again to resume", summary.failed);
    }
    Ok(())
}
