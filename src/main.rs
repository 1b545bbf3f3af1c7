use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use insights_forwarder::{config::Config, dispatch::Dispatcher, MetricInstance};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Forward metric batches to New Relic Insights.
///
/// Reads one JSON array of metric instances per line and posts each line as
/// one batch of events.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Accept any server certificate (also NEW_RELIC_INSECURE_SKIP_VERIFY)
    #[arg(long)]
    insecure_skip_verify: bool,
    /// Treat 4xx/5xx responses as failed deliveries (also NEW_RELIC_REJECT_ERROR_STATUS)
    #[arg(long)]
    reject_error_status: bool,
    /// Read batches from this file instead of stdin
    #[arg(long)]
    input: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };
    config.insecure_skip_verify |= cli.insecure_skip_verify;
    config.reject_error_status |= cli.reject_error_status;

    let dispatcher = Dispatcher::new(&config, tokio::runtime::Handle::current())
        .context("building delivery client")?;
    log::info!("forwarding to {}", dispatcher.endpoint());

    match &cli.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            forward(BufReader::new(file), &dispatcher).await
        }
        None => forward(BufReader::new(tokio::io::stdin()), &dispatcher).await,
    }
}

async fn forward<R>(rdr: R, dispatcher: &Dispatcher) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = rdr.lines();
    let mut deliveries = vec![];
    let mut line_no = 0;
    while let Some(line) = lines.next_line().await.context("reading input")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let batch: Vec<MetricInstance> = match serde_json::from_str(&line) {
            Ok(batch) => batch,
            Err(e) => {
                log::warn!("line {line_no}: skipping malformed batch: {e}");
                continue;
            }
        };
        match dispatcher.dispatch(&batch) {
            Ok(delivery) => deliveries.push(delivery),
            Err(e) => log::error!("line {line_no}: encoding batch: {e}"),
        }
        deliveries.retain(|delivery| !delivery.is_finished());
    }
    // Outcomes are already logged by the delivery tasks.
    for delivery in deliveries {
        let _ = delivery.outcome().await;
    }
    Ok(())
}
