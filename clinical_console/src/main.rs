mod config;
mod render;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use risk_predictor::{
    HttpPredictionTransport, LifecycleState, PredictionClient, RawForm, SubmitError,
};
use telemetry_feed::{HttpMetricsSource, PollerConfig, TelemetryPoller};
use tracing_subscriber::EnvFilter;

use crate::config::ConsoleConfig;

#[derive(Parser, Debug)]
#[command(name = "clinical_console", about = "Clinical risk prediction and service health console")]
struct Cli {
    /// JSON config file; defaults to ./clinical_console.json when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a saved patient form and print the risk assessment
    Predict {
        #[arg(long)]
        form: PathBuf,
    },
    /// Poll the metrics endpoint and print a dashboard line per update
    Watch {
        /// Stop after this many updates
        #[arg(long)]
        ticks: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = ConsoleConfig::resolve(cli.config.as_deref())?;
    tracing::info!(api_url = %cfg.api_url, "loaded console config");

    match cli.command {
        Command::Predict { form } => predict(&cfg, &form).await,
        Command::Watch { ticks } => watch(&cfg, ticks).await,
    }
}

async fn predict(cfg: &ConsoleConfig, form_path: &Path) -> Result<()> {
    let text = fs::read_to_string(form_path)
        .with_context(|| format!("failed to read form at {}", form_path.display()))?;
    let form: RawForm = serde_json::from_str(&text).with_context(|| "failed to parse form JSON")?;

    let transport = HttpPredictionTransport::new(&cfg.api_url)?;
    let client = PredictionClient::with_timeout(transport, cfg.request_timeout());

    match client.submit_form(&form).await {
        Ok(LifecycleState::Succeeded(outcome)) => {
            for line in render::prediction_lines(&outcome) {
                println!("{line}");
            }
            Ok(())
        }
        Ok(LifecycleState::Failed(message)) => bail!("prediction failed: {message}"),
        Ok(other) => bail!("prediction ended in unexpected state {other:?}"),
        Err(SubmitError::Invalid(err)) => {
            for line in render::form_issue_lines(&err) {
                eprintln!("{line}");
            }
            bail!("form has {} invalid field(s); nothing was sent", err.issues.len())
        }
        Err(err) => Err(err.into()),
    }
}

async fn watch(cfg: &ConsoleConfig, ticks: Option<usize>) -> Result<()> {
    let source = HttpMetricsSource::new(&cfg.api_url)?;
    let poller = TelemetryPoller::with_config(
        source,
        PollerConfig {
            interval: cfg.poll_interval(),
            fetch_timeout: cfg.poll_interval(),
        },
    );
    let mut updates = poller.subscribe();
    poller.start();

    let mut seen = 0usize;
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                println!("{}", render::dashboard_line(&snapshot));
                seen += 1;
                if ticks.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("interrupted");
                break;
            }
        }
    }

    poller.stop();
    Ok(())
}
