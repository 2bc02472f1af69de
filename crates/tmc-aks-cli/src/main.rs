//! TMC AKS cluster tool.
//!
//! This is the entry point for the `tmc-aks` binary. It applies a JSON
//! cluster configuration against Tanzu Mission Control and keeps the
//! resulting server view in a local state file.

mod commands;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tmc_aks_auth::{AuthConfig, DEFAULT_CSP_ENDPOINT};
use tmc_aks_client::TmcClient;
use tmc_aks_control::{parse_duration, AksClusterResource, ResourceConfig};

use state::{load_config, StateFile};

/// Manage AKS clusters through Tanzu Mission Control.
#[derive(Parser, Debug)]
#[command(name = "tmc-aks")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TMC endpoint, e.g. `https://myorg.tmc.cloud.vmware.com`.
    #[arg(long, env = "TMC_ENDPOINT")]
    endpoint: Option<String>,

    /// CSP endpoint used to exchange the API token.
    #[arg(long, env = "TMC_CSP_ENDPOINT", default_value = DEFAULT_CSP_ENDPOINT)]
    csp_endpoint: String,

    /// CSP API token.
    #[arg(long, env = "TMC_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Pre-issued access token; used instead of the API token.
    #[arg(long, env = "TMC_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// State file tracking the managed cluster.
    #[arg(long, env = "TMC_AKS_STATE", default_value = "tmc-aks.state.json")]
    state: PathBuf,

    /// Interval between status checks while waiting.
    #[arg(long, default_value = "10s", value_parser = parse_interval)]
    poll_interval: Duration,

    /// Ask TMC to delete the cluster even if it is unhealthy.
    #[arg(long)]
    force_delete: bool,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or update the cluster described by a configuration file.
    Apply {
        /// Cluster configuration (JSON).
        #[arg(long)]
        config: PathBuf,
    },
    /// Show the node pool changes `apply` would make, without calling TMC.
    Plan {
        /// Cluster configuration (JSON).
        #[arg(long)]
        config: PathBuf,
    },
    /// Re-read the tracked cluster into the state file.
    Refresh,
    /// Delete the tracked cluster.
    Destroy,
    /// Start tracking an existing cluster.
    Import {
        /// Cluster uid.
        #[arg(long)]
        id: String,
    },
}

fn parse_interval(value: &str) -> Result<Duration, String> {
    parse_duration(value).ok_or_else(|| format!("invalid duration {value:?}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "info,tmc_aks=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let state = StateFile::new(&args.state);

    if let Command::Plan { config } = &args.command {
        let desired = load_config(config)?;
        let lines = commands::plan_lines(state.load()?.as_ref(), &desired);
        if lines.is_empty() {
            println!("No changes.");
        }
        for line in lines {
            println!("{line}");
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, abandoning wait");
            on_signal.cancel();
        }
    });

    let endpoint = args
        .endpoint
        .as_deref()
        .context("--endpoint (or TMC_ENDPOINT) is required")?;
    let auth = AuthConfig {
        csp_endpoint: args.csp_endpoint.clone(),
        api_token: args.api_token.clone(),
        access_token: args.access_token.clone(),
    };
    let client = Arc::new(TmcClient::new(endpoint, auth.token_source()?)?);

    let config = ResourceConfig {
        poll_interval_ms: u64::try_from(args.poll_interval.as_millis()).unwrap_or(u64::MAX),
        force_delete: args.force_delete,
        ..ResourceConfig::default()
    };
    let resource = AksClusterResource::new(client.clone(), client, config).with_cancellation(cancel);

    match args.command {
        Command::Apply { config } => {
            let desired = load_config(&config)?;
            let applied = commands::apply(&resource, &state, desired).await?;
            println!(
                "Cluster {} is READY (id {})",
                applied.full_name(),
                applied.id.as_deref().unwrap_or_default()
            );
        }
        Command::Refresh => {
            if commands::refresh(&resource, &state).await? {
                println!("Refreshed {}", state.path().display());
            } else {
                println!("Cluster no longer exists; removed {}", state.path().display());
            }
        }
        Command::Destroy => {
            commands::destroy(&resource, &state).await?;
            println!("Cluster deleted");
        }
        Command::Import { id } => {
            let data = commands::import(&resource, &state, &id).await?;
            println!("Imported {}", data.full_name());
        }
        Command::Plan { .. } => unreachable!("handled before connecting"),
    }

    Ok(())
}
