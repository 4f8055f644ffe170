use anyhow::Result;
use clap::{Parser, Subcommand};
use cog_stac::pipeline;
use cog_stac::run_config::{sentinel1_grd_template, RunConfig};
use cog_stac::session::Credentials;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Fetch a processed satellite product and publish it as COG plus a STAC item")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Authenticate, request, convert, derive and describe one product
    Run {
        #[arg(long, default_value = "./inputs/run.toml")]
        config: PathBuf,

        /// Overrides `output.dir` from the config
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[arg(long, env = "SH_CLIENT_ID")]
        client_id: String,

        #[arg(long, env = "SH_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,
    },
    /// Write the Sentinel-1 GRD example configuration
    Template {
        #[arg(long, default_value = "./inputs/run.toml")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Run {
            config,
            output_dir,
            client_id,
            client_secret,
        } => {
            let credentials = Credentials::new(client_id, client_secret);
            run(config, output_dir, &credentials).await
        }
        Command::Template { out } => write_template(out),
    }
}

async fn run(
    config_path: PathBuf,
    output_dir: Option<PathBuf>,
    credentials: &Credentials,
) -> Result<()> {
    let config = RunConfig::read(&config_path)?;
    let output_dir = output_dir.unwrap_or_else(|| config.output.dir.clone());

    match pipeline::authenticate_and_run(credentials, &config, &output_dir).await {
        Ok(summary) => {
            info!(
                "Run complete: {} assets described in {}",
                summary.record.assets.len(),
                summary.record_path.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("Run aborted: {:#}", e);
            Err(e)
        }
    }
}

fn write_template(out: PathBuf) -> Result<()> {
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    RunConfig::from_template(&sentinel1_grd_template())?.write(&out)?;
    info!("Wrote example configuration to {}", out.display());
    Ok(())
}
