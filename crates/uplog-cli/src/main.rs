//! uplog: upload a file to object storage and print its public URL.
//!
//! Images listed in the `[webp]` config table are re-encoded as WebP first.
//! The access grant can be supplied through `UPLOG_ACCESS_GRANT` (also read
//! from a `.env` file) instead of the config file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use uplog_cli::{init_tracing, prepare_config, write_default_config};
use uplog_core::Config;
use uplog_processing::{Pipeline, PipelineConfig};
use uplog_storage::create_storage;

#[derive(Parser)]
#[command(name = "uplog", about = "Upload a file and print its URL", version)]
struct Cli {
    /// The config file to use
    #[arg(long, default_value_os_t = Config::default_path())]
    config: PathBuf,

    /// Initialize the config file with default values and exit
    #[arg(long)]
    init_conf: bool,

    /// File to upload
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if cli.init_conf {
        write_default_config(&cli.config)?;
        tracing::info!(config_path = %cli.config.display(), "Config initialized");
        return Ok(());
    }

    let config = prepare_config(&cli.config)?;

    let file = cli.file.context("no input file specified")?;

    let storage = create_storage(&config)
        .await
        .context("could not set up storage backend")?;
    let pipeline = Pipeline::new(PipelineConfig::from(&config), storage);

    let result = match pipeline.run_file(&file).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(
                error = %e,
                error_code = e.error_code(),
                file = %file.display(),
                "Upload failed"
            );
            return Err(e.into());
        }
    };

    println!("uploaded file to:");
    println!("{}", result.url);
    Ok(())
}
