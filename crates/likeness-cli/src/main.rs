use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "likeness", about = "Face-recognition training and evaluation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the face detection model if it is not already present
    FetchModels,
    /// Embed the labeled image tree and train the identity classifier
    Train {
        /// Image tree root (overrides LIKENESS_DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Recognize the identity in a single image using persisted artifacts
    Recognize {
        /// Image to classify
        image: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = config::Config::from_env();

    match cli.command {
        Commands::FetchModels => commands::fetch_models(&config),
        Commands::Train { data_dir } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            commands::train(&config)
        }
        Commands::Recognize { image } => commands::recognize(&config, &image),
    }
}
