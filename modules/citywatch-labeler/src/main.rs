use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use citywatch_common::Config;
use citywatch_labeler::{run_batch, OpenAiExtractor};

/// Label scraped crime and protest news with place, time and severity.
#[derive(Parser, Debug)]
#[command(name = "citywatch-labeler", version)]
struct Args {
    /// JSON array of scraped entries (overrides INPUT_PATH)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Where to write the labeled array (overrides OUTPUT_PATH)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Model identifier (overrides MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Maximum simultaneous API calls (overrides MAX_CONCURRENCY)
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Attempts per entry before giving up (overrides MAX_RETRIES)
    #[arg(long)]
    max_retries: Option<u32>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(input) = self.input {
            config.input_path = input;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(n) = self.max_concurrency {
            config.max_concurrency = n.max(1);
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n.max(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("citywatch=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    args.apply(&mut config);
    config.log_redacted();

    let extractor = OpenAiExtractor::new(&config).context("Failed to create OpenAI client")?;
    info!(model = extractor.model(), "Citywatch labeler starting...");

    run_batch(&config, Arc::new(extractor))
        .await
        .with_context(|| format!("Labeling run failed for {}", config.input_path.display()))?;

    info!("OK, saved: {}", config.output_path.display());
    Ok(())
}
