// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;

use ndvi_detect::batch::process_batch;
use ndvi_detect::cli::{Cli, Commands};
use ndvi_detect::processing::GeotiffEvaluator;

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Detect(args) => {
            let range = args.range()?;
            info!(
                "Input {} output {} crs {} range {:?}",
                args.input_path.display(),
                args.output_path.display(),
                args.crs.as_deref().unwrap_or("(source)"),
                range.map(|r| (r.min(), r.max()))
            );

            GeotiffEvaluator::new(args.evaluator_options())
                .evaluate(&args.input_path, &args.output_path, args.crs.as_deref(), range)
                .with_context(|| format!("processing {}", args.input_path.display()))?;

            println!("Processing complete: {}", args.output_path.display());
        }
        Commands::Batch { config } => {
            process_batch(config)?;
            println!("Batch complete: {}", config.display());
        }
    }

    Ok(())
}
