// src/batch.rs
use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::NdviError;
use crate::io::{OutputEncoding, WriteOptions};
use crate::processing::evaluator::{DEFAULT_NIR_BAND, DEFAULT_RED_BAND};
use crate::processing::{EvaluatorOptions, GeotiffEvaluator, NdviRange, OutputMode, Resampling};

#[derive(Deserialize, Serialize, Debug)]
pub struct BatchConfig {
    #[serde(default)]
    pub global: GlobalParams,
    pub jobs: Vec<Job>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GlobalParams {
    #[serde(default)]
    pub crs: Option<String>,
    #[serde(default)]
    pub range_min: Option<f32>,
    #[serde(default)]
    pub range_max: Option<f32>,
    #[serde(default = "default_red_band")]
    pub red_band: usize,
    #[serde(default = "default_nir_band")]
    pub nir_band: usize,
    #[serde(default)]
    pub resampling: Resampling,
    #[serde(default)]
    pub mode: OutputMode,
    #[serde(default = "default_compress")]
    pub compress: String,
    #[serde(default = "default_compress_level")]
    pub compress_level: u8,
    #[serde(default)]
    pub fixed_point: bool,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: i32,
    #[serde(default)]
    pub tiled: bool,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            crs: None,
            range_min: None,
            range_max: None,
            red_band: default_red_band(),
            nir_band: default_nir_band(),
            resampling: Resampling::default(),
            mode: OutputMode::default(),
            compress: default_compress(),
            compress_level: default_compress_level(),
            fixed_point: false,
            scale_factor: default_scale_factor(),
            tiled: false,
        }
    }
}

fn default_red_band() -> usize {
    DEFAULT_RED_BAND
}

fn default_nir_band() -> usize {
    DEFAULT_NIR_BAND
}

fn default_compress() -> String {
    "DEFLATE".to_string()
}

fn default_compress_level() -> u8 {
    6
}

fn default_scale_factor() -> i32 {
    10000
}

/// One input/output pair. Unset fields fall back to `global`.
#[derive(Deserialize, Serialize, Debug)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    pub crs: Option<String>,
    pub range_min: Option<f32>,
    pub range_max: Option<f32>,
    pub red_band: Option<usize>,
    pub nir_band: Option<usize>,
    pub resampling: Option<Resampling>,
    pub mode: Option<OutputMode>,
    pub compress: Option<String>,
    pub compress_level: Option<u8>,
    pub fixed_point: Option<bool>,
    pub scale_factor: Option<i32>,
    pub tiled: Option<bool>,
}

/// Fully resolved settings for one job.
#[derive(Debug)]
pub struct ResolvedJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub crs: Option<String>,
    pub range: Option<NdviRange>,
    pub options: EvaluatorOptions,
}

impl BatchConfig {
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> crate::error::Result<Self> {
        serde_json::from_str(content).map_err(|e| NdviError::Config(e.to_string()))
    }

    /// Apply global defaults to `job` and validate its range and encoding.
    pub fn resolve(&self, job: &Job) -> crate::error::Result<ResolvedJob> {
        let global = &self.global;

        let range_min = job.range_min.or(global.range_min);
        let range_max = job.range_max.or(global.range_max);
        let range = match (range_min, range_max) {
            (None, None) => None,
            (min, max) => Some(NdviRange::new(min.unwrap_or(-1.0), max.unwrap_or(1.0))?),
        };

        let encoding = if job.fixed_point.unwrap_or(global.fixed_point) {
            OutputEncoding::Int16Scaled {
                scale_factor: job.scale_factor.unwrap_or(global.scale_factor),
            }
        } else {
            OutputEncoding::Float32
        };

        let write = WriteOptions {
            encoding,
            compress: job.compress.clone().unwrap_or_else(|| global.compress.clone()),
            compress_level: job.compress_level.unwrap_or(global.compress_level),
            tiled: job.tiled.unwrap_or(global.tiled),
        };
        write.validate()?;

        Ok(ResolvedJob {
            input: job.input.clone(),
            output: job.output.clone(),
            crs: job.crs.clone().or_else(|| global.crs.clone()),
            range,
            options: EvaluatorOptions {
                red_band: job.red_band.unwrap_or(global.red_band),
                nir_band: job.nir_band.unwrap_or(global.nir_band),
                resampling: job.resampling.unwrap_or(global.resampling),
                mode: job.mode.unwrap_or(global.mode),
                write,
            },
        })
    }
}

/// Run every job in `config_path` in order, stopping at the first failure.
pub fn process_batch(config_path: &Path) -> Result<()> {
    let config = BatchConfig::from_file(config_path)
        .with_context(|| format!("reading batch file {}", config_path.display()))?;

    info!("Starting batch processing with {} jobs", config.jobs.len());

    for (i, job) in config.jobs.iter().enumerate() {
        info!(
            "[{}/{}] {} -> {}",
            i + 1,
            config.jobs.len(),
            job.input.display(),
            job.output.display()
        );

        let resolved = config
            .resolve(job)
            .with_context(|| format!("job {}", i + 1))?;
        GeotiffEvaluator::new(resolved.options)
            .evaluate(
                &resolved.input,
                &resolved.output,
                resolved.crs.as_deref(),
                resolved.range,
            )
            .with_context(|| format!("job {} ({})", i + 1, resolved.input.display()))?;
    }

    info!("Batch processing complete");
    Ok(())
}
