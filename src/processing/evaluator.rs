// src/processing/evaluator.rs
use log::{info, warn};
use std::path::Path;

use super::ndvi::{NdviCalculator, NdviRange, OutputMode};
use super::reproject::{describe_crs, parse_crs, reproject, Resampling};
use crate::error::Result;
use crate::io::{read_bands, write_raster, OutputEncoding, WriteOptions};

/// 1-based band index of red in an 8-band PlanetScope-style scene.
pub const DEFAULT_RED_BAND: usize = 4;
pub const DEFAULT_NIR_BAND: usize = 5;

#[derive(Debug, Clone)]
pub struct EvaluatorOptions {
    pub red_band: usize,
    pub nir_band: usize,
    pub resampling: Resampling,
    pub mode: OutputMode,
    pub write: WriteOptions,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            red_band: DEFAULT_RED_BAND,
            nir_band: DEFAULT_NIR_BAND,
            resampling: Resampling::Nearest,
            mode: OutputMode::Clamp,
            write: WriteOptions::default(),
        }
    }
}

/// Computes NDVI for a multi-band GeoTIFF and writes a single-band result.
#[derive(Debug, Clone, Default)]
pub struct GeotiffEvaluator {
    options: EvaluatorOptions,
}

impl GeotiffEvaluator {
    pub fn new(options: EvaluatorOptions) -> Self {
        Self { options }
    }

    pub fn evaluate(
        &self,
        input_path: &Path,
        output_path: &Path,
        crs: Option<&str>,
        range: Option<NdviRange>,
    ) -> Result<()> {
        let opts = &self.options;
        opts.write.validate()?;
        let bands = read_bands(input_path, opts.red_band, opts.nir_band)?;
        let target = crs.map(parse_crs).transpose()?;

        let calculator = NdviCalculator::new(range, opts.mode)
            .with_input_nodata(bands.red_nodata, bands.nir_nodata);
        let result = calculator.calculate(&bands.red, &bands.nir)?;
        drop(bands.red);
        drop(bands.nir);

        let (grid, geo_info) = match &target {
            Some(target) => {
                info!("Target CRS {}", describe_crs(target));
                let resampling = if opts.mode == OutputMode::Mask
                    && opts.resampling == Resampling::Bilinear
                {
                    warn!("Bilinear resampling would blend mask classes, using nearest");
                    Resampling::Nearest
                } else {
                    opts.resampling
                };
                reproject(&result, &bands.geo_info, target, resampling)?
            }
            None => (result, bands.geo_info),
        };

        // Mask classes are integral, so they are stored unscaled.
        let mut write_options = opts.write.clone();
        if opts.mode == OutputMode::Mask {
            if let OutputEncoding::Int16Scaled { .. } = write_options.encoding {
                write_options.encoding = OutputEncoding::Int16Scaled { scale_factor: 1 };
            }
        }

        write_raster(
            &grid,
            &geo_info,
            output_path,
            calculator.name(),
            &write_options,
        )
    }
}

/// Compute NDVI for `input_path` with default options and write it to `output_path`.
pub fn evaluate_geotiff_vegetation(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    crs: Option<&str>,
    range: Option<NdviRange>,
) -> Result<()> {
    GeotiffEvaluator::default().evaluate(input_path.as_ref(), output_path.as_ref(), crs, range)
}
