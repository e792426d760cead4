use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::error::Result;
use crate::io::{OutputEncoding, WriteOptions};
use crate::processing::evaluator::{EvaluatorOptions, DEFAULT_NIR_BAND, DEFAULT_RED_BAND};
use crate::processing::{NdviRange, OutputMode, Resampling};

#[derive(Parser)]
#[command(name = "ndvi-detect", version)]
#[command(about = "Compute NDVI from multi-band GeoTIFF imagery")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute NDVI for one input raster
    Detect(DetectArgs),

    /// Run every job listed in a JSON batch file
    Batch {
        /// Path to the batch configuration
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Multi-band input GeoTIFF
    pub input_path: PathBuf,

    /// Single-band output GeoTIFF (overwritten if present)
    pub output_path: PathBuf,

    /// Target CRS, e.g. EPSG:4326. Defaults to the input CRS
    #[arg(long)]
    pub crs: Option<String>,

    /// Lower bound of the NDVI range (default -1)
    #[arg(long = "range_min", alias = "range-min", allow_negative_numbers = true)]
    pub range_min: Option<f32>,

    /// Upper bound of the NDVI range (default 1)
    #[arg(long = "range_max", alias = "range-max", allow_negative_numbers = true)]
    pub range_max: Option<f32>,

    /// 1-based index of the red band
    #[arg(long, default_value_t = DEFAULT_RED_BAND)]
    pub red_band: usize,

    /// 1-based index of the near-infrared band
    #[arg(long, default_value_t = DEFAULT_NIR_BAND)]
    pub nir_band: usize,

    /// Resampling used when reprojecting
    #[arg(long, value_enum, default_value_t = Resampling::Nearest)]
    pub resampling: Resampling,

    /// Write a 255/0 field mask of the range instead of NDVI values
    #[arg(long)]
    pub mask: bool,

    /// Write scaled int16 instead of float32
    #[arg(long)]
    pub fixed_point: bool,

    /// Scaling factor for fixed-point
    #[arg(long, default_value = "10000", value_parser = clap::value_parser!(i32).range(1..))]
    pub scale_factor: i32,

    /// Compression: DEFLATE, LZW, ZSTD or NONE
    #[arg(long, default_value = "DEFLATE")]
    pub compress: String,

    /// Compression level for DEFLATE and ZSTD
    #[arg(long, default_value = "6")]
    pub compress_level: u8,

    /// Write a tiled GeoTIFF
    #[arg(long)]
    pub tiled: bool,
}

impl DetectArgs {
    /// The requested range, `None` when neither bound was given.
    pub fn range(&self) -> Result<Option<NdviRange>> {
        match (self.range_min, self.range_max) {
            (None, None) => Ok(None),
            (min, max) => NdviRange::new(min.unwrap_or(-1.0), max.unwrap_or(1.0)).map(Some),
        }
    }

    pub fn evaluator_options(&self) -> EvaluatorOptions {
        let encoding = if self.fixed_point {
            OutputEncoding::Int16Scaled {
                scale_factor: self.scale_factor,
            }
        } else {
            OutputEncoding::Float32
        };

        EvaluatorOptions {
            red_band: self.red_band,
            nir_band: self.nir_band,
            resampling: self.resampling,
            mode: if self.mask {
                OutputMode::Mask
            } else {
                OutputMode::Clamp
            },
            write: WriteOptions {
                encoding,
                compress: self.compress.clone(),
                compress_level: self.compress_level,
                tiled: self.tiled,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NdviError;

    fn parse(args: &[&str]) -> DetectArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Detect(args) => args,
            Commands::Batch { .. } => panic!("expected detect"),
        }
    }

    #[test]
    fn detect_with_all_flags() {
        let args = parse(&[
            "ndvi-detect",
            "detect",
            "in.tif",
            "out.tif",
            "--crs",
            "EPSG:4326",
            "--range_min",
            "0.2",
            "--range_max",
            "0.5",
        ]);
        assert_eq!(args.crs.as_deref(), Some("EPSG:4326"));
        let range = args.range().unwrap().unwrap();
        assert_eq!((range.min(), range.max()), (0.2, 0.5));
        assert_eq!(args.red_band, 4);
        assert_eq!(args.nir_band, 5);
    }

    #[test]
    fn one_sided_range_uses_ndvi_bounds() {
        let args = parse(&["ndvi-detect", "detect", "a.tif", "b.tif", "--range_min", "-0.5"]);
        let range = args.range().unwrap().unwrap();
        assert_eq!((range.min(), range.max()), (-0.5, 1.0));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let args = parse(&[
            "ndvi-detect",
            "detect",
            "a.tif",
            "b.tif",
            "--range_min",
            "0.6",
            "--range_max",
            "0.2",
        ]);
        assert!(matches!(args.range(), Err(NdviError::InvalidRange { .. })));
    }

    #[test]
    fn options_follow_flags() {
        let args = parse(&[
            "ndvi-detect",
            "detect",
            "a.tif",
            "b.tif",
            "--mask",
            "--fixed-point",
            "--resampling",
            "bilinear",
        ]);
        let opts = args.evaluator_options();
        assert_eq!(opts.mode, OutputMode::Mask);
        assert_eq!(opts.resampling, Resampling::Bilinear);
        assert_eq!(
            opts.write.encoding,
            OutputEncoding::Int16Scaled {
                scale_factor: 10000
            }
        );
        assert!(args.range().unwrap().is_none());
    }

    #[test]
    fn non_positive_scale_factor_is_rejected() {
        for value in ["0", "-5"] {
            let parsed = Cli::try_parse_from([
                "ndvi-detect",
                "detect",
                "a.tif",
                "b.tif",
                "--fixed-point",
                "--scale-factor",
                value,
            ]);
            assert!(parsed.is_err(), "--scale-factor {value} was accepted");
        }
    }
}
