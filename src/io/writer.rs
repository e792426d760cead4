// src/io/writer.rs
use gdal::raster::{Buffer, RasterCreationOptions};
use gdal::{DriverManager, Metadata};
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

use super::reader::GeoInfo;
use crate::error::{NdviError, Result};
use crate::processing::ndvi::NODATA_VALUE;
use crate::utils::fixed_point::{to_fixed_point, NODATA_VALUE_INT};

/// Pixel type of the output band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    Float32,
    /// int16 holding `value * scale_factor`
    Int16Scaled { scale_factor: i32 },
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub encoding: OutputEncoding,
    pub compress: String,
    pub compress_level: u8,
    pub tiled: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            encoding: OutputEncoding::Float32,
            compress: "DEFLATE".to_string(),
            compress_level: 6,
            tiled: false,
        }
    }
}

impl WriteOptions {
    /// Reject settings that would write a misleading file.
    pub fn validate(&self) -> Result<()> {
        match self.encoding {
            OutputEncoding::Int16Scaled { scale_factor } if scale_factor <= 0 => {
                Err(NdviError::InvalidScaleFactor(scale_factor))
            }
            _ => Ok(()),
        }
    }

    fn creation_options(&self) -> RasterCreationOptions {
        let mut options = Vec::new();
        let compress = self.compress.to_uppercase();

        if compress != "NONE" {
            options.push(format!("COMPRESS={compress}"));
            match compress.as_str() {
                "DEFLATE" => options.push(format!("ZLEVEL={}", self.compress_level.min(9))),
                "ZSTD" => options.push(format!("ZSTD_LEVEL={}", self.compress_level.min(22))),
                _ => {}
            }
        }

        if self.tiled {
            options.push("TILED=YES".to_string());
        }

        RasterCreationOptions::from_iter(options)
    }
}

/// Write `grid` as a single-band GeoTIFF, replacing any existing file.
///
/// The output file is removed again if writing fails part way.
pub fn write_raster(
    grid: &Buffer<f32>,
    geo_info: &GeoInfo,
    output_path: &Path,
    description: &str,
    options: &WriteOptions,
) -> Result<()> {
    options.validate()?;

    if output_path.exists() {
        debug!("Replacing existing {}", output_path.display());
        fs::remove_file(output_path)?;
    }

    match write_dataset(grid, geo_info, output_path, description, options) {
        Ok(()) => {
            info!(
                "Wrote {} ({}x{})",
                output_path.display(),
                geo_info.width,
                geo_info.height
            );
            Ok(())
        }
        Err(e) => {
            if output_path.exists() {
                if let Err(remove_err) = fs::remove_file(output_path) {
                    warn!(
                        "Could not remove partial output {}: {}",
                        output_path.display(),
                        remove_err
                    );
                }
            }
            Err(e)
        }
    }
}

fn write_dataset(
    grid: &Buffer<f32>,
    geo_info: &GeoInfo,
    output_path: &Path,
    description: &str,
    options: &WriteOptions,
) -> Result<()> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let creation_options = options.creation_options();
    let (width, height) = grid.shape();

    let mut out_ds = match options.encoding {
        OutputEncoding::Float32 => driver.create_with_band_type_with_options::<f32, _>(
            output_path,
            width,
            height,
            1,
            &creation_options,
        )?,
        OutputEncoding::Int16Scaled { .. } => driver
            .create_with_band_type_with_options::<i16, _>(
                output_path,
                width,
                height,
                1,
                &creation_options,
            )?,
    };

    if !geo_info.projection.is_empty() {
        out_ds.set_projection(&geo_info.projection)?;
    }
    out_ds.set_geo_transform(&geo_info.geo_transform)?;

    let mut band = out_ds.rasterband(1)?;

    match options.encoding {
        OutputEncoding::Float32 => {
            band.set_no_data_value(Some(NODATA_VALUE as f64))?;
            band.set_description(description)?;

            let mut buffer = Buffer::new((width, height), grid.data().to_vec());
            band.write((0, 0), (width, height), &mut buffer)?;
        }
        OutputEncoding::Int16Scaled { scale_factor } => {
            band.set_no_data_value(Some(NODATA_VALUE_INT as f64))?;
            band.set_metadata_item("SCALE", &format!("{}", 1.0 / scale_factor as f64), "")?;
            band.set_metadata_item("OFFSET", "0", "")?;
            band.set_description(&format!("{description} (scaled by {scale_factor})"))?;

            let fixed_data = to_fixed_point(grid.data(), scale_factor);
            let mut buffer = Buffer::new((width, height), fixed_data);
            band.write((0, 0), (width, height), &mut buffer)?;
        }
    }

    out_ds.flush_cache()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaled(scale_factor: i32) -> WriteOptions {
        WriteOptions {
            encoding: OutputEncoding::Int16Scaled { scale_factor },
            ..WriteOptions::default()
        }
    }

    #[test]
    fn non_positive_scale_factor_is_rejected() {
        for scale_factor in [0, -1, -10000] {
            assert!(matches!(
                scaled(scale_factor).validate(),
                Err(NdviError::InvalidScaleFactor(f)) if f == scale_factor
            ));
        }
        assert!(scaled(10000).validate().is_ok());
        assert!(WriteOptions::default().validate().is_ok());
    }

    #[test]
    fn invalid_scale_factor_leaves_existing_output_alone() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("ndvi.tif");
        std::fs::write(&output, b"previous run").unwrap();
        let geo_info = GeoInfo {
            projection: String::new(),
            geo_transform: [0.0, 1.0, 0.0, 0.0, 0.0, -1.0],
            width: 1,
            height: 1,
        };

        let err = write_raster(
            &Buffer::new((1, 1), vec![0.5]),
            &geo_info,
            &output,
            "NDVI",
            &scaled(0),
        )
        .unwrap_err();
        assert!(matches!(err, NdviError::InvalidScaleFactor(0)));
        assert_eq!(std::fs::read(&output).unwrap(), b"previous run");
    }
}
