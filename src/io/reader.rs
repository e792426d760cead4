// src/io/reader.rs
use gdal::raster::Buffer;
use gdal::Dataset;
use log::{debug, info, warn};
use std::path::Path;

use crate::error::{NdviError, Result};

/// Geotransform GDAL reports for rasters without georeferencing.
const IDENTITY_TRANSFORM: [f64; 6] = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Clone, PartialEq)]
pub struct GeoInfo {
    /// WKT, empty when the source carries no CRS
    pub projection: String,
    pub geo_transform: [f64; 6],
    pub width: usize,
    pub height: usize,
}

/// Red and near-infrared grids read from one multi-band raster.
pub struct BandPair {
    pub red: Buffer<f32>,
    pub nir: Buffer<f32>,
    pub red_nodata: Option<f64>,
    pub nir_nodata: Option<f64>,
    pub geo_info: GeoInfo,
}

/// Open `path` and read the red and NIR bands (1-based indices).
pub fn read_bands(path: &Path, red_band: usize, nir_band: usize) -> Result<BandPair> {
    let dataset = Dataset::open(path)?;
    let available = dataset.raster_count() as usize;
    let (width, height) = dataset.raster_size();
    info!(
        "Opened {} ({}x{}, {} bands)",
        path.display(),
        width,
        height,
        available
    );

    for (role, index) in [("red", red_band), ("nir", nir_band)] {
        if index == 0 || index > available {
            return Err(NdviError::MissingBand {
                role,
                index,
                available,
            });
        }
    }

    let geo_transform = match dataset.geo_transform() {
        Ok(gt) => gt,
        Err(e) => {
            warn!("{} has no geotransform ({}), using identity", path.display(), e);
            IDENTITY_TRANSFORM
        }
    };

    let red = dataset.rasterband(red_band)?;
    let nir = dataset.rasterband(nir_band)?;
    let red_nodata = red.no_data_value();
    let nir_nodata = nir.no_data_value();
    debug!("red band {red_band} (nodata {red_nodata:?}), nir band {nir_band} (nodata {nir_nodata:?})");

    let red = red.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
    let nir = nir.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

    Ok(BandPair {
        red,
        nir,
        red_nodata,
        nir_nodata,
        geo_info: GeoInfo {
            projection: dataset.projection(),
            geo_transform,
            width,
            height,
        },
    })
}
