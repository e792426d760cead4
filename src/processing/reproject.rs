// src/processing/reproject.rs
// Output cells are mapped back into the source grid and sampled there.
// Cells that land outside the source are nodata.

use gdal::raster::Buffer;
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::ndvi::NODATA_VALUE;
use crate::error::{NdviError, Result};
use crate::io::GeoInfo;

/// Points sampled along each edge of the source footprint.
const EDGE_SAMPLES: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    #[default]
    Nearest,
    Bilinear,
}

/// Parse a user supplied CRS ("EPSG:4326", PROJ string, WKT).
pub fn parse_crs(definition: &str) -> Result<SpatialRef> {
    let mut srs = SpatialRef::from_definition(definition)
        .map_err(|e| NdviError::Reprojection(format!("unsupported CRS '{definition}': {e}")))?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

/// Short label for log messages, e.g. "EPSG:32633".
pub fn describe_crs(srs: &SpatialRef) -> String {
    match (srs.auth_name(), srs.auth_code()) {
        (Ok(name), Ok(code)) => format!("{name}:{code}"),
        _ => "custom CRS".to_string(),
    }
}

fn source_crs(geo_info: &GeoInfo) -> Result<SpatialRef> {
    if geo_info.projection.is_empty() {
        return Err(NdviError::Reprojection(
            "input raster has no coordinate reference system".to_string(),
        ));
    }
    let mut srs = SpatialRef::from_wkt(&geo_info.projection)
        .map_err(|e| NdviError::Reprojection(format!("unreadable source CRS: {e}")))?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

/// Affine geotransform with its inverse, mapping pixel <-> georeferenced space.
#[derive(Debug, Clone, Copy)]
struct Affine {
    gt: [f64; 6],
    inv: [f64; 6],
}

impl Affine {
    fn new(gt: [f64; 6]) -> Result<Self> {
        let det = gt[1] * gt[5] - gt[2] * gt[4];
        if det == 0.0 || !det.is_finite() {
            return Err(NdviError::Reprojection(format!(
                "geotransform {gt:?} is not invertible"
            )));
        }
        let inv = [
            (gt[2] * gt[3] - gt[0] * gt[5]) / det,
            gt[5] / det,
            -gt[2] / det,
            (gt[0] * gt[4] - gt[1] * gt[3]) / det,
            -gt[4] / det,
            gt[1] / det,
        ];
        Ok(Self { gt, inv })
    }

    fn to_geo(&self, px: f64, py: f64) -> (f64, f64) {
        let gt = &self.gt;
        (
            gt[0] + px * gt[1] + py * gt[2],
            gt[3] + px * gt[4] + py * gt[5],
        )
    }

    fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let inv = &self.inv;
        (
            inv[0] + x * inv[1] + y * inv[2],
            inv[3] + x * inv[4] + y * inv[5],
        )
    }
}

/// Transform coordinates in place. Points that fail become NaN.
///
/// The whole slice is tried in one call first; GDAL rejects the batch if any
/// point fails, so the slow path retries point by point.
fn transform_points(transform: &CoordTransform, xs: &mut [f64], ys: &mut [f64]) {
    let mut zs = vec![0.0; xs.len()];
    let (orig_x, orig_y) = (xs.to_vec(), ys.to_vec());
    if transform.transform_coords(xs, ys, &mut zs).is_ok() {
        return;
    }

    for i in 0..xs.len() {
        let mut x = [orig_x[i]];
        let mut y = [orig_y[i]];
        let mut z = [0.0];
        if transform.transform_coords(&mut x, &mut y, &mut z).is_ok() {
            xs[i] = x[0];
            ys[i] = y[0];
        } else {
            xs[i] = f64::NAN;
            ys[i] = f64::NAN;
        }
    }
}

/// Output grid covering the source footprint in the target CRS.
fn suggested_output(
    source: &Affine,
    width: usize,
    height: usize,
    forward: &CoordTransform,
) -> Result<([f64; 6], usize, usize)> {
    let (w, h) = (width as f64, height as f64);
    let steps = (EDGE_SAMPLES - 1) as f64;

    let mut xs = Vec::with_capacity(EDGE_SAMPLES * 4);
    let mut ys = Vec::with_capacity(EDGE_SAMPLES * 4);
    for i in 0..EDGE_SAMPLES {
        let t = i as f64 / steps;
        for (px, py) in [(t * w, 0.0), (t * w, h), (0.0, t * h), (w, t * h)] {
            let (x, y) = source.to_geo(px, py);
            xs.push(x);
            ys.push(y);
        }
    }
    transform_points(forward, &mut xs, &mut ys);

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (&x, &y) in xs.iter().zip(&ys) {
        if x.is_finite() && y.is_finite() {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }
    if !(min_x < max_x && min_y < max_y) {
        return Err(NdviError::Reprojection(
            "source footprint cannot be represented in the target CRS".to_string(),
        ));
    }

    let diagonal = ((max_x - min_x).powi(2) + (max_y - min_y).powi(2)).sqrt();
    let pixel_size = diagonal / (w * w + h * h).sqrt();
    let out_width = (((max_x - min_x) / pixel_size).ceil() as usize).max(1);
    let out_height = (((max_y - min_y) / pixel_size).ceil() as usize).max(1);

    Ok((
        [min_x, pixel_size, 0.0, max_y, 0.0, -pixel_size],
        out_width,
        out_height,
    ))
}

fn sample_nearest(data: &[f32], width: usize, height: usize, px: f64, py: f64) -> f32 {
    if !(px >= 0.0 && py >= 0.0 && px < width as f64 && py < height as f64) {
        return NODATA_VALUE;
    }
    data[py as usize * width + px as usize]
}

fn sample_bilinear(data: &[f32], width: usize, height: usize, px: f64, py: f64) -> f32 {
    let nearest = sample_nearest(data, width, height, px, py);
    if nearest == NODATA_VALUE {
        return nearest;
    }

    // Pixel centres sit at +0.5
    let fx = (px - 0.5).clamp(0.0, (width - 1) as f64);
    let fy = (py - 0.5).clamp(0.0, (height - 1) as f64);
    let x1 = fx.floor() as usize;
    let y1 = fy.floor() as usize;
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);
    let dx = (fx - x1 as f64) as f32;
    let dy = (fy - y1 as f64) as f32;

    let v11 = data[y1 * width + x1];
    let v21 = data[y1 * width + x2];
    let v12 = data[y2 * width + x1];
    let v22 = data[y2 * width + x2];
    if [v11, v21, v12, v22].contains(&NODATA_VALUE) {
        return nearest;
    }

    let v1 = v11 * (1.0 - dx) + v21 * dx;
    let v2 = v12 * (1.0 - dx) + v22 * dx;
    v1 * (1.0 - dy) + v2 * dy
}

/// Reproject `grid` from the CRS in `geo_info` to `target`.
///
/// Returns the input unchanged when both CRSs are the same.
pub fn reproject(
    grid: &Buffer<f32>,
    geo_info: &GeoInfo,
    target: &SpatialRef,
    resampling: Resampling,
) -> Result<(Buffer<f32>, GeoInfo)> {
    let source_srs = source_crs(geo_info)?;
    let mut target = target.clone();
    target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    let target = &target;
    if source_srs == *target {
        debug!("Target CRS matches source, skipping reprojection");
        return Ok((
            Buffer::new(grid.shape(), grid.data().to_vec()),
            geo_info.clone(),
        ));
    }

    let (width, height) = grid.shape();
    let forward = CoordTransform::new(&source_srs, target)
        .map_err(|e| NdviError::Reprojection(e.to_string()))?;
    let inverse = CoordTransform::new(target, &source_srs)
        .map_err(|e| NdviError::Reprojection(e.to_string()))?;

    let source = Affine::new(geo_info.geo_transform)?;
    let (out_gt, out_width, out_height) = suggested_output(&source, width, height, &forward)?;
    let output_affine = Affine::new(out_gt)?;
    info!(
        "Reprojecting {}x{} {} -> {}x{} {} ({:?})",
        width,
        height,
        describe_crs(&source_srs),
        out_width,
        out_height,
        describe_crs(target),
        resampling
    );

    let data = grid.data();
    let sample = match resampling {
        Resampling::Nearest => sample_nearest,
        Resampling::Bilinear => sample_bilinear,
    };

    let mut output = Vec::with_capacity(out_width * out_height);
    let mut xs = vec![0.0; out_width];
    let mut ys = vec![0.0; out_width];
    for row in 0..out_height {
        for col in 0..out_width {
            let (x, y) = output_affine.to_geo(col as f64 + 0.5, row as f64 + 0.5);
            xs[col] = x;
            ys[col] = y;
        }
        transform_points(&inverse, &mut xs, &mut ys);

        output.extend(xs.iter().zip(&ys).map(|(&x, &y)| {
            if !(x.is_finite() && y.is_finite()) {
                return NODATA_VALUE;
            }
            let (px, py) = source.to_pixel(x, y);
            sample(data, width, height, px, py)
        }));
    }

    let projection = target
        .to_wkt()
        .map_err(|e| NdviError::Reprojection(e.to_string()))?;

    Ok((
        Buffer::new((out_width, out_height), output),
        GeoInfo {
            projection,
            geo_transform: out_gt,
            width: out_width,
            height: out_height,
        },
    ))
}
