// src/processing/ndvi.rs
use gdal::raster::Buffer;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{NdviError, Result};

/// Written for cells without a usable input value.
pub const NODATA_VALUE: f32 = -999.0;

/// Cell values of the field mask.
pub const MASK_INSIDE: f32 = 255.0;
pub const MASK_OUTSIDE: f32 = 0.0;

/// Inclusive `[min, max]` window applied to NDVI values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NdviRange {
    min: f32,
    max: f32,
}

impl NdviRange {
    pub fn new(min: f32, max: f32) -> Result<Self> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(NdviError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Range used for field detection when the caller supplies none.
    pub fn field_default() -> Self {
        Self { min: 0.2, max: 0.5 }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// What the evaluator writes for each valid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// NDVI, clamped to the range when one is given
    #[default]
    Clamp,
    /// 255 where NDVI falls inside the range, 0 elsewhere
    Mask,
}

/// NDVI of a single pixel. A zero denominator yields 0.
#[inline]
pub fn ndvi(red: f32, nir: f32) -> f32 {
    let sum = nir + red;
    if sum == 0.0 {
        0.0
    } else {
        ((nir - red) / sum).clamp(-1.0, 1.0)
    }
}

/// Normalized Difference Vegetation Index calculator
#[derive(Debug, Clone)]
pub struct NdviCalculator {
    range: Option<NdviRange>,
    mode: OutputMode,
    red_nodata: Option<f32>,
    nir_nodata: Option<f32>,
    name: String,
}

impl Default for NdviCalculator {
    fn default() -> Self {
        Self::new(None, OutputMode::Clamp)
    }
}

impl NdviCalculator {
    pub fn new(range: Option<NdviRange>, mode: OutputMode) -> Self {
        let name = match mode {
            OutputMode::Clamp => "NDVI",
            OutputMode::Mask => "NDVI mask",
        };
        Self {
            range,
            mode,
            red_nodata: None,
            nir_nodata: None,
            name: name.to_string(),
        }
    }

    /// Treat cells equal to a band's own nodata value as missing.
    pub fn with_input_nodata(mut self, red: Option<f64>, nir: Option<f64>) -> Self {
        self.red_nodata = red.map(|v| v as f32);
        self.nir_nodata = nir.map(|v| v as f32);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_missing(value: f32, nodata: Option<f32>) -> bool {
        !value.is_finite() || nodata.is_some_and(|nd| value == nd)
    }

    pub fn calculate(&self, red: &Buffer<f32>, nir: &Buffer<f32>) -> Result<Buffer<f32>> {
        let shape = red.shape();
        if shape != nir.shape() {
            return Err(NdviError::ShapeMismatch {
                red: shape,
                nir: nir.shape(),
            });
        }

        let mask_range = self.range.unwrap_or_else(NdviRange::field_default);

        let result_data = red
            .data()
            .iter()
            .zip_eq(nir.data())
            .map(|(&red_val, &nir_val)| {
                if Self::is_missing(red_val, self.red_nodata)
                    || Self::is_missing(nir_val, self.nir_nodata)
                {
                    return NODATA_VALUE;
                }
                let value = ndvi(red_val, nir_val);
                match self.mode {
                    OutputMode::Clamp => match &self.range {
                        Some(range) => range.clamp(value),
                        None => value,
                    },
                    OutputMode::Mask if mask_range.contains(value) => MASK_INSIDE,
                    OutputMode::Mask => MASK_OUTSIDE,
                }
            })
            .collect();

        Ok(Buffer::new(shape, result_data))
    }
}

/// Compute NDVI for two equally shaped grids, optionally clamped to `range`.
pub fn evaluate_band_vegetation(
    red: &Buffer<f32>,
    nir: &Buffer<f32>,
    range: Option<NdviRange>,
) -> Result<Buffer<f32>> {
    NdviCalculator::new(range, OutputMode::Clamp).calculate(red, nir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(values: &[f32]) -> Buffer<f32> {
        Buffer::new((values.len(), 1), values.to_vec())
    }

    #[test]
    fn zero_denominator_is_zero() {
        assert_eq!(ndvi(0.0, 0.0), 0.0);
    }

    #[test]
    fn range_rejects_inverted_bounds() {
        assert!(matches!(
            NdviRange::new(0.6, 0.2),
            Err(NdviError::InvalidRange { .. })
        ));
        assert!(NdviRange::new(0.3, 0.3).is_ok());
        assert!(NdviRange::new(f32::NAN, 0.3).is_err());
    }

    #[test]
    fn input_nodata_passes_through_clamp() {
        let red = grid(&[0.0, 100.0]);
        let nir = grid(&[0.0, 300.0]);
        let range = NdviRange::new(0.2, 0.3).unwrap();
        let out = NdviCalculator::new(Some(range), OutputMode::Clamp)
            .with_input_nodata(Some(0.0), Some(0.0))
            .calculate(&red, &nir)
            .unwrap();
        assert_eq!(out.data(), &[NODATA_VALUE, 0.3]);
    }

    #[test]
    fn non_finite_input_is_nodata() {
        let red = grid(&[f32::NAN, f32::INFINITY, 10.0]);
        let nir = grid(&[1.0, f32::INFINITY, f32::NEG_INFINITY]);
        let out = evaluate_band_vegetation(&red, &nir, None).unwrap();
        assert_eq!(out.data(), &[NODATA_VALUE; 3]);
    }

    #[test]
    fn each_band_uses_its_own_nodata() {
        // red nodata is 0, nir nodata is 65535
        let red = grid(&[0.0, 100.0, 65535.0, 100.0]);
        let nir = grid(&[300.0, 65535.0, 100.0, 0.0]);
        let out = NdviCalculator::default()
            .with_input_nodata(Some(0.0), Some(65535.0))
            .calculate(&red, &nir)
            .unwrap();
        assert_eq!(out.data()[0], NODATA_VALUE);
        assert_eq!(out.data()[1], NODATA_VALUE);
        // values equal to the other band's nodata are still data
        assert!(out.data()[2] < 0.0);
        assert_eq!(out.data()[3], -1.0);
    }

    #[test]
    fn mask_marks_values_inside_range() {
        // ndvi: 0.0, 0.25, 0.6
        let red = grid(&[10.0, 30.0, 20.0]);
        let nir = grid(&[10.0, 50.0, 80.0]);
        let range = NdviRange::new(0.2, 0.5).unwrap();
        let calc = NdviCalculator::new(Some(range), OutputMode::Mask);
        assert_eq!(calc.name(), "NDVI mask");
        let out = calc.calculate(&red, &nir).unwrap();
        assert_eq!(out.data(), &[MASK_OUTSIDE, MASK_INSIDE, MASK_OUTSIDE]);
    }

    #[test]
    fn mismatched_shapes_fail() {
        let red = Buffer::new((2, 1), vec![1.0, 2.0]);
        let nir = Buffer::new((1, 2), vec![1.0, 2.0]);
        assert!(matches!(
            evaluate_band_vegetation(&red, &nir, None),
            Err(NdviError::ShapeMismatch { .. })
        ));
    }
}
