// src/utils/fixed_point.rs
use crate::processing::ndvi::NODATA_VALUE;

/// Nodata value of scaled int16 output. Kept outside the scaled NDVI range.
pub const NODATA_VALUE_INT: i16 = i16::MIN;

pub fn to_fixed_point(data: &[f32], scale_factor: i32) -> Vec<i16> {
    let limit = i16::MAX as f32;
    data.iter()
        .map(|&value| {
            if value == NODATA_VALUE || value.is_nan() {
                NODATA_VALUE_INT
            } else {
                (value * scale_factor as f32).round().clamp(-limit, limit) as i16
            }
        })
        .collect()
}
