// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NdviError>;

/// Errors raised while evaluating vegetation indices.
#[derive(Debug, Error)]
pub enum NdviError {
    #[error("input has {available} band(s), {role} band {index} is missing")]
    MissingBand {
        role: &'static str,
        index: usize,
        available: usize,
    },

    #[error("invalid range [{min}, {max}]: min must not be greater than max")]
    InvalidRange { min: f32, max: f32 },

    #[error("reprojection failed: {0}")]
    Reprojection(String),

    #[error("invalid scale factor {0}: must be greater than zero")]
    InvalidScaleFactor(i32),

    #[error("band shapes differ: red is {red:?}, nir is {nir:?}")]
    ShapeMismatch {
        red: (usize, usize),
        nir: (usize, usize),
    },

    #[error("invalid batch configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

impl NdviError {
    /// True for failures reading or writing files, including GDAL driver errors.
    pub fn is_io(&self) -> bool {
        matches!(self, NdviError::Io(_) | NdviError::Gdal(_))
    }
}
