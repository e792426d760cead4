// src/lib.rs
pub mod batch;
pub mod cli;
pub mod error;
pub mod io;
pub mod processing;
pub mod utils;

pub use error::{NdviError, Result};
pub use processing::{evaluate_band_vegetation, evaluate_geotiff_vegetation, NdviRange};

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
