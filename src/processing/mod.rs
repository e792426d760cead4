// src/processing/mod.rs
pub mod evaluator;
pub mod ndvi;
pub mod reproject;

// Re-export main components
pub use evaluator::{evaluate_geotiff_vegetation, EvaluatorOptions, GeotiffEvaluator};
pub use ndvi::{evaluate_band_vegetation, NdviCalculator, NdviRange, OutputMode};
pub use reproject::Resampling;
