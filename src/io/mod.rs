// src/io/mod.rs
pub mod reader;
pub mod writer;

pub use reader::{read_bands, BandPair, GeoInfo};
pub use writer::{write_raster, OutputEncoding, WriteOptions};
