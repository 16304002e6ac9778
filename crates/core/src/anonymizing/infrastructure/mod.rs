pub mod pixelate_anonymizer;
pub mod raster;
