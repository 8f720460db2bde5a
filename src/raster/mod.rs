//! GDAL Raster Data
//!
//! Bands are reached through [`Dataset::bands`](crate::Dataset::bands) and are
//! numbered from `1`, as in GDAL. Pixel I/O lives on [`Pixels`], obtained with
//! [`RasterBand::pixels`].

mod buffer;
mod color_table;
mod pixels;
mod rasterband;
mod types;

pub use buffer::{Buffer, ByteBuffer};
pub use color_table::{
    CmykEntry, ColorEntry, ColorTable, GrayEntry, HlsEntry, PaletteInterpretation, RgbaEntry,
};
pub use pixels::{Pixels, ReadOptions};
pub use rasterband::{
    ColorInterpretation, DatasetBands, DatasetBandsIter, RasterBand, RasterOverviews,
    RasterOverviewsIter, StatisticsAll,
};
pub use types::{GDALDataType, GdalDataType, GdalType};

use gdal_sys::GDALRIOResampleAlg;

/// A `KEY=VALUE` option passed to a driver when creating datasets or bands.
#[derive(Debug)]
pub struct RasterCreationOption<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// Resampling used when the read window and the buffer differ in size, and when
/// building overviews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResampleAlg {
    #[default]
    NearestNeighbour,
    Bilinear,
    Cubic,
    CubicSpline,
    Lanczos,
    Average,
    Mode,
    Gauss,
}

impl ResampleAlg {
    pub fn to_gdal(&self) -> GDALRIOResampleAlg::Type {
        match self {
            ResampleAlg::NearestNeighbour => GDALRIOResampleAlg::GRIORA_NearestNeighbour,
            ResampleAlg::Bilinear => GDALRIOResampleAlg::GRIORA_Bilinear,
            ResampleAlg::Cubic => GDALRIOResampleAlg::GRIORA_Cubic,
            ResampleAlg::CubicSpline => GDALRIOResampleAlg::GRIORA_CubicSpline,
            ResampleAlg::Lanczos => GDALRIOResampleAlg::GRIORA_Lanczos,
            ResampleAlg::Average => GDALRIOResampleAlg::GRIORA_Average,
            ResampleAlg::Mode => GDALRIOResampleAlg::GRIORA_Mode,
            ResampleAlg::Gauss => GDALRIOResampleAlg::GRIORA_Gauss,
        }
    }

    /// The name understood by `GDALBuildOverviews`.
    pub fn to_gdal_str(&self) -> &'static str {
        match self {
            ResampleAlg::NearestNeighbour => "NEAREST",
            ResampleAlg::Bilinear => "BILINEAR",
            ResampleAlg::Cubic => "CUBIC",
            ResampleAlg::CubicSpline => "CUBICSPLINE",
            ResampleAlg::Lanczos => "LANCZOS",
            ResampleAlg::Average => "AVERAGE",
            ResampleAlg::Mode => "MODE",
            ResampleAlg::Gauss => "GAUSS",
        }
    }
}

#[cfg(test)]
mod tests;
