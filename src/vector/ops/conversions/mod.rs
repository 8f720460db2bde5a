mod formats;
mod gdal_to_geo;
mod geo_to_gdal;

use crate::errors::Result;
use crate::vector::Geometry;

/// Convert object to a GDAL geometry.
pub trait ToGdal {
    fn to_gdal(&self) -> Result<Geometry>;
}
