//! Geometry operations delegated to OGR (and GEOS when GDAL is built with it).

mod conversions;
mod predicates;
mod set;
mod transformations;

pub use conversions::ToGdal;
