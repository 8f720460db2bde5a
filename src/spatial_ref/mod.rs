//! Spatial reference systems and coordinate transformations.
//!
//! [`SpatialRef`] values are independent of any dataset.

mod srs;
mod transform;

pub use srs::{AxisMappingStrategy, SpatialRef, Units};
pub use transform::CoordTransform;
