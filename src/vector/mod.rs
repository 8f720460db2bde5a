//! GDAL Vector Data
//!
//! Layers are reached through [`Dataset::layers`](crate::Dataset::layers); their
//! features and field definitions through the [`LayerFeatures`] and [`LayerFields`]
//! proxies. All of them stop working once the dataset is closed.
//!
//! ## Reading
//!
//! ```rust, no_run
//! use gdal_async::Dataset;
//!
//! # fn main() -> gdal_async::errors::Result<()> {
//! let dataset = Dataset::open("fixtures/roads.geojson")?;
//! let layer = dataset.layers().get(0)?;
//! layer.features().for_each(|feature| {
//!     let highway = feature.field("highway")?;
//!     let geometry = feature.geometry()?;
//!     println!("{highway:?} {:?}", geometry.map(|g| g.wkt()));
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! Geometries are plain values, independent of any dataset. They convert to and
//! from [`geo_types`] with [`TryFrom`] and [`ToGdal`].

mod envelope;
mod feature;
mod features;
mod fields;
mod geometry;
mod layer;
mod ops;
mod sql;

pub use envelope::{Envelope, Envelope3D};
pub use feature::{Feature, FieldValue};
pub use features::{LayerFeatures, LayerFeaturesIter};
pub use fields::{FieldDefn, LayerFields};
pub use geometry::{Geometry, GeometryChildren, GeometryPoints};
pub use layer::{DatasetLayers, DatasetLayersIter, Layer, LayerCapability, LayerOptions};
pub use ops::ToGdal;
pub use sql::Dialect;

pub use gdal_sys::{OGRFieldType, OGRwkbGeometryType};

/// Picks a layer or field either by its 0-based position or by its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Index(usize),
    Name(String),
}

impl From<usize> for Selector {
    fn from(index: usize) -> Self {
        Selector::Index(index)
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::Name(name.to_string())
    }
}

impl From<String> for Selector {
    fn from(name: String) -> Self {
        Selector::Name(name)
    }
}

impl From<&String> for Selector {
    fn from(name: &String) -> Self {
        Selector::Name(name.clone())
    }
}
