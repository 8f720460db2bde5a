//! [GDAL](http://gdal.org/) bindings for Rust with checked resource lifetimes.
//!
//! A high-level API to access the GDAL library, for vector and raster data. Every
//! object vended by a [`Dataset`] (bands, layers, features, SQL result sets) knows
//! whether its dataset is still open: once the dataset is closed, using any of them
//! fails with [`GdalError::AlreadyDestroyed`](errors::GdalError::AlreadyDestroyed)
//! instead of touching freed memory.
//!
//! Most operations come in two flavours. The plain method runs on the calling thread,
//! the `*_async` variant runs the same call on a worker pool and returns a
//! [`Pending`] that can be awaited and/or given a completion callback.
//!
//! ## Use
//!
//! ```rust, no_run
//! use gdal_async::Dataset;
//!
//! # fn main() -> gdal_async::errors::Result<()> {
//! let dataset = Dataset::open("fixtures/roads.geojson")?;
//! let layer = dataset.layers().get(0)?;
//! layer.features().for_each(|feature| {
//!     let highway = feature.field_as_string("highway")?;
//!     let geometry = feature.geometry()?;
//!     println!("{highway:?} {:?}", geometry.map(|g| g.wkt()));
//!     Ok(())
//! })?;
//!
//! let band = Dataset::open("fixtures/tinymarble.tif")?.bands().get(1)?;
//! let pixels = futures::executor::block_on(band.pixels().read_async::<u8>((0, 0), (10, 10), None))?;
//! assert_eq!(pixels.len(), 100);
//! # Ok(())
//! # }
//! ```

#![crate_name = "gdal_async"]
#![crate_type = "lib"]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod config;
mod dataset;
mod driver;
pub mod errors;
mod handle;
mod metadata;
pub mod raster;
pub mod spatial_ref;
mod utils;
pub mod vector;
pub mod vsi;
pub mod work;
mod workqueue;

pub use dataset::{
    AccessMode, Dataset, DatasetCapability, DatasetOptions, GdalOpenFlags, GeoTransform, ProgressFn,
    RasterCreation,
};
pub use driver::{CslStringList, Driver, DriverManager};
pub use handle::close_all_datasets;
pub use metadata::{Metadata, MetadataEntry};
pub use work::Pending;
pub use workqueue::WorkQueue;

/// Get the version of the linked GDAL library, e.g. `"3.8.4"`.
pub fn gdal_version() -> String {
    let c_key = c"RELEASE_NAME";
    utils::_string(unsafe { gdal_sys::GDALVersionInfo(c_key.as_ptr()) })
}

#[cfg(test)]
pub(crate) mod test_utils;
