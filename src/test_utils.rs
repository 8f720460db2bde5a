use std::ffi::c_void;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::raster::Buffer;
use crate::spatial_ref::SpatialRef;
use crate::vector::{Feature, FieldDefn, FieldValue, Geometry, LayerOptions, OGRFieldType};
use crate::vsi::unlink_mem_file;
use crate::{AccessMode, Dataset, DatasetOptions, Driver};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

fn unique_name(stem: &str) -> String {
    format!(
        "{stem}_{}_{}",
        std::process::id(),
        NEXT_ID.fetch_add(1, Ordering::SeqCst)
    )
}

/// A struct that contains a temporary directory and a path to a file in that directory.
pub struct TempFixture {
    _temp_dir: tempfile::TempDir,
    temp_path: PathBuf,
}

impl TempFixture {
    /// Creates a temporary directory and path to a non-existent file with given `name`.
    /// Useful for writing results to during testing
    pub fn empty(name: &str) -> Self {
        let _temp_dir = tempfile::tempdir().unwrap();
        let temp_path = _temp_dir.path().join(name);
        Self {
            _temp_dir,
            temp_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.temp_path
    }
}

impl AsRef<Path> for TempFixture {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

/// A struct that represents a `/vsimem/` (in-memory) path.
///
/// The file will be deleted when the value is dropped.
pub struct InMemoryFixture {
    path: PathBuf,
}

impl InMemoryFixture {
    pub fn new(filename: &str) -> Self {
        let path = PathBuf::from("/vsimem").join(unique_name("fixture")).join(filename);
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InMemoryFixture {
    fn drop(&mut self) {
        // datasets may have written sidecar files next to the fixture
        if let Some(dir) = self.path.parent() {
            if let Ok(files) = crate::vsi::read_dir(dir, false) {
                for file in files {
                    let _ = unlink_mem_file(dir.join(file));
                }
            }
        }
        let _ = unlink_mem_file(&self.path);
    }
}

/// Scoped value for temporarily suppressing thread-local GDAL log messages.
///
/// Useful for tests that expect GDAL errors and want to keep the output log clean
/// of distracting yet expected error messages.
pub(crate) struct SuppressGDALErrorLog {
    // Make !Sync and !Send, and force use of `new`.
    _private: PhantomData<*mut c_void>,
}

impl SuppressGDALErrorLog {
    pub(crate) fn new() -> Self {
        unsafe { gdal_sys::CPLPushErrorHandler(Some(gdal_sys::CPLQuietErrorHandler)) };
        SuppressGDALErrorLog {
            _private: PhantomData,
        }
    }
}

impl Drop for SuppressGDALErrorLog {
    fn drop(&mut self) {
        unsafe { gdal_sys::CPLPopErrorHandler() };
    }
}

/// A `MEM` raster of `Byte` bands.
pub fn mem_raster(size_x: usize, size_y: usize, bands: usize) -> Dataset {
    Driver::get_by_name("MEM")
        .unwrap()
        .create(PathBuf::from(unique_name("mem")), size_x, size_y, bands)
        .unwrap()
}

/// An empty in-memory vector dataset.
pub fn mem_vector() -> Dataset {
    Driver::get_by_name("Memory")
        .or_else(|_| Driver::get_by_name("MEM"))
        .unwrap()
        .create_vector_only(unique_name("vector"))
        .unwrap()
}

/// A 400x400 single band `GTiff` in `/vsimem/`, in EPSG:4326.
///
/// Pixel `(x, y)` holds `(x + y) % 256`. The dataset is open for update.
pub fn sample_tif() -> (InMemoryFixture, Dataset) {
    let fixture = InMemoryFixture::new("sample.tif");
    let dataset = Driver::get_by_name("GTiff")
        .unwrap()
        .create(fixture.path(), 400, 400, 1)
        .unwrap();
    dataset
        .set_geo_transform(&[-10.0, 0.05, 0.0, 50.0, 0.0, -0.05])
        .unwrap();
    dataset
        .set_srs(Some(&SpatialRef::from_epsg(4326).unwrap()))
        .unwrap();
    let data: Vec<u8> = (0..400 * 400)
        .map(|i| ((i % 400 + i / 400) % 256) as u8)
        .collect();
    dataset
        .bands()
        .get(1)
        .unwrap()
        .pixels()
        .write((0, 0), (400, 400), &Buffer::new((400, 400), data))
        .unwrap();
    dataset.flush().unwrap();
    (fixture, dataset)
}

/// Names of the attribute fields of [`sample_shapefile`], in order.
pub const SAMPLE_FIELDS: [&str; 8] = [
    "path",
    "name",
    "type",
    "long_name",
    "fips_num",
    "fips",
    "state_fips",
    "state_abbr",
];

/// Number of features in [`sample_shapefile`].
pub const SAMPLE_FEATURES: usize = 23;

/// A polygon shapefile of [`SAMPLE_FEATURES`] counties in `/vsimem/`, opened read-only.
///
/// Feature `i` is the unit square at `(i, 0)`, its `fips_num` is `41001 + 2 * i`.
pub fn sample_shapefile() -> (InMemoryFixture, Dataset) {
    let fixture = InMemoryFixture::new("sample.shp");
    {
        let dataset = Driver::get_by_name("ESRI Shapefile")
            .unwrap()
            .create_vector_only(fixture.path())
            .unwrap();
        let srs = SpatialRef::from_epsg(4326).unwrap();
        let layer = dataset
            .layers()
            .create(LayerOptions {
                name: "sample",
                srs: Some(&srs),
                ty: gdal_sys::OGRwkbGeometryType::wkbPolygon,
                ..Default::default()
            })
            .unwrap();
        let defns: Vec<_> = SAMPLE_FIELDS
            .iter()
            .map(|name| {
                let ty = if *name == "fips_num" {
                    OGRFieldType::OFTInteger
                } else {
                    OGRFieldType::OFTString
                };
                FieldDefn::new(name, ty)
            })
            .collect();
        layer.fields().add_many(&defns, false).unwrap();

        for i in 0..SAMPLE_FEATURES {
            let mut feature = Feature::new(&layer).unwrap();
            let fips_num = 41001 + 2 * i as i32;
            let values = [
                ("path", FieldValue::from(format!("/counties/{fips_num}"))),
                ("name", FieldValue::from(format!("County {i}"))),
                ("type", FieldValue::from("county")),
                ("long_name", FieldValue::from(format!("County {i}, Oregon"))),
                ("fips_num", FieldValue::from(fips_num)),
                ("fips", FieldValue::from(fips_num.to_string())),
                ("state_fips", FieldValue::from("41")),
                ("state_abbr", FieldValue::from("OR")),
            ];
            for (name, value) in &values {
                feature.set_field(*name, value).unwrap();
            }
            let x = i as f64;
            let square = Geometry::from_wkt(&format!(
                "POLYGON (({x} 0,{} 0,{} 1,{x} 1,{x} 0))",
                x + 1.0,
                x + 1.0
            ))
            .unwrap();
            feature.set_geometry(Some(&square)).unwrap();
            layer.features().add(&mut feature).unwrap();
        }
        dataset.close().unwrap();
    }
    let dataset = Dataset::open_ex(
        fixture.path(),
        DatasetOptions {
            allowed_drivers: vec!["ESRI Shapefile".to_string()],
            ..DatasetOptions::with_mode(AccessMode::ReadOnly)
        },
    )
    .unwrap();
    (fixture, dataset)
}

/// A writable in-memory copy of [`sample_shapefile`]'s layer.
pub fn writable_sample() -> (InMemoryFixture, Dataset) {
    let (fixture, source) = sample_shapefile();
    let target = mem_vector();
    let layer = source.layers().get(0).unwrap();
    target.layers().copy(&layer, "sample", &[]).unwrap();
    source.close().unwrap();
    (fixture, target)
}

/// Assert numerical difference between two expressions is less than
/// 64-bit machine epsilon or a specified epsilon.
///
/// # Examples:
/// ```rust, no_run
/// use gdal_async::assert_near;
/// use std::f64::consts::{PI, E};
/// assert_near!(PI / E, 1.1557273497909217);
/// // with specified epsilon
/// assert_near!(PI / E, 1.15572734, epsilon = 1e-8);
/// ```
#[macro_export]
macro_rules! assert_near {
    ($left:expr, $right:expr) => {
        assert_near!($left, $right, epsilon = f64::EPSILON)
    };
    ($left:expr, $right:expr, epsilon = $ep:expr) => {
        assert!(
            ($left - $right).abs() < $ep,
            "|{} - {}| = {} is greater than epsilon {:.4e}",
            $left,
            $right,
            ($left - $right).abs(),
            $ep
        )
    };
    ($left:expr, $right:expr, epsilon = $ep:expr, field = $field:expr) => {
        assert!(
            ($left - $right).abs() < $ep,
            "field {}: |{} - {}| = {} is greater than epsilon {:.4e}",
            $field,
            $left,
            $right,
            ($left - $right).abs(),
            $ep
        )
    };
}
