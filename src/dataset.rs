use std::ffi::{c_char, c_int, c_uint, c_void, CString};
use std::fmt::{self, Debug, Formatter};
use std::path::{Path, PathBuf};
use std::ptr;
use std::str::FromStr;
use std::sync::Arc;

use bitflags::bitflags;
use gdal_sys::{self, CPLErr, GDALDatasetH, GDALMajorObjectH};

use crate::driver::{Driver, _register_drivers};
use crate::errors::*;
use crate::handle::{DatasetCore, Guarded, Liveness};
use crate::metadata::{MajorObject, Metadata};
use crate::raster::{DatasetBands, GdalDataType, RasterCreationOption, ResampleAlg};
use crate::spatial_ref::SpatialRef;
use crate::utils::{_cpl_result, _last_error_msg, _path_to_c_string, _string_array};
use crate::vector::DatasetLayers;
use crate::work::{self, Pending};
use crate::{vsi, CslStringList};

pub type GeoTransform = [f64; 6];

const GDAL_OF_UPDATE: c_uint = 0x01;
const GDAL_OF_VERBOSE_ERROR: c_uint = 0x40;

/// Reports the completion ratio, from `0.0` to `1.0`, of a long running operation.
pub type ProgressFn = Box<dyn FnMut(f64) + Send>;

/// How a dataset is opened.
///
/// Parses from the short forms `"r"`, `"r+"` and `"w"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessMode {
    /// `"r"`
    #[default]
    ReadOnly,
    /// `"r+"`
    Update,
    /// `"w"`: create a new dataset with the first allowed driver.
    Create,
}

impl FromStr for AccessMode {
    type Err = GdalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(AccessMode::ReadOnly),
            "r+" => Ok(AccessMode::Update),
            "w" => Ok(AccessMode::Create),
            other => Err(GdalError::BadArgument(format!(
                "invalid open mode '{other}', must be one of \"r\", \"r+\" or \"w\""
            ))),
        }
    }
}

bitflags! {
    /// Extra flags for `GDALOpenEx`, on top of those implied by the [`AccessMode`].
    ///
    /// `GDAL_OF_SHARED` is deliberately absent: a shared dataset could be closed
    /// behind the back of its other users.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GdalOpenFlags: c_uint {
        /// Allow raster drivers to be used.
        const GDAL_OF_RASTER = 0x02;
        /// Allow vector drivers to be used.
        const GDAL_OF_VECTOR = 0x04;
        /// Allow gnm drivers to be used.
        const GDAL_OF_GNM = 0x08;
        /// Allow multidimensional raster drivers to be used.
        const GDAL_OF_MULTIDIM_RASTER = 0x10;
        /// Open as internal dataset, not registered in GDAL's list of open datasets.
        const GDAL_OF_INTERNAL = 0x80;
    }
}

/// Size and layout of the raster created when opening with [`AccessMode::Create`].
#[derive(Debug, Clone, PartialEq)]
pub struct RasterCreation {
    pub size: (usize, usize),
    pub band_count: usize,
    pub data_type: GdalDataType,
    /// Driver specific `KEY=VALUE` creation options.
    pub options: Vec<(String, String)>,
}

impl RasterCreation {
    pub fn new(size: (usize, usize), band_count: usize, data_type: GdalDataType) -> Self {
        Self {
            size,
            band_count,
            data_type,
            options: Vec::new(),
        }
    }
}

/// Open parameters for [`Dataset::open_ex`].
///
/// Without `raster`, creating a dataset creates a vector-only one.
#[derive(Debug, Clone, Default)]
pub struct DatasetOptions {
    pub mode: AccessMode,
    pub open_flags: GdalOpenFlags,
    /// Restrict (or, when creating, select) the driver by short name.
    pub allowed_drivers: Vec<String>,
    /// Driver specific `KEY=VALUE` open options.
    pub open_options: Vec<String>,
    pub sibling_files: Vec<String>,
    pub raster: Option<RasterCreation>,
}

impl DatasetOptions {
    pub fn with_mode(mode: AccessMode) -> Self {
        DatasetOptions {
            mode,
            ..Default::default()
        }
    }

    pub fn driver(mut self, name: &str) -> Self {
        self.allowed_drivers.push(name.to_string());
        self
    }
}

/// Optional dataset capabilities, see [`Dataset::test_capability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetCapability {
    CreateLayer,
    DeleteLayer,
    CreateGeomFieldAfterCreateLayer,
    CurveGeometries,
    Transactions,
    EmulatedTransactions,
    RandomLayerRead,
    RandomLayerWrite,
    MeasuredGeometries,
}

impl DatasetCapability {
    pub(crate) fn as_c_str(&self) -> &'static std::ffi::CStr {
        match self {
            DatasetCapability::CreateLayer => c"CreateLayer",
            DatasetCapability::DeleteLayer => c"DeleteLayer",
            DatasetCapability::CreateGeomFieldAfterCreateLayer => {
                c"CreateGeomFieldAfterCreateLayer"
            }
            DatasetCapability::CurveGeometries => c"CurveGeometries",
            DatasetCapability::Transactions => c"Transactions",
            DatasetCapability::EmulatedTransactions => c"EmulatedTransactions",
            DatasetCapability::RandomLayerRead => c"RandomLayerRead",
            DatasetCapability::RandomLayerWrite => c"RandomLayerWrite",
            DatasetCapability::MeasuredGeometries => c"MeasuredGeometries",
        }
    }
}

/// Wrapper around a [`GDALDataset`][GDALDataset] object.
///
/// Represents both a [vector dataset][vector-data-model]
/// containing a collection of layers; and a
/// [raster dataset][raster-data-model] containing a collection of raster-bands.
///
/// Clones share the same native dataset. It is closed by [`Dataset::close`], or once
/// the last clone and the last object obtained from it are dropped. Bands, layers,
/// features and result sets obtained from a closed dataset fail with
/// [`GdalError::AlreadyDestroyed`].
///
/// [vector-data-model]: https://gdal.org/user/vector_data_model.html
/// [raster-data-model]: https://gdal.org/user/raster_data_model.html
/// [GDALDataset]: https://gdal.org/api/gdaldataset_cpp.html#_CPPv411GDALDataset
#[derive(Clone)]
pub struct Dataset {
    core: Arc<DatasetCore>,
}

impl Dataset {
    /// Open a dataset at the given `path` with default
    /// options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Dataset> {
        Self::_open_ex(path.as_ref(), &DatasetOptions::default(), None)
    }

    /// Open a dataset with extended options. See
    /// [`GDALOpenEx`].
    ///
    /// With [`AccessMode::Create`] a new dataset is created by the first driver in
    /// `options.allowed_drivers`.
    ///
    /// [`GDALOpenEx`]: https://gdal.org/doxygen/gdal_8h.html#a9cb8585d0b3c16726b08e25bcc94274a
    pub fn open_ex<P: AsRef<Path>>(path: P, options: DatasetOptions) -> Result<Dataset> {
        Self::_open_ex(path.as_ref(), &options, None)
    }

    /// Opens a dataset from bytes held in memory.
    ///
    /// The bytes are lent to GDAL as an anonymous `/vsimem/` file that lives as long as
    /// the dataset.
    pub fn open_buffer(data: Vec<u8>, options: DatasetOptions) -> Result<Dataset> {
        let mem_file = vsi::lend_anonymous(data, None)?;
        match Self::_open_ex(&mem_file, &options, Some(mem_file.clone())) {
            Ok(dataset) => Ok(dataset),
            Err(e) => {
                let _ = vsi::unlink_mem_file(&mem_file);
                Err(e)
            }
        }
    }

    pub fn open_async<P: AsRef<Path>>(path: P) -> Pending<Dataset> {
        let path = path.as_ref().to_path_buf();
        work::spawn(move || Dataset::open(path))
    }

    pub fn open_ex_async<P: AsRef<Path>>(path: P, options: DatasetOptions) -> Pending<Dataset> {
        let path = path.as_ref().to_path_buf();
        work::spawn(move || Dataset::open_ex(path, options))
    }

    pub fn open_buffer_async(data: Vec<u8>, options: DatasetOptions) -> Pending<Dataset> {
        work::spawn(move || Dataset::open_buffer(data, options))
    }

    fn _open_ex(path: &Path, options: &DatasetOptions, mem_file: Option<PathBuf>) -> Result<Dataset> {
        _register_drivers();
        if options.mode == AccessMode::Create {
            return Self::_create(path, options);
        }

        let c_filename = _path_to_c_string(path)?;
        let mut c_open_flags = options.open_flags.bits() | GDAL_OF_VERBOSE_ERROR;
        if options.mode == AccessMode::Update {
            c_open_flags |= GDAL_OF_UPDATE;
        }

        // we need to keep the CStrings and the pointers around
        let c_drivers = CslStringList::try_from_strings(&options.allowed_drivers)?;
        let c_open_options = CslStringList::try_from_strings(&options.open_options)?;
        let c_sibling_files = CslStringList::try_from_strings(&options.sibling_files)?;

        let c_dataset = unsafe {
            gdal_sys::GDALOpenEx(
                c_filename.as_ptr(),
                c_open_flags,
                c_drivers.as_ptr() as *const *const c_char,
                c_open_options.as_ptr() as *const *const c_char,
                c_sibling_files.as_ptr() as *const *const c_char,
            )
        };
        if c_dataset.is_null() {
            return Err(GdalError::OpenError {
                path: path.display().to_string(),
                msg: _last_error_msg(),
            });
        }
        log::debug!("opened dataset {} ({:?})", path.display(), options.mode);
        Ok(Self::adopt(c_dataset, mem_file))
    }

    fn _create(path: &Path, options: &DatasetOptions) -> Result<Dataset> {
        let driver_name = options.allowed_drivers.first().ok_or_else(|| {
            GdalError::BadArgument("a driver name is required to create a dataset".to_string())
        })?;
        let driver = Driver::get_by_name(driver_name)?;
        let Some(raster) = &options.raster else {
            return driver.create_vector_only(path);
        };
        let creation_options = raster
            .options
            .iter()
            .map(|(key, value)| RasterCreationOption {
                key: key.as_str(),
                value: value.as_str(),
            })
            .collect::<Vec<_>>();
        driver.create_with_data_type(
            path,
            raster.size.0,
            raster.size.1,
            raster.band_count,
            raster.data_type.gdal_type(),
            &creation_options,
        )
    }

    /// Takes ownership of a freshly opened native dataset.
    pub(crate) fn adopt(c_dataset: GDALDatasetH, mem_file: Option<PathBuf>) -> Dataset {
        Dataset {
            core: DatasetCore::new(c_dataset, mem_file),
        }
    }

    pub(crate) fn from_core(core: Arc<DatasetCore>) -> Dataset {
        Dataset { core }
    }

    pub(crate) fn core(&self) -> &Arc<DatasetCore> {
        &self.core
    }

    /// Closes the native dataset.
    ///
    /// Every band, layer, feature and SQL result set obtained from this dataset is
    /// invalidated first. Calling `close` a second time fails with
    /// [`GdalError::AlreadyDestroyed`]. A native call still running on another
    /// thread is allowed to finish before the dataset closes.
    pub fn close(&self) -> Result<()> {
        self.core.close()
    }

    pub fn close_async(&self) -> Pending<()> {
        let dataset = self.clone();
        work::spawn(move || dataset.close())
    }

    pub fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }

    /// The spatial reference of the raster, or `None` if it has none.
    ///
    /// The returned value is a copy and stays valid after the dataset is closed.
    pub fn srs(&self) -> Result<Option<SpatialRef>> {
        self.core.with(|scope| {
            let c_srs = unsafe { gdal_sys::GDALGetSpatialRef(scope.c_dataset()) };
            if c_srs.is_null() {
                return Ok(None);
            }
            unsafe { SpatialRef::from_c_obj(c_srs) }.map(Some)
        })
    }

    pub fn srs_async(&self) -> Pending<Option<SpatialRef>> {
        work::spawn_guarded(self, |this| this.srs())
    }

    /// Sets the spatial reference of the raster; `None` clears it.
    pub fn set_srs(&self, srs: Option<&SpatialRef>) -> Result<()> {
        self.core.with(|scope| {
            let c_srs = srs.map_or(ptr::null_mut(), |srs| unsafe { srs.to_c_hsrs() });
            let rv = unsafe { gdal_sys::GDALSetSpatialRef(scope.c_dataset(), c_srs) };
            _cpl_result(rv, "GDALSetSpatialRef")
        })
    }

    pub fn set_srs_async(&self, srs: Option<SpatialRef>) -> Pending<()> {
        work::spawn_guarded(self, move |this| this.set_srs(srs.as_ref()))
    }

    /// `(width, height)` of the raster, or `None` for vector-only datasets.
    pub fn raster_size(&self) -> Result<Option<(usize, usize)>> {
        self.core.with(|scope| {
            let c_dataset = scope.c_dataset();
            let size_x = unsafe { gdal_sys::GDALGetRasterXSize(c_dataset) };
            let size_y = unsafe { gdal_sys::GDALGetRasterYSize(c_dataset) };
            let count = unsafe { gdal_sys::GDALGetRasterCount(c_dataset) };
            if count == 0 && size_x == 0 && size_y == 0 {
                Ok(None)
            } else {
                Ok(Some((size_x as usize, size_y as usize)))
            }
        })
    }

    pub fn raster_size_async(&self) -> Pending<Option<(usize, usize)>> {
        work::spawn_guarded(self, |this| this.raster_size())
    }

    pub fn driver(&self) -> Result<Driver> {
        self.core.with(|scope| unsafe {
            let c_driver = gdal_sys::GDALGetDatasetDriver(scope.c_dataset());
            Ok(Driver::from_c_driver(c_driver))
        })
    }

    pub fn driver_async(&self) -> Pending<Driver> {
        work::spawn_guarded(self, |this| this.driver())
    }

    /// Get affine transformation coefficients, or `None` if the dataset has none.
    ///
    /// x-coordinate of the top-left corner pixel (x-offset)
    /// width of a pixel (x-resolution)
    /// row rotation (typically zero)
    /// y-coordinate of the top-left corner pixel
    /// column rotation (typically zero)
    /// height of a pixel (y-resolution, typically negative)
    pub fn geo_transform(&self) -> Result<Option<GeoTransform>> {
        self.core.with(|scope| {
            let mut transformation = GeoTransform::default();
            let rv = unsafe {
                gdal_sys::GDALGetGeoTransform(scope.c_dataset(), transformation.as_mut_ptr())
            };
            if rv != CPLErr::CE_None {
                unsafe { gdal_sys::CPLErrorReset() };
                return Ok(None);
            }
            Ok(Some(transformation))
        })
    }

    pub fn geo_transform_async(&self) -> Pending<Option<GeoTransform>> {
        work::spawn_guarded(self, |this| this.geo_transform())
    }

    /// Set the affine transformation coefficients, in the order documented on
    /// [`Dataset::geo_transform`].
    pub fn set_geo_transform(&self, transformation: &GeoTransform) -> Result<()> {
        self.core.with(|scope| {
            let rv = unsafe {
                gdal_sys::GDALSetGeoTransform(scope.c_dataset(), transformation.as_ptr() as *mut f64)
            };
            _cpl_result(rv, "GDALSetGeoTransform")
        })
    }

    /// Writes all pending changes to disk.
    pub fn flush(&self) -> Result<()> {
        self.core.with(|scope| {
            #[cfg(any(major_ge_4, all(major_is_3, minor_ge_7)))]
            {
                let rv = unsafe { gdal_sys::GDALFlushCache(scope.c_dataset()) };
                _cpl_result(rv, "GDALFlushCache")
            }
            #[cfg(not(any(major_ge_4, all(major_is_3, minor_ge_7))))]
            {
                unsafe { gdal_sys::GDALFlushCache(scope.c_dataset()) };
                Ok(())
            }
        })
    }

    pub fn flush_async(&self) -> Pending<()> {
        work::spawn_guarded(self, |this| this.flush())
    }

    /// Files making up this dataset, including sidecar files.
    pub fn file_list(&self) -> Result<Vec<PathBuf>> {
        self.core.with(|scope| {
            let c_files = unsafe { gdal_sys::GDALGetFileList(scope.c_dataset()) };
            let files = _string_array(c_files);
            unsafe { gdal_sys::CSLDestroy(c_files) };
            Ok(files.into_iter().map(PathBuf::from).collect())
        })
    }

    pub fn file_list_async(&self) -> Pending<Vec<PathBuf>> {
        work::spawn_guarded(self, |this| this.file_list())
    }

    /// Whether the dataset supports an optional capability.
    pub fn test_capability(&self, capability: DatasetCapability) -> Result<bool> {
        self.core.with(|scope| {
            let rv = unsafe {
                gdal_sys::GDALDatasetTestCapability(
                    scope.c_dataset(),
                    capability.as_c_str().as_ptr(),
                )
            };
            Ok(rv == 1)
        })
    }

    pub fn test_capability_async(&self, capability: DatasetCapability) -> Pending<bool> {
        work::spawn_guarded(self, move |this| this.test_capability(capability))
    }

    /// Builds reduced resolution copies of the given bands (all bands when `bands`
    /// is empty) for each of the decimation `levels`.
    pub fn build_overviews(
        &self,
        resampling: ResampleAlg,
        levels: &[i32],
        bands: &[i32],
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        let c_resampling = CString::new(resampling.to_gdal_str())?;
        let mut progress = progress;
        let (pfn_progress, progress_data) = match progress.as_mut() {
            Some(callback) => (
                Some(progress_trampoline as unsafe extern "C" fn(_, _, _) -> _),
                callback as *mut ProgressFn as *mut c_void,
            ),
            None => (None, ptr::null_mut()),
        };
        self.core.with(|scope| {
            let rv = unsafe {
                gdal_sys::GDALBuildOverviews(
                    scope.c_dataset(),
                    c_resampling.as_ptr(),
                    levels.len() as c_int,
                    levels.as_ptr() as *mut c_int,
                    bands.len() as c_int,
                    bands.as_ptr() as *mut c_int,
                    pfn_progress,
                    progress_data,
                )
            };
            _cpl_result(rv, "GDALBuildOverviews")
        })
    }

    pub fn build_overviews_async(
        &self,
        resampling: ResampleAlg,
        levels: Vec<i32>,
        bands: Vec<i32>,
        progress: Option<ProgressFn>,
    ) -> Pending<()> {
        work::spawn_guarded(self, move |this| {
            this.build_overviews(resampling, &levels, &bands, progress)
        })
    }

    /// The raster bands of this dataset.
    pub fn bands(&self) -> DatasetBands {
        DatasetBands::new(self.clone())
    }

    /// The vector layers of this dataset.
    pub fn layers(&self) -> DatasetLayers {
        DatasetLayers::new(self.clone())
    }
}

unsafe extern "C" fn progress_trampoline(
    complete: f64,
    _message: *const c_char,
    data: *mut c_void,
) -> c_int {
    let callback = &mut *(data as *mut ProgressFn);
    // a panic must not unwind into GDAL
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(complete))) {
        Ok(()) => 1,
        Err(_) => {
            log::error!("progress callback panicked, cancelling");
            0
        }
    }
}

impl Guarded for Dataset {
    fn liveness(&self) -> &Liveness {
        self.core.liveness()
    }
}

impl Debug for Dataset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl MajorObject for Dataset {
    fn with_major_object<R>(&self, f: impl FnOnce(GDALMajorObjectH) -> Result<R>) -> Result<R> {
        self.core.with(|scope| f(scope.c_dataset()))
    }
}

impl Metadata for Dataset {}

crate::metadata::impl_metadata_async!(Dataset);

impl CslStringList {
    /// A list of the given strings, or an empty (NULL) list for none.
    pub(crate) fn try_from_strings(values: &[String]) -> Result<CslStringList> {
        let mut list = CslStringList::new();
        for value in values {
            list.add_string(value)?;
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_utils::{mem_raster, mem_vector, sample_tif, SuppressGDALErrorLog, TempFixture};

    #[test]
    fn test_access_mode_from_str() {
        assert_eq!("r".parse::<AccessMode>().unwrap(), AccessMode::ReadOnly);
        assert_eq!("r+".parse::<AccessMode>().unwrap(), AccessMode::Update);
        assert_eq!("w".parse::<AccessMode>().unwrap(), AccessMode::Create);
        assert!(matches!(
            "rw".parse::<AccessMode>(),
            Err(GdalError::BadArgument(_))
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let _nolog = SuppressGDALErrorLog::new();
        let err = Dataset::open("/no/such/file.tif").unwrap_err();
        match err {
            GdalError::OpenError { path, msg } => {
                assert_eq!(path, "/no/such/file.tif");
                assert!(msg.contains("No such file or directory"), "{msg}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_open_unrecognized_format() {
        let _nolog = SuppressGDALErrorLog::new();
        let err = Dataset::open_buffer(b"definitely not a raster".to_vec(), Default::default())
            .unwrap_err();
        match err {
            GdalError::OpenError { msg, .. } => {
                assert!(msg.contains("not recognized"), "{msg}")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_open_create_mode() {
        let options = DatasetOptions {
            raster: Some(RasterCreation::new((256, 256), 1, GdalDataType::BYTE)),
            ..DatasetOptions::with_mode(AccessMode::Create).driver("MEM")
        };
        let dataset = Dataset::open_ex("temp", options).unwrap();
        assert_eq!(dataset.raster_size().unwrap(), Some((256, 256)));
        assert_eq!(dataset.driver().unwrap().short_name(), "MEM");

        let err = Dataset::open_ex("temp", DatasetOptions::with_mode(AccessMode::Create));
        assert!(matches!(err, Err(GdalError::BadArgument(_))));
    }

    #[test]
    fn test_close_twice_fails() {
        let dataset = mem_raster(4, 4, 1);
        dataset.close().unwrap();
        assert!(dataset.is_destroyed());
        let err = dataset.close().unwrap_err();
        assert_eq!(err.to_string(), "Dataset object has already been destroyed");
    }

    #[test]
    fn test_accessors_fail_after_close() {
        let dataset = mem_raster(4, 4, 1);
        let clone = dataset.clone();
        dataset.close().unwrap();
        assert!(clone.raster_size().unwrap_err().is_already_destroyed());
        assert!(clone.srs().unwrap_err().is_already_destroyed());
        assert!(clone.geo_transform().unwrap_err().is_already_destroyed());
        assert!(clone.driver().unwrap_err().is_already_destroyed());
        assert!(clone
            .test_capability(DatasetCapability::CreateLayer)
            .unwrap_err()
            .is_already_destroyed());
        assert!(clone.bands().count().unwrap_err().is_already_destroyed());
        assert!(clone.layers().count().unwrap_err().is_already_destroyed());
    }

    #[test]
    fn test_srs_survives_close() {
        let (_path, dataset) = sample_tif();
        let srs = dataset.srs().unwrap().unwrap();
        dataset.close().unwrap();
        assert_eq!(srs.auth_code().unwrap(), 4326);
    }

    #[test]
    fn test_geo_transform() {
        let dataset = mem_raster(4, 4, 1);
        assert_eq!(dataset.geo_transform().unwrap(), None);
        let transform = [10.0, 0.5, 0.0, 20.0, 0.0, -0.5];
        dataset.set_geo_transform(&transform).unwrap();
        assert_eq!(dataset.geo_transform().unwrap(), Some(transform));
    }

    #[test]
    fn test_capabilities_and_srs_async() {
        let dataset = mem_vector();
        assert!(dataset
            .test_capability_async(DatasetCapability::CreateLayer)
            .wait()
            .unwrap());

        let raster = mem_raster(4, 4, 1);
        raster
            .set_srs_async(Some(SpatialRef::from_epsg(3857).unwrap()))
            .wait()
            .unwrap();
        assert_eq!(raster.srs().unwrap().unwrap().auth_code().unwrap(), 3857);
        raster.set_srs_async(None).wait().unwrap();
        assert!(raster.srs_async().wait().unwrap().is_none());

        dataset.close().unwrap();
        assert!(dataset
            .test_capability_async(DatasetCapability::DeleteLayer)
            .wait()
            .unwrap_err()
            .is_already_destroyed());
    }

    #[test]
    fn test_raster_size_of_vector_dataset() {
        let dataset = mem_vector();
        assert_eq!(dataset.raster_size().unwrap(), None);
        assert!(dataset.test_capability(DatasetCapability::CreateLayer).unwrap());
    }

    #[test]
    fn test_build_overviews_reports_progress() {
        let (_path, dataset) = sample_tif();
        dataset.close().unwrap();
        let dataset = Dataset::open_ex(
            _path.path(),
            DatasetOptions::with_mode(AccessMode::Update),
        )
        .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        dataset
            .build_overviews(
                ResampleAlg::Average,
                &[2, 4],
                &[],
                Some(Box::new(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
        assert!(calls.load(Ordering::SeqCst) > 0);
        let band = dataset.bands().get(1).unwrap();
        assert_eq!(band.overviews().count().unwrap(), 2);
    }

    #[test]
    fn test_file_list() {
        let (path, dataset) = sample_tif();
        let files = dataset.file_list().unwrap();
        assert_eq!(files, vec![path.path().to_path_buf()]);
    }

    #[test]
    fn test_open_async() {
        let (path, _dataset) = sample_tif();
        let dataset = Dataset::open_async(path.path()).wait().unwrap();
        assert_eq!(dataset.bands().count_async().wait().unwrap(), 1);
        dataset.close_async().wait().unwrap();
        assert!(dataset.is_destroyed());
    }

    #[test]
    fn test_on_disk_round_trip() {
        let fixture = TempFixture::empty("written.tif");
        let dataset = crate::Driver::get_by_name("GTiff")
            .unwrap()
            .create(fixture.path(), 6, 3, 1)
            .unwrap();
        dataset.bands().get(1).unwrap().fill(9.0).unwrap();
        dataset.close().unwrap();
        assert!(fixture.path().exists());

        let dataset = Dataset::open(&fixture).unwrap();
        assert_eq!(dataset.raster_size().unwrap(), Some((6, 3)));
        assert_eq!(dataset.file_list().unwrap(), vec![fixture.path().to_path_buf()]);
        let band = dataset.bands().get(1).unwrap();
        assert_eq!(band.pixels().get(5, 2).unwrap(), 9.0);
    }

    #[test]
    fn test_panicking_progress_cancels() {
        let (fixture, dataset) = sample_tif();
        dataset.close().unwrap();
        let dataset =
            Dataset::open_ex(fixture.path(), DatasetOptions::with_mode(AccessMode::Update)).unwrap();
        let _nolog = SuppressGDALErrorLog::new();
        let result = dataset.build_overviews(
            ResampleAlg::Nearest,
            &[2],
            &[],
            Some(Box::new(|_| panic!("progress failure"))),
        );
        assert!(result.is_err());
        // the dataset stays usable
        assert_eq!(dataset.raster_size().unwrap(), Some((400, 400)));
    }
}
