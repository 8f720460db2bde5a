use std::ffi::{c_char, c_int, CString};
use std::path::Path;
use std::ptr::{self, null_mut};
use std::sync::Once;

use gdal_sys::{self, CSLSetNameValue, GDALDriverH, GDALMajorObjectH};

use crate::dataset::Dataset;
use crate::errors::*;
use crate::metadata::{MajorObject, Metadata};
use crate::raster::{GdalType, RasterCreationOption};
use crate::utils::{_cpl_result, _last_null_pointer_err, _path_to_c_string, _string};

static START: Once = Once::new();

pub fn _register_drivers() {
    START.call_once(|| unsafe {
        gdal_sys::GDALAllRegister();
    });
}

/// A format driver, such as `GTiff`, `MEM` or `ESRI Shapefile`.
///
/// Drivers are owned by GDAL's driver manager and live for the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Driver {
    c_driver: GDALDriverH,
}

// Driver handles are registered once and never freed while the process runs.
unsafe impl Send for Driver {}
unsafe impl Sync for Driver {}

impl Driver {
    /// Returns the driver with the given short name, e.g. `"GTiff"`.
    pub fn get_by_name(name: &str) -> Result<Driver> {
        _register_drivers();
        let c_name = CString::new(name)?;
        let c_driver = unsafe { gdal_sys::GDALGetDriverByName(c_name.as_ptr()) };
        if c_driver.is_null() {
            return Err(GdalError::NotFound(format!("driver '{name}' is not registered")));
        };
        Ok(Driver { c_driver })
    }

    /// Creates a new Driver object by wrapping a C pointer
    ///
    /// # Safety
    /// This method operates on a raw C pointer
    pub unsafe fn from_c_driver(c_driver: GDALDriverH) -> Driver {
        Driver { c_driver }
    }

    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_driver(&self) -> GDALDriverH {
        self.c_driver
    }

    pub fn short_name(&self) -> String {
        let rv = unsafe { gdal_sys::GDALGetDriverShortName(self.c_driver) };
        _string(rv)
    }

    pub fn long_name(&self) -> String {
        let rv = unsafe { gdal_sys::GDALGetDriverLongName(self.c_driver) };
        _string(rv)
    }

    /// Create a new dataset of size (`size_x`, `size_y`) and `bands` band count,
    /// and [`u8`] as the cell data type.
    pub fn create<P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
    ) -> Result<Dataset> {
        self.create_with_band_type::<u8, _>(filename, size_x, size_y, bands)
    }

    /// Create a new dataset with the cell data type of `T`.
    pub fn create_with_band_type<T: GdalType, P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
    ) -> Result<Dataset> {
        self.create_with_band_type_with_options::<T, _>(filename, size_x, size_y, bands, &[])
    }

    /// Create a new dataset with the cell data type of `T` and driver specific
    /// creation options.
    pub fn create_with_band_type_with_options<T: GdalType, P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
        options: &[RasterCreationOption],
    ) -> Result<Dataset> {
        self.create_with_data_type(
            filename.as_ref(),
            size_x,
            size_y,
            bands,
            T::gdal_type(),
            options,
        )
    }

    pub(crate) fn create_with_data_type(
        &self,
        filename: &Path,
        size_x: usize,
        size_y: usize,
        bands: usize,
        data_type: gdal_sys::GDALDataType::Type,
        options: &[RasterCreationOption],
    ) -> Result<Dataset> {
        let mut options_c = CslStringList::new();
        for option in options {
            options_c.set_name_value(option.key, option.value)?;
        }

        let c_filename = _path_to_c_string(filename)?;
        let c_dataset = unsafe {
            gdal_sys::GDALCreate(
                self.c_driver,
                c_filename.as_ptr(),
                size_x as c_int,
                size_y as c_int,
                bands as c_int,
                data_type,
                options_c.as_ptr(),
            )
        };

        if c_dataset.is_null() {
            return Err(_last_null_pointer_err("GDALCreate"));
        };
        log::debug!(
            "created {} dataset {}",
            self.short_name(),
            filename.display()
        );

        Ok(Dataset::adopt(c_dataset, None))
    }

    /// Convenience for creating a vector-only dataset from a compatible driver.
    pub fn create_vector_only<P: AsRef<Path>>(&self, filename: P) -> Result<Dataset> {
        self.create_with_band_type::<u8, _>(filename, 0, 0, 0)
    }

    /// Copies `source` into a new dataset written by this driver.
    pub fn create_copy<P: AsRef<Path>>(
        &self,
        source: &Dataset,
        filename: P,
        options: &[RasterCreationOption],
    ) -> Result<Dataset> {
        let mut options_c = CslStringList::new();
        for option in options {
            options_c.set_name_value(option.key, option.value)?;
        }
        let c_filename = _path_to_c_string(filename)?;
        let c_dataset = source.core().with(|scope| {
            let c_dataset = unsafe {
                gdal_sys::GDALCreateCopy(
                    self.c_driver,
                    c_filename.as_ptr(),
                    scope.c_dataset(),
                    0,
                    options_c.as_ptr(),
                    None,
                    ptr::null_mut(),
                )
            };
            if c_dataset.is_null() {
                return Err(_last_null_pointer_err("GDALCreateCopy"));
            }
            Ok(c_dataset)
        })?;
        Ok(Dataset::adopt(c_dataset, None))
    }

    /// Deletes the dataset at `filename` together with its sidecar files.
    pub fn delete_dataset<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        let c_filename = _path_to_c_string(filename)?;
        let rv = unsafe { gdal_sys::GDALDeleteDataset(self.c_driver, c_filename.as_ptr()) };
        _cpl_result(rv, "GDALDeleteDataset")
    }
}

impl MajorObject for Driver {
    fn with_major_object<R>(&self, f: impl FnOnce(GDALMajorObjectH) -> Result<R>) -> Result<R> {
        f(self.c_driver)
    }
}

impl Metadata for Driver {}

/// Access to the process-wide list of registered drivers.
pub struct DriverManager;

impl DriverManager {
    /// Number of registered drivers.
    pub fn count() -> usize {
        _register_drivers();
        let count = unsafe { gdal_sys::GDALGetDriverCount() };
        count as usize
    }

    pub fn get_driver(index: usize) -> Result<Driver> {
        _register_drivers();
        let c_driver = unsafe { gdal_sys::GDALGetDriver(index as c_int) };
        if c_driver.is_null() {
            return Err(GdalError::OutOfRange(format!(
                "driver index {index} is out of range"
            )));
        }
        Ok(Driver { c_driver })
    }

    pub fn get_driver_by_name(name: &str) -> Result<Driver> {
        Driver::get_by_name(name)
    }

    /// Every registered driver, in registration order.
    pub fn all() -> Vec<Driver> {
        (0..Self::count())
            .filter_map(|index| Self::get_driver(index).ok())
            .collect()
    }

    /// Registers all drivers known to the linked GDAL build. Runs once per process.
    pub fn register_all() {
        _register_drivers();
    }
}

/// Wraps a `char **papszStrList` pointer into a struct that
/// automatically destroys the allocated memory on `drop`.
#[derive(Debug)]
pub struct CslStringList {
    list_ptr: *mut *mut c_char,
}

impl CslStringList {
    pub fn new() -> Self {
        Self {
            list_ptr: null_mut(),
        }
    }

    /// Assign `value` to `name` in StringList.
    /// Overrides duplicate `name`s.
    pub fn set_name_value(&mut self, name: &str, value: &str) -> Result<()> {
        let psz_name = CString::new(name)?;
        let psz_value = CString::new(value)?;

        unsafe {
            self.list_ptr = CSLSetNameValue(self.list_ptr, psz_name.as_ptr(), psz_value.as_ptr());
        }

        Ok(())
    }

    /// Appends a raw string, such as `"-b"` or `"KEY=VALUE"`.
    pub fn add_string(&mut self, value: &str) -> Result<()> {
        let psz_value = CString::new(value)?;
        unsafe {
            self.list_ptr = gdal_sys::CSLAddString(self.list_ptr, psz_value.as_ptr());
        }
        Ok(())
    }

    /// Looks up the value stored for `name`.
    pub fn fetch_name_value(&self, name: &str) -> Result<Option<String>> {
        let psz_name = CString::new(name)?;
        let c_value = unsafe { gdal_sys::CSLFetchNameValue(self.list_ptr, psz_name.as_ptr()) };
        Ok(crate::utils::_opt_string(c_value))
    }

    pub fn len(&self) -> usize {
        (unsafe { gdal_sys::CSLCount(self.list_ptr) }) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_ptr(&self) -> gdal_sys::CSLConstList {
        self.list_ptr
    }
}

impl Default for CslStringList {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&[&str]> for CslStringList {
    type Error = GdalError;

    fn try_from(values: &[&str]) -> Result<Self> {
        let mut list = CslStringList::new();
        for value in values {
            list.add_string(value)?;
        }
        Ok(list)
    }
}

impl Drop for CslStringList {
    fn drop(&mut self) {
        unsafe { gdal_sys::CSLDestroy(self.list_ptr) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_driver_by_name() {
        let driver = Driver::get_by_name("GTiff").unwrap();
        assert_eq!(driver.short_name(), "GTiff");
        assert_eq!(driver.long_name(), "GeoTIFF");
        assert!(matches!(
            Driver::get_by_name("no-such-driver"),
            Err(GdalError::NotFound(_))
        ));
    }

    #[test]
    fn test_driver_manager() {
        assert!(DriverManager::count() > 0);
        let all = DriverManager::all();
        assert_eq!(all.len(), DriverManager::count());
        assert!(all.iter().any(|d| d.short_name() == "MEM"));
        assert!(DriverManager::get_driver(100_000).is_err());
    }

    #[test]
    fn test_driver_metadata() {
        let driver = Driver::get_by_name("GTiff").unwrap();
        let extension = driver.metadata_item("DMD_EXTENSION", "").unwrap();
        assert_eq!(extension.as_deref(), Some("tif"));
    }

    #[test]
    fn test_csl_string_list() {
        let mut list = CslStringList::new();
        assert!(list.is_empty());
        list.set_name_value("COMPRESS", "LZW").unwrap();
        list.set_name_value("COMPRESS", "DEFLATE").unwrap();
        list.add_string("TILED=YES").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(
            list.fetch_name_value("COMPRESS").unwrap().as_deref(),
            Some("DEFLATE")
        );
        assert_eq!(list.fetch_name_value("TILED").unwrap().as_deref(), Some("YES"));
        assert!(list.set_name_value("BAD\0KEY", "x").is_err());
    }

    #[test]
    fn test_create_and_delete_dataset() {
        let driver = Driver::get_by_name("GTiff").unwrap();
        let path = "/vsimem/driver_create_delete.tif";
        let dataset = driver.create(path, 16, 8, 2).unwrap();
        assert_eq!(dataset.raster_size().unwrap(), Some((16, 8)));
        assert_eq!(dataset.bands().count().unwrap(), 2);
        dataset.close().unwrap();
        driver.delete_dataset(path).unwrap();
    }
}
