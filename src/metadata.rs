use std::ffi::{c_char, CString};
use std::ptr;

use gdal_sys::GDALMajorObjectH;

use crate::errors::*;
use crate::utils::{_cpl_result, _opt_string, _string, _string_array};

/// Gives the [`Metadata`] methods access to the underlying GDAL object.
///
/// The closure runs while the owning dataset is locked and known to be open.
pub trait MajorObject {
    fn with_major_object<R>(&self, f: impl FnOnce(GDALMajorObjectH) -> Result<R>) -> Result<R>;
}

/// General-purpose metadata storage of datasets, bands, layers and drivers.
///
/// Metadata are name/value pairs, grouped into domains. The default domain is named
/// by the empty string `""`.
///
/// # Example
///
/// ```rust, no_run
/// use gdal_async::{Dataset, Metadata};
/// # fn main() -> gdal_async::errors::Result<()> {
/// let dataset = Dataset::open("fixtures/tinymarble.tif")?;
/// println!("{:?}", dataset.metadata_item("AREA_OR_POINT", "")?);
/// # Ok(())
/// # }
/// ```
pub trait Metadata: MajorObject {
    /// Description of the object; for datasets usually the file name.
    fn description(&self) -> Result<String> {
        self.with_major_object(|c_obj| {
            Ok(_string(unsafe { gdal_sys::GDALGetDescription(c_obj) }))
        })
    }

    fn set_description(&self, description: &str) -> Result<()> {
        let c_description = CString::new(description)?;
        self.with_major_object(|c_obj| {
            unsafe { gdal_sys::GDALSetDescription(c_obj, c_description.as_ptr()) };
            Ok(())
        })
    }

    /// Names of all metadata domains of this object.
    fn metadata_domains(&self) -> Result<Vec<String>> {
        self.with_major_object(|c_obj| {
            let c_domains = unsafe { gdal_sys::GDALGetMetadataDomainList(c_obj) };
            let domains = _string_array(c_domains);
            unsafe { gdal_sys::CSLDestroy(c_domains) };
            Ok(domains)
        })
    }

    /// All `KEY=VALUE` items of one domain, or `None` if the domain is empty.
    fn metadata_domain(&self, domain: &str) -> Result<Option<Vec<String>>> {
        let c_domain = CString::new(domain)?;
        self.with_major_object(|c_obj| {
            let c_items = unsafe { gdal_sys::GDALGetMetadata(c_obj, c_domain.as_ptr()) };
            if c_items.is_null() {
                Ok(None)
            } else {
                Ok(Some(_string_array(c_items)))
            }
        })
    }

    fn metadata_item(&self, key: &str, domain: &str) -> Result<Option<String>> {
        let c_key = CString::new(key)?;
        let c_domain = CString::new(domain)?;
        self.with_major_object(|c_obj| {
            let c_res =
                unsafe { gdal_sys::GDALGetMetadataItem(c_obj, c_key.as_ptr(), c_domain.as_ptr()) };
            Ok(_opt_string(c_res))
        })
    }

    fn set_metadata_item(&self, key: &str, value: &str, domain: &str) -> Result<()> {
        let c_key = CString::new(key)?;
        let c_value = CString::new(value)?;
        let c_domain = CString::new(domain)?;
        self.with_major_object(|c_obj| {
            let rv = unsafe {
                gdal_sys::GDALSetMetadataItem(
                    c_obj,
                    c_key.as_ptr(),
                    c_value.as_ptr(),
                    c_domain.as_ptr(),
                )
            };
            _cpl_result(rv, "GDALSetMetadataItem")
        })
    }

    /// Replaces the whole `domain` with the given `KEY=VALUE` pairs.
    fn set_metadata(&self, items: &[(&str, &str)], domain: &str) -> Result<()> {
        let c_items = items
            .iter()
            .map(|(k, v)| CString::new(format!("{k}={v}")))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut c_ptrs: Vec<*mut c_char> = c_items.iter().map(|s| s.as_ptr() as *mut _).collect();
        c_ptrs.push(ptr::null_mut());
        let c_domain = CString::new(domain)?;
        self.with_major_object(|c_obj| {
            let rv =
                unsafe { gdal_sys::GDALSetMetadata(c_obj, c_ptrs.as_mut_ptr(), c_domain.as_ptr()) };
            _cpl_result(rv, "GDALSetMetadata")
        })
    }

    /// Every metadata item of every domain.
    fn metadata(&self) -> Result<Vec<MetadataEntry>> {
        let mut entries = Vec::new();
        for domain in self.metadata_domains()? {
            for item in self.metadata_domain(&domain)?.unwrap_or_default() {
                let (key, value) = item.split_once('=').unwrap_or((item.as_str(), ""));
                entries.push(MetadataEntry::new(domain.clone(), key.to_string(), value.to_string()));
            }
        }
        Ok(entries)
    }
}

/// Adds queued counterparts of the [`Metadata`] methods to a handle type.
macro_rules! impl_metadata_async {
    ($handle:ty) => {
        impl $handle {
            pub fn description_async(&self) -> $crate::work::Pending<String> {
                $crate::work::spawn_guarded(self, |this| $crate::Metadata::description(this))
            }

            pub fn set_description_async(&self, description: &str) -> $crate::work::Pending<()> {
                let description = description.to_owned();
                $crate::work::spawn_guarded(self, move |this| {
                    $crate::Metadata::set_description(this, &description)
                })
            }

            pub fn metadata_domains_async(&self) -> $crate::work::Pending<Vec<String>> {
                $crate::work::spawn_guarded(self, |this| $crate::Metadata::metadata_domains(this))
            }

            pub fn metadata_item_async(
                &self,
                key: &str,
                domain: &str,
            ) -> $crate::work::Pending<Option<String>> {
                let (key, domain) = (key.to_owned(), domain.to_owned());
                $crate::work::spawn_guarded(self, move |this| {
                    $crate::Metadata::metadata_item(this, &key, &domain)
                })
            }

            pub fn set_metadata_item_async(
                &self,
                key: &str,
                value: &str,
                domain: &str,
            ) -> $crate::work::Pending<()> {
                let (key, value, domain) = (key.to_owned(), value.to_owned(), domain.to_owned());
                $crate::work::spawn_guarded(self, move |this| {
                    $crate::Metadata::set_metadata_item(this, &key, &value, &domain)
                })
            }

            pub fn set_metadata_async(
                &self,
                items: Vec<(String, String)>,
                domain: &str,
            ) -> $crate::work::Pending<()> {
                let domain = domain.to_owned();
                $crate::work::spawn_guarded(self, move |this| {
                    let items: Vec<(&str, &str)> =
                        items.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                    $crate::Metadata::set_metadata(this, &items, &domain)
                })
            }

            pub fn metadata_async(
                &self,
            ) -> $crate::work::Pending<Vec<$crate::metadata::MetadataEntry>> {
                $crate::work::spawn_guarded(self, |this| $crate::Metadata::metadata(this))
            }
        }
    };
}

pub(crate) use impl_metadata_async;

/// One metadata item, as returned by [`Metadata::metadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub domain: String,
    pub key: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(domain: String, key: String, value: String) -> Self {
        Self { domain, key, value }
    }
}

#[cfg(test)]
mod tests {
    use super::MetadataEntry;
    use crate::test_utils::mem_raster;
    use crate::{Dataset, Metadata};

    #[test]
    fn test_set_and_get_metadata_item() {
        let dataset = mem_raster(8, 8, 1);
        dataset.set_metadata_item("FOO", "bar", "").unwrap();
        assert_eq!(dataset.metadata_item("FOO", "").unwrap().as_deref(), Some("bar"));
        assert_eq!(dataset.metadata_item("MISSING", "").unwrap(), None);
    }

    #[test]
    fn test_set_metadata_replaces_domain() {
        let dataset = mem_raster(8, 8, 1);
        dataset
            .set_metadata(&[("A", "1"), ("B", "2")], "custom")
            .unwrap();
        let items = dataset.metadata_domain("custom").unwrap().unwrap();
        assert_eq!(items, vec!["A=1".to_string(), "B=2".to_string()]);
        assert!(dataset
            .metadata()
            .unwrap()
            .iter()
            .any(|e| e.domain == "custom" && e.key == "B" && e.value == "2"));
    }

    #[test]
    fn test_description_after_close() {
        let dataset: Dataset = mem_raster(8, 8, 1);
        let band = dataset.bands().get(1).unwrap();
        band.set_description("elevation").unwrap();
        assert_eq!(band.description().unwrap(), "elevation");
        dataset.close().unwrap();
        assert!(band.description().unwrap_err().is_already_destroyed());
        assert!(dataset.description().unwrap_err().is_already_destroyed());
    }

    #[test]
    fn test_metadata_async() {
        let dataset = mem_raster(8, 8, 1);
        let band = dataset.bands().get(1).unwrap();
        band.set_metadata_item_async("STATISTICS_MEAN", "4.5", "")
            .wait()
            .unwrap();
        assert_eq!(
            band.metadata_item_async("STATISTICS_MEAN", "").wait().unwrap(),
            Some("4.5".to_string())
        );
        dataset
            .set_metadata_async(vec![("A".to_string(), "1".to_string())], "custom")
            .wait()
            .unwrap();
        assert!(dataset
            .metadata_async()
            .wait()
            .unwrap()
            .contains(&MetadataEntry::new("custom".into(), "A".into(), "1".into())));
        band.set_description_async("elevation").wait().unwrap();
        assert_eq!(band.description_async().wait().unwrap(), "elevation");

        dataset.close().unwrap();
        assert!(band
            .metadata_item_async("STATISTICS_MEAN", "")
            .wait()
            .unwrap_err()
            .is_already_destroyed());
        assert!(dataset
            .metadata_async()
            .wait()
            .unwrap_err()
            .is_already_destroyed());
    }
}
