//! Bridge between Rust byte buffers and GDAL's `/vsimem/` in-memory file system.
//!
//! * [`set`] hands a buffer to GDAL without copying; the crate keeps it alive until
//!   the file is [`release`]d or unlinked.
//! * [`copy`] gives GDAL its own copy of the bytes.
//! * [`release`] unlinks the file and returns its current contents.
//!
//! Files backing an open [`Dataset`](crate::Dataset) cannot be released or unlinked;
//! close the dataset first.
//!
//! ```rust, no_run
//! use gdal_async::{vsi, Dataset};
//!
//! # fn main() -> gdal_async::errors::Result<()> {
//! let bytes = std::fs::read("fixtures/tinymarble.tif").unwrap();
//! vsi::set("/vsimem/marble.tif", bytes)?;
//! let dataset = Dataset::open("/vsimem/marble.tif")?;
//! dataset.close()?;
//! let bytes = vsi::release("/vsimem/marble.tif")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use gdal_sys::{VSIFCloseL, VSIFileFromMemBuffer, VSIFree, VSIGetMemFileBuffer, VSIUnlink};
use parking_lot::Mutex;

use crate::errors::{GdalError, Result};
use crate::utils::{_last_null_pointer_err, _path_to_c_string, _string_array};

#[derive(Default)]
struct MemFiles {
    /// Buffers lent to GDAL by [`set`], keyed by their virtual path.
    lent: HashMap<PathBuf, Vec<u8>>,
    /// Number of open datasets reading each path.
    open: HashMap<PathBuf, usize>,
}

impl MemFiles {
    fn ensure_unused(&self, file_name: &Path) -> Result<()> {
        if self.open.contains_key(file_name) {
            return Err(GdalError::BadArgument(format!(
                "{} is still open in a dataset",
                file_name.display()
            )));
        }
        Ok(())
    }
}

static MEM_FILES: LazyLock<Mutex<MemFiles>> = LazyLock::new(Default::default);

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

/// Read the file names from a virtual file system with optional recursion.
pub fn read_dir<P: AsRef<Path>>(path: P, recursive: bool) -> Result<Vec<PathBuf>> {
    _read_dir(path.as_ref(), recursive)
}

fn _read_dir(path: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let path = _path_to_c_string(path)?;
    let data = if recursive {
        let data = unsafe { gdal_sys::VSIReadDirRecursive(path.as_ptr()) };
        if data.is_null() {
            return Err(_last_null_pointer_err("VSIReadDirRecursive"));
        }
        data
    } else {
        let data = unsafe { gdal_sys::VSIReadDir(path.as_ptr()) };
        if data.is_null() {
            return Err(_last_null_pointer_err("VSIReadDir"));
        }
        data
    };

    let strings = _string_array(data);
    unsafe { gdal_sys::CSLDestroy(data) };
    Ok(strings.into_iter().map(PathBuf::from).collect())
}

/// Lends `data` to GDAL as the in-memory file `file_name` without copying it.
///
/// The buffer stays alive until the file is [`release`]d or [`unlink_mem_file`]d.
/// GDAL cannot grow a lent buffer, so writes past its end fail.
pub fn set<P: AsRef<Path>>(file_name: P, data: Vec<u8>) -> Result<()> {
    _set(file_name.as_ref(), data)
}

fn _set(file_name: &Path, mut data: Vec<u8>) -> Result<()> {
    let c_file_name = _path_to_c_string(file_name)?;
    let mut files = MEM_FILES.lock();
    if files.lent.contains_key(file_name) {
        return Err(GdalError::BadArgument(format!(
            "{} is already backed by a lent buffer",
            file_name.display()
        )));
    }

    let handle = unsafe {
        VSIFileFromMemBuffer(
            c_file_name.as_ptr(),
            data.as_mut_ptr(),
            data.len() as u64,
            false as i32,
        )
    };
    if handle.is_null() {
        return Err(_last_null_pointer_err("VSIFileFromMemBuffer"));
    }
    unsafe {
        VSIFCloseL(handle);
    }

    // moving the Vec does not move its heap allocation
    files.lent.insert(file_name.to_path_buf(), data);
    Ok(())
}

/// Creates the in-memory file `file_name` holding a GDAL-owned copy of `data`.
pub fn copy<P: AsRef<Path>>(file_name: P, data: &[u8]) -> Result<()> {
    _copy(file_name.as_ref(), data)
}

fn _copy(file_name: &Path, data: &[u8]) -> Result<()> {
    let c_file_name = _path_to_c_string(file_name)?;

    let buffer = unsafe { gdal_sys::VSIMalloc(data.len().max(1)) }.cast::<u8>();
    if buffer.is_null() {
        return Err(_last_null_pointer_err("VSIMalloc"));
    }
    unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), buffer, data.len()) };

    let handle = unsafe {
        VSIFileFromMemBuffer(c_file_name.as_ptr(), buffer, data.len() as u64, true as i32)
    };
    if handle.is_null() {
        unsafe { VSIFree(buffer.cast()) };
        return Err(_last_null_pointer_err("VSIFileFromMemBuffer"));
    }
    unsafe {
        VSIFCloseL(handle);
    }
    Ok(())
}

/// Creates a new VSIMemFile from a given buffer.
///
/// Same as [`copy`], for callers that already own a `Vec`.
pub fn create_mem_file<P: AsRef<Path>>(file_name: P, data: Vec<u8>) -> Result<()> {
    _copy(file_name.as_ref(), &data)
}

/// Unlinks the in-memory file `file_name` and returns its current contents.
///
/// Works for files created through [`set`], [`copy`] and for files GDAL wrote itself.
/// Fails with [`GdalError::BadArgument`] while a dataset still has the file open.
pub fn release<P: AsRef<Path>>(file_name: P) -> Result<Vec<u8>> {
    _release(file_name.as_ref())
}

fn _release(file_name: &Path) -> Result<Vec<u8>> {
    let c_file_name = _path_to_c_string(file_name)?;
    let mut files = MEM_FILES.lock();
    files.ensure_unused(file_name)?;

    let mut length: u64 = 0;
    let bytes = unsafe { VSIGetMemFileBuffer(c_file_name.as_ptr(), &mut length, true as i32) };
    if bytes.is_null() {
        return Err(GdalError::NotFound(format!(
            "{} is not an in-memory file",
            file_name.display()
        )));
    }
    let length = length as usize;

    match files.lent.remove(file_name) {
        Some(mut data) if data.as_ptr() == bytes as *const u8 && length <= data.len() => {
            data.truncate(length);
            Ok(data)
        }
        Some(_) => Ok(unsafe { std::slice::from_raw_parts(bytes, length) }.to_vec()),
        None => {
            let owned = unsafe { std::slice::from_raw_parts(bytes, length) }.to_vec();
            unsafe { VSIFree(bytes.cast()) };
            Ok(owned)
        }
    }
}

/// Unlink a VSIMemFile.
///
/// A buffer lent with [`set`] is dropped with it. Fails with [`GdalError::BadArgument`]
/// while a dataset still has the file open.
pub fn unlink_mem_file<P: AsRef<Path>>(file_name: P) -> Result<()> {
    _unlink_mem_file(file_name.as_ref())
}

fn _unlink_mem_file(file_name: &Path) -> Result<()> {
    let file_name_c = _path_to_c_string(file_name)?;
    let mut files = MEM_FILES.lock();
    files.ensure_unused(file_name)?;

    let rv = unsafe { VSIUnlink(file_name_c.as_ptr()) };

    if rv != 0 {
        return Err(GdalError::UnlinkMemFile {
            file_name: file_name.display().to_string(),
        });
    }
    files.lent.remove(file_name);

    Ok(())
}

/// Marks `paths` as read by a newly opened dataset.
pub(crate) fn pin(paths: &[PathBuf]) {
    let mut files = MEM_FILES.lock();
    for path in paths {
        *files.open.entry(path.clone()).or_default() += 1;
    }
}

/// Undoes [`pin`] once the dataset is closed.
pub(crate) fn unpin(paths: &[PathBuf]) {
    let mut files = MEM_FILES.lock();
    for path in paths {
        if let Some(count) = files.open.get_mut(path) {
            *count -= 1;
            if *count == 0 {
                files.open.remove(path);
            }
        }
    }
}

/// Lends `data` to GDAL under a fresh `/vsimem/` path and returns that path.
pub(crate) fn lend_anonymous(data: Vec<u8>, extension: Option<&str>) -> Result<PathBuf> {
    let id = NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed);
    let mut file_name = PathBuf::from(format!("/vsimem/gdal_async/buffer_{id}"));
    if let Some(extension) = extension {
        file_name.set_extension(extension);
    }
    _set(&file_name, data)?;
    Ok(file_name)
}

/// Drops a buffer that a dataset opened from memory no longer needs.
pub(crate) fn release_owned(file_name: &Path) -> Result<()> {
    _unlink_mem_file(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_release_mem_file() {
        let file_name = "/vsimem/525ebf24-a030-4677-bb4e-a921741cabe0";

        set(file_name, vec![1_u8, 2, 3, 4]).unwrap();
        let bytes = release(file_name).unwrap();
        assert_eq!(bytes, vec![1_u8, 2, 3, 4]);

        // mem file must not be there anymore
        assert_eq!(
            unlink_mem_file(file_name),
            Err(GdalError::UnlinkMemFile {
                file_name: file_name.to_string()
            })
        );
    }

    #[test]
    fn copy_and_release_mem_file() {
        let file_name = "/vsimem/ee08caf2-a510-4b21-a4c4-44c1ebd763c8";

        let data = vec![1_u8, 2, 3, 4];
        copy(file_name, &data).unwrap();
        assert_eq!(release(file_name).unwrap(), data);
    }

    #[test]
    fn set_twice_fails() {
        let file_name = "/vsimem/bbf5f1d6-c1e9-4469-a33b-02cd9173132d";

        set(file_name, vec![1_u8, 2, 3, 4]).unwrap();
        assert!(matches!(
            set(file_name, vec![5_u8]),
            Err(GdalError::BadArgument(_))
        ));
        unlink_mem_file(file_name).unwrap();
        assert!(!MEM_FILES.lock().lent.contains_key(Path::new(file_name)));
    }

    #[test]
    fn pinned_files_stay_alive() {
        let file_name = "/vsimem/3f1e0b1c-6a55-4a4e-9d0f-1b6a0c3f9e21";
        let pinned = [PathBuf::from(file_name)];

        set(file_name, vec![9_u8; 16]).unwrap();
        pin(&pinned);
        pin(&pinned);
        assert!(matches!(unlink_mem_file(file_name), Err(GdalError::BadArgument(_))));
        assert!(matches!(release(file_name), Err(GdalError::BadArgument(_))));

        unpin(&pinned);
        assert!(release(file_name).is_err());
        unpin(&pinned);
        assert_eq!(release(file_name).unwrap(), vec![9_u8; 16]);
    }

    #[test]
    fn release_of_regular_path_fails() {
        assert!(matches!(
            release("/tmp/not-in-memory.tif"),
            Err(GdalError::NotFound(_))
        ));
    }

    #[test]
    fn unable_to_create() {
        let file_name = "";

        assert_eq!(
            create_mem_file(file_name, vec![1_u8, 2, 3, 4]),
            Err(GdalError::NullPointer {
                method_name: "VSIFileFromMemBuffer",
                msg: "".to_string(),
            })
        );

        assert_eq!(
            unlink_mem_file(file_name),
            Err(GdalError::UnlinkMemFile {
                file_name: "".to_string()
            })
        );
    }

    #[test]
    fn test_vsi_read_dir() {
        copy("/vsimem/read_dir_test/a.txt", b"a").unwrap();
        copy("/vsimem/read_dir_test/b.txt", b"b").unwrap();

        let mut files = read_dir("/vsimem/read_dir_test", false).unwrap();
        files.sort();
        assert_eq!(files, [Path::new("a.txt"), Path::new("b.txt")]);

        release("/vsimem/read_dir_test/a.txt").unwrap();
        release("/vsimem/read_dir_test/b.txt").unwrap();

        // Attempting to read a missing directory returns error.
        assert!(read_dir("/vsimem/read_dir_missing", false).is_err());
    }
}
