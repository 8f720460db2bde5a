use gdal_sys::{self, CPLErr, OGRErr};
use std::ffi::{c_char, CStr, CString};
use std::path::Path;

use crate::errors::*;

pub fn _string(raw_ptr: *const c_char) -> String {
    let c_str = unsafe { CStr::from_ptr(raw_ptr) };
    c_str.to_string_lossy().into_owned()
}

/// Like [`_string`], but `None` for a NULL pointer.
pub fn _opt_string(raw_ptr: *const c_char) -> Option<String> {
    if raw_ptr.is_null() {
        None
    } else {
        Some(_string(raw_ptr))
    }
}

pub fn _string_array(raw_ptr: *mut *mut c_char) -> Vec<String> {
    let mut ret_val: Vec<String> = vec![];
    if raw_ptr.is_null() {
        return ret_val;
    }
    let mut i = 0;
    unsafe {
        loop {
            let next = raw_ptr.add(i).read();
            if next.is_null() {
                break;
            }
            ret_val.push(_string(next));
            i += 1;
        }
    }
    ret_val
}

/// Takes ownership of a string allocated by GDAL and frees it.
pub fn _owned_string(raw_ptr: *mut c_char) -> String {
    let value = _string(raw_ptr);
    unsafe { gdal_sys::VSIFree(raw_ptr.cast()) };
    value
}

pub fn _last_cpl_err(cpl_err_class: CPLErr::Type) -> GdalError {
    let last_err_no = unsafe { gdal_sys::CPLGetLastErrorNo() };
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
    unsafe { gdal_sys::CPLErrorReset() };
    GdalError::from_cpl(cpl_err_class.into(), last_err_no, last_err_msg)
}

/// Turns the return code of a CPLErr-returning call into a `Result`.
///
/// Warnings do not fail the operation; they are logged and the error state is reset.
pub fn _cpl_result(rv: CPLErr::Type, method_name: &'static str) -> Result<()> {
    match rv {
        CPLErr::CE_None => Ok(()),
        CPLErr::CE_Warning | CPLErr::CE_Debug => {
            let msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
            unsafe { gdal_sys::CPLErrorReset() };
            log::warn!("{method_name}: {msg}");
            Ok(())
        }
        _ => Err(_last_cpl_err(rv)),
    }
}

pub fn _ogr_result(rv: OGRErr::Type, method_name: &'static str) -> Result<()> {
    if rv == OGRErr::OGRERR_NONE {
        Ok(())
    } else {
        Err(GdalError::OgrError {
            err: rv,
            method_name,
        })
    }
}

pub fn _last_null_pointer_err(method_name: &'static str) -> GdalError {
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
    unsafe { gdal_sys::CPLErrorReset() };
    GdalError::NullPointer {
        method_name,
        msg: last_err_msg,
    }
}

/// The last message GDAL recorded on this thread, resetting it.
pub fn _last_error_msg() -> String {
    let msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
    unsafe { gdal_sys::CPLErrorReset() };
    msg
}

pub fn _path_to_c_string<P: AsRef<Path>>(path: P) -> Result<CString> {
    let path_ref: &Path = path.as_ref();
    let path_str = path_ref.to_string_lossy();
    CString::new(path_str.as_ref()).map_err(Into::into)
}
