//! Process-wide GDAL configuration.
//!
//! GDAL reads its configuration options from the environment and from values set
//! at runtime through this module. Runtime values override the environment, apply
//! to every dataset opened afterwards and are never reset implicitly.
//!
//! ```
//! use gdal_async::config::*;
//!
//! // Skip request signing for public S3 buckets
//! set_config_option("AWS_NO_SIGN_REQUEST", "YES").unwrap();
//! assert_eq!(get_config_option("AWS_NO_SIGN_REQUEST", "").unwrap(), "YES");
//!
//! clear_config_option("AWS_NO_SIGN_REQUEST").unwrap();
//! assert_eq!(get_config_option("AWS_NO_SIGN_REQUEST", "NO").unwrap(), "NO");
//! ```
//!
//! This crate reads two options of its own when the async work queue is first used:
//! `GDAL_ASYNC_WORKERS` (number of worker threads, `0` runs async calls inline) and
//! `GDAL_ASYNC_QUEUE_DEPTH` (pending calls before queueing blocks).
//!
//! Refer to [GDAL `ConfigOptions`](https://gdal.org/user/configoptions.html) for
//! a full list of options.

use std::ffi::{c_char, c_void, CString};
use std::marker::PhantomData;
use std::ptr;
use std::str::FromStr;
use std::sync::LazyLock;

use gdal_sys::{CPLErr, CPLErrorNum, CPLGetErrorHandlerUserData};
use parking_lot::Mutex;

use crate::errors::{CplErrType, Result};
use crate::utils::{_opt_string, _string};

/// Where an option is stored.
#[derive(Clone, Copy)]
enum Reach {
    Process,
    Thread,
}

fn store(reach: Reach, key: &str, value: Option<&str>) -> Result<()> {
    let c_key = CString::new(key)?;
    let c_value = value.map(CString::new).transpose()?;
    let c_value_ptr = c_value.as_ref().map_or(ptr::null(), |v| v.as_ptr());
    match reach {
        Reach::Process => unsafe { gdal_sys::CPLSetConfigOption(c_key.as_ptr(), c_value_ptr) },
        Reach::Thread => unsafe {
            gdal_sys::CPLSetThreadLocalConfigOption(c_key.as_ptr(), c_value_ptr)
        },
    }
    Ok(())
}

fn lookup(reach: Reach, key: &str, default: Option<&str>) -> Result<Option<String>> {
    let c_key = CString::new(key)?;
    let c_default = default.map(CString::new).transpose()?;
    let c_default_ptr = c_default.as_ref().map_or(ptr::null(), |v| v.as_ptr());
    let rv = match reach {
        Reach::Process => unsafe { gdal_sys::CPLGetConfigOption(c_key.as_ptr(), c_default_ptr) },
        Reach::Thread => unsafe {
            gdal_sys::CPLGetThreadLocalConfigOption(c_key.as_ptr(), c_default_ptr)
        },
    };
    Ok(_opt_string(rv))
}

/// Sets a configuration option for the whole process.
pub fn set_config_option(key: &str, value: &str) -> Result<()> {
    store(Reach::Process, key, Some(value))
}

/// The value of a configuration option, or `default` when it is not set.
///
/// Thread-local values of the calling thread take precedence.
pub fn get_config_option(key: &str, default: &str) -> Result<String> {
    Ok(lookup(Reach::Process, key, Some(default))?.unwrap_or_default())
}

pub fn clear_config_option(key: &str) -> Result<()> {
    store(Reach::Process, key, None)
}

/// Sets a configuration option for the calling thread only.
pub fn set_thread_local_config_option(key: &str, value: &str) -> Result<()> {
    store(Reach::Thread, key, Some(value))
}

pub fn get_thread_local_config_option(key: &str, default: &str) -> Result<String> {
    Ok(lookup(Reach::Thread, key, Some(default))?.unwrap_or_default())
}

pub fn clear_thread_local_config_option(key: &str) -> Result<()> {
    store(Reach::Thread, key, None)
}

/// Reads one of this crate's numeric options; unset or malformed values give `None`.
pub(crate) fn crate_option<T: FromStr>(key: &str) -> Option<T> {
    match lookup(Reach::Process, key, None) {
        Ok(Some(value)) => match value.trim().parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                log::warn!("ignoring malformed value {value:?} of {key}");
                None
            }
        },
        _ => None,
    }
}

/// Sets a thread-local option for as long as the guard lives.
///
/// The previous thread-local value (or its absence) is restored on drop. Async calls
/// run on worker threads and do not see the option.
pub struct ThreadLocalConfigGuard {
    key: String,
    previous: Option<String>,
    // thread-local state must be restored on the same thread
    _not_send: PhantomData<*const ()>,
}

impl ThreadLocalConfigGuard {
    pub fn new(key: &str, value: &str) -> Result<Self> {
        let previous = lookup(Reach::Thread, key, None)?;
        set_thread_local_config_option(key, value)?;
        Ok(ThreadLocalConfigGuard {
            key: key.to_string(),
            previous,
            _not_send: PhantomData,
        })
    }
}

impl Drop for ThreadLocalConfigGuard {
    fn drop(&mut self) {
        let _ = match &self.previous {
            Some(previous) => set_thread_local_config_option(&self.key, previous),
            None => clear_thread_local_config_option(&self.key),
        };
    }
}

type ErrorCallbackType = dyn FnMut(CplErrType, i32, &str) + 'static + Send;
// We have to double-`Box` the type because we need two things:
// 1. A stable pointer for moving the data in and out of the `Mutex`. This is done by the outer `Box`.
// 2. A thin pointer to our Trait-`FnMut`. This is done by the inner (sized) `Box`. We cannot use `*mut dyn FnMut`
//    (a fat pointer) since we have to cast it from a `*mut c_void`, which is a thin pointer.
type PinnedErrorCallback = Box<Box<ErrorCallbackType>>;

/// The installed handler; GDAL only holds a pointer into it.
static ERROR_CALLBACK: LazyLock<Mutex<Option<PinnedErrorCallback>>> =
    LazyLock::new(Default::default);

/// Installs `callback` as GDAL's process-wide error handler, replacing any previous one.
///
/// The callback runs on whichever thread raised the message, which includes the
/// async worker threads, hence the `Send + Sync` bound.
pub fn set_error_handler<F>(callback: F)
where
    F: FnMut(CplErrType, i32, &str) + 'static + Send + Sync,
{
    unsafe extern "C" fn error_handler(
        error_type: CPLErr::Type,
        error_num: CPLErrorNum,
        error_msg_ptr: *const c_char,
    ) {
        let error_msg = _string(error_msg_ptr);
        let error_type: CplErrType = error_type.into();

        // reconstruct callback from user data pointer
        let callback_raw = CPLGetErrorHandlerUserData();
        let callback: &mut Box<ErrorCallbackType> = &mut *(callback_raw as *mut Box<_>);

        callback(error_type, error_num, &error_msg);
    }

    // pin memory location of callback for sending its pointer to GDAL
    let mut callback: PinnedErrorCallback = Box::new(Box::new(callback));

    let callback_ref: &mut Box<ErrorCallbackType> = callback.as_mut();

    let mut callback_lock = ERROR_CALLBACK.lock();

    // changing the error callback is fenced by the callback lock
    unsafe {
        gdal_sys::CPLSetErrorHandlerEx(Some(error_handler), callback_ref as *mut _ as *mut c_void);
    };

    // store callback in static variable so we avoid a dangling pointer
    callback_lock.replace(callback);
}

/// Restores GDAL's default handler, which prints to stderr.
pub fn remove_error_handler() {
    let mut callback_lock = ERROR_CALLBACK.lock();

    // changing the error callback is fenced by the callback lock
    unsafe {
        gdal_sys::CPLSetErrorHandler(None);
    };

    // drop callback
    callback_lock.take();
}

/// Forwards GDAL's messages to the [`log`] facade instead of stderr.
///
/// Failures are logged as errors, warnings as warnings and debug output at the debug
/// level, all under the `gdal` target.
pub fn route_errors_to_log() {
    set_error_handler(|class, number, msg| match class {
        CplErrType::Failure | CplErrType::Fatal => {
            log::error!(target: "gdal", "[{number}] {msg}")
        }
        CplErrType::Warning => log::warn!(target: "gdal", "[{number}] {msg}"),
        CplErrType::Debug => log::debug!(target: "gdal", "{msg}"),
        CplErrType::None => log::trace!(target: "gdal", "{msg}"),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    // Options are process-wide, so the scenarios run in sequence.
    #[test]
    fn test_config_options() {
        process_options();
        embedded_nul();
        thread_local_options();
        thread_local_guard();
        crate_options();
    }

    fn process_options() {
        set_config_option("AWS_NO_SIGN_REQUEST", "YES").unwrap();
        assert_eq!(get_config_option("AWS_NO_SIGN_REQUEST", "").unwrap(), "YES");
        assert_eq!(
            get_config_option("NON_EXISTANT_OPTION", "DEFAULT_VALUE").unwrap(),
            "DEFAULT_VALUE"
        );
        clear_config_option("AWS_NO_SIGN_REQUEST").unwrap();
        assert_eq!(get_config_option("AWS_NO_SIGN_REQUEST", "NO").unwrap(), "NO");
    }

    fn embedded_nul() {
        assert!(matches!(
            set_config_option("f\0oo", "valid"),
            Err(crate::errors::GdalError::FfiNulError(_))
        ));
        assert!(set_config_option("foo", "in\0valid").is_err());
        assert!(set_thread_local_config_option("xxxf\0oo", "in\0valid").is_err());
    }

    fn thread_local_options() {
        set_thread_local_config_option("GDAL_CACHEMAX", "128").unwrap();
        assert_eq!(get_thread_local_config_option("GDAL_CACHEMAX", "").unwrap(), "128");
        // thread-local values shadow the process value
        assert_eq!(get_config_option("GDAL_CACHEMAX", "").unwrap(), "128");
        let other = std::thread::spawn(|| get_thread_local_config_option("GDAL_CACHEMAX", "unset"))
            .join()
            .unwrap()
            .unwrap();
        assert_eq!(other, "unset");
        clear_thread_local_config_option("GDAL_CACHEMAX").unwrap();
        assert_eq!(
            get_thread_local_config_option("GDAL_CACHEMAX", "DEFAULT").unwrap(),
            "DEFAULT"
        );
    }

    fn thread_local_guard() {
        set_thread_local_config_option("USE_RRD", "NO").unwrap();
        {
            let _guard = ThreadLocalConfigGuard::new("USE_RRD", "YES").unwrap();
            assert_eq!(get_config_option("USE_RRD", "").unwrap(), "YES");
        }
        assert_eq!(get_thread_local_config_option("USE_RRD", "").unwrap(), "NO");
        clear_thread_local_config_option("USE_RRD").unwrap();

        {
            let _guard = ThreadLocalConfigGuard::new("USE_RRD", "YES").unwrap();
        }
        assert_eq!(get_thread_local_config_option("USE_RRD", "gone").unwrap(), "gone");
    }

    fn crate_options() {
        assert_eq!(crate_option::<usize>("GDAL_ASYNC_TEST_DEPTH"), None);
        set_config_option("GDAL_ASYNC_TEST_DEPTH", " 12 ").unwrap();
        assert_eq!(crate_option::<usize>("GDAL_ASYNC_TEST_DEPTH"), Some(12));
        set_config_option("GDAL_ASYNC_TEST_DEPTH", "lots").unwrap();
        assert_eq!(crate_option::<usize>("GDAL_ASYNC_TEST_DEPTH"), None);
        clear_config_option("GDAL_ASYNC_TEST_DEPTH").unwrap();
    }
}
