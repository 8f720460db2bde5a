use std::ffi::{c_int, IntoStringError, NulError};
use std::str::Utf8Error;

use gdal_sys::{CPLErr, OGRErr, OGRFieldType};
use thiserror::Error;

// CPLErrorNum values from cpl_error.h
const CPLE_ILLEGAL_ARG: c_int = 5;
const CPLE_NOT_SUPPORTED: c_int = 6;
const CPLE_NO_WRITE_ACCESS: c_int = 8;

pub type Result<T> = std::result::Result<T, GdalError>;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum GdalError {
    #[error("FfiNulError")]
    FfiNulError(#[from] NulError),
    #[error("FfiIntoStringError")]
    FfiIntoStringError(#[from] IntoStringError),
    #[error("StrUtf8Error")]
    StrUtf8Error(#[from] Utf8Error),
    #[error("CPL error class: '{class:?}', error number: '{number}', error msg: '{msg}'")]
    CplError {
        class: CplErrType,
        number: c_int,
        msg: String,
    },
    #[error("GDAL method '{method_name}' returned a NULL pointer. Error msg: '{msg}'")]
    NullPointer {
        method_name: &'static str,
        msg: String,
    },
    #[error("OGR method '{method_name}' returned error: '{err:?}'")]
    OgrError {
        err: OGRErr::Type,
        method_name: &'static str,
    },
    #[error("{kind} object has already been destroyed")]
    AlreadyDestroyed { kind: &'static str },
    #[error("Out of range: {0}")]
    OutOfRange(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Unable to open '{path}': {msg}")]
    OpenError { path: String, msg: String },
    #[error("Bad argument: {0}")]
    BadArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid field name '{field_name}' used on method {method_name}")]
    InvalidFieldName {
        field_name: String,
        method_name: &'static str,
    },
    #[error("Invalid field index {index} used on method {method_name}")]
    InvalidFieldIndex {
        index: usize,
        method_name: &'static str,
    },
    #[error("Unhandled type '{field_type:?}' on OGR method {method_name}")]
    UnhandledFieldType {
        field_type: OGRFieldType::Type,
        method_name: &'static str,
    },
    #[error("Unable to unlink mem file: {file_name}")]
    UnlinkMemFile { file_name: String },
    #[error("Worker pool is shut down, the operation was never run")]
    WorkerPoolClosed,
}

impl GdalError {
    /// Builds the structured kind matching a CPL error number, keeping
    /// GDAL's message.
    pub(crate) fn from_cpl(class: CplErrType, number: c_int, msg: String) -> Self {
        match number {
            CPLE_NOT_SUPPORTED | CPLE_NO_WRITE_ACCESS => GdalError::Unsupported(msg),
            CPLE_ILLEGAL_ARG => GdalError::BadArgument(msg),
            _ => GdalError::CplError { class, number, msg },
        }
    }

    /// Whether this error reports use of a closed or removed handle.
    pub fn is_already_destroyed(&self) -> bool {
        matches!(self, GdalError::AlreadyDestroyed { .. })
    }
}

/// Severity of a message emitted by GDAL.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CplErrType {
    None = 0,
    Debug = 1,
    Warning = 2,
    Failure = 3,
    Fatal = 4,
}

impl From<CPLErr::Type> for CplErrType {
    fn from(error_type: CPLErr::Type) -> Self {
        match error_type {
            CPLErr::CE_Debug => Self::Debug,
            CPLErr::CE_Warning => Self::Warning,
            CPLErr::CE_Failure => Self::Failure,
            CPLErr::CE_Fatal => Self::Fatal,
            _ => Self::None,
        }
    }
}
