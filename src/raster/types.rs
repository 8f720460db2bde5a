use std::fmt::{Display, Formatter};

pub use gdal_sys::GDALDataType;
use gdal_sys::{
    GDALDataTypeIsFloating, GDALDataTypeIsInteger, GDALDataTypeIsSigned, GDALGetDataTypeByName,
    GDALGetDataTypeName, GDALGetDataTypeSizeBits, GDALGetDataTypeSizeBytes,
};

use crate::errors::{GdalError, Result};
use crate::utils::_string;

/// Type-level constraint for limiting which primitive numeric values can be passed
/// to functions needing target data type.
pub trait GdalType: Copy + Default + Send + 'static {
    fn gdal_type() -> GDALDataType::Type;

    fn datatype() -> GdalDataType {
        GdalDataType(Self::gdal_type())
    }
}

impl GdalType for u8 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_Byte
    }
}

impl GdalType for u16 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_UInt16
    }
}

impl GdalType for u32 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_UInt32
    }
}

#[cfg(any(major_ge_4, all(major_is_3, minor_ge_5)))]
impl GdalType for u64 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_UInt64
    }
}

impl GdalType for i16 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_Int16
    }
}

impl GdalType for i32 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_Int32
    }
}

#[cfg(any(major_ge_4, all(major_is_3, minor_ge_5)))]
impl GdalType for i64 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_Int64
    }
}

impl GdalType for f32 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_Float32
    }
}

impl GdalType for f64 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_Float64
    }
}

/// A GDAL pixel data type, as reported by bands or passed to band creation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GdalDataType(GDALDataType::Type);

impl GdalDataType {
    pub const BYTE: GdalDataType = GdalDataType(GDALDataType::GDT_Byte);
    pub const UINT16: GdalDataType = GdalDataType(GDALDataType::GDT_UInt16);
    pub const INT16: GdalDataType = GdalDataType(GDALDataType::GDT_Int16);
    pub const UINT32: GdalDataType = GdalDataType(GDALDataType::GDT_UInt32);
    pub const INT32: GdalDataType = GdalDataType(GDALDataType::GDT_Int32);
    #[cfg(any(major_ge_4, all(major_is_3, minor_ge_5)))]
    pub const UINT64: GdalDataType = GdalDataType(GDALDataType::GDT_UInt64);
    #[cfg(any(major_ge_4, all(major_is_3, minor_ge_5)))]
    pub const INT64: GdalDataType = GdalDataType(GDALDataType::GDT_Int64);
    pub const FLOAT32: GdalDataType = GdalDataType(GDALDataType::GDT_Float32);
    pub const FLOAT64: GdalDataType = GdalDataType(GDALDataType::GDT_Float64);

    pub fn gdal_type(&self) -> GDALDataType::Type {
        self.0
    }

    /// Looks a type up by its GDAL name, e.g. `"Float32"`.
    pub fn from_name(name: &str) -> Result<Self> {
        let c_name = std::ffi::CString::new(name)?;
        let gdal_type = unsafe { GDALGetDataTypeByName(c_name.as_ptr()) };
        if gdal_type == GDALDataType::GDT_Unknown {
            return Err(GdalError::BadArgument(format!("unknown data type '{name}'")));
        }
        Ok(Self(gdal_type))
    }

    pub fn name(&self) -> String {
        let c_str = unsafe { GDALGetDataTypeName(self.0) };
        if c_str.is_null() {
            return String::from("Unknown");
        }
        _string(c_str)
    }

    /// Get the gdal type size in **bits**.
    pub fn bits(&self) -> u8 {
        (unsafe { GDALGetDataTypeSizeBits(self.0) }) as u8
    }

    /// Get the gdal type size in **bytes**.
    pub fn bytes(&self) -> u8 {
        (unsafe { GDALGetDataTypeSizeBytes(self.0) }) as u8
    }

    /// Returns `true` if data type is integral (non-floating point)
    pub fn is_integer(&self) -> bool {
        (unsafe { GDALDataTypeIsInteger(self.0) }) > 0
    }

    /// Returns `true` if data type is floating point (non-integral)
    pub fn is_floating(&self) -> bool {
        (unsafe { GDALDataTypeIsFloating(self.0) }) > 0
    }

    /// Returns `true` if data type supports negative values.
    pub fn is_signed(&self) -> bool {
        (unsafe { GDALDataTypeIsSigned(self.0) }) > 0
    }
}

impl From<GDALDataType::Type> for GdalDataType {
    fn from(value: GDALDataType::Type) -> Self {
        GdalDataType(value)
    }
}

impl Display for GdalDataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_properties() {
        assert_eq!(u8::datatype(), GdalDataType::BYTE);
        assert_eq!(GdalDataType::BYTE.name(), "Byte");
        assert_eq!(GdalDataType::INT16.bits(), 16);
        assert_eq!(GdalDataType::FLOAT64.bytes(), 8);
        assert!(GdalDataType::FLOAT32.is_floating());
        assert!(!GdalDataType::UINT32.is_signed());
        assert!(GdalDataType::INT32.is_integer());
    }

    #[test]
    fn test_data_type_from_name() {
        assert_eq!(
            GdalDataType::from_name("Float32").unwrap(),
            GdalDataType::FLOAT32
        );
        assert!(matches!(
            GdalDataType::from_name("Float33"),
            Err(GdalError::BadArgument(_))
        ));
    }
}
