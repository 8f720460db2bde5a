use std::ffi::{c_int, CString};
use std::fmt::{self, Debug, Formatter};
use std::ptr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use gdal_sys::{self, OGRFeatureH, OGRFieldType};

use crate::dataset::Dataset;
use crate::errors::*;
use crate::handle::{Liveness, Scope};
use crate::utils::{_last_null_pointer_err, _ogr_result, _string, _string_array};
use crate::vector::{Geometry, Layer, Selector};
use crate::CslStringList;

/// OGR Feature
///
/// A feature is owned by Rust, but it is registered with its dataset: after the
/// dataset is closed every call fails with [`GdalError::AlreadyDestroyed`].
pub struct Feature {
    dataset: Dataset,
    live: Arc<Liveness>,
    c_feature: OGRFeatureH,
}

// The feature pointer is only used under the dataset lock.
unsafe impl Send for Feature {}
unsafe impl Sync for Feature {}

impl Feature {
    /// Creates an empty feature with the field layout of `layer`.
    pub fn new(layer: &Layer) -> Result<Feature> {
        layer.with_scope(|scope, c_layer| {
            let c_defn = unsafe { gdal_sys::OGR_L_GetLayerDefn(c_layer) };
            let c_feature = unsafe { gdal_sys::OGR_F_Create(c_defn) };
            if c_feature.is_null() {
                return Err(_last_null_pointer_err("OGR_F_Create"));
            }
            Ok(Feature::adopt(layer.dataset(), scope, c_feature))
        })
    }

    /// Takes ownership of a feature obtained while holding the dataset lock.
    pub(crate) fn adopt(dataset: &Dataset, scope: &mut Scope, c_feature: OGRFeatureH) -> Feature {
        Feature {
            dataset: dataset.clone(),
            live: scope.adopt("Feature"),
            c_feature,
        }
    }

    fn with<R>(&self, f: impl FnOnce(OGRFeatureH) -> Result<R>) -> Result<R> {
        let c_feature = self.c_feature;
        self.dataset.core().with_child(&self.live, |_| f(c_feature))
    }

    /// The native feature, for use under a lock that the caller already holds.
    pub(crate) fn c_feature_checked(&self) -> Result<OGRFeatureH> {
        self.live.check()?;
        Ok(self.c_feature)
    }

    pub fn is_destroyed(&self) -> bool {
        self.live.is_destroyed()
    }

    /// Feature ID, `None` until the feature has been written to a layer.
    pub fn fid(&self) -> Result<Option<u64>> {
        self.with(|c_feature| {
            let fid = unsafe { gdal_sys::OGR_F_GetFID(c_feature) };
            Ok((fid >= 0).then_some(fid as u64))
        })
    }

    pub fn set_fid(&mut self, fid: Option<u64>) -> Result<()> {
        self.with(|c_feature| {
            let fid = fid.map_or(-1, |fid| fid as i64);
            _ogr_result(
                unsafe { gdal_sys::OGR_F_SetFID(c_feature, fid) },
                "OGR_F_SetFID",
            )
        })
    }

    pub fn field_count(&self) -> Result<usize> {
        self.with(|c_feature| Ok(unsafe { gdal_sys::OGR_F_GetFieldCount(c_feature) } as usize))
    }

    pub fn field_names(&self) -> Result<Vec<String>> {
        self.with(|c_feature| {
            let count = unsafe { gdal_sys::OGR_F_GetFieldCount(c_feature) };
            Ok((0..count).map(|i| field_name(c_feature, i)).collect())
        })
    }

    /// The 0-based index of the field called `name`.
    pub fn field_index(&self, name: &str) -> Result<usize> {
        let selector = Selector::from(name);
        self.with(|c_feature| Ok(resolve(c_feature, &selector, "OGR_F_GetFieldIndex")? as usize))
    }

    /// The value of a field, `None` when it is unset or null.
    pub fn field(&self, selector: impl Into<Selector>) -> Result<Option<FieldValue>> {
        let selector = selector.into();
        self.with(|c_feature| {
            let index = resolve(c_feature, &selector, "OGR_F_GetFieldAsString")?;
            field_value(c_feature, index)
        })
    }

    pub fn field_as_string(&self, selector: impl Into<Selector>) -> Result<Option<String>> {
        let selector = selector.into();
        self.with(|c_feature| {
            let index = resolve(c_feature, &selector, "OGR_F_GetFieldAsString")?;
            if !is_set(c_feature, index) {
                return Ok(None);
            }
            Ok(Some(_string(unsafe {
                gdal_sys::OGR_F_GetFieldAsString(c_feature, index)
            })))
        })
    }

    /// All fields in layer order, as `(name, value)` pairs.
    pub fn fields(&self) -> Result<Vec<(String, Option<FieldValue>)>> {
        self.with(|c_feature| {
            let count = unsafe { gdal_sys::OGR_F_GetFieldCount(c_feature) };
            (0..count)
                .map(|i| Ok((field_name(c_feature, i), field_value(c_feature, i)?)))
                .collect()
        })
    }

    pub fn set_field(&mut self, selector: impl Into<Selector>, value: &FieldValue) -> Result<()> {
        let selector = selector.into();
        let c_value = match value {
            FieldValue::StringValue(s) => Some(CString::new(s.as_str())?),
            _ => None,
        };
        let c_list = match value {
            FieldValue::StringListValue(list) => {
                let mut c_list = CslStringList::new();
                for s in list {
                    c_list.add_string(s)?;
                }
                Some(c_list)
            }
            _ => None,
        };
        self.with(|c_feature| {
            let index = resolve(c_feature, &selector, "OGR_F_SetField")?;
            unsafe {
                match value {
                    FieldValue::IntegerValue(v) => {
                        gdal_sys::OGR_F_SetFieldInteger(c_feature, index, *v as c_int)
                    }
                    FieldValue::Integer64Value(v) => {
                        gdal_sys::OGR_F_SetFieldInteger64(c_feature, index, *v)
                    }
                    FieldValue::RealValue(v) => gdal_sys::OGR_F_SetFieldDouble(c_feature, index, *v),
                    FieldValue::StringValue(_) => gdal_sys::OGR_F_SetFieldString(
                        c_feature,
                        index,
                        c_value.as_ref().map_or(ptr::null(), |v| v.as_ptr()),
                    ),
                    FieldValue::IntegerListValue(v) => gdal_sys::OGR_F_SetFieldIntegerList(
                        c_feature,
                        index,
                        v.len() as c_int,
                        v.as_ptr(),
                    ),
                    FieldValue::Integer64ListValue(v) => gdal_sys::OGR_F_SetFieldInteger64List(
                        c_feature,
                        index,
                        v.len() as c_int,
                        v.as_ptr() as _,
                    ),
                    FieldValue::RealListValue(v) => gdal_sys::OGR_F_SetFieldDoubleList(
                        c_feature,
                        index,
                        v.len() as c_int,
                        v.as_ptr(),
                    ),
                    FieldValue::StringListValue(_) => gdal_sys::OGR_F_SetFieldStringList(
                        c_feature,
                        index,
                        c_list.as_ref().map_or(ptr::null_mut(), |l| l.as_ptr()),
                    ),
                    FieldValue::DateValue(date) => {
                        set_datetime(c_feature, index, date.and_time(NaiveTime::default()), 0)
                    }
                    FieldValue::DateTimeValue(dt) => {
                        let offset = dt.offset().local_minus_utc();
                        set_datetime(c_feature, index, dt.naive_local(), 100 + offset / (15 * 60))
                    }
                }
            }
            Ok(())
        })
    }

    /// Marks a field as unset.
    pub fn unset_field(&mut self, selector: impl Into<Selector>) -> Result<()> {
        let selector = selector.into();
        self.with(|c_feature| {
            let index = resolve(c_feature, &selector, "OGR_F_UnsetField")?;
            unsafe { gdal_sys::OGR_F_UnsetField(c_feature, index) };
            Ok(())
        })
    }

    /// A copy of the feature's geometry.
    pub fn geometry(&self) -> Result<Option<Geometry>> {
        self.with(|c_feature| {
            let c_geom = unsafe { gdal_sys::OGR_F_GetGeometryRef(c_feature) };
            if c_geom.is_null() {
                return Ok(None);
            }
            unsafe { Geometry::from_borrowed(c_geom) }.map(Some)
        })
    }

    /// Replaces the geometry with a copy of `geometry`, or removes it.
    pub fn set_geometry(&mut self, geometry: Option<&Geometry>) -> Result<()> {
        self.with(|c_feature| {
            let c_geom = geometry.map_or(ptr::null_mut(), |g| unsafe { g.c_geometry() });
            _ogr_result(
                unsafe { gdal_sys::OGR_F_SetGeometry(c_feature, c_geom) },
                "OGR_F_SetGeometry",
            )
        })
    }

    /// A deep copy of the feature, registered with the same dataset.
    pub fn try_clone(&self) -> Result<Feature> {
        let c_feature = self.c_feature;
        self.dataset.core().with_child(&self.live, |scope| {
            let c_clone = unsafe { gdal_sys::OGR_F_Clone(c_feature) };
            if c_clone.is_null() {
                return Err(_last_null_pointer_err("OGR_F_Clone"));
            }
            Ok(Feature::adopt(&self.dataset, scope, c_clone))
        })
    }
}

impl Debug for Feature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("fid", &self.fid().ok().flatten())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl Drop for Feature {
    fn drop(&mut self) {
        let c_feature = self.c_feature;
        // the feature holds a reference on its definition, so this is valid
        // after the dataset is closed too
        self.dataset
            .core()
            .serialized(|| unsafe { gdal_sys::OGR_F_Destroy(c_feature) });
    }
}

fn field_name(c_feature: OGRFeatureH, index: c_int) -> String {
    let c_defn = unsafe { gdal_sys::OGR_F_GetFieldDefnRef(c_feature, index) };
    _string(unsafe { gdal_sys::OGR_Fld_GetNameRef(c_defn) })
}

fn resolve(c_feature: OGRFeatureH, selector: &Selector, method_name: &'static str) -> Result<c_int> {
    match selector {
        Selector::Index(index) => {
            let count = unsafe { gdal_sys::OGR_F_GetFieldCount(c_feature) };
            if *index >= count as usize {
                return Err(GdalError::InvalidFieldIndex {
                    index: *index,
                    method_name,
                });
            }
            Ok(*index as c_int)
        }
        Selector::Name(name) => {
            let c_name = CString::new(name.as_str())?;
            let index = unsafe { gdal_sys::OGR_F_GetFieldIndex(c_feature, c_name.as_ptr()) };
            if index < 0 {
                return Err(GdalError::InvalidFieldName {
                    field_name: name.clone(),
                    method_name,
                });
            }
            Ok(index)
        }
    }
}

fn is_set(c_feature: OGRFeatureH, index: c_int) -> bool {
    unsafe { gdal_sys::OGR_F_IsFieldSetAndNotNull(c_feature, index) != 0 }
}

fn field_value(c_feature: OGRFeatureH, index: c_int) -> Result<Option<FieldValue>> {
    if !is_set(c_feature, index) {
        return Ok(None);
    }
    let c_defn = unsafe { gdal_sys::OGR_F_GetFieldDefnRef(c_feature, index) };
    let field_type = unsafe { gdal_sys::OGR_Fld_GetType(c_defn) };
    let value = unsafe {
        match field_type {
            OGRFieldType::OFTInteger => {
                FieldValue::IntegerValue(gdal_sys::OGR_F_GetFieldAsInteger(c_feature, index))
            }
            OGRFieldType::OFTInteger64 => {
                FieldValue::Integer64Value(gdal_sys::OGR_F_GetFieldAsInteger64(c_feature, index))
            }
            OGRFieldType::OFTReal => {
                FieldValue::RealValue(gdal_sys::OGR_F_GetFieldAsDouble(c_feature, index))
            }
            OGRFieldType::OFTString => {
                FieldValue::StringValue(_string(gdal_sys::OGR_F_GetFieldAsString(c_feature, index)))
            }
            OGRFieldType::OFTIntegerList => {
                let mut len: c_int = 0;
                let ptr = gdal_sys::OGR_F_GetFieldAsIntegerList(c_feature, index, &mut len);
                FieldValue::IntegerListValue(copy_list(ptr, len))
            }
            OGRFieldType::OFTInteger64List => {
                let mut len: c_int = 0;
                let ptr = gdal_sys::OGR_F_GetFieldAsInteger64List(c_feature, index, &mut len);
                FieldValue::Integer64ListValue(copy_list(ptr as *const i64, len))
            }
            OGRFieldType::OFTRealList => {
                let mut len: c_int = 0;
                let ptr = gdal_sys::OGR_F_GetFieldAsDoubleList(c_feature, index, &mut len);
                FieldValue::RealListValue(copy_list(ptr, len))
            }
            OGRFieldType::OFTStringList => FieldValue::StringListValue(_string_array(
                gdal_sys::OGR_F_GetFieldAsStringList(c_feature, index),
            )),
            OGRFieldType::OFTDate => FieldValue::DateValue(get_datetime(c_feature, index)?.date_naive()),
            OGRFieldType::OFTDateTime => FieldValue::DateTimeValue(get_datetime(c_feature, index)?),
            _ => {
                return Err(GdalError::UnhandledFieldType {
                    field_type,
                    method_name: "OGR_Fld_GetType",
                })
            }
        }
    };
    Ok(Some(value))
}

unsafe fn copy_list<T: Copy>(ptr: *const T, len: c_int) -> Vec<T> {
    if ptr.is_null() || len <= 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(ptr, len as usize).to_vec()
}

fn get_datetime(c_feature: OGRFeatureH, index: c_int) -> Result<DateTime<FixedOffset>> {
    let (mut year, mut month, mut day, mut hour, mut minute, mut tzflag) = (0, 0, 0, 0, 0, 0);
    let mut second: f32 = 0.0;
    let success = unsafe {
        gdal_sys::OGR_F_GetFieldAsDateTimeEx(
            c_feature,
            index,
            &mut year,
            &mut month,
            &mut day,
            &mut hour,
            &mut minute,
            &mut second,
            &mut tzflag,
        )
    };
    if success == 0 {
        return Err(GdalError::OgrError {
            err: gdal_sys::OGRErr::OGRERR_FAILURE,
            method_name: "OGR_F_GetFieldAsDateTimeEx",
        });
    }

    // tzflag: 0 unknown, 1 local time, 100 UTC, 100 + n offset in quarter hours
    let tzoffset_secs = if tzflag <= 1 || tzflag == 100 {
        0
    } else {
        (tzflag - 100) * 15 * 60
    };
    let invalid = || GdalError::BadArgument(format!("invalid date in field {index}"));
    let date = NaiveDate::from_ymd_opt(year, month as u32, day as u32).ok_or_else(invalid)?;
    let millis = (second.fract() * 1000.0).round() as u32;
    let time = NaiveTime::from_hms_milli_opt(hour as u32, minute as u32, second as u32, millis)
        .ok_or_else(invalid)?;
    let offset = FixedOffset::east_opt(tzoffset_secs).ok_or_else(invalid)?;
    offset
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
        .ok_or_else(invalid)
}

unsafe fn set_datetime(c_feature: OGRFeatureH, index: c_int, dt: NaiveDateTime, tzflag: c_int) {
    let second = dt.second() as f32 + dt.nanosecond() as f32 / 1e9;
    gdal_sys::OGR_F_SetFieldDateTimeEx(
        c_feature,
        index,
        dt.year() as c_int,
        dt.month() as c_int,
        dt.day() as c_int,
        dt.hour() as c_int,
        dt.minute() as c_int,
        second,
        tzflag,
    );
}

/// The value of a feature field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    IntegerValue(i32),
    IntegerListValue(Vec<i32>),
    Integer64Value(i64),
    Integer64ListValue(Vec<i64>),
    StringValue(String),
    StringListValue(Vec<String>),
    RealValue(f64),
    RealListValue(Vec<f64>),
    DateValue(NaiveDate),
    DateTimeValue(DateTime<FixedOffset>),
}

impl FieldValue {
    /// Interpret the value as `String`.
    pub fn into_string(self) -> Option<String> {
        match self {
            FieldValue::StringValue(rv) => Some(rv),
            _ => None,
        }
    }

    /// Interpret the value as `f64`, widening integers.
    pub fn into_real(self) -> Option<f64> {
        match self {
            FieldValue::RealValue(rv) => Some(rv),
            FieldValue::IntegerValue(rv) => Some(rv as f64),
            FieldValue::Integer64Value(rv) => Some(rv as f64),
            _ => None,
        }
    }

    pub fn into_int(self) -> Option<i32> {
        match self {
            FieldValue::IntegerValue(rv) => Some(rv),
            FieldValue::Integer64Value(rv) => i32::try_from(rv).ok(),
            _ => None,
        }
    }

    pub fn into_int64(self) -> Option<i64> {
        match self {
            FieldValue::IntegerValue(rv) => Some(rv as i64),
            FieldValue::Integer64Value(rv) => Some(rv),
            _ => None,
        }
    }

    pub fn into_date(self) -> Option<NaiveDate> {
        match self {
            FieldValue::DateValue(rv) => Some(rv),
            FieldValue::DateTimeValue(rv) => Some(rv.date_naive()),
            _ => None,
        }
    }

    pub fn into_datetime(self) -> Option<DateTime<FixedOffset>> {
        match self {
            FieldValue::DateTimeValue(rv) => Some(rv),
            _ => None,
        }
    }

    /// The OGR field type able to store this value.
    pub fn ogr_field_type(&self) -> OGRFieldType::Type {
        match self {
            FieldValue::IntegerValue(_) => OGRFieldType::OFTInteger,
            FieldValue::IntegerListValue(_) => OGRFieldType::OFTIntegerList,
            FieldValue::Integer64Value(_) => OGRFieldType::OFTInteger64,
            FieldValue::Integer64ListValue(_) => OGRFieldType::OFTInteger64List,
            FieldValue::StringValue(_) => OGRFieldType::OFTString,
            FieldValue::StringListValue(_) => OGRFieldType::OFTStringList,
            FieldValue::RealValue(_) => OGRFieldType::OFTReal,
            FieldValue::RealListValue(_) => OGRFieldType::OFTRealList,
            FieldValue::DateValue(_) => OGRFieldType::OFTDate,
            FieldValue::DateTimeValue(_) => OGRFieldType::OFTDateTime,
        }
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::IntegerValue(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer64Value(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::RealValue(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::StringValue(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::StringValue(value)
    }
}
