use std::ffi::{c_int, CString};

use gdal_sys::{self, OGRFieldDefnH, OGRFieldType, OGRJustification, OGRLayerH};

use crate::errors::*;
use crate::handle::{Guarded, Liveness};
use crate::utils::{_last_error_msg, _ogr_result, _string};
use crate::vector::{FieldValue, Layer, LayerCapability, Selector};
use crate::work::{self, Pending};

/// Definition of an attribute field.
///
/// This is a plain value: reading it from a layer copies it, and adding it to a
/// layer copies it again.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDefn {
    pub name: String,
    pub field_type: OGRFieldType::Type,
    /// Formatting width, `0` for none.
    pub width: i32,
    /// Number of decimals for real fields, `0` for none.
    pub precision: i32,
    pub justify: OGRJustification::Type,
    pub nullable: bool,
    pub ignored: bool,
}

impl FieldDefn {
    pub fn new(name: &str, field_type: OGRFieldType::Type) -> FieldDefn {
        FieldDefn {
            name: name.to_string(),
            field_type,
            width: 0,
            precision: 0,
            justify: OGRJustification::OJUndefined,
            nullable: true,
            ignored: false,
        }
    }

    pub fn with_width(mut self, width: i32) -> Self {
        self.width = width;
        self
    }

    pub fn with_precision(mut self, precision: i32) -> Self {
        self.precision = precision;
        self
    }

    fn from_c_defn(c_defn: OGRFieldDefnH) -> FieldDefn {
        unsafe {
            FieldDefn {
                name: _string(gdal_sys::OGR_Fld_GetNameRef(c_defn)),
                field_type: gdal_sys::OGR_Fld_GetType(c_defn),
                width: gdal_sys::OGR_Fld_GetWidth(c_defn),
                precision: gdal_sys::OGR_Fld_GetPrecision(c_defn),
                justify: gdal_sys::OGR_Fld_GetJustify(c_defn),
                nullable: gdal_sys::OGR_Fld_IsNullable(c_defn) != 0,
                ignored: gdal_sys::OGR_Fld_IsIgnored(c_defn) != 0,
            }
        }
    }

    /// Adds the field to `c_layer`; `approx_ok` lets the driver adjust name or type.
    fn create_on(&self, c_layer: OGRLayerH, approx_ok: bool) -> Result<()> {
        let c_name = CString::new(self.name.as_str())?;
        let c_defn = unsafe { gdal_sys::OGR_Fld_Create(c_name.as_ptr(), self.field_type) };
        unsafe {
            gdal_sys::OGR_Fld_SetWidth(c_defn, self.width);
            gdal_sys::OGR_Fld_SetPrecision(c_defn, self.precision);
            gdal_sys::OGR_Fld_SetJustify(c_defn, self.justify);
            gdal_sys::OGR_Fld_SetNullable(c_defn, self.nullable as c_int);
        }
        let rv = unsafe { gdal_sys::OGR_L_CreateField(c_layer, c_defn, approx_ok as c_int) };
        unsafe { gdal_sys::OGR_Fld_Destroy(c_defn) };
        if rv != gdal_sys::OGRErr::OGRERR_NONE {
            return Err(GdalError::BadArgument(format!(
                "Failed to add field '{}': {}",
                self.name,
                _last_error_msg()
            )));
        }
        Ok(())
    }
}

/// The attribute fields of a [`Layer`], numbered from 0.
#[derive(Clone, Debug)]
pub struct LayerFields {
    layer: Layer,
}

fn field_count(c_layer: OGRLayerH) -> c_int {
    unsafe { gdal_sys::OGR_FD_GetFieldCount(gdal_sys::OGR_L_GetLayerDefn(c_layer)) }
}

fn resolve(c_layer: OGRLayerH, selector: &Selector, method_name: &'static str) -> Result<c_int> {
    let c_layer_defn = unsafe { gdal_sys::OGR_L_GetLayerDefn(c_layer) };
    match selector {
        Selector::Index(index) => {
            if *index >= field_count(c_layer) as usize {
                return Err(GdalError::InvalidFieldIndex {
                    index: *index,
                    method_name,
                });
            }
            Ok(*index as c_int)
        }
        Selector::Name(name) => {
            let c_name = CString::new(name.as_str())?;
            let index = unsafe { gdal_sys::OGR_FD_GetFieldIndex(c_layer_defn, c_name.as_ptr()) };
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

impl LayerFields {
    pub(crate) fn new(layer: Layer) -> Self {
        Self { layer }
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn count(&self) -> Result<usize> {
        self.layer.with(|c_layer| Ok(field_count(c_layer) as usize))
    }

    pub fn count_async(&self) -> Pending<usize> {
        work::spawn_guarded(self, |this| this.count())
    }

    /// A copy of the definition of the field at an index or with a name.
    pub fn get(&self, selector: impl Into<Selector>) -> Result<FieldDefn> {
        let selector = selector.into();
        self.layer.with(|c_layer| {
            let index = resolve(c_layer, &selector, "OGR_FD_GetFieldDefn")?;
            let c_defn = unsafe {
                gdal_sys::OGR_FD_GetFieldDefn(gdal_sys::OGR_L_GetLayerDefn(c_layer), index)
            };
            Ok(FieldDefn::from_c_defn(c_defn))
        })
    }

    pub fn get_async(&self, selector: impl Into<Selector>) -> Pending<FieldDefn> {
        let selector = selector.into();
        work::spawn_guarded(self, move |this| this.get(selector))
    }

    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.all()?.into_iter().map(|defn| defn.name).collect())
    }

    /// The index of the field called `name`.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        let selector = Selector::from(name);
        self.layer
            .with(|c_layer| Ok(resolve(c_layer, &selector, "OGR_FD_GetFieldIndex")? as usize))
    }

    fn all(&self) -> Result<Vec<FieldDefn>> {
        self.layer.with(|c_layer| {
            let c_layer_defn = unsafe { gdal_sys::OGR_L_GetLayerDefn(c_layer) };
            Ok((0..field_count(c_layer))
                .map(|i| FieldDefn::from_c_defn(unsafe { gdal_sys::OGR_FD_GetFieldDefn(c_layer_defn, i) }))
                .collect())
        })
    }

    pub fn iter(&self) -> Result<std::vec::IntoIter<FieldDefn>> {
        Ok(self.all()?.into_iter())
    }

    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(FieldDefn) -> Result<()>,
    {
        for defn in self.all()? {
            f(defn)?;
        }
        Ok(())
    }

    pub fn map<R, F>(&self, f: F) -> Result<Vec<R>>
    where
        F: FnMut(FieldDefn) -> Result<R>,
    {
        self.all()?.into_iter().map(f).collect()
    }

    /// Adds a field. With `approx_ok` the driver may alter the definition to one it supports.
    pub fn add(&self, defn: &FieldDefn, approx_ok: bool) -> Result<()> {
        self.add_many(std::slice::from_ref(defn), approx_ok)
    }

    pub fn add_many(&self, defns: &[FieldDefn], approx_ok: bool) -> Result<()> {
        self.layer.with(|c_layer| {
            LayerCapability::CreateField.require(c_layer, "create fields")?;
            for defn in defns {
                defn.create_on(c_layer, approx_ok)?;
            }
            Ok(())
        })
    }

    pub fn add_async(&self, defn: FieldDefn, approx_ok: bool) -> Pending<()> {
        work::spawn_guarded(self, move |this| this.add(&defn, approx_ok))
    }

    /// Adds one field per `(name, value)` pair, typed after the value.
    pub fn from_values(&self, values: &[(&str, FieldValue)]) -> Result<()> {
        let defns: Vec<_> = values
            .iter()
            .map(|(name, value)| FieldDefn::new(name, value.ogr_field_type()))
            .collect();
        self.add_many(&defns, false)
    }

    pub fn remove(&self, selector: impl Into<Selector>) -> Result<()> {
        let selector = selector.into();
        self.layer.with(|c_layer| {
            LayerCapability::DeleteField.require(c_layer, "delete fields")?;
            let index = resolve(c_layer, &selector, "OGR_L_DeleteField")?;
            _ogr_result(
                unsafe { gdal_sys::OGR_L_DeleteField(c_layer, index) },
                "OGR_L_DeleteField",
            )
        })
    }

    pub fn remove_async(&self, selector: impl Into<Selector>) -> Pending<()> {
        let selector = selector.into();
        work::spawn_guarded(self, move |this| this.remove(selector))
    }

    /// Reorders the fields: the field now at `map[i]` moves to position `i`.
    pub fn reorder(&self, map: &[usize]) -> Result<()> {
        self.layer.with(|c_layer| {
            LayerCapability::ReorderFields.require(c_layer, "reorder fields")?;
            let count = field_count(c_layer) as usize;
            let mut seen = vec![false; count];
            for &i in map {
                if i >= count || std::mem::replace(&mut seen[i], true) {
                    return Err(GdalError::BadArgument(format!(
                        "{map:?} is not a permutation of the {count} field indices"
                    )));
                }
            }
            if map.len() != count {
                return Err(GdalError::BadArgument(format!(
                    "{map:?} is not a permutation of the {count} field indices"
                )));
            }
            let mut c_map: Vec<c_int> = map.iter().map(|&i| i as c_int).collect();
            _ogr_result(
                unsafe { gdal_sys::OGR_L_ReorderFields(c_layer, c_map.as_mut_ptr()) },
                "OGR_L_ReorderFields",
            )
        })
    }
}

impl Guarded for LayerFields {
    fn liveness(&self) -> &Liveness {
        self.layer.live()
    }
}
