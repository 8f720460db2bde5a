use std::ffi::{c_char, c_int, CString};
use std::fmt::{self, Debug, Formatter};
use std::ptr;
use std::str::FromStr;

use gdal_sys::{self, OGRErr, OGRSpatialReferenceH, OSRAxisMappingStrategy};

use crate::errors::*;
use crate::utils::{
    _last_error_msg, _last_null_pointer_err, _ogr_result, _opt_string, _owned_string, _string,
};
use crate::work::{self, Pending};

/// How the axes of a CRS map onto the `x`/`y` of coordinates handed to GDAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisMappingStrategy {
    /// Coordinates follow the axis order of the CRS definition (latitude first for EPSG:4326).
    AuthorityCompliant,
    /// Longitude/easting always comes first.
    TraditionalGisOrder,
    Custom,
}

impl AxisMappingStrategy {
    fn to_c(self) -> OSRAxisMappingStrategy::Type {
        match self {
            AxisMappingStrategy::AuthorityCompliant => {
                OSRAxisMappingStrategy::OAMS_AUTHORITY_COMPLIANT
            }
            AxisMappingStrategy::TraditionalGisOrder => {
                OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER
            }
            AxisMappingStrategy::Custom => OSRAxisMappingStrategy::OAMS_CUSTOM,
        }
    }

    fn from_c(strategy: OSRAxisMappingStrategy::Type) -> Self {
        match strategy {
            OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER => {
                AxisMappingStrategy::TraditionalGisOrder
            }
            OSRAxisMappingStrategy::OAMS_CUSTOM => AxisMappingStrategy::Custom,
            _ => AxisMappingStrategy::AuthorityCompliant,
        }
    }
}

/// A unit of measure: its name and its factor to metres or radians.
#[derive(Debug, Clone, PartialEq)]
pub struct Units {
    pub name: String,
    pub value: f64,
}

/// A OpenGIS Spatial Reference System definition.
///
/// A `SpatialRef` is always an independent copy: reading one from a dataset,
/// layer or geometry clones the native object, so it stays valid after its
/// source is closed.
pub struct SpatialRef(OGRSpatialReferenceH);

// OGRSpatialReference objects are reference counted and not shared between handles.
unsafe impl Send for SpatialRef {}

impl Drop for SpatialRef {
    fn drop(&mut self) {
        unsafe { gdal_sys::OSRRelease(self.0) };
    }
}

impl Clone for SpatialRef {
    fn clone(&self) -> SpatialRef {
        SpatialRef(unsafe { gdal_sys::OSRClone(self.0) })
    }
}

impl PartialEq for SpatialRef {
    fn eq(&self, other: &SpatialRef) -> bool {
        unsafe { gdal_sys::OSRIsSame(self.0, other.0) == 1 }
    }
}

impl Debug for SpatialRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.to_proj4() {
            Ok(proj4) => write!(f, "SpatialRef({})", proj4.trim()),
            Err(_) => f.write_str("SpatialRef(<invalid>)"),
        }
    }
}

fn import_result(rv: OGRErr::Type, method_name: &'static str, input: &str) -> Result<()> {
    if rv == OGRErr::OGRERR_NONE {
        return Ok(());
    }
    let msg = _last_error_msg();
    Err(GdalError::ParseError(if msg.is_empty() {
        format!("{method_name} cannot use '{input}'")
    } else {
        format!("{method_name} cannot use '{input}': {msg}")
    }))
}

fn export_result(rv: OGRErr::Type, c_str: *mut c_char, method_name: &'static str) -> Result<String> {
    if rv != OGRErr::OGRERR_NONE {
        if !c_str.is_null() {
            unsafe { gdal_sys::VSIFree(c_str.cast()) };
        }
        return Err(GdalError::OgrError {
            err: rv,
            method_name,
        });
    }
    if c_str.is_null() {
        return Ok(String::new());
    }
    Ok(_owned_string(c_str))
}

impl SpatialRef {
    /// An empty definition.
    pub fn new() -> Result<SpatialRef> {
        let c_obj = unsafe { gdal_sys::OSRNewSpatialReference(ptr::null()) };
        if c_obj.is_null() {
            return Err(_last_null_pointer_err("OSRNewSpatialReference"));
        }
        Ok(SpatialRef(c_obj))
    }

    /// Builds a `SpatialRef` from any definition `OSRSetFromUserInput` accepts
    /// (`EPSG:n`, WKT, PROJ strings, URNs, well known names such as `WGS84`).
    ///
    /// Inputs that would make GDAL fetch a URL are refused with
    /// [`GdalError::BadArgument`].
    pub fn from_user_input(definition: &str) -> Result<SpatialRef> {
        let lowered = definition.trim_start().to_ascii_lowercase();
        if ["http://", "https://", "ftp://"]
            .iter()
            .any(|scheme| lowered.starts_with(scheme))
        {
            return Err(GdalError::BadArgument(format!(
                "spatial reference definitions must not be URLs: '{definition}'"
            )));
        }
        let srs = SpatialRef::new()?;
        let c_definition = CString::new(definition)?;
        let rv = unsafe { gdal_sys::OSRSetFromUserInput(srs.0, c_definition.as_ptr()) };
        import_result(rv, "OSRSetFromUserInput", definition)?;
        Ok(srs)
    }

    /// Same as [`SpatialRef::from_user_input`], run on the worker pool.
    pub fn from_user_input_async(definition: String) -> Pending<SpatialRef> {
        work::spawn(move || SpatialRef::from_user_input(&definition))
    }

    pub fn from_wkt(wkt: &str) -> Result<SpatialRef> {
        let c_str = CString::new(wkt)?;
        let c_obj = unsafe { gdal_sys::OSRNewSpatialReference(c_str.as_ptr()) };
        if c_obj.is_null() {
            return Err(GdalError::ParseError(format!(
                "invalid WKT: {}",
                _last_error_msg()
            )));
        }
        Ok(SpatialRef(c_obj))
    }

    pub fn from_epsg(epsg_code: u32) -> Result<SpatialRef> {
        let srs = SpatialRef::new()?;
        let rv = unsafe { gdal_sys::OSRImportFromEPSG(srs.0, epsg_code as c_int) };
        import_result(rv, "OSRImportFromEPSG", &epsg_code.to_string())?;
        Ok(srs)
    }

    /// Like [`SpatialRef::from_epsg`], keeping the axis order of the EPSG definition.
    pub fn from_epsga(epsg_code: u32) -> Result<SpatialRef> {
        let srs = SpatialRef::new()?;
        let rv = unsafe { gdal_sys::OSRImportFromEPSGA(srs.0, epsg_code as c_int) };
        import_result(rv, "OSRImportFromEPSGA", &epsg_code.to_string())?;
        Ok(srs)
    }

    pub fn from_proj4(proj4_string: &str) -> Result<SpatialRef> {
        let srs = SpatialRef::new()?;
        let c_str = CString::new(proj4_string)?;
        let rv = unsafe { gdal_sys::OSRImportFromProj4(srs.0, c_str.as_ptr()) };
        import_result(rv, "OSRImportFromProj4", proj4_string)?;
        Ok(srs)
    }

    pub fn from_esri(esri_wkt: &str) -> Result<SpatialRef> {
        let srs = SpatialRef::new()?;
        let c_str = CString::new(esri_wkt)?;
        let mut ptrs = [c_str.as_ptr() as *mut c_char, ptr::null_mut()];
        let rv = unsafe { gdal_sys::OSRImportFromESRI(srs.0, ptrs.as_mut_ptr()) };
        import_result(rv, "OSRImportFromESRI", esri_wkt)?;
        Ok(srs)
    }

    /// Parses a GML/XML coordinate system definition.
    pub fn from_xml(xml: &str) -> Result<SpatialRef> {
        let srs = SpatialRef::new()?;
        let c_str = CString::new(xml)?;
        let rv = unsafe { gdal_sys::OSRImportFromXML(srs.0, c_str.as_ptr()) };
        import_result(rv, "OSRImportFromXML", xml)?;
        Ok(srs)
    }

    /// Parses a WMS `AUTO:` projection, e.g. `AUTO:42001,99,8888`.
    pub fn from_wms_auto(definition: &str) -> Result<SpatialRef> {
        let srs = SpatialRef::new()?;
        let c_str = CString::new(definition)?;
        let rv = unsafe { gdal_sys::OSRImportFromWMSAUTO(srs.0, c_str.as_ptr()) };
        import_result(rv, "OSRImportFromWMSAUTO", definition)?;
        Ok(srs)
    }

    /// Parses a MapInfo `CoordSys` clause.
    pub fn from_mi_coord_sys(definition: &str) -> Result<SpatialRef> {
        let srs = SpatialRef::new()?;
        let c_str = CString::new(definition)?;
        let rv = unsafe { gdal_sys::OSRImportFromMICoordSys(srs.0, c_str.as_ptr()) };
        import_result(rv, "OSRImportFromMICoordSys", definition)?;
        Ok(srs)
    }

    /// Creates an independent copy of a native spatial reference.
    ///
    /// # Safety
    /// `c_obj` must point to a valid `OGRSpatialReference`.
    pub unsafe fn from_c_obj(c_obj: OGRSpatialReferenceH) -> Result<SpatialRef> {
        let c_clone = gdal_sys::OSRClone(c_obj);
        if c_clone.is_null() {
            return Err(_last_null_pointer_err("OSRClone"));
        }
        Ok(SpatialRef(c_clone))
    }

    /// Returns the wrapped native pointer, still owned by `self`.
    ///
    /// # Safety
    /// The pointer must not outlive `self`.
    pub unsafe fn to_c_hsrs(&self) -> OGRSpatialReferenceH {
        self.0
    }

    pub fn to_wkt(&self) -> Result<String> {
        let mut c_wkt = ptr::null_mut();
        let rv = unsafe { gdal_sys::OSRExportToWkt(self.0, &mut c_wkt) };
        export_result(rv, c_wkt, "OSRExportToWkt")
    }

    pub fn to_pretty_wkt(&self) -> Result<String> {
        let mut c_wkt = ptr::null_mut();
        let rv = unsafe { gdal_sys::OSRExportToPrettyWkt(self.0, &mut c_wkt, false as c_int) };
        export_result(rv, c_wkt, "OSRExportToPrettyWkt")
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut c_xml = ptr::null_mut();
        let rv = unsafe { gdal_sys::OSRExportToXML(self.0, &mut c_xml, ptr::null()) };
        export_result(rv, c_xml, "OSRExportToXML")
    }

    pub fn to_proj4(&self) -> Result<String> {
        let mut c_proj4 = ptr::null_mut();
        let rv = unsafe { gdal_sys::OSRExportToProj4(self.0, &mut c_proj4) };
        export_result(rv, c_proj4, "OSRExportToProj4")
    }

    /// Rewrites the definition in ESRI flavour.
    pub fn morph_to_esri(&mut self) -> Result<()> {
        let rv = unsafe { gdal_sys::OSRMorphToESRI(self.0) };
        _ogr_result(rv, "OSRMorphToESRI")
    }

    pub fn morph_from_esri(&mut self) -> Result<()> {
        let rv = unsafe { gdal_sys::OSRMorphFromESRI(self.0) };
        _ogr_result(rv, "OSRMorphFromESRI")
    }

    /// Checks the definition, returning the problem GDAL found if any.
    pub fn validate(&self) -> Result<()> {
        let rv = unsafe { gdal_sys::OSRValidate(self.0) };
        if rv != OGRErr::OGRERR_NONE {
            let msg = _last_error_msg();
            return Err(GdalError::ParseError(if msg.is_empty() {
                "spatial reference is not valid".to_string()
            } else {
                msg
            }));
        }
        Ok(())
    }

    /// The name of the authority of the root node, e.g. `"EPSG"`.
    pub fn auth_name(&self) -> Result<String> {
        self.auth_name_of(None)
    }

    /// The authority name of a node such as `"PROJCS"` or `"GEOGCS"`.
    pub fn auth_name_of(&self, target_key: Option<&str>) -> Result<String> {
        let c_key = target_key.map(CString::new).transpose()?;
        let c_ptr = unsafe {
            gdal_sys::OSRGetAuthorityName(self.0, c_key.as_ref().map_or(ptr::null(), |k| k.as_ptr()))
        };
        if c_ptr.is_null() {
            return Err(_last_null_pointer_err("OSRGetAuthorityName"));
        }
        Ok(_string(c_ptr))
    }

    pub fn auth_code(&self) -> Result<i32> {
        self.auth_code_of(None)
    }

    pub fn auth_code_of(&self, target_key: Option<&str>) -> Result<i32> {
        let c_key = target_key.map(CString::new).transpose()?;
        let c_ptr = unsafe {
            gdal_sys::OSRGetAuthorityCode(self.0, c_key.as_ref().map_or(ptr::null(), |k| k.as_ptr()))
        };
        if c_ptr.is_null() {
            return Err(_last_null_pointer_err("OSRGetAuthorityCode"));
        }
        let code = _string(c_ptr);
        i32::from_str(&code).map_err(|_| GdalError::OgrError {
            err: OGRErr::OGRERR_UNSUPPORTED_SRS,
            method_name: "OSRGetAuthorityCode",
        })
    }

    /// `"{auth_name}:{auth_code}"`, e.g. `"EPSG:4326"`.
    pub fn authority(&self) -> Result<String> {
        Ok(format!("{}:{}", self.auth_name()?, self.auth_code()?))
    }

    /// Tries to find the EPSG code matching the definition and records it.
    pub fn auto_identify_epsg(&mut self) -> Result<()> {
        let rv = unsafe { gdal_sys::OSRAutoIdentifyEPSG(self.0) };
        if rv != OGRErr::OGRERR_NONE {
            return Err(GdalError::NotFound(
                "no EPSG code matches this spatial reference".to_string(),
            ));
        }
        Ok(())
    }

    /// The value of the `child`-th child of the node called `node_path`,
    /// e.g. `attr_value("DATUM", 0)`. `None` when there is no such node.
    pub fn attr_value(&self, node_path: &str, child: usize) -> Result<Option<String>> {
        let c_node_path = CString::new(node_path)?;
        let c_ptr =
            unsafe { gdal_sys::OSRGetAttrValue(self.0, c_node_path.as_ptr(), child as c_int) };
        Ok(_opt_string(c_ptr))
    }

    /// The name of the CRS, e.g. `"WGS 84"`.
    pub fn name(&self) -> Option<String> {
        _opt_string(unsafe { gdal_sys::OSRGetName(self.0) })
    }

    pub fn angular_units_name(&self) -> Result<String> {
        Ok(self.angular_units().name)
    }

    /// The angular unit and its factor to radians.
    pub fn angular_units(&self) -> Units {
        let mut c_name: *mut c_char = ptr::null_mut();
        let value = unsafe { gdal_sys::OSRGetAngularUnits(self.0, &mut c_name) };
        Units {
            name: _opt_string(c_name).unwrap_or_default(),
            value,
        }
    }

    pub fn linear_units_name(&self) -> Result<String> {
        Ok(self.linear_units().name)
    }

    /// The linear unit and its factor to metres.
    pub fn linear_units(&self) -> Units {
        let mut c_name: *mut c_char = ptr::null_mut();
        let value = unsafe { gdal_sys::OSRGetLinearUnits(self.0, &mut c_name) };
        Units {
            name: _opt_string(c_name).unwrap_or_default(),
            value,
        }
    }

    pub fn is_geographic(&self) -> bool {
        unsafe { gdal_sys::OSRIsGeographic(self.0) == 1 }
    }

    pub fn is_local(&self) -> bool {
        unsafe { gdal_sys::OSRIsLocal(self.0) == 1 }
    }

    pub fn is_projected(&self) -> bool {
        unsafe { gdal_sys::OSRIsProjected(self.0) == 1 }
    }

    pub fn is_compound(&self) -> bool {
        unsafe { gdal_sys::OSRIsCompound(self.0) == 1 }
    }

    pub fn is_geocentric(&self) -> bool {
        unsafe { gdal_sys::OSRIsGeocentric(self.0) == 1 }
    }

    pub fn is_vertical(&self) -> bool {
        unsafe { gdal_sys::OSRIsVertical(self.0) == 1 }
    }

    /// Whether both definitions use the same geographic coordinate system.
    pub fn is_same_geog_cs(&self, other: &SpatialRef) -> bool {
        unsafe { gdal_sys::OSRIsSameGeogCS(self.0, other.0) == 1 }
    }

    /// A copy of the geographic coordinate system this definition is based on.
    pub fn clone_geog_cs(&self) -> Result<SpatialRef> {
        let c_obj = unsafe { gdal_sys::OSRCloneGeogCS(self.0) };
        if c_obj.is_null() {
            return Err(_last_null_pointer_err("OSRCloneGeogCS"));
        }
        Ok(SpatialRef(c_obj))
    }

    pub fn set_axis_mapping_strategy(&mut self, strategy: AxisMappingStrategy) {
        unsafe { gdal_sys::OSRSetAxisMappingStrategy(self.0, strategy.to_c()) };
    }

    pub fn axis_mapping_strategy(&self) -> AxisMappingStrategy {
        AxisMappingStrategy::from_c(unsafe { gdal_sys::OSRGetAxisMappingStrategy(self.0) })
    }
}
