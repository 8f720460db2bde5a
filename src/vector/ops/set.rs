use gdal_sys::OGRGeometryH;

use crate::vector::Geometry;

/// # Set Operations
///
/// These return `None` when GDAL cannot compute a result, which is always
/// the case for GDAL builds without GEOS.
impl Geometry {
    fn set_op(
        &self,
        other: &Self,
        op: unsafe extern "C" fn(OGRGeometryH, OGRGeometryH) -> OGRGeometryH,
    ) -> Option<Self> {
        let c_geom = unsafe { op(self.c_geometry(), other.c_geometry()) };
        if c_geom.is_null() {
            None
        } else {
            Some(unsafe { Geometry::with_c_geometry(c_geom) })
        }
    }

    /// Points shared by `self` and `other`.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        self.set_op(other, gdal_sys::OGR_G_Intersection)
    }

    /// Points in `self`, `other` or both.
    pub fn union(&self, other: &Self) -> Option<Self> {
        self.set_op(other, gdal_sys::OGR_G_Union)
    }

    /// Points in `self` but not in `other`.
    pub fn difference(&self, other: &Self) -> Option<Self> {
        self.set_op(other, gdal_sys::OGR_G_Difference)
    }

    /// Points in exactly one of `self` and `other`.
    pub fn sym_difference(&self, other: &Self) -> Option<Self> {
        self.set_op(other, gdal_sys::OGR_G_SymDifference)
    }

    /// Dissolves the polygons of a multi-polygon into their union.
    pub fn union_cascaded(&self) -> Option<Self> {
        let c_geom = unsafe { gdal_sys::OGR_G_UnionCascaded(self.c_geometry()) };
        if c_geom.is_null() {
            None
        } else {
            Some(unsafe { Geometry::with_c_geometry(c_geom) })
        }
    }
}
