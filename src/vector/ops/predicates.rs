use crate::vector::Geometry;

/// # Geometric Predicates
///
/// [Spatial relations](https://en.wikipedia.org/wiki/DE-9IM#Spatial_predicates) between
/// two geometries. Without GEOS, GDAL only answers `intersects` (from the envelopes)
/// and the other predicates return `false`.
impl Geometry {
    /// `self` and `other` have at least one point in common.
    pub fn intersects(&self, other: &Self) -> bool {
        unsafe { gdal_sys::OGR_G_Intersects(self.c_geometry(), other.c_geometry()) != 0 }
    }

    /// `other` lies in `self`, and the interiors intersect.
    ///
    /// Validity is not checked; invalid input gives unpredictable answers.
    pub fn contains(&self, other: &Self) -> bool {
        unsafe { gdal_sys::OGR_G_Contains(self.c_geometry(), other.c_geometry()) != 0 }
    }

    pub fn disjoint(&self, other: &Self) -> bool {
        unsafe { gdal_sys::OGR_G_Disjoint(self.c_geometry(), other.c_geometry()) != 0 }
    }

    pub fn touches(&self, other: &Self) -> bool {
        unsafe { gdal_sys::OGR_G_Touches(self.c_geometry(), other.c_geometry()) != 0 }
    }

    pub fn crosses(&self, other: &Self) -> bool {
        unsafe { gdal_sys::OGR_G_Crosses(self.c_geometry(), other.c_geometry()) != 0 }
    }

    pub fn within(&self, other: &Self) -> bool {
        unsafe { gdal_sys::OGR_G_Within(self.c_geometry(), other.c_geometry()) != 0 }
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        unsafe { gdal_sys::OGR_G_Overlaps(self.c_geometry(), other.c_geometry()) != 0 }
    }

    /// Minimum distance between the two geometries, or -1 when it cannot be computed.
    pub fn distance(&self, other: &Self) -> f64 {
        unsafe { gdal_sys::OGR_G_Distance(self.c_geometry(), other.c_geometry()) }
    }
}
