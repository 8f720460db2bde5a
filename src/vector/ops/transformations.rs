use gdal_sys::OGRGeometryH;

use crate::driver::CslStringList;
use crate::errors::{GdalError, Result};
use crate::spatial_ref::{CoordTransform, SpatialRef};
use crate::utils::{_last_null_pointer_err, _ogr_result};
use crate::vector::Geometry;

fn derived(c_geom: OGRGeometryH, method_name: &'static str) -> Result<Geometry> {
    if c_geom.is_null() {
        return Err(_last_null_pointer_err(method_name));
    }
    Ok(unsafe { Geometry::with_c_geometry(c_geom) })
}

/// # Geometry Transformations
impl Geometry {
    /// Reprojects the coordinates in place.
    pub fn transform_inplace(&mut self, htransform: &CoordTransform) -> Result<()> {
        let rv = unsafe { gdal_sys::OGR_G_Transform(self.c_geometry(), htransform.to_c_hct()) };
        _ogr_result(rv, "OGR_G_Transform")
    }

    /// Reprojects a copy of the geometry.
    pub fn transform(&self, htransform: &CoordTransform) -> Result<Geometry> {
        let mut copy = self.clone();
        copy.transform_inplace(htransform)?;
        Ok(copy)
    }

    /// Reprojects the coordinates in place into `spatial_ref`.
    ///
    /// The geometry must already carry a spatial reference.
    pub fn transform_to_inplace(&mut self, spatial_ref: &SpatialRef) -> Result<()> {
        let rv =
            unsafe { gdal_sys::OGR_G_TransformTo(self.c_geometry(), spatial_ref.to_c_hsrs()) };
        _ogr_result(rv, "OGR_G_TransformTo")
    }

    pub fn transform_to(&self, spatial_ref: &SpatialRef) -> Result<Geometry> {
        let mut copy = self.clone();
        copy.transform_to_inplace(spatial_ref)?;
        Ok(copy)
    }

    pub fn convex_hull(&self) -> Result<Geometry> {
        derived(
            unsafe { gdal_sys::OGR_G_ConvexHull(self.c_geometry()) },
            "OGR_G_ConvexHull",
        )
    }

    /// Delaunay triangulation of the vertices, as a collection of polygons.
    ///
    /// `tolerance` snaps close vertices together; `None` means no snapping.
    pub fn delaunay_triangulation(&self, tolerance: Option<f64>) -> Result<Self> {
        derived(
            unsafe {
                gdal_sys::OGR_G_DelaunayTriangulation(
                    self.c_geometry(),
                    tolerance.unwrap_or(0.0),
                    0,
                )
            },
            "OGR_G_DelaunayTriangulation",
        )
    }

    /// Douglas-Peucker simplification.
    pub fn simplify(&self, tolerance: f64) -> Result<Self> {
        derived(
            unsafe { gdal_sys::OGR_G_Simplify(self.c_geometry(), tolerance) },
            "OGR_G_Simplify",
        )
    }

    /// Like [`Geometry::simplify`], never producing an invalid geometry.
    pub fn simplify_preserve_topology(&self, tolerance: f64) -> Result<Self> {
        derived(
            unsafe { gdal_sys::OGR_G_SimplifyPreserveTopology(self.c_geometry(), tolerance) },
            "OGR_G_SimplifyPreserveTopology",
        )
    }

    /// Buffers the geometry by `distance`, in the units of its coordinates.
    ///
    /// `n_quad_segs` is the number of segments approximating a quarter circle.
    pub fn buffer(&self, distance: f64, n_quad_segs: u32) -> Result<Self> {
        derived(
            unsafe { gdal_sys::OGR_G_Buffer(self.c_geometry(), distance, n_quad_segs as i32) },
            "OGR_G_Buffer",
        )
    }

    /// Attempts to make an invalid geometry valid without losing vertices.
    ///
    /// Valid geometries come back as a copy. `opts` such as `METHOD=STRUCTURE`
    /// need GDAL 3.4 and GEOS 3.8.
    pub fn make_valid(&self, opts: &CslStringList) -> Result<Geometry> {
        #[cfg(any(major_ge_4, all(major_is_3, minor_ge_4)))]
        let c_geom = unsafe { gdal_sys::OGR_G_MakeValidEx(self.c_geometry(), opts.as_ptr()) };

        #[cfg(not(any(major_ge_4, all(major_is_3, minor_ge_4))))]
        let c_geom = {
            if !opts.is_empty() {
                return Err(GdalError::BadArgument(
                    "options to make_valid require GDAL >= 3.4".into(),
                ));
            }
            unsafe { gdal_sys::OGR_G_MakeValid(self.c_geometry()) }
        };

        derived(c_geom, "OGR_G_MakeValid").map_err(|e| match e {
            GdalError::NullPointer { msg, .. } => {
                GdalError::BadArgument(format!("geometry cannot be made valid: {msg}"))
            }
            other => other,
        })
    }
}
