use std::ffi::c_int;
use std::fmt::{self, Debug, Formatter};
use std::mem::ManuallyDrop;
use std::ptr;

use gdal_sys::{self, OGRErr, OGRGeometryH, OGRwkbGeometryType};

use crate::errors::*;
use crate::spatial_ref::SpatialRef;
use crate::utils::{_last_null_pointer_err, _ogr_result, _string};
use crate::vector::{Envelope, Envelope3D};

/// OGR Geometry
///
/// A geometry is a plain value: it is owned by Rust, not by a dataset, and stays
/// usable after the dataset it was read from is closed.
pub struct Geometry {
    c_geometry: OGRGeometryH,
}

// Each Geometry owns its native object exclusively.
unsafe impl Send for Geometry {}

impl Geometry {
    /// Takes ownership of a native geometry.
    ///
    /// # Safety
    /// `c_geometry` must be a valid geometry that nothing else frees.
    pub unsafe fn with_c_geometry(c_geometry: OGRGeometryH) -> Geometry {
        Geometry { c_geometry }
    }

    /// Copies a geometry owned by somebody else, such as a feature.
    ///
    /// # Safety
    /// `c_geometry` must be a valid geometry.
    pub unsafe fn from_borrowed(c_geometry: OGRGeometryH) -> Result<Geometry> {
        let c_clone = gdal_sys::OGR_G_Clone(c_geometry);
        if c_clone.is_null() {
            return Err(_last_null_pointer_err("OGR_G_Clone"));
        }
        Ok(Geometry::with_c_geometry(c_clone))
    }

    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// The pointer must not outlive `self`.
    pub unsafe fn c_geometry(&self) -> OGRGeometryH {
        self.c_geometry
    }

    /// Gives up ownership of the native geometry.
    ///
    /// # Safety
    /// The caller becomes responsible for freeing the returned pointer.
    pub unsafe fn into_c_geometry(self) -> OGRGeometryH {
        let this = ManuallyDrop::new(self);
        this.c_geometry
    }

    /// Creates an empty geometry of the given type, such as `wkbPolygon`.
    pub fn empty(geometry_type: OGRwkbGeometryType::Type) -> Result<Geometry> {
        let c_geom = unsafe { gdal_sys::OGR_G_CreateGeometry(geometry_type) };
        if c_geom.is_null() {
            return Err(_last_null_pointer_err("OGR_G_CreateGeometry"));
        };
        Ok(unsafe { Geometry::with_c_geometry(c_geom) })
    }

    /// A rectangular polygon from its west, south, east and north bounds.
    pub fn bbox(w: f64, s: f64, e: f64, n: f64) -> Result<Geometry> {
        Geometry::from_wkt(&format!(
            "POLYGON (({w} {n}, {e} {n}, {e} {s}, {w} {s}, {w} {n}))"
        ))
    }

    pub fn geometry_type(&self) -> OGRwkbGeometryType::Type {
        unsafe { gdal_sys::OGR_G_GetGeometryType(self.c_geometry) }
    }

    /// The geometry type without its z/m flags.
    pub fn flat_geometry_type(&self) -> OGRwkbGeometryType::Type {
        unsafe { gdal_sys::OGR_GT_Flatten(self.geometry_type()) }
    }

    /// WKT name of the type, e.g. `"POLYGON"`.
    pub fn geometry_name(&self) -> String {
        let rv = unsafe { gdal_sys::OGR_G_GetGeometryName(self.c_geometry) };
        _string(rv)
    }

    /// Topological dimension: `0` for points, `1` for curves, `2` for surfaces.
    pub fn dimension(&self) -> usize {
        (unsafe { gdal_sys::OGR_G_GetDimension(self.c_geometry) }) as usize
    }

    /// `2` or `3`.
    pub fn coordinate_dimension(&self) -> usize {
        (unsafe { gdal_sys::OGR_G_GetCoordinateDimension(self.c_geometry) }) as usize
    }

    pub fn envelope(&self) -> Envelope {
        if self.is_empty() {
            return Envelope::empty();
        }
        let mut envelope: gdal_sys::OGREnvelope = Envelope::empty().into();
        unsafe { gdal_sys::OGR_G_GetEnvelope(self.c_geometry, &mut envelope) };
        envelope.into()
    }

    pub fn envelope_3d(&self) -> Envelope3D {
        if self.is_empty() {
            return Envelope3D::empty();
        }
        let mut envelope = gdal_sys::OGREnvelope3D {
            MinX: 0.0,
            MaxX: 0.0,
            MinY: 0.0,
            MaxY: 0.0,
            MinZ: 0.0,
            MaxZ: 0.0,
        };
        unsafe { gdal_sys::OGR_G_GetEnvelope3D(self.c_geometry, &mut envelope) };
        envelope.into()
    }

    /// Area of a surface, `0.0` for other geometries.
    pub fn area(&self) -> f64 {
        unsafe { gdal_sys::OGR_G_Area(self.c_geometry) }
    }

    /// Length of curves; for surfaces the length of all rings, `0.0` for points.
    pub fn length(&self) -> f64 {
        match self.flat_geometry_type() {
            OGRwkbGeometryType::wkbLineString | OGRwkbGeometryType::wkbLinearRing => self
                .get_point_vec()
                .windows(2)
                .map(|w| ((w[1].0 - w[0].0).powi(2) + (w[1].1 - w[0].1).powi(2)).sqrt())
                .sum(),
            OGRwkbGeometryType::wkbPoint | OGRwkbGeometryType::wkbMultiPoint => 0.0,
            _ => self
                .children()
                .iter()
                .map(|child| child.map(|c| c.length()).unwrap_or(0.0))
                .sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        unsafe { gdal_sys::OGR_G_IsEmpty(self.c_geometry) == 1 }
    }

    /// Whether the geometry is valid according to the OGC rules. Needs GEOS.
    pub fn is_valid(&self) -> bool {
        unsafe { gdal_sys::OGR_G_IsValid(self.c_geometry) == 1 }
    }

    pub fn is_simple(&self) -> bool {
        unsafe { gdal_sys::OGR_G_IsSimple(self.c_geometry) == 1 }
    }

    pub fn is_ring(&self) -> bool {
        unsafe { gdal_sys::OGR_G_IsRing(self.c_geometry) == 1 }
    }

    /// Closes the rings of polygons by repeating their first point where needed.
    pub fn close_rings(&mut self) {
        unsafe { gdal_sys::OGR_G_CloseRings(self.c_geometry) };
    }

    pub fn centroid(&self) -> Result<Geometry> {
        let centroid = Geometry::empty(OGRwkbGeometryType::wkbPoint)?;
        let rv = unsafe { gdal_sys::OGR_G_Centroid(self.c_geometry, centroid.c_geometry) } as OGRErr::Type;
        _ogr_result(rv, "OGR_G_Centroid")?;
        Ok(centroid)
    }

    /// Number of direct sub-geometries: polygon rings, or members of a collection.
    pub fn geometry_count(&self) -> usize {
        (unsafe { gdal_sys::OGR_G_GetGeometryCount(self.c_geometry) }) as usize
    }

    /// A copy of the sub-geometry at `index`.
    pub fn get_geometry(&self, index: usize) -> Result<Geometry> {
        let count = self.geometry_count();
        if index >= count {
            return Err(GdalError::OutOfRange(format!(
                "geometry {index} does not exist, the {} has {count}",
                self.geometry_name()
            )));
        }
        let c_geom = unsafe { gdal_sys::OGR_G_GetGeometryRef(self.c_geometry, index as c_int) };
        if c_geom.is_null() {
            return Err(_last_null_pointer_err("OGR_G_GetGeometryRef"));
        }
        unsafe { Geometry::from_borrowed(c_geom) }
    }

    /// Appends a copy of `sub` to a polygon or collection.
    pub fn add_geometry(&mut self, sub: &Geometry) -> Result<()> {
        let rv = unsafe { gdal_sys::OGR_G_AddGeometry(self.c_geometry, sub.c_geometry) };
        if rv == OGRErr::OGRERR_UNSUPPORTED_GEOMETRY_TYPE {
            return Err(GdalError::BadArgument(format!(
                "a {} cannot be added to a {}",
                sub.geometry_name(),
                self.geometry_name()
            )));
        }
        _ogr_result(rv, "OGR_G_AddGeometry")
    }

    pub fn remove_geometry(&mut self, index: usize) -> Result<()> {
        if index >= self.geometry_count() {
            return Err(GdalError::OutOfRange(format!(
                "geometry {index} does not exist"
            )));
        }
        let rv = unsafe { gdal_sys::OGR_G_RemoveGeometry(self.c_geometry, index as c_int, 1) };
        _ogr_result(rv, "OGR_G_RemoveGeometry")
    }

    /// Removes every sub-geometry.
    pub fn clear_geometries(&mut self) -> Result<()> {
        let rv = unsafe { gdal_sys::OGR_G_RemoveGeometry(self.c_geometry, -1, 1) };
        _ogr_result(rv, "OGR_G_RemoveGeometry")
    }

    /// The sub-geometries, numbered from `0`.
    pub fn children(&self) -> GeometryChildren<'_> {
        GeometryChildren { geometry: self }
    }

    pub fn point_count(&self) -> usize {
        (unsafe { gdal_sys::OGR_G_GetPointCount(self.c_geometry) }) as usize
    }

    /// The point at `index` as `(x, y, z)`.
    pub fn get_point(&self, index: usize) -> Result<(f64, f64, f64)> {
        let count = self.point_count();
        if index >= count {
            return Err(GdalError::OutOfRange(format!(
                "point {index} does not exist, the {} has {count}",
                self.geometry_name()
            )));
        }
        let mut x = 0.0;
        let mut y = 0.0;
        let mut z = 0.0;
        unsafe { gdal_sys::OGR_G_GetPoint(self.c_geometry, index as c_int, &mut x, &mut y, &mut z) };
        Ok((x, y, z))
    }

    pub fn get_point_vec(&self) -> Vec<(f64, f64, f64)> {
        (0..self.point_count())
            .filter_map(|i| self.get_point(i).ok())
            .collect()
    }

    pub fn add_point(&mut self, (x, y, z): (f64, f64, f64)) {
        unsafe { gdal_sys::OGR_G_AddPoint(self.c_geometry, x, y, z) };
    }

    pub fn add_point_2d(&mut self, (x, y): (f64, f64)) {
        unsafe { gdal_sys::OGR_G_AddPoint_2D(self.c_geometry, x, y) };
    }

    /// Replaces the point at `index`; `index == point_count()` appends.
    pub fn set_point(&mut self, index: usize, (x, y, z): (f64, f64, f64)) -> Result<()> {
        let count = self.point_count();
        if index > count {
            return Err(GdalError::OutOfRange(format!(
                "point {index} is past the end of the {count} points"
            )));
        }
        unsafe { gdal_sys::OGR_G_SetPoint(self.c_geometry, index as c_int, x, y, z) };
        Ok(())
    }

    /// The points of a point or curve, numbered from `0`.
    pub fn points(&self) -> GeometryPoints<'_> {
        GeometryPoints { geometry: self }
    }

    /// A copy of the spatial reference assigned to this geometry.
    pub fn spatial_ref(&self) -> Result<Option<SpatialRef>> {
        let c_spatial_ref = unsafe { gdal_sys::OGR_G_GetSpatialReference(self.c_geometry) };
        if c_spatial_ref.is_null() {
            return Ok(None);
        }
        unsafe { SpatialRef::from_c_obj(c_spatial_ref) }.map(Some)
    }

    /// Assigns a spatial reference without transforming coordinates; `None` clears it.
    pub fn set_spatial_ref(&mut self, spatial_ref: Option<&SpatialRef>) {
        let c_spatial_ref = spatial_ref.map_or(ptr::null_mut(), |srs| unsafe { srs.to_c_hsrs() });
        unsafe { gdal_sys::OGR_G_AssignSpatialReference(self.c_geometry, c_spatial_ref) };
    }
}

impl Clone for Geometry {
    fn clone(&self) -> Geometry {
        let c_geometry = unsafe { gdal_sys::OGR_G_Clone(self.c_geometry) };
        Geometry { c_geometry }
    }
}

impl Drop for Geometry {
    fn drop(&mut self) {
        unsafe { gdal_sys::OGR_G_DestroyGeometry(self.c_geometry) };
    }
}

impl PartialEq for Geometry {
    fn eq(&self, other: &Self) -> bool {
        unsafe { gdal_sys::OGR_G_Equals(self.c_geometry, other.c_geometry) == 1 }
    }
}

impl Debug for Geometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.wkt() {
            Ok(wkt) => f.write_str(wkt.as_str()),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// The sub-geometries of a polygon or collection.
pub struct GeometryChildren<'a> {
    geometry: &'a Geometry,
}

impl GeometryChildren<'_> {
    pub fn count(&self) -> usize {
        self.geometry.geometry_count()
    }

    pub fn get(&self, index: usize) -> Result<Geometry> {
        self.geometry.get_geometry(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Geometry>> + '_ {
        (0..self.count()).map(|i| self.get(i))
    }

    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(Geometry) -> Result<()>,
    {
        for child in self.iter() {
            f(child?)?;
        }
        Ok(())
    }

    pub fn map<R, F>(&self, mut f: F) -> Result<Vec<R>>
    where
        F: FnMut(Geometry) -> Result<R>,
    {
        self.iter().map(|child| f(child?)).collect()
    }
}

/// The points of a point or curve.
pub struct GeometryPoints<'a> {
    geometry: &'a Geometry,
}

impl GeometryPoints<'_> {
    pub fn count(&self) -> usize {
        self.geometry.point_count()
    }

    pub fn get(&self, index: usize) -> Result<(f64, f64, f64)> {
        self.geometry.get_point(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.geometry.get_point_vec().into_iter()
    }

    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut((f64, f64, f64)) -> Result<()>,
    {
        for point in self.iter() {
            f(point)?;
        }
        Ok(())
    }

    pub fn map<R, F>(&self, f: F) -> Result<Vec<R>>
    where
        F: FnMut((f64, f64, f64)) -> Result<R>,
    {
        self.iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_near;

    #[test]
    fn test_create_empty() {
        let geom = Geometry::empty(OGRwkbGeometryType::wkbPolygon).unwrap();
        assert!(geom.is_empty());
        assert_eq!(geom.geometry_name(), "POLYGON");
        assert!(geom.envelope().is_empty());
    }

    #[test]
    fn test_area_and_length() {
        let square = Geometry::bbox(0.0, 0.0, 2.0, 2.0).unwrap();
        assert_near!(square.area(), 4.0);
        assert_near!(square.length(), 8.0);
        let line = Geometry::from_wkt("LINESTRING (0 0, 3 4)").unwrap();
        assert_near!(line.length(), 5.0);
        assert_eq!(line.area(), 0.0);
    }

    #[test]
    fn test_points() {
        let mut line = Geometry::empty(OGRwkbGeometryType::wkbLineString).unwrap();
        line.add_point_2d((1.0, 2.0));
        line.add_point((3.0, 4.0, 5.0));
        assert_eq!(line.points().count(), 2);
        assert_eq!(line.get_point(1).unwrap(), (3.0, 4.0, 5.0));
        line.set_point(0, (0.0, 0.0, 0.0)).unwrap();
        assert_eq!(line.points().get(0).unwrap(), (0.0, 0.0, 0.0));
        assert!(matches!(line.get_point(2), Err(GdalError::OutOfRange(_))));
        assert!(line.set_point(5, (0.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_children() {
        let mut multi = Geometry::empty(OGRwkbGeometryType::wkbMultiPoint).unwrap();
        for x in 0..3 {
            let mut point = Geometry::empty(OGRwkbGeometryType::wkbPoint).unwrap();
            point.add_point_2d((x as f64, 0.0));
            multi.add_geometry(&point).unwrap();
        }
        assert_eq!(multi.children().count(), 3);
        let xs = multi
            .children()
            .map(|p| Ok(p.get_point(0)?.0))
            .unwrap();
        assert_eq!(xs, vec![0.0, 1.0, 2.0]);
        multi.remove_geometry(1).unwrap();
        assert_eq!(multi.geometry_count(), 2);
        assert!(multi.remove_geometry(2).is_err());

        let line = Geometry::from_wkt("LINESTRING (0 0, 1 1)").unwrap();
        assert!(matches!(
            multi.add_geometry(&line),
            Err(GdalError::BadArgument(_))
        ));
    }

    #[test]
    fn test_close_rings() {
        let mut polygon = Geometry::empty(OGRwkbGeometryType::wkbPolygon).unwrap();
        let mut ring = Geometry::empty(OGRwkbGeometryType::wkbLinearRing).unwrap();
        ring.add_point_2d((0.0, 0.0));
        ring.add_point_2d((1.0, 0.0));
        ring.add_point_2d((1.0, 1.0));
        polygon.add_geometry(&ring).unwrap();
        polygon.close_rings();
        assert_eq!(polygon.get_geometry(0).unwrap().point_count(), 4);
    }

    #[test]
    fn test_spatial_ref_is_copied() {
        let mut geom = Geometry::from_wkt("POINT (1 2)").unwrap();
        assert!(geom.spatial_ref().unwrap().is_none());
        let srs = SpatialRef::from_epsg(4326).unwrap();
        geom.set_spatial_ref(Some(&srs));
        drop(srs);
        assert_eq!(geom.spatial_ref().unwrap().unwrap().auth_code().unwrap(), 4326);
    }

    #[test]
    fn test_envelope() {
        let geom = Geometry::from_wkt("LINESTRING (1 5, 3 2)").unwrap();
        assert_eq!(geom.envelope(), Envelope::new(1.0, 3.0, 2.0, 5.0));
        let geom = Geometry::from_wkt("LINESTRING Z (1 5 7, 3 2 9)").unwrap();
        let envelope = geom.envelope_3d();
        assert_eq!((envelope.min_z, envelope.max_z), (7.0, 9.0));
    }

    #[test]
    fn test_geometry_is_send() {
        let geom = Geometry::from_wkt("POINT (1 2)").unwrap();
        let handle = std::thread::spawn(move || geom.get_point(0).unwrap());
        assert_eq!(handle.join().unwrap(), (1.0, 2.0, 0.0));
    }
}
