use std::ffi::c_int;
use std::ptr;

use gdal_sys::OGRCoordinateTransformationH;

use crate::errors::*;
use crate::spatial_ref::SpatialRef;
use crate::utils::{_last_error_msg, _last_null_pointer_err};

/// Defines a coordinate transformation from one [`SpatialRef`] to another.
#[derive(Debug)]
pub struct CoordTransform {
    inner: OGRCoordinateTransformationH,
    from: String,
    to: String,
}

// The transformation object is owned by this value and never shared.
unsafe impl Send for CoordTransform {}

impl Drop for CoordTransform {
    fn drop(&mut self) {
        unsafe { gdal_sys::OCTDestroyCoordinateTransformation(self.inner) };
    }
}

fn describe(srs: &SpatialRef) -> String {
    srs.authority()
        .or_else(|_| srs.to_proj4().map(|proj4| proj4.trim().to_string()))
        .unwrap_or_else(|_| "<unnamed>".to_string())
}

impl CoordTransform {
    /// Constructs a new transformation from `source` to `target`.
    ///
    /// See: [OCTNewCoordinateTransformation](https://gdal.org/api/ogr_srs_api.html#_CPPv430OCTNewCoordinateTransformation20OGRSpatialReferenceH20OGRSpatialReferenceH)
    pub fn new(source: &SpatialRef, target: &SpatialRef) -> Result<CoordTransform> {
        let c_obj = unsafe {
            gdal_sys::OCTNewCoordinateTransformation(source.to_c_hsrs(), target.to_c_hsrs())
        };
        if c_obj.is_null() {
            return Err(_last_null_pointer_err("OCTNewCoordinateTransformation"));
        }
        Ok(Self {
            inner: c_obj,
            from: describe(source),
            to: describe(target),
        })
    }

    /// Transform coordinates in place.
    ///
    /// # Arguments
    /// * `x` - slice of x coordinates
    /// * `y` - slice of y coordinates (must match x in length)
    /// * `z` - slice of z coordinates, or an empty slice to ignore
    ///
    /// Points outside the domain of the transformation fail with
    /// [`GdalError::OutOfRange`].
    pub fn transform_coords(&self, x: &mut [f64], y: &mut [f64], z: &mut [f64]) -> Result<()> {
        let nb_coords = x.len();
        if y.len() != nb_coords || (!z.is_empty() && z.len() != nb_coords) {
            return Err(GdalError::BadArgument(format!(
                "transform coordinate slices have different lengths: {} / {} / {}",
                nb_coords,
                y.len(),
                z.len()
            )));
        }
        let c_z = if z.is_empty() {
            ptr::null_mut()
        } else {
            z.as_mut_ptr()
        };
        let ok = unsafe {
            gdal_sys::OCTTransform(
                self.inner,
                nb_coords as c_int,
                x.as_mut_ptr(),
                y.as_mut_ptr(),
                c_z,
            ) == 1
        };
        if ok {
            return Ok(());
        }
        let msg = _last_error_msg();
        Err(GdalError::OutOfRange(if msg.trim().is_empty() {
            format!("cannot transform coordinates from {} to {}", self.from, self.to)
        } else {
            format!(
                "cannot transform coordinates from {} to {}: {}",
                self.from, self.to, msg
            )
        }))
    }

    /// Transforms a single `(x, y)` point.
    pub fn transform_point(&self, (x, y): (f64, f64)) -> Result<(f64, f64)> {
        let mut xs = [x];
        let mut ys = [y];
        self.transform_coords(&mut xs, &mut ys, &mut [])?;
        Ok((xs[0], ys[0]))
    }

    /// Transform bounding box, densifying the edges to account for nonlinear
    /// transformations.
    ///
    /// `bounds` is `[axis0_min, axis1_min, axis0_max, axis1_max]` in the axis order of
    /// the source; the result is in the axis order of the target.
    #[cfg(any(major_ge_4, all(major_is_3, minor_ge_4)))]
    pub fn transform_bounds(&self, bounds: &[f64; 4], densify_pts: i32) -> Result<[f64; 4]> {
        let mut out = [0.0f64; 4];
        let [out_xmin, out_ymin, out_xmax, out_ymax] = &mut out;
        let ok = unsafe {
            gdal_sys::OCTTransformBounds(
                self.inner,
                bounds[0],
                bounds[1],
                bounds[2],
                bounds[3],
                out_xmin,
                out_ymin,
                out_xmax,
                out_ymax,
                densify_pts as c_int,
            ) == 1
        };
        if !ok {
            return Err(GdalError::OutOfRange(format!(
                "cannot transform bounds from {} to {}: {}",
                self.from,
                self.to,
                _last_error_msg()
            )));
        }
        Ok(out)
    }

    /// Returns a C pointer to the allocated [`gdal_sys::OGRCoordinateTransformationH`] memory.
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn to_c_hct(&self) -> OGRCoordinateTransformationH {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_near;
    use crate::spatial_ref::AxisMappingStrategy;

    #[test]
    fn transform_point_to_web_mercator() {
        let mut wgs84 = SpatialRef::from_epsg(4326).unwrap();
        wgs84.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        let mut webmercator = SpatialRef::from_epsg(3857).unwrap();
        webmercator.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

        let transform = CoordTransform::new(&wgs84, &webmercator).unwrap();
        let (x, y) = transform.transform_point((0.0, 0.0)).unwrap();
        assert_near!(x, 0.0, epsilon = 1e-6);
        assert_near!(y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn out_of_range_point() {
        let _nolog = crate::test_utils::SuppressGDALErrorLog::new();
        let mut wgs84 = SpatialRef::from_epsg(4326).unwrap();
        wgs84.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        let mut webmercator = SpatialRef::from_epsg(3857).unwrap();
        webmercator.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

        let transform = CoordTransform::new(&wgs84, &webmercator).unwrap();
        let mut x = [1000000.0];
        let mut y = [1000000.0];
        let err = transform
            .transform_coords(&mut x, &mut y, &mut [])
            .unwrap_err();
        assert!(matches!(err, GdalError::OutOfRange(_)), "{err:?}");
    }

    #[test]
    fn mismatched_slices() {
        let wgs84 = SpatialRef::from_epsg(4326).unwrap();
        let transform = CoordTransform::new(&wgs84, &wgs84).unwrap();
        let err = transform
            .transform_coords(&mut [1.0, 2.0], &mut [1.0], &mut [])
            .unwrap_err();
        assert!(matches!(err, GdalError::BadArgument(_)));
    }

    #[cfg(any(major_ge_4, all(major_is_3, minor_ge_4)))]
    #[test]
    fn transform_bounds() {
        let bounds: [f64; 4] = [-180., -80., 180., 80.];
        let crs84 = SpatialRef::from_user_input("OGC:CRS84").unwrap();
        let webmercator = SpatialRef::from_epsg(3857).unwrap();
        let transform = CoordTransform::new(&crs84, &webmercator).unwrap();
        let out = transform.transform_bounds(&bounds, 21).unwrap();
        assert_near!(out[0], -20037508.342789244, epsilon = 1e-3);
        assert_near!(out[2], 20037508.342789244, epsilon = 1e-3);
        assert_near!(out[1], -15538711.096309224, epsilon = 1e-3);
        assert_near!(out[3], 15538711.09630923, epsilon = 1e-3);
    }
}
