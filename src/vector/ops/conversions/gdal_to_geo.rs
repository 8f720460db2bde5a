use std::convert::{TryFrom, TryInto};

use gdal_sys::OGRwkbGeometryType;

use crate::errors::GdalError;
use crate::vector::Geometry;

fn mismatch(expected: &str, got: &geo_types::Geometry<f64>) -> GdalError {
    GdalError::ParseError(format!("expected a {expected} member, got {got:?}"))
}

fn line_string(geo: &Geometry) -> Result<geo_types::LineString<f64>, GdalError> {
    Ok(geo_types::LineString(
        geo.get_point_vec()
            .into_iter()
            .map(|(x, y, _)| geo_types::Coord { x, y })
            .collect(),
    ))
}

fn members<T>(
    geo: &Geometry,
    expected: &str,
    pick: impl Fn(geo_types::Geometry<f64>) -> Option<T>,
) -> Result<Vec<T>, GdalError> {
    geo.children()
        .iter()
        .map(|child| {
            let inner: geo_types::Geometry<f64> = (&child?).try_into()?;
            match pick(inner.clone()) {
                Some(v) => Ok(v),
                None => Err(mismatch(expected, &inner)),
            }
        })
        .collect()
}

impl TryFrom<&Geometry> for geo_types::Geometry<f64> {
    type Error = GdalError;

    /// Converts to a geo-types geometry, dropping any z or m values.
    fn try_from(geo: &Geometry) -> Result<geo_types::Geometry<f64>, Self::Error> {
        let geometry_type = geo.flat_geometry_type();
        match geometry_type {
            OGRwkbGeometryType::wkbPoint => {
                let (x, y, _) = geo.get_point(0)?;
                Ok(geo_types::Geometry::Point(geo_types::Point(
                    geo_types::Coord { x, y },
                )))
            }
            OGRwkbGeometryType::wkbMultiPoint => {
                let points = members(geo, "Point", |g| match g {
                    geo_types::Geometry::Point(p) => Some(p),
                    _ => None,
                })?;
                Ok(geo_types::Geometry::MultiPoint(geo_types::MultiPoint(
                    points,
                )))
            }
            OGRwkbGeometryType::wkbLineString | OGRwkbGeometryType::wkbLinearRing => {
                Ok(geo_types::Geometry::LineString(line_string(geo)?))
            }
            OGRwkbGeometryType::wkbMultiLineString => {
                let strings = members(geo, "LineString", |g| match g {
                    geo_types::Geometry::LineString(s) => Some(s),
                    _ => None,
                })?;
                Ok(geo_types::Geometry::MultiLineString(
                    geo_types::MultiLineString(strings),
                ))
            }
            OGRwkbGeometryType::wkbPolygon => {
                let mut rings = geo
                    .children()
                    .iter()
                    .map(|ring| line_string(&ring?))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter();
                let outer = rings
                    .next()
                    .unwrap_or_else(|| geo_types::LineString(Vec::new()));
                Ok(geo_types::Geometry::Polygon(geo_types::Polygon::new(
                    outer,
                    rings.collect(),
                )))
            }
            OGRwkbGeometryType::wkbMultiPolygon => {
                let polygons = members(geo, "Polygon", |g| match g {
                    geo_types::Geometry::Polygon(p) => Some(p),
                    _ => None,
                })?;
                Ok(geo_types::Geometry::MultiPolygon(geo_types::MultiPolygon(
                    polygons,
                )))
            }
            OGRwkbGeometryType::wkbGeometryCollection => {
                let geometry_list = members(geo, "Geometry", Some)?;
                Ok(geo_types::Geometry::GeometryCollection(
                    geo_types::GeometryCollection(geometry_list),
                ))
            }
            _ => Err(GdalError::Unsupported(format!(
                "cannot convert {} to geo-types",
                geo.geometry_name()
            ))),
        }
    }
}

impl TryFrom<Geometry> for geo_types::Geometry<f64> {
    type Error = GdalError;
    fn try_from(value: Geometry) -> Result<Self, Self::Error> {
        Self::try_from(&value)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryInto;

    use super::*;

    #[test]
    fn test_import_polygon_with_hole() {
        let wkt = "POLYGON ((0 0,0 10,10 10,10 0,0 0),(2 2,2 3,3 3,2 2))";
        let geom = Geometry::from_wkt(wkt).unwrap();
        let converted: geo_types::Geometry<f64> = geom.try_into().unwrap();
        match converted {
            geo_types::Geometry::Polygon(p) => {
                assert_eq!(p.exterior().0.len(), 5);
                assert_eq!(p.interiors().len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_import_collection() {
        let wkt = "GEOMETRYCOLLECTION (POINT (1 2),LINESTRING (0 0,1 1))";
        let geom = Geometry::from_wkt(wkt).unwrap();
        let converted: geo_types::Geometry<f64> = (&geom).try_into().unwrap();
        let expected = geo_types::Geometry::GeometryCollection(geo_types::GeometryCollection(vec![
            geo_types::Geometry::Point(geo_types::Point::new(1.0, 2.0)),
            geo_types::Geometry::LineString(geo_types::LineString::from(vec![
                (0.0, 0.0),
                (1.0, 1.0),
            ])),
        ]));
        assert_eq!(converted, expected);
    }

    #[test]
    fn test_unsupported_curve() {
        let geom = Geometry::from_wkt("CIRCULARSTRING (0 0,1 1,2 0)").unwrap();
        let converted: Result<geo_types::Geometry<f64>, _> = geom.try_into();
        assert!(matches!(converted, Err(GdalError::Unsupported(_))));
    }
}
