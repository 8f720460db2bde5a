use gdal_sys::OGRwkbGeometryType;

use crate::errors::Result;
use crate::vector::{Geometry, ToGdal};

impl ToGdal for geo_types::Point<f64> {
    fn to_gdal(&self) -> Result<Geometry> {
        let mut geom = Geometry::empty(OGRwkbGeometryType::wkbPoint)?;
        geom.add_point_2d(self.x_y());
        Ok(geom)
    }
}

impl ToGdal for geo_types::MultiPoint<f64> {
    fn to_gdal(&self) -> Result<Geometry> {
        collect(OGRwkbGeometryType::wkbMultiPoint, self.0.iter())
    }
}

fn geometry_with_points(
    wkb_type: OGRwkbGeometryType::Type,
    points: &geo_types::LineString<f64>,
) -> Result<Geometry> {
    let mut geom = Geometry::empty(wkb_type)?;
    for coord in points.coords() {
        geom.add_point_2d(coord.x_y());
    }
    Ok(geom)
}

fn collect<'a, T: ToGdal + 'a>(
    wkb_type: OGRwkbGeometryType::Type,
    members: impl Iterator<Item = &'a T>,
) -> Result<Geometry> {
    let mut geom = Geometry::empty(wkb_type)?;
    for member in members {
        geom.add_geometry(&member.to_gdal()?)?;
    }
    Ok(geom)
}

impl ToGdal for geo_types::Line<f64> {
    fn to_gdal(&self) -> Result<Geometry> {
        let mut geom = Geometry::empty(OGRwkbGeometryType::wkbLineString)?;
        geom.add_point_2d(self.start.x_y());
        geom.add_point_2d(self.end.x_y());
        Ok(geom)
    }
}

impl ToGdal for geo_types::LineString<f64> {
    fn to_gdal(&self) -> Result<Geometry> {
        geometry_with_points(OGRwkbGeometryType::wkbLineString, self)
    }
}

impl ToGdal for geo_types::MultiLineString<f64> {
    fn to_gdal(&self) -> Result<Geometry> {
        collect(OGRwkbGeometryType::wkbMultiLineString, self.0.iter())
    }
}

impl ToGdal for geo_types::Polygon<f64> {
    fn to_gdal(&self) -> Result<Geometry> {
        let mut geom = Geometry::empty(OGRwkbGeometryType::wkbPolygon)?;
        let exterior = geometry_with_points(OGRwkbGeometryType::wkbLinearRing, self.exterior())?;
        geom.add_geometry(&exterior)?;
        for ring in self.interiors() {
            geom.add_geometry(&geometry_with_points(
                OGRwkbGeometryType::wkbLinearRing,
                ring,
            )?)?;
        }
        Ok(geom)
    }
}

impl ToGdal for geo_types::MultiPolygon<f64> {
    fn to_gdal(&self) -> Result<Geometry> {
        collect(OGRwkbGeometryType::wkbMultiPolygon, self.0.iter())
    }
}

impl ToGdal for geo_types::Rect<f64> {
    fn to_gdal(&self) -> Result<Geometry> {
        self.to_polygon().to_gdal()
    }
}

impl ToGdal for geo_types::Triangle<f64> {
    fn to_gdal(&self) -> Result<Geometry> {
        self.to_polygon().to_gdal()
    }
}

impl ToGdal for geo_types::GeometryCollection<f64> {
    fn to_gdal(&self) -> Result<Geometry> {
        collect(OGRwkbGeometryType::wkbGeometryCollection, self.0.iter())
    }
}

impl ToGdal for geo_types::Geometry<f64> {
    fn to_gdal(&self) -> Result<Geometry> {
        match self {
            geo_types::Geometry::Point(c) => c.to_gdal(),
            geo_types::Geometry::Line(c) => c.to_gdal(),
            geo_types::Geometry::LineString(c) => c.to_gdal(),
            geo_types::Geometry::Polygon(c) => c.to_gdal(),
            geo_types::Geometry::MultiPoint(c) => c.to_gdal(),
            geo_types::Geometry::MultiLineString(c) => c.to_gdal(),
            geo_types::Geometry::MultiPolygon(c) => c.to_gdal(),
            geo_types::Geometry::GeometryCollection(c) => c.to_gdal(),
            geo_types::Geometry::Rect(c) => c.to_gdal(),
            geo_types::Geometry::Triangle(c) => c.to_gdal(),
        }
    }
}
