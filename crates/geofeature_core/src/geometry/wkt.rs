//! WKT text storage form.
//!
//! Geometries are stored as EWKT (`SRID=4326;POINT(1 2)`). Text is produced
//! and parsed by the `wkt` crate; this module only maps between its types and
//! `Geometry` and owns the SRID prefix.

use super::{GeometryCodec, GeometryError, StoredGeometry};
use crate::model::feature::{Geometry, Position};
use wkt::types::{
    Coord, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon,
};
use wkt::Wkt;

/// Spatial reference used for all stored geometries (WGS 84).
pub const STORAGE_SRID: u32 = 4326;

/// EWKT codec with a fixed SRID.
#[derive(Debug, Clone, Copy, Default)]
pub struct WktCodec;

impl GeometryCodec for WktCodec {
    fn to_storage_form(&self, geometry: &Geometry) -> Result<StoredGeometry, GeometryError> {
        geometry.validate()?;
        Ok(StoredGeometry::new(format!(
            "SRID={STORAGE_SRID};{}",
            to_wkt(geometry)
        )))
    }

    fn from_storage_form(&self, stored: &StoredGeometry) -> Result<Geometry, GeometryError> {
        let body = strip_srid(stored.as_str())?;
        let parsed = body
            .trim()
            .parse::<Wkt<f64>>()
            .map_err(|err| GeometryError::Wkt(err.to_string()))?;
        let geometry = from_wkt(parsed)?;
        geometry.validate()?;
        Ok(geometry)
    }
}

fn strip_srid(text: &str) -> Result<&str, GeometryError> {
    let Some(rest) = text.trim_start().strip_prefix("SRID=") else {
        return Ok(text);
    };
    let (srid, body) = rest
        .split_once(';')
        .ok_or_else(|| GeometryError::Wkt("SRID prefix without `;`".to_string()))?;
    if srid.trim() != STORAGE_SRID.to_string() {
        return Err(GeometryError::UnsupportedSrid(srid.trim().to_string()));
    }
    Ok(body)
}

// Callers validate first, so every position has at least two ordinates.
fn to_coord(position: &[f64]) -> Coord<f64> {
    Coord {
        x: position[0],
        y: position[1],
        z: position.get(2).copied(),
        m: None,
    }
}

fn to_line(positions: &[Position]) -> LineString<f64> {
    LineString(positions.iter().map(|p| to_coord(p)).collect())
}

fn to_polygon(rings: &[Vec<Position>]) -> Polygon<f64> {
    Polygon(rings.iter().map(|ring| to_line(ring)).collect())
}

fn to_wkt(geometry: &Geometry) -> Wkt<f64> {
    match geometry {
        Geometry::Point { coordinates } => Wkt::Point(Point(Some(to_coord(coordinates)))),
        Geometry::LineString { coordinates } => Wkt::LineString(to_line(coordinates)),
        Geometry::Polygon { coordinates } => Wkt::Polygon(to_polygon(coordinates)),
        Geometry::MultiPoint { coordinates } => Wkt::MultiPoint(MultiPoint(
            coordinates
                .iter()
                .map(|p| Point(Some(to_coord(p))))
                .collect(),
        )),
        Geometry::MultiLineString { coordinates } => Wkt::MultiLineString(MultiLineString(
            coordinates.iter().map(|line| to_line(line)).collect(),
        )),
        Geometry::MultiPolygon { coordinates } => Wkt::MultiPolygon(MultiPolygon(
            coordinates
                .iter()
                .map(|polygon| to_polygon(polygon))
                .collect(),
        )),
        Geometry::GeometryCollection { geometries } => {
            Wkt::GeometryCollection(GeometryCollection(geometries.iter().map(to_wkt).collect()))
        }
    }
}

fn from_coord(coord: Coord<f64>) -> Result<Position, GeometryError> {
    if coord.m.is_some() {
        return Err(GeometryError::Wkt("M ordinates are not supported".to_string()));
    }
    let mut position = vec![coord.x, coord.y];
    position.extend(coord.z);
    Ok(position)
}

fn from_point(point: Point<f64>) -> Result<Position, GeometryError> {
    match point.0 {
        Some(coord) => from_coord(coord),
        None => Err(GeometryError::Wkt("POINT EMPTY is not supported".to_string())),
    }
}

fn from_line(line: LineString<f64>) -> Result<Vec<Position>, GeometryError> {
    line.0.into_iter().map(from_coord).collect()
}

fn from_polygon(polygon: Polygon<f64>) -> Result<Vec<Vec<Position>>, GeometryError> {
    polygon.0.into_iter().map(from_line).collect()
}

fn from_wkt(parsed: Wkt<f64>) -> Result<Geometry, GeometryError> {
    Ok(match parsed {
        Wkt::Point(point) => Geometry::Point {
            coordinates: from_point(point)?,
        },
        Wkt::LineString(line) => Geometry::LineString {
            coordinates: from_line(line)?,
        },
        Wkt::Polygon(polygon) => Geometry::Polygon {
            coordinates: from_polygon(polygon)?,
        },
        Wkt::MultiPoint(points) => Geometry::MultiPoint {
            coordinates: points.0.into_iter().map(from_point).collect::<Result<_, _>>()?,
        },
        Wkt::MultiLineString(lines) => Geometry::MultiLineString {
            coordinates: lines.0.into_iter().map(from_line).collect::<Result<_, _>>()?,
        },
        Wkt::MultiPolygon(polygons) => Geometry::MultiPolygon {
            coordinates: polygons
                .0
                .into_iter()
                .map(from_polygon)
                .collect::<Result<_, _>>()?,
        },
        Wkt::GeometryCollection(collection) => Geometry::GeometryCollection {
            geometries: collection
                .0
                .into_iter()
                .map(from_wkt)
                .collect::<Result<_, _>>()?,
        },
    })
}
