//! Geometry conversion between GeoJSON and the storage form.
//!
//! # Responsibility
//! - Turn raw GeoJSON geometry values into validated `Geometry`.
//! - Define the codec contract used by the insert and read paths.
//!
//! # Invariants
//! - Codecs only encode geometries that pass `Geometry::validate()`.
//! - `from_storage_form(to_storage_form(g)) == g` for every valid `g`.

use crate::model::feature::{Geometry, GeometryKind};
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod wkt;

pub use wkt::WktCodec;

/// Opaque storage form of a geometry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredGeometry(String);

impl StoredGeometry {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Geometry parse, validation or conversion failure.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    MissingGeometry,
    MissingType,
    UnsupportedType(String),
    InvalidJson(String),
    InvalidPosition {
        dimensions: usize,
    },
    NonFiniteCoordinate,
    MixedDimensions,
    TooFewPositions {
        kind: GeometryKind,
        expected: usize,
        actual: usize,
    },
    UnclosedRing,
    EmptyPolygon,
    UnsupportedSrid(String),
    Wkt(String),
    /// A stored row's `geometry_type` disagrees with its decoded geometry.
    KindMismatch {
        stored: GeometryKind,
        decoded: GeometryKind,
    },
}

impl Display for GeometryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingGeometry => write!(f, "geometry cannot be null"),
            Self::MissingType => write!(f, "geometry has no string `type` member"),
            Self::UnsupportedType(name) => write!(f, "unsupported geometry type `{name}`"),
            Self::InvalidJson(message) => write!(f, "invalid geometry: {message}"),
            Self::InvalidPosition { dimensions } => write!(
                f,
                "position must have 2 or 3 ordinates, got {dimensions}"
            ),
            Self::NonFiniteCoordinate => write!(f, "coordinates must be finite numbers"),
            Self::MixedDimensions => {
                write!(f, "all positions of a geometry must have the same dimension")
            }
            Self::TooFewPositions {
                kind,
                expected,
                actual,
            } => write!(
                f,
                "{} needs at least {expected} positions, got {actual}",
                kind.as_str()
            ),
            Self::UnclosedRing => write!(f, "polygon ring must start and end at the same position"),
            Self::EmptyPolygon => write!(f, "polygon must have at least one ring"),
            Self::UnsupportedSrid(srid) => write!(f, "unsupported SRID `{srid}`"),
            Self::Wkt(message) => write!(f, "invalid WKT: {message}"),
            Self::KindMismatch { stored, decoded } => write!(
                f,
                "stored geometry type `{}` does not match decoded `{}`",
                stored.as_str(),
                decoded.as_str()
            ),
        }
    }
}

impl Error for GeometryError {}

/// Conversion collaborator between `Geometry` and its storage form.
pub trait GeometryCodec {
    /// Encodes a geometry for persistence. Used on the insert path.
    fn to_storage_form(&self, geometry: &Geometry) -> Result<StoredGeometry, GeometryError>;
    /// Decodes a persisted geometry. Used on the read and compare paths.
    fn from_storage_form(&self, stored: &StoredGeometry) -> Result<Geometry, GeometryError>;
}

impl<C: GeometryCodec + ?Sized> GeometryCodec for &C {
    fn to_storage_form(&self, geometry: &Geometry) -> Result<StoredGeometry, GeometryError> {
        (**self).to_storage_form(geometry)
    }

    fn from_storage_form(&self, stored: &StoredGeometry) -> Result<Geometry, GeometryError> {
        (**self).from_storage_form(stored)
    }
}

/// Parses and validates one raw GeoJSON geometry value.
///
/// # Errors
/// - `MissingGeometry` for `null`.
/// - `MissingType` / `UnsupportedType` when the discriminant is unusable.
/// - `InvalidJson` when the coordinates do not fit the declared type.
/// - Any structural error from `Geometry::validate()`.
pub fn parse_geometry(value: &Value) -> Result<Geometry, GeometryError> {
    if value.is_null() {
        return Err(GeometryError::MissingGeometry);
    }

    let type_name = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(GeometryError::MissingType)?;
    if GeometryKind::from_name(type_name).is_none() {
        return Err(GeometryError::UnsupportedType(type_name.to_string()));
    }

    let geometry = Geometry::deserialize(value)
        .map_err(|err| GeometryError::InvalidJson(err.to_string()))?;
    geometry.validate()?;
    Ok(geometry)
}

#[cfg(test)]
mod tests {
    use super::{parse_geometry, GeometryError};
    use crate::model::feature::Geometry;
    use serde_json::json;

    #[test]
    fn parse_geometry_accepts_valid_polygon() {
        let geometry = parse_geometry(&json!({
            "type": "Polygon",
            "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]
        }))
        .unwrap();
        assert!(matches!(geometry, Geometry::Polygon { .. }));
    }

    #[test]
    fn parse_geometry_reports_specific_failures() {
        assert_eq!(
            parse_geometry(&serde_json::Value::Null),
            Err(GeometryError::MissingGeometry)
        );
        assert_eq!(
            parse_geometry(&json!({"coordinates": [0, 0]})),
            Err(GeometryError::MissingType)
        );
        assert_eq!(
            parse_geometry(&json!({"type": "Circle", "coordinates": [0, 0]})),
            Err(GeometryError::UnsupportedType("Circle".to_string()))
        );
        assert!(matches!(
            parse_geometry(&json!({"type": "Point", "coordinates": "x"})),
            Err(GeometryError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_geometry(&json!({"type": "LineString", "coordinates": [[0, 0]]})),
            Err(GeometryError::TooFewPositions { .. })
        ));
    }
}
