//! Feature domain model.
//!
//! # Responsibility
//! - Define typed GeoJSON geometries and the property value union.
//! - Define the stored and pending-insert feature records.
//! - Provide structural validation for geometries.
//!
//! # Invariants
//! - Positions carry 2 or 3 finite ordinates.
//! - Property maps are ordered, so equality does not depend on key order.
//! - Integers compare exactly; `1` and `1.0` are the same value.

use crate::geometry::{GeometryError, StoredGeometry};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::BTreeMap;

/// Owning project identifier.
pub type ProjectId = i64;

/// Durable stored feature identifier.
pub type FeatureId = i64;

/// One coordinate tuple: `[x, y]` or `[x, y, z]`.
pub type Position = Vec<f64>;

/// Ordered property mapping.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Property key carrying the classification tag on the wire.
pub const TAG_KEY: &str = "type";

/// Tag used when neither the properties nor the geometry provide one.
pub const UNKNOWN_TAG: &str = "unknown";

/// Maximum classification tag length in characters.
pub const MAX_TAG_LEN: usize = 50;

/// Keys owned by storage. Never compared, never accepted from callers.
pub const RESERVED_KEYS: [&str; 3] = [TAG_KEY, "created_at", "updated_at"];

/// Returns whether `key` is owned by storage rather than by callers.
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// GeoJSON geometry type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryKind {
    const ALL: [GeometryKind; 7] = [
        Self::Point,
        Self::LineString,
        Self::Polygon,
        Self::MultiPoint,
        Self::MultiLineString,
        Self::MultiPolygon,
        Self::GeometryCollection,
    ];

    /// GeoJSON type name, e.g. `MultiPolygon`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
            Self::GeometryCollection => "GeometryCollection",
        }
    }

    /// Default classification tag derived from the geometry type.
    pub fn default_tag(self) -> String {
        self.as_str().to_lowercase()
    }

    /// Parses an exact GeoJSON type name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

/// Typed GeoJSON geometry.
///
/// Serialized with the GeoJSON `type` discriminant, so
/// `{"type":"Point","coordinates":[0,0]}` maps to `Geometry::Point`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    LineString { coordinates: Vec<Position> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPoint { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Point { .. } => GeometryKind::Point,
            Self::LineString { .. } => GeometryKind::LineString,
            Self::Polygon { .. } => GeometryKind::Polygon,
            Self::MultiPoint { .. } => GeometryKind::MultiPoint,
            Self::MultiLineString { .. } => GeometryKind::MultiLineString,
            Self::MultiPolygon { .. } => GeometryKind::MultiPolygon,
            Self::GeometryCollection { .. } => GeometryKind::GeometryCollection,
        }
    }

    /// Returns whether this geometry has no members at all.
    ///
    /// Only multi variants and collections can be empty after validation.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Point { .. } => false,
            Self::LineString { coordinates } | Self::MultiPoint { coordinates } => {
                coordinates.is_empty()
            }
            Self::Polygon { coordinates } | Self::MultiLineString { coordinates } => {
                coordinates.is_empty()
            }
            Self::MultiPolygon { coordinates } => coordinates.is_empty(),
            Self::GeometryCollection { geometries } => geometries.is_empty(),
        }
    }

    /// Checks structural validity.
    ///
    /// # Invariants
    /// - Positions have 2 or 3 finite ordinates, the same count throughout
    ///   one geometry. Collection members may differ from each other.
    /// - Line strings have at least 2 positions.
    /// - Polygons have at least one ring; rings are closed with >= 4 positions.
    pub fn validate(&self) -> Result<(), GeometryError> {
        match self {
            Self::Point { coordinates } => validate_position(coordinates)?,
            Self::MultiPoint { coordinates } => {
                coordinates.iter().try_for_each(|p| validate_position(p))?
            }
            Self::LineString { coordinates } => validate_line(coordinates)?,
            Self::MultiLineString { coordinates } => {
                coordinates.iter().try_for_each(|line| validate_line(line))?
            }
            Self::Polygon { coordinates } => validate_polygon(coordinates)?,
            Self::MultiPolygon { coordinates } => {
                coordinates.iter().try_for_each(|polygon| validate_polygon(polygon))?
            }
            Self::GeometryCollection { geometries } => {
                return geometries.iter().try_for_each(Geometry::validate)
            }
        }

        let mut dimensions = self.positions().into_iter().map(|p| p.len());
        if let Some(first) = dimensions.next() {
            if dimensions.any(|d| d != first) {
                return Err(GeometryError::MixedDimensions);
            }
        }
        Ok(())
    }

    /// All positions of a non-collection geometry, in document order.
    fn positions(&self) -> Vec<&Position> {
        match self {
            Self::Point { coordinates } => vec![coordinates],
            Self::LineString { coordinates } | Self::MultiPoint { coordinates } => {
                coordinates.iter().collect()
            }
            Self::Polygon { coordinates } | Self::MultiLineString { coordinates } => {
                coordinates.iter().flatten().collect()
            }
            Self::MultiPolygon { coordinates } => coordinates.iter().flatten().flatten().collect(),
            Self::GeometryCollection { .. } => Vec::new(),
        }
    }
}

fn validate_position(position: &[f64]) -> Result<(), GeometryError> {
    if !(2..=3).contains(&position.len()) {
        return Err(GeometryError::InvalidPosition {
            dimensions: position.len(),
        });
    }
    if position.iter().any(|value| !value.is_finite()) {
        return Err(GeometryError::NonFiniteCoordinate);
    }
    Ok(())
}

fn validate_line(line: &[Position]) -> Result<(), GeometryError> {
    if line.len() < 2 {
        return Err(GeometryError::TooFewPositions {
            kind: GeometryKind::LineString,
            expected: 2,
            actual: line.len(),
        });
    }
    line.iter().try_for_each(|p| validate_position(p))
}

fn validate_polygon(rings: &[Vec<Position>]) -> Result<(), GeometryError> {
    if rings.is_empty() {
        return Err(GeometryError::EmptyPolygon);
    }
    for ring in rings {
        if ring.len() < 4 {
            return Err(GeometryError::TooFewPositions {
                kind: GeometryKind::Polygon,
                expected: 4,
                actual: ring.len(),
            });
        }
        ring.iter().try_for_each(|p| validate_position(p))?;
        if ring.first() != ring.last() {
            return Err(GeometryError::UnclosedRing);
        }
    }
    Ok(())
}

/// Property value union.
///
/// Deserialized from any JSON value. Numbers keep their JSON representation,
/// so integers beyond `f64` precision are stored and compared exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<PropertyValue>),
    Object(PropertyMap),
}

impl PropertyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => numbers_equal(a, b),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

/// Numeric equality: integers compare exactly, `1 == 1.0`.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    match (exact_integer(a), exact_integer(b)) {
        (Some(a), Some(b)) => a == b,
        (Some(int), None) => float_equals_integer(b, int),
        (None, Some(int)) => float_equals_integer(a, int),
        (None, None) => a.as_f64() == b.as_f64(),
    }
}

fn exact_integer(number: &Number) -> Option<i128> {
    number
        .as_i64()
        .map(i128::from)
        .or_else(|| number.as_u64().map(i128::from))
}

fn float_equals_integer(number: &Number, int: i128) -> bool {
    // `as` saturates, and no i64/u64 value equals a saturated i128 bound.
    number
        .as_f64()
        .is_some_and(|value| value.fract() == 0.0 && value as i128 == int)
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Non-finite values have no JSON form and become `Null`.
impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Normalized, identity-free feature.
///
/// `properties` never contains reserved keys or null values.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub tag: String,
    pub properties: PropertyMap,
}

/// Feature accepted by the reconciler and waiting to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeature {
    /// Position of the originating feature in the target collection.
    pub source_index: usize,
    pub geometry: StoredGeometry,
    pub geometry_kind: GeometryKind,
    pub tag: String,
    pub properties: PropertyMap,
}

/// Persisted feature row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFeature {
    pub id: FeatureId,
    pub project_id: ProjectId,
    /// Opaque storage form; decode through a `GeometryCodec`.
    pub geometry: StoredGeometry,
    pub geometry_kind: GeometryKind,
    pub tag: String,
    /// May carry legacy reserved keys; they are ignored by equality.
    pub properties: PropertyMap,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}
