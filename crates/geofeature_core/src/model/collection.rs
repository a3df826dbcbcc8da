//! GeoJSON envelopes exchanged with callers.
//!
//! Input features keep their geometry as raw JSON so a malformed geometry is
//! reported by the reconciler together with its position in the collection.

use crate::model::feature::{FeatureId, Geometry, PropertyMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One incoming feature as received from the caller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureInput {
    /// Raw GeoJSON geometry; `null` when absent.
    #[serde(default)]
    pub geometry: Value,
    /// Free-form properties; `type` carries the classification tag.
    #[serde(default)]
    pub properties: Option<PropertyMap>,
}

/// Incoming feature collection. `features` may be absent or null.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureCollectionInput {
    #[serde(default)]
    pub features: Option<Vec<FeatureInput>>,
}

impl FeatureCollectionInput {
    pub fn new(features: Vec<FeatureInput>) -> Self {
        Self {
            features: Some(features),
        }
    }

    /// Target features, empty when the collection carries none.
    pub fn targets(&self) -> &[FeatureInput] {
        self.features.as_deref().unwrap_or(&[])
    }
}

/// Parses a GeoJSON `FeatureCollection` document.
pub fn parse_feature_collection(text: &str) -> Result<FeatureCollectionInput, serde_json::Error> {
    serde_json::from_str(text)
}

/// Read-path projection of a stored feature.
///
/// Serializes as a GeoJSON `Feature` with the tag re-injected under
/// `properties.type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct PresentedFeature {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    pub geometry: Geometry,
    pub properties: PropertyMap,
}

impl PresentedFeature {
    /// Converts this presentation back into reconciler input.
    pub fn to_input(&self) -> Result<FeatureInput, serde_json::Error> {
        Ok(FeatureInput {
            geometry: serde_json::to_value(&self.geometry)?,
            properties: Some(self.properties.clone()),
        })
    }
}

/// Read-path GeoJSON `FeatureCollection`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct PresentedCollection {
    pub features: Vec<PresentedFeature>,
}

impl PresentedCollection {
    /// Converts the whole collection back into reconciler input.
    pub fn to_input(&self) -> Result<FeatureCollectionInput, serde_json::Error> {
        let features = self
            .features
            .iter()
            .map(PresentedFeature::to_input)
            .collect::<Result<_, _>>()?;
        Ok(FeatureCollectionInput::new(features))
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_feature_collection, PresentedFeature};
    use crate::model::feature::{Geometry, PropertyMap, PropertyValue};

    #[test]
    fn parse_accepts_missing_and_null_features() {
        let missing = parse_feature_collection(r#"{"type":"FeatureCollection"}"#).unwrap();
        assert!(missing.targets().is_empty());

        let null = parse_feature_collection(r#"{"type":"FeatureCollection","features":null}"#)
            .unwrap();
        assert!(null.features.is_none());
    }

    #[test]
    fn parse_keeps_malformed_geometry_as_raw_json() {
        let input = parse_feature_collection(
            r#"{"features":[{"type":"Feature","geometry":{"type":"Point"},"properties":{}}]}"#,
        )
        .unwrap();
        assert_eq!(input.targets().len(), 1);
        assert_eq!(input.targets()[0].geometry["type"], "Point");
    }

    #[test]
    fn presented_feature_serializes_as_geojson_feature() {
        let mut properties = PropertyMap::new();
        properties.insert("type".to_string(), PropertyValue::from("site"));
        let feature = PresentedFeature {
            id: Some(7),
            geometry: Geometry::Point {
                coordinates: vec![1.0, 2.5],
            },
            properties,
        };

        let value = serde_json::to_value(&feature).unwrap();
        assert_eq!(value["type"], "Feature");
        assert_eq!(value["id"], 7);
        assert_eq!(value["geometry"]["type"], "Point");
        assert_eq!(value["properties"]["type"], "site");

        let input = feature.to_input().unwrap();
        assert_eq!(input.geometry["type"], "Point");
        assert_eq!(input.geometry["coordinates"][1], 2.5);
        assert_eq!(input.properties, Some(feature.properties.clone()));
    }
}
