//! Read-path projection from stored rows to GeoJSON.
//!
//! # Invariants
//! - Presented properties carry the tag under `type`.
//! - Feeding a presented feature back as a reconciler target matches the
//!   stored row it came from.

use crate::geometry::{GeometryCodec, GeometryError};
use crate::model::collection::{PresentedCollection, PresentedFeature};
use crate::model::feature::{Geometry, PropertyValue, StoredFeature, TAG_KEY, UNKNOWN_TAG};
use log::warn;

/// Decodes a stored row's geometry and checks it against `geometry_type`.
pub(crate) fn decode_stored_geometry<C: GeometryCodec + ?Sized>(
    codec: &C,
    stored: &StoredFeature,
) -> Result<Geometry, GeometryError> {
    let geometry = codec.from_storage_form(&stored.geometry)?;
    if geometry.kind() != stored.geometry_kind {
        return Err(GeometryError::KindMismatch {
            stored: stored.geometry_kind,
            decoded: geometry.kind(),
        });
    }
    Ok(geometry)
}

/// Converts one stored row into its GeoJSON presentation.
pub fn present_feature<C: GeometryCodec + ?Sized>(
    codec: &C,
    stored: &StoredFeature,
) -> Result<PresentedFeature, GeometryError> {
    let geometry = decode_stored_geometry(codec, stored)?;
    let tag = if stored.tag.is_empty() {
        UNKNOWN_TAG
    } else {
        stored.tag.as_str()
    };

    let mut properties = stored.properties.clone();
    properties.insert(TAG_KEY.to_string(), PropertyValue::from(tag));

    Ok(PresentedFeature {
        id: Some(stored.id),
        geometry,
        properties,
    })
}

/// Converts stored rows into a GeoJSON collection.
///
/// Rows whose geometry cannot be decoded are skipped and logged.
pub fn present_collection<C: GeometryCodec + ?Sized>(
    codec: &C,
    stored: &[StoredFeature],
) -> PresentedCollection {
    let features = stored
        .iter()
        .filter_map(|row| match present_feature(codec, row) {
            Ok(feature) => Some(feature),
            Err(err) => {
                warn!(
                    "event=feature_present module=presentation status=skipped project_id={} feature_id={} error={}",
                    row.project_id, row.id, err
                );
                None
            }
        })
        .collect();
    PresentedCollection { features }
}
