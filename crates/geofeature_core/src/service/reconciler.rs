//! Feature reconciliation planning.
//!
//! # Responsibility
//! - Compare a target feature collection with a project's stored rows.
//! - Produce disjoint insert / delete / unchanged sets; no storage I/O.
//!
//! # Invariants
//! - Every stored row lands in exactly one of `to_delete` or `unchanged`.
//! - Matching is first-match over stored rows in natural order; a stored row
//!   matches at most one target feature.
//! - Any per-feature failure aborts the whole plan.

use crate::geometry::{parse_geometry, GeometryCodec, GeometryError};
use crate::model::collection::FeatureInput;
use crate::model::feature::{
    is_reserved_key, Feature, FeatureId, Geometry, NewFeature, ProjectId, PropertyMap,
    PropertyValue, StoredFeature, MAX_TAG_LEN, TAG_KEY, UNKNOWN_TAG,
};
use crate::repo::feature_repo::RepoError;
use crate::service::presentation::decode_stored_geometry;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Reconciliation failure. Any variant aborts the run with no partial effect.
#[derive(Debug)]
pub enum ReconcileError {
    /// Caller input is unusable (bad project id, bad tag, bad document).
    Validation(String),
    /// One target geometry could not be parsed or converted.
    GeometryConversion {
        index: usize,
        source: GeometryError,
    },
    /// The persistence collaborator failed.
    Storage(RepoError),
    /// Internal consistency mismatch, e.g. applied counts differ from plan.
    Unexpected(String),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "validation error: {message}"),
            Self::GeometryConversion { index, source } => {
                write!(f, "error processing geometry for feature {index}: {source}")
            }
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Unexpected(message) => write!(f, "unexpected error: {message}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::GeometryConversion { source, .. } => Some(source),
            Self::Storage(err) => Some(err),
            Self::Validation(_) | Self::Unexpected(_) => None,
        }
    }
}

impl From<RepoError> for ReconcileError {
    fn from(value: RepoError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for ReconcileError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(RepoError::from(value))
    }
}

impl ReconcileError {
    /// Stable machine-readable code used in log events and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::GeometryConversion { .. } => "geometry_conversion_error",
            Self::Storage(_) => "storage_error",
            Self::Unexpected(_) => "unexpected_error",
        }
    }
}

/// Edit plan that makes one project's stored rows match a target collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    pub project_id: ProjectId,
    /// New or changed features, in target order.
    pub to_insert: Vec<NewFeature>,
    /// Stored rows absent from the target, in natural order.
    pub to_delete: Vec<FeatureId>,
    /// Stored rows matched by a target feature, in natural order.
    pub unchanged: Vec<FeatureId>,
}

impl ReconcilePlan {
    /// Returns whether applying this plan would change nothing.
    pub fn is_noop(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }

    pub fn report(&self, run_id: Uuid, applied: bool) -> ReconcileReport {
        ReconcileReport {
            run_id,
            project_id: self.project_id,
            inserted: self.to_insert.len(),
            deleted: self.to_delete.len(),
            unchanged: self.unchanged.len(),
            total: self.to_insert.len() + self.unchanged.len(),
            applied,
        }
    }
}

/// Count summary returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Correlates the log events of one run.
    pub run_id: Uuid,
    pub project_id: ProjectId,
    pub inserted: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Features stored for the project after the plan is applied.
    pub total: usize,
    /// `false` for dry runs.
    pub applied: bool,
}

impl ReconcileReport {
    pub fn summary(&self) -> String {
        format!(
            "Updated project {} with {} features. Deleted {} old features. {} features unchanged.",
            self.project_id, self.inserted, self.deleted, self.unchanged
        )
    }
}

/// Computes the edit plan for one project.
///
/// `stored` must be the project's rows in natural order. Stored rows whose
/// geometry cannot be decoded, or decodes to a kind other than the row's
/// `geometry_kind`, never match and end up in `to_delete`.
///
/// # Errors
/// - `Validation` for a non-positive project id or an unusable tag.
/// - `GeometryConversion` with the target index for a bad geometry.
/// - `Unexpected` when a stored row belongs to another project.
pub fn plan_reconciliation<C: GeometryCodec + ?Sized>(
    codec: &C,
    project_id: ProjectId,
    targets: &[FeatureInput],
    stored: &[StoredFeature],
) -> ReconcileResult<ReconcilePlan> {
    ensure_project_id(project_id)?;

    let mut candidates = Vec::with_capacity(stored.len());
    for row in stored {
        if row.project_id != project_id {
            return Err(ReconcileError::Unexpected(format!(
                "stored feature {} belongs to project {}, not {project_id}",
                row.id, row.project_id
            )));
        }
        let geometry = match decode_stored_geometry(codec, row) {
            Ok(geometry) => Some(geometry),
            Err(err) => {
                warn!(
                    "event=feature_decode module=reconciler status=error project_id={} feature_id={} error={}",
                    project_id, row.id, err
                );
                None
            }
        };
        candidates.push(Candidate {
            row,
            geometry,
            processed: false,
        });
    }

    let mut to_insert = Vec::new();
    for (index, input) in targets.iter().enumerate() {
        let feature = normalize_target(index, input)?;
        let geometry = codec
            .to_storage_form(&feature.geometry)
            .map_err(|source| ReconcileError::GeometryConversion { index, source })?;

        match candidates
            .iter_mut()
            .find(|candidate| !candidate.processed && candidate.matches(&feature))
        {
            Some(candidate) => {
                candidate.processed = true;
                debug!(
                    "event=feature_match module=reconciler project_id={} index={} feature_id={}",
                    project_id, index, candidate.row.id
                );
            }
            None => {
                debug!(
                    "event=feature_new module=reconciler project_id={} index={} tag={}",
                    project_id, index, feature.tag
                );
                to_insert.push(NewFeature {
                    source_index: index,
                    geometry_kind: feature.geometry.kind(),
                    geometry,
                    tag: feature.tag,
                    properties: feature.properties,
                });
            }
        }
    }

    let (kept, dropped): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|candidate| candidate.processed);

    Ok(ReconcilePlan {
        project_id,
        to_insert,
        to_delete: dropped.into_iter().map(|candidate| candidate.row.id).collect(),
        unchanged: kept.into_iter().map(|candidate| candidate.row.id).collect(),
    })
}

struct Candidate<'a> {
    row: &'a StoredFeature,
    /// `None` when the stored geometry failed to decode.
    geometry: Option<Geometry>,
    processed: bool,
}

impl Candidate<'_> {
    fn matches(&self, target: &Feature) -> bool {
        match &self.geometry {
            Some(geometry) => {
                geometry == &target.geometry
                    && properties_match(&self.row.properties, &target.properties)
            }
            None => false,
        }
    }
}

/// Equality rule for property maps.
///
/// Reserved keys are ignored on the stored side; `target` is expected to be
/// normalized already (see `normalize_properties`).
pub fn properties_match(stored: &PropertyMap, target: &PropertyMap) -> bool {
    stored
        .iter()
        .filter(|(key, _)| !is_reserved_key(key))
        .eq(target.iter())
}

/// Strips the tag key, storage-owned keys and null values.
pub fn normalize_properties(properties: Option<&PropertyMap>) -> PropertyMap {
    properties
        .map(|map| {
            map.iter()
                .filter(|(key, value)| !is_reserved_key(key) && !value.is_null())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Resolves the classification tag of one target feature.
///
/// Order: non-empty `properties.type`, lower-cased `geometry.type`, then
/// `"unknown"`.
pub fn resolve_tag(
    index: usize,
    properties: Option<&PropertyMap>,
    geometry: &Value,
) -> ReconcileResult<String> {
    let explicit = match properties.and_then(|map| map.get(TAG_KEY)) {
        Some(PropertyValue::String(tag)) if !tag.is_empty() => Some(tag.clone()),
        Some(PropertyValue::String(_)) | Some(PropertyValue::Null) | None => None,
        Some(_) => {
            return Err(ReconcileError::Validation(format!(
                "feature {index}: property `{TAG_KEY}` must be a string"
            )))
        }
    };

    let tag = explicit.unwrap_or_else(|| {
        geometry
            .get("type")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_lowercase)
            .unwrap_or_else(|| UNKNOWN_TAG.to_string())
    });

    if tag.chars().count() > MAX_TAG_LEN {
        return Err(ReconcileError::Validation(format!(
            "feature {index}: tag exceeds {MAX_TAG_LEN} characters"
        )));
    }
    Ok(tag)
}

/// Turns one raw target into a normalized `Feature`.
pub fn normalize_target(index: usize, input: &FeatureInput) -> ReconcileResult<Feature> {
    let properties = input.properties.as_ref();
    let tag = resolve_tag(index, properties, &input.geometry)?;
    let geometry = parse_geometry(&input.geometry)
        .map_err(|source| ReconcileError::GeometryConversion { index, source })?;
    Ok(Feature {
        geometry,
        tag,
        properties: normalize_properties(properties),
    })
}

pub(crate) fn ensure_project_id(project_id: ProjectId) -> ReconcileResult<()> {
    if project_id <= 0 {
        return Err(ReconcileError::Validation(format!(
            "project id must be positive, got {project_id}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{normalize_properties, properties_match, resolve_tag, ReconcileError};
    use crate::model::feature::{PropertyMap, PropertyValue};
    use serde_json::json;

    fn props(value: serde_json::Value) -> PropertyMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn resolve_tag_prefers_explicit_then_geometry_then_unknown() {
        let explicit = props(json!({"type": "Well"}));
        assert_eq!(
            resolve_tag(0, Some(&explicit), &json!({"type": "Point"})).unwrap(),
            "Well"
        );

        let blank = props(json!({"type": ""}));
        assert_eq!(
            resolve_tag(0, Some(&blank), &json!({"type": "MultiPolygon"})).unwrap(),
            "multipolygon"
        );

        assert_eq!(resolve_tag(0, None, &json!(null)).unwrap(), "unknown");
        assert_eq!(resolve_tag(0, None, &json!({"type": 3})).unwrap(), "unknown");
    }

    #[test]
    fn resolve_tag_rejects_non_string_and_overlong_tags() {
        let numeric = props(json!({"type": 5}));
        let err = resolve_tag(4, Some(&numeric), &json!(null)).unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(message) if message.contains("feature 4")));

        let long = props(json!({"type": "x".repeat(51)}));
        assert!(matches!(
            resolve_tag(0, Some(&long), &json!(null)),
            Err(ReconcileError::Validation(_))
        ));
    }

    #[test]
    fn normalize_drops_tag_audit_keys_and_nulls() {
        let raw = props(json!({
            "type": "site",
            "created_at": 1,
            "name": "A",
            "note": null,
            "nested": {"keep": null}
        }));
        let normalized = normalize_properties(Some(&raw));
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized.get("name"), Some(&PropertyValue::from("A")));
        assert!(normalized.contains_key("nested"));
    }

    #[test]
    fn properties_match_ignores_reserved_stored_keys() {
        let stored = props(json!({"name": "A", "updated_at": 99, "type": "legacy"}));
        let target = props(json!({"name": "A"}));
        assert!(properties_match(&stored, &target));

        let changed = props(json!({"name": "B"}));
        assert!(!properties_match(&stored, &changed));

        let extra = props(json!({"name": "A", "height": 2}));
        assert!(!properties_match(&stored, &extra));
    }
}
