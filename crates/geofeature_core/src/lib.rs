//! Core domain logic for project feature storage.
//! This crate owns feature equality, reconciliation planning and persistence.

pub mod db;
pub mod geometry;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use geometry::{parse_geometry, GeometryCodec, GeometryError, StoredGeometry, WktCodec};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig};
pub use model::collection::{
    parse_feature_collection, FeatureCollectionInput, FeatureInput, PresentedCollection,
    PresentedFeature,
};
pub use model::feature::{
    Feature, FeatureId, Geometry, GeometryKind, NewFeature, Position, ProjectId, PropertyMap,
    PropertyValue, StoredFeature,
};
pub use repo::feature_repo::{FeatureRepository, RepoError, RepoResult, SqliteFeatureRepository};
pub use service::feature_service::{reconcile_with_repository, FeatureService};
pub use service::presentation::{present_collection, present_feature};
pub use service::reconciler::{
    plan_reconciliation, ReconcileError, ReconcilePlan, ReconcileReport, ReconcileResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
