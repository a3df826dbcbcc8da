//! Core use-case services.
//!
//! # Responsibility
//! - Compute reconciliation plans without touching storage.
//! - Execute plans atomically and project stored rows back to GeoJSON.
//!
//! # See also
//! - `repo::feature_repo` for the storage contract plans are applied to.

pub mod feature_service;
pub mod presentation;
pub mod reconciler;
