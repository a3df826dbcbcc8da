//! Feature domain model and GeoJSON wire shapes.
//!
//! # Responsibility
//! - Define the typed geometry, property and feature records used by core.
//! - Define the input/output GeoJSON envelopes exchanged with callers.
//!
//! # Invariants
//! - Stored features are identified by a durable integer id and belong to
//!   exactly one project.
//! - Stored features are never mutated in place; changes are delete + insert.

pub mod collection;
pub mod feature;
