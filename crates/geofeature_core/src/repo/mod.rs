//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage contract the reconciler plans against.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories never decide what to insert or delete; they apply plans.
//! - Read paths reject invalid persisted rows instead of masking them.

pub mod feature_repo;
