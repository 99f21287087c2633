//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the entity store contract used by synchronization services.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes are atomic per batch.
//! - Repository APIs return semantic errors (`IdRetired`) in addition to DB
//!   transport errors.

pub mod entity_repo;
