//! Domain model for orderable settings collections.
//!
//! # Responsibility
//! - Define the canonical entity record and collection keys.
//! - Provide typed payload views for each collection kind.
//!
//! # Invariants
//! - Every entity is identified by a stable `EntityId`.
//! - Ordering only reads `id` and `position`; payloads stay opaque.

pub mod entity;
pub mod payload;
