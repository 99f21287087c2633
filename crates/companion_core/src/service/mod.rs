//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into presentation-facing operations.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod change_feed;
pub mod ordered_sync;
