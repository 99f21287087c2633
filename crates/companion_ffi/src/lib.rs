//! Flutter-facing bindings over `companion_core`.

pub mod api;
