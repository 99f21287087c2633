//! Read-only remote status shown in the notification settings.
//!
//! # Responsibility
//! - Fetch push rate-limit counters keyed by the device push identifier.
//! - Hold the display state of the rate-limit section, including the retry
//!   affordance after a failed fetch.
//!
//! # Invariants
//! - Nothing here mutates persisted entities or settings.
//! - The most recent completion wins; earlier results are overwritten.

mod rate_limits;
mod section;

pub use rate_limits::{RateLimits, RateLimitsClient, RateLimitsResponse, RemoteError};
pub use section::{resets_in, DisplayRow, RateLimitSection, SectionState};
