//! Display state for the rate-limit settings section.

use super::rate_limits::{RateLimits, RateLimitsClient, RateLimitsResponse, RemoteError};
use chrono::{DateTime, Timelike, Utc};

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// One label/value row rendered by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionState {
    /// No fetch was issued (for example no push identifier yet).
    Idle,
    Loading,
    Loaded(RateLimits),
    /// Last fetch failed; the section shows a retry control.
    Failed { message: String, retry: bool },
}

#[derive(Debug, Clone)]
pub struct RateLimitSection {
    state: SectionState,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitSection {
    pub fn new() -> Self {
        Self {
            state: SectionState::Idle,
        }
    }

    pub fn state(&self) -> &SectionState {
        &self.state
    }

    pub fn begin_fetch(&mut self) {
        self.state = SectionState::Loading;
    }

    /// Applies a fetch completion. Later completions overwrite earlier ones.
    pub fn complete(&mut self, result: Result<RateLimitsResponse, RemoteError>) {
        self.state = match result {
            Ok(response) => SectionState::Loaded(response.rate_limits),
            Err(RemoteError::MissingPushId) => SectionState::Idle,
            Err(err) => SectionState::Failed {
                retry: err.is_retryable(),
                message: err.to_string(),
            },
        };
    }

    /// Issues (or re-issues, for retry) the fetch for `push_id`.
    ///
    /// Without a push identifier the section stays idle and no request is sent.
    pub async fn refresh(&mut self, client: &RateLimitsClient, push_id: Option<&str>) {
        let Some(push_id) = push_id.filter(|value| !value.trim().is_empty()) else {
            self.state = SectionState::Idle;
            return;
        };
        self.begin_fetch();
        let result = client.fetch(push_id).await;
        self.complete(result);
    }

    pub fn retry_available(&self) -> bool {
        matches!(self.state, SectionState::Failed { retry: true, .. })
    }

    pub fn rows(&self) -> Vec<DisplayRow> {
        self.rows_at(Utc::now())
    }

    /// Rows with the reset countdown measured from `now`.
    pub fn rows_at(&self, now: DateTime<Utc>) -> Vec<DisplayRow> {
        let SectionState::Loaded(limits) = &self.state else {
            return Vec::new();
        };
        vec![
            DisplayRow {
                label: "Attempts",
                value: limits.attempts.to_string(),
            },
            DisplayRow {
                label: "Successful",
                value: limits.successful.to_string(),
            },
            DisplayRow {
                label: "Errors",
                value: limits.errors.to_string(),
            },
            DisplayRow {
                label: "Total",
                value: limits.total.to_string(),
            },
            DisplayRow {
                label: "Resets At",
                value: limits.resets_at.clone(),
            },
            DisplayRow {
                label: "Resets In",
                value: resets_in(now),
            },
        ]
    }

    pub fn footer(&self) -> Option<String> {
        match &self.state {
            SectionState::Loaded(limits) => Some(format!(
                "You are allowed {} push notifications per 24 hours.",
                limits.maximum
            )),
            _ => None,
        }
    }
}

/// Time left until the next UTC midnight as `HH:MM:SS`.
///
/// Limits reset at midnight UTC; at exactly midnight a full day remains.
pub fn resets_in(now: DateTime<Utc>) -> String {
    let remaining = SECONDS_PER_DAY - now.num_seconds_from_midnight();
    format!(
        "{:02}:{:02}:{:02}",
        remaining / 3600,
        remaining % 3600 / 60,
        remaining % 60
    )
}
