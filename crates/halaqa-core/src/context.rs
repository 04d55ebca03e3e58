//! # Request Context
//!
//! Per-request values that would otherwise be ambient: the evaluation clock
//! and the acting user. Relative filters ("today", "this week") and record
//! defaults (`created_by`) read them from here, so the same request always
//! evaluates the same way and tests can pin the clock.

use crate::EntityId;
use chrono::{DateTime, NaiveDate, Utc};

/// Explicit context passed into every list, metric and action call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    /// Evaluation instant for this request.
    pub now: DateTime<Utc>,
    /// Acting user, when the caller is authenticated.
    pub user: Option<EntityId>,
}

impl RequestContext {
    /// Context evaluated at the current wall-clock time.
    #[must_use]
    pub fn current() -> Self {
        Self::at(Utc::now())
    }

    /// Context evaluated at a fixed instant.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now, user: None }
    }

    #[must_use]
    pub fn with_user(mut self, user: EntityId) -> Self {
        self.user = Some(user);
        self
    }

    /// Calendar date of the evaluation instant.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn today_follows_pinned_clock() {
        let now = Utc
            .with_ymd_and_hms(2026, 10, 18, 23, 59, 0)
            .single()
            .unwrap_or_default();
        let ctx = RequestContext::at(now).with_user(EntityId(5));
        assert_eq!(ctx.today(), NaiveDate::from_ymd_opt(2026, 10, 18).unwrap_or_default());
        assert_eq!(ctx.user, Some(EntityId(5)));
    }
}
