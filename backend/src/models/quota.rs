//! Daily submission quota model.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

/// Snapshot of an agent's quota for the current UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    pub limit: u32,
    pub used: u32,
    pub resets_at: DateTime<Utc>,
}

impl QuotaStatus {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

/// Counter key for the UTC day containing `now`.
pub fn quota_day(now: DateTime<Utc>) -> String {
    now.date_naive().format("%Y-%m-%d").to_string()
}

/// Next UTC midnight strictly after `now`.
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow: NaiveDate = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or(NaiveDate::MAX);
    tomorrow
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_reset_is_next_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 23, 59, 59).unwrap();
        assert_eq!(
            next_reset(now),
            Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_midnight_belongs_to_new_day() {
        let midnight = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        assert_eq!(quota_day(midnight), "2026-03-15");
        assert_eq!(
            next_reset(midnight),
            Utc.with_ymd_and_hms(2026, 3, 16, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_remaining_saturates() {
        let status = QuotaStatus {
            limit: 10,
            used: 12,
            resets_at: Utc::now(),
        };
        assert_eq!(status.remaining(), 0);
        assert!(status.is_exhausted());
    }
}
