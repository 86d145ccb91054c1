use chrono::{DateTime, Utc};
use serde::Serialize;

const MILLIS_PER_DAY: i64 = 86_400_000;
const DEFAULT_URGENT_WITHIN_DAYS: i64 = 3;

/// Temporal standing of a deadline (RFQ quote deadline) or validity date (quote `valid_until`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeadlineStatus {
    NoDeadline,
    Open { days_left: i64 },
    Urgent { days_left: i64 },
    DueTomorrow,
    DueToday,
    Expired,
}

impl DeadlineStatus {
    pub const fn is_expired(self) -> bool {
        matches!(self, DeadlineStatus::Expired)
    }

    /// Whole days remaining, or `None` for missing and expired deadlines.
    pub const fn days_left(self) -> Option<i64> {
        match self {
            DeadlineStatus::NoDeadline | DeadlineStatus::Expired => None,
            DeadlineStatus::DueToday => Some(0),
            DeadlineStatus::DueTomorrow => Some(1),
            DeadlineStatus::Urgent { days_left } | DeadlineStatus::Open { days_left } => {
                Some(days_left)
            }
        }
    }

    /// Position along open → urgent → due soon → expired. `NoDeadline` sits at zero and never moves.
    pub const fn stage(self) -> u8 {
        match self {
            DeadlineStatus::NoDeadline | DeadlineStatus::Open { .. } => 0,
            DeadlineStatus::Urgent { .. } => 1,
            DeadlineStatus::DueTomorrow => 2,
            DeadlineStatus::DueToday => 3,
            DeadlineStatus::Expired => 4,
        }
    }

    /// Wording used for RFQ quote deadlines.
    pub fn deadline_label(self) -> String {
        match self {
            DeadlineStatus::NoDeadline => "No deadline".to_string(),
            DeadlineStatus::Expired => "Expired".to_string(),
            DeadlineStatus::DueToday => "Due today".to_string(),
            DeadlineStatus::DueTomorrow => "Due tomorrow".to_string(),
            DeadlineStatus::Urgent { days_left } | DeadlineStatus::Open { days_left } => {
                format!("{days_left} days left")
            }
        }
    }

    /// Wording used for quote validity.
    pub fn validity_label(self) -> String {
        match self {
            DeadlineStatus::NoDeadline => "No expiry".to_string(),
            DeadlineStatus::Expired => "Expired".to_string(),
            DeadlineStatus::DueToday => "Expires today".to_string(),
            DeadlineStatus::DueTomorrow => "Expires tomorrow".to_string(),
            DeadlineStatus::Urgent { days_left } | DeadlineStatus::Open { days_left } => {
                format!("Valid for {days_left} days")
            }
        }
    }
}

/// Classifier parameterised by the urgency window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlinePolicy {
    urgent_within_days: i64,
}

impl DeadlinePolicy {
    pub fn new(urgent_within_days: u32) -> Self {
        Self {
            urgent_within_days: i64::from(urgent_within_days),
        }
    }

    pub fn urgent_within_days(&self) -> i64 {
        self.urgent_within_days
    }

    /// Whether `status` falls inside the urgency window. A window of zero days disables urgency,
    /// including for deadlines due today or tomorrow.
    pub fn is_urgent(&self, status: DeadlineStatus) -> bool {
        self.urgent_within_days > 0
            && status
                .days_left()
                .is_some_and(|days| days <= self.urgent_within_days)
    }

    /// Classify `deadline` relative to `now`. Remaining days are the ceiling of the millisecond
    /// difference divided by one day.
    pub fn classify(&self, deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DeadlineStatus {
        let Some(deadline) = deadline else {
            return DeadlineStatus::NoDeadline;
        };
        if now > deadline {
            return DeadlineStatus::Expired;
        }

        let remaining_ms = (deadline - now).num_milliseconds();
        let days_left = remaining_ms / MILLIS_PER_DAY + i64::from(remaining_ms % MILLIS_PER_DAY != 0);

        match days_left {
            0 => DeadlineStatus::DueToday,
            1 => DeadlineStatus::DueTomorrow,
            days if days <= self.urgent_within_days => DeadlineStatus::Urgent { days_left: days },
            days => DeadlineStatus::Open { days_left: days },
        }
    }
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        Self {
            urgent_within_days: DEFAULT_URGENT_WITHIN_DAYS,
        }
    }
}

/// Classify with the default three-day urgency window.
pub fn classify(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DeadlineStatus {
    DeadlinePolicy::default().classify(deadline, now)
}
