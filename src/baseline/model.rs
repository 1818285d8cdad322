use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineStatus {
    Learning,
    Ready,
    Outdated,
}

impl BaselineStatus {
    pub fn label(self) -> &'static str {
        match self {
            BaselineStatus::Learning => "learning",
            BaselineStatus::Ready => "ready",
            BaselineStatus::Outdated => "outdated",
        }
    }
}

/// Robust summary of a channel's normal engagement, computed from a cleaned sample.
///
/// Values are immutable once produced; a recalculation replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBaseline {
    pub channel_id: String,
    pub posts_analyzed: usize,
    pub avg_engagement_rate: f64,
    pub median_engagement_rate: f64,
    pub std_engagement_rate: f64,
    pub p75_engagement_rate: f64,
    pub p95_engagement_rate: f64,
    pub max_engagement_rate: f64,
    pub status: BaselineStatus,
    pub last_calculated: Option<DateTime<Utc>>,
}

impl ChannelBaseline {
    pub fn age_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_calculated.map(|calculated| now - calculated)
    }

    /// Stored status, downgraded to `Outdated` once the baseline is older than
    /// `refresh_interval` or was never stamped.
    pub fn status_at(&self, now: DateTime<Utc>, refresh_interval: Duration) -> BaselineStatus {
        match self.age_at(now) {
            Some(age) if age <= refresh_interval => self.status,
            _ => BaselineStatus::Outdated,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, refresh_interval: Duration) -> bool {
        self.status_at(now, refresh_interval) == BaselineStatus::Ready
    }

    pub fn marked(mut self, status: BaselineStatus) -> Self {
        self.status = status;
        self
    }
}
