use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::baseline::{BaselineStatus, ChannelBaseline};
use crate::scoring::EngagementScorer;
use crate::stats;
use crate::Post;

/// Lowest sample size a baseline is ever built from, whatever the configuration says.
pub const MIN_POSTS_FLOOR: usize = 3;

/// Below this many rates the percentile estimate is too noisy to clip against.
pub const OUTLIER_MIN_SAMPLES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub history_window_days: u32,
    pub min_posts_for_baseline: usize,
    pub outlier_percentile: f64,
    pub refresh_interval_hours: u32,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            history_window_days: 30,
            min_posts_for_baseline: 10,
            outlier_percentile: 95.0,
            refresh_interval_hours: 24,
        }
    }
}

impl BaselineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.history_window_days == 0 {
            return Err("history_window_days must be at least 1".to_string());
        }
        if !self.outlier_percentile.is_finite()
            || self.outlier_percentile <= 0.0
            || self.outlier_percentile > 100.0
        {
            return Err(format!(
                "outlier_percentile must be within (0, 100], got {}",
                self.outlier_percentile
            ));
        }
        Ok(())
    }

    pub fn min_posts(&self) -> usize {
        self.min_posts_for_baseline.max(MIN_POSTS_FLOOR)
    }

    pub fn history_window(&self) -> Duration {
        Duration::days(i64::from(self.history_window_days))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::hours(i64::from(self.refresh_interval_hours))
    }
}

#[derive(Debug, Clone)]
pub struct BaselineCalculator {
    engagement: EngagementScorer,
    config: BaselineConfig,
}

impl BaselineCalculator {
    pub fn new(engagement: EngagementScorer, config: BaselineConfig) -> Self {
        Self { engagement, config }
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    pub fn compute(&self, channel_id: &str, posts: &[Post]) -> Option<ChannelBaseline> {
        self.compute_at(channel_id, posts, Utc::now())
    }

    /// Builds a baseline from the channel's posts inside the lookback window ending at `now`.
    ///
    /// Returns `None` while the channel is still learning, i.e. when fewer than
    /// the minimum number of posts with a defined engagement rate remain before
    /// or after outlier clipping.
    pub fn compute_at(
        &self,
        channel_id: &str,
        posts: &[Post],
        now: DateTime<Utc>,
    ) -> Option<ChannelBaseline> {
        let cutoff = now - self.config.history_window();
        let rates: Vec<f64> = posts
            .iter()
            .filter(|post| post.channel_id == channel_id && post.published_at >= cutoff)
            .filter_map(|post| self.engagement.rate(post))
            .collect();

        let min_posts = self.config.min_posts();
        if rates.len() < min_posts {
            tracing::debug!(
                channel = channel_id,
                valid = rates.len(),
                required = min_posts,
                "not enough history for a baseline"
            );
            return None;
        }

        let cleaned = self.remove_outliers(&rates);
        if cleaned.len() < min_posts {
            tracing::debug!(
                channel = channel_id,
                cleaned = cleaned.len(),
                required = min_posts,
                "too few posts left after outlier clipping"
            );
            return None;
        }

        let baseline = ChannelBaseline {
            channel_id: channel_id.to_string(),
            posts_analyzed: cleaned.len(),
            avg_engagement_rate: stats::mean(&cleaned),
            median_engagement_rate: stats::percentile_sorted(&cleaned, 50.0),
            std_engagement_rate: stats::std_dev(&cleaned),
            p75_engagement_rate: stats::percentile_sorted(&cleaned, 75.0),
            p95_engagement_rate: stats::percentile_sorted(&cleaned, 95.0),
            max_engagement_rate: stats::max(&cleaned),
            status: BaselineStatus::Ready,
            last_calculated: Some(now),
        };

        tracing::info!(
            channel = channel_id,
            posts = baseline.posts_analyzed,
            clipped = rates.len() - cleaned.len(),
            median = baseline.median_engagement_rate,
            "baseline calculated"
        );

        Some(baseline)
    }

    /// Sorted sample with every rate above the configured percentile of the raw
    /// sample removed. Small samples are returned unclipped.
    fn remove_outliers(&self, rates: &[f64]) -> Vec<f64> {
        let sorted = stats::sorted_copy(rates);
        if sorted.len() < OUTLIER_MIN_SAMPLES {
            return sorted;
        }

        let threshold = stats::percentile_sorted(&sorted, self.config.outlier_percentile);
        sorted.into_iter().filter(|rate| *rate <= threshold).collect()
    }
}
