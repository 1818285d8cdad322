use serde::{Deserialize, Serialize};

use crate::baseline::ChannelBaseline;
use crate::scoring::EngagementScorer;
use crate::stats::round_to;
use crate::Post;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViralityThresholds {
    pub min_viral_score: f64,
    pub min_zscore: f64,
    pub min_median_multiplier: f64,
    pub min_views_percentile: f64,
    pub min_views_floor: u64,
}

impl Default for ViralityThresholds {
    fn default() -> Self {
        Self {
            min_viral_score: 1.5,
            min_zscore: 1.5,
            min_median_multiplier: 2.0,
            min_views_percentile: 0.001,
            min_views_floor: 100,
        }
    }
}

impl ViralityThresholds {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("min_viral_score", self.min_viral_score),
            ("min_median_multiplier", self.min_median_multiplier),
            ("min_views_percentile", self.min_views_percentile),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number, got {}", name, value));
            }
        }
        if !self.min_zscore.is_finite() {
            return Err(format!("min_zscore must be finite, got {}", self.min_zscore));
        }
        Ok(())
    }

    /// Absolute view floor, raised for large channels by their subscriber count.
    pub fn views_floor(&self, subscribers: u64) -> f64 {
        (self.min_views_floor as f64).max(subscribers as f64 * self.min_views_percentile)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    UndefinedEngagement,
    LowViralScore,
    LowZscore,
    LowMedianMultiplier,
    LowViews,
    NoBaseline,
    ChannelLimit,
    TotalLimit,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::UndefinedEngagement => "undefined_engagement",
            RejectionReason::LowViralScore => "low_viral_score",
            RejectionReason::LowZscore => "low_zscore",
            RejectionReason::LowMedianMultiplier => "low_median_multiplier",
            RejectionReason::LowViews => "low_views",
            RejectionReason::NoBaseline => "no_baseline",
            RejectionReason::ChannelLimit => "channel_limit",
            RejectionReason::TotalLimit => "total_limit",
        }
    }
}

/// Outcome of scoring one post against its channel baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViralityResult {
    pub post_id: String,
    pub is_viral: bool,
    pub viral_score: f64,
    /// `None` when the post has no views and its rate is undefined.
    pub engagement_rate: Option<f64>,
    pub zscore: f64,
    pub median_multiplier: f64,
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_checks: Vec<RejectionReason>,
}

#[derive(Debug, Clone)]
pub struct ViralityScorer {
    engagement: EngagementScorer,
    thresholds: ViralityThresholds,
}

impl ViralityScorer {
    pub fn new(engagement: EngagementScorer, thresholds: ViralityThresholds) -> Self {
        Self {
            engagement,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &ViralityThresholds {
        &self.thresholds
    }

    pub fn score(&self, post: &Post, baseline: &ChannelBaseline) -> ViralityResult {
        let Some(rate) = self.engagement.rate(post) else {
            return ViralityResult {
                post_id: post.post_id.clone(),
                is_viral: false,
                viral_score: 0.0,
                engagement_rate: None,
                zscore: 0.0,
                median_multiplier: 0.0,
                reasons: vec!["Undefined engagement rate: post has no views".to_string()],
                failed_checks: vec![RejectionReason::UndefinedEngagement],
            };
        };

        let zscore = if has_spread(baseline) {
            (rate - baseline.avg_engagement_rate) / baseline.std_engagement_rate
        } else {
            0.0
        };
        let median_multiplier = if baseline.median_engagement_rate > 0.0 {
            rate / baseline.median_engagement_rate
        } else {
            1.0
        };
        let viral_score = composite_score(zscore, median_multiplier, post.views);

        let thresholds = &self.thresholds;
        let views_floor = thresholds.views_floor(post.subscribers);
        let mut reasons = Vec::with_capacity(4);
        let mut failed_checks = Vec::new();

        if viral_score >= thresholds.min_viral_score {
            reasons.push(format!(
                "Viral score {:.2} >= {}",
                viral_score, thresholds.min_viral_score
            ));
        } else {
            reasons.push(format!(
                "Low viral score: {:.2} < {}",
                viral_score, thresholds.min_viral_score
            ));
            failed_checks.push(RejectionReason::LowViralScore);
        }

        if zscore >= thresholds.min_zscore {
            reasons.push(format!("High zscore: {:.2} >= {}", zscore, thresholds.min_zscore));
        } else {
            reasons.push(format!("Low zscore: {:.2} < {}", zscore, thresholds.min_zscore));
            failed_checks.push(RejectionReason::LowZscore);
        }

        if median_multiplier >= thresholds.min_median_multiplier {
            reasons.push(format!(
                "Median multiplier: {:.2}x >= {}x",
                median_multiplier, thresholds.min_median_multiplier
            ));
        } else {
            reasons.push(format!(
                "Low median multiplier: {:.2}x < {}x",
                median_multiplier, thresholds.min_median_multiplier
            ));
            failed_checks.push(RejectionReason::LowMedianMultiplier);
        }

        if post.views as f64 >= views_floor {
            reasons.push(format!("Views {} >= {:.0}", post.views, views_floor));
        } else {
            reasons.push(format!("Low views: {} < {:.0}", post.views, views_floor));
            failed_checks.push(RejectionReason::LowViews);
        }

        ViralityResult {
            post_id: post.post_id.clone(),
            is_viral: failed_checks.is_empty(),
            viral_score,
            engagement_rate: Some(rate),
            zscore,
            median_multiplier,
            reasons,
            failed_checks,
        }
    }
}

// Spread this small relative to the mean is rounding noise, not variation.
const MIN_RELATIVE_STD: f64 = 1e-12;

fn has_spread(baseline: &ChannelBaseline) -> bool {
    let scale = baseline.avg_engagement_rate.abs().max(f64::MIN_POSITIVE);
    baseline.std_engagement_rate > MIN_RELATIVE_STD * scale
}

/// Blend of statistical deviation, relative multiplier and absolute reach,
/// rounded to two decimals. Only deviation above the mean counts.
pub fn composite_score(zscore: f64, median_multiplier: f64, views: u64) -> f64 {
    let deviation = (zscore.max(0.0) / 3.0).clamp(0.0, 5.0);
    let multiplier = (median_multiplier - 1.0).clamp(0.0, 4.0);
    let reach = (views as f64 / 10_000.0).clamp(0.0, 1.0);
    round_to(0.4 * deviation + 0.4 * multiplier + 0.2 * reach, 2)
}
