use serde::{Deserialize, Serialize};

use crate::Post;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementWeights {
    pub forward_rate_weight: f64,
    pub reaction_rate_weight: f64,
    pub reply_rate_weight: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            forward_rate_weight: 0.5,
            reaction_rate_weight: 0.3,
            reply_rate_weight: 0.2,
        }
    }
}

impl EngagementWeights {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("forward_rate_weight", self.forward_rate_weight),
            ("reaction_rate_weight", self.reaction_rate_weight),
            ("reply_rate_weight", self.reply_rate_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number, got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Turns raw post counters into a normalised engagement rate.
#[derive(Debug, Clone)]
pub struct EngagementScorer {
    weights: EngagementWeights,
}

impl EngagementScorer {
    pub fn new(weights: EngagementWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &EngagementWeights {
        &self.weights
    }

    /// Weighted interactions per view, capped at 1.0.
    ///
    /// Returns `None` for posts without views: the rate is undefined there, not zero.
    pub fn rate(&self, post: &Post) -> Option<f64> {
        if post.views == 0 {
            return None;
        }

        let mut weighted = 0.0;
        weighted += post.forwards as f64 * self.weights.forward_rate_weight;
        weighted += post.reactions as f64 * self.weights.reaction_rate_weight;
        weighted += post.replies as f64 * self.weights.reply_rate_weight;

        Some((weighted / post.views as f64).min(1.0))
    }
}
