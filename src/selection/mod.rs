pub mod selector;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::baseline::BaselineStatus;
use crate::scoring::ViralityResult;
use crate::Post;

pub use crate::scoring::RejectionReason;
pub use selector::{SelectionLimits, TopPostsSelector};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPost {
    pub rank: usize,
    pub post: Post,
    pub result: ViralityResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub posts_seen: usize,
    pub baseline_status: BaselineStatus,
    pub viral_count: usize,
    pub selected_count: usize,
}

impl Default for ChannelStats {
    fn default() -> Self {
        Self {
            posts_seen: 0,
            baseline_status: BaselineStatus::Learning,
            viral_count: 0,
            selected_count: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected: Vec<RankedPost>,
    pub rejection_counts: BTreeMap<String, usize>,
    pub per_channel: BTreeMap<String, ChannelStats>,
    /// Every scoring outcome produced during the pass, viral or not.
    pub evaluations: Vec<ViralityResult>,
}

impl SelectionResult {
    pub fn rejected(&self, reason: RejectionReason) -> usize {
        self.rejection_counts
            .get(reason.as_str())
            .copied()
            .unwrap_or(0)
    }
}
