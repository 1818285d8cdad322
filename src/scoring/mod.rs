pub mod engagement;
pub mod quota;
pub mod virality;

pub use engagement::{EngagementScorer, EngagementWeights};
pub use quota::ChannelQuota;
pub use virality::{
    composite_score, RejectionReason, ViralityResult, ViralityScorer, ViralityThresholds,
};
