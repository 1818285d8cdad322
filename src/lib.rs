pub mod baseline;
pub mod config;
pub mod engine;
pub mod error;
pub mod scoring;
pub mod selection;
pub mod stats;
pub mod store;
pub mod synthetic;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use baseline::{BaselineCalculator, BaselineStatus, ChannelBaseline};
pub use config::EngineConfig;
pub use engine::ViralityEngine;
pub use error::{EngineError, EngineResult};
pub use scoring::{EngagementScorer, EngagementWeights, ViralityResult, ViralityScorer};
pub use selection::{RankedPost, RejectionReason, SelectionResult, TopPostsSelector};
pub use store::{JsonFileStore, Store, StoreError};

/// A published post with its engagement counters as observed at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub post_id: String,
    pub channel_id: String,
    pub published_at: DateTime<Utc>,
    pub views: u64,
    #[serde(default)]
    pub forwards: u64,
    #[serde(default)]
    pub reactions: u64,
    #[serde(default)]
    pub replies: u64,
    /// Channel subscriber count at the time the post was observed.
    #[serde(default)]
    pub subscribers: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Post {
    pub fn new(
        post_id: impl Into<String>,
        channel_id: impl Into<String>,
        published_at: DateTime<Utc>,
        views: u64,
    ) -> Self {
        Self {
            post_id: post_id.into(),
            channel_id: channel_id.into(),
            published_at,
            views,
            forwards: 0,
            reactions: 0,
            replies: 0,
            subscribers: 0,
            text: None,
        }
    }

    pub fn with_engagement(mut self, forwards: u64, reactions: u64, replies: u64) -> Self {
        self.forwards = forwards;
        self.reactions = reactions;
        self.replies = replies;
        self
    }

    pub fn with_subscribers(mut self, subscribers: u64) -> Self {
        self.subscribers = subscribers;
        self
    }
}

pub fn format_number(value: f64) -> String {
    let rounded = value.round().max(0.0) as i64;
    let mut chars: Vec<char> = rounded.to_string().chars().collect();
    let mut result = String::new();
    let mut count = 0usize;

    while let Some(ch) = chars.pop() {
        if count == 3 {
            result.push(',');
            count = 0;
        }
        result.push(ch);
        count += 1;
    }

    result.chars().rev().collect()
}

pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

pub fn format_float(value: f64, digits: usize) -> String {
    format!("{:.1$}", value, digits)
}
