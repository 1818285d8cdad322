pub mod file;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::baseline::ChannelBaseline;
use crate::scoring::ViralityResult;
use crate::Post;

pub use file::JsonFileStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Last successfully persisted baseline; `None` when never computed.
    async fn get_channel_baseline(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChannelBaseline>, StoreError>;

    /// Upsert keyed by channel id, replacing any previous baseline wholesale.
    async fn save_channel_baseline(&self, baseline: &ChannelBaseline) -> Result<(), StoreError>;

    async fn get_posts_history(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Post>, StoreError>;

    /// Raw setting value. Structured settings may arrive as an object or as a
    /// JSON-encoded string; decoding happens in [`crate::config`].
    async fn get_system_setting(&self, key: &str)
        -> Result<Option<serde_json::Value>, StoreError>;

    async fn update_post_viral_metrics(
        &self,
        post_id: &str,
        result: &ViralityResult,
    ) -> Result<(), StoreError>;

    /// Records a whole batch of scoring results. Stops at the first failure.
    async fn update_posts_viral_metrics(&self, results: &[ViralityResult]) -> Result<(), StoreError> {
        for result in results {
            self.update_post_viral_metrics(&result.post_id, result).await?;
        }
        Ok(())
    }
}
