use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::baseline::ChannelBaseline;
use crate::scoring::ViralityResult;
use crate::store::{Store, StoreError};
use crate::Post;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    baselines: BTreeMap<String, ChannelBaseline>,
    #[serde(default)]
    posts: BTreeMap<String, Post>,
    #[serde(default)]
    settings: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    viral_metrics: BTreeMap<String, ViralityResult>,
}

/// Single-document JSON store. Every mutation rewrites the file atomically.
pub struct JsonFileStore {
    path: Option<PathBuf>,
    state: RwLock<StoreState>,
}

impl JsonFileStore {
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let state = if tokio::fs::try_exists(&path).await? {
            let data = tokio::fs::read_to_string(&path).await?;
            if data.trim().is_empty() {
                StoreState::default()
            } else {
                serde_json::from_str(&data)?
            }
        } else {
            StoreState::default()
        };

        Ok(Self {
            path: Some(path),
            state: RwLock::new(state),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub async fn insert_posts(&self, posts: &[Post]) -> Result<usize, StoreError> {
        let mut guard = self.state.write().await;
        for post in posts {
            guard.posts.insert(post.post_id.clone(), post.clone());
        }
        self.persist(&guard).await?;
        Ok(posts.len())
    }

    pub async fn set_setting(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let mut guard = self.state.write().await;
        guard.settings.insert(key.to_string(), value);
        self.persist(&guard).await
    }

    pub async fn viral_metrics(&self, post_id: &str) -> Option<ViralityResult> {
        let guard = self.state.read().await;
        guard.viral_metrics.get(post_id).cloned()
    }

    pub async fn baselines(&self) -> Vec<ChannelBaseline> {
        let guard = self.state.read().await;
        guard.baselines.values().cloned().collect()
    }

    async fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            ensure_dir(parent).await?;
        }
        let payload = serde_json::to_string_pretty(state)?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, payload).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn get_channel_baseline(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChannelBaseline>, StoreError> {
        let guard = self.state.read().await;
        Ok(guard.baselines.get(channel_id).cloned())
    }

    async fn save_channel_baseline(&self, baseline: &ChannelBaseline) -> Result<(), StoreError> {
        let mut guard = self.state.write().await;
        guard
            .baselines
            .insert(baseline.channel_id.clone(), baseline.clone());
        self.persist(&guard).await
    }

    async fn get_posts_history(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Post>, StoreError> {
        let guard = self.state.read().await;
        let mut posts: Vec<Post> = guard
            .posts
            .values()
            .filter(|post| post.channel_id == channel_id && post.published_at >= since)
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            a.published_at
                .cmp(&b.published_at)
                .then_with(|| a.post_id.cmp(&b.post_id))
        });
        Ok(posts)
    }

    async fn get_system_setting(
        &self,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let guard = self.state.read().await;
        Ok(guard.settings.get(key).cloned())
    }

    async fn update_post_viral_metrics(
        &self,
        post_id: &str,
        result: &ViralityResult,
    ) -> Result<(), StoreError> {
        let mut guard = self.state.write().await;
        guard
            .viral_metrics
            .insert(post_id.to_string(), result.clone());
        self.persist(&guard).await
    }

    async fn update_posts_viral_metrics(&self, results: &[ViralityResult]) -> Result<(), StoreError> {
        if results.is_empty() {
            return Ok(());
        }
        let mut guard = self.state.write().await;
        for result in results {
            guard
                .viral_metrics
                .insert(result.post_id.clone(), result.clone());
        }
        self.persist(&guard).await
    }
}

async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if path.as_os_str().is_empty() || tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}
