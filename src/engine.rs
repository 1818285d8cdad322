use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::baseline::{BaselineStatus, ChannelBaseline};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::scoring::ViralityResult;
use crate::selection::SelectionResult;
use crate::store::Store;
use crate::Post;

pub struct ViralityEngine<S: Store + ?Sized> {
    store: Arc<S>,
    base_config: EngineConfig,
    config: RwLock<EngineConfig>,
}

impl<S: Store + ?Sized> ViralityEngine<S> {
    pub async fn new(store: Arc<S>, base_config: EngineConfig) -> EngineResult<Self> {
        base_config.validate()?;
        let config = base_config.clone().with_store_settings(store.as_ref()).await;
        Ok(Self {
            store,
            base_config,
            config: RwLock::new(config),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> EngineConfig {
        match self.config.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub async fn reload_config(&self) -> EngineConfig {
        let fresh = self
            .base_config
            .clone()
            .with_store_settings(self.store.as_ref())
            .await;
        match self.config.write() {
            Ok(mut guard) => *guard = fresh.clone(),
            Err(poisoned) => *poisoned.into_inner() = fresh.clone(),
        }
        tracing::info!("engine configuration reloaded");
        fresh
    }

    /// Computes and persists a channel baseline.
    ///
    /// With `posts` absent the channel history inside the lookback window is
    /// fetched from the store. `Ok(None)` means the channel is still learning.
    pub async fn compute_baseline(
        &self,
        channel_id: &str,
        posts: Option<Vec<Post>>,
    ) -> EngineResult<Option<ChannelBaseline>> {
        let config = self.config();
        let now = Utc::now();
        let posts = match posts {
            Some(posts) => posts,
            None => {
                let since = now - config.baseline.history_window();
                self.store.get_posts_history(channel_id, since).await?
            }
        };

        let baseline = config
            .baseline_calculator()
            .compute_at(channel_id, &posts, now);
        if let Some(baseline) = baseline.as_ref() {
            self.persist_baseline(baseline).await;
        }
        Ok(baseline)
    }

    /// Returns a usable baseline for `channel_id`, computing one when none is
    /// stored or the stored one has gone stale.
    ///
    /// The recomputation sample is the stored history merged with
    /// `fallback_posts`. When it is still too small a stale baseline is
    /// returned marked `Outdated`; a channel that never had one stays `None`.
    pub async fn ensure_baseline(
        &self,
        channel_id: &str,
        fallback_posts: &[Post],
    ) -> EngineResult<Option<ChannelBaseline>> {
        let config = self.config();
        let now = Utc::now();
        let stored = self.store.get_channel_baseline(channel_id).await?;

        if let Some(baseline) = stored.as_ref() {
            if baseline.is_fresh(now, config.baseline.refresh_interval()) {
                return Ok(stored);
            }
            tracing::debug!(channel = channel_id, "stored baseline is outdated, recalculating");
        }

        let sample = self.baseline_sample(channel_id, fallback_posts, now, &config).await;
        match config
            .baseline_calculator()
            .compute_at(channel_id, &sample, now)
        {
            Some(baseline) => {
                self.persist_baseline(&baseline).await;
                Ok(Some(baseline))
            }
            None => Ok(stored.map(|baseline| baseline.marked(BaselineStatus::Outdated))),
        }
    }

    pub fn score_post(&self, post: &Post, baseline: &ChannelBaseline) -> ViralityResult {
        self.config().virality_scorer().score(post, baseline)
    }

    /// Ensures a baseline per channel, runs the selector, then records every
    /// scoring outcome in the store. Store failures never abort the batch.
    pub async fn select_top_posts(
        &self,
        posts: &[Post],
        max_per_channel: usize,
        max_total: usize,
    ) -> SelectionResult {
        let config = self.config();

        let mut channel_ids: Vec<&str> = posts.iter().map(|post| post.channel_id.as_str()).collect();
        channel_ids.sort_unstable();
        channel_ids.dedup();

        let mut baselines: HashMap<String, ChannelBaseline> = HashMap::new();
        for channel_id in channel_ids {
            let batch: Vec<Post> = posts
                .iter()
                .filter(|post| post.channel_id == channel_id)
                .cloned()
                .collect();
            match self.ensure_baseline(channel_id, &batch).await {
                Ok(Some(baseline)) => {
                    baselines.insert(channel_id.to_string(), baseline);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(channel = channel_id, error = %err, "baseline lookup failed");
                }
            }
        }

        let result = config
            .selector()
            .select(posts, &baselines, max_per_channel, max_total);

        if let Err(err) = self
            .store
            .update_posts_viral_metrics(&result.evaluations)
            .await
        {
            tracing::warn!(
                results = result.evaluations.len(),
                error = %err,
                "failed to store viral metrics"
            );
        }

        result
    }

    async fn baseline_sample(
        &self,
        channel_id: &str,
        fallback_posts: &[Post],
        now: DateTime<Utc>,
        config: &EngineConfig,
    ) -> Vec<Post> {
        let since = now - config.baseline.history_window();
        let mut sample = match self.store.get_posts_history(channel_id, since).await {
            Ok(history) => history,
            Err(err) => {
                tracing::warn!(channel = channel_id, error = %err, "history unavailable, using batch only");
                Vec::new()
            }
        };

        let batch: Vec<&Post> = fallback_posts
            .iter()
            .filter(|post| post.channel_id == channel_id)
            .collect();
        let batch_ids: HashSet<&str> = batch.iter().map(|post| post.post_id.as_str()).collect();
        sample.retain(|post| !batch_ids.contains(post.post_id.as_str()));
        sample.extend(batch.into_iter().cloned());
        sample
    }

    async fn persist_baseline(&self, baseline: &ChannelBaseline) {
        if let Err(err) = self.store.save_channel_baseline(baseline).await {
            tracing::warn!(channel = %baseline.channel_id, error = %err, "failed to save baseline");
        }
    }
}
