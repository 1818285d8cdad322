use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::baseline::{BaselineStatus, ChannelBaseline};
use crate::scoring::{ChannelQuota, RejectionReason, ViralityResult, ViralityScorer};
use crate::selection::{ChannelStats, RankedPost, SelectionResult};
use crate::Post;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionLimits {
    pub max_posts_per_channel: usize,
    pub max_total_posts: usize,
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            max_posts_per_channel: 3,
            max_total_posts: 50,
        }
    }
}

impl SelectionLimits {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_posts_per_channel == 0 {
            return Err("max_posts_per_channel must be at least 1".to_string());
        }
        if self.max_total_posts == 0 {
            return Err("max_total_posts must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    post: Post,
    result: ViralityResult,
}

#[derive(Debug, Default)]
struct ChannelOutcome {
    channel_id: String,
    stats: ChannelStats,
    kept: Vec<Candidate>,
    rejections: Vec<RejectionReason>,
    evaluations: Vec<ViralityResult>,
}

/// Picks the strongest outliers across channels under per-channel and total quotas.
///
/// Pure over its inputs: baselines are looked up, never created here.
#[derive(Debug, Clone)]
pub struct TopPostsSelector {
    scorer: ViralityScorer,
}

impl TopPostsSelector {
    pub fn new(scorer: ViralityScorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &ViralityScorer {
        &self.scorer
    }

    pub fn select(
        &self,
        posts: &[Post],
        baselines: &HashMap<String, ChannelBaseline>,
        max_per_channel: usize,
        max_total: usize,
    ) -> SelectionResult {
        let groups = group_by_channel(posts);

        // Channels are independent until the global merge below.
        let mut outcomes: Vec<ChannelOutcome> = groups
            .into_par_iter()
            .map(|(channel_id, channel_posts)| {
                self.evaluate_channel(
                    channel_id,
                    &channel_posts,
                    baselines.get(channel_id),
                    max_per_channel,
                )
            })
            .collect();
        outcomes.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));

        let mut rejection_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut per_channel: BTreeMap<String, ChannelStats> = BTreeMap::new();
        let mut evaluations = Vec::new();
        let mut merged = Vec::new();

        for outcome in outcomes {
            for reason in outcome.rejections {
                *rejection_counts.entry(reason.as_str().to_string()).or_insert(0) += 1;
            }
            per_channel.insert(outcome.channel_id, outcome.stats);
            evaluations.extend(outcome.evaluations);
            merged.extend(outcome.kept);
        }

        merged.sort_by(rank_order);
        if merged.len() > max_total {
            let dropped = merged.len() - max_total;
            *rejection_counts
                .entry(RejectionReason::TotalLimit.as_str().to_string())
                .or_insert(0) += dropped;
            merged.truncate(max_total);
        }

        let selected: Vec<RankedPost> = merged
            .into_iter()
            .enumerate()
            .map(|(idx, candidate)| RankedPost {
                rank: idx + 1,
                post: candidate.post,
                result: candidate.result,
            })
            .collect();

        for ranked in &selected {
            if let Some(stats) = per_channel.get_mut(&ranked.post.channel_id) {
                stats.selected_count += 1;
            }
        }

        tracing::info!(
            posts = posts.len(),
            channels = per_channel.len(),
            selected = selected.len(),
            "top posts selected"
        );

        SelectionResult {
            selected,
            rejection_counts,
            per_channel,
            evaluations,
        }
    }

    fn evaluate_channel(
        &self,
        channel_id: &str,
        posts: &[&Post],
        baseline: Option<&ChannelBaseline>,
        max_per_channel: usize,
    ) -> ChannelOutcome {
        let mut outcome = ChannelOutcome {
            channel_id: channel_id.to_string(),
            ..ChannelOutcome::default()
        };
        outcome.stats.posts_seen = posts.len();

        let Some(baseline) = baseline else {
            tracing::debug!(channel = channel_id, posts = posts.len(), "no baseline, rejecting channel");
            outcome.stats.baseline_status = BaselineStatus::Learning;
            outcome.rejections = vec![RejectionReason::NoBaseline; posts.len()];
            return outcome;
        };
        outcome.stats.baseline_status = baseline.status;

        let mut viral = Vec::new();
        for post in posts {
            let result = self.scorer.score(post, baseline);
            outcome.evaluations.push(result.clone());
            if result.is_viral {
                viral.push(Candidate {
                    post: (*post).clone(),
                    result,
                });
            } else {
                outcome.rejections.extend(result.failed_checks.iter().copied());
            }
        }
        outcome.stats.viral_count = viral.len();

        viral.sort_by(rank_order);
        let mut quota = ChannelQuota::new(max_per_channel);
        for candidate in viral {
            if quota.try_take(channel_id) {
                outcome.kept.push(candidate);
            } else {
                outcome.rejections.push(RejectionReason::ChannelLimit);
            }
        }

        outcome
    }
}

fn group_by_channel(posts: &[Post]) -> Vec<(&str, Vec<&Post>)> {
    let mut groups: BTreeMap<&str, Vec<&Post>> = BTreeMap::new();
    for post in posts {
        groups.entry(post.channel_id.as_str()).or_default().push(post);
    }
    groups.into_iter().collect()
}

/// Score descending, then views descending, then post id ascending.
fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.result
        .viral_score
        .total_cmp(&a.result.viral_score)
        .then_with(|| b.post.views.cmp(&a.post.views))
        .then_with(|| a.post.post_id.cmp(&b.post.post_id))
}
