use chrono::Utc;
use std::collections::HashMap;

use channel_virality::baseline::BaselineStatus;
use channel_virality::scoring::{EngagementScorer, EngagementWeights, ViralityScorer, ViralityThresholds};
use channel_virality::{ChannelBaseline, Post, RejectionReason, TopPostsSelector};

fn selector() -> TopPostsSelector {
    TopPostsSelector::new(ViralityScorer::new(
        EngagementScorer::new(EngagementWeights::default()),
        ViralityThresholds::default(),
    ))
}

fn baseline(channel_id: &str) -> ChannelBaseline {
    ChannelBaseline {
        channel_id: channel_id.to_string(),
        posts_analyzed: 30,
        avg_engagement_rate: 0.01,
        median_engagement_rate: 0.01,
        std_engagement_rate: 0.002,
        p75_engagement_rate: 0.012,
        p95_engagement_rate: 0.015,
        max_engagement_rate: 0.016,
        status: BaselineStatus::Ready,
        last_calculated: Some(Utc::now()),
    }
}

/// Engages at 5x the baseline median; the score then only varies with views.
fn viral_post(id: &str, channel_id: &str, views: u64) -> Post {
    Post::new(id, channel_id, Utc::now(), views).with_engagement(views / 10, 0, 0)
}

fn ordinary_post(id: &str, channel_id: &str) -> Post {
    Post::new(id, channel_id, Utc::now(), 3_000).with_engagement(60, 0, 0)
}

fn baselines(channels: &[&str]) -> HashMap<String, ChannelBaseline> {
    channels
        .iter()
        .map(|channel| (channel.to_string(), baseline(channel)))
        .collect()
}

#[test]
fn channel_without_baseline_is_rejected_whole() {
    let posts = vec![
        viral_post("a1", "a", 5_000),
        viral_post("n1", "new", 5_000),
        ordinary_post("n2", "new"),
    ];
    let result = selector().select(&posts, &baselines(&["a"]), 3, 50);

    assert_eq!(result.selected.len(), 1);
    assert_eq!(result.rejected(RejectionReason::NoBaseline), 2);
    let stats = &result.per_channel["new"];
    assert_eq!(stats.baseline_status, BaselineStatus::Learning);
    assert_eq!(stats.posts_seen, 2);
    assert_eq!(stats.viral_count, 0);
    assert!(result.evaluations.iter().all(|e| e.post_id == "a1"));
}

#[test]
fn quotas_cap_each_channel_and_the_total() {
    let mut posts: Vec<Post> = (1..=5)
        .map(|i| viral_post(&format!("a{}", i), "a", 1_000 * i))
        .collect();
    posts.push(viral_post("b1", "b", 2_500));
    posts.push(viral_post("b2", "b", 1_500));
    posts.push(ordinary_post("b3", "b"));

    let result = selector().select(&posts, &baselines(&["a", "b"]), 3, 4);

    let ids: Vec<&str> = result
        .selected
        .iter()
        .map(|ranked| ranked.post.post_id.as_str())
        .collect();
    assert_eq!(ids, vec!["a5", "a4", "a3", "b1"]);
    let ranks: Vec<usize> = result.selected.iter().map(|ranked| ranked.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);

    assert_eq!(result.rejected(RejectionReason::ChannelLimit), 2);
    assert_eq!(result.rejected(RejectionReason::TotalLimit), 1);
    assert_eq!(result.per_channel["a"].viral_count, 5);
    assert_eq!(result.per_channel["a"].selected_count, 3);
    assert_eq!(result.per_channel["b"].selected_count, 1);
    assert_eq!(result.evaluations.len(), posts.len());
}

#[test]
fn no_channel_exceeds_its_quota() {
    let channels = ["a", "b", "c", "d"];
    let mut posts = Vec::new();
    for channel in channels {
        for i in 0..6u64 {
            posts.push(viral_post(&format!("{}{}", channel, i), channel, 1_000 + 700 * i));
        }
    }

    for (per_channel, total) in [(1, 50), (2, 5), (3, 50), (6, 10)] {
        let result = selector().select(&posts, &baselines(&channels), per_channel, total);
        assert!(result.selected.len() <= total);
        for channel in channels {
            let count = result
                .selected
                .iter()
                .filter(|ranked| ranked.post.channel_id == channel)
                .count();
            assert!(count <= per_channel);
        }
    }
}

#[test]
fn ties_break_on_views_then_post_id() {
    // 12k and 15k views both saturate the reach term, so scores tie.
    let posts = vec![
        viral_post("b-high", "b", 15_000),
        viral_post("a-low", "a", 12_000),
        viral_post("c-high", "c", 15_000),
    ];
    let result = selector().select(&posts, &baselines(&["a", "b", "c"]), 3, 50);

    let ids: Vec<&str> = result
        .selected
        .iter()
        .map(|ranked| ranked.post.post_id.as_str())
        .collect();
    assert_eq!(ids, vec!["b-high", "c-high", "a-low"]);
    assert_eq!(
        result.selected[0].result.viral_score,
        result.selected[2].result.viral_score
    );
}

#[test]
fn failed_checks_are_counted_per_reason() {
    let posts = vec![
        ordinary_post("o1", "a"),
        ordinary_post("o2", "a"),
        Post::new("z", "a", Utc::now(), 0).with_engagement(10, 0, 0),
    ];
    let result = selector().select(&posts, &baselines(&["a"]), 3, 50);

    assert!(result.selected.is_empty());
    assert_eq!(result.rejected(RejectionReason::LowZscore), 2);
    assert_eq!(result.rejected(RejectionReason::LowMedianMultiplier), 2);
    assert_eq!(result.rejected(RejectionReason::UndefinedEngagement), 1);
    assert_eq!(result.per_channel["a"].baseline_status, BaselineStatus::Ready);
}

#[test]
fn selection_is_idempotent() {
    let mut posts = Vec::new();
    for channel in ["a", "b", "c"] {
        for i in 0..5u64 {
            posts.push(viral_post(&format!("{}{}", channel, i), channel, 800 + 900 * i));
        }
        posts.push(ordinary_post(&format!("{}-plain", channel), channel));
    }
    let known = baselines(&["a", "b"]);

    let first = selector().select(&posts, &known, 2, 5);
    let second = selector().select(&posts, &known, 2, 5);

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}
