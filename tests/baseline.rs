use chrono::{DateTime, Duration, TimeZone, Utc};

use channel_virality::baseline::{BaselineCalculator, BaselineConfig, BaselineStatus};
use channel_virality::scoring::{EngagementScorer, EngagementWeights};
use channel_virality::{stats, Post};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn post_with_forwards(idx: usize, views: u64, forwards: u64) -> Post {
    Post::new(
        format!("p{}", idx),
        "chan",
        now() - Duration::hours(idx as i64 + 1),
        views,
    )
    .with_engagement(forwards, 0, 0)
}

fn history(forwards: &[u64]) -> Vec<Post> {
    forwards
        .iter()
        .enumerate()
        .map(|(idx, f)| post_with_forwards(idx, 1_000, *f))
        .collect()
}

fn calculator() -> BaselineCalculator {
    BaselineCalculator::new(
        EngagementScorer::new(EngagementWeights::default()),
        BaselineConfig::default(),
    )
}

#[test]
fn engagement_rate_uses_weights_and_caps_at_one() {
    let scorer = EngagementScorer::new(EngagementWeights::default());
    let post = Post::new("p", "chan", now(), 1_000).with_engagement(10, 20, 5);
    let expected = (10.0 * 0.5 + 20.0 * 0.3 + 5.0 * 0.2) / 1_000.0;
    assert!((scorer.rate(&post).unwrap() - expected).abs() < 1e-12);

    let saturated = Post::new("s", "chan", now(), 10).with_engagement(1_000, 0, 0);
    assert_eq!(scorer.rate(&saturated), Some(1.0));

    let unseen = Post::new("u", "chan", now(), 0).with_engagement(10, 0, 0);
    assert_eq!(scorer.rate(&unseen), None);
}

#[test]
fn five_posts_keep_channel_learning() {
    let posts = history(&[20, 40, 60, 80, 500]);
    assert!(calculator().compute_at("chan", &posts, now()).is_none());
}

#[test]
fn zero_view_posts_do_not_count_towards_minimum() {
    let mut posts = history(&[20; 9]);
    for idx in 0..3 {
        posts.push(Post::new(format!("z{}", idx), "chan", now(), 0).with_engagement(10, 0, 0));
    }
    assert!(calculator().compute_at("chan", &posts, now()).is_none());
}

#[test]
fn single_outlier_is_clipped_before_statistics() {
    let mut forwards = vec![20u64; 11];
    forwards.push(1_000);
    let posts = history(&forwards);

    let baseline = calculator()
        .compute_at("chan", &posts, now())
        .expect("12 posts is enough");

    assert_eq!(baseline.posts_analyzed, 11);
    assert_eq!(baseline.status, BaselineStatus::Ready);
    assert_eq!(baseline.last_calculated, Some(now()));
    assert!((baseline.median_engagement_rate - 0.01).abs() < 1e-9);
    assert!((baseline.max_engagement_rate - 0.01).abs() < 1e-9);
    assert_eq!(baseline.std_engagement_rate, 0.0);
}

#[test]
fn small_samples_skip_clipping() {
    let config = BaselineConfig {
        min_posts_for_baseline: 3,
        ..BaselineConfig::default()
    };
    let calculator = BaselineCalculator::new(EngagementScorer::new(EngagementWeights::default()), config);
    let posts = history(&[20, 22, 18, 24, 1_000]);

    let baseline = calculator.compute_at("chan", &posts, now()).unwrap();
    assert_eq!(baseline.posts_analyzed, 5);
    assert!((baseline.max_engagement_rate - 0.5).abs() < 1e-9);
}

#[test]
fn clipping_can_drop_a_channel_below_the_minimum() {
    let forwards: Vec<u64> = (20..30).collect();
    let posts = history(&forwards);
    assert_eq!(posts.len(), 10);

    assert!(calculator().compute_at("chan", &posts, now()).is_none());
}

#[test]
fn nine_rates_are_not_clipped() {
    let config = BaselineConfig {
        min_posts_for_baseline: 9,
        ..BaselineConfig::default()
    };
    let calculator = BaselineCalculator::new(EngagementScorer::new(EngagementWeights::default()), config);
    let posts = history(&[20, 21, 22, 23, 24, 25, 26, 27, 1_000]);

    let baseline = calculator.compute_at("chan", &posts, now()).unwrap();
    assert_eq!(baseline.posts_analyzed, 9);
    assert!((baseline.max_engagement_rate - 0.5).abs() < 1e-9);

    let mut ten = posts.clone();
    ten.push(post_with_forwards(9, 1_000, 28));
    let clipped = calculator.compute_at("chan", &ten, now()).unwrap();
    assert_eq!(clipped.posts_analyzed, 9);
    assert!(clipped.max_engagement_rate < 0.02);
}

#[test]
fn minimum_is_floored_at_three() {
    let config = BaselineConfig {
        min_posts_for_baseline: 1,
        ..BaselineConfig::default()
    };
    let calculator = BaselineCalculator::new(EngagementScorer::new(EngagementWeights::default()), config);
    assert!(calculator.compute_at("chan", &history(&[20, 30]), now()).is_none());
    assert!(calculator.compute_at("chan", &history(&[20, 30, 40]), now()).is_some());
}

#[test]
fn posts_outside_window_or_channel_are_ignored() {
    let mut posts = history(&[20; 9]);
    let mut stale = post_with_forwards(100, 1_000, 20);
    stale.published_at = now() - Duration::days(31);
    posts.push(stale);
    let mut foreign = post_with_forwards(101, 1_000, 20);
    foreign.channel_id = "other".to_string();
    posts.push(foreign);

    assert!(calculator().compute_at("chan", &posts, now()).is_none());
}

#[test]
fn recomputation_is_bit_identical() {
    let posts = history(&[18, 19, 20, 21, 22, 20, 19, 21, 20, 18, 22, 35, 17]);
    let first = calculator().compute_at("chan", &posts, now()).unwrap();
    let second = calculator().compute_at("chan", &posts, now()).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.avg_engagement_rate.to_bits(),
        second.avg_engagement_rate.to_bits()
    );
}

#[test]
fn clipping_limits_the_effect_of_an_extreme_post() {
    let forwards: Vec<u64> = (0..20).map(|idx| 16 + (idx % 9) as u64).collect();
    let clean_posts = history(&forwards);
    let mut spiked_posts = clean_posts.clone();
    spiked_posts.push(post_with_forwards(50, 1_000, 1_800));

    let clean = calculator().compute_at("chan", &clean_posts, now()).unwrap();
    let spiked = calculator().compute_at("chan", &spiked_posts, now()).unwrap();

    let scorer = EngagementScorer::new(EngagementWeights::default());
    let raw_clean: Vec<f64> = clean_posts.iter().filter_map(|p| scorer.rate(p)).collect();
    let raw_spiked: Vec<f64> = spiked_posts.iter().filter_map(|p| scorer.rate(p)).collect();

    let median_shift = (spiked.median_engagement_rate - clean.median_engagement_rate).abs();
    let mean_shift = (stats::mean(&raw_spiked) - stats::mean(&raw_clean)).abs();
    assert!(
        median_shift < mean_shift,
        "median moved {median_shift}, unclipped mean moved {mean_shift}"
    );
    assert!(spiked.max_engagement_rate < 0.9);
}

#[test]
fn baseline_turns_outdated_after_refresh_interval() {
    let baseline = calculator()
        .compute_at("chan", &history(&[20; 12]), now())
        .unwrap();
    let interval = Duration::hours(24);

    assert_eq!(baseline.status_at(now() + Duration::hours(2), interval), BaselineStatus::Ready);
    assert_eq!(
        baseline.status_at(now() + Duration::hours(25), interval),
        BaselineStatus::Outdated
    );

    let mut unstamped = baseline.clone();
    unstamped.last_calculated = None;
    assert_eq!(unstamped.status_at(now(), interval), BaselineStatus::Outdated);
}
