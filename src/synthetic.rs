use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::Post;

const DEFAULT_VIEWS: u64 = 2_000;

/// Deterministic channel history: one post per hour going back from `now`,
/// with engagement scattered around `base_rate`.
///
/// All interactions are reported as forwards so the default forward weight
/// maps them back onto the rate.
pub fn generate_channel_history(
    channel_id: &str,
    count: usize,
    base_rate: f64,
    seed: u64,
    now: DateTime<Utc>,
) -> Vec<Post> {
    let mut rng = StdRng::seed_from_u64(seed);
    let subscribers = rng.gen_range(5_000..200_000);

    (0..count)
        .map(|idx| {
            let views = (DEFAULT_VIEWS as f64 * rng.gen_range(0.6..1.4)).round() as u64;
            let rate = (base_rate * rng.gen_range(0.7..1.3)).max(0.0);
            let forwards = ((rate * views as f64) / 0.5).round() as u64;
            let reactions = rng.gen_range(0..3);
            Post::new(
                format!("{}_{}", channel_id, idx),
                channel_id,
                now - Duration::hours(idx as i64 + 1),
                views,
            )
            .with_engagement(forwards, reactions, 0)
            .with_subscribers(subscribers)
        })
        .collect()
}

/// A fresh post engaging at `multiple` times the channel's base rate.
pub fn inject_viral_post(
    channel_id: &str,
    post_id: &str,
    base_rate: f64,
    multiple: f64,
    views: u64,
    now: DateTime<Utc>,
) -> Post {
    let forwards = ((base_rate * multiple * views as f64) / 0.5).round() as u64;
    Post::new(post_id, channel_id, now, views).with_engagement(forwards, 0, 0)
}
