pub mod calculator;
pub mod model;

pub use calculator::{BaselineCalculator, BaselineConfig, MIN_POSTS_FLOOR, OUTLIER_MIN_SAMPLES};
pub use model::{BaselineStatus, ChannelBaseline};
