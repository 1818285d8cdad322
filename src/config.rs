use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::baseline::{BaselineCalculator, BaselineConfig};
use crate::error::{EngineError, EngineResult};
use crate::scoring::{EngagementScorer, EngagementWeights, ViralityScorer, ViralityThresholds};
use crate::selection::{SelectionLimits, TopPostsSelector};
use crate::store::Store;

pub const SETTING_ENGAGEMENT_WEIGHTS: &str = "engagement_weights";
pub const SETTING_BASELINE: &str = "baseline_settings";
pub const SETTING_THRESHOLDS: &str = "virality_thresholds";
pub const SETTING_SELECTION: &str = "selection_limits";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: EngagementWeights,
    pub baseline: BaselineConfig,
    pub thresholds: ViralityThresholds,
    pub selection: SelectionLimits,
}

impl EngineConfig {
    pub fn load(path: Option<PathBuf>) -> EngineResult<(Self, Option<PathBuf>)> {
        let config_path = path.or_else(default_config_path);
        let mut config = match config_path.as_ref() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)
                    .map_err(|err| EngineError::Parse(format!("failed to parse config: {}", err)))?
            }
            _ => EngineConfig::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok((config, config_path))
    }

    pub fn write(&self, path: &Path) -> EngineResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let payload = toml::to_string_pretty(self)
            .map_err(|err| EngineError::Parse(format!("failed to serialize config: {}", err)))?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.weights
            .validate()
            .and_then(|_| self.baseline.validate())
            .and_then(|_| self.thresholds.validate())
            .and_then(|_| self.selection.validate())
            .map_err(EngineError::InvalidConfig)
    }

    /// Overlays the settings held by the store on top of `self`.
    ///
    /// Each section is decoded once here, whether the store hands back an
    /// object or a JSON-encoded string. A section that is unreadable or fails
    /// validation is logged and left at its current value.
    pub async fn with_store_settings<S>(mut self, store: &S) -> Self
    where
        S: Store + ?Sized,
    {
        self.weights = read_section(
            store,
            SETTING_ENGAGEMENT_WEIGHTS,
            self.weights,
            EngagementWeights::validate,
        )
        .await;
        self.baseline =
            read_section(store, SETTING_BASELINE, self.baseline, BaselineConfig::validate).await;
        self.thresholds = read_section(
            store,
            SETTING_THRESHOLDS,
            self.thresholds,
            ViralityThresholds::validate,
        )
        .await;
        self.selection =
            read_section(store, SETTING_SELECTION, self.selection, SelectionLimits::validate).await;
        self
    }

    pub fn engagement_scorer(&self) -> EngagementScorer {
        EngagementScorer::new(self.weights)
    }

    pub fn baseline_calculator(&self) -> BaselineCalculator {
        BaselineCalculator::new(self.engagement_scorer(), self.baseline.clone())
    }

    pub fn virality_scorer(&self) -> ViralityScorer {
        ViralityScorer::new(self.engagement_scorer(), self.thresholds.clone())
    }

    pub fn selector(&self) -> TopPostsSelector {
        TopPostsSelector::new(self.virality_scorer())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(value) = env_parse::<f64>("VIRALITY_MIN_VIRAL_SCORE") {
            self.thresholds.min_viral_score = value;
        }
        if let Some(value) = env_parse::<f64>("VIRALITY_MIN_ZSCORE") {
            self.thresholds.min_zscore = value;
        }
        if let Some(value) = env_parse::<f64>("VIRALITY_MIN_MEDIAN_MULTIPLIER") {
            self.thresholds.min_median_multiplier = value;
        }
        if let Some(value) = env_parse::<usize>("VIRALITY_MIN_POSTS") {
            self.baseline.min_posts_for_baseline = value;
        }
        if let Some(value) = env_parse::<u32>("VIRALITY_HISTORY_DAYS") {
            self.baseline.history_window_days = value;
        }
        if let Some(value) = env_parse::<usize>("VIRALITY_MAX_PER_CHANNEL") {
            self.selection.max_posts_per_channel = value;
        }
        if let Some(value) = env_parse::<usize>("VIRALITY_MAX_TOTAL") {
            self.selection.max_total_posts = value;
        }
    }
}

/// Decodes a setting that may be stored either as structured JSON or as a
/// string containing JSON.
pub fn decode_setting<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, String> {
    match value {
        serde_json::Value::String(raw) => {
            serde_json::from_str(&raw).map_err(|err| format!("invalid encoded setting: {}", err))
        }
        other => serde_json::from_value(other).map_err(|err| format!("invalid setting: {}", err)),
    }
}

async fn read_section<S, T>(
    store: &S,
    key: &str,
    current: T,
    validate: impl Fn(&T) -> Result<(), String>,
) -> T
where
    S: Store + ?Sized,
    T: DeserializeOwned,
{
    let value = match store.get_system_setting(key).await {
        Ok(Some(value)) => value,
        Ok(None) => return current,
        Err(err) => {
            tracing::warn!(setting = key, error = %err, "failed to read setting, keeping current values");
            return current;
        }
    };

    match decode_setting::<T>(value).and_then(|decoded| validate(&decoded).map(|_| decoded)) {
        Ok(decoded) => decoded,
        Err(err) => {
            tracing::warn!(setting = key, error = %err, "malformed setting, keeping current values");
            current
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    env::var("VIRALITY_CONFIG_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from("config/virality.toml")))
}
