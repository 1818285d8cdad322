use std::collections::HashMap;

/// Caps how many posts a single channel may place in a selection.
#[derive(Debug, Clone)]
pub struct ChannelQuota {
    max_per_channel: usize,
    used: HashMap<String, usize>,
}

impl ChannelQuota {
    pub fn new(max_per_channel: usize) -> Self {
        Self {
            max_per_channel,
            used: HashMap::new(),
        }
    }

    pub fn max_per_channel(&self) -> usize {
        self.max_per_channel
    }

    /// Claims a slot for `channel_id`; `false` once the channel is full.
    pub fn try_take(&mut self, channel_id: &str) -> bool {
        let count = self.used.entry(channel_id.to_string()).or_insert(0);
        if *count >= self.max_per_channel {
            return false;
        }
        *count += 1;
        true
    }

    pub fn used(&self, channel_id: &str) -> usize {
        self.used.get(channel_id).copied().unwrap_or(0)
    }
}
