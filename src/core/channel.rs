use crate::config::ChannelConfig;
use crate::core::virality::{Tier, ViralityThresholds};

/// A monitored channel with its most recently known subscriber count.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub subscribers: Option<i64>,
}

impl Channel {
    pub fn tier(&self, thresholds: &ViralityThresholds) -> Option<Tier> {
        self.subscribers.map(|subs| thresholds.tier_for(subs))
    }

    pub fn url(&self) -> String {
        format!("https://www.youtube.com/channel/{}", self.id)
    }
}

impl From<&ChannelConfig> for Channel {
    fn from(config: &ChannelConfig) -> Self {
        Self {
            id: config.id.trim().to_string(),
            name: config.name.clone(),
            subscribers: config.subscribers,
        }
    }
}

/// The static list of channels to poll, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
}

impl ChannelRegistry {
    pub fn from_config(channels: &[ChannelConfig]) -> Self {
        let mut registry = Self::default();
        for config in channels {
            let channel = Channel::from(config);
            if registry.channels.iter().any(|c| c.id == channel.id) {
                tracing::warn!(channel_id = %channel.id, "duplicate channel in config, ignoring");
                continue;
            }
            registry.channels.push(channel);
        }
        registry
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
