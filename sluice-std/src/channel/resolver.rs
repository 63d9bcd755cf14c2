use sluice_core::{ChannelResolver, MessageChannel, MessagingError};
use std::{collections::BTreeMap, sync::Arc};

/// Resolves channels from a map frozen at construction.
#[derive(Clone, Default)]
pub struct InMemoryChannelResolver {
    channels: BTreeMap<String, Arc<dyn MessageChannel>>,
}

impl InMemoryChannelResolver {
    /// Resolve from an explicit name → channel map.
    pub fn new(channels: BTreeMap<String, Arc<dyn MessageChannel>>) -> Self {
        Self { channels }
    }

    /// Resolve channels by their own names.
    pub fn from_channels(channels: impl IntoIterator<Item = Arc<dyn MessageChannel>>) -> Self {
        Self::new(
            channels
                .into_iter()
                .map(|channel| (channel.name().to_string(), channel))
                .collect(),
        )
    }
}

impl ChannelResolver for InMemoryChannelResolver {
    fn resolve(&self, name: &str) -> Result<Arc<dyn MessageChannel>, MessagingError> {
        self.channels
            .get(name)
            .cloned()
            .ok_or_else(|| MessagingError::ChannelNotFound(name.to_string()))
    }

    fn has(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    fn channel_names(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }
}
