use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::llm::ProviderId;

/// One append-only log per provider. Channels are never merged.
#[derive(Debug, Clone, Default)]
pub struct LogChannels {
    channels: [Vec<String>; 3],
}

impl LogChannels {
    pub fn push(&mut self, provider: ProviderId, message: impl Into<String>) {
        self.channels[provider.index()].push(message.into());
    }

    pub fn channel(&self, provider: ProviderId) -> &[String] {
        &self.channels[provider.index()]
    }

    pub fn clear(&mut self) {
        self.channels.iter_mut().for_each(Vec::clear);
    }

    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(Vec::is_empty)
    }
}

impl Serialize for LogChannels {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(ProviderId::ALL.len()))?;
        for provider in ProviderId::ALL {
            map.serialize_entry(provider.as_str(), self.channel(provider))?;
        }
        map.end()
    }
}
