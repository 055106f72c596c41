use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use fop_core::registry::EngineRegistry;
use fop_forwarder::Channel;
use serde::Serialize;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<EngineRegistry>,
    pub mirror: Arc<MirrorStore>,
}

impl AppState {
    pub fn new(registry: Arc<EngineRegistry>, mirror_key: Option<String>) -> Self {
        Self {
            registry,
            mirror: Arc::new(MirrorStore::new(mirror_key)),
        }
    }
}

// ---------------------------------------------------------------------------
// MirrorStore
// ---------------------------------------------------------------------------

/// Latest payload per channel for one mirrored platform.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MirrorEntry {
    pub update: Option<BTreeMap<String, String>>,
    pub decision: Option<BTreeMap<String, String>>,
    pub timer: Option<BTreeMap<String, String>>,
}

/// Receiving side of the remote forwarder.
pub struct MirrorStore {
    key: Option<String>,
    platforms: RwLock<HashMap<String, MirrorEntry>>,
}

impl MirrorStore {
    pub fn new(key: Option<String>) -> Self {
        Self {
            key,
            platforms: RwLock::new(HashMap::new()),
        }
    }

    /// A payload is accepted only when a key is configured and matches.
    pub fn authorizes(&self, fields: &BTreeMap<String, String>) -> bool {
        match (&self.key, fields.get("updateKey")) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        }
    }

    /// Store `fields` under the platform it names. Returns the platform, or
    /// `None` when the payload does not name one.
    pub fn record(&self, channel: Channel, mut fields: BTreeMap<String, String>) -> Option<String> {
        let fop = fields
            .get("fop")
            .or_else(|| fields.get("fopName"))
            .cloned()?;
        fields.remove("updateKey");
        let mut platforms = self.platforms.write().unwrap_or_else(|e| e.into_inner());
        let entry = platforms.entry(fop.clone()).or_default();
        match channel {
            Channel::Update => entry.update = Some(fields),
            Channel::Decision => entry.decision = Some(fields),
            Channel::Timer => entry.timer = Some(fields),
        }
        Some(fop)
    }

    /// The mirrored state of `fop`, once its first update has arrived.
    pub fn get(&self, fop: &str) -> Option<MirrorEntry> {
        let platforms = self.platforms.read().unwrap_or_else(|e| e.into_inner());
        platforms.get(fop).filter(|e| e.update.is_some()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn key_must_match() {
        let store = MirrorStore::new(Some("k".into()));
        assert!(store.authorizes(&fields(&[("updateKey", "k")])));
        assert!(!store.authorizes(&fields(&[("updateKey", "x")])));
        assert!(!store.authorizes(&fields(&[])));
        assert!(!MirrorStore::new(None).authorizes(&fields(&[("updateKey", "k")])));
    }

    #[test]
    fn timer_alone_does_not_publish_platform() {
        let store = MirrorStore::new(Some("k".into()));
        store.record(Channel::Timer, fields(&[("fopName", "A"), ("eventType", "StartTime")]));
        assert!(store.get("A").is_none());

        store.record(Channel::Update, fields(&[("fop", "A"), ("updateKey", "k")]));
        let entry = store.get("A").unwrap();
        assert!(entry.timer.is_some());
        assert!(!entry.update.unwrap().contains_key("updateKey"));
    }
}
