use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::{Engine, EngineHandle};
use crate::error::{FopError, Result};
use crate::fop::{FieldOfPlay, FopSettings};
use crate::roster::Roster;

/// Owns one engine per configured platform. Created once at startup and
/// passed to whatever needs to reach an engine.
pub struct EngineRegistry {
    engines: BTreeMap<String, EngineHandle>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EngineRegistry {
    /// Spawn an engine for every platform in `config`. Must be called from
    /// within a tokio runtime.
    pub fn start(config: &Config, roster: Arc<dyn Roster>) -> Self {
        let settings = FopSettings::from_config(config);
        let mut engines = BTreeMap::new();
        let mut tasks = Vec::new();
        for name in &config.platforms {
            if engines.contains_key(name) {
                warn!(fop = %name, "duplicate platform skipped");
                continue;
            }
            let fop = FieldOfPlay::new(name.clone(), settings.clone(), roster.clone());
            let (handle, task) = Engine::spawn(fop, config.timing.ui_channel_capacity);
            engines.insert(name.clone(), handle);
            tasks.push(task);
        }
        info!(platforms = engines.len(), "engines started");
        Self {
            engines,
            tasks: Mutex::new(tasks),
        }
    }

    pub fn get(&self, name: &str) -> Result<EngineHandle> {
        self.engines
            .get(name)
            .cloned()
            .ok_or_else(|| FopError::UnknownPlatform(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.engines.keys().cloned().collect()
    }

    pub fn handles(&self) -> impl Iterator<Item = &EngineHandle> {
        self.engines.values()
    }

    /// Stop every engine and wait for their tasks to finish.
    pub async fn shutdown(&self) {
        for handle in self.engines.values() {
            handle.shutdown();
        }
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "engine task failed");
            }
        }
        info!("engines stopped");
    }
}
