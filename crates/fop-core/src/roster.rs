//! Storage collaborator for groups and athletes.
//!
//! The engine reads a group snapshot when it is switched in and writes back
//! athletes after each accepted change or decision. Everything else about
//! persistence is the implementation's business.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::athlete::Athlete;
use crate::error::{FopError, Result};
use crate::group::Group;

pub trait Roster: Send + Sync {
    /// Snapshot of a group, `None` if no group has that name.
    fn group(&self, name: &str) -> Result<Option<Group>>;

    fn group_names(&self) -> Result<Vec<String>>;

    /// Persist one athlete of a group.
    fn save_athlete(&self, group: &str, athlete: &Athlete) -> Result<()>;

    fn mark_done(&self, group: &str) -> Result<()>;
}

/// File layout shared by the YAML roster and the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterFile {
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl RosterFile {
    fn group_mut(&mut self, name: &str) -> Result<&mut Group> {
        self.groups
            .iter_mut()
            .find(|g| g.name == name)
            .ok_or_else(|| FopError::GroupNotFound(name.to_string()))
    }

    fn save_athlete(&mut self, group: &str, athlete: &Athlete) -> Result<()> {
        let g = self.group_mut(group)?;
        match g.athlete_mut(athlete.id) {
            Some(slot) => *slot = athlete.clone(),
            None => return Err(FopError::AthleteNotInGroup(athlete.id)),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryRoster
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryRoster {
    inner: Mutex<RosterFile>,
}

impl MemoryRoster {
    pub fn new(groups: Vec<Group>) -> Self {
        Self {
            inner: Mutex::new(RosterFile { groups }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RosterFile> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Roster for MemoryRoster {
    fn group(&self, name: &str) -> Result<Option<Group>> {
        Ok(self.lock().groups.iter().find(|g| g.name == name).cloned())
    }

    fn group_names(&self) -> Result<Vec<String>> {
        Ok(self.lock().groups.iter().map(|g| g.name.clone()).collect())
    }

    fn save_athlete(&self, group: &str, athlete: &Athlete) -> Result<()> {
        self.lock().save_athlete(group, athlete)
    }

    fn mark_done(&self, group: &str) -> Result<()> {
        self.lock().group_mut(group)?.done = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// YamlRoster
// ---------------------------------------------------------------------------

/// Roster backed by a single YAML file, rewritten atomically on every save.
#[derive(Debug)]
pub struct YamlRoster {
    path: PathBuf,
    inner: Mutex<RosterFile>,
}

impl YamlRoster {
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let file: RosterFile = serde_yaml::from_str(&data)?;
        debug!(path = %path.display(), groups = file.groups.len(), "loaded roster");
        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, f: impl FnOnce(&mut RosterFile) -> Result<()>) -> Result<()> {
        let mut file = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut file)?;
        let data = serde_yaml::to_string(&*file)?;
        crate::io::atomic_write(&self.path, data.as_bytes())
    }
}

impl Roster for YamlRoster {
    fn group(&self, name: &str) -> Result<Option<Group>> {
        let file = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(file.groups.iter().find(|g| g.name == name).cloned())
    }

    fn group_names(&self) -> Result<Vec<String>> {
        let file = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(file.groups.iter().map(|g| g.name.clone()).collect())
    }

    fn save_athlete(&self, group: &str, athlete: &Athlete) -> Result<()> {
        self.update(|file| file.save_athlete(group, athlete))
    }

    fn mark_done(&self, group: &str) -> Result<()> {
        self.update(|file| {
            file.group_mut(group)?.done = true;
            Ok(())
        })
    }
}
