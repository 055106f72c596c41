//! Attaching display and control surfaces to an engine.
//!
//! A surface only implements what it shows; the delivery loop, echo
//! suppression and lag recovery live in [`attach`]. Dropping or detaching
//! the returned [`Attachment`] ends delivery.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::EngineHandle;
use crate::events::{FopEvent, FopEventKind, Origin, UiEvent};
use crate::error::Result;
use crate::timer::TimerSnapshot;

pub trait Surface: Send + 'static {
    fn origin(&self) -> &Origin;

    fn on_ui_event(&mut self, event: &UiEvent);

    /// Called after events were missed, with the authoritative clocks.
    fn on_resync(&mut self, _athlete: TimerSnapshot, _pause: TimerSnapshot) {}
}

pub struct Attachment {
    origin: Origin,
    engine: EngineHandle,
    task: JoinHandle<()>,
}

impl Attachment {
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Emit an event on behalf of the attached surface.
    pub fn emit(&self, kind: FopEventKind) -> Result<()> {
        self.engine.emit(FopEvent::new(self.origin.clone(), kind))
    }

    pub fn detach(self) {}
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.task.abort();
        debug!(fop = %self.engine.name(), origin = %self.origin, "surface detached");
    }
}

/// Subscribe `surface` to the engine's UI events. The surface is resynced
/// once on attach and again whenever it falls behind.
pub fn attach<S: Surface>(engine: &EngineHandle, mut surface: S) -> Attachment {
    let mut rx = engine.subscribe();
    let origin = surface.origin().clone();
    let clocks = engine.clone();
    let task = tokio::spawn(async move {
        surface.on_resync(clocks.resync_athlete_timer(), clocks.resync_break_timer());
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !event.is_echo_for(surface.origin()) {
                        surface.on_ui_event(&event);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(fop = %clocks.name(), origin = %surface.origin(), missed, "surface lagged, resyncing");
                    surface.on_resync(clocks.resync_athlete_timer(), clocks.resync_break_timer());
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    debug!(fop = %engine.name(), origin = %origin, "surface attached");
    Attachment {
        origin,
        engine: engine.clone(),
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::athlete::Athlete;
    use crate::engine::Engine;
    use crate::fop::{FieldOfPlay, FopSettings};
    use crate::group::Group;
    use crate::roster::MemoryRoster;
    use crate::types::Gender;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        origin: Origin,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Surface for Recorder {
        fn origin(&self) -> &Origin {
            &self.origin
        }

        fn on_ui_event(&mut self, event: &UiEvent) {
            self.seen.lock().unwrap().push(event.kind.name());
        }
    }

    fn engine() -> EngineHandle {
        let mut a = Athlete::new(1, "Mia", "Roy", Gender::F);
        a.attempts[0].declaration = Some(60);
        let roster = Arc::new(MemoryRoster::new(vec![Group::new("W1", vec![a])]));
        let fop = FieldOfPlay::new("A", FopSettings::default(), roster);
        Engine::spawn(fop, 16).0
    }

    async fn settle(handle: &EngineHandle) {
        // A status round trip orders us after everything queued before it.
        handle.status().await.unwrap();
    }

    async fn wait_for(seen: &Arc<Mutex<Vec<&'static str>>>, name: &str) -> bool {
        for _ in 0..100 {
            if seen.lock().unwrap().iter().any(|n| *n == name) {
                return true;
            }
            tokio::task::yield_now().await;
        }
        false
    }

    #[tokio::test]
    async fn own_decisions_are_not_echoed() {
        let handle = engine();
        handle
            .submit(FopEvent::new(
                Origin::new("announcer"),
                FopEventKind::SwitchGroup {
                    group: Some("W1".into()),
                },
            ))
            .await
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let referee = attach(
            &handle,
            Recorder {
                origin: Origin::new("ref-panel"),
                seen: seen.clone(),
            },
        );
        tokio::task::yield_now().await;
        referee.emit(FopEventKind::TimeStarted).unwrap();
        referee.emit(FopEventKind::DownSignal).unwrap();
        settle(&handle).await;

        // The clock events of the same transition arrive, the signal does not.
        assert!(wait_for(&seen, "StopTime").await);
        assert!(!seen.lock().unwrap().contains(&"DownSignal"));
        referee.detach();
    }

    #[tokio::test]
    async fn detached_surface_stops_receiving() {
        let handle = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let board = attach(
            &handle,
            Recorder {
                origin: Origin::unique("board"),
                seen: seen.clone(),
            },
        );
        tokio::task::yield_now().await;
        handle
            .submit(FopEvent::new(
                Origin::new("announcer"),
                FopEventKind::SwitchGroup {
                    group: Some("W1".into()),
                },
            ))
            .await
            .unwrap();
        settle(&handle).await;
        assert!(wait_for(&seen, "LiftingOrderUpdated").await);

        drop(board);
        handle
            .submit(FopEvent::new(Origin::new("timekeeper"), FopEventKind::TimeStarted))
            .await
            .unwrap();
        settle(&handle).await;
        assert!(!wait_for(&seen, "StartTime").await);
    }
}
