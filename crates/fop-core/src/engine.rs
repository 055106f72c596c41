//! One task per platform.
//!
//! All inbound events go through a single command queue and are applied in
//! arrival order by the task that owns the [`FieldOfPlay`]. Timer expiry is
//! not a callback: the loop sleeps until the state machine's next deadline
//! and then applies the synthetic event through the same path.
//!
//! ```text
//!   surfaces ──emit/submit──► mpsc ──► engine task ──► broadcast<UiEvent> ──► surfaces
//!                                          │
//!                                          └──► watch<Clocks> ──► resync (no round trip)
//! ```

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::error::{FopError, Result};
use crate::events::{FopEvent, UiEvent};
use crate::fop::{FieldOfPlay, FopStatus};
use crate::timer::{Timer, TimerSnapshot};

/// Latest authoritative copies of both clocks.
#[derive(Debug, Clone, Default)]
pub struct Clocks {
    pub athlete: Timer,
    pub pause: Timer,
}

enum Command {
    Event {
        event: FopEvent,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    Status {
        reply: oneshot::Sender<FopStatus>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// EngineHandle
// ---------------------------------------------------------------------------

/// Cheap, cloneable access to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    name: String,
    commands: mpsc::UnboundedSender<Command>,
    ui: broadcast::Sender<UiEvent>,
    clocks: watch::Receiver<Clocks>,
}

impl EngineHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn closed_error(&self) -> FopError {
        FopError::EngineClosed(self.name.clone())
    }

    /// Queue an event without waiting for it to be applied.
    pub fn emit(&self, event: FopEvent) -> Result<()> {
        self.commands
            .send(Command::Event { event, reply: None })
            .map_err(|_| self.closed_error())
    }

    /// Queue an event and wait for the outcome, including rule violations.
    pub async fn submit(&self, event: FopEvent) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Event {
                event,
                reply: Some(tx),
            })
            .map_err(|_| self.closed_error())?;
        rx.await.map_err(|_| self.closed_error())?
    }

    pub async fn status(&self) -> Result<FopStatus> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Status { reply: tx })
            .map_err(|_| self.closed_error())?;
        rx.await.map_err(|_| self.closed_error())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.ui.subscribe()
    }

    pub fn resync_athlete_timer(&self) -> TimerSnapshot {
        self.clocks.borrow().athlete.snapshot(Instant::now())
    }

    pub fn resync_break_timer(&self) -> TimerSnapshot {
        self.clocks.borrow().pause.snapshot(Instant::now())
    }

    /// Resolves once the engine task has stopped.
    pub async fn closed(&self) {
        self.commands.closed().await
    }

    /// Ask the engine to stop after the commands already queued.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    fop: FieldOfPlay,
    commands: mpsc::UnboundedReceiver<Command>,
    ui: broadcast::Sender<UiEvent>,
    clocks: watch::Sender<Clocks>,
}

impl Engine {
    /// Start the engine task. `ui_capacity` bounds each subscriber's backlog;
    /// a subscriber that falls further behind loses the oldest events.
    pub fn spawn(fop: FieldOfPlay, ui_capacity: usize) -> (EngineHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ui_tx, _) = broadcast::channel(ui_capacity.max(1));
        let (athlete, pause) = fop.timers();
        let (clock_tx, clock_rx) = watch::channel(Clocks { athlete, pause });
        let handle = EngineHandle {
            name: fop.name().to_string(),
            commands: cmd_tx,
            ui: ui_tx.clone(),
            clocks: clock_rx,
        };
        let engine = Engine {
            fop,
            commands: cmd_rx,
            ui: ui_tx,
            clocks: clock_tx,
        };
        (handle, tokio::spawn(engine.run()))
    }

    async fn run(mut self) {
        info!(fop = %self.fop.name(), "engine started");
        loop {
            let deadline = self.fop.next_deadline();
            let wake = deadline.as_ref().map(|(at, _)| *at);
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Event { event, reply }) => {
                        let result = self.apply(&event);
                        if let Some(reply) = reply {
                            let _ = reply.send(result);
                        }
                    }
                    Some(Command::Status { reply }) => {
                        let _ = reply.send(self.fop.status(Instant::now()));
                    }
                    Some(Command::Shutdown) | None => break,
                },
                _ = sleep_until_opt(wake) => {
                    if let Some((_, kind)) = deadline {
                        let _ = self.apply(&FopEvent::from_engine(kind));
                    }
                }
            }
        }
        info!(fop = %self.fop.name(), "engine stopped");
    }

    fn apply(&mut self, event: &FopEvent) -> Result<()> {
        let events = match self.fop.handle(event, Instant::now()) {
            Ok(events) => events,
            Err(e) => {
                debug!(fop = %self.fop.name(), event = event.kind.name(), error = %e, "event rejected");
                return Err(e);
            }
        };
        let (athlete, pause) = self.fop.timers();
        self.clocks.send_replace(Clocks { athlete, pause });
        for ev in events {
            // No subscribers is not an error.
            let _ = self.ui.send(ev);
        }
        Ok(())
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::athlete::{Athlete, AthleteId, ChangeField};
    use crate::events::{FopEventKind, Origin, UiEventKind};
    use crate::fop::FopSettings;
    use crate::group::Group;
    use crate::roster::MemoryRoster;
    use crate::types::{FopState, Gender};
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn lifter(id: u64, snatch: u32) -> Athlete {
        let mut a = Athlete::new(id, "A", format!("L{id}"), Gender::F);
        a.start_number = Some(id as u32);
        a.attempts[0].declaration = Some(snatch);
        a.attempts[3].declaration = Some(snatch + 20);
        a
    }

    async fn started(athletes: Vec<Athlete>) -> (EngineHandle, JoinHandle<()>) {
        let roster = Arc::new(MemoryRoster::new(vec![Group::new("W1", athletes)]));
        let fop = FieldOfPlay::new("A", FopSettings::default(), roster);
        let (handle, task) = Engine::spawn(fop, 64);
        handle
            .submit(event(FopEventKind::SwitchGroup {
                group: Some("W1".into()),
            }))
            .await
            .unwrap();
        (handle, task)
    }

    fn event(kind: FopEventKind) -> FopEvent {
        FopEvent::new(Origin::new("timekeeper"), kind)
    }

    fn drain(rx: &mut broadcast::Receiver<UiEvent>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            names.push(ev.kind.name());
        }
        names
    }

    #[tokio::test(start_paused = true)]
    async fn resync_tracks_running_clock() {
        let (handle, _task) = started(vec![lifter(1, 70)]).await;
        handle.submit(event(FopEventKind::TimeStarted)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        let snap = handle.resync_athlete_timer();
        assert!(snap.running);
        assert_eq!(snap.remaining_ms, 50_000);
    }

    #[tokio::test(start_paused = true)]
    async fn clock_expiry_is_injected() {
        let (handle, _task) = started(vec![lifter(1, 70)]).await;
        let mut rx = handle.subscribe();
        handle.submit(event(FopEventKind::TimeStarted)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;

        let mut stop = None;
        while let Ok(ev) = rx.try_recv() {
            if let UiEventKind::StopTime { remaining_ms } = ev.kind {
                stop = Some((remaining_ms, ev.origin));
            }
        }
        assert_eq!(stop, Some((0, Origin::engine())));
        let status = handle.status().await.unwrap();
        assert_eq!(status.state, FopState::TimeStopped);
        assert!(!handle.resync_athlete_timer().running);
    }

    #[tokio::test(start_paused = true)]
    async fn decision_resets_and_group_finishes() {
        let mut last = lifter(1, 70);
        for _ in 0..5 {
            last.record_lift(true, Utc::now());
        }
        let (handle, _task) = started(vec![last]).await;
        let mut rx = handle.subscribe();
        for i in 0..3 {
            handle
                .submit(event(FopEventKind::DecisionUpdate {
                    ref_index: i,
                    decision: true,
                    time_ms: None,
                }))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_secs(4)).await;

        let names = drain(&mut rx);
        assert!(names.contains(&"DownSignal"));
        assert!(names.contains(&"Decision"));
        assert_eq!(names.iter().filter(|n| **n == "GroupDone").count(), 1);
        let status = handle.status().await.unwrap();
        assert_eq!(status.state, FopState::Break);
    }

    #[tokio::test]
    async fn rule_violation_reaches_submitter_only() {
        let (handle, _task) = started(vec![lifter(1, 70)]).await;
        let mut rx = handle.subscribe();
        let err = handle
            .submit(event(FopEventKind::WeightChange {
                athlete: AthleteId(1),
                attempt: 2,
                field: ChangeField::Declaration,
                weight: 80,
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, FopError::RuleViolation(_)));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn events_apply_in_arrival_order() {
        let (handle, _task) = started(vec![lifter(1, 70), lifter(2, 75)]).await;
        let mut rx = handle.subscribe();
        handle.emit(event(FopEventKind::TimeStarted)).unwrap();
        handle.emit(event(FopEventKind::TimeStopped)).unwrap();
        handle.emit(event(FopEventKind::TimeStarted)).unwrap();
        // The status query queues behind the three events.
        let status = handle.status().await.unwrap();
        assert_eq!(status.state, FopState::TimeRunning);
        assert_eq!(drain(&mut rx), vec!["StartTime", "StopTime", "StartTime"]);
    }

    #[tokio::test]
    async fn shutdown_closes_engine() {
        let (handle, task) = started(vec![lifter(1, 70)]).await;
        handle.shutdown();
        task.await.unwrap();
        assert!(matches!(
            handle.emit(event(FopEventKind::TimeStarted)),
            Err(FopError::EngineClosed(_))
        ));
    }
}
