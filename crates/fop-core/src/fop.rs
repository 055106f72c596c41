//! The field-of-play state machine.
//!
//! [`FieldOfPlay::handle`] applies one [`FopEvent`] and returns the
//! [`UiEvent`]s it caused. State is fully updated before the events are
//! returned, so a broadcast never shows a half-applied transition. The
//! machine never sleeps: it reports its next timed action through
//! [`FieldOfPlay::next_deadline`] and the engine feeds the matching
//! synthetic event back in when that instant passes.
//!
//! ```text
//!   INACTIVE ──SwitchGroup──► TIME_STOPPED ◄──────────── DecisionReset ─┐
//!                               │    ▲                                   │
//!                  TimeStarted  │    │ TimeStopped / TimeOver            │
//!                               ▼    │                                   │
//!                            TIME_RUNNING ──2 votes──► DOWN_SIGNAL ──3──► DECISION
//!   any ──BreakStarted──► BREAK ──BreakDone / StartLifting──► TIME_STOPPED
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::athlete::{Athlete, AthleteId, ChangeField, WeightRules};
use crate::config::Config;
use crate::decision::{Aggregate, DecisionState};
use crate::error::{FopError, Result};
use crate::events::{FopEvent, FopEventKind, Origin, OrderUpdate, UiEvent, UiEventKind};
use crate::group::Group;
use crate::lifting_order::{self, lifting_order};
use crate::roster::Roster;
use crate::timer::{Countdown, Timer, TimerSnapshot};
use crate::types::{BreakType, FopState};

// ---------------------------------------------------------------------------
// Settings and status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FopSettings {
    pub gender_order: bool,
    pub rules: WeightRules,
    pub athlete_time_ms: i64,
    pub consecutive_time_ms: i64,
    pub break_time_ms: i64,
    pub decision_display: Duration,
}

impl FopSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            gender_order: cfg.competition.gender_order,
            rules: cfg.weight_rules(),
            athlete_time_ms: cfg.timing.athlete_time_ms as i64,
            consecutive_time_ms: cfg.timing.consecutive_time_ms as i64,
            break_time_ms: cfg.timing.break_time_ms as i64,
            decision_display: cfg.timing.decision_display(),
        }
    }
}

impl Default for FopSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Point-in-time view of a platform for status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FopStatus {
    pub name: String,
    pub state: FopState,
    pub group: Option<String>,
    pub break_type: Option<BreakType>,
    pub current: Option<Athlete>,
    pub next: Option<Athlete>,
    pub lifting_order: Vec<AthleteId>,
    pub athlete_timer: TimerSnapshot,
    pub break_timer: TimerSnapshot,
    pub decision: DecisionState,
}

/// Collects the UI events of one transition under the causing origin.
struct Emitter {
    origin: Origin,
    events: Vec<UiEvent>,
}

impl Emitter {
    fn new(origin: Origin) -> Self {
        Self {
            origin,
            events: Vec::new(),
        }
    }

    fn push(&mut self, kind: UiEventKind) {
        self.events.push(UiEvent::new(self.origin.clone(), kind));
    }
}

// ---------------------------------------------------------------------------
// FieldOfPlay
// ---------------------------------------------------------------------------

pub struct FieldOfPlay {
    name: String,
    settings: FopSettings,
    roster: Arc<dyn Roster>,
    state: FopState,
    group: Option<Group>,
    order: Vec<Athlete>,
    /// Athlete shown as current. Held fixed while a decision is pending.
    current: Option<AthleteId>,
    /// Last athlete whose attempt was recorded.
    previous: Option<AthleteId>,
    athlete_timer: Timer,
    /// Athlete the athlete clock's remaining time belongs to.
    timer_owner: Option<AthleteId>,
    break_timer: Timer,
    break_type: Option<BreakType>,
    decision: DecisionState,
    /// Athlete and attempt the jury recorded while the referees were deciding.
    jury_pending: Option<(AthleteId, u8)>,
    reset_at: Option<Instant>,
    seq: u64,
}

impl FieldOfPlay {
    pub fn new(name: impl Into<String>, settings: FopSettings, roster: Arc<dyn Roster>) -> Self {
        let athlete_time = settings.athlete_time_ms;
        Self {
            name: name.into(),
            settings,
            roster,
            state: FopState::Inactive,
            group: None,
            order: Vec::new(),
            current: None,
            previous: None,
            athlete_timer: Timer::new(athlete_time),
            timer_owner: None,
            break_timer: Timer::default(),
            break_type: None,
            decision: DecisionState::default(),
            jury_pending: None,
            reset_at: None,
            seq: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> FopState {
        self.state
    }

    pub fn group(&self) -> Option<&Group> {
        self.group.as_ref()
    }

    pub fn break_type(&self) -> Option<BreakType> {
        self.break_type
    }

    pub fn lifting_order(&self) -> &[Athlete] {
        &self.order
    }

    pub fn decision(&self) -> &DecisionState {
        &self.decision
    }

    pub fn current_athlete(&self) -> Option<&Athlete> {
        self.find(self.current)
    }

    /// Copies of both clocks, for resync without going through the engine.
    pub fn timers(&self) -> (Timer, Timer) {
        (self.athlete_timer.clone(), self.break_timer.clone())
    }

    pub fn status(&self, now: Instant) -> FopStatus {
        FopStatus {
            name: self.name.clone(),
            state: self.state,
            group: self.group.as_ref().map(|g| g.name.clone()),
            break_type: self.break_type,
            current: self.current_athlete().cloned(),
            next: self.next_up().cloned(),
            lifting_order: self.order.iter().map(|a| a.id).collect(),
            athlete_timer: self.athlete_timer.snapshot(now),
            break_timer: self.break_timer.snapshot(now),
            decision: self.decision.clone(),
        }
    }

    /// Earliest timed action and the synthetic event to inject for it.
    pub fn next_deadline(&self) -> Option<(Instant, FopEventKind)> {
        let candidates = [
            (self.state == FopState::TimeRunning)
                .then(|| self.athlete_timer.deadline())
                .flatten()
                .map(|at| (at, FopEventKind::TimeOver)),
            (self.state == FopState::Break)
                .then(|| self.break_timer.deadline())
                .flatten()
                .map(|at| (at, FopEventKind::BreakDone)),
            (self.state == FopState::DecisionVisible)
                .then_some(self.reset_at)
                .flatten()
                .map(|at| (at, FopEventKind::DecisionReset)),
        ];
        candidates.into_iter().flatten().min_by_key(|(at, _)| *at)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Apply one event. Rule violations and unknown groups are returned as
    /// errors and leave the state untouched.
    pub fn handle(&mut self, event: &FopEvent, now: Instant) -> Result<Vec<UiEvent>> {
        debug!(
            fop = %self.name,
            state = %self.state,
            event = event.kind.name(),
            origin = %event.origin,
            "handling event"
        );
        let mut out = Emitter::new(event.origin.clone());
        match &event.kind {
            FopEventKind::SwitchGroup { group } => {
                self.switch_group(group.as_deref(), now, &mut out)?
            }
            FopEventKind::StartLifting => self.start_lifting(event, now, &mut out),
            FopEventKind::TimeStarted => self.time_started(event, now, &mut out),
            FopEventKind::TimeStopped => self.time_stopped(event, now, &mut out),
            FopEventKind::TimeOver => self.time_over(now, &mut out),
            FopEventKind::ForceTime { ms } => self.force_time(event, *ms, now, &mut out)?,
            FopEventKind::WeightChange {
                athlete,
                attempt,
                field,
                weight,
            } => self.weight_change(*athlete, *attempt, *field, *weight, now, &mut out)?,
            FopEventKind::ForceAsCurrent { athlete } => {
                self.force_as_current(*athlete, now, &mut out)?
            }
            FopEventKind::DownSignal => self.down_signal(event, now, &mut out),
            FopEventKind::DecisionUpdate {
                ref_index,
                decision,
                time_ms,
            } => {
                let (index, good, time) = (*ref_index, *decision, *time_ms);
                self.referee_input(event, None, now, &mut out, |d| d.vote(index, good, time));
            }
            FopEventKind::DecisionFullUpdate {
                athlete,
                refs,
                times,
            } => {
                if refs.iter().all(Option::is_none) {
                    debug!(fop = %self.name, "decision update without votes ignored");
                } else {
                    let (refs, times) = (*refs, *times);
                    self.referee_input(event, *athlete, now, &mut out, |d| d.vote_all(refs, times));
                }
            }
            FopEventKind::ExplicitDecision {
                athlete,
                success,
                refs,
            } => {
                let (success, refs) = (*success, *refs);
                self.referee_input(event, *athlete, now, &mut out, |d| {
                    d.force(success, refs);
                    Aggregate {
                        down_signal: false,
                        full_decision: Some(success),
                    }
                });
            }
            FopEventKind::DecisionReset => self.decision_reset(now, &mut out),
            FopEventKind::JuryDecision { athlete, success } => {
                self.jury_decision(*athlete, *success, now, &mut out)?
            }
            FopEventKind::BreakStarted {
                break_type,
                countdown,
            } => self.break_started(*break_type, *countdown, now, &mut out),
            FopEventKind::BreakPaused => self.break_paused(event, now, &mut out),
            FopEventKind::BreakResumed => self.break_resumed(event, now, &mut out),
            FopEventKind::BreakSetTime { countdown } => {
                self.break_set_time(event, *countdown, now, &mut out)
            }
            FopEventKind::BreakDone => self.break_done(event, now, &mut out),
            FopEventKind::BarbellOrPlatesChanged => {
                if let Some(a) = self.current_athlete() {
                    let (id, weight) = (a.id, a.next_requested_weight());
                    out.push(UiEventKind::BarbellOrPlatesChanged {
                        athlete: Some(id),
                        weight,
                    });
                }
            }
            // Client clocks are cosmetic; the server clock is authoritative.
            FopEventKind::ClientTimerStopped { remaining_ms } => {
                trace!(fop = %self.name, origin = %event.origin, remaining_ms, "client timer stop ignored");
            }
            FopEventKind::InitialWarning
            | FopEventKind::FinalWarning
            | FopEventKind::ClientTimeOver => {
                debug!(fop = %self.name, origin = %event.origin, event = event.kind.name(), "client timer report");
            }
        }
        Ok(out.events)
    }

    // -----------------------------------------------------------------------
    // Group and order
    // -----------------------------------------------------------------------

    fn switch_group(&mut self, name: Option<&str>, now: Instant, out: &mut Emitter) -> Result<()> {
        let group = match name {
            Some(n) => Some(
                self.roster
                    .group(n)?
                    .ok_or_else(|| FopError::GroupNotFound(n.to_string()))?,
            ),
            None => None,
        };

        self.athlete_timer = Timer::new(self.settings.athlete_time_ms);
        self.timer_owner = None;
        self.break_timer = Timer::default();
        self.break_type = None;
        self.decision.reset();
        self.jury_pending = None;
        self.reset_at = None;
        self.previous = None;
        self.current = None;
        self.group = group;
        self.recompute();

        match self.group.as_ref().map(|g| g.name.clone()) {
            None => {
                self.state = FopState::Inactive;
                info!(fop = %self.name, "platform inactive");
                out.push(UiEventKind::SwitchGroup {
                    group: None,
                    state: self.state,
                    athlete: None,
                });
            }
            Some(group) => {
                self.state = FopState::TimeStopped;
                self.display_head(now, out);
                info!(fop = %self.name, group = %group, athletes = self.order.len(), "group loaded");
                out.push(UiEventKind::SwitchGroup {
                    group: Some(group),
                    state: self.state,
                    athlete: self.current,
                });
                out.push(self.order_update(None, true, now));
            }
        }
        Ok(())
    }

    fn recompute(&mut self) {
        self.order = match &self.group {
            Some(g) => lifting_order(&g.athletes, self.settings.gender_order),
            None => Vec::new(),
        };
    }

    fn find(&self, id: Option<AthleteId>) -> Option<&Athlete> {
        let id = id?;
        self.group.as_ref()?.athlete(id)
    }

    fn next_up(&self) -> Option<&Athlete> {
        self.order
            .iter()
            .find(|a| Some(a.id) != self.current && !a.is_done())
    }

    fn allowance(&self, id: AthleteId) -> i64 {
        if self.previous == Some(id) {
            self.settings.consecutive_time_ms
        } else {
            self.settings.athlete_time_ms
        }
    }

    /// Show the head of the order as current. The athlete clock is reset to
    /// the time allowed whenever it no longer belongs to that athlete.
    fn display_head(&mut self, now: Instant, out: &mut Emitter) {
        let head = lifting_order::current_athlete(&self.order).map(|a| a.id);
        self.current = head;
        if head == self.timer_owner {
            return;
        }
        if self.athlete_timer.is_running() {
            let remaining_ms = self.athlete_timer.stop(now);
            out.push(UiEventKind::StopTime { remaining_ms });
        }
        let allowed = head
            .map(|id| self.allowance(id))
            .unwrap_or(self.settings.athlete_time_ms);
        self.athlete_timer = Timer::new(allowed);
        self.timer_owner = head;
        out.push(UiEventKind::SetTime {
            remaining_ms: allowed,
        });
    }

    /// After an athlete changed: recompute and, unless a decision holds the
    /// display, move the display to the new head.
    fn reorder(&mut self, changing: Option<AthleteId>, now: Instant, out: &mut Emitter) {
        self.recompute();
        match self.state {
            FopState::DecisionVisible | FopState::DownSignalVisible => {
                out.push(self.order_update(changing, false, now));
            }
            _ => {
                let shown = self.current;
                let was_running = self.athlete_timer.is_running();
                self.display_head(now, out);
                if was_running && !self.athlete_timer.is_running() {
                    self.state = FopState::TimeStopped;
                }
                let affected = shown != self.current || (changing.is_some() && changing == self.current);
                out.push(self.order_update(changing, affected, now));
                self.check_group_done(now, out);
            }
        }
    }

    fn order_update(&self, changing: Option<AthleteId>, affected: bool, now: Instant) -> UiEventKind {
        UiEventKind::LiftingOrderUpdated(Box::new(OrderUpdate {
            group: self.group.as_ref().map(|g| g.name.clone()),
            current: self.current_athlete().cloned(),
            next: self.next_up().cloned(),
            previous: self.find(self.previous).cloned(),
            changing,
            lifting_order: self.order.clone(),
            display_order: self
                .group
                .as_ref()
                .map(Group::display_order)
                .unwrap_or_default(),
            time_allowed_ms: self.athlete_timer.remaining_at(now),
            current_display_affected: affected,
            in_break: self.state == FopState::Break,
        }))
    }

    fn check_group_done(&mut self, now: Instant, out: &mut Emitter) {
        let Some(group) = self.group.as_mut() else {
            return;
        };
        if group.done || group.athletes.is_empty() || !group.all_attempts_done() {
            return;
        }
        group.done = true;
        let name = group.name.clone();
        if let Err(e) = self.roster.mark_done(&name) {
            warn!(fop = %self.name, group = %name, error = %e, "failed to mark group done");
        }
        info!(fop = %self.name, group = %name, "group done");
        out.push(UiEventKind::GroupDone { group: name });
        self.start_break(BreakType::GroupDone, Countdown::Indefinite, now, out);
    }

    fn persist(&self, id: AthleteId) {
        let (Some(group), Some(athlete)) = (self.group.as_ref(), self.find(Some(id))) else {
            return;
        };
        if let Err(e) = self.roster.save_athlete(&group.name, athlete) {
            warn!(fop = %self.name, athlete = %id, error = %e, "failed to save athlete");
        }
    }

    fn weight_change(
        &mut self,
        id: AthleteId,
        attempt: u8,
        field: ChangeField,
        weight: u32,
        now: Instant,
        out: &mut Emitter,
    ) -> Result<()> {
        let rules = self.settings.rules;
        let group = self.group.as_mut().ok_or(FopError::NoActiveGroup)?;
        let Some(athlete) = group.athlete_mut(id) else {
            warn!(fop = %self.name, athlete = %id, "weight change for athlete not in group ignored");
            return Ok(());
        };
        if let Err(violation) = athlete.validate_change(attempt, field, weight, &rules) {
            info!(fop = %self.name, athlete = %id, attempt, weight, %violation, "weight change rejected");
            return Err(violation.into());
        }
        self.seq += 1;
        athlete.apply_change(attempt, field, weight, self.seq);
        info!(fop = %self.name, athlete = %id, attempt, weight, ?field, "weight change");

        // Declining the attempt uses up the clock like a lift would.
        if weight == 0 && self.current == Some(id) {
            self.timer_owner = None;
            self.previous = Some(id);
        }
        self.persist(id);
        self.reorder(Some(id), now, out);
        Ok(())
    }

    fn force_as_current(&mut self, id: AthleteId, now: Instant, out: &mut Emitter) -> Result<()> {
        let group = self.group.as_mut().ok_or(FopError::NoActiveGroup)?;
        if !group.contains(id) {
            warn!(fop = %self.name, athlete = %id, "force as current for athlete not in group ignored");
            return Ok(());
        }
        let mut touched = Vec::new();
        for a in &mut group.athletes {
            let pinned = a.id == id;
            if a.forced_as_current != pinned {
                a.forced_as_current = pinned;
                touched.push(a.id);
            }
        }
        for a in touched {
            self.persist(a);
        }
        info!(fop = %self.name, athlete = %id, "athlete forced as current");
        self.reorder(Some(id), now, out);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Athlete clock
    // -----------------------------------------------------------------------

    fn start_lifting(&mut self, event: &FopEvent, now: Instant, out: &mut Emitter) {
        match self.state {
            FopState::Break => {
                self.end_break(now, out);
                out.push(UiEventKind::StartLifting);
            }
            FopState::TimeStopped | FopState::DecisionVisible => self.time_started(event, now, out),
            _ => self.notify(event, "lifting has already started", out),
        }
    }

    fn time_started(&mut self, event: &FopEvent, now: Instant, out: &mut Emitter) {
        if self.state == FopState::DecisionVisible {
            self.finish_decision(now, out);
        }
        match self.state {
            FopState::TimeStopped => {
                let Some(id) = self.current else {
                    self.notify(event, "no athlete is up", out);
                    return;
                };
                let remaining_ms = self.athlete_timer.remaining_at(now);
                if remaining_ms <= 0 {
                    self.notify(event, "no time left; set the time first", out);
                    return;
                }
                self.athlete_timer.start(now);
                self.state = FopState::TimeRunning;
                info!(fop = %self.name, athlete = %id, remaining_ms, "clock started");
                out.push(UiEventKind::StartTime {
                    remaining_ms,
                    silent: false,
                });
            }
            FopState::TimeRunning => trace!(fop = %self.name, "clock already running"),
            _ => self.notify(event, "clock cannot start in this state", out),
        }
    }

    fn time_stopped(&mut self, event: &FopEvent, now: Instant, out: &mut Emitter) {
        match self.state {
            FopState::TimeRunning => {
                let remaining_ms = self.athlete_timer.stop(now);
                self.state = FopState::TimeStopped;
                info!(fop = %self.name, remaining_ms, "clock stopped");
                out.push(UiEventKind::StopTime { remaining_ms });
            }
            FopState::TimeStopped | FopState::DownSignalVisible | FopState::DecisionVisible => {
                trace!(fop = %self.name, "clock already stopped");
            }
            _ => self.notify(event, "clock is not running", out),
        }
    }

    fn time_over(&mut self, now: Instant, out: &mut Emitter) {
        if self.state != FopState::TimeRunning || self.athlete_timer.remaining_at(now) > 0 {
            trace!(fop = %self.name, "stale time over ignored");
            return;
        }
        self.athlete_timer.stop(now);
        self.state = FopState::TimeStopped;
        info!(fop = %self.name, athlete = ?self.current, "time over");
        out.push(UiEventKind::StopTime { remaining_ms: 0 });
    }

    fn force_time(&mut self, event: &FopEvent, ms: i64, now: Instant, out: &mut Emitter) -> Result<()> {
        if self.group.is_none() {
            return Err(FopError::NoActiveGroup);
        }
        if !matches!(self.state, FopState::TimeStopped | FopState::Break) {
            self.notify(event, "time can only be set while the clock is stopped", out);
            return Ok(());
        }
        if ms <= 0 {
            self.notify(event, "time must be positive", out);
            return Ok(());
        }
        self.athlete_timer.set_time_remaining(Some(ms), now);
        self.timer_owner = self.current;
        info!(fop = %self.name, ms, "time forced");
        out.push(UiEventKind::SetTime { remaining_ms: ms });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------------

    fn referee_input(
        &mut self,
        event: &FopEvent,
        athlete: Option<AthleteId>,
        now: Instant,
        out: &mut Emitter,
        apply: impl FnOnce(&mut DecisionState) -> Aggregate,
    ) {
        if !self.state.accepts_referee_input() {
            if self.state == FopState::DecisionVisible {
                trace!(fop = %self.name, origin = %event.origin, "late referee input ignored");
            } else {
                self.notify(event, "referee input is not accepted now", out);
            }
            return;
        }
        let Some(current) = self.current else {
            self.notify(event, "no athlete is up", out);
            return;
        };
        if let Some(id) = athlete.filter(|id| *id != current) {
            if self.group.as_ref().is_some_and(|g| g.contains(id)) {
                warn!(fop = %self.name, athlete = %id, "decision for athlete who is not up ignored");
            } else {
                warn!(fop = %self.name, athlete = %id, "decision for athlete not in group ignored");
            }
            return;
        }
        let step = apply(&mut self.decision);
        if step.down_signal {
            self.show_down_signal(now, out);
        }
        if let Some(good) = step.full_decision {
            self.record_decision(current, good, now, out);
        }
    }

    fn down_signal(&mut self, event: &FopEvent, now: Instant, out: &mut Emitter) {
        if !self.state.accepts_referee_input() || self.current.is_none() {
            self.notify(event, "down signal is not expected now", out);
            return;
        }
        if self.decision.assert_down() {
            self.show_down_signal(now, out);
        }
    }

    fn show_down_signal(&mut self, now: Instant, out: &mut Emitter) {
        if self.athlete_timer.is_running() {
            let remaining_ms = self.athlete_timer.stop(now);
            out.push(UiEventKind::StopTime { remaining_ms });
        }
        self.state = FopState::DownSignalVisible;
        info!(fop = %self.name, athlete = ?self.current, "down signal");
        out.push(UiEventKind::DownSignal);
    }

    fn record_decision(&mut self, id: AthleteId, good: bool, now: Instant, out: &mut Emitter) {
        if self.athlete_timer.is_running() {
            let remaining_ms = self.athlete_timer.stop(now);
            out.push(UiEventKind::StopTime { remaining_ms });
        }
        self.timer_owner = None;

        let jury_recorded = self.jury_pending.is_some_and(|(jury_id, attempt)| {
            jury_id == id && self.find(Some(id)).is_some_and(|a| a.attempts_done() == attempt)
        });
        if jury_recorded {
            info!(fop = %self.name, athlete = %id, good, "jury already decided; referee lights shown only");
        } else {
            let recorded = self
                .group
                .as_mut()
                .and_then(|g| g.athlete_mut(id))
                .and_then(|a| a.record_lift(good, Utc::now()));
            if let Some(attempt) = recorded {
                info!(fop = %self.name, athlete = %id, attempt, good, "lift recorded");
                self.persist(id);
            }
        }

        self.previous = Some(id);
        self.state = FopState::DecisionVisible;
        self.reset_at = Some(now + self.settings.decision_display);
        self.recompute();
        out.push(UiEventKind::Decision {
            athlete: Some(id),
            success: good,
            refs: self.decision.refs(),
        });
        out.push(self.order_update(Some(id), false, now));
        out.push(UiEventKind::GlobalRankingUpdated);
    }

    /// Clear the lights and move on to the next athlete.
    fn finish_decision(&mut self, now: Instant, out: &mut Emitter) {
        self.decision.reset();
        self.reset_at = None;
        self.jury_pending = None;
        self.state = FopState::TimeStopped;
        out.push(UiEventKind::DecisionReset);
        self.recompute();
        self.display_head(now, out);
        out.push(self.order_update(None, true, now));
        self.check_group_done(now, out);
    }

    fn decision_reset(&mut self, now: Instant, out: &mut Emitter) {
        match self.state {
            FopState::DecisionVisible => self.finish_decision(now, out),
            FopState::DownSignalVisible | FopState::TimeStopped | FopState::TimeRunning
                if self.jury_pending.is_some() =>
            {
                self.finish_decision(now, out)
            }
            FopState::DownSignalVisible | FopState::TimeStopped | FopState::TimeRunning => {
                self.decision.reset();
                self.reset_at = None;
                if self.state == FopState::DownSignalVisible {
                    self.state = FopState::TimeStopped;
                }
                out.push(UiEventKind::DecisionReset);
            }
            _ => trace!(fop = %self.name, "decision reset ignored"),
        }
    }

    fn referee_pending(&self) -> bool {
        self.state.accepts_referee_input()
            && (self.decision.is_down_signaled() || self.decision.refs().iter().any(Option::is_some))
    }

    /// The jury rules on the attempt being decided, or else on the target
    /// athlete's last recorded attempt. The jury's ruling is the final write.
    fn jury_decision(
        &mut self,
        athlete: Option<AthleteId>,
        success: bool,
        now: Instant,
        out: &mut Emitter,
    ) -> Result<()> {
        let group = self.group.as_ref().ok_or(FopError::NoActiveGroup)?;
        let pending = self.referee_pending();
        let target = athlete.or(if pending || self.state == FopState::DecisionVisible {
            self.current
        } else {
            self.previous.or(self.current)
        });
        let Some(id) = target.filter(|id| group.contains(*id)) else {
            warn!(fop = %self.name, athlete = ?target, "jury decision for athlete not in group ignored");
            return Ok(());
        };

        if pending && Some(id) == self.current {
            let recorded = self
                .group
                .as_mut()
                .and_then(|g| g.athlete_mut(id))
                .and_then(|a| a.record_lift(success, Utc::now()));
            let Some(attempt) = recorded else {
                return Err(FopError::NothingToOverride(id));
            };
            self.jury_pending = Some((id, attempt));
            self.previous = Some(id);
            self.timer_owner = None;
            if self.state != FopState::DownSignalVisible {
                self.decision.assert_down();
                self.show_down_signal(now, out);
            }
        } else {
            let overridden = self
                .group
                .as_mut()
                .and_then(|g| g.athlete_mut(id))
                .and_then(|a| a.override_last_lift(success));
            if overridden.is_none() {
                return Err(FopError::NothingToOverride(id));
            }
        }

        self.decision.set_jury(success);
        self.persist(id);
        info!(fop = %self.name, athlete = %id, success, "jury decision");
        out.push(UiEventKind::JuryDecision {
            athlete: Some(id),
            success,
        });
        self.reorder(Some(id), now, out);
        out.push(UiEventKind::GlobalRankingUpdated);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Breaks
    // -----------------------------------------------------------------------

    fn break_started(
        &mut self,
        break_type: BreakType,
        countdown: Option<Countdown>,
        now: Instant,
        out: &mut Emitter,
    ) {
        if self.state == FopState::DecisionVisible {
            self.finish_decision(now, out);
        }
        let countdown = countdown.unwrap_or(if break_type.is_indefinite_by_default() {
            Countdown::Indefinite
        } else {
            Countdown::Duration {
                ms: self.settings.break_time_ms,
            }
        });
        self.start_break(break_type, countdown, now, out);
    }

    fn start_break(&mut self, break_type: BreakType, countdown: Countdown, now: Instant, out: &mut Emitter) {
        if self.athlete_timer.is_running() {
            let remaining_ms = self.athlete_timer.stop(now);
            out.push(UiEventKind::StopTime { remaining_ms });
        }
        if self.state == FopState::DownSignalVisible {
            self.decision.reset();
        }
        self.jury_pending = None;
        self.reset_at = None;
        let remaining_ms = countdown.remaining_ms(Utc::now());
        self.break_timer = Timer::default();
        self.break_timer.set_time_remaining(remaining_ms, now);
        self.break_timer.start(now);
        self.break_type = Some(break_type);
        self.state = FopState::Break;
        info!(fop = %self.name, %break_type, ?remaining_ms, "break started");
        out.push(UiEventKind::BreakStarted {
            break_type,
            remaining_ms,
        });
    }

    fn break_remaining(&self, now: Instant) -> Option<i64> {
        (!self.break_timer.is_indefinite()).then(|| self.break_timer.remaining_at(now))
    }

    fn break_paused(&mut self, event: &FopEvent, now: Instant, out: &mut Emitter) {
        match self.break_type {
            Some(break_type) if self.state == FopState::Break && self.break_timer.is_running() => {
                self.break_timer.stop(now);
                out.push(UiEventKind::BreakPaused {
                    break_type,
                    remaining_ms: self.break_remaining(now),
                });
            }
            _ => self.notify(event, "no running break to pause", out),
        }
    }

    fn break_resumed(&mut self, event: &FopEvent, now: Instant, out: &mut Emitter) {
        match self.break_type {
            Some(break_type) if self.state == FopState::Break && !self.break_timer.is_running() => {
                self.break_timer.start(now);
                out.push(UiEventKind::BreakStarted {
                    break_type,
                    remaining_ms: self.break_remaining(now),
                });
            }
            _ => self.notify(event, "no paused break to resume", out),
        }
    }

    fn break_set_time(&mut self, event: &FopEvent, countdown: Countdown, now: Instant, out: &mut Emitter) {
        match self.break_type {
            Some(break_type) if self.state == FopState::Break => {
                self.break_timer
                    .set_time_remaining(countdown.remaining_ms(Utc::now()), now);
                out.push(UiEventKind::BreakSetTime {
                    break_type,
                    remaining_ms: self.break_remaining(now),
                });
            }
            _ => self.notify(event, "not in a break", out),
        }
    }

    fn break_done(&mut self, event: &FopEvent, now: Instant, out: &mut Emitter) {
        if self.state == FopState::Break {
            self.end_break(now, out);
        } else if event.origin == Origin::engine() {
            trace!(fop = %self.name, "stale break expiry ignored");
        } else {
            self.notify(event, "not in a break", out);
        }
    }

    fn end_break(&mut self, now: Instant, out: &mut Emitter) {
        self.break_timer.stop(now);
        let break_type = self.break_type.take();
        info!(fop = %self.name, ?break_type, "break over");
        if let Some(break_type) = break_type {
            out.push(UiEventKind::BreakDone { break_type });
        }
        if self.group.is_some() {
            self.state = FopState::TimeStopped;
            self.recompute();
            self.display_head(now, out);
            out.push(self.order_update(None, true, now));
        } else {
            self.state = FopState::Inactive;
        }
    }

    fn notify(&self, event: &FopEvent, message: &str, out: &mut Emitter) {
        warn!(
            fop = %self.name,
            state = %self.state,
            event = event.kind.name(),
            origin = %event.origin,
            "{message}"
        );
        out.push(UiEventKind::Notification {
            event: event.kind.name().to_string(),
            state: self.state,
            message: message.to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
