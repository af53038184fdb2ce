use crate::clock::{Clock, Epoch};
use crate::config::Config;
use crate::countdown::{parse_goal_hours, CountdownRecord, CountdownTick, GoalCountdown, StartOutcome};
use crate::error::{Result, TrackerError};
use crate::history::Ledger;
use crate::report::ReportWriter;
use crate::scheduler::{Job, JobHandle, TimerQueue};
use crate::session::{Rollover, SessionClock, SessionRecord};
use crate::store::{load_record, save_record, EntityId, KeyValueStore};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Explicit answer to "delete this timer?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

/// Notifications for the front end, collected with [`Tracker::drain_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    GoalReached {
        name: String,
    },
    DayFinalized {
        label: String,
        seconds: f64,
        report: Option<PathBuf>,
    },
    PersistenceFailed {
        entity: String,
    },
}

/// Owns the session clock, the countdowns and everything they need:
/// time source, timer queue, store and report writer.
///
/// All state changes go through here so that every transition is
/// persisted and every scheduled refresh has exactly one live handle.
pub struct Tracker {
    config: Config,
    clock: Box<dyn Clock>,
    store: Box<dyn KeyValueStore>,
    reporter: ReportWriter,
    timers: TimerQueue,
    session: SessionClock,
    countdowns: Vec<GoalCountdown>,
    boundary_job: Option<JobHandle>,
    events: Vec<TrackerEvent>,
}

impl Tracker {
    /// Loads persisted state, finalizes a day left over from a previous run
    /// and arms the periodic jobs.
    pub fn open(
        config: Config,
        clock: Box<dyn Clock>,
        store: Box<dyn KeyValueStore>,
        reporter: ReportWriter,
    ) -> Self {
        let now = clock.now();
        let policy = config.policy();

        let history: Ledger = load_record(store.as_ref(), &EntityId::History).unwrap_or_default();
        let session = match load_record::<SessionRecord>(store.as_ref(), &EntityId::Session) {
            Some(record) => SessionClock::restore(record, history, policy),
            None => SessionClock::new(policy, now).with_history(history),
        };
        let countdowns = load_countdowns(store.as_ref());

        info!(
            countdowns = countdowns.len(),
            test_mode = policy.is_test_mode(),
            "tracker opened"
        );

        let mut tracker = Self {
            config,
            clock,
            store,
            reporter,
            timers: TimerQueue::new(),
            session,
            countdowns,
            boundary_job: None,
            events: Vec::new(),
        };

        tracker.check_boundary(now);
        if tracker.session.is_running() && tracker.session.refresh.is_none() {
            tracker.session.refresh = Some(tracker.schedule(now, Job::SessionRefresh));
        }
        let every = tracker.config.boundary_check_interval();
        tracker.boundary_job = Some(tracker.timers.schedule_after(now, every, Job::BoundaryCheck));
        tracker
    }

    pub fn now(&self) -> Epoch {
        self.clock.now()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionClock {
        &self.session
    }

    pub fn history(&self) -> &Ledger {
        self.session.history()
    }

    pub fn countdowns(&self) -> &[GoalCountdown] {
        &self.countdowns
    }

    pub fn countdown(&self, name: &str) -> Option<&GoalCountdown> {
        self.countdowns.iter().find(|c| c.name() == name)
    }

    /// Number of jobs waiting on the timer queue.
    pub fn pending_jobs(&self) -> usize {
        self.timers.len()
    }

    /// How long until the next timer job is due, if any is pending.
    pub fn until_next_job(&self) -> Option<Duration> {
        let due = self.timers.next_due()?;
        Some(Duration::from_secs_f64((due - self.clock.now()).max(0.0)))
    }

    pub fn drain_events(&mut self) -> Vec<TrackerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn start_session(&mut self) -> bool {
        let now = self.clock.now();
        let started = self.session.start(now);
        if started {
            debug!("session started");
            self.timers.cancel_slot(&mut self.session.refresh);
            self.session.refresh = Some(self.schedule(now, Job::SessionRefresh));
        }
        self.persist_session();
        started
    }

    pub fn pause_session(&mut self) -> bool {
        let now = self.clock.now();
        self.timers.cancel_slot(&mut self.session.refresh);
        let paused = self.session.pause(now);
        if paused {
            debug!(segment = self.session.elapsed_seconds(), "session paused");
        }
        self.persist_session();
        paused
    }

    pub fn lap(&mut self) -> Option<f64> {
        let now = self.clock.now();
        let split = self.session.lap(now);
        self.persist_session();
        split
    }

    pub fn reset_session(&mut self) {
        self.timers.cancel_slot(&mut self.session.refresh);
        self.session.reset();
        self.persist_session();
    }

    /// Creates a countdown from the name and "duration in hours" the user
    /// typed. A stored record with the same key is picked up again.
    pub fn add_countdown(&mut self, name: &str, hours_text: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackerError::InvalidGoalName);
        }
        let goal_seconds = parse_goal_hours(hours_text)?;

        let id = EntityId::Countdown(name.to_string());
        let key = id.key();
        if self
            .countdowns
            .iter()
            .any(|c| EntityId::Countdown(c.name().to_string()).key() == key)
        {
            return Err(TrackerError::DuplicateGoal(name.to_string()));
        }

        let mut countdown =
            GoalCountdown::new(name, goal_seconds, self.session.policy().is_test_mode())?;
        if let Some(previous) = load_record::<CountdownRecord>(self.store.as_ref(), &id) {
            countdown.adopt(previous);
        }

        info!(name, goal_seconds, "countdown added");
        self.countdowns.push(countdown);
        self.persist_countdown(self.countdowns.len() - 1);
        Ok(())
    }

    pub fn start_countdown(&mut self, name: &str) -> Result<StartOutcome> {
        let idx = self.index_of(name)?;
        let now = self.clock.now();

        let outcome = self.countdowns[idx].start(now, &mut self.session);
        if let StartOutcome::Started { session_started } = outcome {
            let handle = self.schedule(now, Job::CountdownRefresh(name.to_string()));
            self.timers.cancel_slot(&mut self.countdowns[idx].refresh);
            self.countdowns[idx].refresh = Some(handle);
            if session_started {
                self.timers.cancel_slot(&mut self.session.refresh);
                self.session.refresh = Some(self.schedule(now, Job::SessionRefresh));
                self.persist_session();
            }
        }
        self.persist_countdown(idx);
        Ok(outcome)
    }

    pub fn pause_countdown(&mut self, name: &str) -> Result<bool> {
        let idx = self.index_of(name)?;
        let now = self.clock.now();
        self.timers.cancel_slot(&mut self.countdowns[idx].refresh);
        let paused = self.countdowns[idx].pause(now);
        self.persist_countdown(idx);
        Ok(paused)
    }

    pub fn reset_countdown(&mut self, name: &str) -> Result<()> {
        let idx = self.index_of(name)?;
        self.timers.cancel_slot(&mut self.countdowns[idx].refresh);
        self.countdowns[idx].reset();
        self.persist_countdown(idx);
        Ok(())
    }

    /// Removes a countdown and its stored record. Returns false when the
    /// caller declined.
    pub fn delete_countdown(&mut self, name: &str, confirmation: Confirmation) -> Result<bool> {
        let idx = self.index_of(name)?;
        if confirmation == Confirmation::Declined {
            return Ok(false);
        }

        let mut countdown = self.countdowns.remove(idx);
        self.timers.cancel_slot(&mut countdown.refresh);

        let id = EntityId::Countdown(countdown.name().to_string());
        if let Err(e) = self.store.remove(&id) {
            warn!(key = %id.key(), error = %e, "could not remove countdown record");
            push_failure(&mut self.events, &id);
        }
        info!(name = countdown.name(), "countdown deleted");
        Ok(true)
    }

    /// Runs every job that is due as of the clock's current time.
    pub fn wake(&mut self) {
        let now = self.clock.now();
        self.wake_at(now);
    }

    /// Runs every job due at `now`. A job whose handle no longer matches
    /// the one its owner holds was superseded and is discarded.
    pub fn wake_at(&mut self, now: Epoch) {
        let mut due = self.timers.take_due(now);
        // a crossing settles before any refresh can credit time past it
        due.sort_by_key(|(_, job)| !matches!(job, Job::BoundaryCheck));
        for (handle, job) in due {
            match job {
                Job::SessionRefresh => {
                    if self.session.refresh != Some(handle) {
                        debug!("discarding stale session refresh");
                        continue;
                    }
                    self.session.refresh = None;
                    if self.session.tick(now) {
                        self.persist_session();
                        self.session.refresh = Some(self.schedule(now, Job::SessionRefresh));
                    }
                }
                Job::CountdownRefresh(name) => {
                    let Some(idx) = self.countdowns.iter().position(|c| c.name() == name) else {
                        continue;
                    };
                    if self.countdowns[idx].refresh != Some(handle) {
                        debug!(%name, "discarding stale countdown refresh");
                        continue;
                    }
                    self.countdowns[idx].refresh = None;
                    match self.countdowns[idx].tick(now) {
                        CountdownTick::Idle => {}
                        CountdownTick::Progress { .. } => {
                            let next = self.schedule(now, Job::CountdownRefresh(name));
                            self.countdowns[idx].refresh = Some(next);
                        }
                        CountdownTick::GoalReached { progress } => {
                            info!(%name, progress, "goal reached");
                            self.events.push(TrackerEvent::GoalReached { name });
                        }
                    }
                    self.persist_countdown(idx);
                }
                Job::BoundaryCheck => {
                    if self.boundary_job != Some(handle) {
                        continue;
                    }
                    self.check_boundary(now);
                    let every = self.config.boundary_check_interval();
                    self.boundary_job =
                        Some(self.timers.schedule_after(now, every, Job::BoundaryCheck));
                }
            }
        }
    }

    /// Cancels all jobs, folds running segments and persists everything.
    pub fn shutdown(&mut self) {
        let now = self.clock.now();
        self.check_boundary(now);

        self.timers.cancel_all();
        self.boundary_job = None;
        self.session.refresh = None;
        self.session.pause(now);
        for countdown in &mut self.countdowns {
            countdown.refresh = None;
            countdown.stop(now);
        }

        self.persist_all(now);
        info!(today = self.session.daily_seconds(), "tracker shut down");
    }

    fn check_boundary(&mut self, now: Epoch) -> Option<Rollover> {
        let rollover = self.session.check_day_boundary(now)?;

        self.timers.cancel_slot(&mut self.session.refresh);
        if rollover.resumed {
            self.session.refresh = Some(self.schedule(now, Job::SessionRefresh));
        }
        // countdown snapshots are keyed by the day the reset happens on
        let today = self.session.current_label();
        for countdown in &mut self.countdowns {
            self.timers.cancel_slot(&mut countdown.refresh);
            countdown.reset_at_day_boundary(&today);
        }

        info!(
            label = %rollover.label,
            seconds = rollover.seconds,
            dropped = rollover.dropped_seconds,
            "day finalized"
        );

        let report = match self.reporter.write(&rollover.label, rollover.seconds) {
            Ok(path) => path,
            Err(e) => {
                warn!(label = %rollover.label, error = %e, "could not write report");
                push_event(
                    &mut self.events,
                    TrackerEvent::PersistenceFailed {
                        entity: "report".to_string(),
                    },
                );
                None
            }
        };

        // only the finished compound transition reaches the store
        self.persist_all(now);
        self.events.push(TrackerEvent::DayFinalized {
            label: rollover.label.clone(),
            seconds: rollover.seconds,
            report,
        });
        Some(rollover)
    }

    fn schedule(&mut self, now: Epoch, job: Job) -> JobHandle {
        let every: Duration = self.config.refresh_interval();
        self.timers.schedule_after(now, every, job)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.countdowns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| TrackerError::UnknownGoal(name.to_string()))
    }

    fn persist_session(&mut self) {
        let record = self.session.to_record();
        write_record(self.store.as_mut(), &mut self.events, &EntityId::Session, &record);
    }

    fn persist_countdown(&mut self, idx: usize) {
        let now = self.clock.now();
        let countdown = &self.countdowns[idx];
        let id = EntityId::Countdown(countdown.name().to_string());
        let record = countdown.to_record(now);
        write_record(self.store.as_mut(), &mut self.events, &id, &record);
    }

    fn persist_all(&mut self, now: Epoch) {
        write_record(
            self.store.as_mut(),
            &mut self.events,
            &EntityId::History,
            self.session.history(),
        );
        self.persist_session();
        for countdown in &self.countdowns {
            let id = EntityId::Countdown(countdown.name().to_string());
            write_record(self.store.as_mut(), &mut self.events, &id, &countdown.to_record(now));
        }
    }
}

fn load_countdowns(store: &dyn KeyValueStore) -> Vec<GoalCountdown> {
    let values = match store.countdown_records() {
        Ok(values) => values,
        Err(e) => {
            warn!(error = %e, "could not list countdowns");
            return Vec::new();
        }
    };

    let mut countdowns: Vec<GoalCountdown> = Vec::new();
    for value in values {
        let loaded = serde_json::from_value::<CountdownRecord>(value)
            .map_err(|e| e.to_string())
            .and_then(|record| GoalCountdown::from_record(record).map_err(|e| e.to_string()));
        match loaded {
            Ok(countdown) if countdowns.iter().any(|c| c.name() == countdown.name()) => {
                warn!(name = countdown.name(), "skipping duplicate countdown");
            }
            Ok(countdown) => countdowns.push(countdown),
            Err(e) => warn!(error = %e, "skipping unloadable countdown"),
        }
    }
    countdowns
}

fn write_record<T: Serialize>(
    store: &mut dyn KeyValueStore,
    events: &mut Vec<TrackerEvent>,
    id: &EntityId,
    record: &T,
) {
    if let Err(e) = save_record(store, id, record) {
        warn!(key = %id.key(), error = %e, "could not persist");
        push_failure(events, id);
    }
}

fn push_failure(events: &mut Vec<TrackerEvent>, id: &EntityId) {
    push_event(
        events,
        TrackerEvent::PersistenceFailed {
            entity: id.key(),
        },
    );
}

// a failing disk would otherwise queue one event per refresh
fn push_event(events: &mut Vec<TrackerEvent>, event: TrackerEvent) {
    if !events.contains(&event) {
        events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::BoundaryMode;
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;
    use chrono::{Local, TimeZone};
    use serde_json::json;

    const T0: Epoch = 1_700_000_000.0;

    fn interval_config(secs: u64) -> Config {
        Config {
            boundary: BoundaryMode::Interval,
            interval_secs: secs,
            ..Config::default()
        }
    }

    // timezone independent stand-in for a calendar day
    fn day_config() -> Config {
        interval_config(86_400)
    }

    fn open(config: Config, clock: &ManualClock, store: &MemoryStore) -> Tracker {
        Tracker::open(
            config,
            Box::new(clock.clone()),
            Box::new(store.clone()),
            ReportWriter::disabled(),
        )
    }

    fn stored(store: &MemoryStore, id: &EntityId) -> serde_json::Value {
        store.load(id).unwrap().unwrap()
    }

    #[test]
    fn pause_accumulates_segments_and_persists() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let mut tracker = open(interval_config(3600), &clock, &store);

        assert!(tracker.start_session());
        clock.advance(10.0);
        assert!(tracker.pause_session());
        clock.advance(10.0);
        assert!(tracker.start_session());
        clock.advance(5.0);
        assert!(tracker.pause_session());

        assert_eq!(tracker.session().daily_seconds(), 15.0);
        assert_eq!(stored(&store, &EntityId::Session)["dailySeconds"], json!(15.0));
        assert_eq!(stored(&store, &EntityId::Session)["running"], json!(false));
    }

    #[test]
    fn session_ops_while_stopped_change_nothing() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let mut tracker = open(day_config(), &clock, &store);

        assert!(!tracker.pause_session());
        assert_eq!(tracker.lap(), None);
        assert!(!tracker.session().is_running());
        assert_eq!(tracker.session().daily_seconds(), 0.0);
    }

    #[test]
    fn refresh_ticks_running_session() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let mut tracker = open(day_config(), &clock, &store);

        tracker.start_session();
        clock.advance(2.5);
        tracker.wake();
        assert_eq!(tracker.session().elapsed_seconds(), 2.5);
        assert_eq!(stored(&store, &EntityId::Session)["elapsedSeconds"], json!(2.5));

        assert_eq!(tracker.lap(), Some(2.5));
        tracker.reset_session();
        assert!(tracker.session().laps().is_empty());
        assert!(!tracker.session().is_running());
        // only the boundary check is left
        assert_eq!(tracker.pending_jobs(), 1);
    }

    #[test]
    fn next_job_shortens_while_running() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let mut tracker = open(day_config(), &clock, &store);
        assert_eq!(tracker.until_next_job(), Some(Duration::from_secs(1)));

        tracker.start_session();
        let wait = tracker.until_next_job().unwrap().as_secs_f64();
        assert!((wait - 0.1).abs() < 1e-3, "{wait}");

        clock.advance(5.0);
        assert_eq!(tracker.until_next_job(), Some(Duration::ZERO));
    }

    #[test]
    fn countdown_start_pulls_session_along() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let mut tracker = open(day_config(), &clock, &store);

        tracker.add_countdown("reading", "1").unwrap();
        let outcome = tracker.start_countdown("reading").unwrap();
        assert_eq!(outcome, StartOutcome::Started { session_started: true });
        assert!(tracker.session().is_running());

        clock.advance(60.0);
        assert!(tracker.pause_countdown("reading").unwrap());
        let reading = tracker.countdown("reading").unwrap();
        assert_eq!(reading.remaining_seconds(), 3540.0);
        assert_eq!(reading.daily_max_progress(), 60.0);
        assert!(tracker.session().is_running());
    }

    #[test]
    fn goal_reached_emits_event_and_rearms() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let mut tracker = open(day_config(), &clock, &store);

        tracker.add_countdown("focus", "1").unwrap();
        tracker.start_countdown("focus").unwrap();
        clock.advance(3600.0);
        tracker.wake();

        let events = tracker.drain_events();
        assert!(events.contains(&TrackerEvent::GoalReached {
            name: "focus".into()
        }));
        let focus = tracker.countdown("focus").unwrap();
        assert!(!focus.goal_hit());
        assert!(!focus.is_running());
        assert_eq!(focus.remaining_seconds(), 3600.0);

        let record = stored(&store, &EntityId::Countdown("focus".into()));
        assert_eq!(record["remaining"], json!(3600.0));
        assert_eq!(record["goalHit"], json!(false));
    }

    #[test]
    fn invalid_goal_input_is_rejected() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let mut tracker = open(day_config(), &clock, &store);

        assert_matches!(
            tracker.add_countdown("x", "abc"),
            Err(TrackerError::InvalidGoalDuration(_))
        );
        assert_matches!(
            tracker.add_countdown("x", "-2"),
            Err(TrackerError::InvalidGoalDuration(_))
        );
        assert_matches!(
            tracker.add_countdown("  ", "1"),
            Err(TrackerError::InvalidGoalName)
        );
        assert!(tracker.countdowns().is_empty());
        assert!(store.countdown_records().unwrap().is_empty());
    }

    #[test]
    fn clashing_names_are_duplicates() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let mut tracker = open(day_config(), &clock, &store);

        tracker.add_countdown("deep work", "2").unwrap();
        assert_matches!(
            tracker.add_countdown("deep/work", "1"),
            Err(TrackerError::DuplicateGoal(_))
        );
        assert_matches!(
            tracker.start_countdown("nope"),
            Err(TrackerError::UnknownGoal(_))
        );
    }

    #[test]
    fn delete_requires_confirmation() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let mut tracker = open(day_config(), &clock, &store);
        let id = EntityId::Countdown("math".into());

        tracker.add_countdown("math", "0.5").unwrap();
        tracker.start_countdown("math").unwrap();

        assert!(!tracker.delete_countdown("math", Confirmation::Declined).unwrap());
        assert!(store.contains(&id));

        assert!(tracker.delete_countdown("math", Confirmation::Confirmed).unwrap());
        assert!(tracker.countdown("math").is_none());
        assert!(!store.contains(&id));

        // the refresh job went with it
        clock.advance(1.0);
        tracker.wake();
        assert!(!store.contains(&id));
    }

    #[test]
    fn interval_rollover_archives_and_resumes() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let mut tracker = open(interval_config(30), &clock, &store);
        let label = tracker.session().current_label();

        tracker.add_countdown("quick", "1").unwrap();
        tracker.start_countdown("quick").unwrap();
        clock.advance(10.0);
        tracker.wake();
        clock.set(T0 + 31.0);
        tracker.wake();

        assert_eq!(tracker.history().get(&label), Some(30.0));
        assert!(tracker.session().is_running());
        assert_eq!(tracker.session().last_start_epoch(), Some(T0 + 31.0));
        assert_eq!(tracker.session().daily_seconds(), 0.0);

        let next_label = tracker.session().current_label();
        assert_ne!(next_label, label);
        let quick = tracker.countdown("quick").unwrap();
        assert!(!quick.is_running());
        assert_eq!(quick.remaining_seconds(), 3600.0);
        assert_eq!(quick.history().get(&next_label), Some(10.0));
        assert_eq!(quick.history().get(&label), None);

        let events = tracker.drain_events();
        assert_matches!(
            events.as_slice(),
            [TrackerEvent::DayFinalized { seconds, .. }] if *seconds == 30.0
        );
        assert_eq!(stored(&store, &EntityId::History)[&label], json!(30.0));

        let session = stored(&store, &EntityId::Session);
        assert_eq!(session["dailySeconds"], json!(0.0));
        assert_eq!(session["laps"], json!([]));
        assert_eq!(session["sessionAnchorEpoch"], json!(T0 + 31.0));
        assert_eq!(session["lastStartEpoch"], json!(T0 + 31.0));
        assert_eq!(
            stored(&store, &EntityId::Countdown("quick".into()))["history"][&next_label],
            json!(10.0)
        );
    }

    #[test]
    fn midnight_snapshot_is_keyed_by_the_new_day() {
        let local = |d, h, m, sec| {
            Local
                .with_ymd_and_hms(2024, 6, d, h, m, sec)
                .single()
                .unwrap()
                .timestamp() as f64
        };
        let clock = ManualClock::new(local(3, 23, 0, 0));
        let store = MemoryStore::new();
        let mut tracker = open(Config::default(), &clock, &store);

        tracker.add_countdown("read", "2").unwrap();
        tracker.start_countdown("read").unwrap();
        clock.set(local(3, 23, 30, 0));
        tracker.wake();
        clock.set(local(4, 0, 0, 1));
        tracker.wake();

        assert_eq!(tracker.history().labels().collect::<Vec<_>>(), ["2024-06-03"]);
        let read = tracker.countdown("read").unwrap();
        assert_eq!(read.history().labels().collect::<Vec<_>>(), ["2024-06-04"]);
        assert_eq!(read.history().get("2024-06-04"), Some(1800.0));
    }

    #[test]
    fn superseded_refresh_is_discarded() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let config = Config {
            refresh_ms: 5000,
            ..interval_config(30)
        };
        let mut tracker = open(config, &clock, &store);

        tracker.start_session();
        clock.set(T0 + 31.0);
        tracker.wake();

        // one fresh session refresh plus the boundary check
        assert_eq!(tracker.pending_jobs(), 2);
        assert_eq!(tracker.session().elapsed_seconds(), 0.0);
    }

    #[test]
    fn stale_day_is_finalized_on_open() {
        let local = |d, h| {
            Local
                .with_ymd_and_hms(2024, 3, d, h, 0, 0)
                .single()
                .unwrap()
                .timestamp() as f64
        };
        let store = MemoryStore::new();
        store.insert_raw(
            &EntityId::Session,
            json!({
                "anchorDate": "2024-03-01",
                "dailySeconds": 100.0,
                "running": true,
                "elapsedSeconds": 0.0,
                "lastStartEpoch": local(1, 23),
                "laps": [],
                "sessionAnchorEpoch": local(1, 9),
            }),
        );
        let clock = ManualClock::new(local(2, 9));
        let mut tracker = open(Config::default(), &clock, &store);

        assert_eq!(tracker.history().get("2024-03-01"), Some(3700.0));
        assert!(tracker.session().is_running());
        assert_eq!(tracker.session().daily_seconds(), 0.0);
        assert_matches!(
            tracker.drain_events().as_slice(),
            [TrackerEvent::DayFinalized { label, .. }] if label == "2024-03-01"
        );
    }

    #[test]
    fn malformed_records_start_fresh() {
        let store = MemoryStore::new();
        store.insert_raw(&EntityId::Session, json!("garbage"));
        store.insert_raw(&EntityId::History, json!([1, 2]));
        store.insert_raw(&EntityId::Countdown("bad".into()), json!({"name": 5}));
        store.insert_raw(
            &EntityId::Countdown("good".into()),
            json!({"name": "good", "goalSeconds": 600.0}),
        );
        let clock = ManualClock::new(T0);
        let tracker = open(day_config(), &clock, &store);

        assert!(tracker.history().is_empty());
        assert!(!tracker.session().is_running());
        assert_eq!(tracker.countdowns().len(), 1);
        assert_eq!(tracker.countdowns()[0].remaining_seconds(), 600.0);
    }

    #[test]
    fn write_failures_surface_once_and_keep_state() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let mut tracker = open(day_config(), &clock, &store);
        store.set_fail_writes(true);

        tracker.start_session();
        for _ in 0..5 {
            clock.advance(0.2);
            tracker.wake();
        }

        assert!(tracker.session().is_running());
        assert_eq!(
            tracker.drain_events(),
            vec![TrackerEvent::PersistenceFailed {
                entity: "session".into()
            }]
        );
    }

    #[test]
    fn shutdown_folds_running_segments() {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let mut tracker = open(day_config(), &clock, &store);

        tracker.add_countdown("piano", "1").unwrap();
        tracker.start_countdown("piano").unwrap();
        clock.advance(12.0);
        tracker.shutdown();

        assert_eq!(tracker.pending_jobs(), 0);
        assert!(!tracker.session().is_running());
        assert_eq!(tracker.session().daily_seconds(), 12.0);
        let piano = tracker.countdown("piano").unwrap();
        assert!(!piano.is_running());
        assert_eq!(piano.remaining_seconds(), 3588.0);

        let session = stored(&store, &EntityId::Session);
        assert_eq!(session["running"], json!(false));
        assert_eq!(session["dailySeconds"], json!(12.0));
        let record = stored(&store, &EntityId::Countdown("piano".into()));
        assert_eq!(record["remaining"], json!(3588.0));
    }
}
