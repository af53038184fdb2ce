use crate::clock::Epoch;
use crate::error::{Result, TrackerError};
use crate::history::Ledger;
use crate::scheduler::JobHandle;
use crate::session::SessionClock;
use serde::{Deserialize, Serialize};

/// Persisted shape of a goal countdown.
///
/// `remaining` is the live value at save time, so a countdown saved while
/// running comes back paused at that point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownRecord {
    pub name: String,
    pub goal_seconds: f64,
    #[serde(default = "untouched")]
    pub remaining: f64,
    #[serde(default)]
    pub daily_max_progress: f64,
    #[serde(default)]
    pub goal_hit: bool,
    #[serde(default)]
    pub history: Ledger,
    #[serde(default)]
    pub test_mode: bool,
}

// clamps to the full goal on restore
fn untouched() -> f64 {
    f64::INFINITY
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartOutcome {
    /// Already running, or the goal was hit and awaits a reset.
    Ignored,
    Started { session_started: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CountdownTick {
    Idle,
    Progress { remaining: f64 },
    /// The goal was reached at `progress` seconds and the countdown re-armed.
    GoalReached { progress: f64 },
}

/// Parses the "duration in hours" a user typed into whole goal seconds.
pub fn parse_goal_hours(input: &str) -> Result<f64> {
    let trimmed = input.trim();
    let hours: f64 = trimmed
        .parse()
        .map_err(|_| TrackerError::InvalidGoalDuration(trimmed.to_string()))?;
    let seconds = (hours * 3600.0).trunc();
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(TrackerError::InvalidGoalDuration(trimmed.to_string()));
    }
    Ok(seconds)
}

/// A named countdown toward a fixed goal duration
#[derive(Debug, Clone)]
pub struct GoalCountdown {
    name: String,
    goal_seconds: f64,
    remaining_seconds: f64,
    running: bool,
    last_start_epoch: Option<Epoch>,
    daily_max_progress: f64,
    goal_hit: bool,
    history: Ledger,
    test_mode: bool,
    pub(crate) refresh: Option<JobHandle>,
}

impl GoalCountdown {
    pub fn new(name: &str, goal_seconds: f64, test_mode: bool) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackerError::InvalidGoalName);
        }
        if !goal_seconds.is_finite() || goal_seconds <= 0.0 {
            return Err(TrackerError::InvalidGoalDuration(goal_seconds.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            goal_seconds,
            remaining_seconds: goal_seconds,
            running: false,
            last_start_epoch: None,
            daily_max_progress: 0.0,
            goal_hit: false,
            history: Ledger::new(),
            test_mode,
            refresh: None,
        })
    }

    pub fn from_record(record: CountdownRecord) -> Result<Self> {
        let mut countdown = Self::new(&record.name, record.goal_seconds, record.test_mode)?;
        countdown.adopt(record);
        Ok(countdown)
    }

    /// Takes over the progress fields of `record`, keeping name and goal.
    pub fn adopt(&mut self, record: CountdownRecord) {
        let remaining = if record.remaining.is_nan() {
            self.goal_seconds
        } else {
            record.remaining
        };
        self.remaining_seconds = remaining.clamp(0.0, self.goal_seconds);
        self.daily_max_progress = record.daily_max_progress.clamp(0.0, self.goal_seconds);
        self.goal_hit = record.goal_hit;
        self.history = record.history;
    }

    pub fn to_record(&self, now: Epoch) -> CountdownRecord {
        CountdownRecord {
            name: self.name.clone(),
            goal_seconds: self.goal_seconds,
            remaining: self.current_remaining(now),
            daily_max_progress: self.daily_max_progress,
            goal_hit: self.goal_hit,
            history: self.history.clone(),
            test_mode: self.test_mode,
        }
    }

    /// Starts the countdown, pulling the session clock along if it is stopped.
    pub fn start(&mut self, now: Epoch, session: &mut SessionClock) -> StartOutcome {
        if self.running || self.goal_hit {
            return StartOutcome::Ignored;
        }
        self.running = true;
        self.last_start_epoch = Some(now);
        let session_started = !session.is_running() && session.start(now);
        StartOutcome::Started { session_started }
    }

    pub fn pause(&mut self, now: Epoch) -> bool {
        if !self.running {
            return false;
        }
        self.remaining_seconds = self.current_remaining(now);
        self.raise_progress(self.goal_seconds - self.remaining_seconds);
        self.running = false;
        self.last_start_epoch = None;
        true
    }

    pub fn tick(&mut self, now: Epoch) -> CountdownTick {
        if !self.running {
            return CountdownTick::Idle;
        }
        let remaining = self.current_remaining(now);
        self.raise_progress(self.goal_seconds - remaining);

        if remaining <= 0.0 && !self.goal_hit {
            self.goal_hit = true;
            self.daily_max_progress = self.goal_seconds;
            let progress = self.daily_max_progress;
            self.reset();
            return CountdownTick::GoalReached { progress };
        }
        CountdownTick::Progress { remaining }
    }

    pub fn reset(&mut self) {
        self.running = false;
        self.last_start_epoch = None;
        self.remaining_seconds = self.goal_seconds;
        self.daily_max_progress = 0.0;
        self.goal_hit = false;
    }

    /// Snapshots the best progress under `label` (the day the reset runs
    /// on), then re-arms.
    pub fn reset_at_day_boundary(&mut self, label: &str) {
        self.history.set(label, self.daily_max_progress);
        self.reset();
    }

    /// Folds the open segment into `remaining` and stops, for shutdown.
    pub fn stop(&mut self, now: Epoch) {
        if self.running {
            self.remaining_seconds = self.current_remaining(now);
        }
        self.running = false;
        self.last_start_epoch = None;
    }

    pub fn current_remaining(&self, now: Epoch) -> f64 {
        match (self.running, self.last_start_epoch) {
            (true, Some(start)) => (self.remaining_seconds - (now - start).max(0.0)).max(0.0),
            _ => self.remaining_seconds,
        }
    }

    fn raise_progress(&mut self, progress: f64) {
        if progress > self.daily_max_progress {
            self.daily_max_progress = progress.min(self.goal_seconds);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn goal_seconds(&self) -> f64 {
        self.goal_seconds
    }

    pub fn remaining_seconds(&self) -> f64 {
        self.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn daily_max_progress(&self) -> f64 {
        self.daily_max_progress
    }

    pub fn goal_hit(&self) -> bool {
        self.goal_hit
    }

    pub fn history(&self) -> &Ledger {
        &self.history
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::SessionPolicy;
    use assert_matches::assert_matches;

    fn session() -> SessionClock {
        SessionClock::new(SessionPolicy::calendar(), 0.0)
    }

    #[test]
    fn rejects_bad_goals() {
        assert_matches!(
            GoalCountdown::new("read", 0.0, false),
            Err(TrackerError::InvalidGoalDuration(_))
        );
        assert_matches!(
            GoalCountdown::new("read", f64::NAN, false),
            Err(TrackerError::InvalidGoalDuration(_))
        );
        assert_matches!(
            GoalCountdown::new("  ", 60.0, false),
            Err(TrackerError::InvalidGoalName)
        );
    }

    #[test]
    fn parses_hours_input() {
        assert_eq!(parse_goal_hours("1.5").unwrap(), 5400.0);
        assert_eq!(parse_goal_hours(" 2 ").unwrap(), 7200.0);
        assert_matches!(parse_goal_hours("abc"), Err(TrackerError::InvalidGoalDuration(_)));
        assert_matches!(parse_goal_hours("-1"), Err(TrackerError::InvalidGoalDuration(_)));
        assert_matches!(parse_goal_hours("0"), Err(TrackerError::InvalidGoalDuration(_)));
        assert_matches!(parse_goal_hours("inf"), Err(TrackerError::InvalidGoalDuration(_)));
    }

    #[test]
    fn start_pulls_session_along() {
        let mut s = session();
        let mut c = GoalCountdown::new("math", 600.0, false).unwrap();
        assert_eq!(
            c.start(5.0, &mut s),
            StartOutcome::Started {
                session_started: true
            }
        );
        assert!(s.is_running());
        assert_eq!(s.last_start_epoch(), Some(5.0));

        let mut other = GoalCountdown::new("art", 600.0, false).unwrap();
        assert_eq!(
            other.start(6.0, &mut s),
            StartOutcome::Started {
                session_started: false
            }
        );
        assert_eq!(s.last_start_epoch(), Some(5.0));
        assert_eq!(other.start(7.0, &mut s), StartOutcome::Ignored);
    }

    #[test]
    fn pause_folds_elapsed_and_raises_progress() {
        let mut s = session();
        let mut c = GoalCountdown::new("math", 100.0, false).unwrap();
        c.start(0.0, &mut s);
        assert!(c.pause(30.0));
        assert_eq!(c.remaining_seconds(), 70.0);
        assert_eq!(c.daily_max_progress(), 30.0);
        assert!(!c.pause(40.0));

        c.start(50.0, &mut s);
        c.pause(200.0);
        assert_eq!(c.remaining_seconds(), 0.0);
        assert_eq!(c.daily_max_progress(), 100.0);
    }

    #[test]
    fn tick_never_goes_negative_and_progress_never_drops() {
        let mut s = session();
        let mut c = GoalCountdown::new("math", 10.0, false).unwrap();
        c.start(0.0, &mut s);
        let mut last = 0.0;
        for now in [1.0, 4.0, 3.0, 6.0, 9.5] {
            match c.tick(now) {
                CountdownTick::Progress { remaining } => assert!(remaining >= 0.0),
                other => panic!("unexpected {other:?}"),
            }
            assert!(c.daily_max_progress() >= last);
            last = c.daily_max_progress();
        }
        assert_eq!(c.daily_max_progress(), 9.5);
    }

    #[test]
    fn reaching_goal_notifies_then_rearms() {
        let mut s = session();
        let mut c = GoalCountdown::new("deep work", 3600.0, false).unwrap();
        c.start(0.0, &mut s);
        assert_eq!(c.tick(3600.0), CountdownTick::GoalReached { progress: 3600.0 });
        assert_eq!(c.remaining_seconds(), 3600.0);
        assert!(!c.goal_hit());
        assert!(!c.is_running());
        assert_eq!(c.daily_max_progress(), 0.0);
        assert_eq!(c.tick(3700.0), CountdownTick::Idle);
    }

    #[test]
    fn start_is_ignored_while_goal_hit() {
        let record = CountdownRecord {
            name: "read".into(),
            goal_seconds: 60.0,
            remaining: 0.0,
            daily_max_progress: 60.0,
            goal_hit: true,
            history: Ledger::new(),
            test_mode: false,
        };
        let mut c = GoalCountdown::from_record(record).unwrap();
        assert_eq!(c.start(0.0, &mut session()), StartOutcome::Ignored);
        c.reset();
        assert_matches!(c.start(0.0, &mut session()), StartOutcome::Started { .. });
    }

    #[test]
    fn day_boundary_archives_progress() {
        let mut s = session();
        let mut c = GoalCountdown::new("read", 100.0, false).unwrap();
        c.start(0.0, &mut s);
        c.tick(40.0);
        c.reset_at_day_boundary("2024-02-01");
        assert_eq!(c.history().get("2024-02-01"), Some(40.0));
        assert_eq!(c.remaining_seconds(), 100.0);
        assert_eq!(c.daily_max_progress(), 0.0);
        assert!(!c.is_running());
    }

    #[test]
    fn stop_folds_without_touching_progress() {
        let mut s = session();
        let mut c = GoalCountdown::new("read", 100.0, false).unwrap();
        c.start(0.0, &mut s);
        c.stop(25.0);
        assert!(!c.is_running());
        assert_eq!(c.remaining_seconds(), 75.0);
        assert_eq!(c.daily_max_progress(), 0.0);
    }

    #[test]
    fn record_round_trip_while_running() {
        let mut s = session();
        let mut c = GoalCountdown::new("read", 100.0, true).unwrap();
        c.reset_at_day_boundary("2024-02-01");
        c.start(0.0, &mut s);
        c.tick(10.0);

        let record = c.to_record(12.0);
        assert_eq!(record.remaining, 88.0);
        let json = serde_json::to_string(&record).unwrap();
        let back: CountdownRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(
            back.history.labels().collect::<Vec<_>>(),
            vec!["2024-02-01"]
        );

        let restored = GoalCountdown::from_record(back).unwrap();
        assert!(!restored.is_running());
        assert_eq!(restored.remaining_seconds(), 88.0);
        assert_eq!(restored.to_record(99.0), record);
    }

    #[test]
    fn missing_fields_fall_back_to_fresh_values() {
        let back: CountdownRecord =
            serde_json::from_str(r#"{"name":"read","goalSeconds":120}"#).unwrap();
        let c = GoalCountdown::from_record(back).unwrap();
        assert_eq!(c.remaining_seconds(), 120.0);
        assert_eq!(c.daily_max_progress(), 0.0);
        assert!(c.history().is_empty());
    }
}
