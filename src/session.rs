use crate::clock::{local_date, Epoch};
use crate::history::Ledger;
use crate::policy::{Anchor, SessionPolicy};
use crate::scheduler::JobHandle;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Persisted shape of the session clock. Field names are part of the
/// on-disk format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default)]
    pub anchor_date: String,
    #[serde(default)]
    pub daily_seconds: f64,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub elapsed_seconds: f64,
    #[serde(default)]
    pub last_start_epoch: Option<f64>,
    #[serde(default)]
    pub laps: Vec<f64>,
    pub session_anchor_epoch: f64,
}

/// What happened when a day boundary was crossed
#[derive(Debug, Clone, PartialEq)]
pub struct Rollover {
    /// Ledger label the finished period was archived under.
    pub label: String,
    /// Seconds credited to that label by this rollover.
    pub seconds: f64,
    /// The instant the period ended.
    pub boundary: Epoch,
    /// Open-segment time between the boundary and the check that noticed
    /// it. Credited to neither period.
    pub dropped_seconds: f64,
    /// Whether a fresh segment was started for the new period.
    pub resumed: bool,
}

/// The open-ended learning clock
#[derive(Debug, Clone)]
pub struct SessionClock {
    policy: SessionPolicy,
    running: bool,
    elapsed_seconds: f64,
    daily_seconds: f64,
    last_start_epoch: Option<Epoch>,
    laps: Vec<f64>,
    anchor: Anchor,
    history: Ledger,
    pub(crate) refresh: Option<JobHandle>,
}

impl SessionClock {
    pub fn new(policy: SessionPolicy, now: Epoch) -> Self {
        Self {
            policy,
            running: false,
            elapsed_seconds: 0.0,
            daily_seconds: 0.0,
            last_start_epoch: None,
            laps: Vec::new(),
            anchor: Anchor::at(now),
            history: Ledger::new(),
            refresh: None,
        }
    }

    /// A fresh clock that keeps an already archived ledger.
    pub fn with_history(mut self, history: Ledger) -> Self {
        self.history = history;
        self
    }

    /// Rebuilds a clock from its persisted record and ledger. A stale
    /// anchor is left alone; the next `check_day_boundary` finalizes it.
    pub fn restore(record: SessionRecord, history: Ledger, policy: SessionPolicy) -> Self {
        let date = NaiveDate::parse_from_str(&record.anchor_date, "%Y-%m-%d")
            .unwrap_or_else(|_| local_date(record.session_anchor_epoch));
        let last_start_epoch = if record.running {
            record.last_start_epoch
        } else {
            None
        };
        Self {
            policy,
            running: last_start_epoch.is_some(),
            elapsed_seconds: record.elapsed_seconds.max(0.0),
            daily_seconds: record.daily_seconds.max(0.0),
            last_start_epoch,
            laps: record.laps,
            anchor: Anchor {
                date,
                epoch: record.session_anchor_epoch,
            },
            history,
            refresh: None,
        }
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            anchor_date: self.anchor.date.format("%Y-%m-%d").to_string(),
            daily_seconds: self.daily_seconds,
            running: self.running,
            elapsed_seconds: self.elapsed_seconds,
            last_start_epoch: self.last_start_epoch,
            laps: self.laps.clone(),
            session_anchor_epoch: self.anchor.epoch,
        }
    }

    pub fn start(&mut self, now: Epoch) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.last_start_epoch = Some(now);
        self.elapsed_seconds = 0.0;
        true
    }

    pub fn pause(&mut self, now: Epoch) -> bool {
        let Some(start) = self.open_segment_start() else {
            return false;
        };
        self.elapsed_seconds = (now - start).max(0.0);
        self.daily_seconds += self.elapsed_seconds;
        self.running = false;
        self.last_start_epoch = None;
        true
    }

    /// Records a split and returns it, or `None` while stopped.
    pub fn lap(&mut self, now: Epoch) -> Option<f64> {
        let start = self.open_segment_start()?;
        let split = (now - start).max(0.0);
        self.laps.push(split);
        Some(split)
    }

    /// Drops the open segment and laps. Today's total and history survive.
    pub fn reset(&mut self) {
        self.running = false;
        self.elapsed_seconds = 0.0;
        self.last_start_epoch = None;
        self.laps.clear();
    }

    /// Recomputes the open segment. Returns false while stopped.
    pub fn tick(&mut self, now: Epoch) -> bool {
        let Some(start) = self.open_segment_start() else {
            return false;
        };
        self.elapsed_seconds = self.elapsed_seconds.max(now - start);
        true
    }

    /// Archives the finished period if `now` lies beyond it.
    ///
    /// Only the part of a running segment that falls before the boundary is
    /// credited; the slice between the boundary and `now` is dropped and the
    /// clock resumes from `now`.
    pub fn check_day_boundary(&mut self, now: Epoch) -> Option<Rollover> {
        let crossing = self.policy.crossing(&self.anchor, now)?;
        let was_running = self.running;

        let mut dropped_seconds = 0.0;
        if let Some(start) = self.open_segment_start() {
            self.daily_seconds += (crossing.boundary - start).max(0.0);
            dropped_seconds = (now - crossing.boundary.max(start)).max(0.0);
        }

        let seconds = self.daily_seconds;
        self.history.add(&crossing.label, seconds);

        self.reset();
        self.daily_seconds = 0.0;
        self.anchor = crossing.next;

        if was_running {
            self.start(now);
        }

        Some(Rollover {
            label: crossing.label,
            seconds,
            boundary: crossing.boundary,
            dropped_seconds,
            resumed: was_running,
        })
    }

    fn open_segment_start(&self) -> Option<Epoch> {
        if self.running {
            self.last_start_epoch
        } else {
            None
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn daily_seconds(&self) -> f64 {
        self.daily_seconds
    }

    /// Today's total including the open segment as of `now`.
    pub fn today_seconds(&self, now: Epoch) -> f64 {
        match self.open_segment_start() {
            Some(start) => self.daily_seconds + (now - start).max(0.0),
            None => self.daily_seconds,
        }
    }

    pub fn last_start_epoch(&self) -> Option<Epoch> {
        self.last_start_epoch
    }

    pub fn laps(&self) -> &[f64] {
        &self.laps
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub fn history(&self) -> &Ledger {
        &self.history
    }

    /// Label the current period will be archived under.
    pub fn current_label(&self) -> String {
        self.policy.label(&self.anchor)
    }
}
