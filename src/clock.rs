use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the unix epoch, fractional.
pub type Epoch = f64;

/// Source of wall-clock time for the tracker
pub trait Clock {
    fn now(&self) -> Epoch;
}

/// Production clock backed by `SystemTime`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Epoch {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}

/// Hand-driven clock for tests and headless runs.
///
/// Clones share the same instant, so a test can keep one handle and give
/// another to the tracker.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Epoch>>,
}

impl ManualClock {
    pub fn new(start: Epoch) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, at: Epoch) {
        self.now.set(at);
    }

    pub fn advance(&self, secs: f64) {
        self.now.set(self.now.get() + secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Epoch {
        self.now.get()
    }
}

pub fn to_local(at: Epoch) -> DateTime<Local> {
    let secs = at.floor();
    let nanos = ((at - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
        .unwrap_or_default()
        .with_timezone(&Local)
}

pub fn local_date(at: Epoch) -> NaiveDate {
    to_local(at).date_naive()
}

/// Epoch of the local midnight that opens `date`.
pub fn local_midnight(date: NaiveDate) -> Epoch {
    let naive = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.timestamp() as f64,
        // midnight skipped by a DST jump; fall back to treating it as UTC
        None => naive.and_utc().timestamp() as f64,
    }
}
