use crate::clock::{local_date, local_midnight, to_local, Epoch};
use chrono::{Days, NaiveDate};
use std::time::Duration;

/// Seconds per accelerated test cycle when no interval is configured.
pub const DEFAULT_TEST_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryKind {
    /// Roll over at local midnight.
    CalendarDay,
    /// Roll over a fixed duration after the session opened.
    FixedInterval(Duration),
}

/// Where a tracked day begins. Calendar days use the date; fixed
/// intervals use the instant the cycle opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub date: NaiveDate,
    pub epoch: Epoch,
}

impl Anchor {
    pub fn at(now: Epoch) -> Self {
        Self {
            date: local_date(now),
            epoch: now,
        }
    }
}

/// Result of comparing an anchor with the current time
#[derive(Debug, Clone, PartialEq)]
pub struct Crossing {
    /// Ledger label of the period that just ended.
    pub label: String,
    /// Instant the period ended.
    pub boundary: Epoch,
    /// Anchor of the period that starts now.
    pub next: Anchor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionPolicy {
    pub boundary: BoundaryKind,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::calendar()
    }
}

impl SessionPolicy {
    pub fn calendar() -> Self {
        Self {
            boundary: BoundaryKind::CalendarDay,
        }
    }

    pub fn interval(every: Duration) -> Self {
        Self {
            boundary: BoundaryKind::FixedInterval(every),
        }
    }

    pub fn is_test_mode(&self) -> bool {
        matches!(self.boundary, BoundaryKind::FixedInterval(_))
    }

    pub fn label(&self, anchor: &Anchor) -> String {
        match self.boundary {
            BoundaryKind::CalendarDay => anchor.date.format("%Y-%m-%d").to_string(),
            BoundaryKind::FixedInterval(_) => to_local(anchor.epoch)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        }
    }

    pub fn boundary_instant(&self, anchor: &Anchor) -> Epoch {
        match self.boundary {
            BoundaryKind::CalendarDay => {
                let next_day = anchor
                    .date
                    .checked_add_days(Days::new(1))
                    .unwrap_or(anchor.date);
                local_midnight(next_day)
            }
            BoundaryKind::FixedInterval(every) => anchor.epoch + every.as_secs_f64(),
        }
    }

    /// Returns the crossing if `now` lies past the period `anchor` opened.
    pub fn crossing(&self, anchor: &Anchor, now: Epoch) -> Option<Crossing> {
        let crossed = match self.boundary {
            BoundaryKind::CalendarDay => local_date(now) != anchor.date,
            BoundaryKind::FixedInterval(every) => now - anchor.epoch >= every.as_secs_f64(),
        };
        if !crossed {
            return None;
        }
        Some(Crossing {
            label: self.label(anchor),
            boundary: self.boundary_instant(anchor),
            next: Anchor::at(now),
        })
    }
}
