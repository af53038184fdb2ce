use crate::clock::Epoch;
use std::time::Duration;
use tracing::debug;

/// Opaque handle to a scheduled job. Cancelling twice is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(u64);

/// Work the tracker asks to be woken up for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    SessionRefresh,
    CountdownRefresh(String),
    BoundaryCheck,
}

#[derive(Debug)]
struct Pending {
    handle: JobHandle,
    due: Epoch,
    job: Job,
}

/// Single-threaded one-shot timer queue polled by the UI loop.
///
/// Jobs never run on their own; `take_due` hands back the ones whose
/// deadline has passed and the caller decides what to do with them.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    pending: Vec<Pending>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_after(&mut self, now: Epoch, delay: Duration, job: Job) -> JobHandle {
        self.next_id += 1;
        let handle = JobHandle(self.next_id);
        debug!(?job, delay_ms = delay.as_millis() as u64, "scheduled");
        self.pending.push(Pending {
            handle,
            due: now + delay.as_secs_f64(),
            job,
        });
        handle
    }

    /// Returns true if the job was still pending.
    pub fn cancel(&mut self, handle: JobHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.handle != handle);
        before != self.pending.len()
    }

    /// Cancels whatever `slot` holds and leaves it empty.
    pub fn cancel_slot(&mut self, slot: &mut Option<JobHandle>) {
        if let Some(handle) = slot.take() {
            self.cancel(handle);
        }
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest deadline still pending.
    pub fn next_due(&self) -> Option<Epoch> {
        self.pending.iter().map(|p| p.due).min_by(|a, b| a.total_cmp(b))
    }

    /// Removes and returns due jobs, earliest deadline first.
    pub fn take_due(&mut self, now: Epoch) -> Vec<(JobHandle, Job)> {
        let (mut due, rest): (Vec<Pending>, Vec<Pending>) =
            self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = rest;
        due.sort_by(|a, b| a.due.total_cmp(&b.due));
        due.into_iter().map(|p| (p.handle, p.job)).collect()
    }
}
