//! Input pump for the terminal loop.
//!
//! The loop blocks on keyboard input but never longer than the next tracker
//! deadline, so a paused tracker idles at the boundary-check cadence while a
//! running one redraws at the refresh cadence.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};
use tracing::warn;

#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    /// The wait ran out before any input arrived.
    Tick,
}

pub trait AppEventSource: Send + 'static {
    /// Blocks for up to `timeout`; `Err(Timeout)` when nothing arrived.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Reads the terminal on a background thread and forwards key presses and
/// resizes.
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("learnclock-input".into())
            .spawn(move || forward_terminal_events(&tx));
        if let Err(e) = spawned {
            warn!(error = %e, "input thread did not start; running on ticks only");
        }
        Self { rx }
    }
}

fn forward_terminal_events(tx: &Sender<AppEvent>) {
    loop {
        let forwarded = match event::read() {
            // some terminals report releases as well
            Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                tx.send(AppEvent::Key(key))
            }
            Ok(CtEvent::Resize(_, _)) => tx.send(AppEvent::Resize),
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "terminal read failed");
                return;
            }
        };
        if forwarded.is_err() {
            return;
        }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AppEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Upper bound on how long the loop may go without redrawing.
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Scripted input for headless runs
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }

    pub fn channel() -> (Sender<AppEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl AppEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub struct Runner<E: AppEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: AppEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Waits one full ticker interval for input.
    pub fn step(&self) -> AppEvent {
        self.step_within(None)
    }

    /// Waits for input until `deadline` or the ticker interval, whichever
    /// is sooner. A closed source degrades to ticks.
    pub fn step_within(&self, deadline: Option<Duration>) -> AppEvent {
        match self.event_source.recv_timeout(self.wait_for(deadline)) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => AppEvent::Tick,
        }
    }

    pub fn wait_for(&self, deadline: Option<Duration>) -> Duration {
        let interval = self.ticker.interval();
        deadline.map_or(interval, |d| d.min(interval))
    }
}
