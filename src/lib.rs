// Library surface for the binary, headless runs and integration tests.
// Front-end types (App, screens) stay in main.rs.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod error;
pub mod history;
pub mod policy;
pub mod report;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod tracker;

pub use error::{Result, StoreError, TrackerError};
pub use tracker::{Confirmation, Tracker, TrackerEvent};
