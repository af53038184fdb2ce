use crate::history::Ledger;
use itertools::Itertools;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

pub const DEFAULT_REPORTS_TO_KEEP: usize = 5;

/// Writes one plain-text report per finalized period and prunes old ones.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: Option<PathBuf>,
    keep: usize,
}

impl ReportWriter {
    pub fn new<P: AsRef<Path>>(dir: P, keep: usize) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
            keep: keep.max(1),
        }
    }

    /// A writer that never touches the file system.
    pub fn disabled() -> Self {
        Self {
            dir: None,
            keep: DEFAULT_REPORTS_TO_KEEP,
        }
    }

    /// Writes `report_<label>.txt` and returns its path, or `None` when
    /// disabled.
    pub fn write(&self, label: &str, seconds: f64) -> io::Result<Option<PathBuf>> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        fs::create_dir_all(dir)?;

        let path = dir.join(report_file_name(label));
        fs::write(&path, render_report(label, seconds))?;
        info!(path = %path.display(), "report generated");

        self.prune(dir, &path)?;
        Ok(Some(path))
    }

    // newest first; the report just written always survives
    fn prune(&self, dir: &Path, fresh: &Path) -> io::Result<()> {
        let others: Vec<(PathBuf, SystemTime)> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p != fresh && is_report_file(p))
            .filter_map(|p| {
                let meta = fs::metadata(&p).ok()?;
                let stamp = meta.created().or_else(|_| meta.modified()).ok()?;
                Some((p, stamp))
            })
            .collect();

        for (path, _) in others
            .into_iter()
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)))
            .skip(self.keep - 1)
        {
            match fs::remove_file(&path) {
                Ok(()) => info!(path = %path.display(), "deleted old report"),
                Err(e) => warn!(path = %path.display(), error = %e, "could not delete old report"),
            }
        }
        Ok(())
    }
}

pub fn report_file_name(label: &str) -> String {
    format!("report_{}.txt", label.replace(':', "-"))
}

pub fn render_report(label: &str, seconds: f64) -> String {
    format!(
        "Date: {}\nLearning Hours: {:.2}\nTotal Seconds: {:.0}",
        label,
        seconds / 3600.0,
        seconds
    )
}

fn is_report_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("report_") && n.ends_with(".txt"))
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    series: &'a str,
    label: &'a str,
    hours: f64,
    seconds: f64,
}

/// Writes every ledger as `series,label,hours,seconds` rows. The session
/// ledger is named `session`; countdown ledgers use their timer name.
pub fn export_csv<W: io::Write>(
    writer: W,
    session: &Ledger,
    countdowns: &[(&str, &Ledger)],
) -> Result<(), csv::Error> {
    // header even when every ledger is empty
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(["series", "label", "hours", "seconds"])?;
    let series = std::iter::once(("session", session)).chain(countdowns.iter().copied());
    for (name, ledger) in series {
        for (label, seconds) in ledger.iter() {
            wtr.serialize(CsvRow {
                series: name,
                label,
                hours: seconds / 3600.0,
                seconds,
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Aggregate figures over a ledger, in hours
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub days: usize,
    pub total_hours: f64,
    pub mean_hours: Option<f64>,
    pub std_dev_hours: Option<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

// population deviation
fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

pub fn summarize(ledger: &Ledger) -> Summary {
    let hours = ledger.hours();
    Summary {
        days: hours.len(),
        total_hours: hours.iter().sum(),
        mean_hours: mean(&hours),
        std_dev_hours: std_dev(&hours),
    }
}
