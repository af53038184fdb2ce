use chrono::DateTime;

const SECS_PER_DAY: f64 = 86_400.0;

/// `HH:MM:SS`, hours unbounded.
pub fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let hrs = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hrs:02}:{mins:02}:{secs:02}")
}

/// X (days) and Y (hours) bounds covering every series
pub fn compute_chart_bounds(series: &[Vec<(f64, f64)>]) -> ([f64; 2], [f64; 2]) {
    let points = series.iter().flatten();
    let (mut min_t, mut max_t, mut max_h) = (f64::INFINITY, f64::NEG_INFINITY, 0.0_f64);
    for &(t, h) in points {
        min_t = min_t.min(t);
        max_t = max_t.max(t);
        max_h = max_h.max(h);
    }

    if !min_t.is_finite() {
        return ([0.0, 1.0], [0.0, 1.0]);
    }
    if max_t - min_t < 1.0 {
        max_t = min_t + 1.0;
    }
    let top = if max_h <= 0.0 { 1.0 } else { max_h.ceil() };
    ([min_t, max_t], [0.0, top])
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}

/// Axis label for a chart position given in days since the epoch.
pub fn day_label(days: f64) -> String {
    DateTime::from_timestamp((days * SECS_PER_DAY).round() as i64, 0)
        .map(|dt| dt.format("%m-%d").to_string())
        .unwrap_or_default()
}

/// Shortens a ledger label for a bar: `2024-03-01` -> `03-01`,
/// `2024-03-01 10:00:30` -> `10:00:30`.
pub fn short_label(label: &str) -> &str {
    match label.split_once(' ') {
        Some((_, time)) => time,
        None => label.get(5..).unwrap_or(label),
    }
}
