use crate::store::DailyWpm;

/// Compute X (day index) and Y (WPM) bounds for the progress chart
pub fn compute_chart_params(progress: &[DailyWpm]) -> (f64, f64) {
    let highest_wpm = progress.iter().map(|d| d.wpm).max().unwrap_or(0);

    // a single day still needs a non-empty x range
    let last_index = progress.len().saturating_sub(1).max(1) as f64;

    // leave a little headroom above the best day
    // integer math, 50 * 1.1 in floats ceils to 56
    let y_max = if highest_wpm > 0 {
        (highest_wpm * 11).div_ceil(10) as f64
    } else {
        10.0
    };

    (last_index, y_max)
}

/// Chart points, one per day in order
pub fn progress_points(progress: &[DailyWpm]) -> Vec<(f64, f64)> {
    progress
        .iter()
        .enumerate()
        .map(|(i, d)| (i as f64, d.wpm as f64))
        .collect()
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
