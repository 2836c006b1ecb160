//! Pure typing metrics shared by the live stats line and the final report.

/// Average word length used to turn characters into words.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Speed and accuracy at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Metrics {
    pub wpm: u32,
    pub accuracy: u32,
}

/// `round((typed_chars / 5) / elapsed_minutes)`.
///
/// The caller guarantees `elapsed_minutes > 0`; nothing here special-cases zero.
pub fn words_per_minute(typed_chars: usize, elapsed_minutes: f64) -> u32 {
    let words = typed_chars as f64 / CHARS_PER_WORD;
    (words / elapsed_minutes).round() as u32
}

/// Percentage of correct characters, 100 when nothing has been attempted yet.
pub fn accuracy(correct_chars: usize, total_chars: usize) -> u32 {
    if total_chars == 0 {
        return 100;
    }
    ((correct_chars as f64 / total_chars as f64) * 100.0).round() as u32
}

/// Share of completed lines. A session with no lines counts as fully done.
pub fn progress_percent(current_line: usize, line_count: usize) -> f64 {
    if line_count == 0 {
        return 100.0;
    }
    current_line as f64 / line_count as f64 * 100.0
}
