use std::ops::Range;

/// Classification of one character of the active line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mark {
    Untyped,
    Correct,
    Incorrect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CharFeedback {
    pub expected: char,
    pub mark: Mark,
}

/// Where a line sits relative to the line pointer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineStatus {
    Completed,
    Active,
    Pending,
}

/// Compare the typed buffer to `line` position by position.
pub fn mark_line(line: &str, typed: &str) -> Vec<CharFeedback> {
    let mut typed_chars = typed.chars();
    line.chars()
        .map(|expected| {
            let mark = match typed_chars.next() {
                None => Mark::Untyped,
                Some(c) if c == expected => Mark::Correct,
                Some(_) => Mark::Incorrect,
            };
            CharFeedback { expected, mark }
        })
        .collect()
}

/// Number of typed characters past the end of `line`.
pub fn overflow(line: &str, typed: &str) -> usize {
    typed.chars().count().saturating_sub(line.chars().count())
}

pub fn line_status(index: usize, current_line: usize) -> LineStatus {
    match index.cmp(&current_line) {
        std::cmp::Ordering::Less => LineStatus::Completed,
        std::cmp::Ordering::Equal => LineStatus::Active,
        std::cmp::Ordering::Greater => LineStatus::Pending,
    }
}

/// Range of lines to show in `height` rows, keeping the active line centered
/// once the lyrics no longer fit.
pub fn visible_window(line_count: usize, current_line: usize, height: usize) -> Range<usize> {
    if line_count <= height {
        return 0..line_count;
    }
    let half = height / 2;
    let start = current_line.saturating_sub(half).min(line_count - height);
    start..start + height
}
