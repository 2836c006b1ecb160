use std::time::{Duration, SystemTime};

use crate::metrics::{self, Metrics};
use crate::runtime::{Clock, SystemClock};

/// Song identity and display data, fixed once the session is loaded
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SongMeta {
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No lyrics loaded
    Idle,
    /// Loaded and stopped, either fresh or paused
    Ready,
    Playing,
    /// Terminal until reset
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    Stopped,
    Playing,
}

/// What `toggle_play` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Started,
    Paused,
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Commit {
    /// Not playing
    Ignored,
    /// Buffer differs from the line; nothing changed
    Mismatch,
    Advanced { line: usize },
    Finished(CompletionReport),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Ignored,
    Counting { remaining: u32 },
    Expired(CompletionReport),
}

/// Final numbers handed to the completion reporter
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub song_id: String,
    pub wpm: u32,
    pub accuracy: u32,
    pub typed_chars: usize,
    pub correct_chars: usize,
    pub elapsed: Duration,
}

/// One typing session over a song's lyrics
#[derive(Debug)]
pub struct Session {
    phase: Phase,
    song: SongMeta,
    lines: Vec<String>,
    current_line: usize,
    typed: String,
    typed_chars: usize,
    correct_chars: usize,
    started_at: Option<SystemTime>,
    countdown_secs: Option<u32>,
    time_remaining: Option<u32>,
    reported: bool,
    clock: Box<dyn Clock>,
}

impl Session {
    pub fn new(countdown_secs: Option<u32>) -> Self {
        Self::with_clock(countdown_secs, Box::new(SystemClock))
    }

    pub fn with_clock(countdown_secs: Option<u32>, clock: Box<dyn Clock>) -> Self {
        Self {
            phase: Phase::Idle,
            song: SongMeta::default(),
            lines: Vec::new(),
            current_line: 0,
            typed: String::new(),
            typed_chars: 0,
            correct_chars: 0,
            started_at: None,
            countdown_secs,
            time_remaining: countdown_secs,
            reported: false,
            clock,
        }
    }

    /// Replace the lyrics and metadata and return to `Ready`.
    ///
    /// Blank lines are dropped; an empty text yields a zero-line session.
    pub fn load(&mut self, lyrics: &str, song: SongMeta) {
        self.lines = split_lyrics(lyrics);
        self.song = song;
        self.phase = Phase::Ready;
        self.clear_progress();
        tracing::info!(
            song_id = %self.song.song_id,
            lines = self.lines.len(),
            "session loaded"
        );
    }

    pub fn toggle_play(&mut self) -> Toggle {
        match self.phase {
            Phase::Ready => {
                if self.lines.is_empty() || self.time_remaining == Some(0) {
                    return Toggle::Ignored;
                }
                if self.started_at.is_none() {
                    self.started_at = Some(self.clock.now());
                }
                self.phase = Phase::Playing;
                tracing::debug!(line = self.current_line, "playing");
                Toggle::Started
            }
            Phase::Playing => {
                self.phase = Phase::Ready;
                tracing::debug!(line = self.current_line, "paused");
                Toggle::Paused
            }
            Phase::Idle | Phase::Completed => Toggle::Ignored,
        }
    }

    /// Replace the in-progress buffer. Returns false when not playing.
    pub fn on_keystroke(&mut self, buffer: &str) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        self.typed.clear();
        self.typed.push_str(buffer);
        true
    }

    pub fn commit(&mut self) -> Commit {
        if self.phase != Phase::Playing {
            return Commit::Ignored;
        }
        let Some(line) = self.lines.get(self.current_line) else {
            return Commit::Ignored;
        };
        if self.typed != *line {
            return Commit::Mismatch;
        }

        let len = self.typed.chars().count();
        self.typed_chars += len;
        self.correct_chars += len;
        self.current_line += 1;
        self.typed.clear();
        self.check_invariants();

        if self.current_line == self.lines.len() {
            match self.complete() {
                Some(report) => Commit::Finished(report),
                None => Commit::Ignored,
            }
        } else {
            Commit::Advanced {
                line: self.current_line,
            }
        }
    }

    /// One second of countdown. Only meaningful with a configured countdown.
    pub fn tick(&mut self) -> Tick {
        if self.phase != Phase::Playing {
            return Tick::Ignored;
        }
        let Some(remaining) = self.time_remaining else {
            return Tick::Ignored;
        };
        let remaining = remaining.saturating_sub(1);
        self.time_remaining = Some(remaining);

        if remaining == 0 {
            match self.complete() {
                Some(report) => Tick::Expired(report),
                None => Tick::Ignored,
            }
        } else {
            Tick::Counting { remaining }
        }
    }

    /// Enter the terminal state. Yields the report the first time only.
    pub fn complete(&mut self) -> Option<CompletionReport> {
        if self.phase == Phase::Idle || self.reported {
            return None;
        }
        self.phase = Phase::Completed;
        self.reported = true;

        let metrics = self.metrics_at(self.clock.now());
        let report = CompletionReport {
            song_id: self.song.song_id.clone(),
            wpm: metrics.wpm,
            accuracy: metrics.accuracy,
            typed_chars: self.typed_chars,
            correct_chars: self.correct_chars,
            elapsed: self.elapsed(),
        };
        tracing::info!(
            song_id = %report.song_id,
            wpm = report.wpm,
            accuracy = report.accuracy,
            "session completed"
        );
        Some(report)
    }

    pub fn reset(&mut self) {
        if self.phase != Phase::Idle {
            self.phase = Phase::Ready;
        }
        self.clear_progress();
        tracing::debug!(song_id = %self.song.song_id, "session reset");
    }

    /// Speed and accuracy right now, zero before the first play.
    pub fn live_metrics(&self) -> Metrics {
        self.metrics_at(self.clock.now())
    }

    fn metrics_at(&self, now: SystemTime) -> Metrics {
        let Some(started_at) = self.started_at else {
            return Metrics::default();
        };
        let minutes = now
            .duration_since(started_at)
            .unwrap_or_default()
            .as_secs_f64()
            / 60.0;
        let wpm = if minutes > 0.0 {
            metrics::words_per_minute(self.typed_chars, minutes)
        } else {
            0
        };
        Metrics {
            wpm,
            accuracy: metrics::accuracy(self.correct_chars, self.typed_chars),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at
            .and_then(|s| self.clock.now().duration_since(s).ok())
            .unwrap_or_default()
    }

    pub fn progress_percent(&self) -> f64 {
        metrics::progress_percent(self.current_line, self.lines.len())
    }

    fn clear_progress(&mut self) {
        self.current_line = 0;
        self.typed.clear();
        self.typed_chars = 0;
        self.correct_chars = 0;
        self.started_at = None;
        self.time_remaining = self.countdown_secs;
        self.reported = false;
    }

    fn check_invariants(&self) {
        debug_assert!(self.current_line <= self.lines.len());
        debug_assert!(self.typed_chars >= self.correct_chars);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn play_status(&self) -> PlayStatus {
        match self.phase {
            Phase::Playing => PlayStatus::Playing,
            _ => PlayStatus::Stopped,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    /// Paused mid-session rather than not yet started
    pub fn is_paused(&self) -> bool {
        self.phase == Phase::Ready && self.started_at.is_some()
    }

    pub fn song(&self) -> &SongMeta {
        &self.song
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn current_line(&self) -> usize {
        self.current_line
    }

    pub fn active_line(&self) -> Option<&str> {
        self.lines.get(self.current_line).map(String::as_str)
    }

    pub fn typed(&self) -> &str {
        &self.typed
    }

    pub fn typed_chars(&self) -> usize {
        self.typed_chars
    }

    pub fn correct_chars(&self) -> usize {
        self.correct_chars
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn time_remaining(&self) -> Option<u32> {
        self.time_remaining
    }

    pub fn countdown_secs(&self) -> Option<u32> {
        self.countdown_secs
    }
}

/// Split raw lyrics into display lines, dropping blank ones.
pub fn split_lyrics(lyrics: &str) -> Vec<String> {
    lyrics
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
