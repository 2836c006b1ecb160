use std::rc::Rc;
use std::time::Duration;

use crate::catalog::CatalogError;
use crate::loader::LoadedSong;
use crate::notice::{Notice, Notices};
use crate::playback::{AudioBackend, PlaybackController};
use crate::reporter::{CompletionReporter, ReportOutcome};
use crate::runtime::{Clock, Metronome, SystemClock};
use crate::session::{Commit, CompletionReport, Phase, Session, SongMeta, Tick, Toggle};

/// A finished session and what happened when saving it
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub report: CompletionReport,
    pub saved: ReportOutcome,
}

/// One game view: a session plus the resources whose lifetime follows it.
///
/// Session transitions drive the side effects here: playback follows play/pause,
/// the countdown only runs while playing, and the first completion is reported once.
#[derive(Debug)]
pub struct Game {
    session: Session,
    playback: PlaybackController,
    countdown: Metronome,
    reporter: Rc<CompletionReporter>,
    notices: Notices,
    completion: Option<Completion>,
}

impl Game {
    pub fn new(
        countdown_secs: Option<u32>,
        backend: Box<dyn AudioBackend>,
        reporter: Rc<CompletionReporter>,
    ) -> Self {
        Self::with_clock(countdown_secs, backend, reporter, Box::new(SystemClock))
    }

    pub fn with_clock(
        countdown_secs: Option<u32>,
        backend: Box<dyn AudioBackend>,
        reporter: Rc<CompletionReporter>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            session: Session::with_clock(countdown_secs, clock),
            playback: PlaybackController::new(backend),
            countdown: Metronome::default(),
            reporter,
            notices: Notices::default(),
            completion: None,
        }
    }

    /// Install a loaded song and its preview
    pub fn load(&mut self, song: LoadedSong) {
        let track = song.track;
        let meta = SongMeta {
            song_id: track.spotify_id,
            title: track.title,
            artist: track.artist,
            preview_url: track.preview_url,
        };
        self.session.load(track.lyrics.as_deref().unwrap_or_default(), meta);
        self.countdown.reset();
        self.completion = None;

        let audio_notice = match (&song.preview, song.preview_error) {
            (Some(clip), _) => self.playback.load(Some(clip)),
            (None, Some(err)) => {
                self.playback.load(None);
                Some(Notice::info(format!(
                    "Preview unavailable ({err}), practicing without audio"
                )))
            }
            (None, None) => self.playback.load(None),
        };
        self.notices.extend(audio_notice);

        if self.session.lines().is_empty() {
            self.notices.push(Notice::warning("This song has no lyrics to type"));
        }
    }

    /// The song could not be loaded; stay idle and tell the user
    pub fn load_failed(&mut self, err: &CatalogError) {
        tracing::warn!("song load failed: {err}");
        self.notices
            .push(Notice::error(format!("Could not load song: {err}")));
    }

    pub fn toggle_play(&mut self) -> Toggle {
        let toggle = self.session.toggle_play();
        match toggle {
            Toggle::Started => {
                let notice = self.playback.start();
                self.notices.extend(notice);
            }
            Toggle::Paused => {
                self.playback.pause();
                self.countdown.reset();
            }
            Toggle::Ignored => {
                if self.session.phase() == Phase::Ready && self.session.lines().is_empty() {
                    self.notices.push(Notice::warning("Nothing to type in this song"));
                }
            }
        }
        toggle
    }

    pub fn keystroke(&mut self, buffer: &str) -> bool {
        self.session.on_keystroke(buffer)
    }

    pub fn type_char(&mut self, c: char) -> bool {
        let mut buffer = self.session.typed().to_string();
        buffer.push(c);
        self.keystroke(&buffer)
    }

    pub fn backspace(&mut self) -> bool {
        let mut buffer = self.session.typed().to_string();
        if buffer.pop().is_none() {
            return false;
        }
        self.keystroke(&buffer)
    }

    pub fn commit(&mut self) -> Commit {
        let commit = self.session.commit();
        if let Commit::Finished(report) = &commit {
            self.finish(report.clone());
        }
        commit
    }

    /// One countdown second
    pub fn tick(&mut self) -> Tick {
        let tick = self.session.tick();
        if let Tick::Expired(report) = &tick {
            self.finish(report.clone());
        }
        tick
    }

    /// Feed wall-clock time from the UI ticker; whole seconds become ticks.
    pub fn advance(&mut self, elapsed: Duration) {
        if self.session.phase() != Phase::Playing || self.session.time_remaining().is_none() {
            return;
        }
        for _ in 0..self.countdown.advance(elapsed) {
            if matches!(self.tick(), Tick::Expired(_) | Tick::Ignored) {
                break;
            }
        }
    }

    pub fn complete(&mut self) {
        if let Some(report) = self.session.complete() {
            self.finish(report);
        }
    }

    fn finish(&mut self, report: CompletionReport) {
        self.playback.pause();
        self.countdown.reset();
        let saved = self.reporter.report(&report);
        self.notices.extend(saved.notice());
        self.completion = Some(Completion { report, saved });
    }

    pub fn reset(&mut self) {
        self.session.reset();
        self.countdown.reset();
        self.completion = None;
        let notice = self.playback.rewind();
        self.notices.extend(notice);
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Track;
    use crate::notice::Severity;
    use crate::playback::tests::{clip, RecordingBackend};
    use crate::reporter::tests::RecordingStore;
    use crate::runtime::ManualClock;
    use crate::session::PlayStatus;
    use assert_matches::assert_matches;

    struct Harness {
        game: Game,
        clock: ManualClock,
        store: Rc<RecordingStore>,
        backend: RecordingBackend,
    }

    fn harness(countdown: Option<u32>, user: Option<&str>, fail_store: bool) -> Harness {
        let clock = ManualClock::default();
        let store = Rc::new(RecordingStore {
            fail: fail_store,
            ..Default::default()
        });
        let reporter = Rc::new(CompletionReporter::new(user.map(str::to_string), store.clone()));
        let backend = RecordingBackend::default();
        let game = Game::with_clock(countdown, Box::new(backend.clone()), reporter, Box::new(clock.clone()));
        Harness {
            game,
            clock,
            store,
            backend,
        }
    }

    fn song(lyrics: &str, with_preview: bool) -> LoadedSong {
        LoadedSong {
            track: Track {
                spotify_id: "sid".to_string(),
                title: "Title".to_string(),
                artist: "Artist".to_string(),
                lyrics: Some(lyrics.to_string()),
                preview_url: with_preview.then(|| clip().url),
            },
            preview: with_preview.then(clip),
            preview_error: None,
        }
    }

    fn type_and_commit(game: &mut Game, text: &str) -> Commit {
        for c in text.chars() {
            game.type_char(c);
        }
        game.commit()
    }

    #[test]
    fn test_full_song_is_saved_once() {
        let mut h = harness(None, Some("ada"), false);
        h.game.load(song("hello\nworld", true));
        assert_eq!(h.game.toggle_play(), Toggle::Started);
        assert!(h.game.playback().is_playing());

        h.clock.advance(Duration::from_secs(6));
        assert_eq!(type_and_commit(&mut h.game, "hello"), Commit::Advanced { line: 1 });
        h.clock.advance(Duration::from_secs(6));
        assert_matches!(type_and_commit(&mut h.game, "world"), Commit::Finished(_));

        // a late countdown expiry or explicit completion must not report again
        h.game.complete();
        h.game.tick();

        let completion = h.game.completion().unwrap();
        assert_eq!(completion.saved, ReportOutcome::Saved);
        assert_eq!(completion.report.wpm, 10);
        assert_eq!(completion.report.accuracy, 100);
        assert_eq!(h.store.records.borrow().len(), 1);
        assert!(!h.game.playback().is_playing());
        assert_eq!(h.game.session().play_status(), PlayStatus::Stopped);
    }

    #[test]
    fn test_play_pause_drive_playback() {
        let mut h = harness(None, None, false);
        h.game.load(song("line", true));

        h.game.toggle_play();
        h.game.toggle_play();
        h.game.toggle_play();

        let log = h.backend.log.lock().unwrap().clone();
        assert_eq!(log.opened, 1);
        assert!(log.looping);
        assert_eq!(log.plays, 2);
        assert!(log.pauses >= 1);
    }

    #[test]
    fn test_reset_rewinds_and_clears_completion() {
        let mut h = harness(None, Some("ada"), false);
        h.game.load(song("go", true));
        h.game.toggle_play();
        h.clock.advance(Duration::from_secs(1));
        type_and_commit(&mut h.game, "go");
        assert!(h.game.completion().is_some());

        h.game.reset();
        assert!(h.game.completion().is_none());
        assert_eq!(h.game.session().phase(), Phase::Ready);
        assert_eq!(h.game.session().typed_chars(), 0);
        assert_eq!(h.backend.log.lock().unwrap().rewinds, 1);
        assert!(!h.game.playback().is_playing());
    }

    #[test]
    fn test_countdown_runs_only_while_playing() {
        let mut h = harness(Some(3), Some("ada"), false);
        h.game.load(song("never finished", false));

        h.game.advance(Duration::from_secs(5));
        assert_eq!(h.game.session().time_remaining(), Some(3));

        h.game.toggle_play();
        h.game.advance(Duration::from_millis(1500));
        assert_eq!(h.game.session().time_remaining(), Some(2));

        // pausing drops the partial second
        h.game.toggle_play();
        h.game.toggle_play();
        h.game.advance(Duration::from_millis(600));
        assert_eq!(h.game.session().time_remaining(), Some(2));

        h.game.advance(Duration::from_secs(10));
        assert_eq!(h.game.session().time_remaining(), Some(0));
        assert!(h.game.session().is_completed());
        assert_eq!(h.store.records.borrow().len(), 1);
    }

    #[test]
    fn test_anonymous_completion_keeps_terminal_state() {
        let mut h = harness(None, None, false);
        h.game.load(song("hi", false));
        h.game.toggle_play();
        type_and_commit(&mut h.game, "hi");

        let completion = h.game.completion().unwrap();
        assert_eq!(completion.saved, ReportOutcome::SkippedAnonymous);
        assert!(h.store.records.borrow().is_empty());
        assert!(h.game.session().is_completed());
    }

    #[test]
    fn test_store_failure_is_recoverable() {
        let mut h = harness(None, Some("ada"), true);
        h.game.load(song("hi", false));
        h.game.toggle_play();
        type_and_commit(&mut h.game, "hi");

        assert!(h.game.session().is_completed());
        assert_matches!(h.game.completion().unwrap().saved, ReportOutcome::Failed(_));
        assert_eq!(h.game.notices().latest().unwrap().severity, Severity::Warning);
    }

    #[test]
    fn test_missing_preview_is_info_notice() {
        let mut h = harness(None, None, false);
        h.game.load(song("hi", false));
        assert!(!h.game.playback().has_audio());
        assert_eq!(h.game.notices().latest().unwrap().severity, Severity::Info);
        assert_eq!(h.game.toggle_play(), Toggle::Started);
    }

    #[test]
    fn test_preview_error_is_reported() {
        let mut h = harness(None, None, false);
        let mut loaded = song("hi", false);
        loaded.preview_error = Some("timed out".to_string());
        h.game.load(loaded);
        assert!(h.game.notices().latest().unwrap().message.contains("timed out"));
    }

    #[test]
    fn test_empty_lyrics_refuse_to_play() {
        let mut h = harness(None, None, false);
        h.game.load(song("\n\n", false));
        assert_eq!(h.game.session().phase(), Phase::Ready);
        assert_eq!(h.game.toggle_play(), Toggle::Ignored);
        assert_eq!(h.game.session().phase(), Phase::Ready);
        assert!(h.game.completion().is_none());
    }

    #[test]
    fn test_load_failure_stays_idle() {
        let mut h = harness(None, None, false);
        h.game.load_failed(&CatalogError::NotFound("x".to_string()));
        assert_eq!(h.game.session().phase(), Phase::Idle);
        assert_eq!(h.game.notices().latest().unwrap().severity, Severity::Error);
        assert_eq!(h.game.toggle_play(), Toggle::Ignored);
    }

    #[test]
    fn test_backspace_edits_buffer() {
        let mut h = harness(None, None, false);
        h.game.load(song("abc", false));
        assert!(!h.game.type_char('a'));
        h.game.toggle_play();
        h.game.type_char('a');
        h.game.type_char('x');
        h.game.backspace();
        h.game.type_char('b');
        assert_eq!(h.game.session().typed(), "ab");
        h.game.backspace();
        h.game.backspace();
        assert!(!h.game.backspace());
    }

    #[test]
    fn test_drop_releases_audio() {
        let h = harness(None, None, false);
        let backend = h.backend.clone();
        let mut game = h.game;
        game.load(song("x", true));
        game.toggle_play();
        drop(game);
        assert_eq!(backend.log.lock().unwrap().releases, 1);
    }
}
