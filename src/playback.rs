//! Preview playback kept in lockstep with the session's play status.

use thiserror::Error;

use crate::notice::Notice;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output device: {0}")]
    Device(String),
    #[error("could not decode preview clip: {0}")]
    Decode(String),
    #[error("playback failed: {0}")]
    Play(String),
}

/// A fetched preview clip
#[derive(Debug, Clone)]
pub struct PreviewClip {
    pub url: String,
    pub bytes: Vec<u8>,
}

/// An open, positioned audio handle
pub trait AudioSink {
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    /// Seek back to the start; the sink is left paused.
    fn rewind(&mut self) -> Result<(), PlaybackError>;
    /// Stop output and free the device resources.
    fn release(&mut self);
}

/// Opens sinks for clips
pub trait AudioBackend {
    fn open(&self, clip: &PreviewClip, looping: bool) -> Result<Box<dyn AudioSink>, PlaybackError>;
}

/// Backend for when audio is disabled or unavailable: never opens a sink
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentBackend;

impl AudioBackend for SilentBackend {
    fn open(&self, _clip: &PreviewClip, _looping: bool) -> Result<Box<dyn AudioSink>, PlaybackError> {
        Err(PlaybackError::Device("audio output is disabled".to_string()))
    }
}

/// Owns at most one audio handle per loaded session.
///
/// The handle is released on [`PlaybackController::release`], on reload and on drop.
pub struct PlaybackController {
    backend: Box<dyn AudioBackend>,
    sink: Option<Box<dyn AudioSink>>,
    playing: bool,
}

impl PlaybackController {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend,
            sink: None,
            playing: false,
        }
    }

    /// Open a looping handle for the session's preview, replacing any previous one.
    ///
    /// Missing or unplayable previews are not errors; they come back as a notice.
    pub fn load(&mut self, clip: Option<&PreviewClip>) -> Option<Notice> {
        self.release();
        let Some(clip) = clip else {
            return Some(Notice::info("No audio preview for this song, practicing without audio"));
        };
        match self.backend.open(clip, true) {
            Ok(sink) => {
                tracing::debug!(url = %clip.url, "preview loaded");
                self.sink = Some(sink);
                None
            }
            Err(err) => {
                tracing::warn!(url = %clip.url, "preview unavailable: {err}");
                Some(Notice::info(format!("Practicing without audio ({err})")))
            }
        }
    }

    pub fn start(&mut self) -> Option<Notice> {
        let sink = self.sink.as_mut()?;
        match sink.play() {
            Ok(()) => {
                self.playing = true;
                None
            }
            Err(err) => {
                tracing::warn!("preview playback failed: {err}");
                self.release();
                Some(Notice::warning(format!("Audio stopped: {err}")))
            }
        }
    }

    pub fn pause(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            sink.pause();
        }
        self.playing = false;
    }

    /// Pause and seek back to the beginning.
    pub fn rewind(&mut self) -> Option<Notice> {
        self.pause();
        let sink = self.sink.as_mut()?;
        match sink.rewind() {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!("preview rewind failed: {err}");
                self.release();
                Some(Notice::warning(format!("Audio stopped: {err}")))
            }
        }
    }

    pub fn release(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.release();
            tracing::debug!("preview released");
        }
        self.playing = false;
    }

    pub fn has_audio(&self) -> bool {
        self.sink.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("has_audio", &self.has_audio())
            .field("playing", &self.playing)
            .finish()
    }
}

#[cfg(feature = "audio")]
pub use device::RodioBackend;

#[cfg(feature = "audio")]
mod device {
    use std::io::Cursor;

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

    use super::{AudioBackend, AudioSink, PlaybackError, PreviewClip};

    /// Plays previews on the default output device
    pub struct RodioBackend {
        _stream: OutputStream,
        handle: OutputStreamHandle,
    }

    impl RodioBackend {
        pub fn new() -> Result<Self, PlaybackError> {
            let (stream, handle) =
                OutputStream::try_default().map_err(|e| PlaybackError::Device(e.to_string()))?;
            Ok(Self {
                _stream: stream,
                handle,
            })
        }
    }

    impl AudioBackend for RodioBackend {
        fn open(
            &self,
            clip: &PreviewClip,
            looping: bool,
        ) -> Result<Box<dyn AudioSink>, PlaybackError> {
            let sink = Sink::try_new(&self.handle).map_err(|e| PlaybackError::Device(e.to_string()))?;
            sink.pause();
            let mut rodio_sink = RodioSink {
                sink,
                bytes: clip.bytes.clone(),
                looping,
            };
            rodio_sink.enqueue()?;
            Ok(Box::new(rodio_sink))
        }
    }

    struct RodioSink {
        sink: Sink,
        bytes: Vec<u8>,
        looping: bool,
    }

    impl RodioSink {
        fn enqueue(&mut self) -> Result<(), PlaybackError> {
            let source = Decoder::new(Cursor::new(self.bytes.clone()))
                .map_err(|e| PlaybackError::Decode(e.to_string()))?;
            if self.looping {
                self.sink.append(source.repeat_infinite());
            } else {
                self.sink.append(source);
            }
            Ok(())
        }
    }

    impl AudioSink for RodioSink {
        fn play(&mut self) -> Result<(), PlaybackError> {
            if self.sink.empty() {
                self.enqueue()?;
            }
            self.sink.play();
            Ok(())
        }

        fn pause(&mut self) {
            self.sink.pause();
        }

        fn rewind(&mut self) -> Result<(), PlaybackError> {
            // clear() drops the queued source and leaves the sink paused
            self.sink.clear();
            self.enqueue()
        }

        fn release(&mut self) {
            self.sink.stop();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Calls observed by a [`RecordingBackend`] sink
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct SinkLog {
        pub opened: usize,
        pub looping: bool,
        pub plays: usize,
        pub pauses: usize,
        pub rewinds: usize,
        pub releases: usize,
    }

    #[derive(Debug, Default, Clone)]
    pub struct RecordingBackend {
        pub log: Arc<Mutex<SinkLog>>,
        pub fail_play: bool,
    }

    struct RecordingSink {
        log: Arc<Mutex<SinkLog>>,
        fail_play: bool,
    }

    impl AudioBackend for RecordingBackend {
        fn open(&self, _clip: &PreviewClip, looping: bool) -> Result<Box<dyn AudioSink>, PlaybackError> {
            {
                let mut log = self.log.lock().unwrap();
                log.opened += 1;
                log.looping = looping;
            }
            Ok(Box::new(RecordingSink {
                log: self.log.clone(),
                fail_play: self.fail_play,
            }))
        }
    }

    impl AudioSink for RecordingSink {
        fn play(&mut self) -> Result<(), PlaybackError> {
            self.log.lock().unwrap().plays += 1;
            if self.fail_play {
                return Err(PlaybackError::Play("device lost".to_string()));
            }
            Ok(())
        }

        fn pause(&mut self) {
            self.log.lock().unwrap().pauses += 1;
        }

        fn rewind(&mut self) -> Result<(), PlaybackError> {
            self.log.lock().unwrap().rewinds += 1;
            Ok(())
        }

        fn release(&mut self) {
            self.log.lock().unwrap().releases += 1;
        }
    }

    pub fn clip() -> PreviewClip {
        PreviewClip {
            url: "https://example.test/preview.mp3".to_string(),
            bytes: vec![0; 16],
        }
    }

    #[test]
    fn test_load_without_preview_is_notice_only() {
        let mut controller = PlaybackController::new(Box::new(RecordingBackend::default()));
        let notice = controller.load(None);
        assert!(notice.is_some());
        assert!(!controller.has_audio());
        assert_eq!(controller.start(), None);
        assert!(!controller.is_playing());
    }

    #[test]
    fn test_silent_backend_degrades() {
        let mut controller = PlaybackController::new(Box::new(SilentBackend));
        assert!(controller.load(Some(&clip())).is_some());
        assert!(!controller.has_audio());
    }

    #[test]
    fn test_opens_looping_and_follows_play_state() {
        let backend = RecordingBackend::default();
        let log = backend.log.clone();
        let mut controller = PlaybackController::new(Box::new(backend));

        assert_eq!(controller.load(Some(&clip())), None);
        assert_eq!(controller.start(), None);
        assert!(controller.is_playing());
        controller.pause();
        assert!(!controller.is_playing());
        assert_eq!(controller.rewind(), None);

        let log = log.lock().unwrap().clone();
        assert_eq!(log.opened, 1);
        assert!(log.looping);
        assert_eq!(log.plays, 1);
        assert_eq!(log.rewinds, 1);
        assert!(log.pauses >= 2);
        assert_eq!(log.releases, 0);
    }

    #[test]
    fn test_play_failure_releases_handle() {
        let backend = RecordingBackend {
            fail_play: true,
            ..Default::default()
        };
        let log = backend.log.clone();
        let mut controller = PlaybackController::new(Box::new(backend));
        controller.load(Some(&clip()));

        assert!(controller.start().is_some());
        assert!(!controller.has_audio());
        assert!(!controller.is_playing());
        assert_eq!(log.lock().unwrap().releases, 1);
    }

    #[test]
    fn test_drop_releases_handle() {
        let backend = RecordingBackend::default();
        let log = backend.log.clone();
        {
            let mut controller = PlaybackController::new(Box::new(backend));
            controller.load(Some(&clip()));
            controller.start();
        }
        assert_eq!(log.lock().unwrap().releases, 1);
    }

    #[test]
    fn test_reload_releases_previous_handle() {
        let backend = RecordingBackend::default();
        let log = backend.log.clone();
        let mut controller = PlaybackController::new(Box::new(backend));
        controller.load(Some(&clip()));
        controller.load(Some(&clip()));
        let log = log.lock().unwrap().clone();
        assert_eq!(log.opened, 2);
        assert_eq!(log.releases, 1);
    }
}
