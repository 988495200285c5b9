//! The platform playback capability the player drives.
//!
//! A controller never decodes audio for playback itself; it hands the source to a
//! [`MediaElement`] and reacts to the [`MediaEvent`]s it reports. [`RodioMedia`] is
//! the native implementation on top of a rodio sink.

use std::collections::VecDeque;
use std::io::Cursor;
use std::time::Duration;

use rodio::{Decoder, Source};

use crate::error::MediaError;
use crate::source::{self, AudioFetcher, DefaultFetcher};

/// Lifecycle notifications from the media element.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadStart,
    MetadataLoaded { duration: f64 },
    CanPlay,
    Play,
    Pause,
    Ended,
    Error(MediaError),
}

/// Title and subtitle published to the platform's "now playing" integration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMetadata {
    pub title: String,
    pub artist: Option<String>,
}

pub trait MediaElement {
    /// Assign a new source and begin loading it.
    fn set_source(&mut self, url: &str);

    /// Block until the source's metadata is known.
    ///
    /// Returns the duration in seconds, or the error that stopped loading.
    fn wait_for_metadata(&mut self) -> Result<f64, MediaError>;

    fn play(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;

    /// Current position in seconds.
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64) -> Result<(), MediaError>;

    /// Duration in seconds; `NaN` until metadata is known.
    fn duration(&self) -> f64;

    fn set_volume(&mut self, volume: f32);
    fn volume(&self) -> f32;

    fn set_playback_rate(&mut self, _rate: f32) {}

    fn set_session_metadata(&mut self, _metadata: &SessionMetadata) {}

    /// Drop the current source and stop any playback.
    fn clear_source(&mut self);

    /// Drain lifecycle events observed since the last call.
    fn poll_events(&mut self) -> Vec<MediaEvent>;
}

/// Plays sources through the default audio output with a rodio sink.
pub struct RodioMedia {
    _stream_handle: rodio::OutputStream,
    sink: rodio::Sink,
    fetcher: Box<dyn AudioFetcher>,
    url: Option<String>,
    bytes: Option<Vec<u8>>,
    duration: f64,
    volume: f32,
    events: VecDeque<MediaEvent>,
    // playing, as far as the element's own play/pause calls are concerned
    started: bool,
}

impl RodioMedia {
    pub fn new() -> Result<Self, MediaError> {
        Self::with_fetcher(Box::new(DefaultFetcher))
    }

    pub fn with_fetcher(fetcher: Box<dyn AudioFetcher>) -> Result<Self, MediaError> {
        let _stream_handle = rodio::OutputStreamBuilder::open_default_stream()
            .map_err(|err| MediaError::Output(err.to_string()))?;
        let sink = rodio::Sink::connect_new(_stream_handle.mixer());
        sink.pause();
        Ok(Self {
            _stream_handle,
            sink,
            fetcher,
            url: None,
            bytes: None,
            duration: f64::NAN,
            volume: 1.0,
            events: VecDeque::new(),
            started: false,
        })
    }

    fn decoder(&self) -> Result<Decoder<Cursor<Vec<u8>>>, MediaError> {
        let bytes = self.bytes.clone().ok_or(MediaError::NoSource)?;
        Decoder::new(Cursor::new(bytes)).map_err(|err| MediaError::Decode(err.to_string()))
    }

    fn open(&mut self, url: &str) -> Result<f64, MediaError> {
        let bytes = self.fetcher.fetch(url).map_err(|err| MediaError::Open {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        self.bytes = Some(bytes);
        let decoder = self.decoder()?;

        let duration = match decoder.total_duration() {
            Some(total) => total.as_secs_f64(),
            None => {
                // some containers don't carry a frame count: decode once to measure
                let bytes = self.bytes.clone().ok_or(MediaError::NoSource)?;
                source::decode_audio(bytes, source::extension_of(url))
                    .map_err(|err| MediaError::Decode(err.to_string()))?
                    .duration_secs()
            }
        };

        self.sink.stop();
        self.sink.clear();
        self.sink.append(decoder);
        self.sink.pause();
        self.sink.set_volume(self.volume);
        Ok(duration)
    }
}

impl MediaElement for RodioMedia {
    fn set_source(&mut self, url: &str) {
        self.clear_source();
        self.url = Some(url.to_string());
        self.events.push_back(MediaEvent::LoadStart);
    }

    fn wait_for_metadata(&mut self) -> Result<f64, MediaError> {
        let url = self.url.clone().ok_or(MediaError::NoSource)?;
        match self.open(&url) {
            Ok(duration) => {
                self.duration = duration;
                self.events
                    .push_back(MediaEvent::MetadataLoaded { duration });
                self.events.push_back(MediaEvent::CanPlay);
                log::info!("RodioMedia: loaded {url} ({duration:.2}s)");
                Ok(duration)
            }
            Err(err) => {
                self.events.push_back(MediaEvent::Error(err.clone()));
                Err(err)
            }
        }
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.bytes.is_none() {
            return Err(MediaError::NoSource);
        }
        if self.sink.empty() {
            // finished earlier: queue the source again from the start
            let decoder = self.decoder()?;
            self.sink.append(decoder);
        }
        self.sink.play();
        if !self.started {
            self.started = true;
            self.events.push_back(MediaEvent::Play);
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
        if self.started {
            self.started = false;
            self.events.push_back(MediaEvent::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        !self.started
    }

    fn current_time(&self) -> f64 {
        if self.sink.empty() {
            return 0.0;
        }
        self.sink.get_pos().as_secs_f64()
    }

    fn set_current_time(&mut self, seconds: f64) -> Result<(), MediaError> {
        if self.bytes.is_none() {
            return Err(MediaError::NoSource);
        }
        if self.sink.empty() {
            let decoder = self.decoder()?;
            self.sink.append(decoder);
            if !self.started {
                self.sink.pause();
            }
        }
        let target = Duration::from_secs_f64(seconds.max(0.0));
        self.sink
            .try_seek(target)
            .map_err(|err| MediaError::Seek(err.to_string()))
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.sink.set_volume(volume);
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_playback_rate(&mut self, rate: f32) {
        self.sink.set_speed(rate);
    }

    // no platform session on a terminal; record what would be published
    fn set_session_metadata(&mut self, metadata: &SessionMetadata) {
        log::debug!("media: now playing {metadata:?}");
    }

    fn clear_source(&mut self) {
        self.sink.stop();
        self.sink.clear();
        self.url = None;
        self.bytes = None;
        self.duration = f64::NAN;
        self.started = false;
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        if self.started && self.sink.empty() {
            self.started = false;
            self.sink.pause();
            self.events.push_back(MediaEvent::Ended);
        }
        self.events.drain(..).collect()
    }
}
