//! Test doubles for the platform seams.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Cursor;
use std::rc::Rc;

use crate::error::{MediaError, WaveformError};
use crate::media::{MediaElement, MediaEvent, SessionMetadata};
use crate::source::AudioFetcher;

/// Encode channels of float samples as a 16-bit PCM WAV file.
pub fn wav_bytes(channels: &[Vec<f32>], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = channels.first().map_or(0, Vec::len);
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            for channel in channels {
                let sample = (channel[i].clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Serves fixed bytes per url and answers 404 for everything else.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    files: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl StaticFetcher {
    pub fn with(url: &str, bytes: Vec<u8>) -> Self {
        Self::default().and(url, bytes)
    }

    pub fn and(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), bytes);
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl AudioFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, WaveformError> {
        self.requests.borrow_mut().push(url.to_string());
        self.files.get(url).cloned().ok_or(WaveformError::Status(404))
    }
}

#[derive(Debug, Default)]
struct FakeMediaState {
    tracks: HashMap<String, f64>,
    broken_play: HashSet<String>,
    source: Option<String>,
    duration: Option<f64>,
    time: f64,
    playing: bool,
    volume: f32,
    rate: f32,
    session: Option<SessionMetadata>,
    events: VecDeque<MediaEvent>,
}

/// A scripted media element with a manually advanced clock.
///
/// Clones share state, so a test keeps one clone and hands the other to a player.
#[derive(Debug, Clone, Default)]
pub struct FakeMedia(Rc<RefCell<FakeMediaState>>);

impl FakeMedia {
    pub fn new() -> Self {
        let media = Self::default();
        media.0.borrow_mut().volume = 1.0;
        media.0.borrow_mut().rate = 1.0;
        media
    }

    /// Make `url` loadable with the given duration. Unknown urls fail to load.
    pub fn with_track(self, url: &str, duration: f64) -> Self {
        self.0.borrow_mut().tracks.insert(url.to_string(), duration);
        self
    }

    /// Loads fine but refuses to start.
    pub fn with_unplayable(self, url: &str, duration: f64) -> Self {
        self.0.borrow_mut().broken_play.insert(url.to_string());
        self.with_track(url, duration)
    }

    pub fn advance(&self, secs: f64) {
        let mut state = self.0.borrow_mut();
        if state.playing {
            state.time += secs;
        }
    }

    /// Report an asynchronous media failure.
    pub fn fail(&self, error: MediaError) {
        let mut state = self.0.borrow_mut();
        state.playing = false;
        state.events.push_back(MediaEvent::Error(error));
    }

    pub fn time(&self) -> f64 {
        self.0.borrow().time
    }

    pub fn is_playing(&self) -> bool {
        self.0.borrow().playing
    }

    pub fn source(&self) -> Option<String> {
        self.0.borrow().source.clone()
    }

    pub fn rate(&self) -> f32 {
        self.0.borrow().rate
    }

    pub fn session(&self) -> Option<SessionMetadata> {
        self.0.borrow().session.clone()
    }
}

impl MediaElement for FakeMedia {
    fn set_source(&mut self, url: &str) {
        let mut state = self.0.borrow_mut();
        state.source = Some(url.to_string());
        state.duration = None;
        state.time = 0.0;
        state.playing = false;
        state.events.push_back(MediaEvent::LoadStart);
    }

    fn wait_for_metadata(&mut self) -> Result<f64, MediaError> {
        let mut state = self.0.borrow_mut();
        let url = state.source.clone().ok_or(MediaError::NoSource)?;
        match state.tracks.get(&url).copied() {
            Some(duration) => {
                state.duration = Some(duration);
                state.events.push_back(MediaEvent::MetadataLoaded { duration });
                state.events.push_back(MediaEvent::CanPlay);
                Ok(duration)
            }
            None => {
                let err = MediaError::Open {
                    url,
                    reason: "not found".into(),
                };
                state.events.push_back(MediaEvent::Error(err.clone()));
                Err(err)
            }
        }
    }

    fn play(&mut self) -> Result<(), MediaError> {
        let mut state = self.0.borrow_mut();
        let url = state.source.clone().ok_or(MediaError::NoSource)?;
        if state.duration.is_none() {
            return Err(MediaError::NoSource);
        }
        if state.broken_play.contains(&url) {
            return Err(MediaError::Output("device busy".into()));
        }
        if !state.playing {
            state.playing = true;
            state.events.push_back(MediaEvent::Play);
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.0.borrow_mut();
        if state.playing {
            state.playing = false;
            state.events.push_back(MediaEvent::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        !self.0.borrow().playing
    }

    fn current_time(&self) -> f64 {
        self.0.borrow().time
    }

    fn set_current_time(&mut self, seconds: f64) -> Result<(), MediaError> {
        let mut state = self.0.borrow_mut();
        let duration = state.duration.ok_or(MediaError::NoSource)?;
        state.time = seconds.clamp(0.0, duration);
        Ok(())
    }

    fn duration(&self) -> f64 {
        self.0.borrow().duration.unwrap_or(f64::NAN)
    }

    fn set_volume(&mut self, volume: f32) {
        self.0.borrow_mut().volume = volume;
    }

    fn volume(&self) -> f32 {
        self.0.borrow().volume
    }

    fn set_playback_rate(&mut self, rate: f32) {
        self.0.borrow_mut().rate = rate;
    }

    fn set_session_metadata(&mut self, metadata: &SessionMetadata) {
        self.0.borrow_mut().session = Some(metadata.clone());
    }

    fn clear_source(&mut self) {
        let mut state = self.0.borrow_mut();
        state.source = None;
        state.duration = None;
        state.time = 0.0;
        state.playing = false;
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        let mut state = self.0.borrow_mut();
        if let Some(duration) = state.duration {
            if state.playing && state.time >= duration {
                state.time = duration;
                state.playing = false;
                state.events.push_back(MediaEvent::Ended);
            }
        }
        state.events.drain(..).collect()
    }
}
