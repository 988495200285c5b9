//! One player's lifecycle: loading, transport, progress sync and redraws.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::config::PlayerOptions;
use crate::error::{PlayerError, Result};
use crate::events::{EventBus, EventKind, EventSource, PlayerEvent, Subscription};
use crate::media::{MediaElement, MediaEvent, SessionMetadata};
use crate::peaks::{self, PeakSeries};
use crate::registry::{MountPoint, RegistryState};
use crate::render::{self, PixelSurface, WaveformStyle};
use crate::source::{self, AudioFetcher};
use crate::sync::{FrameHandle, FrameScheduler, PlaybackSync, SyncUpdate, format_time};

/// Opacity of the waveform after a media error.
pub const ERROR_OPACITY: f32 = 0.2;

/// Playback state owned by a controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub position_secs: f64,
    /// `None` until metadata is loaded.
    pub duration_secs: Option<f64>,
    pub progress: f64,
    pub is_playing: bool,
    pub is_loading: bool,
    pub has_error: bool,
}

impl PlaybackState {
    /// The progress fraction, once the duration is known.
    pub fn progress_fraction(&self) -> Option<f64> {
        self.duration_secs
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|_| self.progress)
    }
}

/// Everything around the waveform that a host displays.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub title: String,
    pub subtitle: Option<String>,
    pub current_time: String,
    pub total_time: String,
    pub bpm: Option<f32>,
    pub surface_opacity: f32,
    pub button_enabled: bool,
    pub error_visible: bool,
    pub loading_visible: bool,
}

impl Default for PlayerView {
    fn default() -> Self {
        Self {
            title: String::new(),
            subtitle: None,
            current_time: format_time(0.0),
            total_time: format_time(0.0),
            bpm: None,
            surface_opacity: 1.0,
            button_enabled: true,
            error_visible: false,
            loading_visible: false,
        }
    }
}

pub struct PlayerController {
    id: String,
    mount: String,
    options: PlayerOptions,
    media: Box<dyn MediaElement>,
    fetcher: Rc<dyn AudioFetcher>,
    scheduler: Box<dyn FrameScheduler>,
    registry: Weak<RefCell<RegistryState>>,
    sync: PlaybackSync,
    state: PlaybackState,
    peaks: PeakSeries,
    surface: PixelSurface,
    css_width: f32,
    device_pixel_ratio: f32,
    view: PlayerView,
    events: EventBus,
    init_frame: Option<FrameHandle>,
    observing_resize: bool,
    destroyed: bool,
}

impl std::fmt::Debug for PlayerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerController")
            .field("id", &self.id)
            .field("mount", &self.mount)
            .field("state", &self.state)
            .field("peaks", &self.peaks.len())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl PlayerController {
    pub(crate) fn new(
        id: String,
        mount: &MountPoint,
        options: PlayerOptions,
        mut media: Box<dyn MediaElement>,
        fetcher: Rc<dyn AudioFetcher>,
        mut scheduler: Box<dyn FrameScheduler>,
        registry: Weak<RefCell<RegistryState>>,
    ) -> Self {
        media.set_volume(options.volume);
        media.set_playback_rate(options.playback_rate);

        let view = PlayerView {
            subtitle: options.subtitle.clone(),
            ..PlayerView::default()
        };
        // sizing and the initial load wait for the host's first frame
        let init_frame = Some(scheduler.request_frame());

        let mut controller = Self {
            id,
            mount: mount.name.clone(),
            options,
            media,
            fetcher,
            scheduler,
            registry,
            sync: PlaybackSync::new(),
            state: PlaybackState::default(),
            peaks: PeakSeries::empty(),
            surface: PixelSurface::new(0, 0),
            css_width: mount.width,
            device_pixel_ratio: mount.device_pixel_ratio,
            view,
            events: EventBus::new(),
            init_frame,
            observing_resize: true,
            destroyed: false,
        };
        controller.resize_surface();
        controller
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    pub fn options(&self) -> &PlayerOptions {
        &self.options
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn peaks(&self) -> &PeakSeries {
        &self.peaks
    }

    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    pub fn view(&self) -> &PlayerView {
        &self.view
    }

    pub fn volume(&self) -> f32 {
        self.media.volume()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn observes_resize(&self) -> bool {
        self.observing_resize
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> Subscription
    where
        F: FnMut(&PlayerEvent, EventSource<'_>) + 'static,
    {
        self.events.subscribe(kind, listener)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.events.unsubscribe(subscription)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            Err(PlayerError::Destroyed(self.id.clone()))
        } else {
            Ok(())
        }
    }

    fn emit(&mut self, event: PlayerEvent) {
        let source = EventSource {
            id: &self.id,
            state: &self.state,
        };
        self.events.emit(&event, source);
    }

    // ============================================
    // Loading
    // ============================================

    /// Load `url`, resolving once a drawable peak series is ready.
    ///
    /// Fails only when the media element can't load the source. Waveform
    /// generation problems fall back to a placeholder series.
    pub fn load(&mut self, url: &str) -> Result<()> {
        self.ensure_alive()?;
        log::info!("{}: loading {url}", self.id);

        if self.state.is_playing {
            self.pause();
        }
        self.sync.stop(self.scheduler.as_mut());
        self.sync.reset();
        self.set_loading(true);
        self.state.progress = 0.0;
        self.state.position_secs = 0.0;
        self.state.duration_secs = None;
        self.state.has_error = false;
        self.view.error_visible = false;
        self.view.surface_opacity = 1.0;
        self.view.button_enabled = true;
        self.view.current_time = format_time(0.0);
        self.view.bpm = None;

        self.media.set_source(url);
        let duration = match self.media.wait_for_metadata() {
            Ok(duration) => duration,
            Err(err) => {
                log::error!("{}: Failed to load audio: {err}", self.id);
                self.dispatch_media_events();
                if !self.state.has_error {
                    self.on_error(PlayerError::MediaLoad(err.clone()));
                }
                self.set_loading(false);
                return Err(PlayerError::MediaLoad(err));
            }
        };
        self.dispatch_media_events();
        self.on_metadata_loaded(duration);

        self.view.title = self
            .options
            .title
            .clone()
            .unwrap_or_else(|| title_from_url(url));

        self.peaks = match self.options.waveform.clone() {
            Some(data) => peaks::parse_peaks(&data),
            None => self.generate_peaks(url),
        };

        if self.options.enable_media_session {
            self.media.set_session_metadata(&SessionMetadata {
                title: self.view.title.clone(),
                artist: self.options.subtitle.clone(),
            });
        }

        self.redraw();
        self.emit(PlayerEvent::Load);
        self.set_loading(false);
        Ok(())
    }

    fn generate_peaks(&mut self, url: &str) -> PeakSeries {
        let samples = self.options.samples;
        let show_bpm = self.options.show_bpm;
        match source::generate_waveform(self.fetcher.as_ref(), url, samples, show_bpm) {
            Ok(data) => {
                log::debug!("{}: waveform spans {}", self.id, format_time(data.duration_secs));
                self.view.bpm = data.bpm;
                data.peaks
            }
            Err(err) => {
                log::warn!("{}: Using placeholder waveform: {err}", self.id);
                peaks::placeholder_peaks(samples, &mut rand::rng())
            }
        }
    }

    /// Replace the peak series without reloading the media.
    pub fn set_waveform_data(&mut self, data: &str) {
        if self.destroyed {
            return;
        }
        self.peaks = peaks::parse_peaks(data);
        self.redraw();
    }

    fn set_loading(&mut self, loading: bool) {
        self.state.is_loading = loading;
        self.view.loading_visible = loading;
    }

    fn on_metadata_loaded(&mut self, duration: f64) {
        self.state.duration_secs = Some(duration);
        if self.options.show_time {
            self.view.total_time = format_time(duration);
        }
    }

    // ============================================
    // Media events
    // ============================================

    /// Apply every lifecycle event the media element reported since the last call.
    pub fn dispatch_media_events(&mut self) {
        for event in self.media.poll_events() {
            log::debug!("{}: media event {event:?}", self.id);
            match event {
                MediaEvent::LoadStart => self.set_loading(true),
                MediaEvent::MetadataLoaded { duration } => self.on_metadata_loaded(duration),
                MediaEvent::CanPlay => self.set_loading(false),
                MediaEvent::Play => self.on_play(),
                MediaEvent::Pause => self.on_pause(),
                MediaEvent::Ended => self.on_ended(),
                MediaEvent::Error(err) => self.on_error(PlayerError::MediaLoad(err)),
            }
        }
    }

    fn on_play(&mut self) {
        self.state.is_playing = true;
        self.sync.start(self.scheduler.as_mut());
        self.emit(PlayerEvent::Play);
    }

    fn on_pause(&mut self) {
        self.state.is_playing = false;
        self.sync.stop(self.scheduler.as_mut());
        self.emit(PlayerEvent::Pause);
    }

    fn on_ended(&mut self) {
        self.state.progress = 0.0;
        self.state.position_secs = 0.0;
        if let Err(err) = self.media.set_current_time(0.0) {
            log::warn!("{}: rewind after end failed: {err}", self.id);
        }
        self.sync.reset();
        self.redraw();
        self.view.current_time = format_time(0.0);
        self.clear_playing_marker();

        self.on_pause();
        self.emit(PlayerEvent::End);
    }

    fn on_error(&mut self, error: PlayerError) {
        log::error!("{}: Audio error: {error}", self.id);
        self.state.has_error = true;
        self.set_loading(false);
        self.view.error_visible = true;
        self.view.surface_opacity = ERROR_OPACITY;
        self.view.button_enabled = false;
        self.emit(PlayerEvent::Error(error));
    }

    // ============================================
    // Frames
    // ============================================

    /// Handle an animation frame fired by the host.
    ///
    /// Returns `true` when the frame belonged to this player.
    pub fn on_animation_frame(&mut self, handle: FrameHandle) -> bool {
        if self.destroyed {
            return false;
        }
        if self.init_frame == Some(handle) {
            self.init_frame = None;
            self.initial_load();
            return true;
        }
        if self.sync.pending() != Some(handle) {
            return false;
        }

        // an Ended event cancels the frame, making it stale below
        self.dispatch_media_events();
        let position = self.media.current_time();
        let duration = self.media.duration();
        if let Some(update) = self.sync.on_frame(
            handle,
            self.scheduler.as_mut(),
            position,
            duration,
            self.state.is_playing,
        ) {
            self.apply_update(update);
        }
        true
    }

    fn initial_load(&mut self) {
        self.resize_surface();
        let Some(url) = self.options.url.clone() else {
            return;
        };
        // load logs its own failure
        if self.load(&url).is_ok() && self.options.autoplay {
            if let Err(err) = self.play() {
                log::warn!("{}: autoplay failed: {err}", self.id);
            }
        }
    }

    fn apply_update(&mut self, update: SyncUpdate) {
        self.state.position_secs = update.position;
        self.state.progress = update.fraction;
        self.redraw();
        if self.options.show_time {
            self.view.current_time = update.elapsed;
        }
        self.emit(PlayerEvent::TimeUpdate {
            position: update.position,
            duration: update.duration,
        });
    }

    // ============================================
    // Drawing
    // ============================================

    /// Repaint the surface from the cached peaks and current progress.
    pub fn redraw(&mut self) {
        if self.destroyed || self.peaks.is_empty() {
            return;
        }
        render::draw(
            &mut self.surface,
            &self.peaks,
            self.state.progress,
            &self.options.render_config(),
        );
        if self.options.show_markers && !self.options.markers.is_empty() {
            let times: Vec<f64> = self.options.markers.iter().map(|m| m.time).collect();
            let duration = self.state.duration_secs.unwrap_or(0.0);
            render::draw_markers(
                &mut self.surface,
                &times,
                duration,
                self.options.text_secondary_color,
            );
        }
    }

    fn resize_surface(&mut self) {
        let dpr = self.device_pixel_ratio.max(0.1);
        let width = (self.css_width.max(0.0) * dpr).round() as u32;
        let height = (self.options.height * dpr).round() as u32;
        self.surface.resize(width, height);
        self.redraw();
    }

    /// The drawing area changed size; recompute the backing raster and redraw.
    ///
    /// The cached peaks are reused as-is.
    pub fn resize(&mut self, css_width: f32, device_pixel_ratio: f32) {
        if self.destroyed {
            return;
        }
        self.css_width = css_width;
        self.device_pixel_ratio = device_pixel_ratio;
        self.resize_surface();
    }

    pub fn set_style(&mut self, style: WaveformStyle) {
        self.options.set_style(style);
        self.redraw();
    }

    /// Seek to the position under a click `x` CSS pixels from the surface's left edge.
    pub fn handle_click(&mut self, x: f32) {
        if self.destroyed || self.state.progress_fraction().is_none() || self.css_width <= 0.0 {
            return;
        }
        let fraction = (f64::from(x) / f64::from(self.css_width)).clamp(0.0, 1.0);
        if let Err(err) = self.seek_to_percent(fraction) {
            log::warn!("{}: seek failed: {err}", self.id);
        }
    }

    // ============================================
    // Public API
    // ============================================

    pub fn play(&mut self) -> Result<()> {
        self.ensure_alive()?;

        if let Some(registry) = self.registry.upgrade() {
            let other = {
                let registry = registry.borrow();
                registry
                    .currently_playing
                    .as_ref()
                    .filter(|id| **id != self.id)
                    .and_then(|id| registry.instances.get(id).cloned())
            };
            if self.options.single_play {
                if let Some(other) = other {
                    match other.try_borrow_mut() {
                        Ok(mut other) => other.pause(),
                        Err(_) => log::warn!("{}: could not pause the other player", self.id),
                    }
                }
            }
            registry.borrow_mut().currently_playing = Some(self.id.clone());
        }

        if let Err(err) = self.media.play() {
            log::warn!("{}: play failed: {err}", self.id);
            self.clear_playing_marker();
            return Err(err.into());
        }
        self.dispatch_media_events();
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.destroyed {
            return;
        }
        self.clear_playing_marker();
        if !self.media.is_paused() {
            self.media.pause();
        }
        self.dispatch_media_events();
        // the element may have stopped on its own without reporting a pause
        if self.state.is_playing || self.sync.pending().is_some() {
            let was_playing = self.state.is_playing;
            self.state.is_playing = false;
            self.sync.stop(self.scheduler.as_mut());
            if was_playing {
                self.emit(PlayerEvent::Pause);
            }
        }
    }

    pub fn toggle_play(&mut self) -> Result<()> {
        if self.state.is_playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    fn clear_playing_marker(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.borrow_mut();
            if registry.currently_playing.as_deref() == Some(self.id.as_str()) {
                registry.currently_playing = None;
            }
        }
    }

    /// Seek to `fraction` of the duration, clamped to `[0, 1]`, and redraw at once.
    pub fn seek_to_percent(&mut self, fraction: f64) -> Result<()> {
        self.ensure_alive()?;
        let Some(duration) = self.state.duration_secs.filter(|d| d.is_finite() && *d > 0.0) else {
            return Ok(());
        };
        let target = duration * render::clamp_progress(fraction);
        self.seek_position(target, duration)
    }

    /// Seek to `seconds`, clamped to the track, and redraw at once.
    pub fn seek_to(&mut self, seconds: f64) -> Result<()> {
        self.ensure_alive()?;
        let Some(duration) = self.state.duration_secs.filter(|d| d.is_finite() && *d > 0.0) else {
            return Ok(());
        };
        let target = if seconds.is_nan() {
            0.0
        } else {
            seconds.clamp(0.0, duration)
        };
        self.seek_position(target, duration)
    }

    fn seek_position(&mut self, target: f64, duration: f64) -> Result<()> {
        self.media.set_current_time(target)?;
        if let Some(update) = self.sync.force(target, duration) {
            self.apply_update(update);
        }
        Ok(())
    }

    pub fn set_volume(&mut self, level: f32) {
        if self.destroyed {
            return;
        }
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        self.options.volume = level;
        self.media.set_volume(level);
    }

    pub fn set_playback_rate(&mut self, rate: f32) {
        if self.destroyed || rate.is_nan() {
            return;
        }
        let rate = rate.clamp(0.25, 4.0);
        self.options.playback_rate = rate;
        self.media.set_playback_rate(rate);
    }

    pub fn playback_rate(&self) -> f32 {
        self.options.playback_rate
    }

    /// Tear the player down. Calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        log::info!("{}: destroying", self.id);
        self.pause();
        self.sync.stop(self.scheduler.as_mut());
        if let Some(handle) = self.init_frame.take() {
            self.scheduler.cancel_frame(handle);
        }
        self.observing_resize = false;
        self.events.clear();

        if let Some(registry) = self.registry.upgrade() {
            // the caller holds its own handle, so this never drops the last one
            let removed = registry.borrow_mut().instances.remove(&self.id);
            drop(removed);
        }

        self.media.clear_source();
        self.surface.resize(0, 0);
        self.peaks = PeakSeries::empty();
        self.state.is_playing = false;
        self.view = PlayerView::default();
        self.destroyed = true;
    }
}

/// A display title from the last path segment of `url`.
pub fn title_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
    let stem = match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    };
    let title = percent_decode(stem).replace(['_', '-'], " ");
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title
    }
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(byte) = text
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
