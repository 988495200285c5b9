//! Player options and their resolution.
//!
//! Options are layered: built-in defaults, then declared attributes (the config
//! file in the terminal front end), then explicit constructor options. Bar width
//! and spacing fall back to the chosen style's geometry unless a layer sets them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::peaks::DEFAULT_SAMPLES;
use crate::render::{RenderConfig, WaveformStyle};
use crate::theme::{self, ColorPreset, Rgba};

pub const DEFAULT_HEIGHT: f32 = 60.0;

/// A labelled point in the track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Seconds from the start.
    pub time: f64,
    pub label: String,
}

/// Fully resolved options for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOptions {
    pub url: Option<String>,
    pub height: f32,
    pub samples: usize,
    pub waveform_style: WaveformStyle,
    pub bar_width: f32,
    pub bar_spacing: f32,
    pub waveform_color: Rgba,
    pub progress_color: Rgba,
    pub button_color: Rgba,
    pub text_color: Rgba,
    pub text_secondary_color: Rgba,
    pub background_color: Rgba,
    pub autoplay: bool,
    pub show_time: bool,
    pub show_bpm: bool,
    pub single_play: bool,
    pub enable_media_session: bool,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub markers: Vec<Marker>,
    pub show_markers: bool,
    /// Explicit peak data, as a JSON array or comma-separated list.
    pub waveform: Option<String>,
    pub playback_rate: f32,
    pub volume: f32,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        PartialOptions::default().resolve_over(&PartialOptions::default())
    }
}

/// One layer of options; unset fields defer to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartialOptions {
    pub url: Option<String>,
    pub height: Option<f32>,
    pub samples: Option<usize>,
    pub waveform_style: Option<WaveformStyle>,
    pub bar_width: Option<f32>,
    pub bar_spacing: Option<f32>,
    /// `dark` or `light`; unknown names fall back to dark.
    pub color_preset: Option<String>,
    pub waveform_color: Option<Rgba>,
    pub progress_color: Option<Rgba>,
    pub button_color: Option<Rgba>,
    pub text_color: Option<Rgba>,
    pub text_secondary_color: Option<Rgba>,
    pub background_color: Option<Rgba>,
    pub autoplay: Option<bool>,
    pub show_time: Option<bool>,
    #[serde(rename = "showBPM", alias = "showBpm")]
    pub show_bpm: Option<bool>,
    pub single_play: Option<bool>,
    pub enable_media_session: Option<bool>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub markers: Option<Vec<Marker>>,
    pub show_markers: Option<bool>,
    pub waveform: Option<String>,
    pub playback_rate: Option<f32>,
    pub volume: Option<f32>,
}

impl PartialOptions {
    /// Fields set in `self` win over fields set in `lower`.
    pub fn or(self, lower: PartialOptions) -> PartialOptions {
        PartialOptions {
            url: self.url.or(lower.url),
            height: self.height.or(lower.height),
            samples: self.samples.or(lower.samples),
            waveform_style: self.waveform_style.or(lower.waveform_style),
            bar_width: self.bar_width.or(lower.bar_width),
            bar_spacing: self.bar_spacing.or(lower.bar_spacing),
            color_preset: self.color_preset.or(lower.color_preset),
            waveform_color: self.waveform_color.or(lower.waveform_color),
            progress_color: self.progress_color.or(lower.progress_color),
            button_color: self.button_color.or(lower.button_color),
            text_color: self.text_color.or(lower.text_color),
            text_secondary_color: self.text_secondary_color.or(lower.text_secondary_color),
            background_color: self.background_color.or(lower.background_color),
            autoplay: self.autoplay.or(lower.autoplay),
            show_time: self.show_time.or(lower.show_time),
            show_bpm: self.show_bpm.or(lower.show_bpm),
            single_play: self.single_play.or(lower.single_play),
            enable_media_session: self.enable_media_session.or(lower.enable_media_session),
            title: self.title.or(lower.title),
            subtitle: self.subtitle.or(lower.subtitle),
            markers: self.markers.or(lower.markers),
            show_markers: self.show_markers.or(lower.show_markers),
            waveform: self.waveform.or(lower.waveform),
            playback_rate: self.playback_rate.or(lower.playback_rate),
            volume: self.volume.or(lower.volume),
        }
    }

    /// Resolve `self` (explicit options) over `declared` and the defaults.
    pub fn resolve_over(self, declared: &PartialOptions) -> PlayerOptions {
        let merged = self.or(declared.clone());
        let style = merged.waveform_style.unwrap_or_default();
        let (style_width, style_spacing) = style.default_geometry();
        let preset: ColorPreset = merged
            .color_preset
            .as_deref()
            .and_then(theme::preset)
            .unwrap_or(theme::DARK);

        PlayerOptions {
            url: merged.url.filter(|url| !url.is_empty()),
            height: merged.height.filter(|h| *h > 0.0).unwrap_or(DEFAULT_HEIGHT),
            samples: merged.samples.unwrap_or(DEFAULT_SAMPLES).max(1),
            waveform_style: style,
            bar_width: merged.bar_width.unwrap_or(style_width).max(0.1),
            bar_spacing: merged.bar_spacing.unwrap_or(style_spacing).max(0.0),
            waveform_color: merged.waveform_color.unwrap_or(preset.waveform),
            progress_color: merged.progress_color.unwrap_or(preset.progress),
            button_color: merged.button_color.unwrap_or(preset.button),
            text_color: merged.text_color.unwrap_or(preset.text),
            text_secondary_color: merged.text_secondary_color.unwrap_or(preset.text_secondary),
            background_color: merged.background_color.unwrap_or(preset.background),
            autoplay: merged.autoplay.unwrap_or(false),
            show_time: merged.show_time.unwrap_or(true),
            show_bpm: merged.show_bpm.unwrap_or(false),
            single_play: merged.single_play.unwrap_or(true),
            enable_media_session: merged.enable_media_session.unwrap_or(true),
            title: merged.title,
            subtitle: merged.subtitle,
            markers: merged.markers.unwrap_or_default(),
            show_markers: merged.show_markers.unwrap_or(true),
            waveform: merged.waveform,
            playback_rate: merged.playback_rate.unwrap_or(1.0).clamp(0.25, 4.0),
            volume: merged.volume.unwrap_or(1.0).clamp(0.0, 1.0),
        }
    }
}

impl PlayerOptions {
    /// Explicit options over the defaults, with no declared layer.
    pub fn resolve(explicit: PartialOptions) -> Self {
        explicit.resolve_over(&PartialOptions::default())
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            style: self.waveform_style,
            bar_width: self.bar_width,
            bar_spacing: self.bar_spacing,
            waveform_color: self.waveform_color,
            progress_color: self.progress_color,
            button_color: self.button_color,
        }
    }

    /// Switch style, adopting the new style's geometry.
    pub fn set_style(&mut self, style: WaveformStyle) {
        self.waveform_style = style;
        (self.bar_width, self.bar_spacing) = style.default_geometry();
    }
}

/// Get the default config file path
///
/// Returns: `{config_dir}/waveplayer/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("waveplayer")
        .join("config.toml")
}

pub fn parse_options(text: &str) -> Result<PartialOptions, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Read one options layer from a TOML file.
pub fn read_options(path: &Path) -> Result<PartialOptions, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_options(&text)
}

/// Load declared options, falling back to an empty layer.
///
/// A missing file is normal; an unreadable or invalid one is logged.
pub fn load_options(path: &Path) -> PartialOptions {
    log::info!("load_options: Loading from {:?}", path);
    if !path.exists() {
        log::info!("load_options: Config file doesn't exist, using defaults");
        return PartialOptions::default();
    }
    match read_options(path) {
        Ok(options) => options,
        Err(e) => {
            log::warn!("load_options: {}, using defaults", e);
            PartialOptions::default()
        }
    }
}
