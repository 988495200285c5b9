//! An embeddable audio player core: waveform peaks, rendering, progress sync and
//! a registry of player instances.
//!
//! The platform is reached through three seams: [`MediaElement`] for playback,
//! [`AudioFetcher`] for raw bytes and [`FrameScheduler`] for animation frames.
//! Hosts create players through a [`PlayerManager`] and call
//! [`PlayerManager::tick`] once per display refresh.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod events;
pub mod media;
pub mod peaks;
pub mod player;
pub mod registry;
pub mod render;
pub mod source;
pub mod sync;
pub mod theme;

#[cfg(test)]
mod testing;

pub use config::{Marker, PartialOptions, PlayerOptions};
pub use error::{ConfigError, MediaError, PlayerError, WaveformError};
pub use events::{EventKind, PlayerEvent, Subscription};
pub use media::{MediaElement, MediaEvent, RodioMedia, SessionMetadata};
pub use peaks::{PeakSeries, extract_peaks};
pub use player::{PlaybackState, PlayerController, PlayerView};
pub use registry::{MountPoint, PlayerHandle, PlayerManager};
pub use render::{PixelSurface, RenderConfig, Surface, WaveformStyle};
pub use source::{AudioFetcher, DefaultFetcher, generate_peaks};
pub use sync::{FrameHandle, FrameQueue, FrameScheduler, PlaybackSync, format_time};
pub use theme::Rgba;
