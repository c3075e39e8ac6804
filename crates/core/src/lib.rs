//! Core library for the label audio preview player.
//!
//! A preview is three cooperating parts: a [`PlaybackStore`] holding the
//! one shared playback state, a [`WaveformRenderer`] wrapping a waveform
//! engine for the current source, and a [`PlaybackCoordinator`] that
//! moves engine reports into the store and store values back into the
//! renderer without the two fighting over the cursor.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod render;
pub mod settings;
pub mod store;
pub mod timeline;
pub mod track;
pub mod waveform;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::{PeakAnalyzer, WaveformPeaks};
pub use audio::{
    EngineEvent, EngineEventKind, EngineFactory, InstanceId, PeakEngine, PeakEngineFactory,
    WaveformEngine,
};
pub use config::{AppConfig, DecodeConfig, PlayerConfig, WaveformOptions};
pub use coordinator::PlaybackCoordinator;
pub use error::{PreviewError, Result};
pub use render::WaveformPainter;
pub use settings::{PlayerSettings, SettingsStore};
pub use store::{format_time, PlaybackState, PlaybackStore, PlayerEvent, Subscription, TrackQueue};
pub use timeline::{InteractionGuard, PlaybackClock};
pub use track::TrackRef;
pub use waveform::{RendererSignal, RendererStatus, WaveformRenderer};
