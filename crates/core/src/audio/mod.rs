//! Waveform engine abstraction.
//!
//! An engine renders one audio source and reports back through
//! [`EngineEvent`]s sent on a channel handed to it at creation. Every
//! event carries the [`InstanceId`] of the engine that produced it so
//! owners can drop callbacks from instances they already tore down.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_channel::Sender;

use crate::analysis::WaveformPeaks;
use crate::config::WaveformOptions;
use crate::Result;

pub mod decode;
mod peak_engine;

pub use peak_engine::{PeakEngine, PeakEngineFactory};

/// Identity of one engine instance. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub instance: InstanceId,
    pub kind: EngineEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    /// The source finished loading; `duration` is in seconds.
    Ready { duration: f64 },
    /// The user scrubbed the waveform to `new_time` seconds.
    Interaction { new_time: f64 },
    /// Periodic position update while playing.
    TimeUpdate { time: f64 },
    /// Playback reached the end of the source.
    Finished,
    /// Loading failed. The engine is unusable afterwards.
    Error(String),
}

/// Operations a waveform engine exposes to its owner.
pub trait WaveformEngine: Send {
    /// Starts loading `src`. Completion is reported as an event.
    fn load(&mut self, src: &str) -> Result<()>;

    fn play(&mut self);

    fn pause(&mut self);

    /// Moves the visual cursor (and playback position) to `fraction` of
    /// the source length. Values outside `[0, 1]` are clamped.
    fn seek_to(&mut self, fraction: f64);

    /// Current cursor position in `[0, 1]`.
    fn progress(&self) -> f64;

    fn peaks(&self) -> Option<&WaveformPeaks>;

    /// Feeds a user gesture (click or drag release) at `fraction`. The
    /// engine moves its cursor and reports an `Interaction` event.
    fn interact(&mut self, fraction: f64);

    /// Gives the engine a chance to advance time and emit events.
    fn poll(&mut self, _now: Instant) {}

    /// Releases the engine. Further events from it must not be sent.
    fn destroy(&mut self);
}

/// Creates engines bound to an event channel.
pub trait EngineFactory {
    fn create(
        &self,
        instance: InstanceId,
        options: &WaveformOptions,
        events: Sender<EngineEvent>,
    ) -> Box<dyn WaveformEngine>;
}
