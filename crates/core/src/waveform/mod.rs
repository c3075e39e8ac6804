//! Waveform view bound to one engine instance at a time.

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::audio::{EngineEvent, EngineEventKind, EngineFactory, InstanceId, WaveformEngine};
use crate::config::WaveformOptions;
use crate::render::WaveformPainter;
use crate::timeline::InteractionGuard;

/// Cursor moves smaller than this are not worth a seek.
const POSITION_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererStatus {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

/// What the renderer reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum RendererSignal {
    Ready { duration: f64 },
    Interaction { new_time: f64 },
    TimeUpdate { time: f64 },
    Finished,
    LoadFailed { reason: String },
}

struct EngineSlot {
    id: InstanceId,
    engine: Box<dyn WaveformEngine>,
    events: Receiver<EngineEvent>,
}

/// Renders one audio source and forwards user scrubs.
///
/// The renderer owns at most one engine. Switching the source or
/// unmounting destroys the old engine before anything else happens, and
/// dropping the renderer does the same.
pub struct WaveformRenderer<F: EngineFactory> {
    factory: F,
    options: WaveformOptions,
    slot: Option<EngineSlot>,
    source: Option<String>,
    status: RendererStatus,
    guard: InteractionGuard,
    wants_playing: bool,
    engine_playing: bool,
    failure: Option<String>,
    pending: Vec<RendererSignal>,
}

impl<F: EngineFactory> WaveformRenderer<F> {
    pub fn new(factory: F, options: WaveformOptions, debounce: Duration) -> Self {
        Self {
            factory,
            options,
            slot: None,
            source: None,
            status: RendererStatus::Unloaded,
            guard: InteractionGuard::new(debounce),
            wants_playing: false,
            engine_playing: false,
            failure: None,
            pending: Vec::new(),
        }
    }

    pub fn status(&self) -> RendererStatus {
        self.status
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn instance(&self) -> Option<InstanceId> {
        self.slot.as_ref().map(|slot| slot.id)
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Controls (play, scrub) only make sense once the engine is ready.
    pub fn controls_visible(&self) -> bool {
        self.status == RendererStatus::Ready
    }

    pub fn is_interacting(&self, now: Instant) -> bool {
        self.guard.is_active(now)
    }

    pub fn progress(&self) -> f64 {
        self.slot
            .as_ref()
            .map(|slot| slot.engine.progress())
            .unwrap_or(0.0)
    }

    /// Points the renderer at `src`. The same source again is a no-op;
    /// anything else tears down the current engine first.
    pub fn set_source(&mut self, src: Option<&str>) {
        if self.source.as_deref() == src {
            return;
        }
        self.release();
        self.source = src.map(str::to_string);
        self.failure = None;
        self.engine_playing = false;
        self.guard.clear();

        let Some(src) = src else {
            self.status = RendererStatus::Unloaded;
            return;
        };

        let id = InstanceId::next();
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut engine = self.factory.create(id, &self.options, tx);
        tracing::debug!(instance = %id, src, "created waveform engine");

        match engine.load(src) {
            Ok(()) => {
                self.slot = Some(EngineSlot {
                    id,
                    engine,
                    events: rx,
                });
                self.status = RendererStatus::Loading;
            }
            Err(err) => {
                engine.destroy();
                let reason = err.to_string();
                self.fail(&reason);
                self.pending.push(RendererSignal::LoadFailed { reason });
            }
        }
    }

    /// Loads the failed source again on a fresh engine. Ignored unless
    /// the renderer is `Failed` and its failure has been collected by
    /// [`poll`](Self::poll).
    pub fn retry(&mut self) -> bool {
        if self.status != RendererStatus::Failed || !self.pending.is_empty() {
            return false;
        }
        let Some(src) = self.source.take() else {
            return false;
        };
        tracing::debug!(src = %src, "retrying waveform load");
        self.set_source(Some(&src));
        true
    }

    /// Releases the engine and forgets the source.
    pub fn unmount(&mut self) {
        self.set_source(None);
    }

    /// Play flag from the owner. Applied now when ready, otherwise
    /// remembered until the engine reports ready.
    pub fn set_playing(&mut self, playing: bool) {
        self.wants_playing = playing;
        self.apply_playing();
    }

    /// Pushes an externally driven position to the engine cursor.
    ///
    /// Dropped (returns `false`) while a user scrub is in flight; the
    /// scrub's own seek supersedes it.
    pub fn sync_position(&mut self, current_time: f64, duration: f64, now: Instant) -> bool {
        if self.guard.is_active(now) {
            tracing::trace!(current_time, "position update dropped during interaction");
            return false;
        }
        if self.status != RendererStatus::Ready {
            return false;
        }
        let Some(slot) = self.slot.as_mut() else {
            return false;
        };
        let fraction = if duration > 0.0 && current_time.is_finite() {
            (current_time / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        if (slot.engine.progress() - fraction).abs() > POSITION_EPSILON {
            slot.engine.seek_to(fraction);
        }
        true
    }

    /// User gesture on the waveform at `fraction` of its width.
    pub fn scrub(&mut self, fraction: f64, now: Instant) {
        if self.status != RendererStatus::Ready {
            return;
        }
        if let Some(slot) = self.slot.as_mut() {
            self.guard.mark(now);
            slot.engine.interact(fraction);
        }
    }

    /// Lets the engine run and collects what it reported.
    pub fn poll(&mut self, now: Instant) -> Vec<RendererSignal> {
        let mut signals = std::mem::take(&mut self.pending);

        let events: Vec<EngineEvent> = match self.slot.as_mut() {
            Some(slot) => {
                slot.engine.poll(now);
                slot.events.try_iter().collect()
            }
            None => Vec::new(),
        };

        for event in events {
            if let Some(signal) = self.handle_event(event, now) {
                signals.push(signal);
            }
        }
        signals
    }

    /// Translates one engine event. Events from any instance other than
    /// the current one are dropped.
    pub fn handle_event(&mut self, event: EngineEvent, now: Instant) -> Option<RendererSignal> {
        let current = self.instance();
        if current != Some(event.instance) {
            tracing::debug!(instance = %event.instance, "discarding event from stale engine");
            return None;
        }

        match event.kind {
            EngineEventKind::Ready { duration } => {
                if self.status != RendererStatus::Loading {
                    return None;
                }
                self.status = RendererStatus::Ready;
                self.apply_playing();
                Some(RendererSignal::Ready { duration })
            }
            EngineEventKind::Interaction { new_time } => {
                self.guard.mark(now);
                Some(RendererSignal::Interaction { new_time })
            }
            EngineEventKind::TimeUpdate { time } => Some(RendererSignal::TimeUpdate { time }),
            EngineEventKind::Finished => {
                self.engine_playing = false;
                Some(RendererSignal::Finished)
            }
            EngineEventKind::Error(reason) => {
                self.release();
                self.fail(&reason);
                Some(RendererSignal::LoadFailed { reason })
            }
        }
    }

    /// Draws the current state as one text line.
    pub fn view(&self, painter: &WaveformPainter) -> String {
        match (self.status, self.slot.as_ref()) {
            (RendererStatus::Ready, Some(slot)) => match slot.engine.peaks() {
                Some(peaks) => painter.paint(peaks, slot.engine.progress()),
                None => painter.placeholder(),
            },
            (RendererStatus::Failed, _) => painter.unavailable(),
            _ => painter.placeholder(),
        }
    }

    fn apply_playing(&mut self) {
        if self.status != RendererStatus::Ready || self.wants_playing == self.engine_playing {
            return;
        }
        let Some(slot) = self.slot.as_mut() else {
            return;
        };
        if self.wants_playing {
            slot.engine.play();
        } else {
            slot.engine.pause();
        }
        self.engine_playing = self.wants_playing;
    }

    fn fail(&mut self, reason: &str) {
        tracing::warn!(src = self.source.as_deref(), reason, "waveform unavailable");
        self.status = RendererStatus::Failed;
        self.failure = Some(reason.to_string());
    }

    fn release(&mut self) {
        if let Some(mut slot) = self.slot.take() {
            slot.engine.destroy();
            tracing::debug!(instance = %slot.id, "released waveform engine");
        }
        self.engine_playing = false;
        if self.status != RendererStatus::Failed {
            self.status = RendererStatus::Unloaded;
        }
    }
}

impl<F: EngineFactory> Drop for WaveformRenderer<F> {
    fn drop(&mut self) {
        self.release();
    }
}
