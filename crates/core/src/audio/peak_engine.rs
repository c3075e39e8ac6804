use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use super::{decode, EngineEvent, EngineEventKind, EngineFactory, InstanceId, WaveformEngine};
use crate::analysis::WaveformPeaks;
use crate::config::{DecodeConfig, WaveformOptions};
use crate::timeline::PlaybackClock;
use crate::Result;

/// Headless waveform engine backed by Symphonia.
///
/// Decoding runs on a background thread. Its outcome is collected in
/// [`WaveformEngine::poll`], so every event leaves the engine on the
/// owner's thread and nothing is emitted once the engine is destroyed.
/// Playback is simulated on a [`PlaybackClock`]; no audio device is
/// opened.
pub struct PeakEngine {
    instance: InstanceId,
    options: WaveformOptions,
    limits: DecodeConfig,
    events: Sender<EngineEvent>,
    loading: Option<Receiver<Result<Option<WaveformPeaks>>>>,
    cancel: Arc<AtomicBool>,
    peaks: Option<WaveformPeaks>,
    clock: PlaybackClock,
    playing: bool,
    destroyed: bool,
}

impl PeakEngine {
    pub fn new(
        instance: InstanceId,
        options: WaveformOptions,
        limits: DecodeConfig,
        events: Sender<EngineEvent>,
    ) -> Self {
        Self {
            instance,
            options,
            limits,
            events,
            loading: None,
            cancel: Arc::new(AtomicBool::new(false)),
            peaks: None,
            clock: PlaybackClock::default(),
            playing: false,
            destroyed: false,
        }
    }

    fn duration(&self) -> f64 {
        self.peaks
            .as_ref()
            .map(|peaks| peaks.duration_seconds)
            .unwrap_or(0.0)
    }

    fn emit(&self, kind: EngineEventKind) {
        if self.destroyed {
            return;
        }
        // The owner may already have dropped its receiver during teardown.
        let _ = self.events.send(EngineEvent {
            instance: self.instance,
            kind,
        });
    }

    fn collect_load(&mut self) {
        let Some(rx) = &self.loading else {
            return;
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Ok(None),
        };
        self.loading = None;

        match outcome {
            Ok(Some(peaks)) => {
                let duration = peaks.duration_seconds;
                self.peaks = Some(peaks);
                self.emit(EngineEventKind::Ready { duration });
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(instance = %self.instance, error = %err, "waveform load failed");
                self.emit(EngineEventKind::Error(err.to_string()));
            }
        }
    }
}

impl WaveformEngine for PeakEngine {
    fn load(&mut self, src: &str) -> Result<()> {
        self.cancel.store(true, Ordering::Release);
        self.cancel = Arc::new(AtomicBool::new(false));
        self.peaks = None;
        self.clock.reset();

        let (tx, rx) = crossbeam_channel::bounded(1);
        let src = src.to_string();
        let options = self.options.clone();
        let limits = self.limits.clone();
        let cancel = self.cancel.clone();

        thread::Builder::new()
            .name(format!("decode-{}", self.instance))
            .spawn(move || {
                let outcome = decode::decode_peaks(&src, &options, &limits, &cancel);
                let _ = tx.send(outcome);
            })?;

        self.loading = Some(rx);
        Ok(())
    }

    fn play(&mut self) {
        if self.peaks.is_some() {
            self.playing = true;
        }
    }

    fn pause(&mut self) {
        self.playing = false;
        self.clock.stop();
    }

    fn seek_to(&mut self, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.clock.set(fraction * self.duration());
    }

    fn progress(&self) -> f64 {
        let duration = self.duration();
        if duration > 0.0 {
            (self.clock.time_seconds / duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn peaks(&self) -> Option<&WaveformPeaks> {
        self.peaks.as_ref()
    }

    fn interact(&mut self, fraction: f64) {
        if self.peaks.is_none() {
            return;
        }
        self.seek_to(fraction);
        let new_time = self.clock.time_seconds;
        self.emit(EngineEventKind::Interaction { new_time });
    }

    fn poll(&mut self, now: Instant) {
        if self.destroyed {
            return;
        }
        self.collect_load();

        if !self.playing {
            return;
        }
        if !self.clock.is_running() {
            self.clock.start(now);
            return;
        }
        if let Some(time) = self.clock.poll(now) {
            let duration = self.duration();
            if time >= duration {
                self.clock.set(duration);
                self.pause();
                self.emit(EngineEventKind::TimeUpdate { time: duration });
                self.emit(EngineEventKind::Finished);
            } else {
                self.emit(EngineEventKind::TimeUpdate { time });
            }
        }
    }

    fn destroy(&mut self) {
        self.cancel.store(true, Ordering::Release);
        self.loading = None;
        self.playing = false;
        self.clock.stop();
        self.destroyed = true;
    }
}

impl Drop for PeakEngine {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
    }
}

/// Builds [`PeakEngine`]s with shared decode limits.
#[derive(Debug, Clone, Default)]
pub struct PeakEngineFactory {
    limits: DecodeConfig,
}

impl PeakEngineFactory {
    pub fn new(limits: DecodeConfig) -> Self {
        Self { limits }
    }
}

impl EngineFactory for PeakEngineFactory {
    fn create(
        &self,
        instance: InstanceId,
        options: &WaveformOptions,
        events: Sender<EngineEvent>,
    ) -> Box<dyn WaveformEngine> {
        Box::new(PeakEngine::new(
            instance,
            options.clone(),
            self.limits.clone(),
            events,
        ))
    }
}
