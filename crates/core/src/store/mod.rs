//! Shared playback state.
//!
//! [`PlaybackStore`] is a cheap, cloneable handle: every clone sees and
//! mutates the same state. Surfaces that only reflect playback read
//! [`PlaybackStore::snapshot`]; anything that wants to start, stop or
//! move playback goes through the mutators.

use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::config::PlayerConfig;
use crate::settings::{PlayerSettings, SettingsStore};
use crate::{PreviewError, Result, TrackRef};

mod queue;

pub use queue::TrackQueue;

/// Point-in-time copy of the playback state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_track: Option<TrackRef>,
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f32,
    pub muted: bool,
    pub queue: TrackQueue,
    /// The current track could not be loaded; preview unavailable.
    pub load_failed: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_track: None,
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: PlayerSettings::default().volume,
            muted: false,
            queue: TrackQueue::new(),
            load_failed: false,
        }
    }
}

impl PlaybackState {
    /// Position as a fraction of the duration, `0` when unknown.
    pub fn fraction(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn current_src(&self) -> Option<&str> {
        self.current_track.as_ref().map(|track| track.src.as_str())
    }

    fn is_current(&self, id: &str) -> bool {
        self.current_track
            .as_ref()
            .map(|track| track.id == id)
            .unwrap_or(false)
    }

    fn clamp_time(&self, time: f64) -> f64 {
        if !time.is_finite() {
            return 0.0;
        }
        time.clamp(0.0, self.duration.max(0.0))
    }

    /// Makes `track` current without touching the queue order.
    fn load(&mut self, track: TrackRef) {
        self.duration = track.duration;
        self.current_track = Some(track);
        self.current_time = 0.0;
        self.is_playing = true;
        self.load_failed = false;
    }

    fn unload(&mut self) {
        self.current_track = None;
        self.is_playing = false;
        self.current_time = 0.0;
        self.duration = 0.0;
        self.load_failed = false;
    }
}

/// Notification about a playback change, mainly for analytics.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    TrackStarted { track: TrackRef },
    Paused { track_id: String },
    Resumed { track_id: String },
    Seeked { track_id: String, time: f64 },
    Skipped { from: Option<String>, to: String },
    Completed { track_id: String },
    LoadFailed { track_id: String },
    Stopped,
}

/// Receiving end of [`PlaybackStore::subscribe`]. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: Receiver<PlayerEvent>,
}

impl Subscription {
    /// Everything delivered so far.
    pub fn drain(&self) -> Vec<PlayerEvent> {
        self.rx.try_iter().collect()
    }
}

#[derive(Debug)]
struct Inner {
    state: PlaybackState,
    subscribers: Vec<Sender<PlayerEvent>>,
    settings: Option<SettingsStore>,
}

impl Inner {
    fn publish(&mut self, event: PlayerEvent) {
        log_event(&event);
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn persist_settings(&self) {
        let Some(store) = &self.settings else {
            return;
        };
        let settings = PlayerSettings {
            volume: self.state.volume,
            muted: self.state.muted,
        };
        if let Err(err) = store.save(&settings) {
            tracing::warn!(path = ?store.path(), error = %err, "failed to persist player settings");
        }
    }

    fn current_id(&self) -> Option<String> {
        self.state.current_track.as_ref().map(|track| track.id.clone())
    }

    fn play_track(&mut self, track: TrackRef) {
        let keep_duration = self.state.is_current(&track.id) && self.state.duration > 0.0;
        let loaded_duration = self.state.duration;

        self.state.queue.promote(track.clone());
        self.state.load(track.clone());
        if keep_duration {
            self.state.duration = loaded_duration;
        }
        self.publish(PlayerEvent::TrackStarted { track });
    }

    fn pause(&mut self) {
        let Some(id) = self.current_id() else {
            return;
        };
        if self.state.is_playing {
            self.state.is_playing = false;
            self.publish(PlayerEvent::Paused { track_id: id });
        }
    }

    fn resume(&mut self) {
        let Some(id) = self.current_id() else {
            return;
        };
        if !self.state.is_playing && !self.state.load_failed {
            self.state.is_playing = true;
            self.publish(PlayerEvent::Resumed { track_id: id });
        }
    }

    fn toggle_play(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.resume();
        }
    }

    /// Moves to the queue neighbour picked by `pick`. Fewer than two
    /// queued tracks, or a current track outside the queue, is a no-op.
    fn skip(&mut self, pick: impl Fn(&TrackQueue, &str) -> Option<TrackRef>) -> bool {
        if self.state.queue.len() <= 1 {
            return false;
        }
        let Some(from) = self.current_id() else {
            return false;
        };
        let Some(next) = pick(&self.state.queue, &from) else {
            return false;
        };
        let to = next.id.clone();
        self.state.load(next);
        self.publish(PlayerEvent::Skipped {
            from: Some(from),
            to,
        });
        true
    }
}

/// Handle to the single playback state shared by all surfaces.
#[derive(Debug, Clone)]
pub struct PlaybackStore {
    shared: Arc<Mutex<Inner>>,
}

impl Default for PlaybackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackStore {
    pub fn new() -> Self {
        Self::with_state(PlaybackState::default(), None)
    }

    /// Builds a store from configuration, restoring persisted volume and
    /// mute preferences when a settings path is configured.
    pub fn from_config(config: &PlayerConfig) -> Result<Self> {
        let mut state = PlaybackState {
            volume: config.default_volume.clamp(0.0, 1.0),
            ..Default::default()
        };

        let settings = config.settings_path.as_ref().map(SettingsStore::new);
        if let Some(store) = &settings {
            if let Some(saved) = store.load()? {
                state.volume = saved.volume;
                state.muted = saved.muted;
                tracing::debug!(volume = saved.volume, muted = saved.muted, "restored player settings");
            }
        }

        Ok(Self::with_state(state, settings))
    }

    fn with_state(state: PlaybackState, settings: Option<SettingsStore>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Inner {
                state,
                subscribers: Vec::new(),
                settings,
            })),
        }
    }

    pub fn snapshot(&self) -> Result<PlaybackState> {
        Ok(self.lock()?.state.clone())
    }

    pub fn subscribe(&self) -> Result<Subscription> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.lock()?.subscribers.push(tx);
        Ok(Subscription { rx })
    }

    /// Makes `track` current and starts it from the beginning.
    pub fn play_track(&self, track: TrackRef) -> Result<()> {
        self.lock()?.play_track(track);
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.lock()?.pause();
        Ok(())
    }

    /// Resumes the current track. Ignored without a track or after the
    /// track failed to load.
    pub fn resume(&self) -> Result<()> {
        self.lock()?.resume();
        Ok(())
    }

    pub fn toggle_play(&self) -> Result<()> {
        self.lock()?.toggle_play();
        Ok(())
    }

    /// Moves to `time` seconds, clamped to `[0, duration]`.
    pub fn seek(&self, time: f64) -> Result<()> {
        let mut inner = self.lock()?;
        let Some(id) = inner.current_id() else {
            return Ok(());
        };
        let time = inner.state.clamp_time(time);
        inner.state.current_time = time;
        inner.publish(PlayerEvent::Seeked { track_id: id, time });
        Ok(())
    }

    /// Records the duration reported by the loaded audio.
    pub fn set_duration(&self, seconds: f64) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.state.current_track.is_none() {
            return Ok(());
        }
        inner.state.duration = if seconds.is_finite() {
            seconds.max(0.0)
        } else {
            0.0
        };
        inner.state.current_time = inner.state.clamp_time(inner.state.current_time);
        Ok(())
    }

    /// Periodic position update from the engine.
    pub fn advance_to(&self, time: f64) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.state.current_track.is_some() {
            inner.state.current_time = inner.state.clamp_time(time);
        }
        Ok(())
    }

    pub fn mark_load_failed(&self) -> Result<()> {
        let mut inner = self.lock()?;
        let Some(id) = inner.current_id() else {
            return Ok(());
        };
        inner.state.load_failed = true;
        inner.state.is_playing = false;
        inner.publish(PlayerEvent::LoadFailed { track_id: id });
        Ok(())
    }

    /// The current track played to the end: advance through the queue
    /// or stop and rewind.
    pub fn track_ended(&self) -> Result<()> {
        let mut inner = self.lock()?;
        let Some(id) = inner.current_id() else {
            return Ok(());
        };
        inner.publish(PlayerEvent::Completed { track_id: id });

        if !inner.skip(|queue, id| queue.after(id).cloned()) {
            inner.state.is_playing = false;
            inner.state.current_time = 0.0;
        }
        Ok(())
    }

    pub fn play_next(&self) -> Result<()> {
        self.lock()?.skip(|queue, id| queue.after(id).cloned());
        Ok(())
    }

    pub fn play_previous(&self) -> Result<()> {
        self.lock()?.skip(|queue, id| queue.before(id).cloned());
        Ok(())
    }

    pub fn add_to_queue(&self, track: TrackRef) -> Result<()> {
        self.lock()?.state.queue.push_unique(track);
        Ok(())
    }

    /// Removes a queued track. Removing the current track switches to
    /// the new queue head, or clears the player when nothing is left.
    pub fn remove_from_queue(&self, id: &str) -> Result<()> {
        let mut inner = self.lock()?;
        inner.state.queue.remove(id);
        if !inner.state.is_current(id) {
            return Ok(());
        }

        match inner.state.queue.first().cloned() {
            Some(head) => {
                let was_playing = inner.state.is_playing;
                let to = head.id.clone();
                inner.state.load(head);
                inner.state.is_playing = was_playing;
                inner.publish(PlayerEvent::Skipped {
                    from: Some(id.to_string()),
                    to,
                });
            }
            None => {
                inner.state.unload();
                inner.publish(PlayerEvent::Stopped);
            }
        }
        Ok(())
    }

    pub fn clear_queue(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.state.queue.clear();
        inner.state.unload();
        inner.publish(PlayerEvent::Stopped);
        Ok(())
    }

    /// Queues `tracks` and plays the one at `start_index`.
    pub fn play_collection(&self, tracks: Vec<TrackRef>, start_index: usize) -> Result<()> {
        if start_index >= tracks.len() {
            return Ok(());
        }
        let mut tracks = tracks;
        let first = tracks.remove(start_index);

        let mut inner = self.lock()?;
        for track in tracks {
            inner.state.queue.push_unique(track);
        }
        inner.play_track(first);
        Ok(())
    }

    /// Toggles `track` when it is current, otherwise starts it.
    pub fn toggle_track(&self, track: TrackRef) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.state.is_current(&track.id) {
            inner.toggle_play();
        } else {
            inner.play_track(track);
        }
        Ok(())
    }

    /// Sets the volume, clamped to `[0, 1]`. Zero mutes, anything above
    /// zero unmutes.
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if volume.is_nan() {
            return Err(PreviewError::InvalidInput("volume must be a number"));
        }
        let mut inner = self.lock()?;
        let volume = volume.clamp(0.0, 1.0);
        inner.state.volume = volume;
        if volume > 0.0 && inner.state.muted {
            inner.state.muted = false;
        } else if volume == 0.0 && !inner.state.muted {
            inner.state.muted = true;
        }
        inner.persist_settings();
        Ok(())
    }

    pub fn toggle_mute(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.state.muted = !inner.state.muted;
        inner.persist_settings();
        Ok(())
    }

    /// Volume actually applied to output, zero while muted.
    pub fn effective_volume(&self) -> Result<f32> {
        let inner = self.lock()?;
        Ok(if inner.state.muted {
            0.0
        } else {
            inner.state.volume
        })
    }

    /// Progress in percent, `0` when the duration is unknown.
    pub fn progress_percent(&self) -> Result<f64> {
        Ok(self.lock()?.state.fraction() * 100.0)
    }

    pub fn is_track_playing(&self, id: &str) -> Result<bool> {
        let inner = self.lock()?;
        Ok(inner.state.is_current(id) && inner.state.is_playing)
    }

    pub fn is_track_active(&self, id: &str) -> Result<bool> {
        Ok(self.lock()?.state.is_current(id))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.shared
            .lock()
            .map_err(|_| PreviewError::msg("playback state has been poisoned"))
    }
}

/// Formats seconds as `M:SS`. Non-finite input renders as `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn log_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::TrackStarted { track } => tracing::info!(
            event = "play_track",
            track_id = %track.id,
            title = %track.title,
            artist = %track.artist,
            release_id = track.release_id.as_deref(),
        ),
        PlayerEvent::Paused { track_id } => {
            tracing::info!(event = "pause_track", %track_id)
        }
        PlayerEvent::Resumed { track_id } => {
            tracing::info!(event = "resume_track", %track_id)
        }
        PlayerEvent::Seeked { track_id, time } => {
            tracing::debug!(event = "seek", %track_id, time)
        }
        PlayerEvent::Skipped { from, to } => {
            tracing::info!(event = "skip_track", from = from.as_deref(), %to)
        }
        PlayerEvent::Completed { track_id } => {
            tracing::info!(event = "complete_track", %track_id)
        }
        PlayerEvent::LoadFailed { track_id } => {
            tracing::warn!(event = "load_failed", %track_id, "preview unavailable")
        }
        PlayerEvent::Stopped => tracing::info!(event = "stop"),
    }
}
