use std::time::Instant;

use crate::audio::EngineFactory;
use crate::config::AppConfig;
use crate::render::WaveformPainter;
use crate::store::{PlaybackState, PlaybackStore};
use crate::waveform::{RendererSignal, RendererStatus, WaveformRenderer};
use crate::Result;

/// Glues a [`WaveformRenderer`] to the shared [`PlaybackStore`].
///
/// Engine reports flow up into store mutations in [`pump`]; store values
/// flow down into renderer inputs in [`sync`]. The renderer's interaction
/// gate sits between the two so a scrub is not undone by the next tick.
///
/// [`pump`]: PlaybackCoordinator::pump
/// [`sync`]: PlaybackCoordinator::sync
pub struct PlaybackCoordinator<F: EngineFactory> {
    store: PlaybackStore,
    renderer: WaveformRenderer<F>,
}

impl<F: EngineFactory> PlaybackCoordinator<F> {
    pub fn new(store: PlaybackStore, factory: F, config: &AppConfig) -> Self {
        let renderer = WaveformRenderer::new(
            factory,
            config.waveform.clone(),
            config.player.interaction_debounce(),
        );
        Self { store, renderer }
    }

    pub fn store(&self) -> &PlaybackStore {
        &self.store
    }

    pub fn renderer(&self) -> &WaveformRenderer<F> {
        &self.renderer
    }

    /// Forwards a user gesture on the waveform.
    pub fn scrub(&mut self, fraction: f64, now: Instant) {
        self.renderer.scrub(fraction, now);
    }

    /// Applies everything the engine reported since the last call.
    ///
    /// The renderer is pointed at the store's current source first, so
    /// reports still queued by an engine for a track that has since been
    /// replaced are dropped with that engine.
    pub fn pump(&mut self, now: Instant) -> Result<()> {
        let state = self.store.snapshot()?;
        self.follow_source(&state);
        self.drain(now)
    }

    /// Relays the store's current values down to the renderer.
    pub fn sync(&mut self, now: Instant) -> Result<()> {
        let state = self.store.snapshot()?;

        self.follow_source(&state);
        if self.renderer.status() == RendererStatus::Failed && !state.load_failed {
            // Failure raised synchronously by `set_source`; surface it now.
            return self.drain(now);
        }

        self.renderer.set_playing(state.is_playing);
        self.renderer
            .sync_position(state.current_time, state.duration, now);
        Ok(())
    }

    /// One turn of the loop: engine reports up, store values down.
    pub fn step(&mut self, now: Instant) -> Result<()> {
        self.pump(now)?;
        self.sync(now)
    }

    pub fn view(&self, painter: &WaveformPainter) -> String {
        self.renderer.view(painter)
    }

    /// Releases the engine. The store is left as it is.
    pub fn unmount(&mut self) {
        self.renderer.unmount();
    }

    fn follow_source(&mut self, state: &PlaybackState) {
        self.renderer.set_source(state.current_src());
        if !state.load_failed {
            // The failed track was chosen again.
            self.renderer.retry();
        }
    }

    fn drain(&mut self, now: Instant) -> Result<()> {
        for signal in self.renderer.poll(now) {
            match signal {
                RendererSignal::Ready { duration } => self.store.set_duration(duration)?,
                RendererSignal::Interaction { new_time } => self.store.seek(new_time)?,
                RendererSignal::TimeUpdate { time } => self.store.advance_to(time)?,
                RendererSignal::Finished => self.store.track_ended()?,
                RendererSignal::LoadFailed { .. } => self.store.mark_load_failed()?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::audio::EngineEventKind;
    use crate::store::PlayerEvent;
    use crate::testing::{Call, EngineLog, FakeFactory};
    use crate::TrackRef;

    fn track(id: &str, duration: f64) -> TrackRef {
        TrackRef::new(id, id, "Artist", format!("/audio/{id}.mp3")).with_duration(duration)
    }

    fn coordinator(factory: FakeFactory) -> (PlaybackCoordinator<FakeFactory>, EngineLog) {
        let log = factory.log.clone();
        let coordinator = PlaybackCoordinator::new(PlaybackStore::new(), factory, &AppConfig::default());
        (coordinator, log)
    }

    fn loaded(duration: f64, t0: Instant) -> (PlaybackCoordinator<FakeFactory>, EngineLog) {
        let (mut coordinator, log) = coordinator(FakeFactory::default());
        coordinator.store().play_track(track("a", 0.0)).unwrap();
        coordinator.step(t0).unwrap();
        log.emit(log.latest(), EngineEventKind::Ready { duration });
        coordinator.step(t0).unwrap();
        (coordinator, log)
    }

    #[test]
    fn ready_sets_duration_and_plays_requested_track() {
        let t0 = Instant::now();
        let (coordinator, log) = loaded(180.0, t0);

        let state = coordinator.store().snapshot().unwrap();
        assert_eq!(state.duration, 180.0);
        assert!(coordinator.renderer().controls_visible());
        assert!(log.calls().contains(&Call::Play(log.latest())));
    }

    #[test]
    fn scrub_seeks_store_and_blocks_ticks_for_window() {
        let t0 = Instant::now();
        let (mut coordinator, log) = loaded(100.0, t0);
        let id = log.latest();

        coordinator.scrub(0.6, t0);
        coordinator.pump(t0).unwrap();
        assert_eq!(coordinator.store().snapshot().unwrap().current_time, 60.0);

        // An unrelated tick lands inside the window.
        coordinator.store().advance_to(20.0).unwrap();
        coordinator.sync(t0 + Duration::from_millis(40)).unwrap();
        assert_eq!(log.progress(id), 0.6);

        coordinator.store().advance_to(61.0).unwrap();
        coordinator.sync(t0 + Duration::from_millis(100)).unwrap();
        assert!((log.progress(id) - 0.61).abs() < 1e-9);
    }

    #[test]
    fn ticks_and_play_flag_reach_the_engine() {
        let t0 = Instant::now();
        let (mut coordinator, log) = loaded(50.0, t0);
        let id = log.latest();

        log.emit(id, EngineEventKind::TimeUpdate { time: 25.0 });
        coordinator.step(t0).unwrap();
        assert_eq!(coordinator.store().snapshot().unwrap().current_time, 25.0);
        assert_eq!(log.seeks(id), 1);

        coordinator.store().pause().unwrap();
        coordinator.step(t0).unwrap();
        assert!(log.calls().contains(&Call::Pause(id)));
    }

    #[test]
    fn switching_tracks_tears_down_once_before_creating() {
        let t0 = Instant::now();
        let (mut coordinator, log) = loaded(10.0, t0);
        let first = log.latest();

        coordinator.store().play_track(track("b", 0.0)).unwrap();
        coordinator.step(t0).unwrap();
        coordinator.step(t0).unwrap();
        let second = log.latest();
        assert_ne!(first, second);

        let calls = log.calls();
        let destroyed = calls.iter().position(|c| *c == Call::Destroy(first)).unwrap();
        let created = calls.iter().position(|c| *c == Call::Create(second)).unwrap();
        assert!(destroyed < created);
        assert_eq!(log.destroy_count(first), 1);
        assert_eq!(log.created().len(), 2);

        let state = coordinator.store().snapshot().unwrap();
        assert_eq!(state.current_track.unwrap().id, "b");
        assert_eq!(state.current_time, 0.0);
    }

    #[test]
    fn load_failure_marks_preview_unavailable() {
        let t0 = Instant::now();
        let (mut coordinator, log) = coordinator(FakeFactory::default());
        let events = coordinator.store().subscribe().unwrap();
        coordinator.store().play_track(track("a", 30.0)).unwrap();
        coordinator.step(t0).unwrap();

        log.emit(log.latest(), EngineEventKind::Error("unsupported codec".into()));
        coordinator.step(t0).unwrap();

        let state = coordinator.store().snapshot().unwrap();
        assert!(state.load_failed);
        assert!(!state.is_playing);
        assert_eq!(coordinator.renderer().status(), RendererStatus::Failed);
        assert!(events
            .drain()
            .contains(&PlayerEvent::LoadFailed { track_id: "a".into() }));
    }

    #[test]
    fn reports_queued_by_replaced_engine_do_not_reach_new_track() {
        let t0 = Instant::now();
        let (mut coordinator, log) = loaded(200.0, t0);
        let old = log.latest();

        log.emit(old, EngineEventKind::TimeUpdate { time: 42.0 });
        log.emit(old, EngineEventKind::Finished);
        coordinator.store().play_track(track("b", 180.0)).unwrap();
        coordinator.step(t0).unwrap();

        let state = coordinator.store().snapshot().unwrap();
        assert_eq!(state.current_track.as_ref().unwrap().id, "b");
        assert_eq!(state.current_time, 0.0);
        assert!(state.is_playing);
        assert_eq!(log.destroy_count(old), 1);

        let new = log.latest();
        assert_ne!(old, new);
        log.emit(new, EngineEventKind::Ready { duration: 180.0 });
        coordinator.step(t0).unwrap();
        assert_eq!(coordinator.store().snapshot().unwrap().current_time, 0.0);
        assert_eq!(log.seeks(new), 0);
        assert_eq!(log.progress(new), 0.0);
    }

    #[test]
    fn replaying_a_failed_track_loads_it_again() {
        let t0 = Instant::now();
        let (mut coordinator, log) = coordinator(FakeFactory::default());
        coordinator.store().play_track(track("a", 30.0)).unwrap();
        coordinator.step(t0).unwrap();
        let failed = log.latest();
        log.emit(failed, EngineEventKind::Error("timeout".into()));
        coordinator.step(t0).unwrap();
        coordinator.step(t0).unwrap();
        assert!(coordinator.store().snapshot().unwrap().load_failed);
        assert_eq!(log.created().len(), 1);

        coordinator.store().play_track(track("a", 30.0)).unwrap();
        coordinator.step(t0).unwrap();
        let fresh = log.latest();
        assert_ne!(failed, fresh);
        assert_eq!(coordinator.renderer().status(), RendererStatus::Loading);

        log.emit(fresh, EngineEventKind::Ready { duration: 30.0 });
        coordinator.step(t0).unwrap();
        let state = coordinator.store().snapshot().unwrap();
        assert!(state.is_playing);
        assert!(!state.load_failed);
        assert!(coordinator.renderer().controls_visible());
        assert!(log.calls().contains(&Call::Play(fresh)));
        assert_eq!(log.created().len(), 2);
    }

    #[test]
    fn failing_source_is_not_retried_without_a_new_request() {
        let t0 = Instant::now();
        let (mut coordinator, log) = coordinator(FakeFactory {
            fail_load: true,
            ..Default::default()
        });
        coordinator.store().play_track(track("a", 30.0)).unwrap();
        for _ in 0..3 {
            coordinator.step(t0).unwrap();
        }
        assert!(coordinator.store().snapshot().unwrap().load_failed);
        assert_eq!(log.created().len(), 1);

        coordinator.store().play_track(track("a", 30.0)).unwrap();
        for _ in 0..3 {
            coordinator.step(t0).unwrap();
        }
        assert!(coordinator.store().snapshot().unwrap().load_failed);
        assert_eq!(log.created().len(), 2);
    }

    #[test]
    fn synchronous_load_failure_is_surfaced_in_sync() {
        let t0 = Instant::now();
        let (mut coordinator, _log) = coordinator(FakeFactory {
            fail_load: true,
            ..Default::default()
        });
        coordinator.store().play_track(track("a", 30.0)).unwrap();
        coordinator.sync(t0).unwrap();

        assert!(coordinator.store().snapshot().unwrap().load_failed);
    }

    #[test]
    fn finished_advances_queue() {
        let t0 = Instant::now();
        let (mut coordinator, log) = coordinator(FakeFactory::default());
        coordinator
            .store()
            .play_collection(vec![track("a", 5.0), track("b", 5.0)], 0)
            .unwrap();
        coordinator.step(t0).unwrap();
        let first = log.latest();
        log.emit(first, EngineEventKind::Ready { duration: 5.0 });
        coordinator.step(t0).unwrap();

        log.emit(first, EngineEventKind::Finished);
        coordinator.step(t0).unwrap();

        assert!(coordinator.store().is_track_playing("b").unwrap());
        assert_eq!(coordinator.renderer().source(), Some("/audio/b.mp3"));
        assert_eq!(log.destroy_count(first), 1);
    }

    #[test]
    fn unmount_releases_engine_but_keeps_state() {
        let t0 = Instant::now();
        let (mut coordinator, log) = loaded(10.0, t0);
        let id = log.latest();

        coordinator.unmount();
        assert_eq!(log.destroy_count(id), 1);
        assert!(coordinator.store().is_track_active("a").unwrap());
        drop(coordinator);
        assert_eq!(log.destroy_count(id), 1);
    }
}
