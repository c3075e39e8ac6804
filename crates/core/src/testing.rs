//! Scripted engine for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::Sender;

use crate::analysis::WaveformPeaks;
use crate::audio::{EngineEvent, EngineEventKind, EngineFactory, InstanceId, WaveformEngine};
use crate::config::WaveformOptions;
use crate::{PreviewError, Result};

#[path = "../tests/helpers/wav.rs"]
pub mod wav;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(InstanceId),
    Load(InstanceId, String),
    Play(InstanceId),
    Pause(InstanceId),
    Seek(InstanceId, f64),
    Destroy(InstanceId),
}

#[derive(Debug, Default)]
struct Shared {
    calls: Vec<Call>,
    senders: HashMap<InstanceId, Sender<EngineEvent>>,
    progress: HashMap<InstanceId, f64>,
    durations: HashMap<InstanceId, f64>,
    created: Vec<InstanceId>,
}

/// Records every engine call and lets tests speak for the engines.
#[derive(Debug, Clone, Default)]
pub struct EngineLog {
    shared: Arc<Mutex<Shared>>,
}

impl EngineLog {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn created(&self) -> Vec<InstanceId> {
        self.lock().created.clone()
    }

    pub fn latest(&self) -> InstanceId {
        *self.lock().created.last().expect("no engine created yet")
    }

    pub fn progress(&self, id: InstanceId) -> f64 {
        self.lock().progress.get(&id).copied().unwrap_or(0.0)
    }

    pub fn destroy_count(&self, id: InstanceId) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| **call == Call::Destroy(id))
            .count()
    }

    pub fn seeks(&self, id: InstanceId) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::Seek(seen, _) if *seen == id))
            .count()
    }

    /// Sends `kind` as if engine `id` produced it.
    pub fn emit(&self, id: InstanceId, kind: EngineEventKind) {
        let mut shared = self.lock();
        if let EngineEventKind::Ready { duration } = kind {
            shared.durations.insert(id, duration);
        }
        if let Some(tx) = shared.senders.get(&id) {
            let _ = tx.send(EngineEvent { instance: id, kind });
        }
    }

    fn record(&self, call: Call) {
        self.lock().calls.push(call);
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeFactory {
    pub log: EngineLog,
    pub fail_load: bool,
}

impl EngineFactory for FakeFactory {
    fn create(
        &self,
        instance: InstanceId,
        _options: &WaveformOptions,
        events: Sender<EngineEvent>,
    ) -> Box<dyn WaveformEngine> {
        {
            let mut shared = self.log.lock();
            shared.calls.push(Call::Create(instance));
            shared.senders.insert(instance, events);
            shared.created.push(instance);
        }
        Box::new(FakeEngine {
            id: instance,
            log: self.log.clone(),
            fail_load: self.fail_load,
            peaks: WaveformPeaks {
                sample_rate: 1,
                duration_seconds: 1.0,
                bars: vec![0.5; 4],
            },
        })
    }
}

struct FakeEngine {
    id: InstanceId,
    log: EngineLog,
    fail_load: bool,
    peaks: WaveformPeaks,
}

impl WaveformEngine for FakeEngine {
    fn load(&mut self, src: &str) -> Result<()> {
        self.log.record(Call::Load(self.id, src.to_string()));
        if self.fail_load {
            return Err(PreviewError::decode(src, "scripted failure"));
        }
        Ok(())
    }

    fn play(&mut self) {
        self.log.record(Call::Play(self.id));
    }

    fn pause(&mut self) {
        self.log.record(Call::Pause(self.id));
    }

    fn seek_to(&mut self, fraction: f64) {
        self.log.record(Call::Seek(self.id, fraction));
        self.log.lock().progress.insert(self.id, fraction.clamp(0.0, 1.0));
    }

    fn progress(&self) -> f64 {
        self.log.progress(self.id)
    }

    fn peaks(&self) -> Option<&WaveformPeaks> {
        Some(&self.peaks)
    }

    fn interact(&mut self, fraction: f64) {
        let duration = {
            let mut shared = self.log.lock();
            shared.progress.insert(self.id, fraction);
            shared.durations.get(&self.id).copied().unwrap_or(0.0)
        };
        self.log.emit(
            self.id,
            EngineEventKind::Interaction {
                new_time: fraction * duration,
            },
        );
    }

    fn destroy(&mut self) {
        let mut shared = self.log.lock();
        shared.calls.push(Call::Destroy(self.id));
        shared.senders.remove(&self.id);
    }
}
