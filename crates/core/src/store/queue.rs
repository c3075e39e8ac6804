use serde::{Deserialize, Serialize};

use crate::TrackRef;

/// Ordered list of tracks lined up for playback. Ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackQueue {
    tracks: Vec<TrackRef>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[TrackRef] {
        &self.tracks
    }

    pub fn first(&self) -> Option<&TrackRef> {
        self.tracks.first()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|track| track.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Puts `track` at the head, moving it there if already queued.
    pub fn promote(&mut self, track: TrackRef) {
        if let Some(index) = self.position(&track.id) {
            self.tracks.remove(index);
        }
        self.tracks.insert(0, track);
    }

    /// Appends `track` unless a track with the same id is queued.
    pub fn push_unique(&mut self, track: TrackRef) -> bool {
        if self.contains(&track.id) {
            return false;
        }
        self.tracks.push(track);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<TrackRef> {
        let index = self.position(id)?;
        Some(self.tracks.remove(index))
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Track after `id`, wrapping to the head.
    pub fn after(&self, id: &str) -> Option<&TrackRef> {
        let index = self.position(id)?;
        self.tracks.get((index + 1) % self.tracks.len())
    }

    /// Track before `id`, wrapping to the tail.
    pub fn before(&self, id: &str) -> Option<&TrackRef> {
        let index = self.position(id)?;
        let len = self.tracks.len();
        self.tracks.get((index + len - 1) % len)
    }
}
