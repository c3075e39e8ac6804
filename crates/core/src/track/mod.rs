use serde::{Deserialize, Serialize};

/// Reference to a single previewable track.
///
/// `duration` is a hint in seconds taken from the catalog; the store
/// replaces it with the decoded length once the engine reports ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRef {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub src: String,
    #[serde(default)]
    pub artwork: Option<String>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub release_id: Option<String>,
    #[serde(default)]
    pub release_title: Option<String>,
}

impl TrackRef {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        src: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            src: src.into(),
            artwork: None,
            duration: 0.0,
            release_id: None,
            release_title: None,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = if seconds.is_finite() {
            seconds.max(0.0)
        } else {
            0.0
        };
        self
    }

    /// Builds a reference for a local file, using the file stem as title.
    pub fn from_path(path: &std::path::Path) -> Self {
        let src = path.to_string_lossy().into_owned();
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| src.clone());
        Self::new(src.clone(), title, "Unknown artist", src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_catalog_entry_with_defaults() {
        let json = r#"{"id":"t1","title":"Nachtfahrt","artist":"Kollektiv","src":"/audio/t1.mp3"}"#;
        let track: TrackRef = serde_json::from_str(json).unwrap();

        assert_eq!(track.id, "t1");
        assert_eq!(track.duration, 0.0);
        assert!(track.artwork.is_none());
    }

    #[test]
    fn rejects_negative_and_non_finite_duration_hints() {
        let track = TrackRef::new("a", "A", "B", "a.mp3").with_duration(-3.0);
        assert_eq!(track.duration, 0.0);

        let track = TrackRef::new("a", "A", "B", "a.mp3").with_duration(f64::NAN);
        assert_eq!(track.duration, 0.0);
    }

    #[test]
    fn titles_local_files_by_stem() {
        let track = TrackRef::from_path(std::path::Path::new("/music/demo take.wav"));
        assert_eq!(track.title, "demo take");
        assert_eq!(track.src, "/music/demo take.wav");
    }
}
