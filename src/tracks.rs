use std::fmt;

/// Display name used when the first entry is replaced by a page theme track.
pub const THEME_TRACK_NAME: &str = "Chủ Đề";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub display_name: String,
    pub audio_locator: String,
}

impl Track {
    pub fn new(display_name: impl Into<String>, audio_locator: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            audio_locator: audio_locator.into(),
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.display_name, self.audio_locator)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackError {
    #[error("track index {index} out of range (registry holds {len} tracks)")]
    OutOfRange { index: usize, len: usize },
}

/// Built-in playlist: ocean piano, nature, guitar.
pub fn default_playlist() -> Vec<Track> {
    vec![
        Track::new(
            "Thư Giãn",
            "https://cdn.pixabay.com/audio/2022/08/02/audio_884fe92c21.mp3",
        ),
        Track::new(
            "Sóng Biển",
            "https://cdn.pixabay.com/audio/2022/03/24/audio_34b6b663b9.mp3",
        ),
        Track::new(
            "Acoustic",
            "https://cdn.pixabay.com/audio/2023/01/01/audio_8162594411.mp3",
        ),
    ]
}

/// Ordered, fixed list of playable entries.
///
/// The first entry may be swapped for a theme track until the registry is
/// sealed, which happens as soon as playback has been requested.
#[derive(Debug, Clone)]
pub struct TrackRegistry {
    tracks: Vec<Track>,
    sealed: bool,
}

impl TrackRegistry {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            sealed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Track, TrackError> {
        self.tracks.get(index).ok_or(TrackError::OutOfRange {
            index,
            len: self.tracks.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Replaces the first entry. Returns `false` when the registry is sealed
    /// or empty and nothing changed.
    pub fn override_first(
        &mut self,
        locator: impl Into<String>,
        display_name: impl Into<String>,
    ) -> bool {
        if self.is_sealed() {
            tracing::debug!("ignoring first-track override, playback already started");
            return false;
        }
        let Some(first) = self.tracks.first_mut() else {
            return false;
        };
        first.audio_locator = locator.into();
        first.display_name = display_name.into();
        true
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}

impl Default for TrackRegistry {
    fn default() -> Self {
        Self::new(default_playlist())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_reports_out_of_range() {
        let registry = TrackRegistry::default();
        assert_eq!(registry.len(), 3);
        assert!(registry.get(2).is_ok());
        assert_eq!(
            registry.get(3),
            Err(TrackError::OutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn override_replaces_first_entry_only() {
        let mut registry = TrackRegistry::default();
        assert!(registry.override_first("file:///tmp/theme.mp3", THEME_TRACK_NAME));

        let first = registry.get(0).unwrap();
        assert_eq!(first.audio_locator, "file:///tmp/theme.mp3");
        assert_eq!(first.display_name, THEME_TRACK_NAME);
        assert_eq!(registry.get(1).unwrap().display_name, "Sóng Biển");
    }

    #[test]
    fn override_is_ignored_once_sealed() {
        let mut registry = TrackRegistry::default();
        registry.seal();
        assert!(!registry.override_first("late.mp3", "Late"));
        assert_eq!(registry.get(0).unwrap().display_name, "Thư Giãn");
    }

    #[test]
    fn override_on_empty_registry_is_noop() {
        let mut registry = TrackRegistry::new(Vec::new());
        assert!(registry.is_empty());
        assert!(!registry.override_first("a.mp3", "A"));
    }
}
