use anyhow::Context;
use eframe::egui::Color32;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{
    audio::AutoplayPolicy,
    disc::{POP_SECS, SPIN_PERIOD_SECS},
    drag::{DRAG_THRESHOLD, EDGE_INSET},
    playback::DEFAULT_VOLUME,
    theme::{parse_color, ACCENT},
    tracks::{default_playlist, Track, THEME_TRACK_NAME},
};

/// Stands in for the page-level theme track attribute.
pub const THEME_TRACK_ENV: &str = "MUSIC_DISC_THEME_TRACK";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub player: PlayerConfig,
    pub widget: WidgetConfig,
    pub animation: AnimationConfig,
    pub disc: DiscConfig,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::discover()?;
        if let Ok(locator) = env::var(THEME_TRACK_ENV) {
            if !locator.trim().is_empty() {
                config.player.theme_track = Some(locator);
            }
        }
        Ok(config)
    }

    fn discover() -> anyhow::Result<Self> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = env::current_dir() {
            candidates.push(current_dir.join("config.toml"));
            candidates.push(current_dir.join("config").join("config.toml"));
            candidates.push(current_dir.join("config").join("music_disc.toml"));
        }

        if let Ok(exe) = env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join("config.toml"));
                candidates.push(dir.join("config").join("config.toml"));
                candidates.push(dir.join("config").join("music_disc.toml"));
            }
        }

        for path in candidates {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Config::default())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml_str(&data)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml_str(data: &str) -> anyhow::Result<Self> {
        let doc: ConfigDocument = toml::from_str(data)?;
        Ok(doc.into())
    }
}

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub theme_track: Option<String>,
    pub theme_track_name: String,
    pub volume: f32,
    pub autoplay: AutoplayPolicy,
    pub tracks: Vec<Track>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            theme_track: None,
            theme_track_name: THEME_TRACK_NAME.to_owned(),
            volume: DEFAULT_VOLUME,
            autoplay: AutoplayPolicy::default(),
            tracks: default_playlist(),
        }
    }
}

impl PlayerConfig {
    pub fn theme_override(&self) -> Option<Track> {
        self.theme_track
            .as_ref()
            .map(|locator| Track::new(self.theme_track_name.clone(), locator.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct WidgetConfig {
    pub drag_threshold: f32,
    pub edge_inset: f32,
    pub disc_size: f32,
    pub menu_width: f32,
    pub menu_height: f32,
    pub start_left: f32,
    pub start_bottom: f32,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            drag_threshold: DRAG_THRESHOLD,
            edge_inset: EDGE_INSET,
            disc_size: 60.0,
            menu_width: 200.0,
            menu_height: 160.0,
            start_left: 20.0,
            start_bottom: 20.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnimationConfig {
    pub spin_period_secs: f32,
    pub pop_secs: f32,
    pub menu_transition_secs: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            spin_period_secs: SPIN_PERIOD_SECS,
            pop_secs: POP_SECS,
            menu_transition_secs: 0.4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscConfig {
    pub label_image: Option<PathBuf>,
    pub accent: Color32,
    pub swirl_strength: f32,
    pub label_ratio: f32,
}

impl Default for DiscConfig {
    fn default() -> Self {
        Self {
            label_image: None,
            accent: ACCENT,
            swirl_strength: 2.5,
            label_ratio: 10.0 / 30.0,
        }
    }
}

impl DiscConfig {
    pub fn swirl_strength(&self) -> f32 {
        self.swirl_strength.clamp(0.0, 10.0)
    }

    pub fn label_ratio(&self) -> f32 {
        self.label_ratio.clamp(0.1, 0.6)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    player: PlayerSection,
    #[serde(default)]
    widget: WidgetSection,
    #[serde(default)]
    animation: AnimationSection,
    #[serde(default)]
    disc: DiscSection,
}

impl From<ConfigDocument> for Config {
    fn from(value: ConfigDocument) -> Self {
        let player_defaults = PlayerConfig::default();
        let tracks = value
            .player
            .tracks
            .filter(|tracks| !tracks.is_empty())
            .map(|tracks| {
                tracks
                    .into_iter()
                    .map(|entry| Track::new(entry.name, entry.src))
                    .collect()
            })
            .unwrap_or(player_defaults.tracks);
        let player = PlayerConfig {
            theme_track: value.player.theme_track.filter(|s| !s.trim().is_empty()),
            theme_track_name: value
                .player
                .theme_track_name
                .unwrap_or(player_defaults.theme_track_name),
            volume: value
                .player
                .volume
                .unwrap_or(player_defaults.volume)
                .clamp(0.0, 1.0),
            autoplay: value.player.autoplay.unwrap_or_default(),
            tracks,
        };

        let w = WidgetConfig::default();
        let widget = WidgetConfig {
            drag_threshold: value.widget.drag_threshold.unwrap_or(w.drag_threshold),
            edge_inset: value.widget.edge_inset.unwrap_or(w.edge_inset),
            disc_size: value.widget.disc_size.unwrap_or(w.disc_size).max(16.0),
            menu_width: value.widget.menu_width.unwrap_or(w.menu_width),
            menu_height: value.widget.menu_height.unwrap_or(w.menu_height),
            start_left: value.widget.start_left.unwrap_or(w.start_left),
            start_bottom: value.widget.start_bottom.unwrap_or(w.start_bottom),
        };

        let a = AnimationConfig::default();
        let animation = AnimationConfig {
            spin_period_secs: value.animation.spin_period_secs.unwrap_or(a.spin_period_secs),
            pop_secs: value.animation.pop_secs.unwrap_or(a.pop_secs),
            menu_transition_secs: value
                .animation
                .menu_transition_secs
                .unwrap_or(a.menu_transition_secs),
        };

        let d = DiscConfig::default();
        let accent = match value.disc.accent.as_deref().map(parse_color) {
            Some(Ok(color)) => color,
            Some(Err(err)) => {
                tracing::warn!("ignoring disc accent: {err:#}");
                d.accent
            }
            None => d.accent,
        };
        let disc = DiscConfig {
            label_image: value.disc.label_image,
            accent,
            swirl_strength: value.disc.swirl_strength.unwrap_or(d.swirl_strength),
            label_ratio: value.disc.label_ratio.unwrap_or(d.label_ratio),
        };

        Config {
            player,
            widget,
            animation,
            disc,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PlayerSection {
    theme_track: Option<String>,
    theme_track_name: Option<String>,
    volume: Option<f32>,
    autoplay: Option<AutoplayPolicy>,
    tracks: Option<Vec<TrackEntry>>,
}

#[derive(Debug, Deserialize)]
struct TrackEntry {
    name: String,
    src: String,
}

#[derive(Debug, Default, Deserialize)]
struct WidgetSection {
    drag_threshold: Option<f32>,
    edge_inset: Option<f32>,
    disc_size: Option<f32>,
    menu_width: Option<f32>,
    menu_height: Option<f32>,
    start_left: Option<f32>,
    start_bottom: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct AnimationSection {
    spin_period_secs: Option<f32>,
    pop_secs: Option<f32>,
    menu_transition_secs: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscSection {
    label_image: Option<PathBuf>,
    accent: Option<String>,
    swirl_strength: Option<f32>,
    label_ratio: Option<f32>,
}
