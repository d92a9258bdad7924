//! Per-source playback parameters and the playlist file that carries them.
//!
//! Timing arrives from the outside (CLI flags, playlist JSON) as plain
//! integers where a negative value is a sentinel: `loops = -1` means loop
//! forever, `anim_delay_ms = -1` means "use the delay stored with each
//! frame". [`RawParams`] is that surface; it is converted once into an
//! immutable [`PlaybackParams`] that uses `Option` instead of sentinels.
//!
//! ## Rust concepts
//! - `serde::Deserialize` with `#[serde(default)]` for optional JSON fields
//! - `From` conversions between the raw surface and the typed value

use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timing configuration for one source. Built once at load time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackParams {
    /// How long an animation may run; `None` runs until the loop budget ends.
    pub anim_duration: Option<Duration>,
    /// How long a still image stays up.
    pub wait: Duration,
    /// Fixed inter-frame delay replacing the one stored in the stream.
    pub anim_delay_override: Option<Duration>,
    /// Number of passes through an animation; `None` is unbounded.
    pub loops: Option<u32>,
    /// Swap only on every Nth panel refresh.
    pub vsync_multiple: u32,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        RawParams::default().into()
    }
}

/// Integer configuration surface with negative sentinels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawParams {
    /// Animation duration cap in milliseconds; negative = no cap.
    pub duration_ms: i64,
    /// Still image wait time in milliseconds.
    pub wait_ms: i64,
    /// Inter-frame delay override in milliseconds; negative = embedded delay.
    pub anim_delay_ms: i64,
    /// Loop count; negative = infinite.
    pub loops: i64,
    pub vsync_multiple: u32,
}

impl Default for RawParams {
    fn default() -> Self {
        Self {
            duration_ms: -1,
            wait_ms: 1500,
            anim_delay_ms: -1,
            loops: -1,
            vsync_multiple: 1,
        }
    }
}

impl From<RawParams> for PlaybackParams {
    fn from(raw: RawParams) -> Self {
        let non_negative_ms = |ms: i64| u64::try_from(ms).ok().map(Duration::from_millis);
        Self {
            anim_duration: non_negative_ms(raw.duration_ms),
            wait: non_negative_ms(raw.wait_ms).unwrap_or_default(),
            anim_delay_override: non_negative_ms(raw.anim_delay_ms),
            loops: (raw.loops >= 0).then(|| u32::try_from(raw.loops).unwrap_or(u32::MAX)),
            vsync_multiple: raw.vsync_multiple.max(1),
        }
    }
}

impl RawParams {
    /// Apply a playlist entry's overrides on top of these defaults.
    pub fn with_overrides(self, e: &PlaylistEntry) -> Self {
        Self {
            duration_ms: e.duration_ms.unwrap_or(self.duration_ms),
            wait_ms: e.wait_ms.unwrap_or(self.wait_ms),
            anim_delay_ms: e.anim_delay_ms.unwrap_or(self.anim_delay_ms),
            loops: e.loops.unwrap_or(self.loops),
            vsync_multiple: e.vsync_multiple.unwrap_or(self.vsync_multiple),
        }
    }
}

// ── Playlist ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaylistEntry {
    /// Image, animation, or `.stream` file.
    pub path: PathBuf,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub wait_ms: Option<i64>,
    #[serde(default)]
    pub anim_delay_ms: Option<i64>,
    #[serde(default)]
    pub loops: Option<i64>,
    #[serde(default)]
    pub vsync_multiple: Option<u32>,
}

/// A JSON playlist:
///
/// ```json
/// { "sources": [ { "path": "nyan.gif", "loops": 3 }, { "path": "logo.png", "wait_ms": 5000 } ] }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Playlist {
    pub sources: Vec<PlaylistEntry>,
}

impl Playlist {
    /// Read a playlist; relative entry paths resolve against its directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut playlist: Playlist =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or(Path::new(""));
        for entry in &mut playlist.sources {
            if entry.path.is_relative() {
                entry.path = base.join(&entry.path);
            }
        }
        Ok(playlist)
    }

    /// Resolve every entry against the command-line defaults.
    pub fn resolve(&self, defaults: RawParams) -> Vec<(PathBuf, PlaybackParams)> {
        self.sources
            .iter()
            .map(|e| (e.path.clone(), defaults.with_overrides(e).into()))
            .collect()
    }
}
