//! A loaded input: its frame stream plus the timing it should play with.
//!
//! Sources are built once, before playback starts, and dropped at shutdown.
//! Images and animations are decoded into an in-memory stream; `.stream`
//! files produced earlier with `--output` are replayed straight from disk.

use crate::PanelConfig;
use crate::error::LoadError;
use crate::frame::FrameBuffer;
use crate::media::is_stream_file;
use crate::normalize::{StoreOptions, load_and_scale, store_sequence};
use crate::params::PlaybackParams;
use crate::stream::{FrameStream, copy_stream};
use std::path::{Path, PathBuf};

/// How inputs are fitted onto the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    pub panel: PanelConfig,
    pub fill_width: bool,
    pub fill_height: bool,
    pub store: StoreOptions,
}

impl LoadOptions {
    pub fn new(panel: PanelConfig) -> Self {
        Self {
            panel,
            fill_width: false,
            fill_height: false,
            store: StoreOptions::default(),
        }
    }
}

pub struct Source {
    /// Display name used in logs (the input path).
    pub name: String,
    pub params: PlaybackParams,
    pub is_multi_frame: bool,
    pub stream: FrameStream,
}

impl Source {
    pub fn new(
        name: impl Into<String>,
        params: PlaybackParams,
        is_multi_frame: bool,
        stream: FrameStream,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            is_multi_frame,
            stream,
        }
    }

    /// Load `path` for playback with `params`.
    pub fn load(
        path: &Path,
        params: PlaybackParams,
        options: &LoadOptions,
    ) -> Result<Self, LoadError> {
        let name = path.display().to_string();

        if is_stream_file(path) {
            let stream = FrameStream::open_file(path, options.panel)?;
            let frames = stream.frame_count()?;
            if frames == 0 {
                return Err(LoadError::NoFrames {
                    path: path.to_path_buf(),
                });
            }
            tracing::debug!("{}: replaying {} stored frames from disk", name, frames);
            return Ok(Self::new(name, params, frames > 1, stream));
        }

        let mut stream = FrameStream::in_memory(options.panel);
        let mut scratch = FrameBuffer::for_panel(options.panel);
        let is_multi_frame = encode(path, &params, options, &mut scratch, &mut stream)?;
        Ok(Self::new(name, params, is_multi_frame, stream))
    }
}

/// Load every input in order. Inputs that fail are logged and left out, so
/// one bad file never keeps the others from playing.
pub fn load_all(inputs: &[(PathBuf, PlaybackParams)], options: &LoadOptions) -> Vec<Source> {
    inputs
        .iter()
        .filter_map(|(path, params)| match Source::load(path, *params, options) {
            Ok(source) => Some(source),
            Err(e) => {
                tracing::warn!("{} skipped: {}", path.display(), e);
                None
            }
        })
        .collect()
}

/// Append the frames of `path` to `out`; returns the number of frames added.
pub fn encode_into(
    path: &Path,
    params: &PlaybackParams,
    options: &LoadOptions,
    out: &mut FrameStream,
) -> Result<usize, LoadError> {
    let mut scratch = FrameBuffer::for_panel(options.panel);

    if is_stream_file(path) {
        let mut reader = FrameStream::open_file(path, options.panel)?;
        return Ok(copy_stream(&mut reader, out, &mut scratch)?);
    }

    let before = out.frame_count()?;
    encode(path, params, options, &mut scratch, out)?;
    Ok(out.frame_count()? - before)
}

/// Decode, scale and store one input. Returns whether it had several frames.
fn encode(
    path: &Path,
    params: &PlaybackParams,
    options: &LoadOptions,
    scratch: &mut FrameBuffer,
    out: &mut FrameStream,
) -> Result<bool, LoadError> {
    let seq = load_and_scale(
        path,
        options.panel.cols,
        options.panel.rows,
        options.fill_width,
        options.fill_height,
    )?;
    store_sequence(&seq, params, options.store, scratch, out)?;
    Ok(seq.is_multi_frame())
}
