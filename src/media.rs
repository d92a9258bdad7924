//! Input discovery: expand directories given on the command line into the
//! media files they contain.
//!
//! ## Rust concepts
//! - `fs::read_dir()` for directory traversal
//! - `Path` and `PathBuf` for cross-platform file paths
//! - `Option::is_some_and` for extension checks

use std::fs;
use std::path::{Path, PathBuf};

/// Extension of pre-rendered frame stream files.
pub const STREAM_EXTENSION: &str = "stream";

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether `path` names a pre-rendered frame stream.
pub fn is_stream_file(path: &Path) -> bool {
    extension(path).is_some_and(|e| e == STREAM_EXTENSION)
}

/// Whether `path` looks like something the viewer can play.
pub fn is_supported_media(path: &Path) -> bool {
    extension(path).is_some_and(|e| {
        matches!(
            e.as_str(),
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | STREAM_EXTENSION
        )
    })
}

/// Whether `a` and `b` name the same existing file, however they are spelled.
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Replace every directory in `inputs` by its supported files, sorted by
/// name. Plain files are kept as given, in order.
pub fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut expanded = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            expanded.push(input.clone());
            continue;
        }

        let read_dir = match fs::read_dir(input) {
            Ok(rd) => rd,
            Err(e) => {
                tracing::warn!("Cannot read directory {}: {}", input.display(), e);
                continue;
            }
        };

        let mut files: Vec<PathBuf> = read_dir
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_supported_media(path))
            .collect();
        files.sort();

        if files.is_empty() {
            tracing::warn!("No media files found in {}", input.display());
        }
        expanded.extend(files);
    }

    expanded
}
