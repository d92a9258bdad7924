//! Frame stream codec: an ordered, rewindable sequence of stored frames.
//!
//! Decoding and scaling an animation on a Pi Zero is slow, so every input is
//! encoded once into a `FrameStream` and then replayed as many times as
//! needed. A stream lives either in memory or in a file; both backings use
//! the same framing, so a file written by one process can be replayed by
//! another.
//!
//! ## Format
//! A flat sequence of records with no header and no frame count; end of
//! file is end of stream:
//!
//! ```text
//! [delay_us: u32 little-endian][width * height * 3 pixel bytes]
//! ```
//!
//! Pixel bytes are row-major, R, G, B per pixel (see [`FrameBuffer`]).
//!
//! ## Rust concepts
//! - A closed `enum` for the backing store instead of a trait object
//! - `Read`/`Write`/`Seek` on `std::fs::File`
//! - Refilling a caller-owned buffer to avoid per-frame allocation

use crate::PanelConfig;
use crate::error::StreamError;
use crate::frame::FrameBuffer;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Size of the little-endian delay prefix of every record.
pub const DELAY_BYTES: usize = 4;

enum Backing {
    Memory(Vec<u8>),
    File(File),
}

pub struct FrameStream {
    backing: Backing,
    width: u32,
    height: u32,
    read_pos: u64,
}

impl FrameStream {
    /// An empty stream held in memory.
    pub fn in_memory(panel: PanelConfig) -> Self {
        Self::with_backing(Backing::Memory(Vec::new()), panel)
    }

    /// Create (or truncate) a file-backed stream for writing and reading.
    pub fn create_file(path: &Path, panel: PanelConfig) -> Result<Self, StreamError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::with_backing(Backing::File(file), panel))
    }

    /// Open an existing stream file for replay. Writes to it will fail.
    pub fn open_file(path: &Path, panel: PanelConfig) -> Result<Self, StreamError> {
        let file = File::open(path)?;
        Ok(Self::with_backing(Backing::File(file), panel))
    }

    fn with_backing(backing: Backing, panel: PanelConfig) -> Self {
        Self {
            backing,
            width: panel.cols,
            height: panel.rows,
            read_pos: 0,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Length of one record in bytes.
    pub fn record_len(&self) -> usize {
        DELAY_BYTES + PanelConfig::new(self.height, self.width).frame_byte_count()
    }

    pub fn is_file_backed(&self) -> bool {
        matches!(self.backing, Backing::File(_))
    }

    /// Append a frame that should stay visible for `delay_us` microseconds.
    pub fn write(&mut self, frame: &FrameBuffer, delay_us: u32) -> Result<(), StreamError> {
        self.check_dimensions(frame)?;
        let header = delay_us.to_le_bytes();
        let record_len = self.record_len();

        match &mut self.backing {
            Backing::Memory(buf) => {
                buf.reserve(record_len);
                buf.extend_from_slice(&header);
                buf.extend_from_slice(frame.as_bytes());
            }
            Backing::File(file) => {
                file.seek(SeekFrom::End(0))?;
                file.write_all(&header)?;
                file.write_all(frame.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Read the next record into `frame`, returning its delay in microseconds,
    /// or `None` at the end of the stream.
    pub fn read_next(&mut self, frame: &mut FrameBuffer) -> Result<Option<u32>, StreamError> {
        self.check_dimensions(frame)?;
        let start = self.read_pos;
        let mut header = [0u8; DELAY_BYTES];

        let (header_len, pixel_len) = match &mut self.backing {
            Backing::Memory(buf) => {
                let rest = buf.get(start as usize..).unwrap_or_default();
                let header_len = rest.len().min(DELAY_BYTES);
                header[..header_len].copy_from_slice(&rest[..header_len]);
                let payload = &rest[header_len..];
                let pixels = frame.as_bytes_mut();
                let pixel_len = payload.len().min(pixels.len());
                pixels[..pixel_len].copy_from_slice(&payload[..pixel_len]);
                (header_len, pixel_len)
            }
            Backing::File(file) => {
                file.seek(SeekFrom::Start(start))?;
                let header_len = read_full(file, &mut header)?;
                let pixel_len = if header_len == DELAY_BYTES {
                    read_full(file, frame.as_bytes_mut())?
                } else {
                    0
                };
                (header_len, pixel_len)
            }
        };

        if header_len == 0 {
            return Ok(None);
        }
        if header_len < DELAY_BYTES {
            return Err(StreamError::corrupt(
                start,
                format!("truncated record header ({header_len} of {DELAY_BYTES} bytes)"),
            ));
        }
        let expected = frame.as_bytes().len();
        if pixel_len < expected {
            return Err(StreamError::corrupt(
                start,
                format!("truncated pixel data ({pixel_len} of {expected} bytes)"),
            ));
        }

        self.read_pos = start + (DELAY_BYTES + expected) as u64;
        Ok(Some(u32::from_le_bytes(header)))
    }

    /// Reset the read position to the first record.
    pub fn rewind(&mut self) {
        self.read_pos = 0;
    }

    /// Number of complete records in the stream.
    pub fn frame_count(&self) -> Result<usize, StreamError> {
        let len = match &self.backing {
            Backing::Memory(buf) => buf.len() as u64,
            Backing::File(file) => file.metadata()?.len(),
        };
        Ok((len / self.record_len() as u64) as usize)
    }

    /// Raw bytes of an in-memory stream; `None` for file-backed streams.
    pub fn memory_bytes(&self) -> Option<&[u8]> {
        match &self.backing {
            Backing::Memory(buf) => Some(buf),
            Backing::File(_) => None,
        }
    }

    fn check_dimensions(&self, frame: &FrameBuffer) -> Result<(), StreamError> {
        if frame.dimensions() != self.dimensions() {
            return Err(StreamError::DimensionMismatch {
                expected: self.dimensions(),
                actual: frame.dimensions(),
            });
        }
        Ok(())
    }
}

/// Append every remaining record of `reader` to `writer`.
///
/// Returns the number of records copied.
pub fn copy_stream(
    reader: &mut FrameStream,
    writer: &mut FrameStream,
    scratch: &mut FrameBuffer,
) -> Result<usize, StreamError> {
    let mut copied = 0;
    while let Some(delay_us) = reader.read_next(scratch)? {
        writer.write(scratch, delay_us)?;
        copied += 1;
    }
    Ok(copied)
}

/// Like `read_exact`, but reports how many bytes were available before EOF
/// instead of failing, so a clean end of stream can be told from truncation.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
