//! Firmware image source for streamed updates.
//!
//! A [`FirmwareImage`] is a forward-only byte source plus the length that is
//! announced to the controller before the first chunk. The read cursor only
//! ever advances; a transfer that fails is restarted from a fresh image.

use std::fmt;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read};
use std::path::Path;

use testerlink_core::{Error, Result};

/// A firmware image being (or about to be) streamed to the controller.
pub struct FirmwareImage {
    source: Box<dyn Read + Send>,
    total: u64,
    position: u64,
}

impl FirmwareImage {
    /// Open an image file from disk.
    ///
    /// Fails with [`Error::FirmwareNotFound`] when the file does not exist and
    /// [`Error::EmptyFirmware`] when it has zero length.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::FirmwareNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let total = file.metadata()?.len();
        tracing::debug!(path = %path.display(), total, "Opened firmware image");
        Self::from_reader(file, total)
    }

    /// Wrap an in-memory image.
    pub fn from_bytes(image: Vec<u8>) -> Result<Self> {
        let total = image.len() as u64;
        Self::from_reader(Cursor::new(image), total)
    }

    /// Wrap any reader with a declared length.
    pub fn from_reader(source: impl Read + Send + 'static, total: u64) -> Result<Self> {
        if total == 0 {
            return Err(Error::EmptyFirmware);
        }
        Ok(FirmwareImage {
            source: Box::new(source),
            total,
            position: 0,
        })
    }

    /// Declared length in bytes.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Bytes read so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether every declared byte has been read.
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.total
    }

    /// Read the next chunk of at most `max` bytes.
    ///
    /// Short reads from the underlying source are retried until the chunk is
    /// full or the declared length is reached. A source that runs dry before
    /// the declared length is an error, as is any I/O failure.
    pub fn read_chunk(&mut self, max: usize) -> Result<Vec<u8>> {
        let remaining = self.total - self.position;
        let want = remaining.min(max as u64) as usize;
        let mut chunk = vec![0u8; want];
        let mut filled = 0;

        while filled < want {
            match self.source.read(&mut chunk[filled..]) {
                Ok(0) => {
                    return Err(Error::FirmwareRead(format!(
                        "image ended after {} of {} bytes",
                        self.position + filled as u64,
                        self.total
                    )));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::FirmwareRead(e.to_string())),
            }
        }

        self.position += filled as u64;
        Ok(chunk)
    }
}

impl fmt::Debug for FirmwareImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirmwareImage")
            .field("total", &self.total)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}
