// Streaming SHA-512 digest computation
// Reads a file in fixed-size chunks and feeds them, in order, to the hasher

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha512};

use super::error::{C4Error, Result};

/// Length in bytes of a SHA-512 digest.
pub const DIGEST_LENGTH: usize = 64;

/// Default chunk size: 100 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 100 * 1024 * 1024;

/// Raw SHA-512 output.
pub type Sha512Digest = [u8; DIGEST_LENGTH];

/// Result of streaming one input through the digest engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestOutput {
    pub digest: Sha512Digest,
    pub total_bytes: u64,
}

/// Streams bytes through SHA-512 in chunks of `chunk_size`.
///
/// The engine owns its read buffer, so one instance must not be shared
/// between threads; give every worker its own.
#[derive(Debug)]
pub struct DigestEngine {
    chunk_size: usize,
    buffer: Vec<u8>,
}

impl DigestEngine {
    /// Create an engine reading `chunk_size` bytes per step.
    ///
    /// Fails with `InvalidConfiguration` if `chunk_size` is zero.
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(C4Error::invalid_config("chunk size must be at least 1 byte"));
        }
        Ok(Self {
            chunk_size,
            buffer: Vec::new(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Digest the file at `path`.
    ///
    /// `on_progress` receives `floor(100 * chunks_done / (size / chunk_size + 1))`
    /// after every chunk. `should_cancel` is consulted before the first read and
    /// after every chunk; when it returns true the call fails with `Incomplete`.
    pub fn digest_file(
        &mut self,
        path: &Path,
        on_progress: Option<&dyn Fn(u8)>,
        should_cancel: Option<&dyn Fn() -> bool>,
    ) -> Result<DigestOutput> {
        let file = File::open(path)
            .map_err(|e| C4Error::from_io_error(e, "opening", Some(path)))?;
        let size = file
            .metadata()
            .map_err(|e| C4Error::from_io_error(e, "reading metadata of", Some(path)))?
            .len();

        self.digest_stream(file, size, on_progress, should_cancel)
            .map_err(|e| match e {
                C4Error::Incomplete { path: None } => C4Error::Incomplete {
                    path: Some(path.to_path_buf()),
                },
                C4Error::Io { path: None, operation, source } => {
                    C4Error::from_io_error(source, &operation, Some(path))
                }
                other => other,
            })
    }

    /// Digest an arbitrary reader. `expected_size` only feeds the progress
    /// formula; the digest always covers every byte the reader yields.
    pub fn digest_reader<R: Read>(
        &mut self,
        reader: R,
        expected_size: u64,
        on_progress: Option<&dyn Fn(u8)>,
        should_cancel: Option<&dyn Fn() -> bool>,
    ) -> Result<DigestOutput> {
        self.digest_stream(reader, expected_size, on_progress, should_cancel)
    }

    fn digest_stream<R: Read>(
        &mut self,
        mut reader: R,
        size: u64,
        on_progress: Option<&dyn Fn(u8)>,
        should_cancel: Option<&dyn Fn() -> bool>,
    ) -> Result<DigestOutput> {
        let chunk_size = self.chunk_size;
        // Never allocate more than the input needs; large chunk sizes are the default.
        let wanted = chunk_size.min(usize::try_from(size).unwrap_or(usize::MAX).max(1));
        if self.buffer.len() < wanted {
            self.buffer.resize(wanted, 0);
        }

        let total_chunks = size / chunk_size as u64 + 1;
        let mut chunks_done = 0u64;
        let mut total_bytes = 0u64;
        let mut hasher = Sha512::new();

        loop {
            if should_cancel.is_some_and(|cancelled| cancelled()) {
                return Err(C4Error::Incomplete { path: None });
            }

            let read = self.read_chunk(&mut reader)?;
            if read == 0 {
                break;
            }
            hasher.update(&self.buffer[..read]);
            total_bytes += read as u64;
            chunks_done += 1;

            if let Some(report) = on_progress {
                report(chunk_percent(chunks_done, total_chunks));
            }
        }

        let mut digest = [0u8; DIGEST_LENGTH];
        digest.copy_from_slice(&hasher.finalize());
        Ok(DigestOutput {
            digest,
            total_bytes,
        })
    }

    /// Fill up to one chunk, growing the buffer when the input turns out
    /// larger than its reported size. Returns 0 only at end of input.
    fn read_chunk<R: Read>(&mut self, reader: &mut R) -> Result<usize> {
        let mut filled = 0;
        while filled < self.chunk_size {
            if filled == self.buffer.len() {
                let grow = (self.buffer.len() * 2).max(8 * 1024).min(self.chunk_size);
                self.buffer.resize(grow, 0);
            }
            match reader.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(C4Error::from_io_error(e, "reading", None)),
            }
        }
        Ok(filled)
    }
}

impl Default for DigestEngine {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer: Vec::new(),
        }
    }
}

/// Integer progress after `done` of `total` chunks, capped at 100.
fn chunk_percent(done: u64, total: u64) -> u8 {
    (100 * done / total).min(100) as u8
}

/// SHA-512 of an in-memory byte slice.
pub fn digest_bytes(data: &[u8]) -> Sha512Digest {
    let mut digest = [0u8; DIGEST_LENGTH];
    digest.copy_from_slice(&Sha512::digest(data));
    digest
}
