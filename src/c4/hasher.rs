// Single-file C4 hashing
// Digest engine + encoder, with cancellation and progress hooks

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::digest::DigestEngine;
use super::error::Result;
use super::id::{C4Id, FileC4Id};

/// Callback receiving integer progress in 0..=100.
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Shared, clonable cancellation flag.
///
/// Cancelling is idempotent and visible to every clone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Computes C4 IDs for files.
///
/// Each hasher owns its chunk buffer; use one per thread.
///
/// ```no_run
/// use c4id::c4::C4Hasher;
///
/// let mut hasher = C4Hasher::new();
/// let id = hasher.hash_file("movie.exr".as_ref())?;
/// println!("{}", id);
/// # Ok::<(), c4id::c4::C4Error>(())
/// ```
pub struct C4Hasher {
    engine: DigestEngine,
    progress_callback: Option<ProgressCallback>,
}

impl C4Hasher {
    /// Create a hasher with the default 100 MiB chunk size
    pub fn new() -> Self {
        Self {
            engine: DigestEngine::default(),
            progress_callback: None,
        }
    }

    /// Create a hasher with a custom chunk size; zero is rejected
    pub fn with_chunk_size(chunk_size: usize) -> Result<Self> {
        Ok(Self {
            engine: DigestEngine::new(chunk_size)?,
            progress_callback: None,
        })
    }

    /// Report per-chunk progress for every file hashed
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn set_progress_callback(&mut self, callback: Option<ProgressCallback>) {
        self.progress_callback = callback;
    }

    pub fn chunk_size(&self) -> usize {
        self.engine.chunk_size()
    }

    /// Hash a file to completion.
    pub fn hash_file(&mut self, path: &Path) -> Result<FileC4Id> {
        self.hash_file_with_cancel(path, None)
    }

    /// Hash a file, failing with `Incomplete` as soon as `should_cancel`
    /// returns true (checked before the first chunk and after each one).
    pub fn hash_file_with_cancel(
        &mut self,
        path: &Path,
        should_cancel: Option<&dyn Fn() -> bool>,
    ) -> Result<FileC4Id> {
        let progress = self.progress_callback.clone();
        let on_progress = progress.as_deref().map(|cb| cb as &dyn Fn(u8));

        let output = self.engine.digest_file(path, on_progress, should_cancel)?;
        Ok(FileC4Id::new(
            C4Id::from_digest(output.digest),
            path,
            output.total_bytes,
        ))
    }

    /// Hash a file, aborting when `token` is cancelled.
    pub fn hash_file_until(&mut self, path: &Path, token: &CancelToken) -> Result<FileC4Id> {
        let check: &dyn Fn() -> bool = &|| token.is_cancelled();
        self.hash_file_with_cancel(path, Some(check))
    }

    /// Hash everything `reader` yields. The record's path is `label`.
    pub fn hash_reader<R: Read>(
        &mut self,
        reader: R,
        label: impl Into<PathBuf>,
        token: Option<&CancelToken>,
    ) -> Result<FileC4Id> {
        let check: &dyn Fn() -> bool = &|| token.is_some_and(CancelToken::is_cancelled);
        let output = self.engine.digest_reader(reader, 0, None, Some(check))?;
        Ok(FileC4Id::new(
            C4Id::from_digest(output.digest),
            label,
            output.total_bytes,
        ))
    }
}

impl Default for C4Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash one file with default settings.
pub fn hash_file(path: &Path) -> Result<FileC4Id> {
    C4Hasher::new().hash_file(path)
}
