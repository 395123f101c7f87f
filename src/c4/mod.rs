// C4 ID core library
// Content identifiers: streaming SHA-512, base58 encoding, single-file and batch hashing

pub mod batch;
pub mod digest;
pub mod encode;
pub mod error;
pub mod format;
pub mod hasher;
pub mod id;
pub mod path_utils;
pub mod progress;
pub mod report;
pub mod walk;

// Re-export commonly used types for convenience
pub use batch::{BatchConfig, BatchState, BatchStats, C4Queue, DEFAULT_MAX_WORKERS, DEFAULT_POLL_INTERVAL};
pub use digest::{digest_bytes, DigestEngine, Sha512Digest, DEFAULT_CHUNK_SIZE, DIGEST_LENGTH};
pub use encode::{b58encode, decode, encode, C4_ALPHABET, C4_ID_LENGTH, C4_PREFIX};
pub use error::{C4Error, Result};
pub use format::{FormatOptions, FormatOrder};
pub use hasher::{hash_file, C4Hasher, CancelToken, ProgressCallback};
pub use id::{C4Id, FileC4Id, PathMetadata};
pub use progress::{bar_callback, progress_style, stdout_bar, stdout_progress, DEFAULT_BAR_LENGTH};
pub use report::ConsoleReporter;
pub use walk::{collect_files, WalkOptions};
