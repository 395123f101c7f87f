// C4 ID value types
// C4Id is the pure identifier; FileC4Id attaches the informational file context

use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Serialize, Serializer};

use super::digest::{digest_bytes, Sha512Digest};
use super::encode::{decode, encode};
use super::error::C4Error;

/// A C4 ID: a SHA-512 digest and its canonical 90 character text.
///
/// The text is a pure function of the digest, and ordering the text as a
/// string orders the digests as big-endian integers.
#[derive(Clone)]
pub struct C4Id {
    digest: Sha512Digest,
    text: String,
}

impl C4Id {
    pub fn from_digest(digest: Sha512Digest) -> Self {
        let text = encode(&digest);
        Self { digest, text }
    }

    /// Identify in-memory content.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self::from_digest(digest_bytes(data))
    }

    pub fn digest(&self) -> &Sha512Digest {
        &self.digest
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for C4Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for C4Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("C4Id").field(&self.text).finish()
    }
}

impl PartialEq for C4Id {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl Eq for C4Id {}

impl Hash for C4Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
    }
}

impl PartialOrd for C4Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for C4Id {
    fn cmp(&self, other: &Self) -> Ordering {
        self.digest.cmp(&other.digest)
    }
}

impl FromStr for C4Id {
    type Err = C4Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digest = decode(s)?;
        Ok(Self {
            digest,
            text: s.to_string(),
        })
    }
}

impl Serialize for C4Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// Filesystem facts about a path, gathered only when a caller asks for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathMetadata {
    pub name: String,
    pub folder: bool,
    pub link: bool,
}

impl PathMetadata {
    /// Inspect `path`. Missing paths read as neither folder nor link.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let link = fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        Self {
            name,
            folder: path.is_dir(),
            link,
        }
    }
}

/// The C4 ID of one file, with the path and size it was computed from.
///
/// Path and size never influence the identifier.
#[derive(Debug, Clone)]
pub struct FileC4Id {
    id: C4Id,
    path: PathBuf,
    bytes: u64,
    metadata: OnceLock<PathMetadata>,
}

impl FileC4Id {
    pub fn new(id: C4Id, path: impl Into<PathBuf>, bytes: u64) -> Self {
        Self {
            id,
            path: path.into(),
            bytes,
            metadata: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &C4Id {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Folder/link/name facts; the filesystem is touched on first call only.
    pub fn metadata(&self) -> &PathMetadata {
        self.metadata
            .get_or_init(|| PathMetadata::from_path(&self.path))
    }

    /// Whether `metadata()` has been computed yet.
    pub fn has_metadata(&self) -> bool {
        self.metadata.get().is_some()
    }
}

impl PartialEq for FileC4Id {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.path == other.path && self.bytes == other.bytes
    }
}

impl Eq for FileC4Id {}

impl fmt::Display for FileC4Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}
