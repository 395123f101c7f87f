// Command-line path expansion
// Directories are walked with jwalk; plain paths pass through untouched

use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use tracing::warn;

/// How directory arguments are expanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Follow symbolic links while walking
    pub follow_links: bool,
    /// When positive, skip files whose directory is nested more than this
    /// many separators below the argument
    pub depth: i64,
}

impl WalkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    pub fn with_depth(mut self, depth: i64) -> Self {
        self.depth = depth;
        self
    }
}

/// Expand command-line arguments into the files to hash.
///
/// Anything that is not a directory is returned as given, so a missing
/// file still reaches the hasher and is reported there.
pub fn collect_files<P: AsRef<Path>>(paths: &[P], options: &WalkOptions) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            walk_directory(path, options, &mut files);
        } else {
            files.push(path.to_path_buf());
        }
    }
    files
}

fn walk_directory(root: &Path, options: &WalkOptions, files: &mut Vec<PathBuf>) {
    for entry_result in WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(options.follow_links)
        .sort(true)
    {
        match entry_result {
            Ok(entry) => {
                let file_type = entry.file_type();
                if file_type.is_dir() {
                    continue;
                }
                // Links to directories are either walked or skipped, never hashed
                if file_type.is_symlink() && entry.path().is_dir() {
                    continue;
                }
                if !file_type.is_file() && !file_type.is_symlink() {
                    continue;
                }
                if exceeds_depth(entry.depth, options.depth) {
                    continue;
                }
                files.push(entry.path());
            }
            Err(e) => {
                warn!("error walking {}: {}", root.display(), e);
            }
        }
    }
}

/// Entry depth 1 is a file directly inside the root, depth 2 a file one
/// directory down; both count as zero separators.
fn exceeds_depth(entry_depth: usize, max_depth: i64) -> bool {
    if max_depth <= 0 {
        return false;
    }
    let separators = entry_depth.saturating_sub(2) as i64;
    separators > max_depth
}
