// Path display helpers for identifier reports
// Absolute and relative forms are computed lexically, without resolving symlinks

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a path that may be relative or absolute
/// If relative, resolves against the provided base directory
pub fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Clean a path by removing redundant components like "." and ".."
/// This provides a normalized form without requiring the path to exist
pub fn clean_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                // ".." at the root is the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            _ => components.push(component),
        }
    }

    let result: PathBuf = components.iter().collect();
    if result.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        result
    }
}

/// Absolute, cleaned form of `path` relative to the current directory
pub fn absolute_path(path: &Path) -> PathBuf {
    match env::current_dir() {
        Ok(cwd) => clean_path(&resolve_path(path, &cwd)),
        Err(_) => clean_path(path),
    }
}

/// Path of `path` as seen from `base`, using ".." where needed
/// Both are made absolute first; on Windows, paths on different drives
/// come back absolute
pub fn relative_path_from(path: &Path, base: &Path) -> PathBuf {
    let path = absolute_path(path);
    let base = absolute_path(base);

    let path_parts: Vec<Component> = path.components().collect();
    let base_parts: Vec<Component> = base.components().collect();

    if path_parts.first() != base_parts.first() {
        return path;
    }

    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..base_parts.len() {
        result.push("..");
    }
    for part in &path_parts[common..] {
        result.push(part.as_os_str());
    }

    if result.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        result
    }
}

/// Path relative to the current working directory
pub fn relative_path(path: &Path) -> PathBuf {
    match env::current_dir() {
        Ok(cwd) => relative_path_from(path, &cwd),
        Err(_) => path.to_path_buf(),
    }
}
