//! Whole-file and directory helpers for the local filesystem.
//!
//! Listing functions return entries sorted by name so callers see a stable
//! order across platforms.

use crate::error::{IoContext, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Read a whole file into memory.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).with_context(|| format!("read {}", path.display()))
}

/// Read a whole file as UTF-8.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not UTF-8.
pub fn read_file_to_string(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

/// Write `data` to `path`, replacing the file when `truncate` is set and
/// appending otherwise. Missing parent directories are created.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_file(path: impl AsRef<Path>, data: &[u8], truncate: bool) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_directories(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(truncate)
        .append(!truncate)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(data)
        .with_context(|| format!("write {}", path.display()))
}

/// Append `data` to `path`, creating it if needed.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn append_file(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    write_file(path, data, false)
}

fn list_entries(dir: &Path, full_path: bool, want_dirs: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let entry = entry.with_context(|| format!("list {}", dir.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?;
        if file_type.is_dir() != want_dirs {
            continue;
        }
        out.push(if full_path {
            entry.path()
        } else {
            PathBuf::from(entry.file_name())
        });
    }
    out.sort();
    Ok(out)
}

/// Regular files directly under `dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed.
pub fn list_files(dir: impl AsRef<Path>, full_path: bool) -> Result<Vec<PathBuf>> {
    list_entries(dir.as_ref(), full_path, false)
}

/// Subdirectories directly under `dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed.
pub fn list_directories(dir: impl AsRef<Path>, full_path: bool) -> Result<Vec<PathBuf>> {
    list_entries(dir.as_ref(), full_path, true)
}

/// Files matching a glob pattern such as `data/*.csv`, sorted.
///
/// # Errors
///
/// Returns an error if the pattern is invalid or a match cannot be read.
#[cfg(feature = "glob")]
pub fn glob(pattern: &str) -> Result<Vec<PathBuf>> {
    use crate::error::Error;

    let paths = ::glob::glob(pattern)
        .map_err(|e| Error::InvalidArgument(format!("invalid glob pattern {pattern}: {e}")))?;
    let mut out = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            Error::io(format!("read glob entry for {pattern}"), e.into_error())
        })?;
        if path.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[must_use]
pub fn exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Remove a file or an empty directory.
///
/// # Errors
///
/// Returns an error if the path does not exist or cannot be removed.
pub fn remove(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let result = if path.is_dir() {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    };
    result.with_context(|| format!("remove {}", path.display()))
}

/// Remove a path and everything below it.
///
/// # Errors
///
/// Returns an error if the path does not exist or cannot be removed.
pub fn remove_all(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.with_context(|| format!("remove {}", path.display()))
}

/// Like [`remove`], but a missing path is not an error. Returns whether
/// anything was removed.
///
/// # Errors
///
/// Returns an error if an existing path cannot be removed.
pub fn remove_if_exists(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(false);
    }
    remove(path).map(|()| true)
}

/// Like [`remove_all`], but a missing path is not an error.
///
/// # Errors
///
/// Returns an error if an existing path cannot be removed.
pub fn remove_all_if_exists(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(false);
    }
    remove_all(path).map(|()| true)
}

/// # Errors
///
/// Returns an error if the file cannot be inspected.
pub fn file_size(path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    Ok(fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .len())
}

/// Truncate or zero-extend an existing file to `size` bytes.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or resized.
pub fn file_resize(path: impl AsRef<Path>, size: u64) -> Result<()> {
    let path = path.as_ref();
    fs::OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|f| f.set_len(size))
        .with_context(|| format!("resize {}", path.display()))
}

/// # Errors
///
/// Returns an error if the file cannot be inspected.
pub fn last_modified_time(path: impl AsRef<Path>) -> Result<SystemTime> {
    let path = path.as_ref();
    fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("stat {}", path.display()))
}

/// # Errors
///
/// Returns an error if the rename fails.
pub fn rename(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    let (from, to) = (from.as_ref(), to.as_ref());
    fs::rename(from, to).with_context(|| format!("rename {} to {}", from.display(), to.display()))
}

/// Copy one file, returning the number of bytes copied.
///
/// # Errors
///
/// Returns an error if the copy fails.
pub fn copy_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<u64> {
    let (from, to) = (from.as_ref(), to.as_ref());
    fs::copy(from, to).with_context(|| format!("copy {} to {}", from.display(), to.display()))
}

/// Copy the files of `from` into `to`, descending into subdirectories when
/// `recursive` is set. `to` is created if needed.
///
/// # Errors
///
/// Returns an error if any listing or copy fails.
pub fn copy_directory(from: impl AsRef<Path>, to: impl AsRef<Path>, recursive: bool) -> Result<()> {
    let (from, to) = (from.as_ref(), to.as_ref());
    create_directories(to)?;
    for name in list_files(from, false)? {
        copy_file(from.join(&name), to.join(&name))?;
    }
    if recursive {
        for name in list_directories(from, false)? {
            copy_directory(from.join(&name), to.join(&name), true)?;
        }
    }
    Ok(())
}

#[must_use]
pub fn temp_directory_path() -> PathBuf {
    std::env::temp_dir()
}

/// Create a single directory; the parent must exist.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn create_directory(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir(path).with_context(|| format!("create directory {}", path.display()))
}

/// Create a directory and any missing ancestors.
///
/// # Errors
///
/// Returns an error if a directory cannot be created.
pub fn create_directories(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}
