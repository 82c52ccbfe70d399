//! Open options and lifecycle hooks shared by every file type.

use crate::error::{Error, Result};
use std::fmt;
use std::fs::{File, OpenOptions as StdOpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Callback invoked with the path of the file being opened or closed.
pub type FileHook = Arc<dyn Fn(&Path) + Send + Sync>;

/// How a file should be opened, and how hard to try.
///
/// `tries` and `interval_ms` control the retry loop in [`open_with_retry`];
/// a file that fails to open `tries` times in a row is reported with the last
/// error. The boolean flags map directly onto [`std::fs::OpenOptions`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenOptions {
    pub tries: u32,
    pub interval_ms: u64,
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
    /// Permission bits for newly created files.
    pub mode: u32,
    pub create_dir_if_missing: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::read_default()
    }
}

impl OpenOptions {
    /// Read-only, one attempt.
    #[must_use]
    pub const fn read_default() -> Self {
        Self {
            tries: 1,
            interval_ms: 0,
            read: true,
            write: false,
            append: false,
            truncate: false,
            create: false,
            mode: 0o644,
            create_dir_if_missing: false,
        }
    }

    /// Write-only, appending, creating the file if needed.
    #[must_use]
    pub const fn append_write_default() -> Self {
        Self {
            read: false,
            write: true,
            append: true,
            create: true,
            ..Self::read_default()
        }
    }

    /// Write-only, truncating any existing content.
    #[must_use]
    pub const fn truncate_write_default() -> Self {
        Self {
            read: false,
            write: true,
            truncate: true,
            create: true,
            ..Self::read_default()
        }
    }

    #[must_use]
    pub const fn tries(mut self, tries: u32) -> Self {
        self.tries = tries;
        self
    }

    #[must_use]
    pub const fn interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    #[must_use]
    pub const fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn create_dir_if_missing(mut self, yes: bool) -> Self {
        self.create_dir_if_missing = yes;
        self
    }

    fn to_std(&self) -> StdOpenOptions {
        let mut opts = StdOpenOptions::new();
        opts.read(self.read)
            .write(self.write)
            .append(self.append)
            .truncate(self.truncate && !self.append)
            .create(self.create)
            .mode(self.mode);
        opts
    }
}

/// Hooks fired around `open` and `close` of a file.
#[derive(Clone, Default)]
pub struct FileEventListener {
    pub before_open: Option<FileHook>,
    pub after_open: Option<FileHook>,
    pub before_close: Option<FileHook>,
    pub after_close: Option<FileHook>,
}

impl fmt::Debug for FileEventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileEventListener")
            .field("before_open", &self.before_open.is_some())
            .field("after_open", &self.after_open.is_some())
            .field("before_close", &self.before_close.is_some())
            .field("after_close", &self.after_close.is_some())
            .finish()
    }
}

impl FileEventListener {
    pub(crate) fn fire(hook: Option<&FileHook>, path: &Path) {
        if let Some(hook) = hook {
            hook(path);
        }
    }
}

/// Open `path` according to `options`, retrying on failure.
///
/// # Errors
///
/// Returns [`Error::Io`] carrying the last failure once all tries are used,
/// or if a missing parent directory could not be created.
pub fn open_with_retry(path: &Path, options: &OpenOptions) -> Result<File> {
    if options.create_dir_if_missing
        && let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::io(format!("create directory {}", parent.display()), e))?;
    }

    let tries = options.tries.max(1);
    let std_opts = options.to_std();
    let mut attempt = 1;
    loop {
        match std_opts.open(path) {
            Ok(file) => return Ok(file),
            Err(e) if attempt < tries => {
                debug!(path = %path.display(), attempt, error = %e, "open failed, retrying");
                attempt += 1;
                if options.interval_ms > 0 {
                    thread::sleep(Duration::from_millis(options.interval_ms));
                }
            }
            Err(e) => return Err(Error::io(format!("open {}", path.display()), e)),
        }
    }
}
