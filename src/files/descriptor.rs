//! Open-file bookkeeping shared by the concrete file types.

use super::options::{open_with_retry, FileEventListener, OpenOptions};
use crate::error::{Error, IoContext, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

pub(crate) struct Descriptor {
    path: PathBuf,
    file: Option<File>,
    listener: FileEventListener,
    kind: &'static str,
}

impl Descriptor {
    pub(crate) fn open(
        path: &Path,
        options: &OpenOptions,
        listener: FileEventListener,
        kind: &'static str,
    ) -> Result<Self> {
        FileEventListener::fire(listener.before_open.as_ref(), path);
        let file = open_with_retry(path, options)?;
        FileEventListener::fire(listener.after_open.as_ref(), path);
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            listener,
            kind,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(Error::NotOpen(self.kind))
    }

    pub(crate) fn file_mut(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(Error::NotOpen(self.kind))
    }

    pub(crate) fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub(crate) fn size(&self) -> Result<u64> {
        let meta = self
            .file()?
            .metadata()
            .with_context(|| format!("stat {}", self.path.display()))?;
        Ok(meta.len())
    }

    pub(crate) fn sync_data(&self) -> Result<()> {
        self.file()?
            .sync_data()
            .with_context(|| format!("sync {}", self.path.display()))
    }

    pub(crate) fn set_len(&self, size: u64) -> Result<()> {
        self.file()?
            .set_len(size)
            .with_context(|| format!("truncate {}", self.path.display()))
    }

    /// Swap in a freshly opened descriptor for the same path.
    pub(crate) fn reopen(&mut self, options: &OpenOptions) -> Result<()> {
        self.close();
        let file = open_with_retry(&self.path, options)?;
        self.file = Some(file);
        Ok(())
    }

    pub(crate) fn close(&mut self) {
        if self.file.is_none() {
            return;
        }
        FileEventListener::fire(self.listener.before_close.as_ref(), &self.path);
        self.file = None;
        FileEventListener::fire(self.listener.after_close.as_ref(), &self.path);
    }
}

impl Drop for Descriptor {
    fn drop(&mut self) {
        self.close();
    }
}
