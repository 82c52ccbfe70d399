//! Local file access.
//!
//! The concrete file types each implement the capability traits from
//! [`traits`] that match how they touch the disk:
//!
//! | Type                    | Traits                                  |
//! |-------------------------|-----------------------------------------|
//! | [`SequentialReadFile`]  | [`SequentialRead`]                      |
//! | [`RandomReadFile`]      | [`RandomRead`]                          |
//! | [`MmapReadFile`]        | [`SequentialRead`] + [`RandomRead`]     |
//! | [`SequentialWriteFile`] | [`SequentialWrite`]                     |
//! | [`RandomWriteFile`]     | [`RandomWrite`]                         |
//! | [`TempFile`]            | [`SequentialWrite`]                     |
//!
//! Opening goes through [`OpenOptions`], which can retry a failed open a
//! number of times with a pause in between, and a [`FileEventListener`] whose
//! hooks fire around open and close. [`BufferedReader`] and
//! [`BufferedWriter`] add a cache and typed binary accessors on top of any
//! sequential file, and [`localfs`] covers whole-file and directory chores.

mod buffered;
mod descriptor;
pub mod localfs;
mod mmap;
mod options;
mod read;
mod readline;
mod temp_file;
pub mod traits;
mod write;

pub use buffered::{BufferedReader, BufferedWriter, Endian, DEFAULT_CACHE_SIZE};
pub use mmap::{MmapReadFile, MmapSource, MmapWindow};
pub use options::{open_with_retry, FileEventListener, FileHook, OpenOptions};
pub use read::{RandomReadFile, SequentialReadFile};
pub use readline::ReadlineFile;
pub use temp_file::{temp_file_name, TempFile, DEFAULT_PREFIX, DEFAULT_RANDOM_CHARS};
pub use traits::{FileHandle, RandomRead, RandomWrite, SequentialRead, SequentialWrite};
pub use write::{RandomWriteFile, SequentialWriteFile};
