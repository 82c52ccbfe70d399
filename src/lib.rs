//! # Strata
//!
//! Building blocks for reading and writing data files: a **local file access
//! layer**, a **multi-threaded CSV parser** and thin **compression codec
//! bindings**.
//!
//! ## Key Features
//!
//! - **File capabilities** - sequential, random and memory-mapped readers and
//!   writers behind small traits, with open retries and open/close hooks
//! - **Typed binary I/O** - buffered readers and writers for integers and
//!   floats in either byte order
//! - **CSV parsing** - zero-copy rows, quoting, trimming, BOM handling and
//!   delimiter/header guessing, with parsing overlapped on a worker thread
//! - **CSV statistics** - per-column mean, variance, extremes, value and type
//!   counts computed in parallel
//! - **Codecs** - gzip, zstd, bzip2, lz4 and snappy behind one trait (each an
//!   optional feature), plus format detection for streams
//!
//! ## Quick Start
//!
//! ```no_run
//! use strata::csv::{CsvFormat, CsvReader};
//!
//! # fn main() -> strata::Result<()> {
//! let mut reader = CsvReader::from_path("trades.csv", CsvFormat::guess_csv())?;
//! let price = reader.index_of("price");
//!
//! let mut total = 0.0;
//! for row in reader.by_ref() {
//!     let row = row?;
//!     total += price.and_then(|i| row.get(i)).and_then(|f| f.as_f64()).unwrap_or(0.0);
//! }
//! println!("{} rows, total {total}", reader.n_rows());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`files`] - file handles, buffered typed I/O and filesystem helpers
//! - [`csv`] - CSV reading, format guessing and statistics
//! - [`compress`] - codec creation and stream auto-detection
//! - [`config`] - a small persisted key/value property store
//!
//! ## Logging
//!
//! The crate reports through [`tracing`] (`debug!` for chunk and retry
//! details, `warn!` for recoverable problems) and installs no subscriber.

pub mod compress;
pub mod config;
pub mod csv;
pub mod error;
pub mod files;

pub use error::{Error, Result};
