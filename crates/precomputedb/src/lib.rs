//! # precomputedb
//!
//! Durable store for precomputed coin witness records.
//!
//! ## Design
//! - Append-only data file, one record per write
//! - In-memory key index rebuilt on open (last write wins)
//! - Memory-mapped replay with a nom record parser
//! - Single writer, many readers behind `parking_lot` locks

#![warn(missing_docs)]

mod error;
mod key;
mod parser;
mod storage;

pub use error::{Error, Result};
pub use key::{Hash256, KEY_SIZE};
pub use storage::{PrecomputeDb, DATA_FILE_NAME, MAX_VALUE_SIZE};
