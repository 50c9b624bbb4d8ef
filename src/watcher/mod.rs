//! Watcher module for PHP error log files.
//!
//! Reads appended bytes, frames them into lines, parses entries, and
//! publishes them as events.

mod assembler;
mod error;
mod events;
mod reader;
mod runner;
mod session;

pub use assembler::LineAssembler;
pub use error::WatchError;
pub use events::{WatchEvent, WatchStatus};
pub use reader::{Chunk, FileIdentity, RawChunkReader};
pub use runner::{truncate_file, LogWatcher};
pub use session::{PollOutcome, WatchSession};
