//! PHP Log Watch - tail a PHP error log and stream structured entries.

pub mod alert;
pub mod config;
pub mod display;
pub mod parser;
pub mod watcher;
