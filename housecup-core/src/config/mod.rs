//! Runtime configuration shared across crates.
//!
//! Loading and parsing live in the server crate; these are the validated
//! values the core components read.

mod config_store;
mod stream;

pub use config_store::{ConfigStore, ConfigWatcher};
pub use stream::{StreamConfig, StreamConfigError};
