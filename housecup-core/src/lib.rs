#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod aggregator;
pub mod config;
pub mod entities;
pub mod events;
pub mod framework;
pub mod processors;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;
