#![forbid(unsafe_code)]

pub mod objects;

#[cfg(feature = "client")]
pub mod client;
