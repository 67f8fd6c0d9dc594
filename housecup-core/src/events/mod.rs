//! Channel plumbing between the producer, the hub and sessions.
//!
//! # Flow
//!
//! 1. `StreamProducer` appends an event and computes a snapshot, then sends a
//!    `StreamUpdate` on the update channel.
//! 2. `SubscriberHub::run` drains the update channel and fans each update out
//!    to every session channel.
//!
//! Updates are shared behind `Arc` so fan-out never clones the payload.

pub mod channels;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, DEFAULT_SESSION_BUFFER, SessionReceiver, SessionSender,
    StreamUpdateReceiver, StreamUpdateSender, session_channel, stream_update_channel,
};
