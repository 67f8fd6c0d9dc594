//! Long-running components of the engine.
//!
//! - `StreamProducer`: draws events from an `EventSource`, records them and
//!   emits a `StreamUpdate` per recorded event
//! - `SubscriberHub`: fans updates out to sessions and answers control
//!   commands

pub mod hub;
pub mod producer;
pub mod source;

pub use hub::{BroadcastReport, DeliveryError, SubscriberHub, SubscriberSession};
pub use producer::StreamProducer;
pub use source::{EventSource, RandomEventSource};
