//! Channel factories and handle aliases.

use housecup_sdk::objects::StreamUpdate;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Buffer size of the producer-to-hub channel.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Default per-session buffer. A session that falls this far behind starts
/// losing updates instead of stalling the others.
pub const DEFAULT_SESSION_BUFFER: usize = 64;

/// Sender handle for updates leaving the producer.
pub type StreamUpdateSender = mpsc::Sender<Arc<StreamUpdate>>;
/// Receiver handle for updates leaving the producer.
pub type StreamUpdateReceiver = mpsc::Receiver<Arc<StreamUpdate>>;

/// Sender half of one session's outbound queue.
pub type SessionSender = mpsc::Sender<Arc<StreamUpdate>>;
/// Receiver half of one session's outbound queue.
pub type SessionReceiver = mpsc::Receiver<Arc<StreamUpdate>>;

/// Create the producer-to-hub channel.
pub fn stream_update_channel() -> (StreamUpdateSender, StreamUpdateReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create one session's outbound queue holding at most `buffer` updates.
///
/// A zero buffer is raised to one, since tokio rejects empty channels.
pub fn session_channel(buffer: usize) -> (SessionSender, SessionReceiver) {
    mpsc::channel(buffer.max(1))
}
