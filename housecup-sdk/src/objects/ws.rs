//! Message types for the `/ws` control and update channel.
//!
//! # Protocol
//!
//! The client sends [`ControlCommand`] frames, tagged by `"action"`:
//!
//! ```json
//! {"action":"start"}
//! {"action":"stop"}
//! {"action":"get_points","time_window":"short"}
//! {"action":"subscribe"}
//! {"action":"unsubscribe"}
//! ```
//!
//! Every command is answered with exactly one [`ControlReply`]. Independently
//! of the replies, the server pushes a [`StreamUpdate`] to every live session
//! whenever an event is recorded. Both kinds of frame arrive on the same
//! socket; [`ServerMessage`] tells them apart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::event::StreamUpdate;
use super::totals::WindowTotals;
use super::window::Window;

/// Client-to-server control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Start the event stream (no-op if already running).
    Start,
    /// Stop the event stream (no-op if already stopped).
    Stop,
    /// Query the totals of one window. An omitted window means all time.
    GetPoints {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_window: Option<String>,
    },
    /// Resume receiving stream updates on this session.
    Subscribe,
    /// Stop receiving stream updates on this session, keeping it open for
    /// control commands.
    Unsubscribe,
}

/// Reply key used when a `get_points` command names no window.
pub const ALL_WINDOWS_KEY: &str = "all";

impl ControlCommand {
    pub fn get_points(window: Window) -> Self {
        ControlCommand::GetPoints {
            time_window: Some(window.name().to_owned()),
        }
    }
}

/// State of the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Started,
    Stopped,
}

/// Status value carried by a [`ControlReply::Status`] frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Started,
    Stopped,
    Subscribed,
    Unsubscribed,
}

impl From<StreamStatus> for ReplyStatus {
    fn from(status: StreamStatus) -> Self {
        match status {
            StreamStatus::Started => ReplyStatus::Started,
            StreamStatus::Stopped => ReplyStatus::Stopped,
        }
    }
}

/// Server-to-client reply to a [`ControlCommand`].
///
/// A totals reply is keyed by the window name exactly as the client sent it,
/// or `"all"` when the command named no window.
///
/// ```json
/// {"status":"started"}
/// {"totals":{"short":{"Gryff":17,"Slyth":5,"Raven":0,"Huff":0}}}
/// {"error":"unknown action"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply {
    Status { status: ReplyStatus },
    Totals { totals: BTreeMap<String, WindowTotals> },
    Error { error: String },
}

impl ControlReply {
    pub fn status(status: impl Into<ReplyStatus>) -> Self {
        ControlReply::Status {
            status: status.into(),
        }
    }

    pub fn totals(key: impl Into<String>, totals: WindowTotals) -> Self {
        ControlReply::Totals {
            totals: BTreeMap::from([(key.into(), totals)]),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ControlReply::Error {
            error: message.into(),
        }
    }
}

/// Any frame the server may send on the `/ws` channel.
///
/// `Update` is listed first: an update frame also has a `totals` key and
/// must not be mistaken for a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Update(StreamUpdate),
    Reply(ControlReply),
}
