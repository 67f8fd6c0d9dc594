pub mod category;
pub mod event;
pub mod totals;
pub mod window;
pub mod ws;

pub use category::{Category, UnknownCategoryError};
pub use event::{HousePointEvent, StreamUpdate};
pub use totals::{AllWindowTotals, WindowTotals};
pub use window::{InvalidWindowError, Window};
pub use ws::{
    ALL_WINDOWS_KEY, ControlCommand, ControlReply, ReplyStatus, ServerMessage, StreamStatus,
};
