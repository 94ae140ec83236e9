mod channel;
mod context;
mod handle;

pub use channel::{Channel, ChannelEvent, ChannelOptions};
pub use context::Context;
pub use handle::{ExecutionCommand, ExecutionHandle};
