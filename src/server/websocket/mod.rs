//! WebSocket subscriptions to job progress.

mod bridge;
mod messages;

pub use bridge::ws_job_handler;
pub use messages::BridgeMessage;
