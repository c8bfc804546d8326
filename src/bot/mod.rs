/// Prefixed chat commands and permissions
pub mod commands;
/// Inbound message dispatch
pub mod handler;

pub use commands::{AiCommand, Command, Feature, WarnReset};
pub use handler::{HandlerContext, MessageHandler};
