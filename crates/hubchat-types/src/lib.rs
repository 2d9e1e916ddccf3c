//! Shared types and error hierarchy for the hub chat client.

pub mod error;
pub mod handler;
pub mod message;

pub use error::{ChatError, ConfigError};
pub use handler::{Callbacks, ChatEvent, ChatHandler};
pub use message::*;
