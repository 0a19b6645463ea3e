//! Kwork bot: push channel listener, event decoding and rule dispatch.

pub mod api;
pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use api::{KworkApi, KworkClient, Responder};
pub use bot::Bot;
pub use config::BotConfig;
pub use error::{ApiError, BotError, ChannelError, ConfigError};
pub use pipeline::reply::ReplyTimings;
pub use pipeline::rules::{MessageHandler, Predicate};
pub use pipeline::types::InboundMessage;
