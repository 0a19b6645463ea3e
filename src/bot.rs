//! Kwork bot: handler registration and the main run loop.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use kwork_bot::{Bot, BotConfig, KworkClient};
//! # use tokio_util::sync::CancellationToken;
//! # async fn demo() -> anyhow::Result<()> {
//! let config = BotConfig::new("login", "password");
//! let client = Arc::new(KworkClient::new(&config)?);
//!
//! let mut bot = Bot::new(client, &config);
//! bot.on_text("привет", |msg| async move {
//!     msg.answer_simulation("И вам привет!").await?;
//!     anyhow::Ok(())
//! });
//!
//! bot.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::KworkApi;
use crate::channels::events::EventDecoder;
use crate::channels::push::{Connector, PushListener, WsConnector};
use crate::config::BotConfig;
use crate::error::{BotError, ChannelError};
use crate::pipeline::dispatcher::Dispatcher;
use crate::pipeline::reply::ReplyTimings;
use crate::pipeline::rules::{MessageHandler, Predicate, Rule};
use crate::pipeline::types::InboundMessage;

/// Settings the bot takes from [`BotConfig`].
#[derive(Debug, Clone)]
struct BotSettings {
    channel_url: String,
    reconnect_backoff: std::time::Duration,
    queue_capacity: usize,
    reply_timings: ReplyTimings,
}

/// A Kwork chat bot: ordered handler rules on top of the push channel.
pub struct Bot {
    api: Arc<dyn KworkApi>,
    connector: Arc<dyn Connector>,
    settings: BotSettings,
    rules: Vec<Rule>,
}

impl Bot {
    pub fn new<A: KworkApi + 'static>(api: Arc<A>, config: &BotConfig) -> Self {
        Self {
            api,
            connector: Arc::new(WsConnector),
            settings: BotSettings {
                channel_url: config.channel_url.clone(),
                reconnect_backoff: config.reconnect_backoff,
                queue_capacity: config.queue_capacity.max(1),
                reply_timings: config.reply_timings,
            },
            rules: Vec::new(),
        }
    }

    /// Replace the WebSocket connector.
    pub fn with_connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.rules.len()
    }

    /// Register a handler. Rules fire in registration order.
    pub fn add_handler(&mut self, predicate: Predicate, handler: impl MessageHandler + 'static) -> &mut Self {
        self.rules.push(Rule::new(predicate, handler));
        self
    }

    /// Handle every message.
    pub fn on_message<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_handler(Predicate::Always, handler)
    }

    /// Handle the first message of a new dialog.
    pub fn on_first_message<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_handler(Predicate::FirstMessage, handler)
    }

    /// Handle messages equal to `text`, ignoring case.
    pub fn on_text<F, Fut>(&mut self, text: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_handler(Predicate::Text(text.into()), handler)
    }

    /// Handle messages containing the word `word`, ignoring case and punctuation.
    pub fn on_text_contains<F, Fut>(&mut self, word: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_handler(Predicate::TextContains(word.into()), handler)
    }

    /// Listen and dispatch until `cancel` fires.
    ///
    /// Fails with [`BotError::NoHandlers`] before connecting when no rule is
    /// registered. Cancellation ends with [`BotError::Cancelled`]. The
    /// rule list is frozen for the lifetime of the run.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), BotError> {
        if self.rules.is_empty() {
            return Err(BotError::NoHandlers);
        }

        info!(handlers = self.rules.len(), "Bot is running!");

        let decoder = EventDecoder::new(self.api.clone(), self.settings.reply_timings);
        let listener = PushListener::new(
            self.api.clone(),
            decoder,
            self.connector.clone(),
            self.settings.channel_url.clone(),
            self.settings.reconnect_backoff,
        );
        let dispatcher = Dispatcher::new(self.rules, self.api.clone());

        let (tx, mut rx) = mpsc::channel::<InboundMessage>(self.settings.queue_capacity);
        let listener_cancel = cancel.clone();
        let listener_task = tokio::spawn(async move { listener.run(tx, listener_cancel).await });

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    if let Err(e) = listener_task.await {
                        warn!(error = %e, "Push listener task failed during shutdown");
                    }
                    info!("Bot stopped");
                    return Err(BotError::Cancelled);
                }
                message = rx.recv() => match message {
                    Some(message) => {
                        dispatcher.dispatch(&message).await;
                    }
                    None => {
                        return match listener_task.await {
                            Ok(Ok(())) => Ok(()),
                            Ok(Err(ChannelError::Cancelled)) => Err(BotError::Cancelled),
                            Ok(Err(e)) => Err(BotError::Channel(e)),
                            Err(e) => Err(BotError::Channel(ChannelError::Read(e.to_string()))),
                        };
                    }
                },
            }
        }
    }
}
