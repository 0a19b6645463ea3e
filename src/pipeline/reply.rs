//! Outbound answers for handlers.
//!
//! `answer_simulation` pauses, shows "typing", pauses again, then sends,
//! so replies look like a person wrote them. `fast_answer` just sends.
//! Both stop at the first failed call.

use std::time::Duration;

use tracing::debug;

use crate::error::ApiError;
use crate::pipeline::types::InboundMessage;

/// Delays used by [`InboundMessage::answer_simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTimings {
    /// Wait before the typing indicator is shown.
    pub typing_delay: Duration,
    /// Wait between the typing indicator and the message.
    pub send_delay: Duration,
}

impl ReplyTimings {
    /// No waiting at all.
    pub const IMMEDIATE: Self = Self {
        typing_delay: Duration::ZERO,
        send_delay: Duration::ZERO,
    };
}

impl Default for ReplyTimings {
    fn default() -> Self {
        Self {
            typing_delay: Duration::from_secs(2),
            send_delay: Duration::from_secs(2),
        }
    }
}

impl InboundMessage {
    /// Reply to the sender with simulated typing.
    pub async fn answer_simulation(&self, text: &str) -> Result<(), ApiError> {
        tokio::time::sleep(self.timings.typing_delay).await;
        self.responder.set_typing(self.from_id).await?;
        debug!(to = self.from_id, "Typing indicator sent");

        tokio::time::sleep(self.timings.send_delay).await;
        self.responder.send_text(self.from_id, text).await
    }

    /// Reply to the sender right away.
    pub async fn fast_answer(&self, text: &str) -> Result<(), ApiError> {
        self.responder.send_text(self.from_id, text).await
    }
}
