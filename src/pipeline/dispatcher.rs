//! Rule dispatcher: fans each message out to every matching handler.
//!
//! Rules are evaluated in registration order and every handler whose
//! predicate holds is awaited before the next rule is looked at. A
//! failing handler is logged and skipped; it never stops the others.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::api::KworkApi;
use crate::pipeline::rules::Rule;
use crate::pipeline::types::InboundMessage;

/// Immutable, ordered rule list plus the API its predicates may query.
pub struct Dispatcher {
    rules: Arc<[Rule]>,
    api: Arc<dyn KworkApi>,
}

impl Dispatcher {
    pub fn new(rules: impl Into<Arc<[Rule]>>, api: Arc<dyn KworkApi>) -> Self {
        Self {
            rules: rules.into(),
            api,
        }
    }

    /// Run every matching handler for one message, sequentially.
    ///
    /// Returns the number of handlers that were invoked.
    pub async fn dispatch(&self, message: &InboundMessage) -> usize {
        let mut fired = 0;

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.predicate.matches(message, self.api.as_ref()).await {
                continue;
            }

            info!(rule = index, text = %message.text, "Found handler for message");
            fired += 1;

            if let Err(e) = rule.handle(message.clone()).await {
                error!(
                    rule = index,
                    predicate = ?rule.predicate,
                    from_id = message.from_id,
                    error = %e,
                    "Handler error"
                );
            }
        }

        debug!(from_id = message.from_id, fired, "Message dispatched");
        fired
    }
}
