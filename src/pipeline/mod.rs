//! Inbound message pipeline.
//!
//! Every decoded message flows through:
//! 1. `Predicate::matches()` for each registered rule, in order
//! 2. `Dispatcher::dispatch()`: every matching handler, sequentially
//! 3. `InboundMessage::answer_simulation()` / `fast_answer()`: replies
//!    back through the API the message was decoded with

pub mod dispatcher;
pub mod reply;
pub mod rules;
pub mod types;
