//! Step-buffered publish/subscribe message bus.
//!
//! The bus is the only communication channel between agents. It is
//! in-process and synchronous: `publish` stages a message, and the
//! scheduler's dispatch phase moves staged messages into per-subscriber
//! inboxes with [`MessageBus::flush`]. A message staged during dispatch
//! round *r* becomes visible no earlier than round *r+1*, and never to a
//! subscriber already processed within the same round. This prevents
//! order-dependent read-after-write races inside a step.
//!
//! Delivery is FIFO per topic (publish order) and unspecified across
//! topics. Publishing to a topic with no subscribers is a no-op, never
//! an error.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod bus;
mod message;
mod topic;

pub use bus::{MessageBus, SubscriberId};
pub use message::Message;
pub use topic::Topic;
