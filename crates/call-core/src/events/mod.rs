//! Call event dispatch
//!
//! The engine publishes every accepted transition, attribute change and
//! session event to the [`EventDispatcher`]. Each subscription owns a queue
//! and a delivery task, so publishing never waits on a handler and a slow
//! handler only delays itself.

pub mod dispatcher;
pub mod receipt;
pub mod subscriber;
pub mod types;

pub use dispatcher::{CallEventHandler, EventDispatcher, SubscriptionId};
pub use receipt::DeliveryReceipt;
pub use subscriber::EventSubscriber;
pub use types::*;
