//! Job handlers for the email and interaction queues

mod email;
mod interaction;

pub use email::EmailDeliveryHandler;
pub use interaction::InteractionHandler;
