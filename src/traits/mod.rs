//! Trait definitions for the swappable parts of the job system
//!
//! Queue backends, mail transports and notification stores are all reached
//! through these traits so workers can be tested against in-memory fakes.

pub mod job;
pub mod mailer;
