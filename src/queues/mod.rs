//! Job payloads and the producer API used by request handlers

mod payloads;
mod producer;

pub use payloads::{EmailJob, InteractionJob};
pub use producer::Producer;
