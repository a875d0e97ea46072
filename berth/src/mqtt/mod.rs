//! MQTT message bus plumbing

pub mod client;
pub mod topics;
