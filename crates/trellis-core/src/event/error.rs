//! # Trellis Event System Errors
//!
//! Defines [`EventSystemError`], raised when a subscription pattern or an
//! emitted topic is malformed or mediator options cannot be applied.
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventSystemError {
    #[error("Invalid subscription pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: String },

    #[error("Invalid mediator options: {0}")]
    InvalidOptions(String),
}
