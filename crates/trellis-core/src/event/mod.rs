pub mod error;
pub mod mediator;
pub mod topic;

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

/// Type for subscription identifiers
pub type SubscriptionId = u64;

/// Result of event processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    /// Event was processed successfully and propagation should continue
    Continue,
    /// Event was processed and propagation should stop
    Stop,
}

/// A published event: a concrete topic and an optional opaque payload
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    topic: String,
    payload: Option<Value>,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}

/// Asynchronous event handler trait
#[async_trait]
pub trait AsyncEventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> EventResult;
}

/// Handler built from a closure returning a future, see [`handler_fn`]
pub struct FnHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> AsyncEventHandler for FnHandler<F, Fut>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = EventResult> + Send,
{
    async fn handle(&self, event: &Event) -> EventResult {
        (self.f)(event.clone()).await
    }
}

/// Wrap an async closure as a handler. The closure receives its own copy of the event.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F, Fut>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = EventResult> + Send,
{
    FnHandler {
        f,
        _marker: PhantomData,
    }
}

/// Handler built from a synchronous closure, see [`sync_handler`]
pub struct SyncHandler<F> {
    f: F,
}

#[async_trait]
impl<F> AsyncEventHandler for SyncHandler<F>
where
    F: Fn(&Event) -> EventResult + Send + Sync,
{
    async fn handle(&self, event: &Event) -> EventResult {
        (self.f)(event)
    }
}

/// Helper function to create synchronous handlers that are compatible with the async mediator
pub fn sync_handler<F>(f: F) -> SyncHandler<F>
where
    F: Fn(&Event) -> EventResult + Send + Sync,
{
    SyncHandler { f }
}

pub use error::EventSystemError;
pub use mediator::{Mediator, MediatorOptions};
pub use topic::TopicPattern;

// Test module declaration
#[cfg(test)]
mod tests;
