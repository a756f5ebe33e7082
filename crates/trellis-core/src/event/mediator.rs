use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::event::error::EventSystemError;
use crate::event::topic::{validate_topic, TopicPattern};
use crate::event::{AsyncEventHandler, Event, EventResult, SubscriptionId};
use crate::logging::Logger;

const DEFAULT_DELIMITER: &str = ":";
const DEFAULT_MAX_LISTENERS: usize = 100;

/// Mediator options, read from `application.mediator`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MediatorOptions {
    /// Enable `*` / `**` segments in subscription patterns
    pub wildcard: bool,
    /// Separator between topic segments
    pub delimiter: String,
    /// Subscriptions per pattern above which a leak warning is logged; 0 disables the check
    #[serde(alias = "maxListeners")]
    pub max_listeners: usize,
}

impl Default for MediatorOptions {
    fn default() -> Self {
        Self {
            wildcard: true,
            delimiter: DEFAULT_DELIMITER.to_string(),
            max_listeners: DEFAULT_MAX_LISTENERS,
        }
    }
}

struct Subscription {
    id: SubscriptionId,
    pattern: TopicPattern,
    once: bool,
    handler: Arc<dyn AsyncEventHandler>,
}

#[derive(Default)]
struct MediatorState {
    next_id: SubscriptionId,
    subscriptions: Vec<Subscription>,
    leak_warned: HashSet<String>,
}

/// Process-wide topic publish/subscribe bus
pub struct Mediator {
    options: MediatorOptions,
    logger: Logger,
    state: RwLock<MediatorState>,
}

impl fmt::Debug for Mediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Mediator {
    pub fn new(options: MediatorOptions, logger: Logger) -> Result<Self, EventSystemError> {
        if options.wildcard && options.delimiter.is_empty() {
            return Err(EventSystemError::InvalidOptions(
                "delimiter must not be empty when wildcards are enabled".to_string(),
            ));
        }
        Ok(Self {
            options,
            logger,
            state: RwLock::new(MediatorState {
                next_id: 1,
                ..MediatorState::default()
            }),
        })
    }

    pub fn options(&self) -> &MediatorOptions {
        &self.options
    }

    /// Subscribe `handler` to every topic matching `pattern`
    pub async fn on<H>(&self, pattern: &str, handler: H) -> Result<SubscriptionId, EventSystemError>
    where
        H: AsyncEventHandler + 'static,
    {
        self.subscribe(pattern, Arc::new(handler), false).await
    }

    /// Subscribe `handler` for the first matching event only
    pub async fn once<H>(&self, pattern: &str, handler: H) -> Result<SubscriptionId, EventSystemError>
    where
        H: AsyncEventHandler + 'static,
    {
        self.subscribe(pattern, Arc::new(handler), true).await
    }

    async fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn AsyncEventHandler>,
        once: bool,
    ) -> Result<SubscriptionId, EventSystemError> {
        let pattern = TopicPattern::parse(pattern, &self.options.delimiter, self.options.wildcard)?;
        let mut state = self.state.write().await;

        let id = state.next_id;
        state.next_id += 1;

        let same_pattern = state
            .subscriptions
            .iter()
            .filter(|s| s.pattern == pattern)
            .count()
            + 1;
        let max = self.options.max_listeners;
        if max > 0 && same_pattern > max && state.leak_warned.insert(pattern.as_str().to_string()) {
            self.logger.warn(format!(
                "possible memory leak detected: {} listeners added for '{}', max is {}",
                same_pattern, pattern, max
            ));
        }

        state.subscriptions.push(Subscription {
            id,
            pattern,
            once,
            handler,
        });
        Ok(id)
    }

    /// Remove a subscription; returns whether it existed
    pub async fn off(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.write().await;
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != id);
        state.subscriptions.len() < before
    }

    pub async fn remove_all(&self) {
        let mut state = self.state.write().await;
        state.subscriptions.clear();
        state.leak_warned.clear();
    }

    /// Number of subscriptions that would receive `topic`
    pub async fn listener_count(&self, topic: &str) -> usize {
        let state = self.state.read().await;
        state
            .subscriptions
            .iter()
            .filter(|s| s.pattern.matches(topic, &self.options.delimiter))
            .count()
    }

    /// Publish `topic` to every matching subscription in subscription order.
    ///
    /// Returns the number of handlers invoked. A handler returning
    /// [`EventResult::Stop`] ends propagation. Handlers run without the
    /// subscription lock held, so they may subscribe or emit themselves.
    pub async fn emit(&self, topic: &str, payload: Option<Value>) -> Result<usize, EventSystemError> {
        validate_topic(topic, &self.options.delimiter, self.options.wildcard)?;

        let matched: Vec<(SubscriptionId, bool, Arc<dyn AsyncEventHandler>)> = {
            let state = self.state.read().await;
            let delimiter = &self.options.delimiter;
            state
                .subscriptions
                .iter()
                .filter(|s| s.pattern.matches(topic, delimiter))
                .map(|s| (s.id, s.once, s.handler.clone()))
                .collect()
        };

        self.logger
            .trace(format!("emit '{}' to {} listener(s)", topic, matched.len()));

        let event = Event::new(topic, payload);
        let mut invoked = 0;
        for (id, once, handler) in matched {
            // a `once` subscription is consumed only when it is delivered
            if once && !self.off(id).await {
                continue;
            }
            invoked += 1;
            if handler.handle(&event).await == EventResult::Stop {
                break;
            }
        }
        Ok(invoked)
    }
}
