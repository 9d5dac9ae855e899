//! Publish-side topic handle.

use repubsub_core::MessageStore;
use repubsub_proto::{Payload, TopicValue};

use crate::error::Error;
use crate::exchange::Exchange;

/// A topic value bound to an exchange.
pub struct Topic<S: MessageStore + ?Sized> {
    exchange: Exchange<S>,
    value: TopicValue,
}

impl<S: MessageStore + ?Sized> Topic<S> {
    pub(crate) fn new(exchange: Exchange<S>, value: TopicValue) -> Self {
        Self { exchange, value }
    }

    /// The bound topic value.
    pub fn value(&self) -> &TopicValue {
        &self.value
    }

    /// Publish `payload` to the bound topic.
    pub async fn publish(&self, payload: Payload) -> Result<(), Error> {
        self.exchange.publish(self.value.clone(), payload).await
    }
}

impl<S: MessageStore + ?Sized> Clone for Topic<S> {
    fn clone(&self) -> Self {
        Self {
            exchange: self.exchange.clone(),
            value: self.value.clone(),
        }
    }
}

impl<S: MessageStore + ?Sized> std::fmt::Debug for Topic<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic")
            .field("exchange", &self.exchange.name())
            .field("value", &self.value)
            .finish()
    }
}
