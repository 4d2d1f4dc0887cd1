// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Management
//!
//! Types for defining AMQP queues and queue-to-exchange bindings. Queue
//! definitions support standard options plus message TTL, max length, and an
//! optional companion dead-letter queue for rejected messages.

/// Definition of a queue with its configuration parameters.
///
/// This struct implements the builder pattern to create and configure queue
/// definitions before they are installed by the topology admin.
#[derive(Debug, Clone, Default)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) delete: bool,
    pub(crate) exclusive: bool,
    pub(crate) passive: bool,
    pub(crate) no_wait: bool,
    pub(crate) ttl: Option<i32>,
    pub(crate) max_length: Option<i32>,
    pub(crate) dlq_name: Option<String>,
}

impl QueueDefinition {
    /// Creates a new queue definition with the given name and default
    /// settings (non-durable, non-exclusive, no TTL, no DLQ).
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            ..QueueDefinition::default()
        }
    }

    /// Makes the queue durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Sets the queue to auto-delete when no longer used.
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Makes the queue exclusive to the connection.
    ///
    /// Exclusive queues are deleted when the connection closes.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Sets the message Time-To-Live for the queue, in milliseconds.
    ///
    /// Messages that exceed this TTL are removed from the queue, or
    /// dead-lettered if a DLQ is configured.
    pub fn ttl(mut self, ttl: i32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the maximum number of messages the queue can hold.
    ///
    /// When the limit is reached the oldest messages are discarded, or
    /// dead-lettered if a DLQ is configured.
    pub fn max_length(mut self, max: i32) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Adds a companion dead-letter queue.
    ///
    /// The DLQ receives messages that are rejected without requeue, expire,
    /// or overflow from the main queue. Its name is the queue name with a
    /// "-dlq" suffix.
    pub fn with_dlq(mut self) -> Self {
        self.dlq_name = Some(format!("{}-dlq", self.name));
        self
    }

    /// The queue name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Configuration for binding a queue to an exchange.
///
/// A binding defines how messages flow from an exchange to a queue based on
/// the routing key and the exchange type. Multiple bindings per queue are
/// allowed.
pub struct QueueBinding<'qeb> {
    pub(crate) queue_name: &'qeb str,
    pub(crate) exchange_name: &'qeb str,
    pub(crate) routing_key: &'qeb str,
}

impl<'qeb> QueueBinding<'qeb> {
    /// Creates a new binding for the given queue.
    ///
    /// The exchange name and routing key default to empty strings and should
    /// be set with `exchange` and `routing_key`.
    pub fn new(queue: &'qeb str) -> QueueBinding<'qeb> {
        QueueBinding {
            queue_name: queue,
            exchange_name: "",
            routing_key: "",
        }
    }

    /// Sets the exchange to bind the queue to.
    pub fn exchange(mut self, exchange: &'qeb str) -> Self {
        self.exchange_name = exchange;
        self
    }

    /// Sets the routing key for the binding.
    pub fn routing_key(mut self, key: &'qeb str) -> Self {
        self.routing_key = key;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let def = QueueDefinition::new("orders.queue");
        assert_eq!(def.name(), "orders.queue");
        assert!(!def.durable);
        assert!(def.dlq_name.is_none());
    }

    #[test]
    fn dlq_name_derives_from_queue_name() {
        let def = QueueDefinition::new("orders.queue").durable().with_dlq();
        assert_eq!(def.dlq_name.as_deref(), Some("orders.queue-dlq"));
        assert!(def.durable);
    }

    #[test]
    fn binding_builder_chains() {
        let binding = QueueBinding::new("orders.queue")
            .exchange("orders.direct")
            .routing_key("orders.created");
        assert_eq!(binding.queue_name, "orders.queue");
        assert_eq!(binding.exchange_name, "orders.direct");
        assert_eq!(binding.routing_key, "orders.created");
    }
}
