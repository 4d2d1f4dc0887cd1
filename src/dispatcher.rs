// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Dispatcher
//!
//! Push-style consumption. Handlers are registered per queue and message
//! type together with a `FailurePolicy`, then the dispatcher runs blocking
//! consume loops driven by lapin's delivery stream. Each loop runs on a
//! spawned task distinct from the caller; the facade performs no scheduling
//! of its own beyond that.

use crate::{
    consumer::{consume, FailurePolicy},
    errors::AmqpError,
    handler::ConsumerHandler,
};
use async_trait::async_trait;
use futures_util::{future::join_all, StreamExt};
use lapin::{options::BasicConsumeOptions, types::FieldTable, Channel};
use std::{collections::HashMap, sync::Arc};
use tracing::error;

/// A registered subscription: the queue it consumes, the failure policy, and
/// the handler invoked per delivery.
#[derive(Clone)]
pub(crate) struct AmqpDispatcherDefinition {
    pub(crate) queue: String,
    pub(crate) policy: FailurePolicy,
    pub(crate) handler: Arc<dyn ConsumerHandler>,
}

/// Trait defining the interface for push-style consumption.
#[async_trait]
pub trait Dispatcher {
    /// Registers a handler for a message type on a queue.
    fn register(
        self,
        queue: &str,
        msg_type: &str,
        policy: FailurePolicy,
        handler: Arc<dyn ConsumerHandler>,
    ) -> Self;

    /// Starts consuming and blocks for the lifetime of the subscription.
    async fn consume_blocking(&self) -> Result<(), AmqpError>;
}

/// Lapin-backed implementation of the Dispatcher trait.
///
/// Routes received messages to the handler registered for the consuming
/// queue and the delivery's type tag. Delivery order within one queue follows
/// broker delivery order; acknowledgment is at-least-once (ack after the
/// handler succeeds).
pub struct AmqpDispatcher {
    channel: Arc<Channel>,
    pub(crate) dispatchers_def: HashMap<(String, String), AmqpDispatcherDefinition>,
}

impl AmqpDispatcher {
    pub fn new(channel: Arc<Channel>) -> Self {
        AmqpDispatcher {
            channel,
            dispatchers_def: HashMap::default(),
        }
    }
}

/// Inserts a subscription keyed by queue and type tag. The same type may be
/// registered on any number of queues; a later registration for the same
/// queue and type replaces the earlier one.
fn register_definition(
    defs: &mut HashMap<(String, String), AmqpDispatcherDefinition>,
    queue: &str,
    msg_type: &str,
    policy: FailurePolicy,
    handler: Arc<dyn ConsumerHandler>,
) {
    defs.insert(
        (queue.to_owned(), msg_type.to_owned()),
        AmqpDispatcherDefinition {
            queue: queue.to_owned(),
            policy,
            handler,
        },
    );
}

/// The subscriptions registered for one queue, keyed by type tag. This is
/// the map a consume loop dispatches against.
fn definitions_for_queue(
    defs: &HashMap<(String, String), AmqpDispatcherDefinition>,
    queue: &str,
) -> HashMap<String, AmqpDispatcherDefinition> {
    defs.iter()
        .filter(|((q, _), _)| q.as_str() == queue)
        .map(|((_, msg_type), def)| (msg_type.clone(), def.clone()))
        .collect()
}

/// The distinct queues with at least one registration, one consume loop each.
fn registered_queues(defs: &HashMap<(String, String), AmqpDispatcherDefinition>) -> Vec<&str> {
    let mut queues: Vec<&str> = defs.keys().map(|(queue, _)| queue.as_str()).collect();
    queues.sort_unstable();
    queues.dedup();
    queues
}

#[async_trait]
impl Dispatcher for AmqpDispatcher {
    fn register(
        mut self,
        queue: &str,
        msg_type: &str,
        policy: FailurePolicy,
        handler: Arc<dyn ConsumerHandler>,
    ) -> Self {
        register_definition(&mut self.dispatchers_def, queue, msg_type, policy, handler);
        self
    }

    async fn consume_blocking(&self) -> Result<(), AmqpError> {
        self.consume_blocking_single().await
    }
}

impl AmqpDispatcher {
    /// Consumes from the first registered queue until the stream ends.
    ///
    /// Suitable when all registrations share one queue. Deliveries are
    /// dispatched by type tag; per-delivery failures are logged and handled
    /// by the registered policy, never aborting the loop.
    pub async fn consume_blocking_single(&self) -> Result<(), AmqpError> {
        let queues = registered_queues(&self.dispatchers_def);
        let Some(queue) = queues.first().copied() else {
            return Err(AmqpError::ConsumerError("no handler registered".to_owned()));
        };

        let mut consumer = match self
            .channel
            .basic_consume(
                queue,
                queue,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: false,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to create the consumer");
                Err(AmqpError::BindingConsumerError(queue.to_owned()))
            }
            Ok(c) => Ok(c),
        }?;

        let defs = definitions_for_queue(&self.dispatchers_def, queue);

        let spawned = tokio::spawn(async move {
            while let Some(result) = consumer.next().await {
                match result {
                    Ok(delivery) => {
                        if let Err(err) = consume(&delivery, &defs).await {
                            error!(error = err.to_string(), "error consume msg");
                        }
                    }

                    Err(err) => error!(error = err.to_string(), "errors consume msg"),
                }
            }
        })
        .await;

        if spawned.is_err() {
            return Err(AmqpError::ConsumerError("consume task failed".to_owned()));
        }

        Ok(())
    }

    /// Consumes from every registered queue, one spawned loop per distinct
    /// queue, processing deliveries in parallel as they arrive.
    pub async fn consume_blocking_multi(&self) -> Result<(), AmqpError> {
        let mut spawns = vec![];

        for queue in registered_queues(&self.dispatchers_def) {
            let mut consumer = match self
                .channel
                .basic_consume(
                    queue,
                    queue,
                    BasicConsumeOptions {
                        no_local: false,
                        no_ack: false,
                        exclusive: false,
                        nowait: false,
                    },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(error = err.to_string(), "failure to create the consumer");
                    Err(AmqpError::BindingConsumerError(queue.to_owned()))
                }
                Ok(c) => Ok(c),
            }?;

            let defs = definitions_for_queue(&self.dispatchers_def, queue);

            spawns.push(tokio::spawn(async move {
                while let Some(result) = consumer.next().await {
                    match result {
                        Ok(delivery) => {
                            if let Err(err) = consume(&delivery, &defs).await {
                                error!(error = err.to_string(), "error consume msg")
                            }
                        }

                        Err(err) => error!(error = err.to_string(), "errors consume msg"),
                    }
                }
            }));
        }

        let spawned = join_all(spawns).await;
        for res in spawned {
            if res.is_err() {
                error!("tokio process error");
                return Err(AmqpError::InternalError);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::AmqpError, handler::MockConsumerHandler, message::ConsumerMessage};

    #[test]
    fn register_stores_definition_by_queue_and_type() {
        let mut defs = HashMap::default();
        register_definition(
            &mut defs,
            "orders.queue",
            "OrderCreated",
            FailurePolicy::Requeue,
            Arc::new(MockConsumerHandler::new()),
        );

        let def = defs
            .get(&("orders.queue".to_owned(), "OrderCreated".to_owned()))
            .unwrap();
        assert_eq!(def.queue, "orders.queue");
        assert_eq!(def.policy, FailurePolicy::Requeue);
    }

    #[test]
    fn same_type_on_two_queues_keeps_both_subscriptions() {
        let mut defs = HashMap::default();
        register_definition(
            &mut defs,
            "orders.queue",
            "OrderCreated",
            FailurePolicy::Discard,
            Arc::new(MockConsumerHandler::new()),
        );
        register_definition(
            &mut defs,
            "audit.queue",
            "OrderCreated",
            FailurePolicy::DeadLetter,
            Arc::new(MockConsumerHandler::new()),
        );

        assert_eq!(defs.len(), 2);
        assert_eq!(registered_queues(&defs), vec!["audit.queue", "orders.queue"]);
        assert_eq!(
            defs[&("orders.queue".to_owned(), "OrderCreated".to_owned())].policy,
            FailurePolicy::Discard
        );
        assert_eq!(
            defs[&("audit.queue".to_owned(), "OrderCreated".to_owned())].policy,
            FailurePolicy::DeadLetter
        );
    }

    #[test]
    fn register_replaces_existing_queue_and_type() {
        let mut defs = HashMap::default();
        register_definition(
            &mut defs,
            "orders.queue",
            "OrderCreated",
            FailurePolicy::Discard,
            Arc::new(MockConsumerHandler::new()),
        );
        register_definition(
            &mut defs,
            "orders.queue",
            "OrderCreated",
            FailurePolicy::DeadLetter,
            Arc::new(MockConsumerHandler::new()),
        );

        assert_eq!(defs.len(), 1);
        let def = defs
            .get(&("orders.queue".to_owned(), "OrderCreated".to_owned()))
            .unwrap();
        assert_eq!(def.policy, FailurePolicy::DeadLetter);
    }

    #[test]
    fn definitions_for_queue_filters_other_queues_out() {
        let mut defs = HashMap::default();
        register_definition(
            &mut defs,
            "orders.queue",
            "OrderCreated",
            FailurePolicy::Discard,
            Arc::new(MockConsumerHandler::new()),
        );
        register_definition(
            &mut defs,
            "orders.queue",
            "OrderCancelled",
            FailurePolicy::Requeue,
            Arc::new(MockConsumerHandler::new()),
        );
        register_definition(
            &mut defs,
            "audit.queue",
            "OrderCreated",
            FailurePolicy::DeadLetter,
            Arc::new(MockConsumerHandler::new()),
        );

        let for_orders = definitions_for_queue(&defs, "orders.queue");
        assert_eq!(for_orders.len(), 2);
        assert_eq!(for_orders["OrderCreated"].policy, FailurePolicy::Discard);
        assert_eq!(for_orders["OrderCancelled"].policy, FailurePolicy::Requeue);

        let for_audit = definitions_for_queue(&defs, "audit.queue");
        assert_eq!(for_audit.len(), 1);
        assert_eq!(for_audit["OrderCreated"].policy, FailurePolicy::DeadLetter);
    }

    #[tokio::test]
    async fn dispatch_invokes_the_handler_registered_for_the_queue() {
        let mut handler = MockConsumerHandler::new();
        handler.expect_exec().times(1).returning(|_| Ok(()));
        let mut other = MockConsumerHandler::new();
        other.expect_exec().times(0);

        let mut defs = HashMap::default();
        register_definition(
            &mut defs,
            "orders.queue",
            "OrderCreated",
            FailurePolicy::Discard,
            Arc::new(handler),
        );
        register_definition(
            &mut defs,
            "audit.queue",
            "OrderCreated",
            FailurePolicy::Discard,
            Arc::new(other),
        );

        let for_orders = definitions_for_queue(&defs, "orders.queue");
        let def = for_orders.get("OrderCreated").unwrap();
        let msg = ConsumerMessage::new("orders.queue", "OrderCreated", b"{}");

        assert!(def.handler.exec(&msg).await.is_ok());
    }

    #[tokio::test]
    async fn handler_failure_surfaces_to_the_dispatch_path() {
        let mut handler = MockConsumerHandler::new();
        handler
            .expect_exec()
            .returning(|_| Err(AmqpError::DecodeError("malformed body".to_owned())));

        let mut defs = HashMap::default();
        register_definition(
            &mut defs,
            "orders.queue",
            "OrderCreated",
            FailurePolicy::Requeue,
            Arc::new(handler),
        );

        let for_orders = definitions_for_queue(&defs, "orders.queue");
        let def = for_orders.get("OrderCreated").unwrap();
        let msg = ConsumerMessage::new("orders.queue", "OrderCreated", b"not json");

        let err = def.handler.exec(&msg).await.unwrap_err();
        assert!(matches!(err, AmqpError::DecodeError(_)));
    }
}
