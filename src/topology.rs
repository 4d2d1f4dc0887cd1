// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Topology Management
//!
//! This module declares broker topology: exchanges, queues, and the bindings
//! between them. Declarations are idempotent on the broker side; redeclaring
//! an identical entity is a no-op, while a mismatched redeclare surfaces as
//! `AmqpError::TopologyConflict`. Binding a missing queue or exchange
//! surfaces as `AmqpError::NotFound`.
//!
//! The main components are:
//! - `Topology` trait: interface for topology management
//! - `AmqpTopology`: implementation of the Topology trait over a lapin channel

use crate::{
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
    routing,
};
use async_trait::async_trait;
use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable, LongInt, LongString, ShortString},
    Channel,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::{debug, error};

/// Queue argument naming the exchange rejected messages are dead-lettered to
pub const AMQP_HEADERS_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";
/// Queue argument naming the routing key used when dead-lettering
pub const AMQP_HEADERS_DEAD_LETTER_ROUTING_KEY: &str = "x-dead-letter-routing-key";
/// Queue argument for per-queue message TTL
pub const AMQP_HEADERS_MESSAGE_TTL: &str = "x-message-ttl";
/// Queue argument for maximum queue length
pub const AMQP_HEADERS_MAX_LENGTH: &str = "x-max-length";

/// Trait defining the interface for topology management.
///
/// Exchanges, queues, and bindings are registered on the builder and created
/// on the broker by a single `install` call. Installed entities persist in
/// the broker independent of any client process.
#[async_trait]
pub trait Topology<'tp> {
    /// Adds an exchange definition to the topology.
    fn exchange(self, def: &'tp ExchangeDefinition) -> Self;

    /// Adds a queue definition to the topology.
    fn queue(self, def: &'tp QueueDefinition) -> Self;

    /// Adds a queue-to-exchange binding to the topology.
    fn queue_binding(self, binding: &'tp QueueBinding) -> Self;

    /// Installs the topology to the broker: all exchanges, then all queues
    /// (with their companion DLQs), then all bindings.
    async fn install(&self) -> Result<(), AmqpError>;
}

/// Lapin-backed implementation of the Topology trait.
pub struct AmqpTopology<'tp> {
    channel: Arc<Channel>,
    pub(crate) queues: HashMap<&'tp str, &'tp QueueDefinition>,
    pub(crate) queues_binding: Vec<&'tp QueueBinding<'tp>>,
    pub(crate) exchanges: Vec<&'tp ExchangeDefinition<'tp>>,
}

impl<'tp> AmqpTopology<'tp> {
    /// Creates a new topology builder over the given channel.
    pub fn new(channel: Arc<Channel>) -> AmqpTopology<'tp> {
        AmqpTopology {
            channel,
            queues: HashMap::default(),
            queues_binding: vec![],
            exchanges: vec![],
        }
    }
}

#[async_trait]
impl<'tp> Topology<'tp> for AmqpTopology<'tp> {
    fn exchange(mut self, def: &'tp ExchangeDefinition) -> Self {
        self.exchanges.push(def);
        self
    }

    fn queue(mut self, def: &'tp QueueDefinition) -> Self {
        self.queues.insert(&def.name, def);
        self
    }

    fn queue_binding(mut self, binding: &'tp QueueBinding) -> Self {
        self.queues_binding.push(binding);
        self
    }

    async fn install(&self) -> Result<(), AmqpError> {
        self.install_exchanges().await?;
        self.install_queues().await?;
        self.install_bindings().await
    }
}

impl<'tp> AmqpTopology<'tp> {
    async fn install_exchanges(&self) -> Result<(), AmqpError> {
        for exch in &self.exchanges {
            debug!("creating exchange: {}", exch.name);

            match self
                .channel
                .exchange_declare(
                    exch.name,
                    exch.kind.into(),
                    ExchangeDeclareOptions {
                        passive: exch.passive,
                        durable: exch.durable,
                        auto_delete: exch.delete,
                        internal: false,
                        nowait: exch.no_wait,
                    },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        name = exch.name,
                        "error to declare the exchange"
                    );
                    Err(AmqpError::classify(
                        &err,
                        exch.name,
                        AmqpError::DeclareExchangeError(exch.name.to_owned()),
                    ))
                }
                _ => Ok(()),
            }?;

            debug!("exchange: {} was created", exch.name);
        }

        Ok(())
    }

    async fn install_queues(&self) -> Result<(), AmqpError> {
        for (name, def) in &self.queues {
            debug!("creating queue: {}", name);

            let mut queue_args = BTreeMap::new();

            if def.dlq_name.is_some() {
                self.declare_dlq(def, &mut queue_args).await?;
            }

            if let Some(ttl) = def.ttl {
                queue_args.insert(
                    ShortString::from(AMQP_HEADERS_MESSAGE_TTL),
                    AMQPValue::LongInt(LongInt::from(ttl)),
                );
            }

            if let Some(max) = def.max_length {
                queue_args.insert(
                    ShortString::from(AMQP_HEADERS_MAX_LENGTH),
                    AMQPValue::LongInt(LongInt::from(max)),
                );
            }

            match self
                .channel
                .queue_declare(
                    name,
                    QueueDeclareOptions {
                        passive: def.passive,
                        durable: def.durable,
                        exclusive: def.exclusive,
                        auto_delete: def.delete,
                        nowait: def.no_wait,
                    },
                    FieldTable::from(queue_args),
                )
                .await
            {
                Err(err) => {
                    error!(error = err.to_string(), name = *name, "error to declare the queue");
                    Err(AmqpError::classify(
                        &err,
                        name,
                        AmqpError::DeclareQueueError((*name).to_owned()),
                    ))
                }
                _ => {
                    debug!("queue: {} was created", name);
                    Ok(())
                }
            }?;
        }

        Ok(())
    }

    /// Declares the companion dead-letter queue and wires the main queue's
    /// dead-letter arguments to it through the default exchange.
    async fn declare_dlq(
        &self,
        def: &QueueDefinition,
        queue_args: &mut BTreeMap<ShortString, AMQPValue>,
    ) -> Result<(), AmqpError> {
        let dlq_name = def.dlq_name.clone().unwrap_or_default();

        match self
            .channel
            .queue_declare(
                &dlq_name,
                QueueDeclareOptions {
                    passive: def.passive,
                    durable: def.durable,
                    exclusive: def.exclusive,
                    auto_delete: def.delete,
                    nowait: def.no_wait,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "failure to declare dead-letter queue");
                Err(AmqpError::classify(
                    &err,
                    &dlq_name,
                    AmqpError::DeclareQueueError(dlq_name.clone()),
                ))
            }
            _ => {
                queue_args.insert(
                    ShortString::from(AMQP_HEADERS_DEAD_LETTER_EXCHANGE),
                    AMQPValue::LongString(LongString::from("")),
                );
                queue_args.insert(
                    ShortString::from(AMQP_HEADERS_DEAD_LETTER_ROUTING_KEY),
                    AMQPValue::LongString(LongString::from(dlq_name)),
                );
                Ok(())
            }
        }
    }

    async fn install_bindings(&self) -> Result<(), AmqpError> {
        for binding in &self.queues_binding {
            if let Err(err) = validate_binding(binding) {
                error!(
                    routing_key = binding.routing_key,
                    queue = binding.queue_name,
                    "malformed binding routing key"
                );
                return Err(err);
            }

            debug!(
                "binding queue: {} to the exchange: {} with the key: {}",
                binding.queue_name, binding.exchange_name, binding.routing_key
            );

            match self
                .channel
                .queue_bind(
                    binding.queue_name,
                    binding.exchange_name,
                    binding.routing_key,
                    QueueBindOptions { nowait: false },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(error = err.to_string(), "error to bind queue to exchange");

                    Err(AmqpError::classify(
                        &err,
                        binding.queue_name,
                        AmqpError::BindingError(
                            binding.exchange_name.to_owned(),
                            binding.queue_name.to_owned(),
                        ),
                    ))
                }
                _ => Ok(()),
            }?;
        }

        debug!("queues were bound");

        Ok(())
    }
}

/// Client-side check applied before a binding is declared. An empty routing
/// key is allowed (fanout and default-exchange bindings); a non-empty key
/// must not contain empty dot-delimited tokens.
pub(crate) fn validate_binding(binding: &QueueBinding) -> Result<(), AmqpError> {
    if binding.routing_key.is_empty() || routing::binding_key_is_valid(binding.routing_key) {
        return Ok(());
    }

    Err(AmqpError::BindingError(
        binding.exchange_name.to_owned(),
        binding.queue_name.to_owned(),
    ))
}
