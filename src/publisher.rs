// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Publisher
//!
//! Publishes messages to exchanges with a routing key. Publishing is
//! fire-and-forget (no delivery confirmation), matching at-most-once delivery
//! unless the topology configures redelivery; failures surface to the caller
//! and are never retried internally.

use crate::{codec::JsonCodec, errors::AmqpError, message::BrokerMessage};
use async_trait::async_trait;
use lapin::{
    options::BasicPublishOptions,
    types::{FieldTable, ShortString},
    BasicProperties, Channel,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

/// Trait defining the interface for publishing a message.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes a message to the exchange with the given routing key.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &BrokerMessage,
    ) -> Result<(), AmqpError>;
}

/// Lapin-backed implementation of the Publisher trait.
///
/// Every published message carries its content type, its type tag (both as
/// the AMQP `type` property and the `__type__` header), a fresh v4 UUID
/// message id, and any caller-supplied headers.
pub struct AmqpPublisher {
    channel: Arc<Channel>,
    codec: JsonCodec,
}

impl AmqpPublisher {
    pub fn new(channel: Arc<Channel>) -> Arc<AmqpPublisher> {
        Arc::new(AmqpPublisher {
            channel,
            codec: JsonCodec::new(),
        })
    }

    /// Encodes a payload with the JSON codec and publishes it.
    pub async fn publish_json<T>(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &T,
    ) -> Result<(), AmqpError>
    where
        T: serde::Serialize + Sync,
    {
        let message = self.codec.encode(payload)?;
        self.publish(exchange, routing_key, &message).await
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &BrokerMessage,
    ) -> Result<(), AmqpError> {
        match self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                message.data(),
                BasicProperties::default()
                    .with_content_type(ShortString::from(message.content_type()))
                    .with_type(ShortString::from(message.msg_type()))
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
                    .with_headers(FieldTable::from(message.amqp_headers())),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    exchange = exchange,
                    "error publishing message"
                );
                match err {
                    lapin::Error::InvalidChannelState(_)
                    | lapin::Error::InvalidConnectionState(_) => Err(AmqpError::ConnectionError),
                    _ => Err(AmqpError::PublishingError),
                }
            }
            _ => Ok(()),
        }
    }
}
