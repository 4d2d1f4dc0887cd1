// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Consumption
//!
//! This module implements both consume modes. `PullConsumer` pulls at most
//! one message synchronously from a queue, returning `None` when the queue is
//! empty. The internal `consume` function is the per-delivery engine the
//! dispatcher drives: it extracts the type tag, dispatches to the registered
//! handler, acks on success, and applies the subscription's `FailurePolicy`
//! on failure. Failures are never silently swallowed.

use crate::{
    codec::{type_tag, JsonCodec},
    dispatcher::AmqpDispatcherDefinition,
    errors::AmqpError,
    message::{ConsumerMessage, TYPE_HEADER},
};
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicGetOptions, BasicNackOptions},
    protocol::basic::AMQPProperties,
    types::AMQPValue,
    Channel,
};
use serde::de::DeserializeOwned;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, error, warn};

/// What to do with a delivery whose handler (or decode) failed.
///
/// Both consume modes ack only after success, so delivery is at-least-once;
/// the policy decides where a failed message goes instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Nack without requeue. The message is dropped, or dead-lettered if the
    /// queue declares a DLQ.
    #[default]
    Discard,
    /// Nack with requeue; the broker redelivers the message.
    Requeue,
    /// Nack without requeue into the queue's configured dead-letter queue.
    DeadLetter,
}

pub(crate) fn nack_options(policy: FailurePolicy) -> BasicNackOptions {
    BasicNackOptions {
        multiple: false,
        requeue: matches!(policy, FailurePolicy::Requeue),
    }
}

/// Pull-style consumer: one synchronous receive per call.
pub struct PullConsumer {
    channel: Arc<Channel>,
    codec: JsonCodec,
}

impl PullConsumer {
    pub fn new(channel: Arc<Channel>) -> PullConsumer {
        PullConsumer {
            channel,
            codec: JsonCodec::new(),
        }
    }

    /// Pulls at most one message from the queue and decodes it.
    ///
    /// Returns `Ok(None)` when the queue is empty at call time; empty means
    /// "no data now", not an error. A delivered message is acked only after
    /// a successful decode; a decode failure nacks it without requeue and
    /// surfaces `AmqpError::DecodeError`. Safe to call concurrently from
    /// multiple tasks sharing one channel.
    pub async fn receive_once<T>(&self, queue: &str) -> Result<Option<T>, AmqpError>
    where
        T: DeserializeOwned,
    {
        let message = match self
            .channel
            .basic_get(queue, BasicGetOptions { no_ack: false })
            .await
        {
            Ok(m) => m,
            Err(err) => {
                error!(error = err.to_string(), queue = queue, "error to get message");
                return Err(AmqpError::classify(
                    &err,
                    queue,
                    AmqpError::ConsumerError(queue.to_owned()),
                ));
            }
        };

        let Some(get_message) = message else {
            debug!(queue = queue, "queue is empty");
            return Ok(None);
        };
        let delivery = get_message.delivery;

        let tag = extract_type_tag(&delivery.properties);
        let expected = type_tag::<T>();

        let decoded = if !tag.is_empty() && tag != expected {
            Err(AmqpError::DecodeError(format!(
                "type tag mismatch: expected `{expected}`, got `{tag}`"
            )))
        } else {
            self.codec.decode_body::<T>(&delivery.data)
        };

        match decoded {
            Ok(payload) => match delivery.ack(BasicAckOptions { multiple: false }).await {
                Ok(_) => Ok(Some(payload)),
                Err(err) => {
                    error!(error = err.to_string(), "error whiling ack msg");
                    Err(AmqpError::AckMessageError)
                }
            },
            Err(err) => {
                // The undecodable message leaves the queue, dead-lettering if
                // the queue declares a DLQ.
                if let Err(nack_err) = delivery
                    .nack(BasicNackOptions {
                        multiple: false,
                        requeue: false,
                    })
                    .await
                {
                    error!(error = nack_err.to_string(), "error whiling nack msg");
                }
                Err(err)
            }
        }
    }
}

/// Processes one delivery on behalf of the dispatcher.
///
/// Looks up the handler registered for the delivery's type tag, invokes it,
/// and acks on success. A handler failure applies the subscription's
/// `FailurePolicy`; a delivery with no registered handler is discarded with
/// a logged reason (dead-lettered if the queue has a DLQ).
pub(crate) async fn consume(
    delivery: &Delivery,
    defs: &HashMap<String, AmqpDispatcherDefinition>,
) -> Result<(), AmqpError> {
    let msg_type = extract_type_tag(&delivery.properties);

    debug!(
        "received: {} - exchange: {}",
        msg_type,
        delivery.exchange.to_string(),
    );

    let Some(dispatcher_def) = defs.get(&msg_type) else {
        warn!(
            msg_type = msg_type,
            "removing message from queue - reason: unsupported msg type"
        );
        return reject(delivery, FailurePolicy::Discard).await;
    };

    let msg = ConsumerMessage::new(&dispatcher_def.queue, &msg_type, &delivery.data);

    match dispatcher_def.handler.exec(&msg).await {
        Ok(_) => {
            debug!("message successfully processed");
            match delivery.ack(BasicAckOptions { multiple: false }).await {
                Err(err) => {
                    error!(error = err.to_string(), "error whiling ack msg");
                    Err(AmqpError::AckMessageError)
                }
                _ => Ok(()),
            }
        }
        Err(err) => {
            warn!(
                error = err.to_string(),
                policy = format!("{:?}", dispatcher_def.policy),
                "handler failed, applying failure policy"
            );
            reject(delivery, dispatcher_def.policy).await
        }
    }
}

async fn reject(delivery: &Delivery, policy: FailurePolicy) -> Result<(), AmqpError> {
    match delivery.nack(nack_options(policy)).await {
        Ok(_) => Ok(()),
        Err(err) => {
            error!(error = err.to_string(), "error whiling nack msg");
            Err(AmqpError::NackMessageError)
        }
    }
}

/// Extracts the payload type tag from a delivery's properties.
///
/// The `__type__` header wins; the AMQP `type` property is the fallback for
/// messages published by other clients.
fn extract_type_tag(props: &AMQPProperties) -> String {
    if let Some(headers) = props.headers() {
        if let Some(AMQPValue::LongString(value)) = headers.inner().get(TYPE_HEADER) {
            if let Ok(tag) = std::str::from_utf8(value.as_bytes()) {
                return tag.to_owned();
            }
        }
    }

    match props.kind() {
        Some(value) => value.to_string(),
        _ => "".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::types::{FieldTable, LongString, ShortString};
    use std::collections::BTreeMap;

    #[test]
    fn requeue_policy_requeues_on_nack() {
        assert!(nack_options(FailurePolicy::Requeue).requeue);
        assert!(!nack_options(FailurePolicy::Discard).requeue);
        assert!(!nack_options(FailurePolicy::DeadLetter).requeue);
    }

    #[test]
    fn type_tag_comes_from_header() {
        let mut headers = BTreeMap::new();
        headers.insert(
            ShortString::from(TYPE_HEADER),
            AMQPValue::LongString(LongString::from("OrderCreated")),
        );
        let props = AMQPProperties::default().with_headers(FieldTable::from(headers));

        assert_eq!(extract_type_tag(&props), "OrderCreated");
    }

    #[test]
    fn type_tag_falls_back_to_type_property() {
        let props = AMQPProperties::default().with_type(ShortString::from("OrderCreated"));
        assert_eq!(extract_type_tag(&props), "OrderCreated");
    }

    #[test]
    fn missing_type_tag_is_empty() {
        assert_eq!(extract_type_tag(&AMQPProperties::default()), "");
    }
}
