// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # JSON Message Codec
//!
//! Serializes application payloads to a self-describing JSON body and back.
//! The encoded message carries `application/json` as its content type and the
//! payload's unqualified type name in the `__type__` header, so a receiver
//! can verify the payload shape before deserializing.

use crate::{errors::AmqpError, message::BrokerMessage};
use serde::{de::DeserializeOwned, Serialize};
use std::any::type_name;

/// Content type for JSON message bodies
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Codec mapping `serde` payloads to and from `BrokerMessage`.
///
/// `decode(encode(payload))` returns a value equal to `payload` for every
/// serde-representable shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> JsonCodec {
        JsonCodec
    }

    /// Encodes a payload into a broker message.
    ///
    /// Returns `AmqpError::ParsePayloadError` if the payload cannot be
    /// serialized to JSON (non-string map keys and the like).
    pub fn encode<T>(&self, payload: &T) -> Result<BrokerMessage, AmqpError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec(payload).map_err(|_| AmqpError::ParsePayloadError)?;

        Ok(BrokerMessage::new(data, JSON_CONTENT_TYPE, type_tag::<T>()))
    }

    /// Decodes a broker message into the expected payload type.
    ///
    /// Fails with `AmqpError::DecodeError` when the message's type tag does
    /// not match `T` or the body is not valid JSON for `T`.
    pub fn decode<T>(&self, message: &BrokerMessage) -> Result<T, AmqpError>
    where
        T: DeserializeOwned,
    {
        let expected = type_tag::<T>();
        if message.msg_type() != expected {
            return Err(AmqpError::DecodeError(format!(
                "type tag mismatch: expected `{}`, got `{}`",
                expected,
                message.msg_type()
            )));
        }

        self.decode_body(message.data())
    }

    /// Decodes a raw body without a type-tag check, for deliveries whose tag
    /// was already matched during dispatch.
    pub(crate) fn decode_body<T>(&self, data: &[u8]) -> Result<T, AmqpError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(data).map_err(|err| AmqpError::DecodeError(err.to_string()))
    }
}

/// The unqualified type name used as the `__type__` tag.
pub fn type_tag<T>() -> &'static str {
    let name = type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct OrderCreated {
        customer_id: u64,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct OrderCancelled {
        customer_id: u64,
    }

    #[test]
    fn round_trip_returns_equal_payload() {
        let codec = JsonCodec::new();
        let payload = OrderCreated { customer_id: 42 };

        let message = codec.encode(&payload).unwrap();
        let decoded: OrderCreated = codec.decode(&message).unwrap();

        assert_eq!(decoded, payload);
    }

    #[test]
    fn encode_tags_message_with_type_name() {
        let codec = JsonCodec::new();
        let message = codec.encode(&OrderCreated { customer_id: 1 }).unwrap();

        assert_eq!(message.msg_type(), "OrderCreated");
        assert_eq!(message.content_type(), JSON_CONTENT_TYPE);
    }

    #[test]
    fn decode_rejects_mismatched_type_tag() {
        let codec = JsonCodec::new();
        let message = codec.encode(&OrderCreated { customer_id: 1 }).unwrap();

        let result = codec.decode::<OrderCancelled>(&message);
        assert!(matches!(result, Err(AmqpError::DecodeError(_))));
    }

    #[test]
    fn decode_rejects_malformed_body() {
        let codec = JsonCodec::new();
        let message = BrokerMessage::new(
            b"not json".to_vec(),
            JSON_CONTENT_TYPE,
            "OrderCreated",
        );

        let result = codec.decode::<OrderCreated>(&message);
        assert!(matches!(result, Err(AmqpError::DecodeError(_))));
    }

    #[test]
    fn type_tag_strips_module_path() {
        assert_eq!(type_tag::<OrderCreated>(), "OrderCreated");
    }
}
