// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the AMQP Facade
//!
//! This module provides the error taxonomy for every facade operation. The
//! `AmqpError` enum covers connection and channel setup, topology
//! declaration, publishing, message decoding, and consumer-side failures.
//! Broker-reported soft errors are classified by their AMQP reply code so
//! that callers can distinguish a conflicting redeclare from a missing
//! entity.

use thiserror::Error;

/// AMQP reply code sent when a redeclare conflicts with an existing entity
const AMQP_REPLY_PRECONDITION_FAILED: u16 = 406;
/// AMQP reply code sent when an operation references a missing queue or exchange
const AMQP_REPLY_NOT_FOUND: u16 = 404;

/// Represents errors that can occur during AMQP operations.
///
/// Each variant provides specific context about what operation failed. No
/// operation in this facade masks errors by logging and continuing; every
/// failure is surfaced to the caller, who decides the recovery policy.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Internal errors that don't fit into other categories
    #[error("internal error")]
    InternalError,

    /// Error establishing a connection to the broker
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// An entity was redeclared with parameters that conflict with the
    /// existing declaration
    #[error("declaration conflicts with existing entity `{0}`")]
    TopologyConflict(String),

    /// An operation referenced a queue or exchange that does not exist
    #[error("entity not found `{0}`")]
    NotFound(String),

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding a queue to an exchange
    #[error("failure to bind queue `{1}` to exchange `{0}`")]
    BindingError(String, String),

    /// Error publishing a message
    #[error("failure to publish")]
    PublishingError,

    /// Error serializing a payload for publishing
    #[error("failure to serialize payload")]
    ParsePayloadError,

    /// Error decoding a message body or a mismatched type tag
    #[error("failure to decode message: {0}")]
    DecodeError(String),

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// Error declaring a consumer on a queue
    #[error("failure to declare consumer `{0}`")]
    BindingConsumerError(String),

    /// Error consuming a message
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),
}

impl AmqpError {
    /// Classifies a lapin error reported during a declaration or binding.
    ///
    /// Broker soft errors carry an AMQP reply code; 406 means the entity
    /// already exists with different parameters and 404 means a referenced
    /// entity is missing. Anything else maps to the fallback supplied by the
    /// call site.
    pub(crate) fn classify(err: &lapin::Error, entity: &str, fallback: AmqpError) -> AmqpError {
        match err {
            lapin::Error::ProtocolError(amqp_err) => {
                Self::from_reply_code(amqp_err.get_id(), entity, fallback)
            }
            _ => fallback,
        }
    }

    fn from_reply_code(code: u16, entity: &str, fallback: AmqpError) -> AmqpError {
        match code {
            AMQP_REPLY_PRECONDITION_FAILED => AmqpError::TopologyConflict(entity.to_owned()),
            AMQP_REPLY_NOT_FOUND => AmqpError::NotFound(entity.to_owned()),
            _ => fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_failed_maps_to_conflict() {
        let err = AmqpError::from_reply_code(
            406,
            "orders.direct",
            AmqpError::DeclareExchangeError("orders.direct".to_owned()),
        );
        assert_eq!(err, AmqpError::TopologyConflict("orders.direct".to_owned()));
    }

    #[test]
    fn not_found_maps_to_not_found() {
        let err = AmqpError::from_reply_code(
            404,
            "orders.queue",
            AmqpError::BindingError("orders.direct".to_owned(), "orders.queue".to_owned()),
        );
        assert_eq!(err, AmqpError::NotFound("orders.queue".to_owned()));
    }

    #[test]
    fn unknown_reply_code_falls_back() {
        let err = AmqpError::from_reply_code(541, "q", AmqpError::InternalError);
        assert_eq!(err, AmqpError::InternalError);
    }
}
