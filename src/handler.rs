// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consumer Handler
//!
//! The object-safe async trait a subscriber implements. The dispatcher
//! invokes `exec` once per delivered message; returning `Err` triggers the
//! failure policy registered with the subscription.

use crate::{errors::AmqpError, message::ConsumerMessage};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// Handler invoked once per delivered message for the lifetime of a
/// subscription.
///
/// Each invocation is independent; delivery order within one queue follows
/// broker delivery order. Implementations decode the message body themselves,
/// typically via `JsonCodec`, and surface decode failures as
/// `AmqpError::DecodeError`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    async fn exec(&self, msg: &ConsumerMessage) -> Result<(), AmqpError>;
}
