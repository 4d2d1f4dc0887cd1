// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Types
//!
//! The wire-facing message types of the facade. `BrokerMessage` is what the
//! publisher sends: a body, content type, self-describing type tag, and a
//! header map. `ConsumerMessage` is what handlers receive per delivery.

use lapin::types::{
    AMQPValue, LongInt, LongLongInt, LongString, LongUInt, ShortInt, ShortString,
};
use std::collections::{BTreeMap, HashMap};

/// Header name carrying the payload's type tag.
pub const TYPE_HEADER: &str = "__type__";

/// Typed header values accepted on a message.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    ShortString(String),
    LongString(String),
    Int(i16),
    LongInt(i32),
    LongLongInt(i64),
    Uint(u32),
    LongUint(u32),
}

impl From<&HeaderValue> for AMQPValue {
    fn from(value: &HeaderValue) -> AMQPValue {
        match value {
            HeaderValue::ShortString(v) => AMQPValue::ShortString(ShortString::from(v.clone())),
            HeaderValue::LongString(v) => AMQPValue::LongString(LongString::from(v.clone())),
            HeaderValue::Int(v) => AMQPValue::ShortInt(ShortInt::from(*v)),
            HeaderValue::LongInt(v) => AMQPValue::LongInt(LongInt::from(*v)),
            HeaderValue::LongLongInt(v) => AMQPValue::LongLongInt(LongLongInt::from(*v)),
            HeaderValue::Uint(v) => AMQPValue::LongUInt(LongUInt::from(*v)),
            HeaderValue::LongUint(v) => AMQPValue::LongUInt(LongUInt::from(*v)),
        }
    }
}

/// A message as handed to the broker: immutable once published, constructed
/// fresh per publish.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerMessage {
    pub(crate) data: Vec<u8>,
    pub(crate) content_type: String,
    pub(crate) msg_type: String,
    pub(crate) headers: HashMap<String, HeaderValue>,
}

impl BrokerMessage {
    /// Creates a message with the given body, content type, and type tag.
    pub fn new(data: Vec<u8>, content_type: &str, msg_type: &str) -> BrokerMessage {
        BrokerMessage {
            data,
            content_type: content_type.to_owned(),
            msg_type: msg_type.to_owned(),
            headers: HashMap::default(),
        }
    }

    /// Adds a header to the message.
    pub fn header(mut self, key: &str, value: HeaderValue) -> Self {
        self.headers.insert(key.to_owned(), value);
        self
    }

    /// The message body.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The type tag identifying the payload shape.
    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    /// The body content type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Converts the caller headers plus the type tag into an AMQP field
    /// table map.
    pub(crate) fn amqp_headers(&self) -> BTreeMap<ShortString, AMQPValue> {
        let mut btree = BTreeMap::default();

        for (key, value) in &self.headers {
            btree.insert(ShortString::from(key.clone()), AMQPValue::from(value));
        }

        btree.insert(
            ShortString::from(TYPE_HEADER),
            AMQPValue::LongString(LongString::from(self.msg_type.clone())),
        );

        btree
    }
}

/// A message as delivered to a consumer handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerMessage {
    pub queue: String,
    pub msg_type: String,
    pub data: Vec<u8>,
}

impl ConsumerMessage {
    pub fn new(queue: &str, msg_type: &str, data: &[u8]) -> ConsumerMessage {
        ConsumerMessage {
            queue: queue.to_owned(),
            msg_type: msg_type.to_owned(),
            data: data.to_vec(),
        }
    }
}
