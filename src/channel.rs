// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module handles the creation of AMQP connections and channels. It
//! establishes the connection to the broker from the loaded configuration and
//! creates the communication channel used for topology declaration, message
//! publishing, and consuming.

use crate::{config::Config, errors::AmqpError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{debug, error};

/// Creates a new AMQP connection and channel.
///
/// This function establishes a connection to the broker using the settings in
/// `cfg`, then creates a channel on that connection. Both are wrapped in
/// `Arc` for thread-safe sharing; lapin manages channel state internally, so
/// concurrent callers can share the pair safely.
///
/// # Returns
/// * `Result<(Arc<Connection>, Arc<Channel>), AmqpError>` -
///   the connection and channel on success; `AmqpError::ConnectionError` when
///   the broker is unreachable or the credentials are rejected,
///   `AmqpError::ChannelError` when channel creation fails.
pub async fn new_amqp_channel(
    cfg: &Config,
) -> Result<(Arc<Connection>, Arc<Channel>), AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.app_name.clone()));

    let conn = match Connection::connect(&cfg.uri(), options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(AmqpError::ConnectionError)
        }
    }?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((Arc::new(conn), Arc::new(c)))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(AmqpError::ChannelError)
        }
    }
}
