// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-level error type.
//!
//! Each layer owns a typed error (`DecodeError`, `EncodeError`, `PoolError`,
//! `RegistryError`, `WaitError`, `TransportError`); [`Error`] wraps them for
//! callers of the [`crate::MmsStack`] API.

use thiserror::Error;

use crate::pool::PoolError;
use crate::registry::RegistryError;
use crate::sync::WaitError;
use crate::transport::TransportError;
use crate::wire::{DecodeError, EncodeError};

/// Result alias for MMS stack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by MMS stack operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An inbound fragment could not be decoded; its transfer was abandoned.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// An outgoing message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Message pool rejected an operation.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// Listener registration conflict or missing registration.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A blocked call was interrupted.
    #[error(transparent)]
    Wait(#[from] WaitError),

    /// Datagram transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Operation on a connection that has been closed.
    #[error("connection closed")]
    Closed,
}

/// Configuration error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Configuration file could not be read or written.
    #[error("I/O error: {0}")]
    Io(String),
    /// Configuration document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
    /// A field holds an unusable value.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}
