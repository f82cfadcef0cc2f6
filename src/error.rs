//! Error types for the relay
//!
//! Defines application-level errors and message delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_util::codec::AnyDelimiterCodecError;

/// Why a `to|` command was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// `to||body` or `to|` with nothing after it
    MissingTarget,
    /// `to|name|` with no message body
    EmptyBody,
    /// Inbound line longer than the configured limit
    LineTooLong,
}

/// Application-level errors
///
/// Covers both fatal errors (session termination) and
/// per-client errors (reported back to the offending client only).
#[derive(Debug, Error)]
pub enum RelayError {
    /// Rename target is empty or already held by another session
    #[error("Name already taken: {0}")]
    NameTaken(String),

    /// Direct-message recipient is not online
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// Command fields are missing or empty
    #[error("Malformed command: {0:?}")]
    MalformedCommand(MalformedReason),

    /// The session was unregistered underneath a pending command
    #[error("Session no longer registered: {0}")]
    SessionGone(String),

    /// Peer closed the connection (fatal for the session, never surfaced)
    #[error("Connection closed")]
    ConnectionClosed,

    /// Session was evicted after the idle window elapsed
    #[error("Idle timeout")]
    IdleTimeout,

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound line framing error
    #[error("Codec error: {0}")]
    Codec(#[from] AnyDelimiterCodecError),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// JSON configuration could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send error (fatal - relay task is gone)
    #[error("Channel send error")]
    ChannelSend,
}

/// Message delivery errors
///
/// Occurs when pushing onto a session's outbound queue fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The session's writer has gone away
    #[error("Channel closed")]
    ChannelClosed,

    /// The session is not draining its queue fast enough
    #[error("Outbound queue full")]
    QueueFull,
}
