//! Unified error types for both node roles.
//!
//! A single `Error` enum that every subsystem converts into, one variant per
//! failure class.  None of these terminate the agent: transport errors are
//! retried, malformed messages are counted and dropped, rejected commands
//! are logged, and sensor errors degrade to absent readings.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Connection, subscribe, or publish failure.
    Transport(TransportError),
    /// Inbound payload failed schema or topic validation.
    Malformed(MalformedMessage),
    /// A remote relay command was refused by the interlock.
    Rejected(RejectedCommand),
    /// A sensor reading was unavailable or implausible.
    Sensor(SensorError),
    /// An observer failed to accept a notification.
    Observer(ObserverError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Malformed(e) => write!(f, "malformed message: {e}"),
            Self::Rejected(e) => write!(f, "rejected command: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Observer(e) => write!(f, "observer: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Broker unreachable or handshake refused.
    ConnectFailed,
    /// Broker did not acknowledge in time.
    Timeout,
    /// Operation attempted while not connected.
    NotConnected,
    /// Subscription was refused or never acknowledged.
    SubscribeFailed,
    /// Outbound message could not be queued or sent.
    PublishFailed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::Timeout => write!(f, "timed out waiting for broker"),
            Self::NotConnected => write!(f, "not connected"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::PublishFailed => write!(f, "publish failed"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Malformed messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedMessage {
    /// Topic is not one this node understands.
    UnknownTopic,
    /// Payload is not valid UTF-8 JSON or misses required fields.
    BadPayload,
    /// Declared `type` disagrees with the topic it arrived on.
    TopicMismatch,
    /// Message originates from a node other than the configured peer.
    UnexpectedNode,
    /// Control payload is not `RELAY_ON` / `RELAY_OFF`.
    UnknownCommand,
}

impl fmt::Display for MalformedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTopic => write!(f, "unknown topic"),
            Self::BadPayload => write!(f, "unparseable payload"),
            Self::TopicMismatch => write!(f, "declared type does not match topic"),
            Self::UnexpectedNode => write!(f, "message from unexpected node"),
            Self::UnknownCommand => write!(f, "unrecognised control command"),
        }
    }
}

impl From<MalformedMessage> for Error {
    fn from(e: MalformedMessage) -> Self {
        Self::Malformed(e)
    }
}

// ---------------------------------------------------------------------------
// Rejected commands
// ---------------------------------------------------------------------------

/// A remote command the interlock refused.  Not a fault: the local safety
/// latch outranks the commander.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectedCommand {
    /// Remote ON arrived while the CRITICAL latch was set.
    LatchedOff,
}

impl fmt::Display for RejectedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LatchedOff => write!(f, "relay latched OFF by local safety"),
        }
    }
}

impl From<RejectedCommand> for Error {
    fn from(e: RejectedCommand) -> Self {
        Self::Rejected(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The device did not answer.
    ReadFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Observer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverError {
    /// The downstream channel (chat bot, dashboard) is unavailable.
    Unavailable,
    /// The observer refused the notification with a reason.
    Refused(String),
}

impl fmt::Display for ObserverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "observer unavailable"),
            Self::Refused(reason) => write!(f, "observer refused: {reason}"),
        }
    }
}

impl From<ObserverError> for Error {
    fn from(e: ObserverError) -> Self {
        Self::Observer(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
