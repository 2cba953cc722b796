//! Error types for the path validation application.

use thiserror::Error;

/// All possible errors that can occur within the path validation application.
#[derive(Error, Debug)]
pub enum Error {
    /// A link-layer endpoint address could not be parsed.
    #[error("invalid endpoint address `{0}`")]
    InvalidAddress(String),

    /// A device identifier was empty or malformed.
    #[error("invalid device id `{0}`")]
    InvalidDevice(String),

    /// The topology description is inconsistent.
    #[error("topology error: {0}")]
    Topology(String),

    /// The flow-rule storage collaborator rejected or failed an operation.
    #[error("flow rule service error: {0}")]
    RuleService(String),

    /// The packet dispatch collaborator rejected or failed an operation.
    #[error("packet service error: {0}")]
    PacketService(String),

    /// A trace operation that requires a running trace was issued first.
    #[error("trace not started")]
    TraceNotStarted,

    /// Error decoding a topology description file.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
