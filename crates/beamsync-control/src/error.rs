//! Error types for the network input side
use std::net::SocketAddr;
use thiserror::Error;

/// Control errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// The UDP socket could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// `start()` called on a listener whose receive loop is running
    #[error("Listener already running on {0}")]
    AlreadyRunning(SocketAddr),
}

/// Reasons a datagram is not accepted as an ArtDmx frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram of {0} bytes is shorter than the ArtDmx header")]
    TooShort(usize),

    #[error("missing Art-Net signature")]
    BadSignature,

    #[error("opcode {0:#04x}{1:02x} is not ArtDmx")]
    WrongOpcode(u8, u8),

    #[error("channel count {0} exceeds 512")]
    TooManyChannels(u16),

    #[error("declared {declared} channels but only {available} present")]
    Truncated { declared: usize, available: usize },
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
