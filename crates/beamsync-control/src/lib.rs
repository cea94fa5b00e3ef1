//! BeamSync Control - Network Input
//!
//! Receives Art-Net DMX on a background thread and feeds the shared
//! [`beamsync_core::UniverseStore`].
//!
//! ## Modules
//!
//! - [`dmx`] - ArtDmx decoding and the UDP listener
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Error types
pub mod error;

/// DMX input (Art-Net)
pub mod dmx;

// Re-exports
pub use dmx::{ArtNetListener, ListenerStats};
pub use error::{ControlError, PacketError, Result};
