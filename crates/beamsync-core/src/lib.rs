//! BeamSync Core - Domain Model
//!
//! This crate contains everything between decoded DMX data and light
//! attributes:
//! - Universe store with dirty-channel tracking shared across threads
//! - Fixture type profiles and the built-in catalog
//! - Fixture registry maintained by the host scene
//! - Mapping engine turning channel windows into color, rotation, zoom and power
//! - Configuration and logging settings

#![allow(missing_docs)]

pub mod color;
pub mod config;
pub mod error;
pub mod fixture;
pub mod fixture_type;
pub mod logging;
pub mod mapping;
pub mod universe;

// --- Re-exports grouped by category ---

// Channel state
pub use universe::{
    ChangeSet, ChannelIndex, Universe, UniverseIndex, UniverseStore, CHANNELS_PER_UNIVERSE,
};

// Fixtures
pub use color::{cmy_to_rgb, rgbw_to_rgb, wheel_to_rgb, ColorWheel, Rgb, WheelSlot};
pub use fixture::{FixtureMapping, FixtureRegistry, LightKind, RotationTarget};
pub use fixture_type::{ColorProfile, FixtureType, FixtureTypeCatalog, FixtureTypeDef};

// Mapping
pub use mapping::{
    AxisWrite, ControlState, FixtureUpdate, MappingEngine, SyncOutcome, SyncSink, TickReport,
};

// Settings & errors
pub use config::{BeamsyncConfig, ListenerConfig, ARTNET_PORT};
pub use error::{CoreError, Result};
pub use logging::LogConfig;
