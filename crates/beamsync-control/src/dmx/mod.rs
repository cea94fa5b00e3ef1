//! DMX input over Art-Net
//!
//! Only the ArtDmx opcode is understood. Discovery (ArtPoll) and output are
//! not handled; any other datagram on the port is dropped.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use beamsync_control::dmx::ArtNetListener;
//! use beamsync_core::{ListenerConfig, UniverseStore};
//! use std::sync::Arc;
//!
//! # fn main() -> beamsync_control::Result<()> {
//! let store = Arc::new(UniverseStore::new());
//! let mut listener = ArtNetListener::new(ListenerConfig::default(), store.clone());
//! listener.start()?;
//!
//! // Later, on the consuming thread
//! for (universe, changes) in store.take_pending() {
//!     println!("universe {} has {} dirty channels", universe, changes.len());
//! }
//!
//! listener.stop();
//! # Ok(())
//! # }
//! ```

pub mod listener;
pub mod packet;

pub use listener::{ArtNetListener, ListenerStats};
pub use packet::{apply_datagram, apply_frame, parse_frame, ArtDmxFrame, ARTDMX_HEADER_LEN};
