//! ArtDmx frame decoding
//!
//! Layout of the part of the frame we read:
//!
//! | bytes  | field                                   |
//! |--------|-----------------------------------------|
//! | 0..3   | `Art` (start of `Art-Net\0`)            |
//! | 8..10  | opcode, little-endian, `0x5000` = OpDmx |
//! | 14..16 | port-address, little-endian, 0-based    |
//! | 16..18 | channel count, big-endian               |
//! | 18..   | channel data                            |

use beamsync_core::{UniverseIndex, UniverseStore, CHANNELS_PER_UNIVERSE};

use crate::error::PacketError;

/// Size of the ArtDmx header preceding channel data
pub const ARTDMX_HEADER_LEN: usize = 18;

const SIGNATURE: &[u8; 3] = b"Art";
const OP_DMX_LOW: u8 = 0x00;
const OP_DMX_HIGH: u8 = 0x50;

/// A validated ArtDmx frame borrowing its channel data from the datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtDmxFrame<'a> {
    /// 1-based universe index
    pub universe: UniverseIndex,
    pub data: &'a [u8],
}

/// Validate a datagram and decode it into an ArtDmx frame
pub fn parse_frame(packet: &[u8]) -> Result<ArtDmxFrame<'_>, PacketError> {
    if packet.len() < ARTDMX_HEADER_LEN {
        return Err(PacketError::TooShort(packet.len()));
    }
    if &packet[0..3] != SIGNATURE {
        return Err(PacketError::BadSignature);
    }
    if packet[8] != OP_DMX_LOW || packet[9] != OP_DMX_HIGH {
        return Err(PacketError::WrongOpcode(packet[9], packet[8]));
    }

    let port_address = u16::from_le_bytes([packet[14], packet[15]]);
    let count = u16::from_be_bytes([packet[16], packet[17]]);
    if usize::from(count) > CHANNELS_PER_UNIVERSE {
        return Err(PacketError::TooManyChannels(count));
    }

    let declared = usize::from(count);
    let available = packet.len() - ARTDMX_HEADER_LEN;
    if declared > available {
        return Err(PacketError::Truncated {
            declared,
            available,
        });
    }

    Ok(ArtDmxFrame {
        universe: UniverseIndex::from(port_address) + 1,
        data: &packet[ARTDMX_HEADER_LEN..ARTDMX_HEADER_LEN + declared],
    })
}

/// Write a frame into the store and record the channels that changed.
///
/// Returns the number of changed channels. A frame that changes nothing
/// leaves the pending ledger untouched.
pub fn apply_frame(store: &UniverseStore, frame: &ArtDmxFrame<'_>) -> usize {
    let changed = store.write_channels(frame.universe, frame.data);
    if !changed.is_empty() {
        store.notify_change(frame.universe, &changed);
    }
    changed.len()
}

/// Parse a datagram and apply it if valid
pub fn apply_datagram(store: &UniverseStore, packet: &[u8]) -> Result<usize, PacketError> {
    let frame = parse_frame(packet)?;
    Ok(apply_frame(store, &frame))
}
