//! Universe Store - buffered DMX state shared between the network thread and the tick
//!
//! Every universe holds two parallel views of its 512 channels: the raw byte
//! value as received and a normalized `0.0..=1.0` float. Both are written
//! together, so `normalized[i] == raw[i] / 255.0` holds at all times.
//!
//! The pending-change ledger records which channels changed since the consumer
//! last drained it. The listener merges into it, the mapping tick drains it.
//! The ledger lock and the channel lock are never held at the same time.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};

/// Number of channels in a DMX universe
pub const CHANNELS_PER_UNIVERSE: usize = 512;

/// 1-based universe index (the wire value plus one)
pub type UniverseIndex = u32;

/// 0-based channel index inside a universe
pub type ChannelIndex = u16;

/// Channel state of a single universe
#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    raw: [u8; CHANNELS_PER_UNIVERSE],
    normalized: [f32; CHANNELS_PER_UNIVERSE],
}

impl Default for Universe {
    fn default() -> Self {
        Self {
            raw: [0; CHANNELS_PER_UNIVERSE],
            normalized: [0.0; CHANNELS_PER_UNIVERSE],
        }
    }
}

impl Universe {
    /// Raw byte value of a channel. Channels past the end of the universe read as 0.
    pub fn raw(&self, channel: usize) -> u8 {
        self.raw.get(channel).copied().unwrap_or(0)
    }

    /// Normalized value of a channel. Channels past the end of the universe read as 0.0.
    pub fn normalized(&self, channel: usize) -> f32 {
        self.normalized.get(channel).copied().unwrap_or(0.0)
    }

    /// All raw values
    pub fn raw_channels(&self) -> &[u8; CHANNELS_PER_UNIVERSE] {
        &self.raw
    }

    /// All normalized values
    pub fn normalized_channels(&self) -> &[f32; CHANNELS_PER_UNIVERSE] {
        &self.normalized
    }

    /// Set one channel. Returns `true` if the stored value changed.
    pub fn set(&mut self, channel: usize, value: u8) -> bool {
        match self.raw.get_mut(channel) {
            Some(slot) if *slot != value => {
                *slot = value;
                self.normalized[channel] = f32::from(value) / 255.0;
                true
            }
            _ => false,
        }
    }

    /// Write a run of channel values starting at channel 0.
    ///
    /// Returns the indices of the channels whose value actually changed.
    /// Data past channel 512 is ignored.
    pub fn write_frame(&mut self, data: &[u8]) -> Vec<ChannelIndex> {
        let mut changed = Vec::new();
        for (i, value) in data.iter().take(CHANNELS_PER_UNIVERSE).enumerate() {
            if self.set(i, *value) {
                changed.push(i as ChannelIndex);
            }
        }
        changed
    }
}

/// Channels of a universe that need reprocessing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSet {
    /// Every channel is dirty (full refresh)
    All,
    /// Only the listed channels are dirty
    Channels(BTreeSet<ChannelIndex>),
}

impl ChangeSet {
    /// Create a change set from a list of channels
    pub fn from_channels(channels: impl IntoIterator<Item = ChannelIndex>) -> Self {
        ChangeSet::Channels(channels.into_iter().collect())
    }

    /// Whether the given channel is dirty
    pub fn contains(&self, channel: usize) -> bool {
        match self {
            ChangeSet::All => true,
            ChangeSet::Channels(set) => ChannelIndex::try_from(channel)
                .map(|c| set.contains(&c))
                .unwrap_or(false),
        }
    }

    /// Whether this is a full refresh
    pub fn is_full(&self) -> bool {
        matches!(self, ChangeSet::All)
    }

    /// Number of dirty channels
    pub fn len(&self) -> usize {
        match self {
            ChangeSet::All => CHANNELS_PER_UNIVERSE,
            ChangeSet::Channels(set) => set.len(),
        }
    }

    /// Whether no channel is dirty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge another change set into this one. A full refresh absorbs everything.
    pub fn merge(&mut self, other: ChangeSet) {
        match (self, other) {
            (ChangeSet::All, _) => {}
            (this, ChangeSet::All) => *this = ChangeSet::All,
            (ChangeSet::Channels(mine), ChangeSet::Channels(theirs)) => mine.extend(theirs),
        }
    }
}

/// Thread-safe store of universe state and pending changes
///
/// Construct one per process and share it via `Arc` between the listener and
/// the mapping engine.
#[derive(Debug, Default)]
pub struct UniverseStore {
    universes: RwLock<BTreeMap<UniverseIndex, Universe>>,
    pending: Mutex<BTreeMap<UniverseIndex, ChangeSet>>,
}

impl UniverseStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized view of a universe, allocating it zero-filled if unseen
    pub fn get_universe(&self, index: UniverseIndex) -> [f32; CHANNELS_PER_UNIVERSE] {
        self.with_universe(index, |u| *u.normalized_channels())
    }

    /// Raw byte view of a universe, allocating it zero-filled if unseen
    pub fn get_raw_universe(&self, index: UniverseIndex) -> [u8; CHANNELS_PER_UNIVERSE] {
        self.with_universe(index, |u| *u.raw_channels())
    }

    /// Run `f` against a universe under the read lock, allocating it if unseen
    pub fn with_universe<R>(&self, index: UniverseIndex, f: impl FnOnce(&Universe) -> R) -> R {
        {
            let universes = self.universes.read();
            if let Some(universe) = universes.get(&index) {
                return f(universe);
            }
        }
        let mut universes = self.universes.write();
        f(universes.entry(index).or_default())
    }

    /// Write a frame of channel data into a universe.
    ///
    /// Returns the channels whose value changed. Does not touch the ledger;
    /// callers follow up with [`UniverseStore::notify_change`].
    pub fn write_channels(&self, index: UniverseIndex, data: &[u8]) -> Vec<ChannelIndex> {
        let mut universes = self.universes.write();
        universes.entry(index).or_default().write_frame(data)
    }

    /// Indices of every allocated universe, ascending
    pub fn universe_indices(&self) -> Vec<UniverseIndex> {
        self.universes.read().keys().copied().collect()
    }

    /// Record that the given channels of a universe changed.
    ///
    /// Merges with anything already pending for that universe.
    pub fn notify_change(&self, index: UniverseIndex, channels: &[ChannelIndex]) {
        if channels.is_empty() {
            return;
        }
        self.merge_pending(index, ChangeSet::from_channels(channels.iter().copied()));
    }

    /// Mark every channel of one universe dirty, e.g. after a fixture on it was edited
    pub fn notify_universe_refresh(&self, index: UniverseIndex) {
        self.merge_pending(index, ChangeSet::All);
    }

    /// Mark every channel of every allocated universe dirty
    pub fn notify_all_universes(&self) {
        let indices = self.universe_indices();
        let mut pending = self.pending.lock();
        for index in indices {
            pending.insert(index, ChangeSet::All);
        }
    }

    /// Drain all pending changes, leaving the ledger empty
    pub fn take_pending(&self) -> BTreeMap<UniverseIndex, ChangeSet> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Whether any universe has pending changes
    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    fn merge_pending(&self, index: UniverseIndex, changes: ChangeSet) {
        let mut pending = self.pending.lock();
        match pending.get_mut(&index) {
            Some(existing) => existing.merge(changes),
            None => {
                pending.insert(index, changes);
            }
        }
    }
}
