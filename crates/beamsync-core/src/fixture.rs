//! Fixture registry - which scene light listens to which DMX window
//!
//! The host scene owns fixture lifecycle: it inserts, updates and removes
//! mappings as lights are created or edited. The mapping engine only reads the
//! registry once per tick.

use crate::config::read_document;
use crate::error::{CoreError, Result};
use crate::universe::{UniverseIndex, CHANNELS_PER_UNIVERSE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Euler axis a pan or tilt value is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RotationTarget {
    /// Axis is not driven
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "lx")]
    LocalX,
    #[serde(rename = "ly")]
    LocalY,
    #[serde(rename = "lz")]
    LocalZ,
    #[serde(rename = "px")]
    ParentX,
    #[serde(rename = "py")]
    ParentY,
    #[serde(rename = "pz")]
    ParentZ,
    #[serde(rename = "gpx")]
    GrandparentX,
    #[serde(rename = "gpy")]
    GrandparentY,
    #[serde(rename = "gpz")]
    GrandparentZ,
}

impl RotationTarget {
    /// Whether this target drives an axis at all
    pub fn is_driven(self) -> bool {
        self != RotationTarget::None
    }
}

/// Kind of scene light, limits which attributes it accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightKind {
    /// Color, power, rotation and zoom
    #[default]
    Spot,
    /// Color, power and rotation
    Area,
    /// Color and power
    Point,
}

impl LightKind {
    pub fn supports_rotation(self) -> bool {
        matches!(self, LightKind::Spot | LightKind::Area)
    }

    pub fn supports_zoom(self) -> bool {
        matches!(self, LightKind::Spot)
    }
}

fn default_pan_target() -> RotationTarget {
    RotationTarget::LocalX
}

fn default_tilt_target() -> RotationTarget {
    RotationTarget::LocalZ
}

/// One logical fixture bound to a scene object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureMapping {
    /// Handle of the host object this fixture drives
    pub name: String,
    pub universe: UniverseIndex,
    /// First channel of the fixture, 0-based
    #[serde(rename = "address", with = "dmx_address")]
    pub base_address: u16,
    pub fixture_type: String,
    #[serde(default)]
    pub kind: LightKind,
    #[serde(default = "default_pan_target")]
    pub pan_target: RotationTarget,
    #[serde(default = "default_tilt_target")]
    pub tilt_target: RotationTarget,
}

/// Addresses are 1-based in files and at the host boundary
mod dmx_address {
    use crate::universe::CHANNELS_PER_UNIVERSE;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(base: &u16, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(base.saturating_add(1))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        let address = u16::deserialize(deserializer)?;
        if address == 0 || usize::from(address) > CHANNELS_PER_UNIVERSE {
            return Err(D::Error::custom(format!(
                "DMX address {} is outside 1-512",
                address
            )));
        }
        Ok(address - 1)
    }
}

impl FixtureMapping {
    /// Create a mapping from a 1-based DMX address as shown to users
    pub fn new(
        name: impl Into<String>,
        universe: UniverseIndex,
        dmx_address: u16,
        fixture_type: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        if dmx_address == 0 || usize::from(dmx_address) > CHANNELS_PER_UNIVERSE {
            return Err(CoreError::InvalidFixture {
                name,
                reason: format!("DMX address {} is outside 1-512", dmx_address),
            });
        }
        Ok(Self {
            name,
            universe,
            base_address: dmx_address - 1,
            fixture_type: fixture_type.into(),
            kind: LightKind::default(),
            pan_target: default_pan_target(),
            tilt_target: default_tilt_target(),
        })
    }

    pub fn with_kind(mut self, kind: LightKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_targets(mut self, pan: RotationTarget, tilt: RotationTarget) -> Self {
        self.pan_target = pan;
        self.tilt_target = tilt;
        self
    }

    /// 1-based DMX address
    pub fn dmx_address(&self) -> u16 {
        self.base_address.saturating_add(1)
    }

    /// Absolute channel for an offset inside the fixture's window
    pub fn channel(&self, offset: u16) -> usize {
        usize::from(self.base_address) + usize::from(offset)
    }
}

/// On-disk layout of a fixture file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FixtureFile {
    #[serde(default, rename = "fixture")]
    pub fixtures: Vec<FixtureMapping>,
}

/// Current set of fixtures, grouped by universe
#[derive(Debug, Clone, Default)]
pub struct FixtureRegistry {
    universes: BTreeMap<UniverseIndex, BTreeMap<String, FixtureMapping>>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load fixtures from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let file: FixtureFile = read_document(path)?;
        let mut registry = Self::new();
        for fixture in file.fixtures {
            if registry.universe_of(&fixture.name).is_some() {
                return Err(CoreError::DuplicateName(fixture.name));
            }
            registry.insert(fixture);
        }
        tracing::info!("Loaded {} fixtures from {}", registry.len(), path.display());
        Ok(registry)
    }

    /// Add a fixture, replacing any fixture with the same name in any universe.
    ///
    /// Returns the universes whose fixture set changed.
    pub fn insert(&mut self, fixture: FixtureMapping) -> Vec<UniverseIndex> {
        let mut touched: Vec<UniverseIndex> = self
            .remove(&fixture.name)
            .map(|old| vec![old.universe])
            .unwrap_or_default();
        if !touched.contains(&fixture.universe) {
            touched.push(fixture.universe);
        }
        self.universes
            .entry(fixture.universe)
            .or_default()
            .insert(fixture.name.clone(), fixture);
        touched
    }

    /// Replace a fixture after the host edited it. Same as [`FixtureRegistry::insert`].
    pub fn update(&mut self, fixture: FixtureMapping) -> Vec<UniverseIndex> {
        self.insert(fixture)
    }

    /// Remove a fixture by name from whichever universe holds it
    pub fn remove(&mut self, name: &str) -> Option<FixtureMapping> {
        let universe = self.universe_of(name)?;
        let fixtures = self.universes.get_mut(&universe)?;
        let removed = fixtures.remove(name);
        if fixtures.is_empty() {
            self.universes.remove(&universe);
        }
        removed
    }

    /// Universe a fixture is patched into
    pub fn universe_of(&self, name: &str) -> Option<UniverseIndex> {
        self.universes
            .iter()
            .find(|(_, fixtures)| fixtures.contains_key(name))
            .map(|(index, _)| *index)
    }

    pub fn get(&self, name: &str) -> Option<&FixtureMapping> {
        self.universes.values().find_map(|fixtures| fixtures.get(name))
    }

    /// Universes that have at least one fixture
    pub fn universe_ids(&self) -> impl Iterator<Item = UniverseIndex> + '_ {
        self.universes.keys().copied()
    }

    pub fn has_universe(&self, index: UniverseIndex) -> bool {
        self.universes.contains_key(&index)
    }

    /// Fixtures patched into a universe, ordered by name
    pub fn fixtures_in(&self, index: UniverseIndex) -> impl Iterator<Item = &FixtureMapping> {
        self.universes
            .get(&index)
            .into_iter()
            .flat_map(|fixtures| fixtures.values())
    }

    pub fn len(&self) -> usize {
        self.universes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.universes.is_empty()
    }
}
