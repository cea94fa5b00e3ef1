//! Mapping Engine - DMX channel windows to light attributes
//!
//! Once per tick the engine drains the universe store's pending changes, skips
//! universes nobody listens to, and resolves every registered fixture's channel
//! window into color, power, pan, tilt and zoom. Only attributes whose source
//! channels changed are recomputed; a full refresh recomputes everything.
//!
//! Resolved updates are handed to a [`SyncSink`], the boundary to the host
//! scene. The sink runs after the universe lock has been released.
//!
//! ## Attribute rules
//!
//! | Attribute | Source | Result |
//! |-----------|--------|--------|
//! | color | rgbw / cmy (normalized), wheel (raw) | RGB triple |
//! | pan, tilt | normalized | `(v - 0.5) * range` radians |
//! | zoom | normalized, optionally inverted | `min + v * (max - min)` radians |
//! | power | normalized dimmer | `lumens * v / 6.83` |
//!
//! Channels past the end of the universe read as 0. A fixture whose type is
//! unknown is skipped for the tick. Attributes a fixture type does not define
//! are never emitted, so the host keeps its previous value.

use crate::color::{cmy_to_rgb, rgbw_to_rgb, wheel_to_rgb, Rgb};
use crate::fixture::{FixtureMapping, FixtureRegistry, RotationTarget};
use crate::fixture_type::{ColorProfile, FixtureType, FixtureTypeCatalog, ZoomProfile};
use crate::universe::{ChangeSet, Universe, UniverseIndex, UniverseStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Empirical conversion from candela-equivalent lumens to host power units
pub const LUMEN_POWER_DIVISOR: f32 = 6.83;

/// Pan or tilt angle for a channel fraction
pub fn axis_angle(fraction: f32, range: f32) -> f32 {
    (fraction - 0.5) * range
}

/// Beam angle for a zoom channel fraction
pub fn zoom_angle(fraction: f32, zoom: &ZoomProfile) -> f32 {
    let fraction = if zoom.invert { 1.0 - fraction } else { fraction };
    zoom.min_angle + fraction * (zoom.max_angle - zoom.min_angle)
}

/// Host power for a dimmer fraction
pub fn power(fraction: f32, lumens: f32) -> f32 {
    lumens * fraction / LUMEN_POWER_DIVISOR
}

/// Rotation to write on one Euler axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisWrite {
    pub target: RotationTarget,
    pub radians: f32,
}

/// Attributes resolved for one fixture in one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureUpdate {
    pub fixture: String,
    pub universe: UniverseIndex,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan: Option<AxisWrite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilt: Option<AxisWrite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f32>,
    /// Axes no longer driven by this fixture; zero them before pan/tilt
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub released: Vec<RotationTarget>,
    /// Set while recording so the host can keyframe the values
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub record: bool,
}

impl FixtureUpdate {
    fn new(fixture: &FixtureMapping, record: bool) -> Self {
        Self {
            fixture: fixture.name.clone(),
            universe: fixture.universe,
            color: None,
            power: None,
            pan: None,
            tilt: None,
            zoom: None,
            released: Vec::new(),
            record,
        }
    }

    /// Whether the update carries nothing to apply
    pub fn is_empty(&self) -> bool {
        self.color.is_none()
            && self.power.is_none()
            && self.pan.is_none()
            && self.tilt.is_none()
            && self.zoom.is_none()
            && self.released.is_empty()
    }

    /// Rotation writes in the order they must be applied: released axes are
    /// zeroed first, then pan and tilt
    pub fn rotation_writes(&self) -> impl Iterator<Item = AxisWrite> + '_ {
        self.released
            .iter()
            .map(|target| AxisWrite {
                target: *target,
                radians: 0.0,
            })
            .chain(self.pan)
            .chain(self.tilt)
    }
}

/// Result of handing an update to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied,
    /// The host object behind the fixture no longer exists
    TargetMissing,
}

/// Boundary to the host scene
pub trait SyncSink {
    fn apply(&mut self, update: &FixtureUpdate) -> SyncOutcome;
}

/// Collects updates, e.g. for hosts that apply a whole batch at once
impl SyncSink for Vec<FixtureUpdate> {
    fn apply(&mut self, update: &FixtureUpdate) -> SyncOutcome {
        self.push(update.clone());
        SyncOutcome::Applied
    }
}

/// Whether incoming DMX drives the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlState {
    /// Apply incoming DMX
    #[default]
    Listen,
    /// Apply incoming DMX and flag updates for keyframing
    Record,
    /// Ignore incoming DMX while the host plays back recorded animation
    Play,
}

/// Summary of one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Universes that had pending changes
    pub universes_pending: usize,
    /// Universes that had pending changes and registered fixtures
    pub universes_mapped: usize,
    pub fixtures_updated: usize,
    /// Fixtures skipped because their type is unknown
    pub fixtures_skipped: usize,
    /// Fixtures whose host object vanished; the host should unregister them
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DrivenAxes {
    pan: RotationTarget,
    tilt: RotationTarget,
}

/// Pulls pending universes and maps them onto registered fixtures
pub struct MappingEngine {
    store: Arc<UniverseStore>,
    catalog: Arc<FixtureTypeCatalog>,
    driven: HashMap<String, DrivenAxes>,
    state: ControlState,
}

impl MappingEngine {
    pub fn new(store: Arc<UniverseStore>, catalog: Arc<FixtureTypeCatalog>) -> Self {
        Self {
            store,
            catalog,
            driven: HashMap::new(),
            state: ControlState::default(),
        }
    }

    pub fn control_state(&self) -> ControlState {
        self.state
    }

    pub fn set_control_state(&mut self, state: ControlState) {
        if self.state != state {
            debug!("Control state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }

    /// Run one mapping cycle
    pub fn tick(&mut self, registry: &FixtureRegistry, sink: &mut dyn SyncSink) -> TickReport {
        // Unregistered fixtures start from default axes if they come back
        self.driven.retain(|name, _| registry.get(name).is_some());

        let pending = self.store.take_pending();
        let mut report = TickReport {
            universes_pending: pending.len(),
            ..TickReport::default()
        };

        if self.state == ControlState::Play {
            if !pending.is_empty() {
                trace!("Discarding {} pending universes during playback", pending.len());
            }
            return report;
        }

        for (index, changes) in pending {
            if !registry.has_universe(index) {
                continue;
            }
            report.universes_mapped += 1;

            let (updates, skipped) = self.map_universe(index, &changes, registry);
            report.fixtures_skipped += skipped;

            for update in &updates {
                match sink.apply(update) {
                    SyncOutcome::Applied => report.fixtures_updated += 1,
                    SyncOutcome::TargetMissing => {
                        debug!("Fixture {} has no host object", update.fixture);
                        report.missing.push(update.fixture.clone());
                    }
                }
            }
        }

        for name in &report.missing {
            self.driven.remove(name);
        }
        report
    }

    fn map_universe(
        &mut self,
        index: UniverseIndex,
        changes: &ChangeSet,
        registry: &FixtureRegistry,
    ) -> (Vec<FixtureUpdate>, usize) {
        // Copy out so the listener can keep writing while fixtures resolve
        let universe = self.store.with_universe(index, Universe::clone);
        let record = self.state == ControlState::Record;

        let mut updates = Vec::new();
        let mut skipped = 0;
        for fixture in registry.fixtures_in(index) {
            let Some(fixture_type) = self.catalog.get(&fixture.fixture_type) else {
                debug!(
                    "Skipping fixture {}: unknown fixture type '{}'",
                    fixture.name, fixture.fixture_type
                );
                skipped += 1;
                continue;
            };

            let current = DrivenAxes {
                pan: fixture.pan_target,
                tilt: fixture.tilt_target,
            };
            let previous = self.driven.insert(fixture.name.clone(), current);

            let update = resolve_fixture(
                fixture,
                fixture_type,
                &universe,
                changes,
                previous,
                record,
            );
            if !update.is_empty() {
                updates.push(update);
            }
        }
        (updates, skipped)
    }
}

fn resolve_fixture(
    fixture: &FixtureMapping,
    fixture_type: &FixtureType,
    universe: &Universe,
    changes: &ChangeSet,
    previous: Option<DrivenAxes>,
    record: bool,
) -> FixtureUpdate {
    let mut update = FixtureUpdate::new(fixture, record);
    let changed = |offset: u16| changes.contains(fixture.channel(offset));
    let value = |offset: u16| universe.normalized(fixture.channel(offset));

    update.color = resolve_color(fixture_type.color(), fixture, universe, changes);

    if let Some(dimmer) = fixture_type.dimmer() {
        if changed(dimmer.offset) {
            update.power = Some(power(value(dimmer.offset), dimmer.lumens));
        }
    }

    if fixture.kind.supports_rotation() {
        // A retargeted axis is zeroed on its old target and rewritten on the new one
        let mut pan_moved = false;
        let mut tilt_moved = false;
        if let Some(previous) = previous {
            if previous.pan != fixture.pan_target {
                pan_moved = true;
                if previous.pan.is_driven() {
                    update.released.push(previous.pan);
                }
            }
            if previous.tilt != fixture.tilt_target {
                tilt_moved = true;
                if previous.tilt.is_driven() && !update.released.contains(&previous.tilt) {
                    update.released.push(previous.tilt);
                }
            }
        }

        if let Some(pan) = fixture_type.pan() {
            if fixture.pan_target.is_driven() && (pan_moved || changed(pan.offset)) {
                update.pan = Some(AxisWrite {
                    target: fixture.pan_target,
                    radians: axis_angle(value(pan.offset), pan.range),
                });
            }
        }
        if let Some(tilt) = fixture_type.tilt() {
            if fixture.tilt_target.is_driven() && (tilt_moved || changed(tilt.offset)) {
                update.tilt = Some(AxisWrite {
                    target: fixture.tilt_target,
                    radians: axis_angle(value(tilt.offset), tilt.range),
                });
            }
        }
    }

    if fixture.kind.supports_zoom() {
        if let Some(zoom) = fixture_type.zoom() {
            if changed(zoom.offset) {
                update.zoom = Some(zoom_angle(value(zoom.offset), zoom));
            }
        }
    }

    update
}

fn resolve_color(
    profile: &ColorProfile,
    fixture: &FixtureMapping,
    universe: &Universe,
    changes: &ChangeSet,
) -> Option<Rgb> {
    match profile {
        ColorProfile::None => None,
        ColorProfile::Rgbw {
            red,
            green,
            blue,
            white,
        } => {
            let channels = [*red, *green, *blue, *white].map(|o| fixture.channel(o));
            if !channels.iter().any(|c| changes.contains(*c)) {
                return None;
            }
            let [r, g, b, w] = channels.map(|c| universe.normalized(c));
            Some(rgbw_to_rgb(r, g, b, w))
        }
        ColorProfile::Cmy {
            cyan,
            magenta,
            yellow,
        } => {
            let channels = [*cyan, *magenta, *yellow].map(|o| fixture.channel(o));
            if !channels.iter().any(|c| changes.contains(*c)) {
                return None;
            }
            let [c, m, y] = channels.map(|c| universe.normalized(c));
            Some(cmy_to_rgb(c, m, y))
        }
        ColorProfile::Wheel { channel, wheel } => {
            let channel = fixture.channel(*channel);
            changes
                .contains(channel)
                .then(|| wheel_to_rgb(wheel, universe.raw(channel)))
        }
    }
}
