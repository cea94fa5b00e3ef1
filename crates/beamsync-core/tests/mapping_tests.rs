use beamsync_core::{
    ChangeSet, FixtureMapping, FixtureRegistry, FixtureType, FixtureTypeCatalog,
    FixtureTypeDef, FixtureUpdate, LightKind, MappingEngine, RotationTarget, SyncOutcome,
    SyncSink, UniverseStore,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

fn setup(registry: &mut FixtureRegistry) -> (Arc<UniverseStore>, MappingEngine) {
    let store = Arc::new(UniverseStore::new());
    let engine = MappingEngine::new(store.clone(), Arc::new(FixtureTypeCatalog::builtin()));
    registry.insert(FixtureMapping::new("Spot.001", 1, 1, "wash").unwrap());
    (store, engine)
}

/// Write raw values at absolute channels the way the listener does
fn write(store: &UniverseStore, universe: u32, values: &[(usize, u8)]) {
    let mut frame = store.get_raw_universe(universe).to_vec();
    for (channel, value) in values {
        frame[*channel] = *value;
    }
    let changed = store.write_channels(universe, &frame);
    store.notify_change(universe, &changed);
}

fn near(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn test_only_changed_attributes_are_emitted() {
    let mut registry = FixtureRegistry::new();
    let (store, mut engine) = setup(&mut registry);

    // White channel of the wash
    write(&store, 1, &[(10, 255)]);
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    let report = engine.tick(&registry, &mut sink);

    assert_eq!(report.universes_mapped, 1);
    assert_eq!(report.fixtures_updated, 1);
    let update = &sink[0];
    assert_eq!(update.fixture, "Spot.001");
    let color = update.color.unwrap();
    assert!(color.iter().all(|c| near(*c, 0.25)));
    assert!(update.pan.is_none());
    assert!(update.tilt.is_none());
    assert!(update.zoom.is_none());
    assert!(update.power.is_none());
}

#[test]
fn test_no_pending_means_no_updates() {
    let mut registry = FixtureRegistry::new();
    let (_store, mut engine) = setup(&mut registry);

    let mut sink: Vec<FixtureUpdate> = Vec::new();
    let report = engine.tick(&registry, &mut sink);
    assert_eq!(report.universes_pending, 0);
    assert!(sink.is_empty());
}

#[test]
fn test_universe_without_fixtures_is_ignored() {
    let mut registry = FixtureRegistry::new();
    let (store, mut engine) = setup(&mut registry);

    write(&store, 7, &[(0, 255)]);
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    let report = engine.tick(&registry, &mut sink);
    assert_eq!(report.universes_pending, 1);
    assert_eq!(report.universes_mapped, 0);
    assert!(sink.is_empty());
    assert!(!store.has_pending());
}

#[test]
fn test_full_refresh_computes_everything() {
    let mut registry = FixtureRegistry::new();
    let (store, mut engine) = setup(&mut registry);

    store.get_universe(1);
    store.notify_all_universes();
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);

    let update = &sink[0];
    // rgbw all zero
    assert_eq!(update.color, Some([0.0, 0.0, 0.0]));
    let pan = update.pan.unwrap();
    assert_eq!(pan.target, RotationTarget::LocalX);
    assert!(near(pan.radians, -623f32.to_radians() / 2.0));
    assert_eq!(update.tilt.unwrap().target, RotationTarget::LocalZ);
    assert!(near(update.zoom.unwrap(), 7f32.to_radians()));
}

#[test]
fn test_pan_retarget_zeroes_old_axis_once() {
    let mut registry = FixtureRegistry::new();
    let (store, mut engine) = setup(&mut registry);

    write(&store, 1, &[(0, 200)]);
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);
    assert_eq!(sink[0].pan.unwrap().target, RotationTarget::LocalX);
    assert!(sink[0].released.is_empty());

    // Operator moves pan to the local Y axis
    let fixture = registry.get("Spot.001").unwrap().clone();
    let touched = registry.update(fixture.with_targets(RotationTarget::LocalY, RotationTarget::LocalZ));
    for universe in touched {
        store.notify_universe_refresh(universe);
    }

    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);
    let update = &sink[0];
    assert_eq!(update.released, vec![RotationTarget::LocalX]);
    let pan = update.pan.unwrap();
    assert_eq!(pan.target, RotationTarget::LocalY);
    assert!(near(pan.radians, (200.0 / 255.0 - 0.5) * 623f32.to_radians()));

    let writes: Vec<_> = update.rotation_writes().collect();
    assert_eq!(writes[0].target, RotationTarget::LocalX);
    assert_eq!(writes[0].radians, 0.0);

    // Subsequent pan values only go to the new axis
    write(&store, 1, &[(0, 10)]);
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);
    assert!(sink[0].released.is_empty());
    assert_eq!(sink[0].pan.unwrap().target, RotationTarget::LocalY);
}

#[test]
fn test_retarget_applies_without_channel_change() {
    let mut registry = FixtureRegistry::new();
    let (store, mut engine) = setup(&mut registry);

    write(&store, 1, &[(0, 200), (4, 1)]);
    engine.tick(&registry, &mut Vec::<FixtureUpdate>::new());

    let fixture = registry.get("Spot.001").unwrap().clone();
    registry.update(fixture.with_targets(RotationTarget::ParentZ, RotationTarget::LocalZ));
    // Only the red channel moves this tick
    write(&store, 1, &[(4, 2)]);

    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);
    assert_eq!(sink[0].released, vec![RotationTarget::LocalX]);
    assert_eq!(sink[0].pan.unwrap().target, RotationTarget::ParentZ);
    assert!(sink[0].tilt.is_none());
}

#[test]
fn test_unknown_fixture_type_is_skipped() {
    let mut registry = FixtureRegistry::new();
    let (store, mut engine) = setup(&mut registry);
    registry.insert(FixtureMapping::new("Mystery", 1, 100, "laser").unwrap());

    write(&store, 1, &[(0, 255), (99, 255)]);
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    let report = engine.tick(&registry, &mut sink);

    assert_eq!(report.fixtures_skipped, 1);
    assert_eq!(report.fixtures_updated, 1);
    assert_eq!(sink[0].fixture, "Spot.001");
}

#[test]
fn test_cmy_and_wheel_models() {
    let mut registry = FixtureRegistry::new();
    let (store, mut engine) = setup(&mut registry);
    registry.insert(FixtureMapping::new("Spot.cmy", 1, 101, "spot").unwrap());
    registry.insert(FixtureMapping::new("Spot.wheel", 1, 201, "pointe").unwrap());

    // spot: cyan at offset 8; pointe: wheel at offset 6, raw 12 selects blue
    write(&store, 1, &[(108, 255), (206, 12)]);
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);

    let cmy = sink.iter().find(|u| u.fixture == "Spot.cmy").unwrap();
    assert_eq!(cmy.color, Some([0.0, 1.0, 1.0]));
    let wheel = sink.iter().find(|u| u.fixture == "Spot.wheel").unwrap();
    assert_eq!(wheel.color, Some([0.0, 0.0, 1.0]));
    assert!(sink.iter().all(|u| u.fixture != "Spot.001"));
}

#[test]
fn test_light_kind_limits_attributes() {
    let mut registry = FixtureRegistry::new();
    let (store, mut engine) = setup(&mut registry);
    registry.insert(
        FixtureMapping::new("Bulb", 2, 1, "wash")
            .unwrap()
            .with_kind(LightKind::Point),
    );
    registry.insert(
        FixtureMapping::new("Panel", 2, 101, "wash")
            .unwrap()
            .with_kind(LightKind::Area),
    );

    store.get_universe(2);
    store.notify_universe_refresh(2);
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);

    let bulb = sink.iter().find(|u| u.fixture == "Bulb").unwrap();
    assert!(bulb.color.is_some());
    assert!(bulb.pan.is_none() && bulb.tilt.is_none() && bulb.zoom.is_none());

    let panel = sink.iter().find(|u| u.fixture == "Panel").unwrap();
    assert!(panel.pan.is_some());
    assert!(panel.zoom.is_none());
}

#[test]
fn test_dimmer_power_and_out_of_range_channels() {
    let def: FixtureTypeDef = serde_json::from_str(
        r#"{
            "name": "par",
            "lumens": 1000,
            "dimmer": 0,
            "zoom": {"offset": 20, "min": 10, "max": 40, "invert": true}
        }"#,
    )
    .unwrap();
    let mut catalog = FixtureTypeCatalog::builtin();
    catalog.insert(FixtureType::try_from(def).unwrap());

    let store = Arc::new(UniverseStore::new());
    let mut engine = MappingEngine::new(store.clone(), Arc::new(catalog));
    let mut registry = FixtureRegistry::new();
    // Zoom lands on channel 511 + 20, past the end of the universe
    registry.insert(FixtureMapping::new("Par", 1, 512, "par").unwrap());

    write(&store, 1, &[(511, 128)]);
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);
    let power = sink[0].power.unwrap();
    assert!(near(power, 1000.0 * (128.0 / 255.0) / 6.83));
    assert!(sink[0].zoom.is_none());
    assert!(sink[0].color.is_none());

    store.notify_universe_refresh(1);
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);
    // Missing channel reads 0, inverted zoom gives the widest angle
    assert!(near(sink[0].zoom.unwrap(), 40f32.to_radians()));
}

struct VanishingSink;

impl SyncSink for VanishingSink {
    fn apply(&mut self, _update: &FixtureUpdate) -> SyncOutcome {
        SyncOutcome::TargetMissing
    }
}

#[test]
fn test_missing_targets_are_reported() {
    let mut registry = FixtureRegistry::new();
    let (store, mut engine) = setup(&mut registry);

    write(&store, 1, &[(15, 99)]);
    let report = engine.tick(&registry, &mut VanishingSink);
    assert_eq!(report.missing, vec!["Spot.001".to_string()]);
    assert_eq!(report.fixtures_updated, 0);

    for name in &report.missing {
        registry.remove(name);
    }
    assert!(registry.is_empty());
}

#[test]
fn test_record_state_flags_updates() {
    let mut registry = FixtureRegistry::new();
    let (store, mut engine) = setup(&mut registry);
    engine.set_control_state(beamsync_core::ControlState::Record);

    write(&store, 1, &[(2, 77)]);
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);
    assert!(sink[0].record);
    assert!(sink[0].tilt.is_some());
}

#[test]
fn test_pending_merges_between_ticks() {
    let mut registry = FixtureRegistry::new();
    let (store, mut engine) = setup(&mut registry);

    write(&store, 1, &[(0, 1)]);
    write(&store, 1, &[(2, 1)]);
    write(&store, 1, &[(0, 2)]);

    let pending = store.take_pending();
    assert_eq!(pending[&1], ChangeSet::from_channels([0, 2]));

    write(&store, 1, &[(15, 3)]);
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);
    assert_eq!(sink.len(), 1);
    assert!(sink[0].zoom.is_some());
    assert!(sink[0].pan.is_none());
}

#[test]
fn test_reregistered_fixture_starts_with_fresh_axes() {
    let mut registry = FixtureRegistry::new();
    let (store, mut engine) = setup(&mut registry);

    write(&store, 1, &[(0, 200)]);
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);
    assert_eq!(sink[0].pan.unwrap().target, RotationTarget::LocalX);

    let fixture = registry.remove("Spot.001").unwrap();
    engine.tick(&registry, &mut Vec::<FixtureUpdate>::new());

    // Same name comes back driving a different axis
    let touched =
        registry.insert(fixture.with_targets(RotationTarget::LocalY, RotationTarget::LocalZ));
    for universe in touched {
        store.notify_universe_refresh(universe);
    }
    let mut sink: Vec<FixtureUpdate> = Vec::new();
    engine.tick(&registry, &mut sink);
    assert!(sink[0].released.is_empty());
    assert_eq!(sink[0].pan.unwrap().target, RotationTarget::LocalY);
}

/// On every event raised during a tick, writes a frame from another thread
/// and records whether that write finished within the deadline
struct WriteDuringTick {
    store: Arc<UniverseStore>,
    completed: Arc<Mutex<Vec<bool>>>,
}

impl<S: tracing::Subscriber> Layer<S> for WriteDuringTick {
    fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let store = self.store.clone();
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            store.write_channels(1, &[9]);
            let _ = tx.send(());
        });
        let done = rx.recv_timeout(Duration::from_millis(500)).is_ok();
        self.completed.lock().push(done);
    }
}

#[test]
fn test_tick_does_not_block_channel_writes() {
    let store = Arc::new(UniverseStore::new());
    let mut engine = MappingEngine::new(store.clone(), Arc::new(FixtureTypeCatalog::builtin()));
    let mut registry = FixtureRegistry::new();
    // Unknown type makes the engine log from inside the fixture loop
    registry.insert(FixtureMapping::new("Mystery.001", 1, 1, "mystery").unwrap());
    store.notify_universe_refresh(1);

    let completed = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(WriteDuringTick {
        store: store.clone(),
        completed: completed.clone(),
    });
    let report = tracing::subscriber::with_default(subscriber, || {
        engine.tick(&registry, &mut Vec::<FixtureUpdate>::new())
    });

    assert_eq!(report.fixtures_skipped, 1);
    let completed = completed.lock();
    assert!(!completed.is_empty());
    assert!(completed.iter().all(|done| *done));
    assert_eq!(store.get_raw_universe(1)[0], 9);
}
