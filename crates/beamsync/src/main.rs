//! BeamSync - Art-Net to light fixture attribute bridge
//!
//! Listens for Art-Net, maps changed channels onto the configured fixtures at
//! a fixed cadence, and writes every fixture update as a JSON line to stdout.
//! Operator commands (`listen`, `record`, `play`, `refresh`, `quit`) are read
//! from stdin; end of input shuts the bridge down.

mod command;
mod logging_setup;
mod sink;

use anyhow::{Context, Result};
use beamsync_control::ArtNetListener;
use beamsync_core::{
    BeamsyncConfig, FixtureRegistry, FixtureTypeCatalog, MappingEngine, UniverseStore,
};
use crossbeam_channel::select;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use command::Command;
use sink::JsonLinesSink;

const DEFAULT_CONFIG: &str = "beamsync.toml";

/// Config path from the first argument, else `beamsync.toml` if it exists
fn config_path() -> Option<PathBuf> {
    std::env::args_os().nth(1).map(PathBuf::from).or_else(|| {
        let default = Path::new(DEFAULT_CONFIG);
        default.is_file().then(|| default.to_path_buf())
    })
}

fn load_config(path: Option<&Path>) -> Result<BeamsyncConfig> {
    match path {
        Some(path) => BeamsyncConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(BeamsyncConfig::default()),
    }
}

/// Built-in fixture types, with file definitions merged over them
fn load_catalog(config: &BeamsyncConfig) -> Result<FixtureTypeCatalog> {
    let mut catalog = FixtureTypeCatalog::builtin();
    if let Some(path) = &config.fixture_types {
        let extra = FixtureTypeCatalog::load(path)
            .with_context(|| format!("Failed to load fixture types {}", path.display()))?;
        catalog.extend(extra);
    }
    Ok(catalog)
}

fn load_registry(config: &BeamsyncConfig, catalog: &FixtureTypeCatalog) -> Result<FixtureRegistry> {
    let registry = match &config.fixtures {
        Some(path) => FixtureRegistry::load(path)
            .with_context(|| format!("Failed to load fixtures {}", path.display()))?,
        None => FixtureRegistry::new(),
    };
    for index in registry.universe_ids() {
        for fixture in registry.fixtures_in(index) {
            if catalog.get(&fixture.fixture_type).is_none() {
                warn!(
                    "Fixture {} uses unknown fixture type '{}'",
                    fixture.name, fixture.fixture_type
                );
            }
        }
    }
    Ok(registry)
}

fn main() -> Result<()> {
    let path = config_path();
    let config = load_config(path.as_deref())?;
    let _log_guard = logging_setup::init(&config.log)?;

    info!("==========================================");
    info!("===      BeamSync Session Started      ===");
    info!("==========================================");
    match &path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let catalog = load_catalog(&config)?;
    info!(
        "Fixture types: {}",
        catalog.names().collect::<Vec<_>>().join(", ")
    );
    let mut registry = load_registry(&config, &catalog)?;
    info!(
        "{} fixtures across {} universes",
        registry.len(),
        registry.universe_ids().count()
    );

    let store = Arc::new(UniverseStore::new());
    let mut listener = ArtNetListener::new(config.listener.clone(), store.clone());
    if let Err(e) = listener.start() {
        error!("Art-Net listener unavailable: {}", e);
    }

    // First tick maps every registered fixture from zeroed channels
    for index in registry.universe_ids() {
        store.notify_universe_refresh(index);
    }

    let commands = command::spawn_stdin_reader().context("Failed to spawn command reader")?;
    let ticker = crossbeam_channel::tick(config.tick_interval());
    let mut engine = MappingEngine::new(store.clone(), Arc::new(catalog));
    let mut sink = JsonLinesSink::new(std::io::stdout().lock());

    info!("--- Entering Main Loop at {} Hz ---", config.tick_rate_hz);
    loop {
        select! {
            recv(ticker) -> _ => {
                let report = engine.tick(&registry, &mut sink);
                if report.fixtures_updated > 0 {
                    sink.flush();
                    debug!(
                        "Tick: {} universes mapped, {} fixtures updated",
                        report.universes_mapped, report.fixtures_updated
                    );
                }
                for name in &report.missing {
                    if registry.remove(name).is_some() {
                        info!("Removed fixture {}: host object is gone", name);
                    }
                }
            }
            recv(commands) -> command => match command {
                Ok(Command::State(state)) => {
                    info!("Control state: {:?}", state);
                    engine.set_control_state(state);
                }
                Ok(Command::Refresh) => store.notify_all_universes(),
                Ok(Command::Quit) | Err(_) => break,
            },
        }
    }

    listener.stop();
    let stats = listener.stats();
    info!(
        "Art-Net: {} datagrams, {} frames applied, {} dropped, {} reconnects",
        stats.datagrams_received, stats.frames_applied, stats.frames_dropped, stats.reconnects
    );
    info!("Wrote {} fixture updates", sink.written());
    sink.flush();
    info!("BeamSync shut down");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_with_extra_types_and_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("beamsync.toml"),
            "fixture_types = \"types.toml\"\nfixtures = \"fixtures.json\"\n",
        )
        .unwrap();

        let mut types = std::fs::File::create(dir.path().join("types.toml")).unwrap();
        write!(
            types,
            r#"
[[fixture_type]]
name = "par"
dimmer = 0

[fixture_type.color]
model = "rgbw"
red = 1
green = 2
blue = 3
white = 4
"#
        )
        .unwrap();

        std::fs::write(
            dir.path().join("fixtures.json"),
            r#"{"fixture": [{"name": "Par.001", "universe": 1, "address": 1, "fixture_type": "par"}]}"#,
        )
        .unwrap();

        let config = load_config(Some(&dir.path().join("beamsync.toml"))).unwrap();
        let catalog = load_catalog(&config).unwrap();
        assert!(catalog.get("par").is_some());
        assert!(catalog.get("wash").is_some());

        let registry = load_registry(&config, &catalog).unwrap();
        assert_eq!(registry.universe_of("Par.001"), Some(1));
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
        assert!(load_config(None).is_ok());
    }
}
