//! Fixture Types - channel layout profiles for moving lights
//!
//! A fixture type says which channel offsets (relative to a fixture's base
//! address) carry color, pan, tilt, zoom and dimmer, plus the physical ranges
//! needed to turn channel fractions into angles and power.
//!
//! Profiles are written in degrees ([`FixtureTypeDef`]) and converted once into
//! an immutable [`FixtureType`] whose angles are in radians.

use crate::color::ColorWheel;
use crate::config::read_document;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Lumens assumed when a definition omits them
pub const DEFAULT_LUMENS: f32 = 1000.0;

/// Color model of a fixture type with the channel offsets it needs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum ColorProfile {
    /// Fixture has no color channels
    #[default]
    None,
    /// Additive red/green/blue/white mixing
    Rgbw {
        red: u16,
        green: u16,
        blue: u16,
        white: u16,
    },
    /// Subtractive cyan/magenta/yellow flags
    Cmy { cyan: u16, magenta: u16, yellow: u16 },
    /// Discrete color wheel driven by one raw channel
    Wheel { channel: u16, wheel: ColorWheel },
}

impl ColorProfile {
    /// Offsets of every channel the color model reads
    pub fn offsets(&self) -> Vec<u16> {
        match self {
            ColorProfile::None => Vec::new(),
            ColorProfile::Rgbw {
                red,
                green,
                blue,
                white,
            } => vec![*red, *green, *blue, *white],
            ColorProfile::Cmy {
                cyan,
                magenta,
                yellow,
            } => vec![*cyan, *magenta, *yellow],
            ColorProfile::Wheel { channel, .. } => vec![*channel],
        }
    }
}

/// Pan or tilt axis, range in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisProfile {
    pub offset: u16,
    /// Full travel of the axis in radians
    pub range: f32,
}

/// Zoom channel with beam angles in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomProfile {
    pub offset: u16,
    pub min_angle: f32,
    pub max_angle: f32,
    /// Channel value 0 means widest beam instead of narrowest
    pub invert: bool,
}

/// Dimmer channel and light output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimmerProfile {
    pub offset: u16,
    pub lumens: f32,
}

/// Immutable fixture profile used by the mapping engine
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureType {
    name: String,
    color: ColorProfile,
    pan: Option<AxisProfile>,
    tilt: Option<AxisProfile>,
    zoom: Option<ZoomProfile>,
    dimmer: Option<DimmerProfile>,
}

impl FixtureType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> &ColorProfile {
        &self.color
    }

    pub fn pan(&self) -> Option<&AxisProfile> {
        self.pan.as_ref()
    }

    pub fn tilt(&self) -> Option<&AxisProfile> {
        self.tilt.as_ref()
    }

    pub fn zoom(&self) -> Option<&ZoomProfile> {
        self.zoom.as_ref()
    }

    pub fn dimmer(&self) -> Option<&DimmerProfile> {
        self.dimmer.as_ref()
    }

    /// Number of channels from the base address to the highest used offset
    pub fn footprint(&self) -> u16 {
        let mut offsets = self.color.offsets();
        offsets.extend(self.pan.map(|p| p.offset));
        offsets.extend(self.tilt.map(|t| t.offset));
        offsets.extend(self.zoom.map(|z| z.offset));
        offsets.extend(self.dimmer.map(|d| d.offset));
        offsets.into_iter().max().map(|max| max + 1).unwrap_or(0)
    }
}

/// Axis as written in a definition file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisDef {
    pub offset: u16,
    /// Full travel in degrees
    pub range: f32,
}

/// Zoom as written in a definition file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomDef {
    pub offset: u16,
    /// Narrowest beam angle in degrees
    pub min: f32,
    /// Widest beam angle in degrees
    pub max: f32,
    #[serde(default)]
    pub invert: bool,
}

/// Fixture type as written in a definition file (angles in degrees)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureTypeDef {
    pub name: String,
    #[serde(default = "default_lumens")]
    pub lumens: f32,
    #[serde(default)]
    pub color: ColorProfile,
    #[serde(default)]
    pub pan: Option<AxisDef>,
    #[serde(default)]
    pub tilt: Option<AxisDef>,
    #[serde(default)]
    pub zoom: Option<ZoomDef>,
    /// Offset of the dimmer channel
    #[serde(default)]
    pub dimmer: Option<u16>,
}

fn default_lumens() -> f32 {
    DEFAULT_LUMENS
}

impl TryFrom<FixtureTypeDef> for FixtureType {
    type Error = CoreError;

    fn try_from(def: FixtureTypeDef) -> Result<Self> {
        let invalid = |reason: &str| CoreError::InvalidFixtureType {
            name: def.name.clone(),
            reason: reason.to_string(),
        };

        if def.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if !def.lumens.is_finite() || def.lumens < 0.0 {
            return Err(invalid("lumens must be a non-negative number"));
        }
        for axis in [def.pan, def.tilt].iter().flatten() {
            if !axis.range.is_finite() || axis.range < 0.0 {
                return Err(invalid("axis range must be a non-negative number of degrees"));
            }
        }
        if let Some(zoom) = def.zoom {
            if !zoom.min.is_finite() || !zoom.max.is_finite() || zoom.min < 0.0 || zoom.max < 0.0 {
                return Err(invalid("zoom angles must be non-negative degrees"));
            }
            if zoom.min > zoom.max {
                return Err(invalid("minimum zoom is larger than maximum zoom"));
            }
        }

        let to_axis = |axis: AxisDef| AxisProfile {
            offset: axis.offset,
            range: axis.range.to_radians(),
        };

        Ok(FixtureType {
            pan: def.pan.map(to_axis),
            tilt: def.tilt.map(to_axis),
            zoom: def.zoom.map(|zoom| ZoomProfile {
                offset: zoom.offset,
                min_angle: zoom.min.to_radians(),
                max_angle: zoom.max.to_radians(),
                invert: zoom.invert,
            }),
            dimmer: def.dimmer.map(|offset| DimmerProfile {
                offset,
                lumens: def.lumens,
            }),
            color: def.color,
            name: def.name,
        })
    }
}

/// On-disk layout of a fixture type file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FixtureTypeFile {
    #[serde(default, rename = "fixture_type")]
    pub fixture_types: Vec<FixtureTypeDef>,
}

/// Read-only lookup of fixture types by name
#[derive(Debug, Clone, Default)]
pub struct FixtureTypeCatalog {
    types: BTreeMap<String, FixtureType>,
}

impl FixtureTypeCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the stock `wash`, `spot` and `pointe` profiles
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for def in builtin_definitions() {
            // Built-in definitions are valid by construction
            if let Ok(fixture_type) = FixtureType::try_from(def) {
                catalog.insert(fixture_type);
            }
        }
        catalog
    }

    /// Build a catalog from definitions. Duplicate names are rejected.
    pub fn from_definitions(defs: Vec<FixtureTypeDef>) -> Result<Self> {
        let mut catalog = Self::new();
        for def in defs {
            if catalog.types.contains_key(&def.name) {
                return Err(CoreError::DuplicateName(def.name));
            }
            catalog.insert(FixtureType::try_from(def)?);
        }
        Ok(catalog)
    }

    /// Load definitions from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let file: FixtureTypeFile = read_document(path)?;
        let catalog = Self::from_definitions(file.fixture_types)?;
        tracing::info!(
            "Loaded {} fixture types from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Add or replace a fixture type
    pub fn insert(&mut self, fixture_type: FixtureType) {
        self.types.insert(fixture_type.name.clone(), fixture_type);
    }

    /// Merge another catalog over this one; same names are replaced
    pub fn extend(&mut self, other: FixtureTypeCatalog) {
        self.types.extend(other.types);
    }

    /// Look up a fixture type by name
    pub fn get(&self, name: &str) -> Option<&FixtureType> {
        self.types.get(name)
    }

    /// Names of all fixture types, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn builtin_definitions() -> Vec<FixtureTypeDef> {
    use crate::color::WheelSlot;

    let slot = |threshold: u8, color: [f32; 3]| WheelSlot { threshold, color };
    let pointe_wheel = ColorWheel::new(vec![
        slot(0, [1.0, 1.0, 1.0]),
        slot(9, [1.0, 0.0, 0.0]),
        slot(18, [0.0, 0.0, 1.0]),
        slot(27, [0.0, 1.0, 1.0]),
        slot(37, [0.2, 1.0, 0.2]),
        slot(46, [1.0, 0.0, 1.0]),
    ]);

    let mut defs = vec![
        FixtureTypeDef {
            name: "wash".to_string(),
            lumens: DEFAULT_LUMENS,
            color: ColorProfile::Rgbw {
                red: 4,
                green: 6,
                blue: 8,
                white: 10,
            },
            pan: Some(AxisDef {
                offset: 0,
                range: 623.0,
            }),
            tilt: Some(AxisDef {
                offset: 2,
                range: 295.0,
            }),
            zoom: Some(ZoomDef {
                offset: 15,
                min: 7.0,
                max: 50.0,
                invert: false,
            }),
            dimmer: None,
        },
        FixtureTypeDef {
            name: "spot".to_string(),
            lumens: DEFAULT_LUMENS,
            color: ColorProfile::Cmy {
                cyan: 8,
                magenta: 9,
                yellow: 10,
            },
            pan: Some(AxisDef {
                offset: 0,
                range: 540.0,
            }),
            tilt: Some(AxisDef {
                offset: 2,
                range: 270.0,
            }),
            zoom: Some(ZoomDef {
                offset: 21,
                min: 10.0,
                max: 45.0,
                invert: false,
            }),
            dimmer: None,
        },
    ];

    if let Some(wheel) = pointe_wheel {
        defs.push(FixtureTypeDef {
            name: "pointe".to_string(),
            lumens: DEFAULT_LUMENS,
            color: ColorProfile::Wheel { channel: 6, wheel },
            pan: Some(AxisDef {
                offset: 0,
                range: 540.0,
            }),
            tilt: Some(AxisDef {
                offset: 2,
                range: 270.0,
            }),
            zoom: Some(ZoomDef {
                offset: 16,
                min: 5.0,
                max: 20.0,
                invert: false,
            }),
            dimmer: None,
        });
    }

    defs
}
