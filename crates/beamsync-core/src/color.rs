//! Color conversion from fixture color models to RGB

use serde::{Deserialize, Serialize};

/// Linear RGB triple as consumed by the host
pub type Rgb = [f32; 3];

/// Convert RGBW fractions to RGB.
///
/// White bleeds a third into each primary before rescaling, so the result can
/// exceed `1.0` slightly. Callers clamp if the host requires it.
pub fn rgbw_to_rgb(red: f32, green: f32, blue: f32, white: f32) -> Rgb {
    let bleed = white / 3.0;
    [
        (red + bleed) * 3.0 / 4.0,
        (green + bleed) * 3.0 / 4.0,
        (blue + bleed) * 3.0 / 4.0,
    ]
}

/// Convert subtractive CMY fractions to RGB
pub fn cmy_to_rgb(cyan: f32, magenta: f32, yellow: f32) -> Rgb {
    [1.0 - cyan, 1.0 - magenta, 1.0 - yellow]
}

/// Discrete color wheel: raw DMX position thresholds mapped to colors
///
/// Entries are kept sorted by ascending threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<WheelSlot>", into = "Vec<WheelSlot>")]
pub struct ColorWheel {
    slots: Vec<WheelSlot>,
}

/// One slot of a color wheel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelSlot {
    /// Highest raw position that still selects this color
    pub threshold: u8,
    pub color: Rgb,
}

impl ColorWheel {
    /// Build a wheel from slots in any order. Returns `None` if empty or if
    /// two slots share a threshold.
    pub fn new(mut slots: Vec<WheelSlot>) -> Option<Self> {
        if slots.is_empty() {
            return None;
        }
        slots.sort_by_key(|slot| slot.threshold);
        if slots.windows(2).any(|w| w[0].threshold == w[1].threshold) {
            return None;
        }
        Some(Self { slots })
    }

    /// Slots in ascending threshold order
    pub fn slots(&self) -> &[WheelSlot] {
        &self.slots
    }
}

impl TryFrom<Vec<WheelSlot>> for ColorWheel {
    type Error = String;

    fn try_from(slots: Vec<WheelSlot>) -> Result<Self, Self::Error> {
        ColorWheel::new(slots)
            .ok_or_else(|| "color wheel needs at least one slot and unique thresholds".to_string())
    }
}

impl From<ColorWheel> for Vec<WheelSlot> {
    fn from(wheel: ColorWheel) -> Self {
        wheel.slots
    }
}

/// Look up the color for a raw wheel position.
///
/// Picks the first slot whose threshold is at or above `position`; positions
/// beyond the last threshold keep the last slot's color.
pub fn wheel_to_rgb(wheel: &ColorWheel, position: u8) -> Rgb {
    wheel
        .slots
        .iter()
        .find(|slot| slot.threshold >= position)
        .or_else(|| wheel.slots.last())
        .map(|slot| slot.color)
        .unwrap_or([1.0, 1.0, 1.0])
}
