/// Pad color model and 8x8 grid state
/// The color set and velocity table are fixed by the hardware; grids are
/// plain value types compared by content.
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

pub const GRID_ROWS: usize = 8;
pub const GRID_COLS: usize = 8;
pub const GRID_SIZE: usize = GRID_ROWS * GRID_COLS;

/// One of the eight colors the hardware can show, plus Off. The pad encodes
/// color in the MIDI velocity byte; no other colors are representable.
///
/// Serializes as the symbolic file token (`"RED"`, `"LIGHTBLUE"`, ...).
/// Deserializes from either a token or a raw velocity code; tokens outside
/// the palette are rejected, velocity codes outside the table decay to Off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PadColor {
    #[default]
    Off,
    Red,
    Green,
    DarkBlue,
    Purple,
    LightBlue,
    Yellow,
    White,
}

impl PadColor {
    /// The velocity byte that selects this color on the device.
    pub fn velocity(self) -> u8 {
        match self {
            PadColor::Off => 0,
            PadColor::White => 1,
            PadColor::Yellow => 17,
            PadColor::LightBlue => 33,
            PadColor::Purple => 49,
            PadColor::DarkBlue => 65,
            PadColor::Green => 81,
            PadColor::Red => 97,
        }
    }

    /// Inverse of `velocity`. Velocities the hardware table does not define
    /// map to `Off` rather than failing.
    pub fn from_velocity(velocity: u8) -> Self {
        match velocity {
            1 => PadColor::White,
            17 => PadColor::Yellow,
            33 => PadColor::LightBlue,
            49 => PadColor::Purple,
            65 => PadColor::DarkBlue,
            81 => PadColor::Green,
            97 => PadColor::Red,
            _ => PadColor::Off,
        }
    }

    /// Parses a symbolic file token. `None` for anything outside the
    /// palette; token-level validation is the codec's job, so unlike
    /// `from_velocity` there is no defensive default here.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "OFF" => Some(PadColor::Off),
            "RED" => Some(PadColor::Red),
            "GREEN" => Some(PadColor::Green),
            "DARKBLUE" => Some(PadColor::DarkBlue),
            "PURPLE" => Some(PadColor::Purple),
            "LIGHTBLUE" => Some(PadColor::LightBlue),
            "YELLOW" => Some(PadColor::Yellow),
            "WHITE" => Some(PadColor::White),
            _ => None,
        }
    }

    /// All colors in hardware-table order, Off first.
    pub fn all() -> [PadColor; 8] {
        [
            PadColor::Off,
            PadColor::Red,
            PadColor::Green,
            PadColor::DarkBlue,
            PadColor::Purple,
            PadColor::LightBlue,
            PadColor::Yellow,
            PadColor::White,
        ]
    }
}

const COLOR_TOKENS: &[&str] = &[
    "OFF",
    "RED",
    "GREEN",
    "DARKBLUE",
    "PURPLE",
    "LIGHTBLUE",
    "YELLOW",
    "WHITE",
];

impl<'de> Deserialize<'de> for PadColor {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PadColorVisitor;

        impl<'de> Visitor<'de> for PadColorVisitor {
            type Value = PadColor;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a pad color token or a velocity code")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<PadColor, E> {
                PadColor::from_token(value)
                    .ok_or_else(|| de::Error::unknown_variant(value, COLOR_TOKENS))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<PadColor, E> {
                Ok(u8::try_from(value)
                    .map(PadColor::from_velocity)
                    .unwrap_or(PadColor::Off))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<PadColor, E> {
                Ok(u8::try_from(value)
                    .map(PadColor::from_velocity)
                    .unwrap_or(PadColor::Off))
            }
        }

        deserializer.deserialize_any(PadColorVisitor)
    }
}

/// An 8x8 matrix of pad colors: one animation frame, or a static layout's
/// content. Compared and stored by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PadGrid {
    cells: [[PadColor; GRID_COLS]; GRID_ROWS],
}

impl PadGrid {
    /// A grid with every pad Off.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, row: usize, col: usize) -> Result<PadColor> {
        self.check(row, col)?;
        Ok(self.cells[row][col])
    }

    pub fn set(&mut self, row: usize, col: usize, color: PadColor) -> Result<()> {
        self.check(row, col)?;
        self.cells[row][col] = color;
        Ok(())
    }

    /// Sets every pad to Off.
    pub fn clear(&mut self) {
        self.cells = [[PadColor::Off; GRID_COLS]; GRID_ROWS];
    }

    /// A grid with every pad set to `color`.
    pub fn filled(color: PadColor) -> Self {
        Self {
            cells: [[color; GRID_COLS]; GRID_ROWS],
        }
    }

    /// Iterates every cell as (row, col, color) in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, PadColor)> + '_ {
        self.cells.iter().enumerate().flat_map(|(row, cols)| {
            cols.iter()
                .enumerate()
                .map(move |(col, color)| (row, col, *color))
        })
    }

    /// Cells where `other` differs from `self`, reporting `other`'s color.
    /// The playback path currently repaints full frames; this exists for
    /// partial-update callers and must stay correct regardless.
    pub fn diff(&self, other: &PadGrid) -> Vec<(usize, usize, PadColor)> {
        self.cells()
            .filter(|&(row, col, color)| other.cells[row][col] != color)
            .map(|(row, col, _)| (row, col, other.cells[row][col]))
            .collect()
    }

    fn check(&self, row: usize, col: usize) -> Result<()> {
        if row < GRID_ROWS && col < GRID_COLS {
            Ok(())
        } else {
            Err(Error::OutOfRange { row, col })
        }
    }
}

/// A named grid persisted on its own, independent of any animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticLayout {
    pub name: String,
    pub grid: PadGrid,
}

impl StaticLayout {
    pub fn new(name: impl Into<String>, grid: PadGrid) -> Self {
        Self {
            name: name.into(),
            grid,
        }
    }
}
