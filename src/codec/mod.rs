/// Persistence codec - JSON text for layouts and animations
/// Location-agnostic: callers hand in and receive text, the codec never
/// touches the filesystem.
use serde::{Deserialize, Serialize};

use crate::animation::Animation;
use crate::error::{Error, Result};
use crate::grid::{PadGrid, StaticLayout};

#[derive(Serialize, Deserialize)]
struct LayoutFile {
    name: String,
    pads: PadGrid,
}

#[derive(Serialize, Deserialize)]
struct AnimationFile {
    name: String,
    frame_rate: f32,
    #[serde(rename = "loop")]
    looped: bool,
    frames: Vec<PadGrid>,
}

pub fn encode_layout(layout: &StaticLayout) -> Result<String> {
    let file = LayoutFile {
        name: layout.name.clone(),
        pads: layout.grid.clone(),
    };
    serde_json::to_string_pretty(&file).map_err(|e| Error::Format {
        what: "layout",
        detail: e.to_string(),
    })
}

/// Fails on malformed structure, wrong grid shape, or color tokens outside
/// the known set. (Unknown numeric velocity codes are a different story:
/// those are the color model's concern and decay to Off there.)
pub fn decode_layout(text: &str) -> Result<StaticLayout> {
    let file: LayoutFile = serde_json::from_str(text).map_err(|e| Error::Format {
        what: "layout",
        detail: e.to_string(),
    })?;
    Ok(StaticLayout::new(file.name, file.pads))
}

pub fn encode_animation(animation: &Animation) -> Result<String> {
    let frames: Vec<PadGrid> = (0..animation.frame_count())
        .map(|i| animation.frame_at(i).map(PadGrid::clone))
        .collect::<Result<_>>()?;
    let file = AnimationFile {
        name: animation.name().to_string(),
        frame_rate: animation.frame_rate(),
        looped: animation.looped(),
        frames,
    };
    serde_json::to_string_pretty(&file).map_err(|e| Error::Format {
        what: "animation",
        detail: e.to_string(),
    })
}

/// Preserves frame order, name, loop flag, and target rate. Fails if the
/// frame count exceeds the ceiling or any embedded grid fails to decode;
/// nothing is partially applied on failure.
pub fn decode_animation(text: &str) -> Result<Animation> {
    let file: AnimationFile = serde_json::from_str(text).map_err(|e| Error::Format {
        what: "animation",
        detail: e.to_string(),
    })?;
    Animation::from_parts(file.name, file.frame_rate, file.looped, file.frames)
}
