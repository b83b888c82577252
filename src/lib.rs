/// PADSEQ - pad grid animation core for an 8x8 MIDI pad controller
///
/// This library provides the core components for driving a velocity-addressed
/// RGB pad grid:
/// - Pad color model and 8x8 grid state
/// - Animation frame store with editing operations
/// - Playback engine emitting timed off-then-on MIDI frames
/// - JSON codec for persisted layouts and animations
/// - MIDI device output for production use

pub mod animation;
pub mod codec;
pub mod error;
pub mod grid;
pub mod midi;
pub mod session;

// Re-export commonly used types
pub use animation::playback::{
    PlaybackDriver, PlaybackEngine, PlaybackEvent, PlaybackState, Tick,
};
pub use animation::Animation;
pub use codec::{decode_animation, decode_layout, encode_animation, encode_layout};
pub use error::{Error, Result};
pub use grid::{PadColor, PadGrid, StaticLayout};
pub use midi::{DeviceOutput, MidiPadDevice, NullDevice};
pub use session::Session;
