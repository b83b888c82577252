/// Device output - the contract the engine and editor paint through, and
/// the midir-backed adapter for the real pad hardware
use midir::{MidiOutput, MidiOutputConnection};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::grid::{PadColor, PadGrid, GRID_COLS, GRID_ROWS};

/// MIDI channel the pad listens on.
pub const PAD_CHANNEL: u8 = 0;

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

/// Note number addressing pad (row, col); rows are spaced 16 notes apart,
/// top row first.
pub fn pad_note(row: usize, col: usize) -> u8 {
    (row * 16 + col) as u8
}

/// Where frame and edit output goes. Playback and the grid editor are the
/// only callers; port lifecycle management stays outside the core.
pub trait DeviceOutput {
    /// Paints one pad. An Off color only extinguishes the pad.
    fn send_pad_color(&mut self, row: usize, col: usize, color: PadColor) -> Result<()>;
    /// Extinguishes every pad.
    fn send_all_off(&mut self) -> Result<()>;
    fn is_connected(&self) -> bool;
}

/// Paints a full grid in two phases: every pad off, then every lit pad on.
/// The phase order is a hardware contract - painting before clearing leaves
/// ghost colors from the previous frame on the device.
pub fn show_grid(device: &mut dyn DeviceOutput, grid: &PadGrid) -> Result<()> {
    device.send_all_off()?;
    for (row, col, color) in grid.cells() {
        if color != PadColor::Off {
            device.send_pad_color(row, col, color)?;
        }
    }
    Ok(())
}

/// MIDI output adapter for the pad, using midir.
pub struct MidiPadDevice {
    connection: Option<MidiOutputConnection>,
    port_name: Option<String>,
}

impl MidiPadDevice {
    pub fn new() -> Self {
        Self {
            connection: None,
            port_name: None,
        }
    }

    /// Names of the MIDI output ports currently available.
    pub fn available_ports() -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new("padseq output") {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    /// Opens the output port at `port_index` and blanks the device so no
    /// stale colors from a previous session remain lit.
    pub fn connect(&mut self, port_index: usize) -> Result<()> {
        let midi_out = MidiOutput::new("padseq output")
            .map_err(|e| Error::Device(format!("failed to create MIDI output: {e}")))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| Error::Device(format!("no MIDI port at index {port_index}")))?;
        let name = midi_out.port_name(port).unwrap_or_default();

        let connection = midi_out
            .connect(port, "padseq")
            .map_err(|e| Error::Device(format!("failed to connect: {e}")))?;

        debug!(port = %name, "connected MIDI pad device");
        self.connection = Some(connection);
        self.port_name = Some(name);
        self.send_all_off()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Closes the port. The caller decides whether to blank first.
    pub fn disconnect(&mut self) {
        if let Some(name) = self.port_name.take() {
            debug!(port = %name, "disconnected MIDI pad device");
        }
        self.connection = None;
    }

    fn send(&mut self, message: [u8; 3]) -> Result<()> {
        let conn = self
            .connection
            .as_mut()
            .ok_or_else(|| Error::Device("no MIDI connection open".into()))?;
        conn.send(&message)
            .map_err(|e| Error::Device(format!("MIDI send failed: {e}")))
    }
}

impl Default for MidiPadDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceOutput for MidiPadDevice {
    fn send_pad_color(&mut self, row: usize, col: usize, color: PadColor) -> Result<()> {
        if row >= GRID_ROWS || col >= GRID_COLS {
            return Err(Error::OutOfRange { row, col });
        }
        let note = pad_note(row, col);
        trace!(row, col, ?color, note, "send pad color");

        // Note Off always precedes a color's Note On; the pad latches the
        // last velocity otherwise.
        self.send([NOTE_OFF | PAD_CHANNEL, note, 0])?;
        if color != PadColor::Off {
            self.send([NOTE_ON | PAD_CHANNEL, note, color.velocity()])?;
        }
        Ok(())
    }

    fn send_all_off(&mut self) -> Result<()> {
        for row in 0..GRID_ROWS {
            for col in 0..GRID_COLS {
                self.send([NOTE_OFF | PAD_CHANNEL, pad_note(row, col), 0])?;
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

/// A device that accepts and discards everything. Lets a session run
/// headless (no hardware attached) without special-casing callers.
#[derive(Debug, Default)]
pub struct NullDevice;

impl DeviceOutput for NullDevice {
    fn send_pad_color(&mut self, row: usize, col: usize, _color: PadColor) -> Result<()> {
        if row >= GRID_ROWS || col >= GRID_COLS {
            return Err(Error::OutOfRange { row, col });
        }
        Ok(())
    }

    fn send_all_off(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }
}
