//! Configuration persistence for the looper.
//!
//! The control surface has no fixed layout: every pad's MIDI fingerprint
//! and every LED's MIDI-out message are bound from a YAML file loaded at
//! startup. This keeps the engine itself hardware-agnostic.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::bar::{BAR_ROW_CELLS, NUM_BAR_ROWS};
use crate::engine::Engine;
use crate::midi::{Fingerprint, UNBOUND};
use crate::track::{ControlState, Function, NUM_TRACKS};

fn default_clock_ppbar() -> u32 {
    crate::midi::DEFAULT_CLOCK_PPBAR
}

/// Hardware connection names and the transport's clock resolution.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectionsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midi_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midi_out: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_out: Option<String>,
    /// Clock pulses per bar in 4/4. The MIDI standard is 96 (24 ppqn * 4
    /// beats); some hardware sends 99 for extra drift tolerance.
    #[serde(default = "default_clock_ppbar")]
    pub clock_ppbar: u32,
}

/// One track's function-to-pad bindings. `None` means unbound.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackBindings {
    pub timesign: Option<Fingerprint>,
    pub load: Option<Fingerprint>,
    pub save: Option<Fingerprint>,
    pub play: Option<Fingerprint>,
    pub record: Option<Fingerprint>,
    pub mute: Option<Fingerprint>,
    pub solo: Option<Fingerprint>,
    pub voldown: Option<Fingerprint>,
    pub volup: Option<Fingerprint>,
    pub mode: Option<Fingerprint>,
    pub delete: Option<Fingerprint>,
}

impl TrackBindings {
    fn get(&self, f: Function) -> Fingerprint {
        let bound = match f {
            Function::TimeSign => self.timesign,
            Function::Load => self.load,
            Function::Save => self.save,
            Function::Play => self.play,
            Function::Record => self.record,
            Function::Mute => self.mute,
            Function::Solo => self.solo,
            Function::VolDown => self.voldown,
            Function::VolUp => self.volup,
            Function::Mode => self.mode,
            Function::Delete => self.delete,
        };
        bound.unwrap_or(UNBOUND)
    }
}

/// One track's function-to-LED-message bindings for a single visual state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackLeds {
    pub timesign: Option<[u8; 3]>,
    pub load: Option<[u8; 3]>,
    pub save: Option<[u8; 3]>,
    pub play: Option<[u8; 3]>,
    pub record: Option<[u8; 3]>,
    pub mute: Option<[u8; 3]>,
    pub solo: Option<[u8; 3]>,
    pub voldown: Option<[u8; 3]>,
    pub volup: Option<[u8; 3]>,
    pub mode: Option<[u8; 3]>,
    pub delete: Option<[u8; 3]>,
}

impl TrackLeds {
    fn get(&self, f: Function) -> [u8; 3] {
        let bound = match f {
            Function::TimeSign => self.timesign,
            Function::Load => self.load,
            Function::Save => self.save,
            Function::Play => self.play,
            Function::Record => self.record,
            Function::Mute => self.mute,
            Function::Solo => self.solo,
            Function::VolDown => self.voldown,
            Function::VolUp => self.volup,
            Function::Mode => self.mode,
            Function::Delete => self.delete,
        };
        bound.unwrap_or([0, 0, 0])
    }
}

/// Control bindings for every track and every one of the four visual
/// states a bound pad's LED can show.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ControlsConfig {
    #[serde(default)]
    pub tracks: Vec<TrackBindings>,
    #[serde(default)]
    pub led_off: Vec<TrackLeds>,
    #[serde(default)]
    pub led_on: Vec<TrackLeds>,
    #[serde(default)]
    pub led_pending_on: Vec<TrackLeds>,
    #[serde(default)]
    pub led_pending_off: Vec<TrackLeds>,
}

/// One bar-count row's eight pad bindings, by position within the row
/// (row 0 covers bar counts 1-8, row 1 covers 9-16).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BarRowBindings {
    #[serde(default)]
    pub cells: Vec<Option<Fingerprint>>,
}

impl BarRowBindings {
    fn cell(&self, index: usize) -> Fingerprint {
        self.cells.get(index).copied().flatten().unwrap_or(UNBOUND)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BarRowLeds {
    #[serde(default)]
    pub cells: Vec<Option<[u8; 3]>>,
}

impl BarRowLeds {
    fn cell(&self, index: usize) -> [u8; 3] {
        self.cells.get(index).copied().flatten().unwrap_or([0, 0, 0])
    }
}

/// Bindings for the two global bar-count rows (not per-track: the bar
/// selector is shared by the whole looper).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BarsConfig {
    #[serde(default)]
    pub rows: Vec<BarRowBindings>,
    #[serde(default)]
    pub led_on: Vec<BarRowLeds>,
    #[serde(default)]
    pub led_off: Vec<BarRowLeds>,
}

/// Complete looper configuration: hardware connections plus every
/// control surface binding.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LooperConfig {
    #[serde(default)]
    pub connections: ConnectionsConfig,
    #[serde(default)]
    pub controls: ControlsConfig,
    #[serde(default)]
    pub bars: BarsConfig,
}

impl LooperConfig {
    pub fn default_path() -> PathBuf {
        PathBuf::from("gridloop.yaml")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("parsing config YAML {}", path.display()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self).context("serializing config")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("writing config file {}", path.as_ref().display()))
    }

    /// Bind every fingerprint and LED message this config carries onto
    /// `engine`'s tracks and the shared bar-count selector. Tracks or rows
    /// missing from the file are left with their unbound (`[0, 0]`) defaults.
    pub fn apply_to(&self, engine: &mut Engine) {
        engine.bbt.clock_rate = self.connections.clock_ppbar;

        for t in 0..NUM_TRACKS {
            let track = &mut engine.tracks[t];
            if let Some(bindings) = self.controls.tracks.get(t) {
                for f in Function::ALL {
                    track.ctrl[f as usize] = bindings.get(f);
                }
            }
            for f in Function::ALL {
                let off = self.controls.led_off.get(t).map(|l| l.get(f)).unwrap_or([0, 0, 0]);
                let on = self.controls.led_on.get(t).map(|l| l.get(f)).unwrap_or([0, 0, 0]);
                let pending_on = self
                    .controls
                    .led_pending_on
                    .get(t)
                    .map(|l| l.get(f))
                    .unwrap_or([0, 0, 0]);
                let pending_off = self
                    .controls
                    .led_pending_off
                    .get(t)
                    .map(|l| l.get(f))
                    .unwrap_or([0, 0, 0]);
                track.led[f as usize] = [off, on, pending_on, pending_off];
            }
        }

        // The bar-count selector is global, not per-track: exactly
        // NUM_BAR_ROWS rows, each with BAR_ROW_CELLS independently bound
        // cells and independently bound on/off LED messages.
        for row in 0..NUM_BAR_ROWS {
            if let Some(bindings) = self.bars.rows.get(row) {
                for cell in 0..BAR_ROW_CELLS {
                    engine.bars.rows[row].ctrl[cell] = bindings.cell(cell);
                }
            }
            let on = self.bars.led_on.get(row);
            let off = self.bars.led_off.get(row);
            for cell in 0..BAR_ROW_CELLS {
                if let Some(on) = on {
                    engine.bar_leds[row][cell].on = on.cell(cell);
                }
                if let Some(off) = off {
                    engine.bar_leds[row][cell].off = off.cell(cell);
                }
            }
        }

        // ControlState::Off/On/PendingOn/PendingOff order must match the
        // led array's [off, on, pending_on, pending_off] layout above.
        debug_assert_eq!(ControlState::Off as usize, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = LooperConfig::load("/nonexistent/gridloop-test-path.yaml").unwrap();
        assert!(cfg.controls.tracks.is_empty());
        assert_eq!(cfg.connections.clock_ppbar, crate::midi::DEFAULT_CLOCK_PPBAR);
    }

    #[test]
    fn round_trips_through_yaml() {
        let mut cfg = LooperConfig::default();
        cfg.connections.midi_in = Some("IAC Driver Bus 1".to_string());
        cfg.controls.tracks.push(TrackBindings {
            play: Some([0x90, 0x24]),
            ..Default::default()
        });

        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: LooperConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.connections.midi_in.as_deref(), Some("IAC Driver Bus 1"));
        assert_eq!(back.controls.tracks[0].play, Some([0x90, 0x24]));
    }

    #[test]
    fn apply_to_wires_clock_ppbar_onto_bbt() {
        let mut cfg = LooperConfig::default();
        cfg.connections.clock_ppbar = 99;
        let mut engine = Engine::new();
        cfg.apply_to(&mut engine);
        assert_eq!(engine.bbt.clock_rate, 99);
    }

    #[test]
    fn apply_to_binds_fingerprints_onto_engine() {
        let mut cfg = LooperConfig::default();
        cfg.controls.tracks.push(TrackBindings {
            record: Some([0x90, 0x30]),
            ..Default::default()
        });
        let mut engine = Engine::new();
        cfg.apply_to(&mut engine);
        assert_eq!(engine.tracks[0].ctrl_of(Function::Record), [0x90, 0x30]);
        assert_eq!(engine.tracks[0].ctrl_of(Function::Play), UNBOUND);
    }
}
