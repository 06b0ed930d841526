//! Per-track control state machine and audio buffers.
//!
//! This module holds the looper's central data model: one [`Track`] per
//! audio loop slot, its MIDI control bindings, its LED state table, and
//! the four-state (or two-state) control automaton described by
//! `ControlState::next_4`/`next_2`.

use crate::midi::{Fingerprint, UNBOUND};

/// Number of tracks the engine manages. Mirrors the original's `NB_TRACKS`.
pub const NUM_TRACKS: usize = 4;

/// Number of f32 samples each channel buffer holds: 5 minutes at 48kHz,
/// plus headroom, mirroring the original's `NB_SAMPLES + 8192`.
pub const SAMPLE_CAPACITY: usize = 48_000 * 60 * 5 + 8192;

/// A small anti-click cross-fade window at the loop seam, in samples.
/// The original source hard-codes this to 8 with a comment suggesting
/// `nframes / 16` was considered; we keep the literal constant and name it.
pub const SEAM_SAMPLES: usize = 8;

/// Per-track function slots on the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    TimeSign,
    Load,
    Save,
    Play,
    Record,
    Mute,
    Solo,
    VolDown,
    VolUp,
    Mode,
    Delete,
}

impl Function {
    pub const ALL: [Function; 11] = [
        Function::TimeSign,
        Function::Load,
        Function::Save,
        Function::Play,
        Function::Record,
        Function::Mute,
        Function::Solo,
        Function::VolDown,
        Function::VolUp,
        Function::Mode,
        Function::Delete,
    ];

    pub const COUNT: usize = Self::ALL.len();

    fn index(self) -> usize {
        self as usize
    }

    /// Functions that use the 4-state (Off/PendingOn/On/PendingOff) automaton.
    fn uses_four_state(self) -> bool {
        matches!(self, Function::Play | Function::Record | Function::Delete)
    }

    /// Functions that use the 2-state (Off/On) automaton.
    fn uses_two_state(self) -> bool {
        matches!(self, Function::Mute | Function::Solo | Function::Mode)
    }

    /// Functions that light every track's pad off when DELETE confirms.
    pub const RESETTABLE: [Function; 8] = [
        Function::Play,
        Function::Record,
        Function::Mute,
        Function::Solo,
        Function::VolUp,
        Function::VolDown,
        Function::Mode,
        Function::Delete,
    ];

    /// Functions whose LED follows `status` directly. VOLUP/VOLDOWN are
    /// excluded: their pads show rail state (at max/min volume), pushed
    /// directly by the engine rather than decoded from a pending/on/off
    /// status that these two functions never actually occupy.
    pub const STATUS_DRIVEN: [Function; 9] = [
        Function::TimeSign,
        Function::Load,
        Function::Save,
        Function::Play,
        Function::Record,
        Function::Mute,
        Function::Solo,
        Function::Mode,
        Function::Delete,
    ];
}

/// The four-valued control state every function tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Off,
    On,
    PendingOn,
    PendingOff,
}

impl ControlState {
    /// Four-state transition table (PLAY, RECORD, DELETE).
    pub fn next_4(self) -> ControlState {
        match self {
            ControlState::Off => ControlState::PendingOn,
            ControlState::On => ControlState::PendingOff,
            ControlState::PendingOn => ControlState::PendingOn,
            ControlState::PendingOff => ControlState::PendingOff,
        }
    }

    /// Two-state transition table (MUTE, SOLO, MODE).
    pub fn next_2(self) -> ControlState {
        if self == ControlState::Off {
            ControlState::On
        } else {
            ControlState::Off
        }
    }
}

/// Stereo channel selector, used to index per-channel cursor pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left = 0,
    Right = 1,
}

pub const CHANNELS: [Channel; 2] = [Channel::Left, Channel::Right];

/// Whether a pending action is eligible for promotion this tick, and if
/// so, which quantisation rule fired. Mirrors `is_pending_action()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// Not eligible this tick.
    None,
    /// Free mode (MODE=On): promotes every tick.
    EveryTick,
    /// Bar mode (MODE=Off) and this tick is a bar edge: promotes now.
    OnBarEdge,
}

/// A single track: control bindings, LED bindings, status, audio buffers,
/// and the cursors/origins needed for record/playback/loop-wrap.
pub struct Track {
    /// Two-byte MIDI fingerprint bound to each function.
    pub ctrl: [Fingerprint; Function::COUNT],
    /// Three-byte MIDI-out message per function per visual state.
    pub led: [[[u8; 3]; 4]; Function::COUNT],
    pub status: [ControlState; Function::COUNT],

    pub left: Vec<f32>,
    pub right: Vec<f32>,

    pub record_cursor: [u32; 2],
    pub record_origin_bar: [u64; 2],
    pub play_cursor: [u32; 2],
    pub play_origin_bar: [u64; 2],
    pub end_cursor: [u32; 2],
    pub end_bar: [u64; 2],

    /// 0 means "record until the user presses RECORD again".
    pub record_nb_bar: u64,

    pub volume: f32,

    pub last_sample: [f32; 2],
}

impl Track {
    pub fn new() -> Self {
        Self {
            ctrl: [UNBOUND; Function::COUNT],
            led: [[[0u8; 3]; 4]; Function::COUNT],
            status: [ControlState::Off; Function::COUNT],
            left: vec![0.0; SAMPLE_CAPACITY],
            right: vec![0.0; SAMPLE_CAPACITY],
            record_cursor: [0; 2],
            record_origin_bar: [0; 2],
            play_cursor: [0; 2],
            play_origin_bar: [0; 2],
            end_cursor: [0; 2],
            end_bar: [0; 2],
            record_nb_bar: 0,
            volume: 1.0,
            last_sample: [0.0; 2],
        }
    }

    pub fn status_of(&self, f: Function) -> ControlState {
        self.status[f.index()]
    }

    pub fn set_status(&mut self, f: Function, s: ControlState) {
        self.status[f.index()] = s;
    }

    pub fn ctrl_of(&self, f: Function) -> Fingerprint {
        self.ctrl[f.index()]
    }

    /// True if neither channel has a recorded loop to play.
    pub fn is_empty(&self) -> bool {
        self.end_cursor[0] == 0 && self.end_cursor[1] == 0
    }

    /// Whether a pending transition on `f` is eligible for promotion this
    /// tick, given the track's MODE and the current BBT new-bar edge.
    /// Mirrors `is_pending_action()`.
    pub fn promotion(&self, bar_edge: bool) -> Promotion {
        if self.status_of(Function::Mode) == ControlState::On {
            Promotion::EveryTick
        } else if bar_edge {
            Promotion::OnBarEdge
        } else {
            Promotion::None
        }
    }

    /// Apply the MUTE/SOLO/MODE (2-state) press, returning the new state.
    pub fn press_two_state(&mut self, f: Function) -> ControlState {
        debug_assert!(f.uses_two_state());
        let next = self.status_of(f).next_2();
        self.set_status(f, next);
        next
    }

    /// Apply the PLAY/RECORD/DELETE (4-state) press, returning the new state.
    pub fn press_four_state(&mut self, f: Function) -> ControlState {
        debug_assert!(f.uses_four_state());
        let next = self.status_of(f).next_4();
        self.set_status(f, next);
        next
    }

    /// Adjust volume by +/- `delta`, clamped to [0.0, 1.0] and quantised
    /// to 0.1 steps (callers pass +/-0.1).
    pub fn adjust_volume(&mut self, delta: f32) {
        self.volume = (self.volume + delta).clamp(0.0, 1.0);
        // Guard against float drift away from the 0.1 grid.
        self.volume = (self.volume * 10.0).round() / 10.0;
    }

    /// Promote PLAY PendingOn -> On: reset cursors/origins, zero seam memory.
    pub fn confirm_play_on(&mut self, current_bar: u64) {
        for c in CHANNELS {
            self.play_cursor[c as usize] = 0;
            self.play_origin_bar[c as usize] = current_bar;
            self.last_sample[c as usize] = 0.0;
        }
        self.set_status(Function::Play, ControlState::On);
    }

    pub fn confirm_play_off(&mut self) {
        self.set_status(Function::Play, ControlState::Off);
    }

    /// Promote RECORD PendingOn -> On: reset record cursors/origin, latch
    /// the requested bar count.
    pub fn confirm_record_on(&mut self, current_bar: u64, number_of_bars: u64) {
        for c in CHANNELS {
            self.record_cursor[c as usize] = 0;
            self.record_origin_bar[c as usize] = current_bar;
        }
        self.record_nb_bar = number_of_bars;
        self.set_status(Function::Record, ControlState::On);
    }

    /// Promote RECORD PendingOff -> Off: latch end-of-loop cursor/bar.
    pub fn confirm_record_off(&mut self, nframes: u32, current_bar: u64) {
        for c in CHANNELS {
            self.end_cursor[c as usize] = self.record_cursor[c as usize] + nframes;
            self.end_bar[c as usize] = current_bar;
        }
        self.set_status(Function::Record, ControlState::Off);
    }

    /// Full reset performed when DELETE confirms (PendingOn -> On).
    pub fn confirm_delete(&mut self) {
        self.play_cursor = [0; 2];
        self.record_cursor = [0; 2];
        self.last_sample = [0.0; 2];
        self.end_cursor = [0; 2];
        self.record_origin_bar = [0; 2];
        self.end_bar = [0; 2];
        self.volume = 1.0;
        self.record_nb_bar = 0;
        self.reset_status();
    }

    /// Reset every function's status to Off, leaving cursors, buffers, and
    /// volume untouched. Used after a snapshot load: the persisted audio
    /// and volume are restored, but no control is left mid-transition or
    /// auto-resumed (`reset_status()` in the original source).
    pub fn reset_status(&mut self) {
        self.status = [ControlState::Off; Function::COUNT];
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_state_transitions() {
        assert_eq!(ControlState::Off.next_4(), ControlState::PendingOn);
        assert_eq!(ControlState::PendingOn.next_4(), ControlState::PendingOn);
        assert_eq!(ControlState::On.next_4(), ControlState::PendingOff);
        assert_eq!(ControlState::PendingOff.next_4(), ControlState::PendingOff);
    }

    #[test]
    fn two_state_transitions() {
        assert_eq!(ControlState::Off.next_2(), ControlState::On);
        assert_eq!(ControlState::On.next_2(), ControlState::Off);
        assert_eq!(ControlState::PendingOn.next_2(), ControlState::Off);
    }

    #[test]
    fn volume_clamps_and_quantises() {
        let mut t = Track::new();
        t.volume = 0.95;
        t.adjust_volume(0.1);
        assert!((t.volume - 1.0).abs() < 1e-6);
        t.adjust_volume(0.1);
        assert!((t.volume - 1.0).abs() < 1e-6);

        t.volume = 0.05;
        t.adjust_volume(-0.2);
        assert!((t.volume - 0.0).abs() < 1e-6);
    }

    #[test]
    fn is_empty_tracks_end_cursors() {
        let mut t = Track::new();
        assert!(t.is_empty());
        t.end_cursor[0] = 64;
        assert!(!t.is_empty());
    }

    #[test]
    fn delete_resets_everything() {
        let mut t = Track::new();
        t.volume = 0.3;
        t.end_cursor = [100, 100];
        t.play_cursor = [50, 50];
        t.set_status(Function::Mute, ControlState::On);
        t.confirm_delete();
        assert!(t.is_empty());
        assert_eq!(t.volume, 1.0);
        assert_eq!(t.status_of(Function::Mute), ControlState::Off);
        assert_eq!(t.play_cursor, [0, 0]);
    }

    #[test]
    fn promotion_rule_bar_mode_vs_free_mode() {
        let mut t = Track::new();
        // MODE=Off (bar mode): promotion only on bar edge.
        assert_eq!(t.promotion(false), Promotion::None);
        assert_eq!(t.promotion(true), Promotion::OnBarEdge);

        // MODE=On (free mode): promotion every tick.
        t.set_status(Function::Mode, ControlState::On);
        assert_eq!(t.promotion(false), Promotion::EveryTick);
        assert_eq!(t.promotion(true), Promotion::EveryTick);
    }

    #[test]
    fn confirm_record_on_then_off_sets_end_cursor() {
        let mut t = Track::new();
        t.press_four_state(Function::Record); // Off -> PendingOn
        t.confirm_record_on(5, 0);
        assert_eq!(t.status_of(Function::Record), ControlState::On);
        assert_eq!(t.record_origin_bar, [5, 5]);

        t.record_cursor = [128, 128];
        t.press_four_state(Function::Record); // On -> PendingOff
        t.confirm_record_off(64, 8);
        assert_eq!(t.status_of(Function::Record), ControlState::Off);
        assert_eq!(t.end_cursor, [192, 192]);
        assert_eq!(t.end_bar, [8, 8]);
    }
}
