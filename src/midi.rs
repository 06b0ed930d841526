//! MIDI protocol constants and small wire-format helpers.
//!
//! This module defines the MIDI real-time messages used for clock
//! synchronization and transport control, plus the two-byte "fingerprint"
//! comparison used to bind control-surface presses to looper functions.

/// MIDI Clock tick - sent 24 times per quarter note (24 ppqn)
pub const MIDI_CLOCK: u8 = 0xF8;

/// MIDI Play - the very next Clock begins bar 1's first tick
pub const MIDI_PLAY: u8 = 0xFA;

/// MIDI Stop - explicitly ignored by the timing engine (see clock.rs)
pub const MIDI_STOP: u8 = 0xFC;

/// Number of MIDI clock pulses per quarter note
pub const CLOCKS_PER_BEAT: u64 = 24;

/// Default clock pulses per bar in 4/4 (24 ppqn * 4 beats). Configurable;
/// the C original oscillates between 96 (MIDI-standard) and 99
/// (drift-tolerant); this rewrite defaults to 96 and exposes the other
/// as a config override (see `config::LooperConfig::clock_ppbar`).
pub const DEFAULT_CLOCK_PPBAR: u32 = 96;

/// Two-byte MIDI fingerprint (status, data1) used to bind a control
/// surface press to a looper function.
pub type Fingerprint = [u8; 2];

/// A fingerprint of `[0, 0]` means "unbound" - no control triggers this function.
pub const UNBOUND: Fingerprint = [0, 0];

/// Compares the leading two bytes of an incoming MIDI message against a
/// bound fingerprint.
pub fn matches_fingerprint(message: &[u8], fingerprint: Fingerprint) -> bool {
    fingerprint != UNBOUND
        && message.len() >= 2
        && message[0] == fingerprint[0]
        && message[1] == fingerprint[1]
}
