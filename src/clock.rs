//! Bar/Beat/Tick timing engine driven by incoming MIDI Clock pulses.
//!
//! The hardware control surface has no concept of wall-clock time: every
//! transport and track decision is made in terms of clock pulses, beats,
//! and bars. [`Bbt`] owns that position and answers exactly one question
//! per pulse: where are we now, and did we just cross a bar line.
//!
//! `tick()` mirrors `time_progress()`: a bar-pending flag (armed by Play
//! or a time-signature change) takes priority over the ordinary per-tick
//! beat/bar arithmetic, and a pacing counter gives the TIMESIGN pad a
//! guaranteed bright window at the start of each beat/bar before it
//! decays back to Off — 24 PPQN is too fast for hardware pads to track
//! directly.

use crate::track::ControlState;

/// One of the eight time signatures the control surface can cycle through.
/// Order matches the TIMESIGN pad's press-to-press cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSignature {
    FourFour,
    TwoTwo,
    TwoFour,
    ThreeFour,
    SixEight,
    NineEight,
    TwelveEight,
    FiveFour,
}

impl TimeSignature {
    const CYCLE: [TimeSignature; 8] = [
        TimeSignature::FourFour,
        TimeSignature::TwoTwo,
        TimeSignature::TwoFour,
        TimeSignature::ThreeFour,
        TimeSignature::SixEight,
        TimeSignature::NineEight,
        TimeSignature::TwelveEight,
        TimeSignature::FiveFour,
    ];

    pub fn numerator(self) -> u64 {
        match self {
            TimeSignature::FourFour => 4,
            TimeSignature::TwoTwo => 2,
            TimeSignature::TwoFour => 2,
            TimeSignature::ThreeFour => 3,
            TimeSignature::SixEight => 6,
            TimeSignature::NineEight => 9,
            TimeSignature::TwelveEight => 12,
            TimeSignature::FiveFour => 5,
        }
    }

    pub fn denominator(self) -> u64 {
        match self {
            TimeSignature::FourFour => 4,
            TimeSignature::TwoTwo => 2,
            TimeSignature::TwoFour => 4,
            TimeSignature::ThreeFour => 4,
            TimeSignature::SixEight => 8,
            TimeSignature::NineEight => 8,
            TimeSignature::TwelveEight => 8,
            TimeSignature::FiveFour => 4,
        }
    }

    /// Compound signatures group ticks in threes per beat (6/8, 9/8, 12/8).
    fn is_compound(self) -> bool {
        matches!(self.numerator(), 6 | 9 | 12)
    }

    /// Advance to the next signature in the fixed eight-entry cycle,
    /// wrapping back to 4/4 after 5/4. Mirrors `change_timesign()`.
    pub fn next(self) -> TimeSignature {
        let idx = Self::CYCLE.iter().position(|&t| t == self).unwrap();
        Self::CYCLE[(idx + 1) % Self::CYCLE.len()]
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature::FourFour
    }
}

/// Tri-valued new-bar flag (`is_BBT` in the original source).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NewBar {
    Off,
    On,
    PendingOn,
}

/// Number of pulses the TIMESIGN pad holds fully lit after a genuine bar
/// line, before decaying through its pacing window. Mirrors the "four-tick
/// hardware-pacing delay" armed by a bar start.
const BAR_PACE: i64 = 4;

/// Shorter pacing window armed by a plain beat change within a bar.
const BEAT_PACE: i64 = 2;

/// Bar/Beat/Tick position plus the TIMESIGN pad's pacing state.
///
/// `bar` and `beat` are 1-indexed to match the way musicians count;
/// `tick` counts pulses since the start of the current beat.
pub struct Bbt {
    pub signature: TimeSignature,
    pub bar: u64,
    pub beat: u64,
    pub tick: u64,
    previous_beat: u64,

    /// `is_BBT`: Off (no edge this tick), On (this tick IS a bar edge),
    /// or PendingOn (the very next tick must start a new bar).
    new_bar: NewBar,

    /// Pulses per bar at 4/4 (so pulses per beat = clock_rate / denominator).
    /// Configurable: MIDI-standard 96, or 99 for drift-tolerant hardware.
    pub clock_rate: u32,

    /// TIMESIGN pad pacing counter (`BBT_wait_4_ticks`).
    pace: i64,
}

impl Bbt {
    pub fn new() -> Self {
        Self {
            signature: TimeSignature::default(),
            bar: 1,
            beat: 1,
            tick: 0,
            previous_beat: 1,
            new_bar: NewBar::PendingOn,
            clock_rate: crate::midi::DEFAULT_CLOCK_PPBAR,
            pace: BAR_PACE,
        }
    }

    /// Whether this tick landed exactly on a bar line. Gates bar-mode
    /// promotion (`is_pending_action`'s `ON_BBT` case).
    pub fn new_bar_edge(&self) -> bool {
        self.new_bar == NewBar::On
    }

    /// Full reset to (bar=1, beat=1, tick=0), arming the next Clock pulse
    /// to start bar 1. Used both at construction and on MIDI Play.
    fn reset(&mut self) {
        self.bar = 1;
        self.beat = 1;
        self.tick = 0;
        self.previous_beat = 1;
        self.new_bar = NewBar::PendingOn;
    }

    /// MIDI Play received: the very next Clock pulse starts a new bar.
    pub fn on_play(&mut self) {
        self.reset();
    }

    /// Advance one MIDI Clock pulse and return the TIMESIGN pad's desired
    /// visual state this tick. Implements the six-step contract: a pending
    /// bar start takes priority and returns immediately; otherwise advance
    /// tick/beat/bar and decode the pacing counter.
    pub fn tick(&mut self) -> ControlState {
        if self.new_bar == NewBar::PendingOn {
            self.bar += 1;
            self.beat = 1;
            self.tick = 0;
            self.previous_beat = 1;
            self.pace = BAR_PACE;
            self.new_bar = NewBar::On;
            return ControlState::On;
        }
        self.new_bar = NewBar::Off;

        self.pace -= 1;

        self.tick += 1;
        let beat_value = (self.clock_rate as i64 / self.signature.denominator() as i64).max(1);
        let compound = self.signature.is_compound();
        let divisor = if compound { beat_value * 3 } else { beat_value };
        let new_beat = (self.tick as i64 / divisor) + 1;

        if new_beat != self.previous_beat as i64 {
            self.previous_beat = new_beat as u64;
            self.beat = new_beat as u64;
            self.pace = BEAT_PACE;

            let numerator = self.signature.numerator() as i64;
            let overflowed = if compound { new_beat * 3 > numerator } else { new_beat > numerator };
            if overflowed {
                self.bar += 1;
                self.beat = 1;
                self.tick = 1;
                self.previous_beat = 1;
                self.new_bar = NewBar::On;
                return ControlState::On;
            }
            return ControlState::PendingOn;
        }
        self.beat = new_beat as u64;

        if self.pace > 4 {
            ControlState::On
        } else if self.pace >= 1 {
            ControlState::PendingOn
        } else {
            ControlState::Off
        }
    }

    /// TIMESIGN pad pressed: advance the signature and fully reset BBT,
    /// arming the pad to light on the next bar line. Mirrors
    /// `change_timesign()`, generalized per the data model's rule that a
    /// time-signature change resets bar/beat/tick the same way start does.
    pub fn cycle_time_signature(&mut self) {
        self.signature = self.signature.next();
        self.reset();
    }
}

impl Default for Bbt {
    fn default() -> Self {
        Self::new()
    }
}
