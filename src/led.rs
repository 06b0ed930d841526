//! LED update request queue.
//!
//! The audio callback is the only place that knows a control's visual
//! state changed, but sending that state out over MIDI is a blocking I/O
//! operation that must never happen on the realtime thread. Instead the
//! callback enqueues a request onto a lock-free SPSC ring buffer; the same
//! callback invocation drains it afterward and hands the drained messages
//! to the (non-blocking) MIDI-out send, which is itself cheap enough to
//! tolerate occasional backpressure.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::bar::{BarSelector, BAR_ROW_CELLS, NUM_BAR_ROWS};
use crate::track::{Function, Track, NUM_TRACKS};

/// Capacity of the LED request ring buffer. Generous relative to the
/// number of controls that could plausibly change state in one audio
/// cycle, so the overflow path below is a safety net, not the common case.
const QUEUE_CAPACITY: usize = 256;

/// Which physical LED a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedDestination {
    Track { track: usize, function: Function },
    Bar { row: usize, cell: usize },
}

/// A fully-formed three-byte MIDI-out message bound for one LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedRequest {
    pub destination: LedDestination,
    pub message: [u8; 3],
}

/// Tracks the last message actually sent to each LED, so repeat requests
/// for an already-correct visual state are suppressed before they ever
/// reach the queue.
pub struct LedMirror {
    tracks: [[Option<[u8; 3]>; Function::COUNT]; NUM_TRACKS],
    bars: [[Option<[u8; 3]>; BAR_ROW_CELLS]; NUM_BAR_ROWS],
}

impl LedMirror {
    pub fn new() -> Self {
        Self {
            tracks: [[None; Function::COUNT]; NUM_TRACKS],
            bars: [[None; BAR_ROW_CELLS]; NUM_BAR_ROWS],
        }
    }

    fn get(&self, dest: LedDestination) -> Option<[u8; 3]> {
        match dest {
            LedDestination::Track { track, function } => self.tracks[track][function as usize],
            LedDestination::Bar { row, cell } => self.bars[row][cell],
        }
    }

    fn set(&mut self, dest: LedDestination, message: [u8; 3]) {
        match dest {
            LedDestination::Track { track, function } => {
                self.tracks[track][function as usize] = Some(message)
            }
            LedDestination::Bar { row, cell } => self.bars[row][cell] = Some(message),
        }
    }
}

impl Default for LedMirror {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-free single-producer/single-consumer LED request queue, with a
/// status mirror that suppresses redundant MIDI-out traffic.
///
/// Both the producer and consumer halves live on the realtime audio
/// thread and are drained within the same callback invocation; the ring
/// buffer exists to decouple "a control's visual state changed" (learned
/// mid-mix, at arbitrary points in the per-track loop) from "send the
/// MIDI-out bytes" (done once, in order, at the end of the cycle).
pub struct LedQueue {
    producer: HeapProd<LedRequest>,
    consumer: HeapCons<LedRequest>,
    mirror: LedMirror,
}

impl LedQueue {
    pub fn new() -> Self {
        let rb = HeapRb::<LedRequest>::new(QUEUE_CAPACITY);
        let (producer, consumer) = rb.split();
        Self {
            producer,
            consumer,
            mirror: LedMirror::new(),
        }
    }

    /// Request that `dest` show `message`. No-op if the mirror already
    /// shows this exact message. On queue overflow the request is
    /// dropped and the mirror is left untouched, so the next attempt to
    /// reach this same state is not mistakenly suppressed as a duplicate.
    pub fn request(&mut self, dest: LedDestination, message: [u8; 3]) {
        if self.mirror.get(dest) == Some(message) {
            return;
        }
        let request = LedRequest {
            destination: dest,
            message,
        };
        if self.producer.try_push(request).is_ok() {
            self.mirror.set(dest, message);
        }
    }

    /// Pop one pending request, if any.
    pub fn pop(&mut self) -> Option<LedRequest> {
        self.consumer.try_pop()
    }

    /// Drain every pending request, invoking `send` for each in FIFO order.
    pub fn drain(&mut self, mut send: impl FnMut(LedRequest)) {
        while let Some(req) = self.pop() {
            send(req);
        }
    }

    pub fn len(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LedQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up the three-byte MIDI-out message bound to a track function's
/// current visual state.
pub fn track_led_message(track: &Track, function: Function) -> [u8; 3] {
    let state_index = track.status_of(function) as usize;
    track.led[function as usize][state_index]
}

/// Look up the message bound to a bar-selector cell's lit/unlit state.
pub fn bar_led_message(
    selector: &BarSelector,
    row: usize,
    cell: usize,
    lit_message: [u8; 3],
    off_message: [u8; 3],
) -> [u8; 3] {
    if selector.is_lit(row, cell) {
        lit_message
    } else {
        off_message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::ControlState;

    #[test]
    fn duplicate_request_is_suppressed() {
        let mut queue = LedQueue::new();
        let dest = LedDestination::Track {
            track: 0,
            function: Function::Play,
        };
        queue.request(dest, [0x90, 1, 127]);
        queue.request(dest, [0x90, 1, 127]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn distinct_messages_both_enqueue() {
        let mut queue = LedQueue::new();
        let dest = LedDestination::Track {
            track: 0,
            function: Function::Play,
        };
        queue.request(dest, [0x90, 1, 127]);
        queue.request(dest, [0x90, 1, 0]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn overflow_drops_without_updating_mirror() {
        let mut queue = LedQueue::new();
        for i in 0..QUEUE_CAPACITY {
            let dest = LedDestination::Track {
                track: 0,
                function: Function::Play,
            };
            // Vary the message so each one is a genuinely new request and
            // none gets suppressed by the mirror before the queue fills.
            queue.request(dest, [0x90, 1, (i % 128) as u8]);
        }
        assert_eq!(queue.len(), QUEUE_CAPACITY);

        let dest = LedDestination::Track {
            track: 1,
            function: Function::Record,
        };
        let overflow_message = [0x90, 2, 127];
        queue.request(dest, overflow_message);
        // Queue was full: the request was dropped, not enqueued.
        assert_eq!(queue.len(), QUEUE_CAPACITY);

        // Drain one slot, then the same message must be retried
        // successfully because the mirror was never updated for it.
        queue.pop();
        queue.request(dest, overflow_message);
        assert_eq!(queue.len(), QUEUE_CAPACITY);
    }

    #[test]
    fn track_led_message_follows_status_index() {
        let mut track = Track::new();
        track.led[Function::Play as usize] = [[1, 1, 1], [2, 2, 2], [3, 3, 3], [4, 4, 4]];
        track.set_status(Function::Play, ControlState::On);
        assert_eq!(track_led_message(&track, Function::Play), [2, 2, 2]);
    }
}
