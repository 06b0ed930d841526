//! Binary snapshot persistence: save and restore the looper's full audio
//! and control state to a single file.
//!
//! The original format embedded native-endian scalars and relied on the
//! host's pointer width; this rewrite uses an explicit little-endian,
//! versioned layout so a snapshot taken on one machine loads correctly
//! on another.
//!
//! `save`/`load` never touch a live [`Track`] directly: they work over
//! [`TrackSnapshot`], a plain capture of one track's persisted fields.
//! This lets the caller do the (possibly slow) file I/O without holding
//! the engine lock across it — `TrackSnapshot::capture`/`apply` are the
//! only points that touch live tracks, and both are bounded memory
//! copies rather than disk I/O.
//!
//! Layout:
//! ```text
//! magic:        4 bytes  b"GLSN"
//! version:      u32      currently 1
//! track_count:  u32      number of track records that follow
//! signature:    u32      TimeSignature cycle index at save time
//! per track:
//!   index:        u32     which track slot this record belongs to
//!   volume:       f32
//!   end_cursor:   [u32; 2]
//!   end_bar:      [u64; 2]
//!   sample_count: u32     left.len() == right.len() == sample_count
//!   left:         [f32; sample_count]
//!   right:        [f32; sample_count]
//! ```
//! Empty tracks are skipped entirely on save; on load, any track index
//! missing from the file is left untouched by the caller, since `load`
//! only returns records for the tracks the file actually populates.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::clock::TimeSignature;
use crate::track::{Track, NUM_TRACKS};

const MAGIC: &[u8; 4] = b"GLSN";
const VERSION: u32 = 1;

fn signature_index(sig: TimeSignature) -> u32 {
    let mut s = TimeSignature::default();
    let mut idx = 0u32;
    loop {
        if s == sig {
            return idx;
        }
        s = s.next();
        idx += 1;
        if idx > 8 {
            return 0;
        }
    }
}

fn signature_from_index(idx: u32) -> TimeSignature {
    let mut s = TimeSignature::default();
    for _ in 0..(idx % 8) {
        s = s.next();
    }
    s
}

fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u64<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_f32<W: Write>(w: &mut W, v: f32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f32<R: Read>(r: &mut R) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

/// A capture of one track's persisted fields, decoupled from the live
/// [`Track`] so it can be written to (or read from) disk without the
/// engine lock held.
pub struct TrackSnapshot {
    pub volume: f32,
    pub end_cursor: [u32; 2],
    pub end_bar: [u64; 2],
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl TrackSnapshot {
    /// Capture `track`'s persisted state, or `None` if it has no loop to
    /// save. Copies only the samples within `end_cursor`, not the full
    /// pre-allocated capacity.
    pub fn capture(track: &Track) -> Option<Self> {
        if track.is_empty() {
            return None;
        }
        let sample_count = track.end_cursor.iter().copied().max().unwrap_or(0) as usize;
        Some(Self {
            volume: track.volume,
            end_cursor: track.end_cursor,
            end_bar: track.end_bar,
            left: track.left[..sample_count].to_vec(),
            right: track.right[..sample_count].to_vec(),
        })
    }

    /// Apply this snapshot onto a live track, growing its buffers if the
    /// snapshot is longer than the track's current capacity, and
    /// resetting playback/record cursors to the start of the loop.
    pub fn apply(&self, track: &mut Track) {
        track.volume = self.volume;
        track.end_cursor = self.end_cursor;
        track.end_bar = self.end_bar;

        let needed = self.left.len().max(track.left.len());
        if needed > track.left.len() {
            track.left.resize(needed, 0.0);
            track.right.resize(needed, 0.0);
        }
        track.left[..self.left.len()].copy_from_slice(&self.left);
        track.right[..self.right.len()].copy_from_slice(&self.right);
        track.play_cursor = [0, 0];
        track.record_cursor = [0, 0];
    }
}

/// Write every `(track index, snapshot)` pair to `path`, alongside the
/// current time signature. Takes already-captured snapshots rather than
/// live tracks, so this is the only part of a save that touches the
/// filesystem.
pub fn save(path: impl AsRef<Path>, tracks: &[(usize, TrackSnapshot)], signature: TimeSignature) -> Result<()> {
    let file = File::create(path.as_ref())
        .with_context(|| format!("creating snapshot file {}", path.as_ref().display()))?;
    let mut w = BufWriter::new(file);

    w.write_all(MAGIC)?;
    write_u32(&mut w, VERSION)?;
    write_u32(&mut w, tracks.len() as u32)?;
    write_u32(&mut w, signature_index(signature))?;

    for (index, snap) in tracks {
        write_u32(&mut w, *index as u32)?;
        write_f32(&mut w, snap.volume)?;
        write_u32(&mut w, snap.end_cursor[0])?;
        write_u32(&mut w, snap.end_cursor[1])?;
        write_u64(&mut w, snap.end_bar[0])?;
        write_u64(&mut w, snap.end_bar[1])?;

        let sample_count = snap.left.len();
        write_u32(&mut w, sample_count as u32)?;
        for &s in &snap.left {
            write_f32(&mut w, s)?;
        }
        for &s in &snap.right {
            write_f32(&mut w, s)?;
        }
    }

    w.flush()?;
    Ok(())
}

/// Read `path` and return the time signature plus every `(track index,
/// snapshot)` pair it contains. Does not touch any live [`Track]` — the
/// caller applies each snapshot under whatever lock scope it chooses,
/// so the (potentially slow) file read here never competes with the
/// audio thread for the engine lock.
///
/// A track index in the file at or beyond `NUM_TRACKS` is dropped with a
/// warning rather than treated as an error, so a snapshot saved by a
/// build with more tracks than this one still loads its first
/// `NUM_TRACKS` entries.
pub fn load(path: impl AsRef<Path>) -> Result<(TimeSignature, Vec<(usize, TrackSnapshot)>)> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("opening snapshot file {}", path.as_ref().display()))?;
    let mut r = BufReader::new(file);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        bail!("not a gridloop snapshot file (bad magic)");
    }

    let version = read_u32(&mut r)?;
    if version != VERSION {
        bail!("unsupported snapshot version {version}, expected {VERSION}");
    }

    let track_count = read_u32(&mut r)? as usize;
    let signature = signature_from_index(read_u32(&mut r)?);

    let mut loaded = Vec::with_capacity(track_count.min(NUM_TRACKS));
    for _ in 0..track_count {
        let index = read_u32(&mut r)? as usize;
        let volume = read_f32(&mut r)?;
        let end_cursor = [read_u32(&mut r)?, read_u32(&mut r)?];
        let end_bar = [read_u64(&mut r)?, read_u64(&mut r)?];
        let sample_count = read_u32(&mut r)? as usize;

        let mut left = vec![0.0f32; sample_count];
        for s in &mut left {
            *s = read_f32(&mut r)?;
        }
        let mut right = vec![0.0f32; sample_count];
        for s in &mut right {
            *s = read_f32(&mut r)?;
        }

        if index >= NUM_TRACKS {
            log::warn!("snapshot track index {index} out of range, dropping it");
            continue;
        }

        loaded.push((
            index,
            TrackSnapshot {
                volume,
                end_cursor,
                end_bar,
                left,
                right,
            },
        ));
    }

    Ok((signature, loaded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::array;

    fn sample_tracks() -> [Track; NUM_TRACKS] {
        let mut tracks: [Track; NUM_TRACKS] = array::from_fn(|_| Track::new());
        tracks[0].end_cursor = [4, 4];
        tracks[0].end_bar = [1, 1];
        tracks[0].volume = 0.7;
        tracks[0].left[..4].copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
        tracks[0].right[..4].copy_from_slice(&[-0.1, -0.2, -0.3, -0.4]);
        tracks
    }

    #[test]
    fn round_trips_a_populated_track() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("gridloop_snapshot_test_{}.bin", std::process::id()));

        let tracks = sample_tracks();
        let captured: Vec<(usize, TrackSnapshot)> = tracks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| TrackSnapshot::capture(t).map(|s| (i, s)))
            .collect();
        save(&path, &captured, TimeSignature::ThreeFour).unwrap();

        let (sig, loaded) = load(&path).unwrap();
        assert_eq!(sig, TimeSignature::ThreeFour);
        assert_eq!(loaded.len(), 1);

        let mut restored: [Track; NUM_TRACKS] = array::from_fn(|_| Track::new());
        for (index, snap) in &loaded {
            snap.apply(&mut restored[*index]);
        }

        assert_eq!(restored[0].end_cursor, [4, 4]);
        assert!((restored[0].volume - 0.7).abs() < 1e-6);
        assert_eq!(&restored[0].left[..4], &[0.1, 0.2, 0.3, 0.4]);
        assert!(restored[1].is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn empty_tracks_are_skipped_on_save() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("gridloop_snapshot_empty_{}.bin", std::process::id()));

        let tracks: [Track; NUM_TRACKS] = array::from_fn(|_| Track::new());
        let captured: Vec<(usize, TrackSnapshot)> = tracks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| TrackSnapshot::capture(t).map(|s| (i, s)))
            .collect();
        assert!(captured.is_empty());
        save(&path, &captured, TimeSignature::FourFour).unwrap();

        let bytes = std::fs::metadata(&path).unwrap().len();
        // magic(4) + version(4) + count(4) + signature(4), nothing else.
        assert_eq!(bytes, 16);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_rejects_bad_magic() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("gridloop_snapshot_bad_{}.bin", std::process::id()));
        std::fs::write(&path, b"NOPE0000").unwrap();

        assert!(load(&path).is_err());

        std::fs::remove_file(&path).ok();
    }
}
