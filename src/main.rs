//! gridloop - a multi-track, MIDI-clock-synced audio looper.
//!
//! Connects to a MIDI input for clock/transport and control-surface
//! presses, a MIDI output for LED feedback, and a duplex audio device for
//! the actual looping. All realtime work happens inside the audio
//! callback; MIDI and file I/O are handled on the main thread.

mod bar;
mod clock;
mod config;
mod engine;
mod led;
mod midi;
mod snapshot;
mod track;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use midir::{MidiInput, MidiOutput};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;

use config::LooperConfig;
use engine::Engine;
use midi::{MIDI_CLOCK, MIDI_PLAY, MIDI_STOP};
use track::NUM_TRACKS;

/// How many stereo frames the input-to-output bridge ring buffer holds.
/// Generous relative to one audio callback's block size so a brief
/// scheduling hiccup on either side doesn't underrun/overrun it.
const BRIDGE_CAPACITY_FRAMES: usize = 8192;

#[derive(Parser, Debug)]
#[command(name = "gridloop", about = "Multi-track MIDI-clock-synced audio looper")]
struct Args {
    /// Path to the YAML control-surface binding file.
    #[arg(default_value = "gridloop.yaml")]
    config_path: String,

    /// MIDI client name to advertise.
    #[arg(default_value = "gridloop")]
    client_name: String,

    /// MIDI port name to prefer for both input and output (falls back to
    /// the config file's `connections.midi_in`/`midi_out`, then the first
    /// port found).
    #[arg(default_value = "")]
    server_name: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = LooperConfig::load(&args.config_path)
        .with_context(|| format!("loading config from {}", args.config_path))?;

    let mut engine = Engine::new();
    config.apply_to(&mut engine);

    let engine = Arc::new(Mutex::new(engine));

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            log::info!("received interrupt, shutting down");
            running.store(false, Ordering::SeqCst);
        })
        .context("installing signal handler")?;
    }

    // The CLI's positional server_name wins when given; otherwise fall
    // back to the port names the config file's `connections` section
    // bound for midi_out/midi_in, per spec's port auto-wiring rule.
    let preferred_out = if !args.server_name.is_empty() {
        args.server_name.clone()
    } else {
        config.connections.midi_out.clone().unwrap_or_default()
    };
    let preferred_in = if !args.server_name.is_empty() {
        args.server_name.clone()
    } else {
        config.connections.midi_in.clone().unwrap_or_default()
    };

    let midi_out_conn = connect_midi_out(&args.client_name, &preferred_out)?;
    let _midi_in_conn = connect_midi_in(&args.client_name, &preferred_in, engine.clone())?;

    let (_input_stream, _output_stream) = build_audio_streams(engine.clone(), midi_out_conn)?;

    log::info!("gridloop running, press Ctrl-C to stop");
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(20));

        let wants_save = {
            let e = engine.lock().unwrap();
            e.is_save.load(Ordering::SeqCst)
        };
        if wants_save {
            // Capture under the lock (a bounded memory copy), then do the
            // actual file write after releasing it, so a large snapshot
            // write never holds the audio callback's try_lock hostage.
            let (snapshots, sig) = {
                let e = engine.lock().unwrap();
                let snapshots: Vec<(usize, snapshot::TrackSnapshot)> = e
                    .tracks
                    .iter()
                    .enumerate()
                    .filter_map(|(i, t)| snapshot::TrackSnapshot::capture(t).map(|s| (i, s)))
                    .collect();
                e.is_save.store(false, Ordering::SeqCst);
                (snapshots, e.bbt.signature)
            };
            if let Err(err) = snapshot::save("gridloop.snap", &snapshots, sig) {
                log::error!("snapshot save failed: {err:#}");
            }
        }

        let wants_load = {
            let e = engine.lock().unwrap();
            e.is_load.load(Ordering::SeqCst)
        };
        if wants_load {
            // The slow part - reading the file - happens with no lock
            // held at all; only applying the parsed result onto the live
            // tracks takes the lock, again just for a bounded memcpy.
            match snapshot::load("gridloop.snap") {
                Ok((sig, loaded)) => {
                    let mut e = engine.lock().unwrap();
                    for (index, snap) in &loaded {
                        snap.apply(&mut e.tracks[*index]);
                    }
                    e.bbt.signature = sig;
                    // A loaded track's audio and volume are restored, but
                    // no control should come back mid-transition or
                    // auto-resumed, and every pad's LED must reflect the
                    // restored state rather than whatever it last showed.
                    for t in 0..NUM_TRACKS {
                        e.tracks[t].reset_status();
                    }
                    e.refresh_all_leds();
                    e.is_load.store(false, Ordering::SeqCst);
                }
                Err(err) => {
                    log::error!("snapshot load failed: {err:#}");
                    let e = engine.lock().unwrap();
                    e.is_load.store(false, Ordering::SeqCst);
                }
            }
        }
    }

    Ok(())
}

fn connect_midi_out(client_name: &str, preferred_port: &str) -> Result<Option<midir::MidiOutputConnection>> {
    let midi_out = match MidiOutput::new(client_name) {
        Ok(m) => m,
        Err(err) => {
            log::warn!("MIDI output unavailable: {err}");
            return Ok(None);
        }
    };

    let ports = midi_out.ports();
    if ports.is_empty() {
        log::warn!("no MIDI output ports found; LED feedback disabled");
        return Ok(None);
    }

    let port_idx = if preferred_port.is_empty() {
        0
    } else {
        ports
            .iter()
            .position(|p| {
                midi_out
                    .port_name(p)
                    .map(|n| n.contains(preferred_port))
                    .unwrap_or(false)
            })
            .unwrap_or(0)
    };
    let port = &ports[port_idx];

    let conn = midi_out
        .connect(port, "gridloop-led-out")
        .map_err(|e| anyhow::anyhow!("connecting MIDI output: {e}"))?;
    Ok(Some(conn))
}

fn connect_midi_in(
    client_name: &str,
    preferred_port: &str,
    engine: Arc<Mutex<Engine>>,
) -> Result<Option<midir::MidiInputConnection<()>>> {
    let midi_in = match MidiInput::new(client_name) {
        Ok(m) => m,
        Err(err) => {
            log::warn!("MIDI input unavailable: {err}");
            return Ok(None);
        }
    };

    let ports = midi_in.ports();
    if ports.is_empty() {
        log::warn!("no MIDI input ports found; control surface and clock disabled");
        return Ok(None);
    }

    let port_idx = if preferred_port.is_empty() {
        0
    } else {
        ports
            .iter()
            .position(|p| {
                midi_in
                    .port_name(p)
                    .map(|n| n.contains(preferred_port))
                    .unwrap_or(false)
            })
            .unwrap_or(0)
    };
    let port = &ports[port_idx];
    let port_name = midi_in.port_name(port).unwrap_or_else(|_| "unknown".into());
    log::info!("listening for MIDI on {port_name}");

    let conn = midi_in
        .connect(
            port,
            "gridloop-midi-in",
            move |_timestamp, message, _| {
                handle_midi_message(&engine, message);
            },
            (),
        )
        .map_err(|e| anyhow::anyhow!("connecting MIDI input: {e}"))?;
    Ok(Some(conn))
}

/// Dispatch one incoming MIDI message to the clock/transport handler or
/// the control-surface handler, taking the engine lock only for the
/// duration of this call. This runs on midir's own callback thread, not
/// the audio thread, so the brief lock here never competes with the
/// audio callback's realtime deadline.
fn handle_midi_message(engine: &Arc<Mutex<Engine>>, message: &[u8]) {
    if message.is_empty() {
        return;
    }
    let mut e = engine.lock().unwrap();
    match message[0] {
        MIDI_CLOCK | MIDI_PLAY | MIDI_STOP => e.process_midi_clock(message[0]),
        _ => e.process_midi_in(message),
    }
}

/// Build the input and output cpal streams, bridged by a lock-free ring
/// buffer so the output callback's `process_audio` call always has a
/// matching block of live input samples to monitor and record from.
fn build_audio_streams(
    engine: Arc<Mutex<Engine>>,
    mut midi_out: Option<midir::MidiOutputConnection>,
) -> Result<(cpal::Stream, cpal::Stream)> {
    let host = cpal::default_host();
    let input_device = host
        .default_input_device()
        .context("no default audio input device")?;
    let output_device = host
        .default_output_device()
        .context("no default audio output device")?;

    let input_config = input_device
        .default_input_config()
        .context("no default input stream config")?;
    let output_config = output_device
        .default_output_config()
        .context("no default output stream config")?;

    let left_rb = HeapRb::<f32>::new(BRIDGE_CAPACITY_FRAMES);
    let right_rb = HeapRb::<f32>::new(BRIDGE_CAPACITY_FRAMES);
    let (mut left_prod, mut left_cons) = left_rb.split();
    let (mut right_prod, mut right_cons) = right_rb.split();

    let in_channels = input_config.channels() as usize;
    let in_stream_config = cpal::StreamConfig {
        channels: input_config.channels(),
        sample_rate: input_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    let input_stream = input_device.build_input_stream(
        &in_stream_config,
        move |data: &[f32], _| {
            for frame in data.chunks(in_channels) {
                let l = frame[0];
                let r = if in_channels > 1 { frame[1] } else { l };
                let _ = left_prod.try_push(l);
                let _ = right_prod.try_push(r);
            }
        },
        move |err| log::error!("input stream error: {err}"),
        None,
    )?;

    let out_channels = output_config.channels() as usize;
    let out_stream_config = cpal::StreamConfig {
        channels: output_config.channels(),
        sample_rate: output_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    let mut scratch_left = vec![0.0f32; 0];
    let mut scratch_right = vec![0.0f32; 0];
    let mut scratch_out_l = vec![0.0f32; 0];
    let mut scratch_out_r = vec![0.0f32; 0];
    let output_stream = output_device.build_output_stream(
        &out_stream_config,
        move |data: &mut [f32], _| {
            let nframes = data.len() / out_channels;
            scratch_left.resize(nframes, 0.0);
            scratch_right.resize(nframes, 0.0);
            scratch_out_l.resize(nframes, 0.0);
            scratch_out_r.resize(nframes, 0.0);

            for i in 0..nframes {
                scratch_left[i] = left_cons.try_pop().unwrap_or(0.0);
                scratch_right[i] = right_cons.try_pop().unwrap_or(0.0);
            }

            // A blocking lock here would stall the audio callback behind
            // the main thread's (non-realtime) snapshot load/save work.
            // try_lock instead: on the rare cycle where they collide, this
            // block passes input straight through rather than waiting.
            match engine.try_lock() {
                Ok(mut e) => {
                    e.process_audio(&scratch_left, &scratch_right, &mut scratch_out_l, &mut scratch_out_r);
                    if let Some(conn) = midi_out.as_mut() {
                        e.led_queue.drain(|req| {
                            let _ = conn.send(&req.message);
                        });
                    }
                }
                Err(_) => {
                    scratch_out_l.copy_from_slice(&scratch_left);
                    scratch_out_r.copy_from_slice(&scratch_right);
                }
            }

            for (i, frame) in data.chunks_mut(out_channels).enumerate() {
                frame[0] = scratch_out_l[i];
                if out_channels > 1 {
                    frame[1] = scratch_out_r[i];
                }
            }
        },
        move |err| log::error!("output stream error: {err}"),
        None,
    )?;

    input_stream.play().context("starting input stream")?;
    output_stream.play().context("starting output stream")?;

    Ok((input_stream, output_stream))
}

#[allow(dead_code)]
fn track_count() -> usize {
    NUM_TRACKS
}
