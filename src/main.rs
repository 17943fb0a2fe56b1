//! Demo host.
//!
//! Plays a short arpeggio through the voice allocator on the default output device.
//! Usage: nessy [config.json] [--trace]
//!
//! `--trace` renders the same arpeggio offline and prints every register write instead.

use std::{env, process, thread, time::Duration};

use ansi_term::Colour::{Cyan, Green, Red, Yellow};
use log::{error, info};
use nessy::{Error, MessageReceiver, NesSynth, Result, SynthConfig, SynthMessage};
use rodio::{OutputStream, Sink, Source};
use rtrb::{Consumer, RingBuffer};

/// Notes of the arpeggio, one per step. Each is held for `HOLD_STEPS` steps, so the later
/// notes overlap and force voice stealing on the three base channels.
const ARPEGGIO: [u8; 8] = [48, 60, 64, 67, 72, 67, 64, 55];
const HOLD_STEPS: usize = 3;
const STEP: Duration = Duration::from_millis(180);
const BLOCK_FRAMES: usize = 256;

/// Stereo `f32` source pulling blocks from the synth.
struct SynthSource {
    synth: NesSynth,
    events: Consumer<SynthMessage>,
    sample_rate: u32,
    buffer: Vec<f32>,
    pos: usize,
}

impl SynthSource {
    fn new(synth: NesSynth, events: Consumer<SynthMessage>, sample_rate: u32) -> Self {
        Self {
            synth,
            events,
            sample_rate,
            buffer: vec![0.0; BLOCK_FRAMES * 2],
            pos: BLOCK_FRAMES * 2,
        }
    }
}

impl Iterator for SynthSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.pos >= self.buffer.len() {
            self.synth.process_messages(&mut self.events);
            self.synth.render_interleaved(&mut self.buffer);
            self.pos = 0;
        }
        let sample = self.buffer[self.pos];
        self.pos += 1;
        Some(sample)
    }
}

impl Source for SynthSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Note-on/off messages for every step of the arpeggio.
fn arpeggio_steps() -> impl Iterator<Item = Vec<SynthMessage>> {
    (0..ARPEGGIO.len() + HOLD_STEPS).map(|step| {
        let mut messages = Vec::new();
        if let Some(released) = step.checked_sub(HOLD_STEPS).and_then(|i| ARPEGGIO.get(i)) {
            messages.push(SynthMessage::NoteOff {
                midi_channel: 0,
                note: *released,
            });
        }
        if let Some(note) = ARPEGGIO.get(step) {
            messages.push(SynthMessage::NoteOn {
                midi_channel: 0,
                note: *note,
                velocity: 0.8,
            });
        }
        messages
    })
}

fn play(config: &SynthConfig) -> Result<()> {
    let synth = NesSynth::from_config(config)?;
    let sample_rate = config.sample_rate.round() as u32;
    let (mut producer, consumer) = RingBuffer::<SynthMessage>::new(64);

    let (_stream, handle) =
        OutputStream::try_default().map_err(|e| Error::AudioDevice(e.to_string()))?;
    let sink = Sink::try_new(&handle).map_err(|e| Error::AudioDevice(e.to_string()))?;
    sink.append(SynthSource::new(synth, consumer, sample_rate));
    info!("playing at {} Hz", sample_rate);

    for messages in arpeggio_steps() {
        for message in messages {
            if producer.push(message).is_err() {
                return Err(Error::AudioDevice("event queue full".into()));
            }
        }
        thread::sleep(STEP);
    }
    let _ = producer.push(SynthMessage::AllNotesOff);
    thread::sleep(STEP);
    sink.stop();
    Ok(())
}

fn trace(config: &SynthConfig) -> Result<()> {
    let mut synth = NesSynth::from_config(config)?;
    synth.set_register_tap(Some(Box::new(|addr: u16, data: u8| {
        let chip = if addr >= 0x9000 {
            Yellow.bold().paint("VRC6")
        } else {
            Cyan.bold().paint("APU ")
        };
        println!("{} ${:04X} <- ${:02X}", chip, addr, data);
    })));

    let frames = (config.sample_rate * STEP.as_secs_f64()) as usize;
    let mut buffer = vec![0.0f32; frames * 2];
    for (step, messages) in arpeggio_steps().enumerate() {
        println!("{} step {}", Green.bold().paint("----"), step);
        let mut queue = messages.into_iter();
        synth.process_messages(&mut QueueIter(&mut queue));
        synth.render_interleaved(&mut buffer);
    }
    synth.all_notes_off();
    info!("{} register writes", synth.register_write_count());
    Ok(())
}

/// Adapts a plain iterator to the synth's message queue interface.
struct QueueIter<'a, I: Iterator<Item = SynthMessage>>(&'a mut I);

impl<I: Iterator<Item = SynthMessage>> MessageReceiver for QueueIter<'_, I> {
    fn pop(&mut self) -> Option<SynthMessage> {
        self.0.next()
    }
}

fn run() -> Result<()> {
    let mut config_path = None;
    let mut trace_mode = false;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--trace" => trace_mode = true,
            _ => config_path = Some(arg),
        }
    }

    let config = match config_path {
        Some(path) => {
            info!("loading {}", path);
            SynthConfig::load(path)?
        }
        None => SynthConfig::default(),
    };

    if trace_mode { trace(&config) } else { play(&config) }
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("{}", e);
        eprintln!("{} {}", Red.bold().paint("ERROR"), e);
        process::exit(1);
    }
}
