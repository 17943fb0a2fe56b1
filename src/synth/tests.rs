use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;

use crate::{
    config::SynthConfig,
    message::{MessageReceiver, SynthMessage},
    synth::NesSynth,
    voice::{allocator::AllocationMode, channel::Channel},
};

fn synth() -> NesSynth {
    let mut synth = NesSynth::new();
    synth.initialize(44_100.0);
    synth
}

/// Snapshot of every base and expansion register.
fn image(synth: &NesSynth) -> Vec<Option<u8>> {
    (0x4000..=0x4017)
        .chain(0x9000..=0x9003)
        .chain(0xA000..=0xA002)
        .chain(0xB000..=0xB002)
        .map(|addr| synth.peek_register(addr))
        .collect()
}

struct Queue(Vec<SynthMessage>);

impl MessageReceiver for Queue {
    fn pop(&mut self) -> Option<SynthMessage> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.remove(0))
        }
    }
}

#[test]
fn initialize_enables_base_channels() {
    let synth = synth();
    assert_eq!(synth.peek_register(0x4015), Some(0x0F));
    assert!(synth.is_channel_enabled(0));
    assert!(!synth.is_channel_enabled(4));
    assert_relative_eq!(synth.clock().clocks_per_sample(), 40.5844, epsilon = 1e-4);
}

#[test]
fn pulse_note_on_writes_recipe() {
    let mut synth = synth();
    assert_eq!(synth.note_on(0, 69, 1.0), Some(Channel::Pulse1));
    assert_eq!(synth.peek_register(0x4000), Some(0xBF));
    assert_eq!(synth.peek_register(0x4002), Some(0xFD));
    assert_eq!(synth.peek_register(0x4003), Some(0xF8));
    assert_relative_eq!(synth.channel_frequency(0), 440.0);
    assert_eq!(synth.channel_frequency(1), 0.0);
}

#[test]
fn note_off_writes_once_per_sounding_channel() {
    let mut synth = synth();
    synth.note_on(0, 60, 1.0);
    let before = synth.register_write_count();
    assert_eq!(synth.note_off(0, 60), 1);
    assert_eq!(synth.register_write_count(), before + 1);
    assert_eq!(synth.peek_register(0x4000), Some(0xB0));
    assert_eq!(synth.channel_for_note(60), None);

    synth.set_allocation_mode(AllocationMode::Unison);
    synth.note_on(0, 64, 1.0);
    let before = synth.register_write_count();
    assert_eq!(synth.note_off(0, 64), 3);
    assert_eq!(synth.register_write_count(), before + 3);
    assert_eq!(synth.peek_register(0x4008), Some(0x80));
}

#[test]
fn retrigger_writes_note_off_then_note_on() {
    let mut synth = synth();
    synth.note_on(0, 60, 1.0);
    let before = synth.register_write_count();
    assert_eq!(synth.note_on(0, 60, 0.5), Some(Channel::Pulse1));
    assert_eq!(synth.register_write_count(), before + 4);
    assert_eq!(synth.peek_register(0x4000), Some(0xB8));
}

#[test]
fn all_notes_off_is_idempotent() {
    let mut synth = synth();
    synth.set_expansion_enabled(true);
    for note in [48, 52, 55, 60, 64] {
        synth.note_on(0, note, 1.0);
    }
    synth.all_notes_off();
    let count = synth.register_write_count();
    let silent = image(&synth);

    synth.all_notes_off();
    assert_eq!(synth.register_write_count(), count);
    assert_eq!(image(&synth), silent);
    assert!(Channel::ALL.iter().all(|c| synth.allocator().table().note(*c).is_none()));
}

#[test]
fn zero_velocity_binds_a_silent_voice() {
    let mut synth = synth();
    assert_eq!(synth.note_on(0, 60, 0.0), Some(Channel::Pulse1));
    assert_eq!(synth.peek_register(0x4000), Some(0xB0));
    assert_eq!(synth.channel_for_note(60), Some(Channel::Pulse1));
}

#[test]
fn out_of_range_inputs_clamp() {
    let mut synth = synth();
    synth.set_allocation_mode(AllocationMode::FixedMono);
    synth.note_on(0, 300, 7.0);
    assert_eq!(synth.channel_for_note(127), Some(Channel::Pulse1));
    assert_eq!(synth.peek_register(0x4000), Some(0xBF));

    let before = synth.register_write_count();
    synth.set_channel_enabled(12, false);
    synth.note_on_channel(8, 60, 1.0);
    synth.set_pulse_duty(2, 1);
    assert_eq!(synth.register_write_count(), before);
}

#[test]
fn channel_enable_rewrites_status() {
    let mut synth = synth();
    let before = synth.register_write_count();
    synth.set_channel_enabled(1, false);
    assert_eq!(synth.peek_register(0x4015), Some(0x0D));
    synth.set_channel_enabled(4, true);
    assert_eq!(synth.peek_register(0x4015), Some(0x1D));
    assert_eq!(synth.register_write_count(), before + 2);
}

#[test]
fn expansion_channel_enable_toggles_its_bit() {
    let mut synth = synth();
    synth.set_expansion_enabled(true);
    synth.set_allocation_mode(AllocationMode::MidiChannelSplit);
    assert_eq!(synth.note_on(3, 60, 1.0), Some(Channel::ExpPulse1));
    assert_eq!(synth.peek_register(0x9000), Some(0x4F));
    let high = synth.peek_register(0x9002).unwrap();
    assert_eq!(high & 0x80, 0x80);

    synth.set_channel_enabled(5, false);
    assert_eq!(synth.peek_register(0x9002), Some(high & 0x0F));
    synth.set_channel_enabled(5, true);
    assert_eq!(synth.peek_register(0x9002), Some(high));
}

#[test]
fn disabling_expansion_forces_channels_off() {
    let mut synth = synth();
    synth.set_expansion_enabled(true);
    for note in 60..66 {
        synth.note_on(0, note, 1.0);
    }
    assert_eq!(synth.channel_for_note(65), Some(Channel::ExpSawtooth));

    synth.set_expansion_enabled(false);
    for addr in [0x9002, 0xA002, 0xB002] {
        assert_eq!(synth.peek_register(addr), Some(0x00));
    }
    assert_eq!(synth.channel_for_note(63), None);
    assert_eq!(synth.channel_for_note(60), Some(Channel::Pulse1));

    // Unconditional even with nothing sounding.
    let before = synth.register_write_count();
    synth.set_expansion_enabled(false);
    assert_eq!(synth.register_write_count(), before + 3);
}

#[test]
fn enabling_expansion_leaves_base_voices_alone() {
    let mut synth = synth();
    synth.note_on(0, 60, 1.0);
    synth.note_on(0, 64, 1.0);
    let count = synth.register_write_count();
    let registers = image(&synth);

    synth.set_expansion_enabled(true);
    assert_eq!(synth.register_write_count(), count);
    assert_eq!(image(&synth), registers);
    assert_eq!(synth.channel_for_note(60), Some(Channel::Pulse1));
    assert_eq!(synth.channel_for_note(64), Some(Channel::Pulse2));
}

#[test]
fn duty_change_rewrites_sounding_channel_only() {
    let mut synth = synth();
    synth.note_on(0, 60, 1.0);
    synth.set_pulse_duty(0, 0);
    assert_eq!(synth.peek_register(0x4000), Some(0x3F));

    let before = synth.register_write_count();
    synth.set_pulse_duty(1, 9);
    assert_eq!(synth.register_write_count(), before);
    synth.note_on(0, 64, 1.0);
    assert_eq!(synth.peek_register(0x4004), Some(0xFF));
}

#[test]
fn noise_mode_rewrites_period_register() {
    let mut synth = synth();
    synth.note_on_channel(3, 40, 1.0);
    assert_eq!(synth.peek_register(0x400E), Some(0x0A));
    synth.set_noise_mode(true);
    assert_eq!(synth.peek_register(0x400E), Some(0x8A));
    synth.note_off_channel(3);
    assert_eq!(synth.peek_register(0x400C), Some(0x30));
}

#[test]
fn silence_renders_zeros() {
    let mut synth = synth();
    let mut left = [1.0f32; 512];
    let mut right = [1.0f32; 512];
    synth.render_block(&mut left, &mut right);
    assert!(left.iter().chain(right.iter()).all(|s| *s == 0.0));
}

#[test]
fn note_renders_bounded_identical_channels() {
    let mut synth = synth();
    synth.note_on(0, 69, 1.0);
    let mut left = vec![0.0f32; 4410];
    let mut right = vec![0.0f32; 4410];
    synth.render_block(&mut left, &mut right);
    assert_eq!(left, right);
    let peak = left.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak > 0.02, "peak {peak}");
    assert!(peak <= synth.master_gain());
}

#[test]
fn master_gain_scales_output() {
    let mut loud = synth();
    let mut quiet = synth();
    loud.set_master_gain(1.0);
    quiet.set_master_gain(0.5);
    for s in [&mut loud, &mut quiet] {
        s.note_on(0, 57, 1.0);
    }
    let mut a = vec![0.0f32; 1024];
    let mut b = vec![0.0f32; 1024];
    loud.render_interleaved(&mut a);
    quiet.render_interleaved(&mut b);
    for (x, y) in a.iter().zip(&b) {
        assert_relative_eq!(*x * 0.5, *y, epsilon = 1e-6);
    }
}

#[test]
fn scheduler_hands_out_expected_pulses() {
    let mut synth = synth();
    let mut buffer = vec![0.0f32; 2 * 10_000];
    for _ in 0..10 {
        synth.render_interleaved(&mut buffer);
    }
    let expected = (100_000.0 * synth.clock().clocks_per_sample()).round() as i64;
    assert!((synth.clock().total_pulses() as i64 - expected).abs() <= 1);
}

#[test]
#[should_panic(expected = "render before initialize")]
fn rendering_uninitialized_panics() {
    let mut synth = NesSynth::new();
    let mut out = [0.0f32; 4];
    synth.render_interleaved(&mut out);
}

#[test]
fn messages_are_applied_in_order() {
    let mut synth = synth();
    let mut queue = Queue(vec![
        SynthMessage::NoteOn {
            midi_channel: 0,
            note: 60,
            velocity: 1.0,
        },
        SynthMessage::NoteOn {
            midi_channel: 0,
            note: 64,
            velocity: 1.0,
        },
        SynthMessage::NoteOff {
            midi_channel: 0,
            note: 60,
        },
    ]);
    synth.process_messages(&mut queue);
    assert_eq!(synth.channel_for_note(60), None);
    assert_eq!(synth.channel_for_note(64), Some(Channel::Pulse2));

    let mut queue = Queue(vec![SynthMessage::AllNotesOff]);
    synth.process_messages(&mut queue);
    assert_eq!(synth.channel_for_note(64), None);
}

#[test]
fn tap_observes_writes() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut synth = synth();
    synth.set_register_tap(Some(Box::new(move |addr: u16, data: u8| {
        sink.lock().unwrap().push((addr, data));
    })));
    synth.note_on(0, 69, 1.0);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(0x4000, 0xBF), (0x4002, 0xFD), (0x4003, 0xF8)]
    );
}

#[test]
fn from_config_applies_settings() {
    let config = SynthConfig::from_json_str(
        r#"{
            "sample_rate": 48000,
            "allocation_mode": "PitchSplit",
            "split_point": 50,
            "expansion_enabled": true,
            "base_channels_enabled": [true, false, true, true, false],
            "master_gain": 2.0
        }"#,
    )
    .unwrap();
    let mut synth = NesSynth::from_config(&config).unwrap();
    assert_eq!(synth.peek_register(0x4015), Some(0x0D));
    assert_eq!(synth.master_gain(), 1.0);
    assert_eq!(synth.clock().sample_rate_hz(), 48_000.0);
    assert_eq!(synth.note_on(0, 49, 1.0), Some(Channel::Triangle));
    assert_eq!(synth.note_on(0, 45, 1.0), Some(Channel::ExpSawtooth));
}

#[test]
fn all_notes_off_stops_raw_register_notes() {
    let mut synth = synth();
    synth.write_register(0x4000, 0xBF);
    synth.write_register(0x4002, 0xFD);
    synth.write_register(0x4003, 0xF8);
    synth.all_notes_off();
    assert_eq!(synth.peek_register(0x4000), Some(0xB0));

    let count = synth.register_write_count();
    synth.all_notes_off();
    assert_eq!(synth.register_write_count(), count);

    let mut left = vec![0.0f32; 4410];
    let mut right = vec![0.0f32; 4410];
    synth.render_block(&mut left, &mut right);
    assert!(left.iter().all(|s| *s == 0.0));
}

#[test]
fn reenabling_expansion_starts_from_silence() {
    let mut synth = synth();
    synth.set_expansion_enabled(true);
    synth.note_on_channel(7, 45, 1.0);
    let mut block = vec![0.0f32; 4000];
    synth.render_interleaved(&mut block);
    assert!(block.iter().any(|s| *s != 0.0));

    synth.set_expansion_enabled(false);
    synth.render_interleaved(&mut block);
    synth.set_expansion_enabled(true);
    synth.render_interleaved(&mut block);
    assert!(block.iter().all(|s| *s == 0.0), "first {:?}", &block[..4]);
}

#[test]
fn master_gain_clamps() {
    let mut synth = synth();
    synth.set_master_gain(-1.0);
    assert_eq!(synth.master_gain(), 0.0);
    synth.set_master_gain(f32::NAN);
    assert_eq!(synth.master_gain(), 0.0);
    synth.set_master_gain(0.25);
    assert_eq!(synth.master_gain(), 0.25);
}
