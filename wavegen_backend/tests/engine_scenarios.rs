use std::thread;

use wavegen_backend::rt_processing::cache::fill;
use wavegen_backend::rt_processing::waveform::{SampleWaveform, pack_332};
use wavegen_backend::{
    CallbackInfo, CallbackOutcome, DacCallback, EngineEvent, SignalEngine, SimulatedDac, SupplyPath, Transmission,
};
use wavegen_core::{
    Channel, Configuration, DeviceError, EngineSettings, FrequencyPolicy, Packing, ValidationError, WaveformKind,
};

const CHUNK: usize = 1024;

fn settings() -> EngineSettings {
    EngineSettings {
        sample_rate: 150_000_000,
        transfer_len: 3 * CHUNK,
        cache_budget: 65_536,
        frequency: 1_000_000.0,
        waveform: WaveformKind::Sine,
        channel: Channel::Red,
        packing: Packing::Raw8,
        ..EngineSettings::default()
    }
}

fn expected(config: &Configuration, first: u64, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    fill(&mut out, config, first);
    out
}

#[test]
fn sine_at_150_msps_stays_in_phase_across_cache_wraps() {
    let mut engine = SignalEngine::build(settings()).unwrap();

    // 200 chunks cover the 65 400 sample span three times over.
    for n in 0..200u64 {
        let supplied = engine.supplier.supply(CHUNK).unwrap();
        assert_eq!(supplied.path, SupplyPath::CacheSlice);
        assert_eq!(supplied.first_sample, n * CHUNK as u64);

        for (i, &byte) in supplied.transmission.samples().iter().enumerate() {
            let position = (supplied.first_sample + i as u64) % 150;
            assert_eq!(byte, WaveformKind::Sine.sample(position as f64 / 150.0));
        }
    }
}

#[test]
fn square_switch_gives_clean_half_duty() {
    let mut engine = SignalEngine::build(settings()).unwrap();
    for _ in 0..7 {
        engine.supplier.supply(CHUNK).unwrap();
    }

    engine.controller.set_waveform(WaveformKind::Square).unwrap();

    let mut stream = Vec::new();
    let mut first = None;
    for _ in 0..10 {
        let supplied = engine.supplier.supply(CHUNK).unwrap();
        assert_eq!(supplied.config.waveform, WaveformKind::Square);
        first.get_or_insert(supplied.first_sample);

        for (i, &byte) in supplied.transmission.samples().iter().enumerate() {
            let position = (supplied.first_sample + i as u64) % 150;
            let want = if position >= 75 { 255 } else { 0 };
            assert_eq!(byte, want, "sample {} of chunk at {}", i, supplied.first_sample);
        }
        stream.extend_from_slice(supplied.transmission.samples());
    }

    let first = first.unwrap();
    assert_eq!(first, 7 * CHUNK as u64);

    // Every whole period is 75 samples low followed by 75 high.
    let skip = ((150 - first % 150) % 150) as usize;
    let periods: Vec<&[u8]> = stream[skip..].chunks_exact(150).collect();
    assert_eq!(periods.len(), 68);
    for period in periods {
        assert!(period[..75].iter().all(|&b| b == 0));
        assert!(period[75..].iter().all(|&b| b == 255));
    }
}

#[test]
fn setting_the_same_frequency_is_seamless() {
    let mut engine = SignalEngine::build(settings()).unwrap();
    let config = engine.controller.configuration();

    let before = engine.supplier.supply(CHUNK).unwrap().first_sample;
    engine.controller.set_frequency(config.frequency).unwrap();
    assert_eq!(engine.controller.published_generation(), 0);

    let supplied = engine.supplier.supply(CHUNK).unwrap();
    assert_eq!(supplied.first_sample, before + CHUNK as u64);
    assert_eq!(supplied.generation, 0);
    assert_eq!(supplied.transmission.samples(), &expected(&config, supplied.first_sample, CHUNK)[..]);
}

#[test]
fn frequency_change_continues_from_current_index() {
    let mut engine = SignalEngine::build(settings()).unwrap();
    for _ in 0..3 {
        engine.supplier.supply(CHUNK).unwrap();
    }

    engine.controller.set_frequency(2_000_000.0).unwrap();
    let supplied = engine.supplier.supply(CHUNK).unwrap();
    assert_eq!(supplied.first_sample, 3 * CHUNK as u64);
    assert_eq!(supplied.generation, 1);
    assert_eq!(supplied.config.period_length(), 75.0);
    assert_eq!(supplied.transmission.samples(), &expected(&supplied.config, supplied.first_sample, CHUNK)[..]);
}

#[test]
fn long_periods_fall_back_to_synthesis_without_glitches() {
    let mut engine = SignalEngine::build(EngineSettings {
        frequency: 100.0,
        waveform: WaveformKind::Sawtooth,
        ..settings()
    })
    .unwrap();
    let config = engine.controller.configuration();

    let mut paths = Vec::new();
    for _ in 0..100 {
        let supplied = engine.supplier.supply(CHUNK).unwrap();
        paths.push(supplied.path);
        assert_eq!(supplied.transmission.samples(), &expected(&config, supplied.first_sample, CHUNK)[..]);
    }
    assert!(paths.contains(&SupplyPath::CacheSlice));
    assert!(paths.contains(&SupplyPath::Synthesized));
}

#[test]
fn concurrent_reconfiguration_never_tears_a_chunk() {
    let SignalEngine { mut controller, mut supplier, .. } = SignalEngine::build(settings()).unwrap();

    let worker = thread::spawn(move || {
        let mut mismatches = 0usize;
        let mut next_first = 0u64;
        let mut generations = Vec::new();
        for _ in 0..4_000 {
            let supplied = supplier.supply(CHUNK).unwrap();
            assert_eq!(supplied.first_sample, next_first);
            next_first += CHUNK as u64;
            if supplied.transmission.samples() != &expected(&supplied.config, supplied.first_sample, CHUNK)[..] {
                mismatches += 1;
            }
            if generations.last() != Some(&supplied.generation) {
                generations.push(supplied.generation);
            }
        }
        (mismatches, generations)
    });

    let frequencies = [1_000_000.0, 2_500_000.0, 333_333.0, 10_000_000.0];
    for n in 0..200usize {
        controller.set_waveform(WaveformKind::ALL[n % WaveformKind::ALL.len()]).unwrap();
        controller.set_frequency(frequencies[n % frequencies.len()]).unwrap();
    }

    let (mismatches, generations) = worker.join().unwrap();
    assert_eq!(mismatches, 0);
    // Generations only ever move forward.
    assert!(generations.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn rejected_frequencies_leave_output_untouched() {
    let mut engine = SignalEngine::build(settings()).unwrap();
    let config = engine.controller.configuration();

    assert!(engine.controller.set_frequency(75_000_000.0).is_ok());
    engine.controller.set_frequency(1_000_000.0).unwrap();

    for bad in [75_000_001.0, 0.0, -1.0, f64::NAN, f64::INFINITY] {
        assert!(engine.controller.set_frequency(bad).is_err(), "{bad} accepted");
    }
    assert_eq!(engine.controller.configuration(), config);

    let supplied = engine.supplier.supply(CHUNK).unwrap();
    assert_eq!(supplied.config, config);
}

#[test]
fn legacy_ceiling_applies_below_nyquist() {
    let mut engine = SignalEngine::build(EngineSettings {
        sample_rate: 200_000_000,
        frequency_policy: FrequencyPolicy::legacy(),
        ..settings()
    })
    .unwrap();

    assert!(engine.controller.set_frequency(75_000_000.0).is_ok());
    assert!(matches!(
        engine.controller.set_frequency(80_000_000.0),
        Err(ValidationError::FrequencyAboveLimit { .. })
    ));
}

#[test]
fn packed_transfers_fill_every_lane() {
    let mut engine = SignalEngine::build(EngineSettings {
        packing: Packing::Packed332,
        waveform: WaveformKind::Triangle,
        ..settings()
    })
    .unwrap();

    let first = engine.supplier.sample_index();
    match engine.supplier.on_transfer(CallbackInfo::transfer(3 * CHUNK)) {
        CallbackOutcome::Transmit(transmission) => {
            assert!(matches!(transmission, Transmission::Packed { .. }));
            assert_eq!(transmission.len(), 3 * CHUNK);
            for (i, &byte) in transmission.samples().iter().enumerate() {
                let position = (first + i as u64) % 150;
                let amplitude = WaveformKind::Triangle.sample(position as f64 / 150.0);
                assert_eq!(byte, pack_332(amplitude, amplitude, amplitude));
            }
        }
        CallbackOutcome::Stop => panic!("unexpected stop"),
    }
}

#[test]
fn device_fault_ends_the_stream() {
    let mut engine = SignalEngine::build(settings()).unwrap();
    let dac = SimulatedDac::new(150_000_000, 3 * CHUNK).with_fault_after(4);

    let mut lanes = Vec::new();
    let report = dac.drive(&mut engine.supplier, 50, |t| lanes.push(t.lane(Channel::Red).is_some()));

    assert_eq!(report.transfers, 4);
    assert!(report.stopped);
    assert!(lanes.iter().all(|&red| red));

    let events = engine.controller.poll_events();
    assert_eq!(events, vec![EngineEvent::Fault(DeviceError::TransmissionFault)]);
    assert!(engine.controller.is_stopped());
    assert!(engine.controller.status().report().stopped);

    // Nothing is produced after the fault.
    assert_eq!(engine.supplier.on_transfer(CallbackInfo::transfer(3 * CHUNK)), CallbackOutcome::Stop);
}

#[test]
fn channel_switch_moves_the_lane() {
    let mut engine = SignalEngine::build(settings()).unwrap();
    let dac = SimulatedDac::new(150_000_000, 3 * CHUNK);

    dac.drive(&mut engine.supplier, 2, |t| assert!(t.lane(Channel::Red).is_some()));
    engine.controller.set_channel(Channel::Blue).unwrap();
    dac.drive(&mut engine.supplier, 2, |t| {
        assert!(t.lane(Channel::Blue).is_some());
        assert!(t.lane(Channel::Red).is_none());
    });
}
