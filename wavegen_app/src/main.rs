mod cli;
mod keymap;
mod tui;

use std::fs::File;
use std::sync::Mutex;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::util::SubscriberInitExt;
use wavegen_backend::audio_device::{ConfigurationRequest, DeviceEnumerator};
use wavegen_backend::{AudioMonitor, SignalEngine, SimulatedDac, TransmitDevice};
use wavegen_core::EngineSettings;

use crate::cli::{Cli, DeviceKind};
use crate::tui::Exit;

/// Used when the requested frequency cannot be produced at the sound card's rate.
const AUDIO_FALLBACK_FREQUENCY: f64 = 1_000.0;

fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_max_level(cli.log_level()).compact();
    match &cli.log_file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).finish().init();
        }
        None => builder.with_writer(std::io::stderr).finish().init(),
    }
    Ok(())
}

/// Open the sound card and bend `settings` to the rate it actually runs at.
fn open_audio(cli: &Cli, settings: &mut EngineSettings) -> anyhow::Result<(AudioMonitor, Vec<String>)> {
    let request = ConfigurationRequest::new(settings.sample_rate);
    let monitor = AudioMonitor::open(cli.audio_device.as_deref(), &request, settings.transfer_len)
        .context("opening audio output")?;

    let mut warnings = Vec::new();
    if let Some(warning) = monitor.negotiated().warning() {
        warnings.push(warning);
    }
    settings.sample_rate = monitor.negotiated().sample_rate;

    if settings.initial_configuration().validate(settings.frequency_policy).is_err() {
        let message = format!(
            "{} Hz is out of range at {} S/s, starting at {} Hz",
            settings.frequency, settings.sample_rate, AUDIO_FALLBACK_FREQUENCY
        );
        warn!("{message}");
        warnings.push(message);
        settings.frequency = AUDIO_FALLBACK_FREQUENCY;
    }

    Ok((monitor, warnings))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli)?;

    if cli.list_devices {
        DeviceEnumerator::new()?.print_device_list();
        return Ok(());
    }

    let mut settings = cli.settings()?;
    let mut startup_warnings = Vec::new();
    let audio = match cli.device {
        DeviceKind::Audio => {
            let (monitor, warnings) = open_audio(&cli, &mut settings)?;
            startup_warnings = warnings;
            Some(monitor)
        }
        DeviceKind::Simulated => None,
    };

    let SignalEngine {
        mut controller,
        supplier,
        monitor,
    } = SignalEngine::build(settings.clone()).context("invalid engine settings")?;
    for warning in startup_warnings {
        controller.report_warning(warning);
    }

    let mut device: Box<dyn TransmitDevice> = match audio {
        Some(audio) => Box::new(audio),
        None => Box::new(
            SimulatedDac::new(settings.sample_rate, settings.transfer_len).with_monitor(monitor.clone()),
        ),
    };
    device.start(Box::new(supplier)).context("starting transmission")?;
    info!(rate = device.sample_rate(), "transmission started");

    let exit = tui::run(&mut controller, device.as_ref(), &monitor);

    controller.request_shutdown();
    device.stop();
    controller.poll_events();

    if cli.status_json {
        println!("{}", controller.status().to_json()?);
    }

    match exit? {
        Exit::Quit => Ok(()),
        Exit::Stopped => {
            match controller.status().latest_warning() {
                Some(reason) => bail!("{reason}"),
                None => bail!("Device error, exiting."),
            }
        }
    }
}
