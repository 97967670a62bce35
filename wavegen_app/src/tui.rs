//! Raw-mode terminal front end.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::{
    cursor,
    event::{self, Event},
    execute, queue,
    terminal::{Clear, ClearType, disable_raw_mode, enable_raw_mode},
};
use tracing::debug;
use wavegen_backend::{ConfigController, PerformanceMonitor, PerformanceSnapshot, TransmitDevice};
use wavegen_core::{Command, StatusReport};

use crate::keymap::{Action, FrequencyPrompt, HELP, PromptEvent, map_key};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const REFRESH_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Quit,
    /// The engine stopped on its own, e.g. after a device error.
    Stopped,
}

/// Raw mode for as long as this lives.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> io::Result<Self> {
        execute!(io::stdout(), Clear(ClearType::All), cursor::Hide)?;
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), cursor::Show);
    }
}

fn render(
    out: &mut impl Write,
    report: &StatusReport,
    perf: &PerformanceSnapshot,
    device_rate: u32,
    prompt: Option<&str>,
) -> io::Result<()> {
    queue!(out, cursor::MoveTo(0, 0), Clear(ClearType::All))?;

    write!(out, "{}\r\n", report.headline())?;
    write!(
        out,
        "Sample rate: {} S/s  period: {:.3} samples  cache: {} bytes  generation: {}\r\n",
        device_rate, report.period_length, report.cache_len, report.generation
    )?;
    write!(
        out,
        "Transfers: {}  cache hits: {}  synthesized: {}  underruns: {}  load: {:.1}%\r\n",
        perf.callback_count, perf.cache_hits, perf.synthesized, perf.underrun_count, perf.avg_load_percent
    )?;
    write!(out, "\r\n")?;

    match report.warnings.last() {
        Some(warning) => write!(out, "{}\r\n", warning)?,
        None => write!(out, "\r\n")?,
    }
    if report.stopped {
        write!(out, "Transmission stopped.\r\n")?;
    }
    write!(out, "\r\n")?;

    for (keys, what) in HELP {
        write!(out, "  {:<12} {}\r\n", keys, what)?;
    }

    if let Some(text) = prompt {
        write!(out, "\r\nEnter frequency in Hz: {}", text)?;
    }
    out.flush()
}

/// Drive `controller` from the keyboard until the operator quits or the engine stops.
pub fn run(
    controller: &mut ConfigController,
    device: &dyn TransmitDevice,
    monitor: &PerformanceMonitor,
) -> anyhow::Result<Exit> {
    let _guard = TerminalGuard::new()?;
    let mut stdout = io::stdout();
    let status = controller.status();
    let mut prompt: Option<FrequencyPrompt> = None;
    let mut needs_redraw = true;
    let mut last_draw = Instant::now();

    loop {
        if !controller.poll_events().is_empty() || controller.is_stopped() {
            render(&mut stdout, &status.report(), &monitor.snapshot(), device.sample_rate(), None)?;
            return Ok(Exit::Stopped);
        }

        if needs_redraw || last_draw.elapsed() >= REFRESH_INTERVAL {
            let text = prompt.as_ref().map(FrequencyPrompt::text);
            render(&mut stdout, &status.report(), &monitor.snapshot(), device.sample_rate(), text)?;
            needs_redraw = false;
            last_draw = Instant::now();
        }

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            needs_redraw = true;
            continue;
        };
        needs_redraw = true;

        if let Some(editor) = prompt.as_mut() {
            match editor.handle(key) {
                PromptEvent::Editing => {}
                PromptEvent::Cancelled => prompt = None,
                PromptEvent::Submitted(frequency) => {
                    prompt = None;
                    // Rejections land on the status board.
                    let _ = controller.apply(Command::SetFrequency(frequency));
                }
                PromptEvent::Invalid(message) => {
                    prompt = None;
                    controller.report_warning(message);
                }
            }
            continue;
        }

        match map_key(key) {
            Some(Action::Engine(command)) => {
                debug!(?command, "key command");
                let _ = controller.apply(command);
            }
            Some(Action::PromptFrequency) => prompt = Some(FrequencyPrompt::default()),
            Some(Action::Quit) => return Ok(Exit::Quit),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavegen_core::{Channel, Configuration, Packing, WaveformKind};

    #[test]
    fn test_render_shows_state_and_prompt() {
        let config = Configuration {
            frequency: 1_000_000.0,
            sample_rate: 150_000_000,
            waveform: WaveformKind::Sine,
            channel: Channel::Red,
            packing: Packing::Packed332,
        };
        let mut report = StatusReport::new(&config, 4096, 3);
        report.warnings.push("frequency rejected".to_string());
        let perf = PerformanceMonitor::new(150_000_000, 0.1).snapshot();

        let mut out = Vec::new();
        render(&mut out, &report, &perf, 150_000_000, Some("12")).unwrap();
        let text = String::from_utf8_lossy(&out);

        assert!(text.contains("Target frequency: 1000000.000000Hz"));
        assert!(text.contains("generation: 3"));
        assert!(text.contains("frequency rejected"));
        assert!(text.contains("Enter frequency in Hz: 12"));
    }
}
