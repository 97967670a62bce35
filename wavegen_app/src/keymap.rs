//! Key bindings and the frequency entry prompt.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use wavegen_core::{Channel, Command, FrequencyStep, WaveformKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Engine(Command),
    PromptFrequency,
    Quit,
}

pub const HELP: &[(&str, &str)] = &[
    ("f", "enter frequency"),
    ("left/right", "-/+ 1%"),
    ("down/up", "-/+ 10%"),
    ("q s w t", "square sine saw triangle"),
    ("r", "round frequency"),
    ("R G B", "output lane"),
    ("3", "toggle rgb332 packing"),
    ("esc x", "quit"),
];

pub fn map_key(key: KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c')).then_some(Action::Quit);
    }

    let command = match key.code {
        KeyCode::Char('f') => return Some(Action::PromptFrequency),
        KeyCode::Esc | KeyCode::Char('x') => return Some(Action::Quit),

        KeyCode::Right => Command::Step(FrequencyStep::FineUp),
        KeyCode::Left => Command::Step(FrequencyStep::FineDown),
        KeyCode::Up => Command::Step(FrequencyStep::CoarseUp),
        KeyCode::Down => Command::Step(FrequencyStep::CoarseDown),

        KeyCode::Char('q') => Command::SetWaveform(WaveformKind::Square),
        KeyCode::Char('s') => Command::SetWaveform(WaveformKind::Sine),
        KeyCode::Char('w') => Command::SetWaveform(WaveformKind::Sawtooth),
        KeyCode::Char('t') => Command::SetWaveform(WaveformKind::Triangle),

        KeyCode::Char('r') => Command::RoundFrequency,
        KeyCode::Char('R') => Command::SetChannel(Channel::Red),
        KeyCode::Char('G') => Command::SetChannel(Channel::Green),
        KeyCode::Char('B') => Command::SetChannel(Channel::Blue),

        KeyCode::Char('3') => Command::TogglePacking,
        _ => return None,
    };
    Some(Action::Engine(command))
}

#[derive(Debug, Clone, PartialEq)]
pub enum PromptEvent {
    Editing,
    Cancelled,
    Submitted(f64),
    Invalid(String),
}

/// Line editor for the `f` prompt. Accepts what `f64` parses, e.g. `1e6`.
#[derive(Debug, Default)]
pub struct FrequencyPrompt {
    buffer: String,
}

impl FrequencyPrompt {
    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn handle(&mut self, key: KeyEvent) -> PromptEvent {
        if key.kind == KeyEventKind::Release {
            return PromptEvent::Editing;
        }
        match key.code {
            KeyCode::Esc => PromptEvent::Cancelled,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => PromptEvent::Cancelled,
            KeyCode::Backspace => {
                self.buffer.pop();
                PromptEvent::Editing
            }
            KeyCode::Enter => {
                let text = std::mem::take(&mut self.buffer);
                match text.trim().parse::<f64>() {
                    Ok(frequency) => PromptEvent::Submitted(frequency),
                    Err(_) => PromptEvent::Invalid(format!("not a frequency: `{}`", text.trim())),
                }
            }
            KeyCode::Char(c) if c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+') => {
                self.buffer.push(c);
                PromptEvent::Editing
            }
            _ => PromptEvent::Editing,
        }
    }
}
