use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    TogglePause,
}

pub fn map_key(key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Action::Quit),
        // raw mode swallows SIGINT
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char(' ') | KeyCode::Char('p') | KeyCode::Char('P') => Some(Action::TogglePause),
        _ => None,
    }
}

/// Drains pending terminal events, waiting at most `timeout` for the first.
pub fn poll_actions(timeout: Duration) -> anyhow::Result<Vec<Action>> {
    let mut out = Vec::new();
    let mut wait = timeout;
    while event::poll(wait)? {
        if let Event::Key(k) = event::read()? {
            if let Some(action) = map_key(k) {
                out.push(action);
            }
        }
        wait = Duration::ZERO;
        if out.len() >= 16 {
            break;
        }
    }
    Ok(out)
}
