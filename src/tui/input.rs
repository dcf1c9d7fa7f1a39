//! Input dispatch layer.
//!
//! Maps key events to messages based on the current app mode. Handles the
//! `gg` chord with a non-blocking state machine.

use super::{App, Message};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Instant;

/// State machine for handling key chords (gg).
///
/// Instead of blocking with `event::poll()` inline, we track pending keys
/// and check for timeout in the main event loop.
#[derive(Debug, Default)]
pub struct InputState {
    /// The first key of a potential chord sequence
    pub pending: Option<KeyCode>,
    /// When the pending key was pressed (for timeout detection)
    pub pending_since: Option<Instant>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if there's a pending chord that has timed out (500ms).
    pub fn has_timed_out(&self) -> bool {
        if let Some(since) = self.pending_since {
            since.elapsed().as_millis() > 500
        } else {
            false
        }
    }

    /// Clear the pending chord state.
    pub fn clear(&mut self) {
        self.pending = None;
        self.pending_since = None;
    }

    /// Set a pending chord key.
    pub fn set_pending(&mut self, key: KeyCode) {
        self.pending = Some(key);
        self.pending_since = Some(Instant::now());
    }
}

/// Map key events to messages based on current app mode.
pub fn dispatch(app: &App, input: &mut InputState, key: KeyEvent) -> Message {
    // Handle pending chords first
    if let Some(pending) = input.pending.take() {
        input.pending_since = None;
        return handle_chord(pending, key.code);
    }

    if app.search_mode {
        dispatch_search_mode(key)
    } else if app.show_help {
        dispatch_help_overlay(key)
    } else {
        dispatch_normal_mode(input, key)
    }
}

/// Handle keys in normal mode (issue list).
fn dispatch_normal_mode(input: &mut InputState, key: KeyEvent) -> Message {
    match key.code {
        KeyCode::Char('q') => Message::Quit,
        KeyCode::Char('j') | KeyCode::Down => Message::MoveDown,
        KeyCode::Char('k') | KeyCode::Up => Message::MoveUp,
        KeyCode::Char('G') => Message::GotoBottom,
        KeyCode::Char('g') => {
            input.set_pending(KeyCode::Char('g'));
            Message::None
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => Message::PageDown,
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => Message::PageUp,
        KeyCode::Tab => Message::SwitchSection,
        KeyCode::Char('l') | KeyCode::Right => Message::ExpandRow,
        KeyCode::Char('h') | KeyCode::Left => Message::CollapseRow,
        KeyCode::Char(' ') => Message::ToggleRow,
        KeyCode::Char('E') => Message::ExpandAll,
        KeyCode::Char('C') => Message::CollapseAll,
        KeyCode::Char('/') => Message::EnterSearch,
        KeyCode::Char('o') => Message::CycleSort,
        KeyCode::Char('p') => Message::ToggleDetails,
        KeyCode::Char('r') => Message::Refresh,
        KeyCode::Char('R') => Message::HardReload,
        KeyCode::Enter => Message::OpenInBrowser,
        KeyCode::Char('?') => Message::ToggleHelp,
        _ => Message::None,
    }
}

/// Handle keys in search input mode.
fn dispatch_search_mode(key: KeyEvent) -> Message {
    match key.code {
        KeyCode::Esc => Message::ExitSearch,
        KeyCode::Enter => Message::ConfirmSearch,
        KeyCode::Backspace => Message::SearchBackspace,
        KeyCode::Char(c) => Message::SearchInput(c),
        _ => Message::None,
    }
}

/// Handle keys while the help overlay is open.
fn dispatch_help_overlay(key: KeyEvent) -> Message {
    match key.code {
        KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => Message::ToggleHelp,
        _ => Message::None,
    }
}

/// Handle the second key of a chord sequence.
fn handle_chord(first: KeyCode, second: KeyCode) -> Message {
    match (first, second) {
        (KeyCode::Char('g'), KeyCode::Char('g')) => Message::GotoTop,
        _ => Message::None,
    }
}
