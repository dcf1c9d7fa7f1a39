//! Message enum for Elm Architecture (TEA) pattern.
//!
//! All user actions are represented as messages, dispatched from key
//! events and processed by `App::update()`.

/// All possible user actions in the application.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    // ─────────────────────────────────────────────────────────────────────
    // App lifecycle
    // ─────────────────────────────────────────────────────────────────────
    /// Quit the application
    Quit,
    /// Request a refresh of the issue list
    Refresh,
    /// Hard reset: drop all local state, then refresh
    HardReload,

    // ─────────────────────────────────────────────────────────────────────
    // Navigation
    // ─────────────────────────────────────────────────────────────────────
    /// Move selection up by one row
    MoveUp,
    /// Move selection down by one row
    MoveDown,
    /// Go to the first row
    GotoTop,
    /// Go to the last row
    GotoBottom,
    /// Page up
    PageUp,
    /// Page down
    PageDown,
    /// Switch between the My Issues and Other Issues sections
    SwitchSection,

    // ─────────────────────────────────────────────────────────────────────
    // Tree expansion
    // ─────────────────────────────────────────────────────────────────────
    /// Expand the current row (no-op without children)
    ExpandRow,
    /// Collapse the current row
    CollapseRow,
    /// Toggle expansion of the current row
    ToggleRow,
    /// Expand every parent issue
    ExpandAll,
    /// Collapse everything
    CollapseAll,

    // ─────────────────────────────────────────────────────────────────────
    // Search mode
    // ─────────────────────────────────────────────────────────────────────
    /// Enter search input mode
    EnterSearch,
    /// Leave search input mode without applying
    ExitSearch,
    /// Apply the search query and refresh
    ConfirmSearch,
    /// Add a character to the search query
    SearchInput(char),
    /// Remove the last character from the search query
    SearchBackspace,

    // ─────────────────────────────────────────────────────────────────────
    // View toggles
    // ─────────────────────────────────────────────────────────────────────
    /// Cycle the sort field and refresh
    CycleSort,
    /// Toggle the details pane
    ToggleDetails,
    /// Toggle the help overlay
    ToggleHelp,
    /// Open the selected issue in the browser
    OpenInBrowser,

    // ─────────────────────────────────────────────────────────────────────
    // No-op
    // ─────────────────────────────────────────────────────────────────────
    /// No operation (for unhandled keys or pending chords)
    None,
}
