//! Utility functions and helpers.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Send a value through a channel, logging a warning if it fails.
pub async fn send_or_log<T>(tx: &mpsc::Sender<T>, value: T, context: &str) {
    if let Err(e) = tx.send(value).await {
        tracing::warn!("Failed to send {}: {}", context, e);
    }
}

/// Compact relative time for the status bar, e.g. "42s ago", "3m ago".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86400)
    }
}
