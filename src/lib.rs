//! Trackline - terminal client for Linear-style issue tracking
//!
//! This library crate exposes internal modules for integration testing.

pub mod api;
pub mod config;
pub mod data;
pub mod sync;
pub mod tui;
pub mod util;
