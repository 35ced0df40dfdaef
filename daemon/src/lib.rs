//! deeplocal: double-copy translator plumbing
//!
//! Provides the pieces shared by the daemon and the native key monitor:
//! - Monitor wire protocol and the process supervisor that owns the monitor
//! - Double-tap gesture detection over supervised key events
//! - Debounced, cancel-on-supersede translation orchestration
//! - IPC server for the UI front end

pub mod clipboard;
pub mod config;
pub mod events;
pub mod gesture;
pub mod hotkey;
pub mod ipc;
pub mod lifecycle;
pub mod monitor;
pub mod translate;
