//! Hotkey module for global keyboard event listening
//!
//! Uses macOS CGEventTap to observe Cmd+C key-downs. Only the key monitor
//! binary runs the tap; the daemon sees its output through the supervisor.

mod keys;
mod tap;

pub use keys::{is_copy_gesture, KEYCODE_C};
#[cfg(target_os = "macos")]
pub use keys::command_held;
pub use tap::{run_key_tap, TapError};
