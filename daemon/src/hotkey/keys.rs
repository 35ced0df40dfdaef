//! Key codes and modifier checks for the copy gesture
//!
//! The gesture is Command held together with the "C" key. Extra modifiers
//! (Shift, Option, Control) do not disqualify it, so only Command is read.

/// Virtual keycode of "C" on ANSI and ISO layouts
pub const KEYCODE_C: i64 = 8;

/// Command key flag mask from macOS CGEventFlags
#[cfg(target_os = "macos")]
pub const COMMAND_FLAG: core_graphics::event::CGEventFlags =
    core_graphics::event::CGEventFlags::CGEventFlagCommand;

/// Whether the Command modifier is set in an event's flags
#[cfg(target_os = "macos")]
pub fn command_held(event_flags: core_graphics::event::CGEventFlags) -> bool {
    event_flags.contains(COMMAND_FLAG)
}

/// Whether a key-down is the copy gesture
pub fn is_copy_gesture(keycode: i64, command: bool) -> bool {
    keycode == KEYCODE_C && command
}
