//! System-wide key tap using macOS CGEventTap
//!
//! The tap is created listen-only so key delivery to other applications is
//! never delayed or altered. It runs on the calling thread's CFRunLoop and
//! only returns if the run loop is stopped or the tap cannot be created.

use crate::monitor::MonitorToken;

/// Errors that can occur while setting up the key tap
#[derive(Debug, thiserror::Error)]
pub enum TapError {
    #[error("failed to create event tap - check Input Monitoring permissions")]
    EventTapCreation,

    #[error("failed to create run loop source for event tap")]
    RunLoopSource,

    #[error("event tap was disabled by the system")]
    Disabled,

    #[error("global key tap is only available on macOS")]
    Unsupported,
}

impl TapError {
    /// Whether the monitor should report `failed to create event tap`
    /// before exiting. A tap that was live and then disabled already
    /// reported `started`.
    pub fn writes_failure_token(&self) -> bool {
        !matches!(self, TapError::Disabled)
    }
}

/// Run the key tap, calling `emit` for every token to write.
///
/// `Started` is emitted once the tap is enabled; `GestureKeyDown` for every
/// Cmd+C key-down after that. If the system disables the tap the run loop
/// is stopped and `TapError::Disabled` returned, so the process exits and
/// the supervisor respawns it with a fresh tap.
#[cfg(target_os = "macos")]
pub fn run_key_tap<F>(emit: F) -> Result<(), TapError>
where
    F: Fn(MonitorToken) + 'static,
{
    use std::cell::Cell;
    use std::rc::Rc;

    use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
        CGEventTapProxy, CGEventType, EventField,
    };
    use tracing::{error, info, warn};

    use super::keys::{command_held, is_copy_gesture};

    let emit = Rc::new(emit);
    let callback_emit = Rc::clone(&emit);
    let disabled = Rc::new(Cell::new(false));
    let callback_disabled = Rc::clone(&disabled);

    // CGEventTap callback - must be fast and non-blocking
    let callback = move |_proxy: CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
          -> Option<CGEvent> {
        match event_type {
            CGEventType::KeyDown => {
                let keycode =
                    event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
                if is_copy_gesture(keycode, command_held(event.get_flags())) {
                    (*callback_emit)(MonitorToken::GestureKeyDown);
                }
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                warn!("event tap disabled by the system, stopping");
                callback_disabled.set(true);
                CFRunLoop::get_current().stop();
            }
            _ => {}
        }
        Some(event.clone())
    };

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        callback,
    )
    .map_err(|_| {
        error!("failed to create event tap - is Input Monitoring permission granted?");
        TapError::EventTapCreation
    })?;

    let run_loop_source = tap
        .mach_port
        .create_runloop_source(0)
        .map_err(|_| TapError::RunLoopSource)?;
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    tap.enable();
    (*emit)(MonitorToken::Started);
    info!("event tap created and enabled");

    CFRunLoop::run_current();

    if disabled.get() {
        return Err(TapError::Disabled);
    }
    Ok(())
}

#[cfg(not(target_os = "macos"))]
pub fn run_key_tap<F>(_emit: F) -> Result<(), TapError>
where
    F: Fn(MonitorToken) + 'static,
{
    Err(TapError::Unsupported)
}
