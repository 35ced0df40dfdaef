//! Native key monitor: wire protocol and process supervision
//!
//! The monitor runs as a separate process because the event tap needs
//! Input Monitoring permission. The supervisor owns that process and
//! turns its output into typed key events.

mod protocol;
mod supervisor;

pub use protocol::{KeyEvent, KeyEventKind, MonitorToken};
pub use supervisor::{
    resolve_monitor_binary, MonitorCommand, MonitorStatus, Supervisor, SupervisorError,
    SupervisorEvent, SupervisorHandle,
};
