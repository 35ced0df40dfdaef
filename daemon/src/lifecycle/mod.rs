//! Process lifecycle: signals and the shutdown flag

mod shutdown;

pub use shutdown::{ShutdownFlag, ShutdownSignal};
