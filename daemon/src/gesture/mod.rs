//! Double-copy gesture: detection and hand-off to translation

mod detector;
mod trigger;

pub use detector::{DoubleTapDetector, GestureFired, GestureState};
pub use trigger::forward_gestures;
