//! Per-feature behavioral detectors
//!
//! Each detector consumes landmarks frame by frame and keeps bounded rolling
//! windows plus unbounded session counters.

pub mod blink;
pub mod expression;
pub mod gaze;
pub mod gesture;
pub mod hand;
pub mod head;

pub use blink::BlinkDetector;
pub use expression::ExpressionTracker;
pub use gaze::{EyeContactCounter, GazeEstimator, GazeReading};
pub use gesture::{GestureDetector, GestureKind};
pub use hand::{HandMovementTracker, HandSeverity, HandWindowMetrics};
pub use head::{HeadMovementTracker, HeadWindowMetrics};
