//! Camera rig: a perspective pose plus an orbit controller that owns it.
//!
//! # Invariants
//! - The pose changes only in `OrbitController::tick` and, for the aspect
//!   ratio alone, on resize.
//! - After every tick the camera-to-target distance and the polar angle lie
//!   inside the configured limits.

mod orbit;
mod pose;

pub use orbit::{ControllerLimits, OrbitController};
pub use pose::CameraPose;
