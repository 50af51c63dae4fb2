//! Input: raw pointer gestures mapped to camera actions.
//!
//! # Invariants
//! - The camera consumes actions, never raw window events.
//! - Deltas are in logical pixels; wheel deltas in notches (positive = away from the user).

pub mod action;

pub use action::{CameraAction, PointerButton, PointerTracker};
