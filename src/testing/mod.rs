//! Testing utilities for framereel
//!
//! Synthetic render surfaces so recordings can be exercised without a GPU
//! or a window.

pub mod synthetic_data;

pub use synthetic_data::{synthetic_raw_frame, GradientSurface, SolidSurface};
