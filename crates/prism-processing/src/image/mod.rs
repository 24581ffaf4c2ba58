//! Image operations used by the derivative engine

pub mod resize;

pub use resize::{resize_to_width, shrink_to_width};
