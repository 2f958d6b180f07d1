//! Utility functions
//!
//! - `complex_ops`: elementwise kernels on complex buffers
//! - `memory`: human-readable byte counts for log messages

pub mod complex_ops;
pub mod memory;

pub use complex_ops::*;
pub use memory::format_bytes;
