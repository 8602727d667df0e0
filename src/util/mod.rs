//! Small host-side utilities.

/// Frame clock feeding the kernel's `time`.
pub mod frame_timing;
