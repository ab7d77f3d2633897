//! Turning a captured hit zone into per-lane presence signals.

pub mod color;
pub mod lanes;
pub mod mask;

pub use color::{ColorRange, Hsv, extract_mask};
pub use lanes::{LaneGeometry, LaneSample, Region, sample_lanes};
pub use mask::BoolMask;
