//! The bot proper: per-lane tap/hold machines and the loop that drives them.

pub mod calibrate;
pub mod clock;
pub mod driver;
pub mod lane;
pub mod overlay;

pub use clock::MonotonicClock;
pub use driver::{BotSettings, PollLoop};
pub use lane::LaneTiming;
pub use overlay::DebugOverlay;
