use thiserror::Error;

/// Everything the capture → detect → key pipeline can report.
///
/// Only startup code lets these escape to `main`; inside the poll loop they are
/// logged and the next cycle runs as usual.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BotError {
    /// Zero or inconsistent dimensions on a region, buffer or lane layout.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The screen region could not be read this cycle.
    #[error("capture failed: {0}")]
    Capture(String),
    /// The host clock went backwards between two polls.
    #[error("clock went backwards: {now_ms:.3}ms after {previous_ms:.3}ms")]
    ClockRegression { previous_ms: f64, now_ms: f64 },
    /// The keyboard backend rejected a press or release.
    #[error("key output failed: {0}")]
    KeyOutput(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, BotError>;
