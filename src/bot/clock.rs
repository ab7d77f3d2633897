use std::time::Instant;

/// Fractional milliseconds on a monotonic timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Timestamp(f64);

impl Timestamp {
    #[cfg(test)]
    pub const ZERO: Self = Self(0.0);

    #[inline(always)]
    pub const fn from_millis(ms: f64) -> Self {
        Self(ms)
    }

    #[inline(always)]
    pub const fn as_millis(self) -> f64 {
        self.0
    }

    /// Milliseconds from `earlier` to `self`, never negative. A regressed or
    /// NaN reading counts as no time having passed.
    #[inline(always)]
    pub fn millis_since(self, earlier: Self) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}ms", self.0)
    }
}

pub trait Clock {
    fn now(&mut self) -> Timestamp;
}

/// Milliseconds elapsed since the clock was created.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline(always)]
    fn now(&mut self) -> Timestamp {
        Timestamp::from_millis(self.origin.elapsed().as_secs_f64() * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, MonotonicClock, Timestamp};

    #[test]
    fn elapsed_is_clamped_at_zero() {
        let later = Timestamp::from_millis(10.0);
        let earlier = Timestamp::from_millis(4.5);
        assert!((later.millis_since(earlier) - 5.5).abs() < 1e-9);
        assert_eq!(earlier.millis_since(later), 0.0);
        assert_eq!(Timestamp::from_millis(f64::NAN).millis_since(earlier), 0.0);
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let mut clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a, "{b} came before {a}");
    }
}
