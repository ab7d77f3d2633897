//! The poll loop: capture → mask → lanes → key events, as fast as capture
//! allows, until cancelled.
//!
//! Everything inside a cycle runs sequentially on the caller's thread, and
//! every lane sees the same `now`, sampled once at the top of the cycle.

use crate::bot::clock::{Clock, Timestamp};
use crate::bot::lane::{KeyCommand, LaneEvent, LaneMachine, LaneState, LaneTiming, NoteKind};
use crate::bot::overlay::DebugOverlay;
use crate::core::capture::RegionCapture;
use crate::core::keys::{HeldKeys, KeySink, VirtualKey};
use crate::core::signal::CancelToken;
use crate::error::{BotError, Result};
use crate::vision::{ColorRange, LaneGeometry, Region, extract_mask, sample_lanes};
use log::{debug, error, info, trace, warn};

/// Consecutive capture failures between repeated warnings.
const CAPTURE_WARN_EVERY: u64 = 100;
/// Rounds of retrying rejected releases at shutdown.
const RELEASE_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug)]
pub struct BotSettings {
    pub region: Region,
    pub range: ColorRange,
    pub geometry: LaneGeometry,
    pub timing: LaneTiming,
    pub keys: Vec<VirtualKey>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub presses: u64,
    pub holds: u64,
    pub releases: u64,
    pub forced_releases: u64,
    pub capture_failures: u64,
    pub invalid_frames: u64,
    pub key_failures: u64,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} cycles, {} presses ({} holds), {} releases ({} forced), {} capture failures, {} invalid frames, {} key failures",
            self.cycles,
            self.presses,
            self.holds,
            self.releases,
            self.forced_releases,
            self.capture_failures,
            self.invalid_frames,
            self.key_failures
        )
    }
}

pub struct PollLoop<C, K, T> {
    region: Region,
    range: ColorRange,
    geometry: LaneGeometry,
    lanes: Vec<LaneMachine>,
    lane_keys: Vec<VirtualKey>,
    capture: C,
    keys: HeldKeys<K>,
    clock: T,
    overlay: Option<DebugOverlay>,
    last_now: Option<Timestamp>,
    capture_streak: u64,
    stats: RunStats,
}

impl<C: RegionCapture, K: KeySink, T: Clock> PollLoop<C, K, T> {
    pub fn new(settings: BotSettings, capture: C, keys: K, clock: T) -> Result<Self> {
        let BotSettings {
            region,
            range,
            geometry,
            timing,
            keys: lane_keys,
        } = settings;
        if geometry.width() != region.width || geometry.height() != region.height {
            return Err(BotError::InvalidInput(format!(
                "lane geometry {}x{} does not match region {region}",
                geometry.width(),
                geometry.height()
            )));
        }
        if lane_keys.len() != geometry.lane_count() {
            return Err(BotError::InvalidInput(format!(
                "{} lanes but {} keys",
                geometry.lane_count(),
                lane_keys.len()
            )));
        }
        let lanes = (0..geometry.lane_count())
            .map(|i| LaneMachine::new(i, timing))
            .collect();
        Ok(Self {
            region,
            range,
            geometry,
            lanes,
            lane_keys,
            capture,
            keys: HeldKeys::new(keys),
            clock,
            overlay: None,
            last_now: None,
            capture_streak: 0,
            stats: RunStats::default(),
        })
    }

    pub fn with_overlay(mut self, overlay: DebugOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    #[cfg(test)]
    pub fn lane_states(&self) -> impl Iterator<Item = &LaneState> {
        self.lanes.iter().map(LaneMachine::state)
    }

    /// Runs cycles until `cancel` fires, then releases every pressed lane
    /// before returning.
    pub fn run(&mut self, cancel: &CancelToken) -> RunStats {
        info!(
            "Polling {} with {} lanes ({}px wide), trigger band {} rows, color {}",
            self.region,
            self.geometry.lane_count(),
            self.geometry.lane_width(),
            self.geometry.band_rows().len(),
            self.range
        );
        while !cancel.is_cancelled() {
            match self.cycle() {
                Ok(()) => {}
                Err(BotError::Capture(e)) => self.note_capture_failure(&e),
                Err(e @ BotError::InvalidInput(_)) => {
                    self.stats.invalid_frames += 1;
                    warn!("Skipping cycle: {e}");
                }
                Err(e) => warn!("Skipping cycle: {e}"),
            }
        }
        info!("Stop requested, releasing held keys.");
        self.release_all();
        if let Some(overlay) = &self.overlay {
            info!("Wrote {} debug overlays", overlay.written());
        }
        self.stats
    }

    fn note_capture_failure(&mut self, msg: &str) {
        self.stats.capture_failures += 1;
        self.capture_streak += 1;
        if self.capture_streak == 1 {
            warn!("Capture failed: {msg}");
        } else if self.capture_streak % CAPTURE_WARN_EVERY == 0 {
            warn!(
                "Capture still failing after {} attempts: {msg}",
                self.capture_streak
            );
        }
    }

    /// Samples the clock, clamping any regression to the previous reading so
    /// lanes never see time run backwards.
    fn tick(&mut self) -> Timestamp {
        let now = self.clock.now();
        match self.last_now {
            Some(prev) if now < prev => {
                debug!(
                    "{}",
                    BotError::ClockRegression {
                        previous_ms: prev.as_millis(),
                        now_ms: now.as_millis(),
                    }
                );
                prev
            }
            _ => {
                self.last_now = Some(now);
                now
            }
        }
    }

    /// One capture → detect → act pass.
    pub fn cycle(&mut self) -> Result<()> {
        let now = self.tick();
        self.stats.cycles += 1;

        let frame = self.capture.capture(&self.region)?;
        if self.capture_streak > 0 {
            info!("Capture recovered after {} failures", self.capture_streak);
            self.capture_streak = 0;
        }
        if frame.dimensions() != (self.region.width, self.region.height) {
            return Err(BotError::InvalidInput(format!(
                "captured {}x{} for region {}",
                frame.width(),
                frame.height(),
                self.region
            )));
        }
        let mask = extract_mask(&frame, &self.range)?;
        let samples = sample_lanes(&mask, &self.geometry)?;
        trace!("cycle {} at {now}: {samples:?}", self.stats.cycles);

        for (i, sample) in samples.into_iter().enumerate() {
            if let Some(event) = self.lanes[i].step(sample, now) {
                self.apply(i, event);
            }
        }

        if let Some(overlay) = self.overlay.as_mut() {
            let states: Vec<LaneState> = self.lanes.iter().map(|l| *l.state()).collect();
            overlay.observe(&frame, &mask, &self.geometry, &states);
        }
        Ok(())
    }

    fn apply(&mut self, lane: usize, event: LaneEvent) {
        match event {
            LaneEvent::Pressed => self.stats.presses += 1,
            LaneEvent::BecameHold => self.stats.holds += 1,
            LaneEvent::Released(_) => self.stats.releases += 1,
        }
        let key = self.lane_keys[lane];
        let sent = match event.key_command() {
            Some(KeyCommand::Press) => self.keys.press(key),
            Some(KeyCommand::Release) => self.keys.release(key),
            None => Ok(()),
        };
        if let Err(e) = sent {
            self.stats.key_failures += 1;
            error!("Lane {lane} ({key}): {e}");
            if event == LaneEvent::Pressed {
                self.lanes[lane].abandon();
            }
        }
    }

    /// Releases every lane that is still down. Safe to call repeatedly; lanes
    /// already idle produce nothing. Returns the number of lanes released.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for i in 0..self.lanes.len() {
            if let Some(event @ LaneEvent::Released(kind)) = self.lanes[i].force_release() {
                self.stats.forced_releases += 1;
                if kind == NoteKind::Hold {
                    debug!("Lane {i} was mid-hold at shutdown");
                }
                self.apply(i, event);
                released += 1;
            }
        }
        for attempt in 1..=RELEASE_ATTEMPTS {
            if self.keys.held().is_empty() {
                break;
            }
            let late = self.keys.release_all();
            if late > 0 {
                warn!("Released {late} keys left down by earlier failures (attempt {attempt})");
            }
        }
        if !self.keys.held().is_empty() {
            error!(
                "Keys still down after {RELEASE_ATTEMPTS} release attempts: {:?}",
                self.keys.held()
            );
        }
        released
    }

    #[cfg(test)]
    pub fn into_parts(mut self) -> (C, K, RunStats) {
        self.release_all();
        let stats = self.stats;
        (self.capture, self.keys.into_inner(), stats)
    }
}
