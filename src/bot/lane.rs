//! Per-lane tap/hold detection.
//!
//! Every note starts out as a tap the moment color reaches the trigger band.
//! If the color is still there once `tap_hold_threshold_ms` has passed since
//! the press, the note is reclassified as a hold and the key simply stays
//! down. Releases are timed from the last cycle that saw color, so a single
//! dropped detection frame does not let go of the key.
//!
//! ```text
//!            present                    present && held > threshold
//!   Idle ─────────────▶ PressedTap ────────────────────────────▶ PressedHold
//!    ▲                      │                                        │
//!    │   absent > tap delay │                absent > hold grace     │
//!    └──────────────────────┴────────────────────────────────────────┘
//! ```
//!
//! All comparisons are strict: landing exactly on a threshold does not
//! transition yet.

use crate::bot::clock::Timestamp;
use crate::vision::LaneSample;
use log::debug;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneTiming {
    /// Continuous presence after which a pressed note counts as a hold.
    pub tap_hold_threshold_ms: f64,
    /// Absence tolerated before a hold is let go.
    pub hold_release_grace_ms: f64,
    /// Absence after which a tap is let go.
    pub tap_release_delay_ms: f64,
}

impl Default for LaneTiming {
    fn default() -> Self {
        Self {
            tap_hold_threshold_ms: 100.0,
            hold_release_grace_ms: 1.0,
            tap_release_delay_ms: 0.2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoteKind {
    Tap,
    Hold,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LanePhase {
    Idle,
    PressedTap,
    PressedHold,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCommand {
    Press,
    Release,
}

/// What a single step did to the lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneEvent {
    Pressed,
    BecameHold,
    Released(NoteKind),
}

impl LaneEvent {
    #[inline(always)]
    pub const fn key_command(self) -> Option<KeyCommand> {
        match self {
            Self::Pressed => Some(KeyCommand::Press),
            Self::BecameHold => None,
            Self::Released(_) => Some(KeyCommand::Release),
        }
    }
}

/// Mutable record for one lane. `is_hold` only means anything while `key_down`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LaneState {
    pub key_down: bool,
    pub press_time: Timestamp,
    pub is_hold: bool,
    pub last_seen: Timestamp,
    /// Lowest matching row from the most recent cycle that saw color.
    pub tail_row: Option<u32>,
}

impl LaneState {
    #[inline(always)]
    pub const fn phase(&self) -> LanePhase {
        match (self.key_down, self.is_hold) {
            (false, _) => LanePhase::Idle,
            (true, false) => LanePhase::PressedTap,
            (true, true) => LanePhase::PressedHold,
        }
    }

    #[inline(always)]
    pub const fn note_kind(&self) -> Option<NoteKind> {
        match self.phase() {
            LanePhase::Idle => None,
            LanePhase::PressedTap => Some(NoteKind::Tap),
            LanePhase::PressedHold => Some(NoteKind::Hold),
        }
    }
}

/// Pure transition function: the next state and what happened, given one
/// cycle's sample and the cycle's timestamp.
pub fn transition(
    state: &LaneState,
    timing: &LaneTiming,
    sample: LaneSample,
    now: Timestamp,
) -> (LaneState, Option<LaneEvent>) {
    let mut next = *state;

    if sample.present {
        next.last_seen = now;
        next.tail_row = sample.bottom_most_row;

        if !state.key_down {
            next.key_down = true;
            next.press_time = now;
            next.is_hold = false;
            return (next, Some(LaneEvent::Pressed));
        }
        if !state.is_hold && now.millis_since(state.press_time) > timing.tap_hold_threshold_ms {
            next.is_hold = true;
            return (next, Some(LaneEvent::BecameHold));
        }
        return (next, None);
    }

    if !state.key_down {
        return (next, None);
    }

    let absent_for = now.millis_since(state.last_seen);
    let (kind, limit) = if state.is_hold {
        (NoteKind::Hold, timing.hold_release_grace_ms)
    } else {
        (NoteKind::Tap, timing.tap_release_delay_ms)
    };
    if absent_for > limit {
        next.key_down = false;
        next.is_hold = false;
        return (next, Some(LaneEvent::Released(kind)));
    }
    (next, None)
}

/// One lane's machine: its state plus the shared timing constants.
#[derive(Clone, Debug)]
pub struct LaneMachine {
    lane: usize,
    timing: LaneTiming,
    state: LaneState,
}

impl LaneMachine {
    pub fn new(lane: usize, timing: LaneTiming) -> Self {
        Self {
            lane,
            timing,
            state: LaneState::default(),
        }
    }

    #[inline(always)]
    pub const fn state(&self) -> &LaneState {
        &self.state
    }

    pub fn step(&mut self, sample: LaneSample, now: Timestamp) -> Option<LaneEvent> {
        let (next, event) = transition(&self.state, &self.timing, sample, now);
        self.state = next;
        if let Some(ev) = event {
            match ev {
                LaneEvent::Pressed => debug!("lane {} press at {now}", self.lane),
                LaneEvent::BecameHold => debug!(
                    "lane {} reclassified as hold at {now} ({:.1}ms after press)",
                    self.lane,
                    now.millis_since(self.state.press_time)
                ),
                LaneEvent::Released(kind) => debug!(
                    "lane {} {kind:?} release at {now} ({:.1}ms after last seen)",
                    self.lane,
                    now.millis_since(self.state.last_seen)
                ),
            }
        }
        event
    }

    /// Back to idle without a release, for a press the keyboard never took.
    /// The next sighting presses again.
    pub fn abandon(&mut self) {
        debug!("lane {} press abandoned", self.lane);
        self.state = LaneState::default();
    }

    /// Drops the key regardless of timing. Returns `None` when already idle,
    /// so repeated calls never produce a second release.
    pub fn force_release(&mut self) -> Option<LaneEvent> {
        let kind = self.state.note_kind()?;
        self.state.key_down = false;
        self.state.is_hold = false;
        debug!("lane {} forced {kind:?} release", self.lane);
        Some(LaneEvent::Released(kind))
    }
}
