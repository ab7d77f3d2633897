//! Debug view of what the bot sees, written to disk as a PNG every few cycles.
//!
//! Purely observational: it reads the same frame and mask the lanes were fed
//! and never touches lane state.

use crate::bot::lane::{LanePhase, LaneState};
use crate::vision::{BoolMask, LaneGeometry};
use image::{Rgb, RgbImage};
use log::{info, warn};
use std::path::PathBuf;

const HIT_LINE: Rgb<u8> = Rgb([255, 0, 0]);
const DIVIDER: Rgb<u8> = Rgb([0, 255, 0]);
const BAND_EDGE: Rgb<u8> = Rgb([255, 255, 0]);
const MATCH_TINT: Rgb<u8> = Rgb([255, 0, 255]);
const TAP_MARK: Rgb<u8> = Rgb([0, 200, 255]);
const HOLD_MARK: Rgb<u8> = Rgb([255, 140, 0]);

/// Height of the press indicator strip drawn at the top of each lane.
const MARK_HEIGHT: u32 = 6;

pub struct DebugOverlay {
    path: PathBuf,
    every: u32,
    seen: u32,
    written: u32,
}

impl DebugOverlay {
    pub fn new(path: impl Into<PathBuf>, every: u32) -> Self {
        let path = path.into();
        info!("Debug overlay enabled, writing {} every {every} cycles", path.display());
        Self {
            path,
            every: every.max(1),
            seen: 0,
            written: 0,
        }
    }

    pub const fn written(&self) -> u32 {
        self.written
    }

    pub fn observe(
        &mut self,
        frame: &RgbImage,
        mask: &BoolMask,
        geometry: &LaneGeometry,
        lanes: &[LaneState],
    ) {
        self.seen = self.seen.wrapping_add(1);
        if self.seen % self.every != 0 {
            return;
        }
        let view = render(frame, mask, geometry, lanes);
        match view.save(&self.path) {
            Ok(()) => self.written += 1,
            Err(e) => warn!("Failed to write debug overlay {}: {e}", self.path.display()),
        }
    }
}

#[inline(always)]
fn hline(img: &mut RgbImage, y: u32, thickness: u32, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    for yy in y..(y + thickness).min(h) {
        for x in 0..w {
            img.put_pixel(x, yy, color);
        }
    }
}

#[inline(always)]
fn vline(img: &mut RgbImage, x: u32, thickness: u32, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    for xx in x..(x + thickness).min(w) {
        for y in 0..h {
            img.put_pixel(xx, y, color);
        }
    }
}

/// Frame with matches tinted, lane dividers, the trigger band edge, the hit
/// line, and a press marker per lane.
pub fn render(
    frame: &RgbImage,
    mask: &BoolMask,
    geometry: &LaneGeometry,
    lanes: &[LaneState],
) -> RgbImage {
    let mut img = frame.clone();
    let (w, h) = img.dimensions();

    for (x, y, px) in img.enumerate_pixels_mut() {
        if mask.get(x, y) {
            for c in 0..3 {
                px.0[c] = ((u16::from(px.0[c]) + u16::from(MATCH_TINT.0[c])) / 2) as u8;
            }
        }
    }

    let band = geometry.band_rows();
    if band.start > 0 {
        hline(&mut img, band.start, 1, BAND_EDGE);
    }
    hline(&mut img, h.saturating_sub(5), 3, HIT_LINE);
    for lane in 1..geometry.lane_count() {
        vline(&mut img, geometry.lane_columns(lane).start, 2, DIVIDER);
    }

    for (i, state) in lanes.iter().enumerate().take(geometry.lane_count()) {
        let color = match state.phase() {
            LanePhase::Idle => continue,
            LanePhase::PressedTap => TAP_MARK,
            LanePhase::PressedHold => HOLD_MARK,
        };
        let cols = geometry.lane_columns(i);
        for y in 0..MARK_HEIGHT.min(h) {
            for x in cols.clone().filter(|&x| x < w) {
                img.put_pixel(x, y, color);
            }
        }
        if let Some(row) = state.tail_row.filter(|&r| r < h) {
            for x in cols.filter(|&x| x < w) {
                img.put_pixel(x, row, color);
            }
        }
    }
    img
}
