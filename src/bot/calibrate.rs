//! Non-interactive calibration: turning a sampled color and a selected
//! rectangle into the `ColorRange` and `Region` the poll loop runs on.

use crate::core::capture::RegionCapture;
use crate::error::{BotError, Result};
use crate::vision::{ColorRange, Hsv, Region};
use log::{info, warn};

/// Default `±` per channel around a sampled note color.
pub const DEFAULT_TOLERANCE: Hsv = Hsv::new(5, 30, 30);

/// Rectangle relative to the game window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Selection {
    /// Normalises a drag between two corners, in either direction.
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Result<Self> {
        let (x1, x2) = (a.0.min(b.0), a.0.max(b.0));
        let (y1, y2) = (a.1.min(b.1), a.1.max(b.1));
        let sel = Self {
            x: x1,
            y: y1,
            width: x1.abs_diff(x2),
            height: y1.abs_diff(y2),
        };
        if sel.width == 0 || sel.height == 0 {
            return Err(BotError::InvalidInput(format!(
                "selection from {a:?} to {b:?} is empty"
            )));
        }
        Ok(sel)
    }
}

/// Absolute hit zone from the window's screen offset plus a window-relative selection.
pub fn hit_zone(window_left: i32, window_top: i32, selection: Selection) -> Result<Region> {
    Region::new(
        window_left.saturating_add(selection.x),
        window_top.saturating_add(selection.y),
        selection.width,
        selection.height,
    )
}

pub fn range_from_sample(sample: Hsv, tolerance: Hsv) -> ColorRange {
    let range = ColorRange::around(sample, tolerance);
    info!(
        "Picked color H={}, S={}, V={}; using HSV range {range}",
        sample.h, sample.s, sample.v
    );
    range
}

/// Reads the HSV color of a single absolute screen pixel.
pub fn sample_screen<C: RegionCapture + ?Sized>(capture: &mut C, x: i32, y: i32) -> Result<Hsv> {
    let frame = capture.capture(&Region::new(x, y, 1, 1)?)?;
    let px = frame
        .get_pixel_checked(0, 0)
        .ok_or_else(|| BotError::Capture(format!("empty capture at ({x}, {y})")))?;
    let [r, g, b] = px.0;
    Ok(Hsv::from_rgb(r, g, b))
}

/// Grabs the hit zone once before any key is touched. A transient capture
/// failure only warns, since the poll loop retries every cycle; a frame of
/// the wrong size or an unreachable rectangle is fatal.
pub fn check_region<C: RegionCapture + ?Sized>(capture: &mut C, region: &Region) -> Result<()> {
    match capture.capture(region) {
        Ok(frame) if frame.dimensions() == (region.width, region.height) => Ok(()),
        Ok(frame) => Err(BotError::InvalidInput(format!(
            "captured {}x{} for region {region}",
            frame.width(),
            frame.height()
        ))),
        Err(BotError::Capture(e)) => {
            warn!("First capture of {region} failed ({e}); polling will keep retrying");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_TOLERANCE, Selection, check_region, hit_zone, range_from_sample, sample_screen,
    };
    use crate::error::BotError;
    use crate::core::capture::testing::ScriptedCapture;
    use crate::vision::{Hsv, Region};
    use image::{Rgb, RgbImage};

    #[test]
    fn corners_normalise_in_any_drag_direction() {
        let forward = Selection::from_corners((10, 20), (110, 220)).unwrap();
        let backward = Selection::from_corners((110, 220), (10, 20)).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(
            forward,
            Selection {
                x: 10,
                y: 20,
                width: 100,
                height: 200
            }
        );
        assert!(Selection::from_corners((5, 5), (5, 40)).is_err());
    }

    #[test]
    fn hit_zone_adds_window_offset() {
        let sel = Selection::from_corners((30, 400), (430, 1000)).unwrap();
        assert_eq!(
            hit_zone(-1920, 40, sel).unwrap(),
            Region::new(-1890, 440, 400, 600).unwrap()
        );
    }

    #[test]
    fn sampled_range_uses_tolerance() {
        let range = range_from_sample(Hsv::new(2, 250, 100), DEFAULT_TOLERANCE);
        assert_eq!(range.lower(), Hsv::new(0, 220, 70));
        assert_eq!(range.upper(), Hsv::new(7, 255, 130));
    }

    #[test]
    fn sample_reads_the_captured_pixel() {
        let mut capture = ScriptedCapture::new([Ok(RgbImage::from_pixel(1, 1, Rgb([0, 0, 255])))]);
        let hsv = sample_screen(&mut capture, 640, 360).unwrap();
        assert_eq!(hsv, Hsv::new(120, 255, 255));
        assert_eq!(capture.calls, 1);
    }

    #[test]
    fn transient_capture_failure_does_not_stop_startup() {
        let region = Region::new(0, 0, 4, 3).unwrap();
        let mut flaky = ScriptedCapture::new([Err(BotError::Capture("device busy".into()))]);
        assert!(check_region(&mut flaky, &region).is_ok());

        let mut fine = ScriptedCapture::new([Ok(RgbImage::new(4, 3))]);
        assert!(check_region(&mut fine, &region).is_ok());

        let mut wrong = ScriptedCapture::new([Ok(RgbImage::new(2, 2))]);
        assert!(matches!(
            check_region(&mut wrong, &region),
            Err(BotError::InvalidInput(_))
        ));
    }
}
