use crate::error::{BotError, Result};
use crate::vision::mask::BoolMask;
use image::RgbImage;

/// Hue is stored in half-degrees (0..=180) so the whole triple fits in bytes,
/// matching the 8-bit HSV convention most color pickers report.
pub const HUE_MAX: u8 = 180;
pub const SAT_MAX: u8 = 255;
pub const VAL_MAX: u8 = 255;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    #[inline(always)]
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }

    /// Clamps hue into its half-degree domain; saturation and value already span a byte.
    #[inline(always)]
    pub fn clamped(self) -> Self {
        Self {
            h: self.h.min(HUE_MAX),
            s: self.s.min(SAT_MAX),
            v: self.v.min(VAL_MAX),
        }
    }

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = f32::from(max - min);
        if max == 0 || delta == 0.0 {
            return Self::new(0, 0, max);
        }

        let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
        let mut degrees = if max == r {
            60.0 * (gf - bf) / delta
        } else if max == g {
            60.0 * (bf - rf) / delta + 120.0
        } else {
            60.0 * (rf - gf) / delta + 240.0
        };
        if degrees < 0.0 {
            degrees += 360.0;
        }

        let h = ((degrees / 2.0).round() as u16 % u16::from(HUE_MAX)) as u8;
        let s = (delta * 255.0 / f32::from(max)).round() as u8;
        Self::new(h, s, max)
    }
}

/// Inclusive per-channel HSV bounds.
///
/// Both corners are clamped to the channel domains on construction, and the
/// upper corner is never allowed to sit below the lower one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorRange {
    lower: Hsv,
    upper: Hsv,
}

impl ColorRange {
    pub fn new(lower: Hsv, upper: Hsv) -> Self {
        let lower = lower.clamped();
        let upper = upper.clamped();
        Self {
            lower,
            upper: Hsv::new(
                upper.h.max(lower.h),
                upper.s.max(lower.s),
                upper.v.max(lower.v),
            ),
        }
    }

    /// A box of `±tolerance` around `center`, saturating at the channel edges.
    pub fn around(center: Hsv, tolerance: Hsv) -> Self {
        let center = center.clamped();
        Self::new(
            Hsv::new(
                center.h.saturating_sub(tolerance.h),
                center.s.saturating_sub(tolerance.s),
                center.v.saturating_sub(tolerance.v),
            ),
            Hsv::new(
                center.h.saturating_add(tolerance.h).min(HUE_MAX),
                center.s.saturating_add(tolerance.s),
                center.v.saturating_add(tolerance.v),
            ),
        )
    }

    #[cfg(test)]
    pub const fn lower(&self) -> Hsv {
        self.lower
    }

    #[cfg(test)]
    pub const fn upper(&self) -> Hsv {
        self.upper
    }

    #[inline(always)]
    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.lower.h..=self.upper.h).contains(&hsv.h)
            && (self.lower.s..=self.upper.s).contains(&hsv.s)
            && (self.lower.v..=self.upper.v).contains(&hsv.v)
    }
}

impl std::fmt::Display for ColorRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "H({}-{}), S({}-{}), V({}-{})",
            self.lower.h, self.upper.h, self.lower.s, self.upper.s, self.lower.v, self.upper.v
        )
    }
}

/// Marks every pixel of `frame` whose HSV conversion lies inside `range`.
pub fn extract_mask(frame: &RgbImage, range: &ColorRange) -> Result<BoolMask> {
    let (width, height) = frame.dimensions();
    let expected = width as usize * height as usize * 3;
    if frame.as_raw().len() < expected {
        return Err(BotError::InvalidInput(format!(
            "pixel buffer holds {} bytes, {width}x{height} RGB needs {expected}",
            frame.as_raw().len()
        )));
    }
    let mut mask = BoolMask::new(width, height)?;
    for (x, y, px) in frame.enumerate_pixels() {
        let [r, g, b] = px.0;
        if range.contains(Hsv::from_rgb(r, g, b)) {
            mask.set(x, y, true);
        }
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::{ColorRange, Hsv, extract_mask};
    use crate::error::BotError;
    use image::{Rgb, RgbImage};

    #[test]
    fn primary_colors_convert_to_half_degree_hues() {
        assert_eq!(Hsv::from_rgb(255, 0, 0), Hsv::new(0, 255, 255));
        assert_eq!(Hsv::from_rgb(0, 255, 0), Hsv::new(60, 255, 255));
        assert_eq!(Hsv::from_rgb(0, 0, 255), Hsv::new(120, 255, 255));
        assert_eq!(Hsv::from_rgb(0, 0, 0), Hsv::new(0, 0, 0));
        assert_eq!(Hsv::from_rgb(128, 128, 128), Hsv::new(0, 0, 128));
    }

    #[test]
    fn hue_just_below_red_wraps_into_domain() {
        // 359.x degrees rounds to 180 half-degrees, which is red again.
        let hsv = Hsv::from_rgb(255, 0, 1);
        assert!(hsv.h < 180, "hue must stay inside 0..180; got {}", hsv.h);
    }

    #[test]
    fn around_clamps_at_channel_edges() {
        let range = ColorRange::around(Hsv::new(178, 240, 10), Hsv::new(5, 30, 30));
        assert_eq!(range.lower(), Hsv::new(173, 210, 0));
        assert_eq!(range.upper(), Hsv::new(180, 255, 40));
    }

    #[test]
    fn inverted_bounds_collapse_instead_of_wrapping() {
        let range = ColorRange::new(Hsv::new(200, 100, 50), Hsv::new(10, 90, 60));
        assert_eq!(range.lower().h, 180, "lower hue is clamped first");
        assert!(range.upper().h >= range.lower().h);
        assert!(range.upper().s >= range.lower().s);
        assert_eq!(range.upper().v, 60);
    }

    #[test]
    fn mask_marks_only_pixels_inside_the_range() {
        let mut frame = RgbImage::from_pixel(4, 3, Rgb([20, 20, 20]));
        frame.put_pixel(1, 2, Rgb([250, 10, 10]));
        frame.put_pixel(3, 0, Rgb([10, 250, 10]));
        let red = ColorRange::around(Hsv::from_rgb(250, 10, 10), Hsv::new(5, 30, 30));

        let mask = extract_mask(&frame, &red).expect("non-empty frame");
        assert_eq!((mask.width(), mask.height()), (4, 3));
        assert!(mask.get(1, 2));
        assert!(!mask.get(3, 0), "green must not match a red range");
        assert_eq!(mask.count(), 1);
    }

    #[test]
    fn empty_frame_is_invalid_input() {
        let frame = RgbImage::new(0, 0);
        let range = ColorRange::new(Hsv::new(0, 0, 0), Hsv::new(180, 255, 255));
        assert!(matches!(
            extract_mask(&frame, &range),
            Err(BotError::InvalidInput(_))
        ));
    }
}
