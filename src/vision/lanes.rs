use crate::error::{BotError, Result};
use crate::vision::mask::BoolMask;
use std::ops::Range;

/// Absolute screen rectangle watched by the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BotError::InvalidInput(format!(
                "region must have a non-zero size, got {width}x{height}"
            )));
        }
        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.left, self.top
        )
    }
}

/// How a region is cut into lanes and where each lane's trigger band sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaneGeometry {
    width: u32,
    height: u32,
    lanes: usize,
    trigger_band_height: u32,
}

impl LaneGeometry {
    pub fn new(width: u32, height: u32, lanes: usize, trigger_band_height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BotError::InvalidInput(format!(
                "lane geometry needs a non-zero area, got {width}x{height}"
            )));
        }
        if lanes == 0 {
            return Err(BotError::InvalidInput("lane count must be at least 1".into()));
        }
        Ok(Self {
            width,
            height,
            lanes,
            trigger_band_height,
        })
    }

    pub fn for_region(region: &Region, lanes: usize, trigger_band_height: u32) -> Result<Self> {
        Self::new(region.width, region.height, lanes, trigger_band_height)
    }

    #[inline(always)]
    pub const fn lane_count(&self) -> usize {
        self.lanes
    }

    #[inline(always)]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Nominal lane width, `floor(width / lanes)`.
    #[inline(always)]
    pub const fn lane_width(&self) -> u32 {
        self.width / self.lanes as u32
    }

    /// Columns `[floor(i*W/N), floor((i+1)*W/N))`. Remainder pixels are spread
    /// across lanes instead of piling up in the last one.
    pub fn lane_columns(&self, lane: usize) -> Range<u32> {
        let w = u64::from(self.width);
        let n = self.lanes as u64;
        let i = lane.min(self.lanes) as u64;
        let start = i * w / n;
        let end = ((i + 1).min(n)) * w / n;
        start as u32..end as u32
    }

    /// The bottom `trigger_band_height` rows, or the whole region when it is shorter.
    #[inline(always)]
    pub const fn band_rows(&self) -> Range<u32> {
        self.height.saturating_sub(self.trigger_band_height)..self.height
    }

    /// Lane under screen column `x` (region-relative).
    pub fn lane_at(&self, x: u32) -> Option<usize> {
        (0..self.lanes).find(|&i| self.lane_columns(i).contains(&x))
    }
}

/// Per-cycle detection result for one lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LaneSample {
    pub present: bool,
    /// Region-relative row of the lowest matching pixel in the trigger band.
    pub bottom_most_row: Option<u32>,
}

impl LaneSample {
    pub const ABSENT: Self = Self {
        present: false,
        bottom_most_row: None,
    };

    #[inline(always)]
    pub const fn at_row(row: u32) -> Self {
        Self {
            present: true,
            bottom_most_row: Some(row),
        }
    }
}

/// A lane's trigger band, borrowed from the full-region mask.
#[derive(Clone, Debug)]
pub struct LaneView<'a> {
    mask: &'a BoolMask,
    pub columns: Range<u32>,
    pub rows: Range<u32>,
}

impl LaneView<'_> {
    pub fn sample(&self) -> LaneSample {
        match self
            .mask
            .bottom_most_row_in(self.columns.clone(), self.rows.clone())
        {
            Some(row) => LaneSample::at_row(row),
            None => LaneSample::ABSENT,
        }
    }
}

/// Splits `mask` into one trigger-band view per lane.
pub fn partition<'a>(mask: &'a BoolMask, geometry: &LaneGeometry) -> Result<Vec<LaneView<'a>>> {
    if mask.width() != geometry.width() || mask.height() != geometry.height() {
        return Err(BotError::InvalidInput(format!(
            "mask is {}x{} but lanes were laid out for {}x{}",
            mask.width(),
            mask.height(),
            geometry.width(),
            geometry.height()
        )));
    }
    let rows = geometry.band_rows();
    Ok((0..geometry.lane_count())
        .map(|lane| LaneView {
            mask,
            columns: geometry.lane_columns(lane),
            rows: rows.clone(),
        })
        .collect())
}

/// `partition` reduced to the presence signal the lane machines consume.
pub fn sample_lanes(mask: &BoolMask, geometry: &LaneGeometry) -> Result<Vec<LaneSample>> {
    Ok(partition(mask, geometry)?
        .iter()
        .map(LaneView::sample)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{LaneGeometry, LaneSample, Region, partition, sample_lanes};
    use crate::error::BotError;
    use crate::vision::mask::BoolMask;

    #[test]
    fn region_rejects_empty_rectangles() {
        assert!(Region::new(10, 10, 0, 5).is_err());
        assert!(Region::new(10, 10, 5, 0).is_err());
        assert!(Region::new(-1920, 0, 5, 5).is_ok(), "negative offsets are valid on multi-monitor desktops");
    }

    #[test]
    fn four_lanes_over_400_pixels_are_100_wide() {
        let region = Region::new(0, 0, 400, 600).unwrap();
        let geo = LaneGeometry::for_region(&region, 4, 60).unwrap();
        assert_eq!(geo.lane_width(), 100);
        assert_eq!(geo.lane_columns(0), 0..100);
        assert_eq!(geo.lane_columns(3), 300..400);
        assert_eq!(geo.band_rows(), 540..600);
        assert_eq!(geo.lane_at(250), Some(2));
    }

    #[test]
    fn uneven_width_spreads_remainder_and_covers_every_column() {
        let geo = LaneGeometry::new(10, 5, 3, 2).unwrap();
        let spans: Vec<_> = (0..3).map(|i| geo.lane_columns(i)).collect();
        assert_eq!(spans, vec![0..3, 3..6, 6..10]);
    }

    #[test]
    fn band_taller_than_region_uses_whole_height() {
        let geo = LaneGeometry::new(8, 20, 2, 60).unwrap();
        assert_eq!(geo.band_rows(), 0..20);
    }

    #[test]
    fn zero_lanes_is_invalid() {
        assert!(matches!(
            LaneGeometry::new(8, 8, 0, 4),
            Err(BotError::InvalidInput(_))
        ));
    }

    #[test]
    fn presence_is_limited_to_the_trigger_band() {
        // Lane 0 has color above the band only; lane 1 inside it at two rows.
        let mask = BoolMask::from_fn(8, 10, |x, y| {
            (x == 1 && y == 2) || (x == 5 && (y == 7 || y == 8))
        })
        .unwrap();
        let geo = LaneGeometry::new(8, 10, 2, 4).unwrap();

        let samples = sample_lanes(&mask, &geo).unwrap();
        assert_eq!(samples[0], LaneSample::ABSENT);
        assert_eq!(samples[1], LaneSample::at_row(8));

        let views = partition(&mask, &geo).unwrap();
        assert_eq!((views[1].columns.clone(), views[1].rows.clone()), (4..8, 6..10));
        assert_eq!(views[1].sample(), LaneSample::at_row(8));
        assert_eq!(mask.count(), 3, "partitioning leaves the mask untouched");
    }

    #[test]
    fn partition_is_deterministic() {
        let mask = BoolMask::from_fn(12, 6, |x, y| (x * 7 + y * 3) % 5 == 0).unwrap();
        let geo = LaneGeometry::new(12, 6, 4, 3).unwrap();
        assert_eq!(
            sample_lanes(&mask, &geo).unwrap(),
            sample_lanes(&mask, &geo).unwrap()
        );
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let mask = BoolMask::new(8, 8).unwrap();
        let geo = LaneGeometry::new(16, 8, 4, 4).unwrap();
        assert!(matches!(
            partition(&mask, &geo),
            Err(BotError::InvalidInput(_))
        ));
    }
}
