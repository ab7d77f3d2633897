use crate::error::{BotError, Result};
use std::ops::Range;

/// Row-major boolean raster, one cell per captured pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoolMask {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl BoolMask {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BotError::InvalidInput(format!(
                "mask dimensions must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        })
    }

    #[cfg(test)]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Result<Self> {
        let mut mask = Self::new(width, height)?;
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    mask.set(x, y, true);
                }
            }
        }
        Ok(mask)
    }

    #[inline(always)]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline(always)]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Out-of-bounds reads are `false`.
    #[inline(always)]
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.cells[self.index(x, y)]
    }

    #[inline(always)]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.cells[i] = value;
        }
    }

    #[cfg(test)]
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Highest row index inside the window holding a set cell.
    pub fn bottom_most_row_in(&self, columns: Range<u32>, rows: Range<u32>) -> Option<u32> {
        let columns = columns.start.min(self.width)..columns.end.min(self.width);
        let rows = rows.start.min(self.height)..rows.end.min(self.height);
        if columns.is_empty() {
            return None;
        }
        rows.rev().find(|&y| {
            let start = self.index(columns.start, y);
            let end = start + columns.len();
            self.cells[start..end].iter().any(|&c| c)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::BoolMask;
    use crate::error::BotError;

    #[test]
    fn zero_sized_mask_is_rejected() {
        assert!(matches!(
            BoolMask::new(0, 10),
            Err(BotError::InvalidInput(_))
        ));
        assert!(matches!(
            BoolMask::new(10, 0),
            Err(BotError::InvalidInput(_))
        ));
    }

    #[test]
    fn bottom_most_row_scans_only_the_window() {
        let mask = BoolMask::from_fn(8, 8, |x, y| (x == 1 && y == 6) || (x == 5 && y == 7)).unwrap();
        assert_eq!(mask.bottom_most_row_in(0..4, 0..8), Some(6));
        assert_eq!(mask.bottom_most_row_in(4..8, 0..8), Some(7));
        assert_eq!(mask.bottom_most_row_in(0..4, 0..6), None);
        assert_eq!(mask.bottom_most_row_in(2..4, 0..8), None);
        assert_eq!(
            mask.bottom_most_row_in(3..3, 0..8),
            None,
            "empty column range never matches"
        );
        assert_eq!(mask.bottom_most_row_in(6..20, 0..20), None, "window is clipped to the mask");
    }
}
