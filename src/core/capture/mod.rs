use crate::error::{BotError, Result};
use crate::vision::Region;
use image::RgbImage;

/// The screen-grab primitive: returns the pixels of one absolute rectangle.
pub trait RegionCapture {
    fn capture(&mut self, region: &Region) -> Result<RgbImage>;
}

impl<T: RegionCapture + ?Sized> RegionCapture for Box<T> {
    #[inline(always)]
    fn capture(&mut self, region: &Region) -> Result<RgbImage> {
        (**self).capture(region)
    }
}

/// Converts a 32-bit BGRX/BGRA raster (what both X11 and GDI hand back) into RGB.
/// `stride` is the byte length of one source row.
pub fn frame_from_bgrx(width: u32, height: u32, stride: usize, data: &[u8]) -> Result<RgbImage> {
    if width == 0 || height == 0 {
        return Err(BotError::InvalidInput(format!(
            "captured frame is {width}x{height}"
        )));
    }
    let row_bytes = width as usize * 4;
    if stride < row_bytes || data.len() < stride * (height as usize - 1) + row_bytes {
        return Err(BotError::InvalidInput(format!(
            "captured buffer of {} bytes (stride {stride}) is too small for {width}x{height}",
            data.len()
        )));
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for row in data.chunks(stride).take(height as usize) {
        for px in row[..row_bytes].chunks_exact(4) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }
    }
    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| BotError::InvalidInput("frame conversion produced a short buffer".into()))
}

#[cfg(all(unix, not(target_os = "macos")))]
mod linux_xcb;
#[cfg(windows)]
mod windows_gdi;

pub fn open_default() -> Result<Box<dyn RegionCapture>> {
    #[cfg(all(unix, not(target_os = "macos")))]
    return Ok(Box::new(linux_xcb::XcbCapture::connect()?));
    #[cfg(windows)]
    return Ok(Box::new(windows_gdi::GdiCapture));
    #[cfg(not(any(windows, all(unix, not(target_os = "macos")))))]
    Err(BotError::Unsupported("screen capture"))
}

#[cfg(test)]
pub mod testing {
    use super::RegionCapture;
    use crate::error::{BotError, Result};
    use crate::vision::Region;
    use image::RgbImage;
    use std::collections::VecDeque;

    /// Hands out queued frames (or errors) in order; repeats the last frame
    /// once the queue is drained.
    #[derive(Debug, Default)]
    pub struct ScriptedCapture {
        pub frames: VecDeque<Result<RgbImage>>,
        last: Option<RgbImage>,
        pub calls: usize,
    }

    impl ScriptedCapture {
        pub fn new(frames: impl IntoIterator<Item = Result<RgbImage>>) -> Self {
            Self {
                frames: frames.into_iter().collect(),
                last: None,
                calls: 0,
            }
        }
    }

    impl RegionCapture for ScriptedCapture {
        fn capture(&mut self, region: &Region) -> Result<RgbImage> {
            self.calls += 1;
            match self.frames.pop_front() {
                Some(Ok(frame)) => {
                    self.last = Some(frame.clone());
                    Ok(frame)
                }
                Some(Err(e)) => Err(e),
                None => self.last.clone().ok_or_else(|| {
                    BotError::Capture(format!("no frame scripted for {region}"))
                }),
            }
        }
    }
}
