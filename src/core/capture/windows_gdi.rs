use super::{RegionCapture, frame_from_bgrx};
use crate::error::{BotError, Result};
use crate::vision::Region;
use image::RgbImage;
use std::mem::size_of;
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CreateCompatibleBitmap, CreateCompatibleDC,
    DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, GetDIBits, ReleaseDC, SRCCOPY, SelectObject,
};

/// Copies the desktop rectangle through a memory DC with `BitBlt`.
#[derive(Debug, Default)]
pub struct GdiCapture;

impl RegionCapture for GdiCapture {
    fn capture(&mut self, region: &Region) -> Result<RgbImage> {
        let w = i32::try_from(region.width)
            .map_err(|_| BotError::InvalidInput(format!("width {} out of range", region.width)))?;
        let h = i32::try_from(region.height)
            .map_err(|_| BotError::InvalidInput(format!("height {} out of range", region.height)))?;
        let mut buf = vec![0u8; region.width as usize * region.height as usize * 4];

        unsafe {
            let screen = GetDC(None);
            if screen.is_invalid() {
                return Err(BotError::Capture("GetDC failed".to_string()));
            }
            let mem = CreateCompatibleDC(Some(screen));
            let bitmap = CreateCompatibleBitmap(screen, w, h);
            let previous = SelectObject(mem, bitmap.into());

            let blit = BitBlt(mem, 0, 0, w, h, Some(screen), region.left, region.top, SRCCOPY);

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: w,
                    // Negative height asks for top-down rows.
                    biHeight: -h,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let lines = GetDIBits(
                mem,
                bitmap,
                0,
                region.height,
                Some(buf.as_mut_ptr().cast()),
                &mut info,
                DIB_RGB_COLORS,
            );

            SelectObject(mem, previous);
            let _ = DeleteObject(bitmap.into());
            let _ = DeleteDC(mem);
            ReleaseDC(None, screen);

            blit.map_err(|e| BotError::Capture(format!("BitBlt failed: {e}")))?;
            if lines != h {
                return Err(BotError::Capture(format!(
                    "GetDIBits copied {lines} of {h} rows"
                )));
            }
        }

        frame_from_bgrx(region.width, region.height, region.width as usize * 4, &buf)
    }
}
