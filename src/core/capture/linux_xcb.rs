use super::{RegionCapture, frame_from_bgrx};
use crate::error::{BotError, Result};
use crate::vision::Region;
use image::RgbImage;
use log::debug;
use xcb::Connection;
use xcb::x::{Drawable, GetImage, ImageFormat, Window};

/// Reads the root window of the default X screen with `GetImage`.
///
/// Under Wayland this only sees XWayland windows, which is where most games
/// run anyway.
pub struct XcbCapture {
    conn: Connection,
    root: Window,
    depth: u8,
}

impl XcbCapture {
    pub fn connect() -> Result<Self> {
        let (conn, index) = Connection::connect(None)
            .map_err(|e| BotError::Capture(format!("cannot connect to X server: {:?}", e)))?;
        let (root, depth) = {
            let setup = conn.get_setup();
            let screen = setup
                .roots()
                .nth(index as usize)
                .ok_or_else(|| BotError::Capture("No screen".to_string()))?;
            (screen.root(), screen.root_depth())
        };
        debug!("xcb capture on screen {index}, depth {depth}");
        Ok(Self { conn, root, depth })
    }
}

impl RegionCapture for XcbCapture {
    fn capture(&mut self, region: &Region) -> Result<RgbImage> {
        if self.depth != 24 && self.depth != 32 {
            return Err(BotError::Capture(format!(
                "unsupported X screen depth {}",
                self.depth
            )));
        }
        let to_i16 = |v: i32| {
            i16::try_from(v).map_err(|_| BotError::InvalidInput(format!("offset {v} out of range")))
        };
        let to_u16 = |v: u32| {
            u16::try_from(v).map_err(|_| BotError::InvalidInput(format!("size {v} out of range")))
        };

        let cookie = self.conn.send_request(&GetImage {
            format: ImageFormat::ZPixmap,
            drawable: Drawable::Window(self.root),
            x: to_i16(region.left)?,
            y: to_i16(region.top)?,
            width: to_u16(region.width)?,
            height: to_u16(region.height)?,
            plane_mask: u32::MAX,
        });
        let reply = self
            .conn
            .wait_for_reply(cookie)
            .map_err(|e| BotError::Capture(format!("{:?}", e)))?;

        let data = reply.data();
        let stride = data.len() / region.height as usize;
        frame_from_bgrx(region.width, region.height, stride, data)
    }
}
