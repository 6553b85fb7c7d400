//! UI definitions module
//! Based on: https://github.com/lupyuen/pinetime-watchface/blob/master/src/lib.rs

use chrono::NaiveDateTime;
use embedded_graphics::{draw_target::DrawTarget, geometry::Size, pixelcolor::Rgb565};

use crate::system::settings::Settings;

pub mod bcd;
mod bcd_watchface;
pub mod date;
pub mod layout;

#[cfg(test)]
pub(crate) mod canvas;

pub use bcd_watchface::BcdWatchface;

/// Color type of the ST7789 panel
pub type ColorMode = Rgb565;

pub trait WatchFace {
    /// Create new watchface for a drawable area of `bounds`
    fn new(bounds: Size, settings: &Settings) -> Self;

    /// Re-derive anything that depends on the settings
    fn configure(&mut self, settings: &Settings);

    /// Render the watchface with state
    fn draw<D>(&mut self, target: &mut D, state: &WatchFaceState) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = ColorMode>;
}

/// State for the watch face
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchFaceState {
    pub time: NaiveDateTime,
    pub bluetooth_connected: bool,
}
