//! Display control module for PineTime

use display_interface_spi::SPIInterfaceNoCS;
use embassy_nrf::{
    gpio::Output,
    peripherals::{P0_14, P0_18, P0_22, P0_23, P0_25, P0_26},
};
use embassy_time::Delay;
use embedded_graphics::geometry::Size;
use mipidsi::{models::ST7789, Builder, Orientation};
use pinetime_bcdface::ui::{WatchFace, WatchFaceState};

use super::SharedSpi;

const LCD_W: u16 = 240;
const LCD_H: u16 = 240;

type Lcd = mipidsi::Display<
    SPIInterfaceNoCS<SharedSpi<P0_25>, Output<'static, P0_18>>,
    ST7789,
    Output<'static, P0_26>,
>;

/// Highest backlight level, all three FETs on
const MAX_BRIGHTNESS: u8 = 7;

/// Backlight level set at boot
pub const BOOT_BRIGHTNESS: u8 = 2;

/// Control the backlight.
///
/// There are three active-low backlight pins, each connected to a FET that
/// toggles backlight power through a resistor. Combinations of these pins
/// give 7 brightness levels (+ off).
pub struct BacklightPins<'a> {
    low: Output<'a, P0_14>,
    mid: Output<'a, P0_22>,
    high: Output<'a, P0_23>,
}

impl<'a> BacklightPins<'a> {
    /// Configure backlight pins on boot
    pub fn init(low: Output<'a, P0_14>, mid: Output<'a, P0_22>, high: Output<'a, P0_23>) -> Self {
        Self { low, mid, high }
    }

    fn set(&mut self, level: u8) {
        if level & 0x01 > 0 {
            self.low.set_low();
        } else {
            self.low.set_high();
        }
        if level & 0x02 > 0 {
            self.mid.set_low();
        } else {
            self.mid.set_high();
        }
        if level & 0x04 > 0 {
            self.high.set_low();
        } else {
            self.high.set_high();
        }
    }
}

pub struct Display {
    /// ST7789 panel
    lcd: Lcd,
    // Backlight pins
    pins_backlight: BacklightPins<'static>,
}

impl Display {
    /// Configure display settings on boot
    pub fn init(
        spi: SharedSpi<P0_25>,
        dc_pin: Output<'static, P0_18>,
        rst_pin: Output<'static, P0_26>,
        backlight: BacklightPins<'static>,
    ) -> Result<Self, mipidsi::InitError<core::convert::Infallible>> {
        let lcd = Builder::st7789(SPIInterfaceNoCS::new(spi, dc_pin))
            .with_display_size(LCD_W, LCD_H)
            .with_orientation(Orientation::Portrait(false))
            .init(&mut Delay, Some(rst_pin))?;

        let mut display = Self {
            lcd,
            pins_backlight: backlight,
        };
        display.set_brightness(0);
        Ok(display)
    }

    /// Drawable area
    pub fn size(&self) -> Size {
        Size::new(LCD_W as u32, LCD_H as u32)
    }

    /// Render `face` for `state`
    pub fn draw<W: WatchFace>(
        &mut self,
        face: &mut W,
        state: &WatchFaceState,
    ) -> Result<(), mipidsi::Error> {
        face.draw(&mut self.lcd, state)
    }

    /// Set the backlight brightness, 0 (off) to 7
    pub fn set_brightness(&mut self, level: u8) {
        let level = level.min(MAX_BRIGHTNESS);
        defmt::debug!("Setting backlight brightness to {}", level);
        self.pins_backlight.set(level);
    }
}
