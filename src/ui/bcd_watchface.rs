//! BCD watchface

use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{Point, Size},
    mono_font::MonoTextStyle,
    pixelcolor::RgbColor,
    primitives::{Circle, Line, Primitive, PrimitiveStyle, Rectangle, RoundedRectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
    Drawable,
};
use profont::PROFONT_24_POINT;

use super::{
    bcd,
    date::{format_date, DATE_STR_LEN},
    layout::Layout,
    ColorMode, WatchFace, WatchFaceState,
};
use crate::system::settings::Settings;

/// Height of the band holding the date
const DATE_BAND_HEIGHT: u32 = 40;

const BACKGROUND: ColorMode = ColorMode::BLACK;
const FOREGROUND: ColorMode = ColorMode::WHITE;

/// Top left corner and size of the disconnect glyph
const BT_ICON_ORIGIN: Point = Point::new(0, 6);
const BT_ICON_SIZE: Size = Size::new(20, 20);

/// Time as dot columns, the date on top, and a phone glyph while the phone
/// is away.
pub struct BcdWatchface {
    /// Drawable area
    bounds: Size,
    /// Derived dot geometry
    layout: Layout,
    show_seconds: bool,
    notify_disconnect: bool,
    /// Backing store for the date text
    date_buf: [u8; DATE_STR_LEN],
}

impl BcdWatchface {
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Whether the disconnect glyph is drawn for `state`
    pub fn bt_icon_visible(&self, state: &WatchFaceState) -> bool {
        self.notify_disconnect && !state.bluetooth_connected
    }

    fn draw_digits<D>(&self, target: &mut D, state: &WatchFaceState) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = ColorMode>,
    {
        let filled = PrimitiveStyle::with_fill(FOREGROUND);
        let empty = PrimitiveStyle::with_stroke(FOREGROUND, 1);
        let diameter = self.layout.dot_diameter();

        for (col, column) in bcd::columns(&state.time, self.show_seconds)
            .iter()
            .enumerate()
        {
            for (bit, set) in column.dots().enumerate() {
                let center = self.layout.dot_center(col as u8, bit as u8);
                let style = if set { filled } else { empty };
                Circle::with_center(center, diameter)
                    .into_styled(style)
                    .draw(target)?;
            }
        }
        Ok(())
    }

    fn draw_date<D>(&mut self, target: &mut D, state: &WatchFaceState) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = ColorMode>,
    {
        let text = format_date(&mut self.date_buf, &state.time);
        debug_assert!(text.is_ok(), "date label overflows its buffer");
        let Ok(text) = text else {
            return Ok(());
        };

        let character_style = MonoTextStyle::new(&PROFONT_24_POINT, FOREGROUND);
        let text_style = TextStyleBuilder::new()
            .alignment(Alignment::Center)
            .baseline(Baseline::Middle)
            .build();
        let position = Point::new(
            self.bounds.width as i32 / 2,
            DATE_BAND_HEIGHT as i32 / 2,
        );

        Text::with_text_style(text, position, character_style, text_style).draw(target)?;
        Ok(())
    }

    /// Phone outline with an earpiece and a home button
    fn draw_bt_icon<D>(&self, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = ColorMode>,
    {
        let outline = PrimitiveStyle::with_stroke(FOREGROUND, 2);
        let body = Rectangle::new(
            BT_ICON_ORIGIN + Point::new(4, 0),
            Size::new(BT_ICON_SIZE.width - 8, BT_ICON_SIZE.height),
        );

        RoundedRectangle::with_equal_corners(body, Size::new(3, 3))
            .into_styled(outline)
            .draw(target)?;
        Line::new(
            BT_ICON_ORIGIN + Point::new(8, 3),
            BT_ICON_ORIGIN + Point::new(11, 3),
        )
        .into_styled(PrimitiveStyle::with_stroke(FOREGROUND, 1))
        .draw(target)?;
        Circle::with_center(BT_ICON_ORIGIN + Point::new(10, 15), 3)
            .into_styled(PrimitiveStyle::with_fill(FOREGROUND))
            .draw(target)?;
        Ok(())
    }
}

impl WatchFace for BcdWatchface {
    fn new(bounds: Size, settings: &Settings) -> Self {
        Self {
            bounds,
            layout: Layout::new(bounds, settings.show_seconds),
            show_seconds: settings.show_seconds,
            notify_disconnect: settings.notify_disconnect,
            date_buf: [0; DATE_STR_LEN],
        }
    }

    fn configure(&mut self, settings: &Settings) {
        if settings.show_seconds != self.show_seconds {
            self.layout = Layout::new(self.bounds, settings.show_seconds);
        }
        self.show_seconds = settings.show_seconds;
        self.notify_disconnect = settings.notify_disconnect;
    }

    fn draw<D>(&mut self, target: &mut D, state: &WatchFaceState) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = ColorMode>,
    {
        target.clear(BACKGROUND)?;
        self.draw_digits(target, state)?;
        self.draw_date(target, state)?;
        if self.bt_icon_visible(state) {
            self.draw_bt_icon(target)?;
        }
        Ok(())
    }
}
