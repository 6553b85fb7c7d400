//! In-memory draw target for rendering tests

use core::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Point, Size},
    pixelcolor::{Rgb565, RgbColor},
    Pixel,
};

pub struct Canvas {
    size: Size,
    pixels: Vec<Rgb565>,
}

impl Canvas {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            // Anything but black, so a missing clear shows up
            pixels: vec![Rgb565::RED; (size.width * size.height) as usize],
        }
    }

    pub fn pixel(&self, point: Point) -> Rgb565 {
        self.pixels[(point.y as u32 * self.size.width + point.x as u32) as usize]
    }

    /// Count of pixels with `color` inside the given square around `center`
    pub fn count_around(&self, center: Point, half: i32, color: Rgb565) -> usize {
        let mut count = 0;
        for y in (center.y - half)..=(center.y + half) {
            for x in (center.x - half)..=(center.x + half) {
                if x >= 0
                    && y >= 0
                    && (x as u32) < self.size.width
                    && (y as u32) < self.size.height
                    && self.pixel(Point::new(x, y)) == color
                {
                    count += 1;
                }
            }
        }
        count
    }

    pub fn count(&self, color: Rgb565) -> usize {
        self.pixels.iter().filter(|p| **p == color).count()
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        self.size
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0
                && point.y >= 0
                && (point.x as u32) < self.size.width
                && (point.y as u32) < self.size.height
            {
                let index = (point.y as u32 * self.size.width + point.x as u32) as usize;
                self.pixels[index] = color;
            }
        }
        Ok(())
    }
}
