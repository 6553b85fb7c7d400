//! Dot geometry derived from the screen size and the seconds setting

use embedded_graphics::geometry::{Point, Size};

/// Dot radius with six columns (hh:mm:ss)
pub const DOT_RADIUS_SECONDS: i32 = 13;
/// Dot radius with four columns (hh:mm)
pub const DOT_RADIUS_MINUTES: i32 = 16;

/// Positions of the BCD dots.
///
/// Columns are spread evenly across the width with equal gaps at both edges
/// and between columns. Dots stack up from the bottom edge, spaced three
/// radii apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Layout {
    /// Radius of a single dot
    pub dot_radius: i32,
    /// Horizontal gap between neighbouring columns
    pub col_spacing: i32,
    /// Distance from the left edge to the first column
    pub col_offset: i32,
    /// Number of columns laid out
    pub num_cols: i32,
    /// Height of the drawable area
    pub height: i32,
}

impl Layout {
    pub fn new(bounds: Size, show_seconds: bool) -> Self {
        let width = bounds.width as i32;
        let (num_cols, dot_radius) = if show_seconds {
            (6, DOT_RADIUS_SECONDS)
        } else {
            (4, DOT_RADIUS_MINUTES)
        };

        let col_spacing = (width - 2 * num_cols * dot_radius) / (num_cols + 1);
        let col_offset = (width - col_spacing * (num_cols - 1) - 2 * num_cols * dot_radius) / 2;

        Self {
            dot_radius,
            col_spacing,
            col_offset,
            num_cols,
            height: bounds.height as i32,
        }
    }

    /// Center of the dot for `bit` (0 = bottom) in column `col` (0 = left).
    pub fn dot_center(&self, col: u8, bit: u8) -> Point {
        let r = self.dot_radius;
        Point::new(
            self.col_offset + r + (2 * r + self.col_spacing) * col as i32,
            self.height - r * (3 * bit as i32 + 2),
        )
    }

    /// Diameter passed to `Circle`
    pub fn dot_diameter(&self) -> u32 {
        2 * self.dot_radius as u32
    }
}
