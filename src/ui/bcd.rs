//! Splitting the time of day into BCD dot columns

use chrono::Timelike;
use heapless::Vec;

/// Most columns ever drawn (hh:mm:ss)
pub const MAX_COLUMNS: usize = 6;

/// A single decimal digit drawn as a column of dots.
///
/// Bit 0 is the bottom dot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BcdColumn {
    /// Number of dots in the column
    pub bits: u8,
    /// Digit shown by the column
    pub value: u8,
}

impl BcdColumn {
    pub const fn new(bits: u8, value: u8) -> Self {
        Self { bits, value }
    }

    /// Dot states from bottom to top, `true` meaning the bit is set.
    pub fn dots(&self) -> impl Iterator<Item = bool> {
        let value = self.value;
        (0..self.bits).map(move |bit| (value >> bit) & 1 == 1)
    }
}

/// Tens and ones columns for one time field.
///
/// `tens_bits` is the smallest width holding the largest tens digit the
/// field can take (2 for hours, 3 for minutes and seconds).
fn field(value: u32, tens_bits: u8) -> [BcdColumn; 2] {
    [
        BcdColumn::new(tens_bits, (value / 10) as u8),
        BcdColumn::new(4, (value % 10) as u8),
    ]
}

/// Columns for the given time, left to right.
///
/// Hours use the 24 hour clock. Seconds are only included when requested.
pub fn columns<T: Timelike>(time: &T, show_seconds: bool) -> Vec<BcdColumn, MAX_COLUMNS> {
    let mut columns = Vec::new();
    let mut push = |pair: [BcdColumn; 2]| {
        for column in pair {
            let pushed = columns.push(column);
            debug_assert!(pushed.is_ok(), "more than {} columns", MAX_COLUMNS);
        }
    };

    push(field(time.hour(), 2));
    push(field(time.minute(), 3));
    if show_seconds {
        push(field(time.second(), 3));
    }

    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use proptest::prelude::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_columns_without_seconds() {
        let cols = columns(&at(23, 59, 41), false);
        assert_eq!(
            cols.as_slice(),
            &[
                BcdColumn::new(2, 2),
                BcdColumn::new(4, 3),
                BcdColumn::new(3, 5),
                BcdColumn::new(4, 9),
            ]
        );
    }

    #[test]
    fn test_columns_with_seconds() {
        let cols = columns(&at(7, 5, 38), true);
        assert_eq!(cols.len(), 6);
        assert_eq!(cols[0], BcdColumn::new(2, 0));
        assert_eq!(cols[1], BcdColumn::new(4, 7));
        assert_eq!(cols[4], BcdColumn::new(3, 3));
        assert_eq!(cols[5], BcdColumn::new(4, 8));
    }

    #[test]
    fn test_dots_bottom_to_top() {
        let dots: std::vec::Vec<bool> = BcdColumn::new(4, 6).dots().collect();
        assert_eq!(dots, [false, true, true, false]);

        let dots: std::vec::Vec<bool> = BcdColumn::new(2, 1).dots().collect();
        assert_eq!(dots, [true, false]);
    }

    proptest! {
        #[test]
        fn test_columns_recombine(h in 0u32..24, m in 0u32..60, s in 0u32..60) {
            let cols = columns(&at(h, m, s), true);
            for (pair, expected) in cols.chunks(2).zip([h, m, s]) {
                prop_assert_eq!(pair[0].value as u32 * 10 + pair[1].value as u32, expected);
                for col in pair {
                    prop_assert!((col.value as u32) < (1 << col.bits));
                }
            }
        }
    }
}
