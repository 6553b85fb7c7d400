//! Date readout shown above the dots

use chrono::{Datelike, Weekday};

/// Room for "Wed Sep 30" plus slack
pub const DATE_STR_LEN: usize = 11;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn weekday_abbrev(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// Format `date` as weekday, month and zero-padded day, e.g. "Mon Oct 19".
pub fn format_date<'a, D: Datelike>(
    buf: &'a mut [u8; DATE_STR_LEN],
    date: &D,
) -> Result<&'a str, core::fmt::Error> {
    format_no_std::show(
        buf,
        format_args!(
            "{} {} {:02}",
            weekday_abbrev(date.weekday()),
            MONTHS[date.month0() as usize],
            date.day()
        ),
    )
}
