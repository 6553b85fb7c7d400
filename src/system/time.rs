//! Time keeping module for PineTime
//!
//! Wall-clock time is kept as a reference point (a known time and the uptime
//! at which it was valid) plus the uptime elapsed since. Uptime is passed in
//! by the caller in microseconds so the arithmetic doesn't depend on a
//! particular time driver.

use core::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

/// Length of a Current Time Service value without the adjust reason
pub const CTS_MIN_LEN: usize = 9;
/// Length of a full Current Time Service value
pub const CTS_LEN: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeError {
    /// Fewer bytes than a Current Time value
    TooShort(usize),
    /// Fields don't form a valid date and time
    InvalidDateTime,
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeError::TooShort(len) => write!(f, "current time value too short ({} bytes)", len),
            TimeError::InvalidDateTime => write!(f, "invalid date or time"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeReference {
    /// Clock time
    time: NaiveDateTime,
    /// Uptime at which `time` was valid
    uptime_us: u64,
}

impl Default for TimeReference {
    fn default() -> Self {
        Self {
            time: NaiveDateTime::UNIX_EPOCH,
            uptime_us: 0,
        }
    }
}

impl TimeReference {
    /// Create new time reference from NaiveDateTime
    pub fn from_datetime(time: NaiveDateTime, uptime_us: u64) -> Self {
        Self { time, uptime_us }
    }

    /// Create new time reference from seconds since the epoch, as seen on
    /// the wall clock
    pub fn from_timestamp(secs: i64, uptime_us: u64) -> Result<Self, TimeError> {
        let time = chrono::DateTime::from_timestamp(secs, 0)
            .ok_or(TimeError::InvalidDateTime)?
            .naive_utc();
        Ok(Self::from_datetime(time, uptime_us))
    }

    /// Create new time reference from Current Time Service data
    pub fn from_cts_bytes(bytes: &[u8], uptime_us: u64) -> Result<Self, TimeError> {
        if bytes.len() < CTS_MIN_LEN {
            return Err(TimeError::TooShort(bytes.len()));
        }

        let year = u16::from_le_bytes([bytes[0], bytes[1]]) as i32;
        let month = bytes[2] as u32;
        let day = bytes[3] as u32;
        let hour = bytes[4] as u32;
        let min = bytes[5] as u32;
        let sec = bytes[6] as u32;
        // bytes[7] is the day of week, implied by the date
        let milli = bytes[8] as u32 * 1000 / 256; // Convert fractions_256 to milliseconds

        let time = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_milli_opt(hour, min, sec, milli))
            .ok_or(TimeError::InvalidDateTime)?;

        Ok(Self::from_datetime(time, uptime_us))
    }

    pub fn time(&self) -> NaiveDateTime {
        self.time
    }
}

/// Encode `time` as a Current Time Service value with no adjust reason
pub fn cts_bytes(time: &NaiveDateTime) -> [u8; CTS_LEN] {
    let [y0, y1] = (time.year().clamp(0, u16::MAX as i32) as u16).to_le_bytes();
    let fractions = (time.nanosecond().min(999_999_999) as u64 * 256 / 1_000_000_000) as u8;
    [
        y0,
        y1,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
        time.weekday().number_from_monday() as u8,
        fractions,
        0,
    ]
}

pub struct TimeManager {
    reference: TimeReference,
}

impl TimeManager {
    /// Initialize time measurement on boot
    pub fn init(reference: TimeReference) -> Self {
        Self { reference }
    }

    /// Get current time
    pub fn get_time(&self, uptime_us: u64) -> NaiveDateTime {
        let elapsed = uptime_us.saturating_sub(self.reference.uptime_us);
        let elapsed = Duration::microseconds(elapsed.min(i64::MAX as u64) as i64);
        self.reference
            .time
            .checked_add_signed(elapsed)
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// Update time reference
    pub fn set_time(&mut self, reference: TimeReference) {
        #[cfg(feature = "defmt")]
        defmt::info!(
            "Time set to {}:{}:{}",
            reference.time.hour(),
            reference.time.minute(),
            reference.time.second()
        );
        self.reference = reference;
    }
}

/// Granularity of redraws
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickUnit {
    Second,
    Minute,
}

impl TickUnit {
    /// Start of the period of this unit containing `time`
    pub fn truncate(self, time: NaiveDateTime) -> NaiveDateTime {
        let time = time.with_nanosecond(0).unwrap_or(time);
        match self {
            TickUnit::Second => time,
            TickUnit::Minute => time.with_second(0).unwrap_or(time),
        }
    }

    /// Whether `now` lies in a different period than `prev`
    pub fn changed(self, prev: NaiveDateTime, now: NaiveDateTime) -> bool {
        self.truncate(prev) != self.truncate(now)
    }
}
