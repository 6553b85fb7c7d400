//! User settings and their persisted record
//!
//! The record is the postcard encoding of [`Settings`], one byte per flag in
//! declaration order. New fields are only ever appended. A record whose
//! length doesn't match the current layout is treated as absent.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::time::TickUnit;

/// Length of the persisted record
pub const SETTINGS_RECORD_LEN: usize = 2;

/// Largest record a store is asked to hand back
pub const SETTINGS_MAX_RECORD_LEN: usize = 32;

/// Settings configurable from the companion app
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// Draw seconds columns and tick every second
    pub show_seconds: bool,
    /// Vibrate and show the phone glyph when the phone disconnects
    pub notify_disconnect: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_seconds: false,
            notify_disconnect: true,
        }
    }
}

impl Settings {
    /// How often the face needs redrawing
    pub fn tick_unit(&self) -> TickUnit {
        if self.show_seconds {
            TickUnit::Second
        } else {
            TickUnit::Minute
        }
    }

    /// Encode into the persisted record layout.
    pub fn to_record<'a>(
        &self,
        buf: &'a mut [u8; SETTINGS_RECORD_LEN],
    ) -> Result<&'a [u8], postcard::Error> {
        let record: &'a [u8] = postcard::to_slice(self, buf)?;
        Ok(record)
    }

    /// Decode a persisted record, falling back to defaults when it is
    /// absent, short, oversized or garbled.
    pub fn from_record(record: Option<&[u8]>) -> Self {
        match record {
            Some(bytes) if bytes.len() == SETTINGS_RECORD_LEN => {
                postcard::from_bytes(bytes).unwrap_or_default()
            }
            _ => Self::default(),
        }
    }
}

/// Backing storage for the settings record
pub trait SettingsStore {
    type Error;

    /// Copy the stored record into `buf`.
    ///
    /// Returns the stored length, which may exceed `buf.len()`, or `None`
    /// when nothing has been stored yet.
    fn load(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error>;

    /// Replace the stored record.
    fn save(&mut self, record: &[u8]) -> Result<(), Self::Error>;
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError<E> {
    /// Settings didn't fit the record buffer
    Encode,
    /// Storage backend failed
    Store(E),
}

impl<E: fmt::Debug> fmt::Display for SettingsError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Encode => write!(f, "settings record encoding failed"),
            SettingsError::Store(e) => write!(f, "settings store error: {:?}", e),
        }
    }
}

/// Load settings from `store`. Never fails: any problem yields defaults.
pub fn load_settings<S: SettingsStore>(store: &mut S) -> Settings {
    let mut buf = [0u8; SETTINGS_MAX_RECORD_LEN];
    let record = match store.load(&mut buf) {
        Ok(Some(len)) if len <= buf.len() => Some(&buf[..len]),
        // Longer than anything we know how to read
        Ok(Some(_)) => None,
        Ok(None) | Err(_) => None,
    };
    Settings::from_record(record)
}

/// Persist `settings` to `store`.
pub fn save_settings<S: SettingsStore>(
    store: &mut S,
    settings: &Settings,
) -> Result<(), SettingsError<S::Error>> {
    let mut buf = [0u8; SETTINGS_RECORD_LEN];
    let record = settings.to_record(&mut buf).map_err(|_| SettingsError::Encode)?;
    store.save(record).map_err(SettingsError::Store)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Store keeping the record in RAM
    #[derive(Default)]
    struct RamStore {
        record: Option<Vec<u8>>,
        fail: bool,
    }

    impl SettingsStore for RamStore {
        type Error = ();

        fn load(&mut self, buf: &mut [u8]) -> Result<Option<usize>, ()> {
            if self.fail {
                return Err(());
            }
            Ok(self.record.as_ref().map(|record| {
                let n = record.len().min(buf.len());
                buf[..n].copy_from_slice(&record[..n]);
                record.len()
            }))
        }

        fn save(&mut self, record: &[u8]) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.record = Some(record.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(!settings.show_seconds);
        assert!(settings.notify_disconnect);
        assert_eq!(settings.tick_unit(), TickUnit::Minute);
    }

    #[test]
    fn test_record_layout() {
        let settings = Settings {
            show_seconds: true,
            notify_disconnect: false,
        };
        let mut buf = [0u8; SETTINGS_RECORD_LEN];
        assert_eq!(settings.to_record(&mut buf).unwrap(), &[1u8, 0]);
        assert_eq!(Settings::from_record(Some(&[1u8, 0][..])), settings);
    }

    #[test]
    fn test_bad_records_fall_back_to_defaults() {
        assert_eq!(Settings::from_record(None), Settings::default());
        assert_eq!(Settings::from_record(Some(&[1u8][..])), Settings::default());
        assert_eq!(Settings::from_record(Some(&[1u8, 0, 1][..])), Settings::default());
        assert_eq!(Settings::from_record(Some(&[7u8, 0][..])), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let mut store = RamStore::default();
        assert_eq!(load_settings(&mut store), Settings::default());

        let settings = Settings {
            show_seconds: true,
            notify_disconnect: true,
        };
        save_settings(&mut store, &settings).unwrap();
        assert_eq!(store.record.as_deref(), Some(&[1u8, 1][..]));
        assert_eq!(load_settings(&mut store), settings);
    }

    #[test]
    fn test_oversized_stored_record() {
        let mut store = RamStore {
            record: Some(vec![1; SETTINGS_MAX_RECORD_LEN + 8]),
            fail: false,
        };
        assert_eq!(load_settings(&mut store), Settings::default());
    }

    #[test]
    fn test_store_errors() {
        let mut store = RamStore {
            record: Some(vec![1, 0]),
            fail: true,
        };
        assert_eq!(load_settings(&mut store), Settings::default());
        assert_eq!(
            save_settings(&mut store, &Settings::default()),
            Err(SettingsError::Store(()))
        );
    }
}
