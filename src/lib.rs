//! Binary-coded-decimal watch face for the PineTime.
//!
//! Everything that does not touch the nRF52832 directly lives here so it can
//! be tested on the host: the BCD renderer, the settings record, the
//! companion message parser, the time source and the SPI NOR flash driver.
//! The firmware binary (`--features firmware`) binds these to the hardware.

#![cfg_attr(not(test), no_std)]

pub mod face;
pub mod peripherals;
pub mod system;
pub mod ui;

pub use face::{Alert, BluetoothUpdate, Face, SettingsUpdate, Subscriptions};
pub use system::settings::Settings;
