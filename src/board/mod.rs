//! Board support for the PineTime: everything bound to the nRF52832 HAL

use embassy_embedded_hal::shared_bus::blocking::spi::SpiDevice;
use embassy_nrf::{gpio::Output, peripherals::SPI2, spim::Spim};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

pub(crate) mod bluetooth;
pub(crate) mod config;
pub(crate) mod display;
pub(crate) mod vibrator;

/// A device on SPI2, shared between the LCD and the NOR flash
pub type SharedSpi<CS> = SpiDevice<'static, NoopRawMutex, Spim<'static, SPI2>, Output<'static, CS>>;
