//! Peripherals that don't depend on the nRF52832 HAL

pub mod spi_flash;
