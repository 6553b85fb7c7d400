//! Bluetooth module
//!
//! The phone talks to the face through two services: the standard Current
//! Time Service to set the clock, and a vendor service carrying companion
//! messages and exposing the stored settings record.

use nrf_softdevice::ble::advertisement_builder::{
    Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList, ServiceUuid16,
};
use pinetime_bcdface::system::{settings::SETTINGS_RECORD_LEN, time::CTS_LEN};

/// Largest companion message accepted in one write
pub const MESSAGE_LEN: usize = 64;

const CURRENT_TIME_SERVICE: ServiceUuid16 = ServiceUuid16::from_u16(0x1805);

pub static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
    .services_16(ServiceList::Incomplete, &[CURRENT_TIME_SERVICE])
    .full_name("PineTime")
    .build();

pub static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .services_16(ServiceList::Incomplete, &[CURRENT_TIME_SERVICE])
    .build();

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub cts: CurrentTimeService,
    pub settings: SettingsService,
}

#[nrf_softdevice::gatt_service(uuid = "1805")]
pub struct CurrentTimeService {
    #[characteristic(uuid = "2a2b", read, write)]
    pub current_time: [u8; CTS_LEN],
}

#[nrf_softdevice::gatt_service(uuid = "6e0f0001-4bcd-4c4f-9d2a-bcdface00001")]
pub struct SettingsService {
    /// Key/value message from the companion app
    #[characteristic(uuid = "6e0f0002-4bcd-4c4f-9d2a-bcdface00001", write)]
    pub message: heapless::Vec<u8, MESSAGE_LEN>,
    /// Settings record as currently persisted
    #[characteristic(uuid = "6e0f0003-4bcd-4c4f-9d2a-bcdface00001", read)]
    pub record: [u8; SETTINGS_RECORD_LEN],
}
