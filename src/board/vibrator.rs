//! Control the vibration motor
//!
//! Pinout from https://wiki.pine64.org/wiki/PineTime.

use embassy_nrf::{gpio::Output, peripherals::P0_16};
use embassy_time::Timer;
use pinetime_bcdface::Alert;

/// Length of a short pulse in milliseconds
const SHORT_PULSE_MS: u64 = 200;

/// Pause between pulses in milliseconds
const PULSE_GAP_MS: u64 = 150;

pub struct Vibrator<'a> {
    /// Motor enable pin (inverted)
    pin_enable: Output<'a, P0_16>,
}

impl<'a> Vibrator<'a> {
    /// Configure vibrator on boot
    pub fn init(pin_enable: Output<'a, P0_16>) -> Self {
        let mut vibrator = Self { pin_enable };
        vibrator.off();
        vibrator
    }

    /// Pulse the vibrator `times` times for `length_ms` each
    async fn pulse(&mut self, length_ms: u64, times: u8) {
        for i in 0..times {
            self.on();
            Timer::after_millis(length_ms).await;
            self.off();
            if i + 1 < times {
                Timer::after_millis(PULSE_GAP_MS).await;
            }
        }
    }

    /// Play the pattern for `alert`
    pub async fn alert(&mut self, alert: Alert) {
        match alert {
            Alert::DoublePulse => self.pulse(SHORT_PULSE_MS, 2).await,
        }
    }

    fn on(&mut self) {
        self.pin_enable.set_low();
    }

    fn off(&mut self) {
        self.pin_enable.set_high();
    }
}
