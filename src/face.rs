//! Watch face lifecycle
//!
//! The face is driven by a handful of events: it appears and disappears,
//! time ticks, the phone connects or drops, and settings arrive. [`Face`]
//! turns these into what the firmware should do next (redraw, vibrate,
//! persist) without touching any hardware itself.

use chrono::NaiveDateTime;

use crate::{
    system::{settings::Settings, time::TickUnit},
    ui::WatchFaceState,
};

/// Vibration patterns the face can ask for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Alert {
    /// Phone disconnected
    DoublePulse,
}

/// Event sources the face is currently listening to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Subscriptions {
    pub tick: Option<TickUnit>,
    pub bluetooth: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BluetoothUpdate {
    pub alert: Option<Alert>,
    pub redraw: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SettingsUpdate {
    /// Settings differ from before; redraw and persist
    pub changed: bool,
}

pub struct Face {
    settings: Settings,
    subscriptions: Subscriptions,
    visible: bool,
    /// Last reported phone connection
    connected: bool,
    /// Time of the last redraw triggered by a tick
    last_tick: Option<NaiveDateTime>,
}

impl Face {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            subscriptions: Subscriptions::default(),
            visible: false,
            connected: false,
            last_tick: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn subscriptions(&self) -> Subscriptions {
        self.subscriptions
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    fn subscribe(&mut self) {
        self.subscriptions = Subscriptions {
            tick: Some(self.settings.tick_unit()),
            bluetooth: self.settings.notify_disconnect,
        };
        #[cfg(feature = "defmt")]
        defmt::debug!("Subscribed: {}", self.subscriptions);
    }

    /// The face came on screen.
    ///
    /// Subscribes to events and primes the Bluetooth state without alerting.
    /// The caller redraws immediately so the date doesn't lag behind.
    pub fn appear(&mut self, now: NaiveDateTime, connected: bool) {
        self.visible = true;
        self.subscribe();
        self.connected = connected;
        self.last_tick = Some(now);
    }

    /// The face left the screen. All event sources are dropped.
    pub fn disappear(&mut self) {
        self.visible = false;
        self.subscriptions = Subscriptions::default();
        self.last_tick = None;
    }

    /// A timer tick at `now`. Returns whether to redraw.
    pub fn tick(&mut self, now: NaiveDateTime) -> bool {
        let Some(unit) = self.subscriptions.tick else {
            return false;
        };

        let redraw = match self.last_tick {
            Some(prev) => unit.changed(prev, now),
            None => true,
        };
        if redraw {
            self.last_tick = Some(now);
        }
        redraw
    }

    /// Phone connection changed to `connected`.
    pub fn bluetooth(&mut self, connected: bool) -> BluetoothUpdate {
        let was_connected = self.connected;
        self.connected = connected;

        if !self.subscriptions.bluetooth {
            return BluetoothUpdate::default();
        }

        #[cfg(feature = "defmt")]
        defmt::info!("Bluetooth {}", if connected { "connected" } else { "disconnected" });

        BluetoothUpdate {
            alert: (was_connected && !connected).then_some(Alert::DoublePulse),
            redraw: was_connected != connected,
        }
    }

    /// New settings from the phone.
    pub fn update_settings(&mut self, settings: Settings) -> SettingsUpdate {
        if settings == self.settings {
            return SettingsUpdate::default();
        }

        self.settings = settings;
        if self.visible {
            self.subscribe();
        }
        SettingsUpdate { changed: true }
    }

    /// What the renderer needs for a frame at `now`
    pub fn state(&self, now: NaiveDateTime) -> WatchFaceState {
        WatchFaceState {
            time: now,
            bluetooth_connected: self.connected,
        }
    }
}
