#![no_std]
#![no_main]

mod board;

// Panic handler and debugging
use defmt::unwrap;

use defmt_rtt as _;
use panic_probe as _;

// Device
use core::cell::RefCell;
use embassy_embedded_hal::shared_bus::blocking::spi::SpiDevice;
use embassy_executor::Spawner;
use embassy_futures::select::{select4, Either4};
use embassy_nrf::{
    bind_interrupts,
    gpio::{Level, Output, OutputDrive},
    peripherals::{P0_05, SPI2},
    spim::{self, Spim},
};
use embassy_sync::{
    blocking_mutex::{raw::ThreadModeRawMutex, NoopMutex},
    channel::Channel,
    signal::Signal,
};
use embassy_time::{Delay, Duration, Instant, Ticker};
use nrf_softdevice::{
    ble::{gatt_server, peripheral},
    Softdevice,
};
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    SPIM2_SPIS2_SPI2 => spim::InterruptHandler<SPI2>;
});

// Crate
use board::{
    bluetooth::{
        CurrentTimeServiceEvent, Server, ServerEvent, SettingsServiceEvent, ADV_DATA, MESSAGE_LEN,
        SCAN_DATA,
    },
    config::{nrf_config, softdevice_config},
    display::{BacklightPins, Display, BOOT_BRIGHTNESS},
    vibrator::Vibrator,
    SharedSpi,
};
use pinetime_bcdface::{
    peripherals::spi_flash::{Flash, FlashSettingsStore, SETTINGS_BASE},
    system::{
        message,
        settings::{load_settings, save_settings, Settings, SETTINGS_RECORD_LEN},
        time::{cts_bytes, TimeManager, TimeReference},
    },
    ui::{BcdWatchface, WatchFace},
    Alert, Face,
};

// Include the wall-clock time at build as the initial clock reference
include!(concat!(env!("OUT_DIR"), "/build_epoch.rs"));

type SettingsFlash = FlashSettingsStore<SharedSpi<P0_05>, Delay>;

// Communication channels
// Every connect and disconnect is kept so a quick reconnect still alerts
static BT_CONNECTED: Channel<ThreadModeRawMutex, bool, 4> = Channel::new();
static MESSAGE: Signal<ThreadModeRawMutex, heapless::Vec<u8, MESSAGE_LEN>> = Signal::new();
static NOTIFY: Signal<ThreadModeRawMutex, Alert> = Signal::new();
static TIME_SET: Signal<ThreadModeRawMutex, TimeReference> = Signal::new();

static SERVER: StaticCell<Server> = StaticCell::new();
static SPI_BUS: StaticCell<NoopMutex<RefCell<Spim<'static, SPI2>>>> = StaticCell::new();

fn uptime_us() -> u64 {
    Instant::now().as_micros()
}

/// Publish the persisted record so the companion app can show current values
fn publish_settings(server: &Server, settings: &Settings) {
    let mut record = [0u8; SETTINGS_RECORD_LEN];
    match settings.to_record(&mut record) {
        Ok(_) => {
            if let Err(e) = server.settings.record_set(&record) {
                defmt::warn!("Publishing settings failed: {:?}", defmt::Debug2Format(&e));
            }
        }
        Err(e) => defmt::warn!("Encoding settings failed: {:?}", defmt::Debug2Format(&e)),
    }
}

/// Keep the Current Time characteristic readable by the phone
fn publish_time(server: &Server, now: &chrono::NaiveDateTime) {
    if let Err(e) = server.cts.current_time_set(&cts_bytes(now)) {
        defmt::warn!("Publishing time failed: {:?}", defmt::Debug2Format(&e));
    }
}

fn redraw(display: &mut Display, watchface: &mut BcdWatchface, face: &Face, clock: &TimeManager) {
    let now = clock.get_time(uptime_us());
    defmt::debug!("Redraw at {}", defmt::Display2Format(&now));
    if let Err(e) = display.draw(watchface, &face.state(now)) {
        defmt::warn!("Drawing failed: {:?}", defmt::Debug2Format(&e));
    }
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Advertise, serve one phone at a time and forward what it writes.
#[embassy_executor::task]
async fn bluetooth_task(sd: &'static Softdevice, server: &'static Server) {
    loop {
        let config = peripheral::Config::default();
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &ADV_DATA,
            scan_data: &SCAN_DATA,
        };
        let conn = match peripheral::advertise_connectable(sd, adv, &config).await {
            Ok(conn) => conn,
            Err(e) => {
                defmt::warn!("Advertising failed: {:?}", e);
                continue;
            }
        };

        defmt::info!("Phone connected");
        BT_CONNECTED.send(true).await;

        let reason = gatt_server::run(&conn, server, |e| match e {
            ServerEvent::Cts(CurrentTimeServiceEvent::CurrentTimeWrite(bytes)) => {
                match TimeReference::from_cts_bytes(&bytes, uptime_us()) {
                    Ok(reference) => TIME_SET.signal(reference),
                    Err(e) => defmt::warn!("Rejected current time: {}", e),
                }
            }
            ServerEvent::Settings(SettingsServiceEvent::MessageWrite(payload)) => {
                MESSAGE.signal(payload);
            }
        })
        .await;

        defmt::info!("Phone disconnected: {:?}", reason);
        BT_CONNECTED.send(false).await;
    }
}

/// Play vibration alerts
#[embassy_executor::task(pool_size = 1)]
async fn notify(mut vibrator: Vibrator<'static>) {
    loop {
        let alert = NOTIFY.wait().await;
        vibrator.alert(alert).await;
    }
}

/// Run the watch face: redraw on ticks and connection changes, apply and
/// persist settings from the phone.
#[embassy_executor::task(pool_size = 1)]
async fn face_task(
    mut display: Display,
    mut store: SettingsFlash,
    mut clock: TimeManager,
    server: &'static Server,
) {
    let settings = load_settings(&mut store);
    defmt::info!("Settings loaded: {}", settings);
    publish_settings(server, &settings);
    publish_time(server, &clock.get_time(uptime_us()));

    let mut face = Face::new(settings);
    let mut watchface = BcdWatchface::new(display.size(), &settings);

    face.appear(clock.get_time(uptime_us()), false);
    redraw(&mut display, &mut watchface, &face, &clock);

    let mut ticker = Ticker::every(Duration::from_secs(1));
    loop {
        match select4(
            ticker.next(),
            BT_CONNECTED.receive(),
            MESSAGE.wait(),
            TIME_SET.wait(),
        )
        .await
        {
            Either4::First(()) => {
                let now = clock.get_time(uptime_us());
                publish_time(server, &now);
                if face.tick(now) {
                    redraw(&mut display, &mut watchface, &face, &clock);
                }
            }
            Either4::Second(connected) => {
                let update = face.bluetooth(connected);
                if let Some(alert) = update.alert {
                    NOTIFY.signal(alert);
                }
                if update.redraw {
                    redraw(&mut display, &mut watchface, &face, &clock);
                }
            }
            Either4::Third(payload) => {
                let mut settings = *face.settings();
                if let Err(e) = message::apply_payload(&mut settings, &payload) {
                    defmt::warn!("Malformed companion message: {}", e);
                    continue;
                }
                if !face.update_settings(settings).changed {
                    continue;
                }

                defmt::info!("Settings changed: {}", settings);
                watchface.configure(&settings);
                match save_settings(&mut store, &settings) {
                    Ok(()) => publish_settings(server, &settings),
                    Err(e) => defmt::warn!("Saving settings failed: {:?}", defmt::Debug2Format(&e)),
                }
                redraw(&mut display, &mut watchface, &face, &clock);
            }
            Either4::Fourth(reference) => {
                clock.set_time(reference);
                publish_time(server, &clock.get_time(uptime_us()));
                redraw(&mut display, &mut watchface, &face, &clock);
            }
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(nrf_config());
    defmt::info!("Initializing");

    // Initialize Bluetooth
    let sd = Softdevice::enable(&softdevice_config());
    let server = SERVER.init(unwrap!(Server::new(sd)));
    unwrap!(spawner.spawn(softdevice_task(sd)));

    // Initialize SPI
    let mut spim_config = spim::Config::default();
    // Use SPI at 8MHz (the fastest clock available on the nRF52832),
    // otherwise refreshing will be super slow.
    spim_config.frequency = spim::Frequency::M8;
    // SPI must be used in mode 3. Mode 0 (the default) won't work.
    spim_config.mode = spim::MODE_3;

    let spim = Spim::new(p.SPI2, Irqs, p.P0_02, p.P0_04, p.P0_03, spim_config);
    let spi_bus = SPI_BUS.init(NoopMutex::new(RefCell::new(spim)));

    // Initialize LCD
    let backlight = BacklightPins::init(
        Output::new(p.P0_14, Level::High, OutputDrive::Standard),
        Output::new(p.P0_22, Level::High, OutputDrive::Standard),
        Output::new(p.P0_23, Level::High, OutputDrive::Standard),
    );
    let mut display = unwrap!(Display::init(
        SpiDevice::new(
            spi_bus,
            Output::new(p.P0_25, Level::High, OutputDrive::Standard)
        ),
        Output::new(p.P0_18, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_26, Level::Low, OutputDrive::Standard),
        backlight,
    )
    .map_err(|_| "LCD init failed"));
    display.set_brightness(BOOT_BRIGHTNESS);

    // Initialize settings flash
    let mut flash = Flash::init(
        SpiDevice::new(
            spi_bus,
            Output::new(p.P0_05, Level::High, OutputDrive::Standard),
        ),
        Delay,
    );
    if let Err(e) = flash.wake() {
        defmt::warn!("Flash wake failed: {:?}", defmt::Debug2Format(&e));
    }
    let store = FlashSettingsStore::new(flash, SETTINGS_BASE);

    // Initialize vibration motor
    let vibrator = Vibrator::init(Output::new(p.P0_16, Level::High, OutputDrive::Standard));

    // Initialize clock from build time until the phone sets it
    let reference = TimeReference::from_timestamp(BUILD_EPOCH, uptime_us()).unwrap_or_default();
    let clock = TimeManager::init(reference);

    defmt::info!("Initialization finished");

    // Schedule tasks
    unwrap!(spawner.spawn(bluetooth_task(sd, server)));
    unwrap!(spawner.spawn(notify(vibrator)));
    unwrap!(spawner.spawn(face_task(display, store, clock, server)));
}
