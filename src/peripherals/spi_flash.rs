//! SPI flash module
//!
//! Driver for the 4 MiB XT25F32B NOR flash on the PineTime's SPI bus, and a
//! settings store keeping the record in one of its sectors.

use core::fmt;

use embedded_hal::{
    delay::DelayNs,
    spi::{Operation, SpiDevice},
};

use crate::system::settings::SettingsStore;

/// Total capacity in bytes
pub const FLASH_SIZE: u32 = 4 * 1024 * 1024;
/// Largest unit written by a single program command
pub const PAGE_SIZE: u32 = 256;
/// Smallest erasable unit
pub const SECTOR_SIZE: u32 = 4096;

/// Upper bound for a page program (tPP is 2.4ms max)
pub const PROGRAM_TIMEOUT_US: u32 = 5_000;
/// Upper bound for a sector erase (tSE is 300ms max)
pub const ERASE_TIMEOUT_US: u32 = 500_000;
/// Pause between two status register reads
const POLL_INTERVAL_US: u32 = 50;

const CMD_WRITE_ENABLE: u8 = 0x06;
const CMD_READ_STATUS: u8 = 0x05;
const CMD_READ: u8 = 0x03;
const CMD_PAGE_PROGRAM: u8 = 0x02;
const CMD_SECTOR_ERASE: u8 = 0x20;
const CMD_DEEP_POWER_DOWN: u8 = 0xb9;
const CMD_RELEASE_POWER_DOWN: u8 = 0xab;

/// Write in progress
const STATUS_WIP: u8 = 0x01;

/// Value of erased flash
const ERASED: u8 = 0xff;

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// SPI bus error
    Spi(E),
    /// Request falls outside the chip, or crosses a page or sector
    OutOfBounds,
    /// Chip still busy after the operation's time limit
    Timeout,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Spi(e)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(e) => write!(f, "SPI error: {:?}", e),
            Error::OutOfBounds => write!(f, "flash access out of bounds"),
            Error::Timeout => write!(f, "flash busy timeout"),
        }
    }
}

fn address(addr: u32) -> [u8; 3] {
    [(addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
}

pub struct Flash<SPI, D> {
    /// Flash SPI interface
    interface: SPI,
    /// Paces busy polling and wake-up
    delay: D,
}

impl<SPI, D> Flash<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    /// Configure flash settings on boot
    pub fn init(interface: SPI, delay: D) -> Self {
        Self { interface, delay }
    }

    /// Enable deep power down state
    pub fn power_down(&mut self) -> Result<(), Error<SPI::Error>> {
        self.interface.write(&[CMD_DEEP_POWER_DOWN])?;
        Ok(())
    }

    /// Read device ID
    pub fn read_id(&mut self) -> Result<u8, Error<SPI::Error>> {
        // Instruction code `ABH` followed by 3 dummy bytes, the ID is clocked out after them
        let mut buf = [CMD_RELEASE_POWER_DOWN, 0x00, 0x00, 0x00, 0x00];
        self.interface.transfer_in_place(&mut buf)?;
        Ok(buf[4])
    }

    /// Wake from deep power down state
    pub fn wake(&mut self) -> Result<(), Error<SPI::Error>> {
        self.interface.write(&[CMD_RELEASE_POWER_DOWN])?;
        // tRES1: CS must stay high for 20μs before the next command
        self.delay.delay_us(20);
        Ok(())
    }

    /// Read `buf.len()` bytes starting at `addr`
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error<SPI::Error>> {
        if addr as u64 + buf.len() as u64 > FLASH_SIZE as u64 {
            return Err(Error::OutOfBounds);
        }
        let [a2, a1, a0] = address(addr);
        self.interface.transaction(&mut [
            Operation::Write(&[CMD_READ, a2, a1, a0]),
            Operation::Read(buf),
        ])?;
        Ok(())
    }

    fn read_status(&mut self) -> Result<u8, Error<SPI::Error>> {
        let mut status = [0u8];
        self.interface.transaction(&mut [
            Operation::Write(&[CMD_READ_STATUS]),
            Operation::Read(&mut status),
        ])?;
        Ok(status[0])
    }

    /// Poll until the current program or erase finishes, giving up after
    /// `timeout_us`
    pub fn wait_idle(&mut self, timeout_us: u32) -> Result<(), Error<SPI::Error>> {
        let mut waited = 0;
        loop {
            if self.read_status()? & STATUS_WIP == 0 {
                return Ok(());
            }
            if waited >= timeout_us {
                #[cfg(feature = "defmt")]
                defmt::warn!("Flash still busy after {}us", waited);
                return Err(Error::Timeout);
            }
            self.delay.delay_us(POLL_INTERVAL_US);
            waited += POLL_INTERVAL_US;
        }
    }

    fn write_enable(&mut self) -> Result<(), Error<SPI::Error>> {
        self.interface.write(&[CMD_WRITE_ENABLE])?;
        Ok(())
    }

    /// Program `data` at `addr`. Must not cross a page boundary.
    pub fn program_page(&mut self, addr: u32, data: &[u8]) -> Result<(), Error<SPI::Error>> {
        if addr >= FLASH_SIZE {
            return Err(Error::OutOfBounds);
        }
        if data.is_empty() {
            return Ok(());
        }
        let page_end = (addr - addr % PAGE_SIZE) as u64 + PAGE_SIZE as u64;
        if addr as u64 + data.len() as u64 > page_end {
            return Err(Error::OutOfBounds);
        }

        self.write_enable()?;
        let [a2, a1, a0] = address(addr);
        self.interface.transaction(&mut [
            Operation::Write(&[CMD_PAGE_PROGRAM, a2, a1, a0]),
            Operation::Write(data),
        ])?;
        self.wait_idle(PROGRAM_TIMEOUT_US)
    }

    /// Erase the sector containing `addr`
    pub fn erase_sector(&mut self, addr: u32) -> Result<(), Error<SPI::Error>> {
        if addr >= FLASH_SIZE {
            return Err(Error::OutOfBounds);
        }
        self.write_enable()?;
        let [a2, a1, a0] = address(addr - addr % SECTOR_SIZE);
        self.interface
            .write(&[CMD_SECTOR_ERASE, a2, a1, a0])?;
        self.wait_idle(ERASE_TIMEOUT_US)
    }

    pub fn release(self) -> SPI {
        self.interface
    }
}

/// Settings record kept at the start of a dedicated sector.
///
/// Layout: `[len: u8][record; len]`. An erased length byte means nothing has
/// been saved yet.
pub struct FlashSettingsStore<SPI, D> {
    flash: Flash<SPI, D>,
    /// Start of the sector holding the record
    base: u32,
}

/// Last sector of the chip
pub const SETTINGS_BASE: u32 = FLASH_SIZE - SECTOR_SIZE;

impl<SPI, D> FlashSettingsStore<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    pub fn new(flash: Flash<SPI, D>, base: u32) -> Self {
        Self {
            flash,
            base: base - base % SECTOR_SIZE,
        }
    }
}

impl<SPI, D> SettingsStore for FlashSettingsStore<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    type Error = Error<SPI::Error>;

    fn load(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error> {
        let mut len = [0u8];
        self.flash.read(self.base, &mut len)?;
        if len[0] == ERASED {
            return Ok(None);
        }

        let len = len[0] as usize;
        let n = len.min(buf.len());
        self.flash.read(self.base + 1, &mut buf[..n])?;
        Ok(Some(len))
    }

    fn save(&mut self, record: &[u8]) -> Result<(), Self::Error> {
        // Header and record go into the first page
        if record.len() >= ERASED as usize || record.len() + 1 > PAGE_SIZE as usize {
            return Err(Error::OutOfBounds);
        }

        self.flash.erase_sector(self.base)?;
        self.flash.program_page(self.base, &[record.len() as u8])?;
        self.flash.program_page(self.base + 1, record)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("Saved {} byte settings record at {:#x}", record.len(), self.base);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::settings::{load_settings, save_settings, Settings};
    use core::convert::Infallible;
    use embedded_hal::spi::ErrorType;

    const CHIP_ID: u8 = 0x15;

    /// NOR flash simulated in RAM
    struct FakeChip {
        memory: Vec<u8>,
        write_enabled: bool,
        powered_down: bool,
        /// Status reads reporting WIP after each program or erase
        busy_polls: usize,
        busy_left: usize,
        /// Status register reads back all ones, as with no chip on the bus
        stuck: bool,
        /// Commands seen, first byte of each transaction
        log: Vec<u8>,
    }

    impl FakeChip {
        fn new() -> Self {
            Self {
                memory: vec![ERASED; FLASH_SIZE as usize],
                write_enabled: false,
                powered_down: false,
                busy_polls: 0,
                busy_left: 0,
                stuck: false,
                log: Vec::new(),
            }
        }

        fn busy_for(polls: usize) -> Self {
            Self {
                busy_polls: polls,
                ..Self::new()
            }
        }

        fn stuck() -> Self {
            Self {
                stuck: true,
                ..Self::new()
            }
        }

        fn addr(tx: &[u8]) -> usize {
            ((tx[1] as usize) << 16) | ((tx[2] as usize) << 8) | tx[3] as usize
        }

        fn status(&mut self) -> u8 {
            if self.stuck {
                return 0xff;
            }
            if self.busy_left > 0 {
                self.busy_left -= 1;
                return STATUS_WIP;
            }
            0
        }

        fn status_reads(&self) -> usize {
            self.log.iter().filter(|cmd| **cmd == CMD_READ_STATUS).count()
        }
    }

    impl ErrorType for FakeChip {
        type Error = Infallible;
    }

    impl SpiDevice for FakeChip {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
            let mut tx: Vec<u8> = Vec::new();
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(data) => tx.extend_from_slice(data),
                    Operation::Read(buf) => match tx[0] {
                        CMD_READ => {
                            let start = Self::addr(&tx);
                            buf.copy_from_slice(&self.memory[start..start + buf.len()]);
                        }
                        CMD_READ_STATUS => {
                            let status = self.status();
                            buf.fill(status);
                        }
                        _ => buf.fill(0),
                    },
                    Operation::TransferInPlace(buf) => {
                        tx.extend_from_slice(buf);
                        if buf[0] == CMD_RELEASE_POWER_DOWN {
                            self.powered_down = false;
                            if let Some(last) = buf.last_mut() {
                                *last = CHIP_ID;
                            }
                        }
                    }
                    _ => {}
                }
            }

            let cmd = tx[0];
            self.log.push(cmd);
            match cmd {
                CMD_WRITE_ENABLE => self.write_enabled = true,
                CMD_DEEP_POWER_DOWN => self.powered_down = true,
                CMD_RELEASE_POWER_DOWN => self.powered_down = false,
                CMD_PAGE_PROGRAM if self.write_enabled => {
                    let start = Self::addr(&tx);
                    for (i, byte) in tx[4..].iter().enumerate() {
                        // Programming only clears bits
                        self.memory[start + i] &= byte;
                    }
                    self.write_enabled = false;
                    self.busy_left = self.busy_polls;
                }
                CMD_SECTOR_ERASE if self.write_enabled => {
                    let start = Self::addr(&tx);
                    self.memory[start..start + SECTOR_SIZE as usize].fill(ERASED);
                    self.write_enabled = false;
                    self.busy_left = self.busy_polls;
                }
                _ => {}
            }
            Ok(())
        }
    }

    /// Adds up the requested delays
    #[derive(Default)]
    struct FakeDelay {
        total_us: u64,
    }

    impl DelayNs for FakeDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_us += ns as u64 / 1000;
        }
    }

    fn fake_flash(chip: FakeChip) -> Flash<FakeChip, FakeDelay> {
        Flash::init(chip, FakeDelay::default())
    }

    #[test]
    fn test_read_id_and_power() {
        let mut flash = fake_flash(FakeChip::new());
        flash.power_down().unwrap();
        flash.wake().unwrap();
        assert_eq!(flash.delay.total_us, 20);
        assert_eq!(flash.read_id().unwrap(), CHIP_ID);

        let chip = flash.release();
        assert!(!chip.powered_down);
        assert_eq!(
            chip.log,
            [CMD_DEEP_POWER_DOWN, CMD_RELEASE_POWER_DOWN, CMD_RELEASE_POWER_DOWN]
        );
    }

    #[test]
    fn test_program_and_read() {
        let mut flash = fake_flash(FakeChip::new());
        flash.program_page(0x1000, &[1, 2, 3]).unwrap();

        let mut buf = [0u8; 4];
        flash.read(0x1000, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, ERASED]);

        flash.erase_sector(0x1fff).unwrap();
        flash.read(0x1000, &mut buf).unwrap();
        assert_eq!(buf, [ERASED; 4]);
    }

    #[test]
    fn test_bounds() {
        let mut flash = fake_flash(FakeChip::new());
        let mut buf = [0u8; 2];
        assert_eq!(flash.read(FLASH_SIZE - 1, &mut buf), Err(Error::OutOfBounds));
        assert_eq!(
            flash.program_page(PAGE_SIZE - 1, &[0, 0]),
            Err(Error::OutOfBounds)
        );
        assert_eq!(flash.erase_sector(FLASH_SIZE), Err(Error::OutOfBounds));
    }

    #[test]
    fn test_bounds_near_address_space_end() {
        let mut flash = fake_flash(FakeChip::new());
        assert_eq!(flash.program_page(0xffff_ff80, &[0]), Err(Error::OutOfBounds));
        assert_eq!(flash.program_page(u32::MAX, &[]), Err(Error::OutOfBounds));
        assert_eq!(flash.program_page(FLASH_SIZE, &[0]), Err(Error::OutOfBounds));
        assert_eq!(flash.erase_sector(u32::MAX), Err(Error::OutOfBounds));

        let mut buf = [0u8; 1];
        assert_eq!(flash.read(u32::MAX, &mut buf), Err(Error::OutOfBounds));

        // Nothing reached the bus
        assert!(flash.release().log.is_empty());
    }

    #[test]
    fn test_last_page_programs() {
        let mut flash = fake_flash(FakeChip::new());
        flash.program_page(FLASH_SIZE - 2, &[7, 8]).unwrap();

        let mut buf = [0u8; 2];
        flash.read(FLASH_SIZE - 2, &mut buf).unwrap();
        assert_eq!(buf, [7, 8]);
    }

    #[test]
    fn test_program_polls_until_idle() {
        let mut flash = fake_flash(FakeChip::busy_for(3));
        flash.program_page(0x2000, &[0x5a]).unwrap();
        assert_eq!(flash.delay.total_us, 3 * POLL_INTERVAL_US as u64);

        let chip = flash.release();
        // Three busy reads, then the one reporting idle
        assert_eq!(chip.status_reads(), 4);
        assert_eq!(chip.memory[0x2000], 0x5a);
    }

    #[test]
    fn test_erase_polls_until_idle() {
        let mut flash = fake_flash(FakeChip::busy_for(10));
        flash.erase_sector(0x3000).unwrap();

        let chip = flash.release();
        assert_eq!(chip.status_reads(), 11);
        assert_eq!(
            chip.log[..2],
            [CMD_WRITE_ENABLE, CMD_SECTOR_ERASE]
        );
    }

    #[test]
    fn test_stuck_chip_times_out() {
        let mut flash = fake_flash(FakeChip::stuck());
        assert_eq!(flash.erase_sector(0), Err(Error::Timeout));
        assert_eq!(flash.delay.total_us, ERASE_TIMEOUT_US as u64);

        let mut flash = fake_flash(FakeChip::stuck());
        assert_eq!(flash.program_page(0, &[0]), Err(Error::Timeout));
        assert_eq!(flash.delay.total_us, PROGRAM_TIMEOUT_US as u64);

        let chip = flash.release();
        assert_eq!(
            chip.status_reads(),
            (PROGRAM_TIMEOUT_US / POLL_INTERVAL_US) as usize + 1
        );
    }

    #[test]
    fn test_store_save_fails_on_stuck_chip() {
        let mut store = FlashSettingsStore::new(fake_flash(FakeChip::stuck()), SETTINGS_BASE);
        assert!(save_settings(&mut store, &Settings::default()).is_err());
    }

    #[test]
    fn test_store_roundtrip() {
        let mut store = FlashSettingsStore::new(fake_flash(FakeChip::new()), SETTINGS_BASE);

        // Blank chip
        let mut buf = [0u8; 8];
        assert_eq!(store.load(&mut buf), Ok(None));
        assert_eq!(load_settings(&mut store), Settings::default());

        let settings = Settings {
            show_seconds: true,
            notify_disconnect: false,
        };
        save_settings(&mut store, &settings).unwrap();
        assert_eq!(store.load(&mut buf), Ok(Some(2)));
        assert_eq!(&buf[..2], &[1, 0]);
        assert_eq!(load_settings(&mut store), settings);

        // Overwrite with different bits
        save_settings(&mut store, &Settings::default()).unwrap();
        assert_eq!(load_settings(&mut store), Settings::default());
    }

    #[test]
    fn test_store_short_record() {
        let mut flash = fake_flash(FakeChip::new());
        flash.program_page(SETTINGS_BASE, &[1, 1]).unwrap();

        let mut store = FlashSettingsStore::new(flash, SETTINGS_BASE);
        assert_eq!(load_settings(&mut store), Settings::default());
    }
}
