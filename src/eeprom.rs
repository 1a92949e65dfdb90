//! 24LC256 (256 Kbit) serial EEPROM over blocking embedded-hal I2C.
//!
//! - 7-bit address 0x54 (A2 strapped high).
//! - 16-bit big-endian word address.
//! - Writes never cross a 64-byte page; each page write is followed by the
//!   datasheet write-cycle time before the next transfer.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::warn;

use crate::traits::ByteStore;

pub const EEPROM_I2C_ADDR: u8 = 0x54;
pub const EEPROM_PAGE_LEN: usize = 64;
pub const EEPROM_MEM_LEN: usize = 0x8000;
pub const EEPROM_WRITE_SETTLE_MS: u32 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromError {
    /// Bus error or timeout, the whole transfer is void.
    Transfer,
    OutOfRange,
}

impl fmt::Display for EepromError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EepromError::Transfer => f.write_str("eeprom transfer failed"),
            EepromError::OutOfRange => f.write_str("eeprom address out of range"),
        }
    }
}

pub struct Eeprom24lc256<I2C, D> {
    i2c: I2C,
    delay: D,
    addr_7bit: u8,
}

impl<I2C: I2c, D: DelayNs> Eeprom24lc256<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, EEPROM_I2C_ADDR)
    }

    pub fn with_address(i2c: I2C, delay: D, addr_7bit: u8) -> Self {
        Self {
            i2c,
            delay,
            addr_7bit,
        }
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    pub fn read(&mut self, addr: u16, out: &mut [u8]) -> Result<(), EepromError> {
        check_range(addr, out.len())?;
        if out.is_empty() {
            return Ok(());
        }
        self.i2c
            .write_read(self.addr_7bit, &addr.to_be_bytes(), out)
            .map_err(|_| {
                warn!("eeprom: read of {} bytes at {:#06x} failed", out.len(), addr);
                EepromError::Transfer
            })
    }

    pub fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), EepromError> {
        check_range(addr, data.len())?;

        let mut cur_addr = addr as usize;
        let mut offset = 0usize;
        while offset < data.len() {
            let page_rem = EEPROM_PAGE_LEN - cur_addr % EEPROM_PAGE_LEN;
            let chunk_len = (data.len() - offset).min(page_rem);
            self.write_page(cur_addr as u16, &data[offset..offset + chunk_len])?;
            // The part NAKs everything until the internal write cycle ends.
            self.delay.delay_ms(EEPROM_WRITE_SETTLE_MS);
            cur_addr += chunk_len;
            offset += chunk_len;
        }
        Ok(())
    }

    /// Read the whole memory page by page and hand each page to `f`.
    pub fn dump<F>(&mut self, mut f: F) -> Result<(), EepromError>
    where
        F: FnMut(u16, &[u8]),
    {
        let mut page = [0u8; EEPROM_PAGE_LEN];
        for start in (0..EEPROM_MEM_LEN).step_by(EEPROM_PAGE_LEN) {
            let addr = start as u16;
            self.read(addr, &mut page)?;
            f(addr, &page);
        }
        Ok(())
    }

    fn write_page(&mut self, addr: u16, chunk: &[u8]) -> Result<(), EepromError> {
        let mut frame = [0u8; 2 + EEPROM_PAGE_LEN];
        frame[..2].copy_from_slice(&addr.to_be_bytes());
        frame[2..2 + chunk.len()].copy_from_slice(chunk);
        self.i2c
            .write(self.addr_7bit, &frame[..2 + chunk.len()])
            .map_err(|_| {
                warn!("eeprom: page write at {:#06x} failed", addr);
                EepromError::Transfer
            })
    }
}

impl<I2C: I2c, D: DelayNs> ByteStore for Eeprom24lc256<I2C, D> {
    fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), EepromError> {
        Eeprom24lc256::read(self, addr, buf)
    }

    fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), EepromError> {
        Eeprom24lc256::write(self, addr, data)
    }
}

fn check_range(addr: u16, len: usize) -> Result<(), EepromError> {
    if (addr as usize).saturating_add(len) > EEPROM_MEM_LEN {
        return Err(EepromError::OutOfRange);
    }
    Ok(())
}
