//! CRC-16/MODBUS as used by the per-block integrity field.

use crc::{CRC_16_MODBUS, Crc};

const CRC16_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Calculate the CRC-16/MODBUS checksum of `data`
pub fn crc16_modbus(data: &[u8]) -> u16 {
    CRC16_MODBUS.checksum(data)
}

/// Recompute the checksum of `data` and compare it with `expected`
pub fn verify_checksum(data: &[u8], expected: u16) -> bool {
    crc16_modbus(data) == expected
}
