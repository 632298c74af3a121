use crate::device::DeviceMode;
use crate::packet::BlockTag;
use std::io;
use thiserror::Error;

/// The primary error type for the `tc66c-lib` library.
#[derive(Error, Debug)]
pub enum TC66Error {
    #[error("Invalid packet format: {0}")]
    Format(String),

    #[error("{block} checksum mismatch: expected {expected:#06x}, calculated {actual:#06x}")]
    Checksum { block: BlockTag, expected: u16, actual: u16 },

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("Invalid device mode response: {0}")]
    ModeQuery(String),

    #[error("Device must be in {required} mode (current mode: {actual})")]
    Mode { required: DeviceMode, actual: DeviceMode },

    #[error("Timeout reading response (got {received} of {expected} bytes)")]
    Timeout { received: usize, expected: usize },

    #[error("Device replied with {actual:?} to '{command}', expected {expected:?}")]
    UnexpectedResponse {
        command: &'static str,
        expected: String,
        actual: String,
    },

    #[error(
        "Device replied with {response:?} for chunk {chunk}/{total_chunks}, expected \"OK\". \
         Device may not boot normally, try the update again"
    )]
    ChunkRejected {
        chunk: usize,
        total_chunks: usize,
        response: String,
    },

    #[error("Firmware data is empty")]
    EmptyFirmware,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, TC66Error>;
