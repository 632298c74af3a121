//! Telemetry packet codec
//!
//! A `getva` response is 192 bytes of AES-256-ECB ciphertext. Once decrypted
//! it holds three 64-byte blocks, each starting with an ASCII tag (`pac1`,
//! `pac2`, `pac3`) and ending with a CRC-16/MODBUS over its first 60 bytes:
//!
//! ```text
//! 0..4    tag
//! 4..60   tag-specific payload
//! 60..62  CRC-16/MODBUS of bytes 0..60 (little-endian)
//! 62..64  zero
//! ```
//!
//! The blocks are found by tag, not by position.

use crate::checksum::{crc16_modbus, verify_checksum};
use crate::cipher::decrypt_ecb;
use crate::constants::{AES_KEY, BLOCK_SIZE, CHECKSUM_SPAN, NUM_BLOCKS, PACKET_SIZE, TAG_SIZE};
use crate::error::{Result, TC66Error};
use crate::reading::Reading;
use strum_macros::Display;
use tracing::{debug, trace};
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Identity of a block inside a telemetry packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BlockTag {
    #[strum(to_string = "pac1")]
    Pac1,
    #[strum(to_string = "pac2")]
    Pac2,
    #[strum(to_string = "pac3")]
    Pac3,
}

impl BlockTag {
    /// All tags in canonical order
    pub const ALL: [BlockTag; NUM_BLOCKS] = [BlockTag::Pac1, BlockTag::Pac2, BlockTag::Pac3];

    pub fn as_bytes(&self) -> &'static [u8; TAG_SIZE] {
        match self {
            BlockTag::Pac1 => b"pac1",
            BlockTag::Pac2 => b"pac2",
            BlockTag::Pac3 => b"pac3",
        }
    }

    pub fn from_bytes(tag: &[u8]) -> Option<Self> {
        BlockTag::ALL.into_iter().find(|t| t.as_bytes().as_slice() == tag)
    }

    /// Canonical position of this block in a reordered packet
    pub fn index(&self) -> usize {
        match self {
            BlockTag::Pac1 => 0,
            BlockTag::Pac2 => 1,
            BlockTag::Pac3 => 2,
        }
    }
}

/// Identity and primary electrical block (64 bytes)
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct Pac1Block {
    pub tag: [u8; 4],
    pub product: [u8; 4], // ASCII, NUL padded
    pub version: [u8; 4], // ASCII, NUL padded
    pub serial_number: U32,
    pub reserved: [u8; 28],
    pub num_runs: U32,
    pub voltage: U32, // 0.1 mV
    pub current: U32, // 10 µA
    pub power: U32,   // 0.1 mW
    pub checksum: U16,
    pub padding: [u8; 2],
}

/// Secondary electrical and thermal block (64 bytes)
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct Pac2Block {
    pub tag: [u8; 4],
    pub resistance: U32, // 10 mΩ
    pub group0_mah: U32,
    pub group0_mwh: U32,
    pub group1_mah: U32,
    pub group1_mwh: U32,
    pub temperature_sign: U32, // 0 = positive
    pub temperature: U32,      // magnitude, unscaled
    pub dplus_voltage: U32,    // 10 mV
    pub dminus_voltage: U32,   // 10 mV
    pub reserved: [u8; 20],
    pub checksum: U16,
    pub padding: [u8; 2],
}

/// Trailer block, only tag and checksum are meaningful (64 bytes)
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct Pac3Block {
    pub tag: [u8; 4],
    pub reserved: [u8; 56],
    pub checksum: U16,
    pub padding: [u8; 2],
}

/// Decrypt, reorder, validate and decode one raw `getva` response
pub fn decode_packet(raw: &[u8]) -> Result<Reading> {
    let encrypted: &[u8; PACKET_SIZE] = raw.try_into().map_err(|_| {
        TC66Error::Format(format!(
            "invalid packet size: expected {}, got {}",
            PACKET_SIZE,
            raw.len()
        ))
    })?;

    let decrypted = decrypt_ecb(encrypted, &AES_KEY)?;
    trace!("Decrypted packet: {}", hex::encode(decrypted));

    let ordered = reorder_blocks(&decrypted)?;
    parse_reading(&ordered)
}

/// Locate the three tagged blocks and return them in canonical order
///
/// A packet already in `pac1, pac2, pac3` order is returned unchanged.
pub fn reorder_blocks(data: &[u8; PACKET_SIZE]) -> Result<[u8; PACKET_SIZE]> {
    let mut slots: [Option<usize>; NUM_BLOCKS] = [None; NUM_BLOCKS];

    for (position, block) in data.chunks_exact(BLOCK_SIZE).enumerate() {
        if let Some(tag) = BlockTag::from_bytes(&block[..TAG_SIZE]) {
            slots[tag.index()] = Some(position);
        }
    }

    let mut reordered = [0u8; PACKET_SIZE];
    for tag in BlockTag::ALL {
        let position = slots[tag.index()].ok_or_else(|| TC66Error::Format(format!("missing {} block", tag)))?;
        let src = position * BLOCK_SIZE;
        let dst = tag.index() * BLOCK_SIZE;
        reordered[dst..dst + BLOCK_SIZE].copy_from_slice(&data[src..src + BLOCK_SIZE]);
    }

    if slots != [Some(0), Some(1), Some(2)] {
        debug!("Reordered telemetry blocks from positions {:?}", slots);
    }

    Ok(reordered)
}

/// Validate and decode an already decrypted, canonically ordered packet
pub fn parse_reading(data: &[u8; PACKET_SIZE]) -> Result<Reading> {
    let pac1 = validated_block::<Pac1Block>(data, BlockTag::Pac1)?;
    let pac2 = validated_block::<Pac2Block>(data, BlockTag::Pac2)?;
    validated_block::<Pac3Block>(data, BlockTag::Pac3)?;

    Ok(Reading::from_blocks(pac1, pac2))
}

/// Checksum of a block as computed over its covered span
pub fn block_checksum(block: &[u8]) -> u16 {
    crc16_modbus(&block[..CHECKSUM_SPAN])
}

fn validated_block<T>(data: &[u8; PACKET_SIZE], tag: BlockTag) -> Result<&T>
where
    T: FromBytes + KnownLayout + Immutable,
{
    let offset = tag.index() * BLOCK_SIZE;
    let block = &data[offset..offset + BLOCK_SIZE];

    if &block[..TAG_SIZE] != tag.as_bytes() {
        return Err(TC66Error::Format(format!(
            "invalid {} prefix: got {:?}",
            tag,
            String::from_utf8_lossy(&block[..TAG_SIZE])
        )));
    }

    let expected = u16::from_le_bytes([block[CHECKSUM_SPAN], block[CHECKSUM_SPAN + 1]]);
    if !verify_checksum(&block[..CHECKSUM_SPAN], expected) {
        return Err(TC66Error::Checksum {
            block: tag,
            expected,
            actual: block_checksum(block),
        });
    }

    T::ref_from_bytes(block).map_err(|_| TC66Error::Format(format!("{} block has an unexpected layout", tag)))
}
