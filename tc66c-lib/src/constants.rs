// Protocol constants for TC66/TC66C

/// Size of one tagged block in a decrypted telemetry packet (64 bytes)
pub const BLOCK_SIZE: usize = 64;

/// Number of tagged blocks in a telemetry packet
pub const NUM_BLOCKS: usize = 3;

/// Size of a full telemetry packet (192 bytes)
pub const PACKET_SIZE: usize = BLOCK_SIZE * NUM_BLOCKS;

/// Number of leading bytes in a block covered by its checksum
pub const CHECKSUM_SPAN: usize = 60;

/// Size of the ASCII tag at the start of every block
pub const TAG_SIZE: usize = 4;

/// Size of one recording record (voltage + current)
pub const RECORD_SIZE: usize = 8;

/// Size of one firmware chunk sent during update
pub const FIRMWARE_CHUNK_SIZE: usize = 64;

/// Static AES-256 key for telemetry packets
pub const AES_KEY: [u8; 32] = [
    0x58, 0x21, 0xfa, 0x56, 0x01, 0xb2, 0xf0, 0x26, 0x87, 0xff, 0x12, 0x04, 0x62, 0x2a, 0x4f, 0xb0, 0x86, 0xf4, 0x02,
    0x60, 0x81, 0x6f, 0x9a, 0x0b, 0xa7, 0xf1, 0x06, 0x61, 0x9a, 0xb8, 0x72, 0x88,
];

/// Command line terminator
pub const COMMAND_TERMINATOR: &[u8] = b"\r\n";

/// Mode query command (4-byte response)
pub const CMD_QUERY: &str = "query";

/// Telemetry poll command (192-byte response)
pub const CMD_GET_VA: &str = "getva";

/// Recording retrieval command (streamed response)
pub const CMD_GET_REC: &str = "gtrec";

/// Previous page command (no response)
pub const CMD_LAST_PAGE: &str = "lastp";

/// Next page command (no response)
pub const CMD_NEXT_PAGE: &str = "nextp";

/// Rotate screen command (no response)
pub const CMD_ROTATE: &str = "rotat";

/// Bootloader command entering firmware update mode (5-byte response)
pub const CMD_UPDATE: &str = "update";

/// Mode query response in normal firmware
pub const MODE_FIRMWARE: &[u8; 4] = b"firm";

/// Mode query response in the bootloader
pub const MODE_BOOTLOADER: &[u8; 4] = b"boot";

/// Response to `update` when the bootloader is ready for chunks
pub const UPDATE_READY: &[u8; 5] = b"uprdy";

/// Acknowledgement of one firmware chunk
pub const CHUNK_OK: &[u8; 2] = b"OK";

/// Default baud rate of the USB CDC serial interface
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
