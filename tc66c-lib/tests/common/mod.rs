//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use std::time::Duration;
#[allow(unused_imports)]
pub use tc66c_lib::constants::{AES_KEY, BLOCK_SIZE, CHECKSUM_SPAN, PACKET_SIZE};
#[allow(unused_imports)]
pub use tc66c_lib::error::TC66Error;
#[allow(unused_imports)]
pub use tc66c_lib::packet::{BlockTag, Pac1Block, Pac2Block, Pac3Block, block_checksum};
#[allow(unused_imports)]
pub use tc66c_lib::{Channel, DeviceMode, FirmwareUpdateProgress, Reading, SessionConfig, Tc66c};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use tc66c_lib::cipher::encrypt_ecb;
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromZeros, IntoBytes};

/// One scripted read result
#[derive(Debug, Clone)]
pub enum MockRead {
    Data(Vec<u8>),
    Error(io::ErrorKind),
}

/// Everything the mock channel saw and still has queued
#[derive(Debug, Default)]
pub struct MockState {
    /// Every write, in order
    pub written: Vec<Vec<u8>>,
    /// Every timeout change, in order
    pub timeouts: Vec<Duration>,
    /// Replies queued up, one consumed per write
    pub script: VecDeque<Vec<MockRead>>,
    /// Reads ready to be returned
    pub inbox: VecDeque<MockRead>,
    pub closed: bool,
}

#[allow(dead_code)]
impl MockState {
    pub fn written_commands(&self) -> Vec<String> {
        self.written
            .iter()
            .map(|w| String::from_utf8_lossy(w).to_string())
            .collect()
    }
}

/// Scripted in-memory channel.
///
/// Each write releases the next scripted reply into the read queue. Reads
/// hand back at most one queued chunk (split to fit the buffer) and return
/// `Ok(0)` once the queue is empty, like an idle serial line.
#[derive(Debug, Clone, Default)]
pub struct MockChannel {
    state: Rc<RefCell<MockState>>,
}

#[allow(dead_code)]
impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for inspecting the channel after the session took ownership
    pub fn state(&self) -> Rc<RefCell<MockState>> {
        Rc::clone(&self.state)
    }

    /// Reply to the next write with `data` in one piece
    pub fn reply(self, data: &[u8]) -> Self {
        self.reply_chunks(&[data])
    }

    /// Reply to the next write with `chunks`, each returned by its own read
    pub fn reply_chunks(self, chunks: &[&[u8]]) -> Self {
        let reads = chunks.iter().map(|c| MockRead::Data(c.to_vec())).collect();
        self.reply_reads(reads)
    }

    pub fn reply_reads(self, reads: Vec<MockRead>) -> Self {
        self.state.borrow_mut().script.push_back(reads);
        self
    }

    /// The next write gets no reply at all
    pub fn silent(self) -> Self {
        self.reply_reads(Vec::new())
    }

    /// Bytes already sitting on the line before anything is written
    pub fn stale(self, data: &[u8]) -> Self {
        self.state.borrow_mut().inbox.push_back(MockRead::Data(data.to_vec()));
        self
    }
}

impl Channel for MockChannel {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        state.written.push(data.to_vec());
        if let Some(reply) = state.script.pop_front() {
            state.inbox.extend(reply);
        }
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        match state.inbox.pop_front() {
            None => Ok(0),
            Some(MockRead::Error(kind)) => Err(io::Error::new(kind, "mock read failure")),
            Some(MockRead::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    state.inbox.push_front(MockRead::Data(rest));
                }
                Ok(n)
            }
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.state.borrow_mut().timeouts.push(timeout);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.state.borrow_mut().closed = true;
        Ok(())
    }
}

/// Session timing without the settle delay, so tests run instantly
#[allow(dead_code)]
pub fn fast_config() -> SessionConfig {
    SessionConfig::default().with_settle_delay(Duration::ZERO)
}

/// Open a session on `channel` with `fast_config`
#[allow(dead_code)]
pub fn open_session(channel: MockChannel) -> Tc66c<MockChannel> {
    Tc66c::with_config(channel, fast_config()).expect("session should open")
}

/// Write the block checksum into bytes 60..62
#[allow(dead_code)]
pub fn seal_block(block: &mut [u8]) {
    let crc = block_checksum(block);
    block[CHECKSUM_SPAN..CHECKSUM_SPAN + 2].copy_from_slice(&crc.to_le_bytes());
}

/// Plaintext telemetry packet with known field values
#[derive(Debug, Clone, Copy)]
pub struct PacketFixture {
    pub pac1: Pac1Block,
    pub pac2: Pac2Block,
    pub pac3: Pac3Block,
}

#[allow(dead_code)]
impl PacketFixture {
    pub fn sample() -> Self {
        let mut pac1 = Pac1Block::new_zeroed();
        pac1.tag = *b"pac1";
        pac1.product = *b"TC66";
        pac1.version = *b"1.4\0";
        pac1.serial_number = U32::new(1_234_567);
        pac1.num_runs = U32::new(42);
        pac1.voltage = U32::new(51_234);
        pac1.current = U32::new(123_456);
        pac1.power = U32::new(63_250);

        let mut pac2 = Pac2Block::new_zeroed();
        pac2.tag = *b"pac2";
        pac2.resistance = U32::new(415);
        pac2.group0_mah = U32::new(100);
        pac2.group0_mwh = U32::new(500);
        pac2.group1_mah = U32::new(7);
        pac2.group1_mwh = U32::new(35);
        pac2.temperature_sign = U32::new(0);
        pac2.temperature = U32::new(25);
        pac2.dplus_voltage = U32::new(60);
        pac2.dminus_voltage = U32::new(1);

        let mut pac3 = Pac3Block::new_zeroed();
        pac3.tag = *b"pac3";
        pac3.reserved[..8].copy_from_slice(b"reserved");

        let mut fixture = Self { pac1, pac2, pac3 };
        fixture.seal();
        fixture
    }

    /// Recompute all three checksums after editing fields
    pub fn seal(&mut self) {
        self.pac1.checksum = U16::new(block_checksum(self.pac1.as_bytes()));
        self.pac2.checksum = U16::new(block_checksum(self.pac2.as_bytes()));
        self.pac3.checksum = U16::new(block_checksum(self.pac3.as_bytes()));
    }

    /// The reading `sample()` decodes to
    pub fn expected_reading() -> Reading {
        Reading {
            product: "TC66".to_string(),
            version: "1.4".to_string(),
            serial_number: 1_234_567,
            num_runs: 42,
            voltage: 5.1234,
            current: 1.23456,
            power: 6.325,
            resistance: 4.15,
            group0_mah: 100,
            group0_mwh: 500,
            group1_mah: 7,
            group1_mwh: 35,
            temperature: 25.0,
            dplus_voltage: 0.6,
            dminus_voltage: 0.01,
        }
    }

    pub fn block(&self, tag: BlockTag) -> [u8; BLOCK_SIZE] {
        let bytes = match tag {
            BlockTag::Pac1 => self.pac1.as_bytes(),
            BlockTag::Pac2 => self.pac2.as_bytes(),
            BlockTag::Pac3 => self.pac3.as_bytes(),
        };
        bytes.try_into().expect("blocks are 64 bytes")
    }

    /// Decrypted packet with the blocks in the given physical order
    pub fn plaintext_in_order(&self, order: [BlockTag; 3]) -> [u8; PACKET_SIZE] {
        let mut packet = [0u8; PACKET_SIZE];
        for (position, tag) in order.into_iter().enumerate() {
            packet[position * BLOCK_SIZE..(position + 1) * BLOCK_SIZE].copy_from_slice(&self.block(tag));
        }
        packet
    }

    pub fn plaintext(&self) -> [u8; PACKET_SIZE] {
        self.plaintext_in_order(BlockTag::ALL)
    }

    /// Packet as the device sends it
    pub fn encrypted(&self) -> [u8; PACKET_SIZE] {
        encrypt_packet(&self.plaintext())
    }
}

#[allow(dead_code)]
pub fn encrypt_packet(plaintext: &[u8; PACKET_SIZE]) -> [u8; PACKET_SIZE] {
    encrypt_ecb(plaintext, &AES_KEY).expect("static key is valid")
}

/// All six physical orderings of the three blocks
#[allow(dead_code)]
pub const ALL_ORDERS: [[BlockTag; 3]; 6] = [
    [BlockTag::Pac1, BlockTag::Pac2, BlockTag::Pac3],
    [BlockTag::Pac1, BlockTag::Pac3, BlockTag::Pac2],
    [BlockTag::Pac2, BlockTag::Pac1, BlockTag::Pac3],
    [BlockTag::Pac2, BlockTag::Pac3, BlockTag::Pac1],
    [BlockTag::Pac3, BlockTag::Pac1, BlockTag::Pac2],
    [BlockTag::Pac3, BlockTag::Pac2, BlockTag::Pac1],
];

/// One 8-byte recording record
#[allow(dead_code)]
pub fn recording_record(voltage_raw: u32, current_raw: u32) -> Vec<u8> {
    let mut bytes = voltage_raw.to_le_bytes().to_vec();
    bytes.extend_from_slice(&current_raw.to_le_bytes());
    bytes
}
