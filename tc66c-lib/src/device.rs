use crate::constants::{
    CHUNK_OK, CMD_GET_REC, CMD_GET_VA, CMD_LAST_PAGE, CMD_NEXT_PAGE, CMD_QUERY, CMD_ROTATE, CMD_UPDATE,
    COMMAND_TERMINATOR, FIRMWARE_CHUNK_SIZE, MODE_BOOTLOADER, MODE_FIRMWARE, PACKET_SIZE, RECORD_SIZE,
    UPDATE_READY,
};
use crate::error::{Result, TC66Error};
use crate::packet::decode_packet;
use crate::reading::{Reading, RecordingEntry};
use crate::recording::Recordings;
use crate::transport::{Channel, write_all};
use std::thread::sleep;
use std::time::Duration;
use strum_macros::Display;
use tracing::{debug, info, trace, warn};

// Default timing
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_millis(10);
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);

const FLUSH_BUFFER_SIZE: usize = 1024;

/// Operating mode reported by the `query` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DeviceMode {
    #[strum(to_string = "firmware")]
    Firmware,
    #[strum(to_string = "bootloader")]
    Bootloader,
    #[strum(to_string = "unknown")]
    Unknown,
}

/// Progress of a firmware update, reported after every acknowledged chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareUpdateProgress {
    pub bytes_sent: usize,
    pub total_bytes: usize,
    pub chunks_sent: usize,
    pub total_chunks: usize,
}

impl FirmwareUpdateProgress {
    pub fn percentage(&self) -> f64 {
        self.bytes_sent as f64 / self.total_bytes as f64 * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_sent == self.total_bytes
    }
}

/// Session timing configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a response read may block before it counts as stalled
    pub read_timeout: Duration,
    /// Read timeout used while draining stale bytes before a command
    pub flush_timeout: Duration,
    /// Pause between writing a command and reading its response
    pub settle_delay: Duration,
    /// Size of each read while streaming recordings
    pub recording_read_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            recording_read_size: RECORD_SIZE,
        }
    }
}

impl SessionConfig {
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_recording_read_size(mut self, size: usize) -> Self {
        self.recording_read_size = size;
        self
    }
}

/// A session with one TC66/TC66C over an owned channel.
///
/// The device mode is queried once when the session is created and cached
/// for its lifetime. Not safe for concurrent use; callers serialize requests.
pub struct Tc66c<C: Channel> {
    channel: C,
    mode: DeviceMode,
    config: SessionConfig,
}

impl<C: Channel> Tc66c<C> {
    /// Open a session with default timing, detecting the device mode
    pub fn new(channel: C) -> Result<Self> {
        Self::with_config(channel, SessionConfig::default())
    }

    /// Open a session with custom timing, detecting the device mode
    pub fn with_config(mut channel: C, config: SessionConfig) -> Result<Self> {
        channel.set_read_timeout(config.read_timeout)?;

        let mut device = Self {
            channel,
            mode: DeviceMode::Unknown,
            config,
        };

        device.mode = device.query_mode()?;
        info!("Connected, device mode: {}", device.mode);
        Ok(device)
    }

    /// Mode detected when the session was created
    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Send `query` and return the raw 4-byte answer. The cached mode is not
    /// changed.
    pub fn query(&mut self) -> Result<[u8; 4]> {
        self.send_command(CMD_QUERY)?;
        let response = self.read_exact_response::<4>()?;
        Ok(response)
    }

    fn query_mode(&mut self) -> Result<DeviceMode> {
        let response = match self.query() {
            Ok(response) => response,
            Err(TC66Error::Timeout { received, expected }) => {
                return Err(TC66Error::ModeQuery(format!(
                    "truncated after {} of {} bytes",
                    received, expected
                )));
            }
            Err(e) => return Err(e),
        };

        match &response {
            r if r == MODE_FIRMWARE => Ok(DeviceMode::Firmware),
            r if r == MODE_BOOTLOADER => Ok(DeviceMode::Bootloader),
            other => Err(TC66Error::ModeQuery(String::from_utf8_lossy(other).to_string())),
        }
    }

    fn require_mode(&self, required: DeviceMode) -> Result<()> {
        if self.mode != required {
            return Err(TC66Error::Mode {
                required,
                actual: self.mode,
            });
        }
        Ok(())
    }

    /// Poll one telemetry reading (`getva`)
    pub fn get_reading(&mut self) -> Result<Reading> {
        self.require_mode(DeviceMode::Firmware)?;

        self.send_command(CMD_GET_VA)?;
        let encrypted = self.read_exact_response::<PACKET_SIZE>()?;
        decode_packet(&encrypted)
    }

    /// Stream the on-device recording buffer (`gtrec`)
    ///
    /// Entries are decoded as bytes arrive; the iterator ends when the
    /// device stops sending.
    pub fn recordings(&mut self) -> Result<Recordings<'_, C>> {
        self.require_mode(DeviceMode::Firmware)?;

        self.send_command(CMD_GET_REC)?;
        Ok(Recordings::new(&mut self.channel, self.config.recording_read_size))
    }

    /// Retrieve the whole recording buffer
    pub fn get_recordings(&mut self) -> Result<Vec<RecordingEntry>> {
        let entries = self.recordings()?.collect::<Result<Vec<_>>>()?;
        debug!("Received {} recording entries", entries.len());
        Ok(entries)
    }

    /// Switch the display to the previous page
    pub fn previous_page(&mut self) -> Result<()> {
        self.require_mode(DeviceMode::Firmware)?;
        self.send_command(CMD_LAST_PAGE)
    }

    /// Switch the display to the next page
    pub fn next_page(&mut self) -> Result<()> {
        self.require_mode(DeviceMode::Firmware)?;
        self.send_command(CMD_NEXT_PAGE)
    }

    pub fn rotate_screen(&mut self) -> Result<()> {
        self.require_mode(DeviceMode::Firmware)?;
        self.send_command(CMD_ROTATE)
    }

    /// Flash `firmware` without progress reporting
    pub fn update_firmware(&mut self, firmware: &[u8]) -> Result<()> {
        self.update_firmware_with_progress(firmware, |_| {})
    }

    /// Flash `firmware`, calling `progress` after every acknowledged chunk.
    ///
    /// Requires bootloader mode. A rejected chunk aborts the transfer and may
    /// leave the device unable to boot until a full update succeeds; nothing
    /// is retried here.
    pub fn update_firmware_with_progress<F>(&mut self, firmware: &[u8], mut progress: F) -> Result<()>
    where
        F: FnMut(FirmwareUpdateProgress),
    {
        self.require_mode(DeviceMode::Bootloader)?;

        let total_bytes = firmware.len();
        if total_bytes == 0 {
            return Err(TC66Error::EmptyFirmware);
        }
        let total_chunks = total_bytes.div_ceil(FIRMWARE_CHUNK_SIZE);

        info!(
            "Starting firmware update: {} bytes in {} chunks",
            total_bytes, total_chunks
        );

        self.send_command(CMD_UPDATE)?;
        let response = self.read_exact_response::<5>()?;
        if &response != UPDATE_READY {
            return Err(TC66Error::UnexpectedResponse {
                command: CMD_UPDATE,
                expected: String::from_utf8_lossy(UPDATE_READY).to_string(),
                actual: String::from_utf8_lossy(&response).to_string(),
            });
        }

        let mut bytes_sent = 0;
        for (index, chunk) in firmware.chunks(FIRMWARE_CHUNK_SIZE).enumerate() {
            let chunk_number = index + 1;

            write_all(&mut self.channel, chunk)?;
            let ack = self.read_exact_response::<2>()?;
            if &ack != CHUNK_OK {
                warn!("Chunk {}/{} rejected: {}", chunk_number, total_chunks, hex::encode(ack));
                return Err(TC66Error::ChunkRejected {
                    chunk: chunk_number,
                    total_chunks,
                    response: String::from_utf8_lossy(&ack).to_string(),
                });
            }

            bytes_sent += chunk.len();
            trace!("Chunk {}/{} OK", chunk_number, total_chunks);
            progress(FirmwareUpdateProgress {
                bytes_sent,
                total_bytes,
                chunks_sent: chunk_number,
                total_chunks,
            });
        }

        info!("Firmware update complete");
        Ok(())
    }

    /// Close the channel and end the session
    pub fn close(mut self) -> Result<()> {
        self.channel.close()?;
        Ok(())
    }

    /// End the session and hand back the channel
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Drain stale bytes left on the line. Best effort: errors are ignored.
    fn flush_input(&mut self) {
        if let Err(e) = self.channel.set_read_timeout(self.config.flush_timeout) {
            warn!("Failed to shorten read timeout for flush: {}", e);
            return;
        }

        let mut buf = [0u8; FLUSH_BUFFER_SIZE];
        let mut discarded = 0;
        while let Ok(n) = self.channel.read(&mut buf) {
            if n == 0 {
                break;
            }
            discarded += n;
        }
        if discarded > 0 {
            debug!("Flushed {} stale bytes", discarded);
        }

        if let Err(e) = self.channel.set_read_timeout(self.config.read_timeout) {
            warn!("Failed to restore read timeout after flush: {}", e);
        }
    }

    /// Commands are plain text followed by CRLF
    fn send_command(&mut self, command: &str) -> Result<()> {
        self.flush_input();

        debug!("Sending command '{}'", command);
        let mut message = Vec::with_capacity(command.len() + COMMAND_TERMINATOR.len());
        message.extend_from_slice(command.as_bytes());
        message.extend_from_slice(COMMAND_TERMINATOR);
        write_all(&mut self.channel, &message)?;

        if !self.config.settle_delay.is_zero() {
            sleep(self.config.settle_delay);
        }
        Ok(())
    }

    /// Read exactly `N` bytes, failing if the channel stalls first
    fn read_exact_response<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buffer = [0u8; N];
        let mut received = 0;

        while received < N {
            let n = self.channel.read(&mut buffer[received..])?;
            if n == 0 {
                return Err(TC66Error::Timeout { received, expected: N });
            }
            received += n;
        }

        trace!("Received {} bytes: {}", N, hex::encode(buffer));
        Ok(buffer)
    }
}
