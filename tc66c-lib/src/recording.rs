//! Decoder for the `gtrec` recording stream
//!
//! The device dumps its recording buffer as a run of 8-byte records with no
//! header and no length. Each record is two little-endian u32 values,
//! voltage in 0.1 mV and current in 10 µA. The stream ends when the line
//! goes idle.

use crate::constants::RECORD_SIZE;
use crate::error::Result;
use crate::reading::RecordingEntry;
use crate::transport::Channel;
use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

/// Reassembles arbitrarily split chunks into recording entries
#[derive(Debug, Default)]
pub struct RecordingDecoder {
    buffer: BytesMut,
}

impl RecordingDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of raw stream data
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Take the next complete record, if one is buffered
    pub fn next_entry(&mut self) -> Option<RecordingEntry> {
        if self.buffer.len() < RECORD_SIZE {
            return None;
        }
        let voltage_raw = self.buffer.get_u32_le();
        let current_raw = self.buffer.get_u32_le();
        Some(RecordingEntry::from_raw(voltage_raw, current_raw))
    }

    /// Bytes buffered that do not yet form a full record
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Stop decoding, discarding any incomplete trailing record
    pub fn finish(self) -> usize {
        let discarded = self.buffer.len();
        if discarded > 0 {
            debug!("Discarding {} trailing recording bytes", discarded);
        }
        discarded
    }
}

/// Lazily reads and decodes recording entries from a channel.
///
/// Ends at the first zero-length read. A read error is yielded once and
/// ends the iteration.
pub struct Recordings<'a, C: Channel + ?Sized> {
    channel: &'a mut C,
    decoder: Option<RecordingDecoder>,
    chunk: Vec<u8>,
}

impl<'a, C: Channel + ?Sized> Recordings<'a, C> {
    pub(crate) fn new(channel: &'a mut C, read_size: usize) -> Self {
        Self {
            channel,
            decoder: Some(RecordingDecoder::new()),
            chunk: vec![0u8; read_size.max(1)],
        }
    }
}

impl<C: Channel + ?Sized> Iterator for Recordings<'_, C> {
    type Item = Result<RecordingEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let decoder = self.decoder.as_mut()?;
            if let Some(entry) = decoder.next_entry() {
                return Some(Ok(entry));
            }

            match self.channel.read(&mut self.chunk) {
                Ok(0) => {
                    if let Some(decoder) = self.decoder.take() {
                        decoder.finish();
                    }
                    return None;
                }
                Ok(n) => {
                    trace!("Recording chunk: {}", hex::encode(&self.chunk[..n]));
                    decoder.push(&self.chunk[..n]);
                }
                Err(e) => {
                    self.decoder = None;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}
