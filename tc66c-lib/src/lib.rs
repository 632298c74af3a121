//! Protocol codec and device session for the TC66/TC66C USB power meter.
//!
//! # Features
//!
//! - `serial` (default) - [`SerialChannel`] over a USB CDC serial port
//!
//! # Example
//!
//! ```ignore
//! use tc66c_lib::{SerialChannel, Tc66c};
//!
//! let channel = SerialChannel::open("/dev/ttyACM0")?;
//! let mut device = Tc66c::new(channel)?;
//! println!("{}", device.get_reading()?);
//! ```

pub mod checksum;
pub mod cipher;
pub mod constants;
pub mod device;
pub mod error;
pub mod packet;
pub mod reading;
pub mod recording;
pub mod transport;

#[cfg(feature = "serial")]
pub mod serial;


pub use device::{DeviceMode, FirmwareUpdateProgress, SessionConfig, Tc66c};
pub use error::{Result, TC66Error};
pub use packet::{BlockTag, decode_packet};
pub use reading::{Reading, RecordingEntry};
pub use recording::{RecordingDecoder, Recordings};
pub use transport::Channel;

#[cfg(feature = "serial")]
pub use serial::SerialChannel;
