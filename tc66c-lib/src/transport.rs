use std::io;
use std::time::Duration;

/// Duplex byte channel to one meter.
///
/// Implement this for every transport a session can run over (serial port,
/// in-memory fakes, ...). A read that times out without data returns
/// `Ok(0)`; that is how the device signals it has nothing more to send.
pub trait Channel {
    /// Write data to the channel, returning how many bytes were accepted
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read available data, blocking up to the configured read timeout
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Change how long `read` may block
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Release the underlying transport
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Write all of `data`, retrying short writes
pub(crate) fn write_all<C: Channel + ?Sized>(channel: &mut C, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        match channel.write(data) {
            Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "channel accepted no bytes")),
            Ok(n) => data = &data[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
