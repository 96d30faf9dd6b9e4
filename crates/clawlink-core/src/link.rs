//! Byte transports underneath the line framer.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serialport::SerialPort;

/// A point-to-point byte stream.
///
/// Reads never block: `Ok(0)` means nothing is pending right now. Writes
/// block until every byte is handed to the transport.
pub trait Link {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_available(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

type Pipe = Arc<Mutex<VecDeque<u8>>>;

/// One end of an in-process link.
///
/// [`MemoryLink::pair`] returns two connected ends; bytes written to one are
/// read from the other. Both ends are `Send`, so a device agent can run on
/// another thread.
#[derive(Debug, Clone)]
pub struct MemoryLink {
    incoming: Pipe,
    outgoing: Pipe,
}

impl MemoryLink {
    pub fn pair() -> (Self, Self) {
        let a_to_b = Pipe::default();
        let b_to_a = Pipe::default();
        (
            Self {
                incoming: Arc::clone(&b_to_a),
                outgoing: Arc::clone(&a_to_b),
            },
            Self {
                incoming: a_to_b,
                outgoing: b_to_a,
            },
        )
    }

    /// Bytes written by the peer that this end has not read yet.
    pub fn pending(&self) -> usize {
        self.incoming
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Link for MemoryLink {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut incoming = self.incoming.lock().unwrap_or_else(PoisonError::into_inner);
        let count = buf.len().min(incoming.len());
        for (slot, byte) in buf.iter_mut().zip(incoming.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.outgoing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A USB-CDC or UART serial port.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialLink {
    /// Read timeout for the rare case where the driver reports pending bytes
    /// that are not yet readable.
    const READ_TIMEOUT: Duration = Duration::from_millis(10);

    pub fn open(path: &str, baud_rate: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(path, baud_rate)
            .timeout(Self::READ_TIMEOUT)
            .open()?;
        Ok(Self {
            port,
            path: path.to_owned(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink").field("path", &self.path).finish()
    }
}

impl Link for SerialLink {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pending = self.port.bytes_to_read().map_err(io::Error::from)?;
        if pending == 0 {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(pending).unwrap_or(usize::MAX));
        match self.port.read(&mut buf[..want]) {
            Ok(read) => Ok(read),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(err) => Err(err),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_pair_is_cross_connected() {
        let (mut host, mut device) = MemoryLink::pair();
        host.write_all(b"ping\n").expect("write");

        assert_eq!(device.pending(), 5);
        assert_eq!(host.pending(), 0);

        let mut buf = [0_u8; 3];
        assert_eq!(device.read_available(&mut buf).expect("read"), 3);
        assert_eq!(&buf, b"pin");
        assert_eq!(device.read_available(&mut buf).expect("read"), 2);
        assert_eq!(&buf[..2], b"g\n");
        assert_eq!(device.read_available(&mut buf).expect("read"), 0);
    }

    #[test]
    fn boxed_link_delegates() {
        let (host, mut device) = MemoryLink::pair();
        let mut boxed: Box<dyn Link + Send> = Box::new(host);
        boxed.write_all(b"x").expect("write");
        boxed.flush().expect("flush");

        let mut buf = [0_u8; 4];
        assert_eq!(device.read_available(&mut buf).expect("read"), 1);
    }

    #[test]
    fn opening_missing_port_fails() {
        assert!(SerialLink::open("/dev/clawlink-does-not-exist", 115_200).is_err());
    }
}
