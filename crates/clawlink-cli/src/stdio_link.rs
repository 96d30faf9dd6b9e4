//! stdin/stdout as a [`Link`], for running the device simulator under another
//! process.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use clawlink_core::Link;
use tracing::warn;

const READ_CHUNK: usize = 1024;

/// Reads stdin on a background thread so `read_available` never blocks.
///
/// Once stdin is closed and everything buffered has been consumed, reads fail
/// with [`io::ErrorKind::UnexpectedEof`].
pub struct StdioLink {
    incoming: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    stdout: io::Stdout,
}

impl StdioLink {
    pub fn spawn() -> Self {
        let (sender, incoming) = mpsc::channel();
        thread::spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut chunk = [0_u8; READ_CHUNK];
            loop {
                match stdin.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(read) => {
                        if sender.send(chunk[..read].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                    Err(error) => {
                        warn!(%error, "stdin read failed");
                        break;
                    }
                }
            }
        });
        Self {
            incoming,
            pending: VecDeque::new(),
            stdout: io::stdout(),
        }
    }
}

impl Link for StdioLink {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.incoming.try_recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(TryRecvError::Empty) => return Ok(0),
                Err(TryRecvError::Disconnected) => {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"))
                }
            }
        }
        let count = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stdout.lock().write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.lock().flush()
    }
}
