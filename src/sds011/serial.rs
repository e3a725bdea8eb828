/// Serial byte-run delivery for the SDS011 particulate sensor
use std::io::Read;
use std::time::Duration;

use log::{error, warn};
use serialport::{DataBits, Parity, StopBits};
use tokio::sync::mpsc;

use crate::sds011::frame::WATCH_BYTE;

const BAUD_RATE: u32 = 9600; // SDS011 is fixed at 9600 8N1
const READ_TIMEOUT: Duration = Duration::from_secs(2);
const RUN_CHANNEL_CAPACITY: usize = 32;

// A run should hold one frame plus leading noise; anything this large is
// garbage from a disconnected or misconfigured line.
const MAX_RUN_LEN: usize = 256;

/// Accumulates raw serial bytes into runs terminated by the watch byte.
///
/// Mirrors the watch-character delivery of the device firmware's serial
/// stack: in-between bytes are buffered, and the completed run (terminator
/// included) is handed over as one unit.
#[derive(Debug, Default)]
pub struct RunAccumulator {
    pending: Vec<u8>,
}

impl RunAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes one byte; returns the completed run when `byte` is the
    /// watch character.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        self.pending.push(byte);

        if byte == WATCH_BYTE {
            return Some(std::mem::take(&mut self.pending));
        }

        if self.pending.len() > MAX_RUN_LEN {
            warn!(
                "Discarding {} unterminated serial bytes",
                self.pending.len()
            );
            self.pending.clear();
        }

        None
    }
}

/// Opens the SDS011 serial port and spawns a dedicated reader thread.
///
/// The thread blocks on the port forever and sends each watch-terminated
/// byte run through the returned channel; the async sampler task consumes
/// the other end. Returns an error only if the port cannot be opened.
pub fn spawn_reader(path: &str) -> Result<mpsc::Receiver<Vec<u8>>, serialport::Error> {
    let mut port = serialport::new(path, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(READ_TIMEOUT)
        .open()?;

    let (tx, rx) = mpsc::channel(RUN_CHANNEL_CAPACITY);
    let path = path.to_string();

    std::thread::spawn(move || {
        let mut accumulator = RunAccumulator::new();
        let mut chunk = [0u8; 64];

        loop {
            let read = match port.read(&mut chunk) {
                Ok(read) => read,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => {
                    error!("Serial read error on {}: {}", path, e);
                    return;
                }
            };

            for &byte in &chunk[..read] {
                if let Some(run) = accumulator.push(byte) {
                    // The receiver only disappears on shutdown.
                    if tx.blocking_send(run).is_err() {
                        return;
                    }
                }
            }
        }
    });

    Ok(rx)
}
