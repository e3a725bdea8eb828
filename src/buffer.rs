/// Fixed-capacity smoothing buffer for noisy sensor streams
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("buffer capacity must be at least 1")]
    InvalidCapacity,
    #[error("slot index {index} out of range for capacity {capacity}")]
    IndexOutOfRange { index: usize, capacity: usize },
}

/// A smoothing buffer shared between the sampler task (sole writer)
/// and the reporting loop (sole reader).
pub type SharedBuffer = Arc<Mutex<SmoothingBuffer>>;

/// Ring buffer over the most recent N samples with an averaging query.
///
/// Slots carry an explicit presence flag; a buffer never confuses a
/// legitimate sample value with "not written yet".
#[derive(Debug)]
pub struct SmoothingBuffer {
    slots: Vec<Option<f64>>,
    cursor: usize,
}

impl SmoothingBuffer {
    /// Creates a buffer with `capacity` empty slots.
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::InvalidCapacity);
        }

        Ok(SmoothingBuffer {
            slots: vec![None; capacity],
            cursor: 0,
        })
    }

    /// Writes a sample at the current cursor and advances it circularly.
    ///
    /// Once the buffer has wrapped, the oldest sample is overwritten first.
    pub fn add(&mut self, sample: f64) {
        self.slots[self.cursor] = Some(sample);
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Mean of the contiguous run of filled slots starting at slot 0,
    /// stopping at the first empty slot.
    ///
    /// This replicates the upstream device firmware's averaging rule for
    /// compatibility: samples past the first empty slot are not considered,
    /// even if filled. The divisor is floored at 1, so an empty buffer
    /// reports 0.0 rather than dividing by zero.
    pub fn average(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;

        for slot in &self.slots {
            match slot {
                Some(value) => {
                    sum += value;
                    count += 1;
                }
                None => break,
            }
        }

        sum / count.max(1) as f64
    }

    /// Reads the i-th physical slot (0-based).
    pub fn at(&self, index: usize) -> Result<Option<f64>, BufferError> {
        self.slots
            .get(index)
            .copied()
            .ok_or(BufferError::IndexOutOfRange {
                index,
                capacity: self.slots.len(),
            })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Creates a buffer behind the lock shared by the sampler and the reporter.
pub fn shared(capacity: usize) -> Result<SharedBuffer, BufferError> {
    Ok(Arc::new(Mutex::new(SmoothingBuffer::new(capacity)?)))
}
