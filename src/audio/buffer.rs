//! Rolling sample buffer shared between the capture callback and the meters

/// Circular audio buffer
///
/// Starts zeroed, so snapshots taken before the device has produced enough
/// samples come back zero-padded at the front.
pub struct AudioBuffer {
    samples: Vec<f32>,
    write_pos: usize,
    capacity: usize,
    total_written: u64,
}

impl AudioBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: vec![0.0; capacity],
            write_pos: 0,
            capacity,
            total_written: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples pushed since creation (not capped at capacity)
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn push_samples(&mut self, data: &[f32]) {
        for &sample in data {
            self.samples[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.capacity;
        }
        self.total_written += data.len() as u64;
    }

    /// Copy the most recent `out.len()` samples into `out`, oldest first.
    ///
    /// Requests longer than the capacity fill the leading surplus with zeros.
    pub fn copy_latest(&self, out: &mut [f32]) {
        let count = out.len().min(self.capacity);
        let (pad, tail) = out.split_at_mut(out.len() - count);
        pad.fill(0.0);

        let start = if self.write_pos >= count {
            self.write_pos - count
        } else {
            self.capacity - (count - self.write_pos)
        };

        for (i, slot) in tail.iter_mut().enumerate() {
            *slot = self.samples[(start + i) % self.capacity];
        }
    }

    pub fn clear(&mut self) {
        self.samples.fill(0.0);
        self.write_pos = 0;
        self.total_written = 0;
    }
}
