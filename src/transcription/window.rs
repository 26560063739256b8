/// Fixed-capacity circular store of the most recent mono samples.
#[derive(Debug, Clone)]
pub struct AudioWindow {
    samples: Vec<f32>,
    write_index: usize,
    filled: bool,
}

impl AudioWindow {
    pub fn new(capacity: usize) -> Self {
        AudioWindow {
            samples: vec![0.0; capacity.max(1)],
            write_index: 0,
            filled: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Number of valid samples, saturating at capacity.
    pub fn len(&self) -> usize {
        if self.filled {
            self.samples.len()
        } else {
            self.write_index
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, chunk: &[f32]) {
        let capacity = self.samples.len();
        // Only the tail of an oversized chunk can survive.
        let chunk = if chunk.len() > capacity {
            self.filled = true;
            &chunk[chunk.len() - capacity..]
        } else {
            chunk
        };

        let first = chunk.len().min(capacity - self.write_index);
        self.samples[self.write_index..self.write_index + first].copy_from_slice(&chunk[..first]);
        let rest = &chunk[first..];
        self.samples[..rest.len()].copy_from_slice(rest);

        let advanced = self.write_index + chunk.len();
        if advanced >= capacity {
            self.filled = true;
        }
        self.write_index = advanced % capacity;
    }

    /// Write the window oldest-first into `out`, replacing its contents.
    pub fn linearize_into(&self, out: &mut Vec<f32>) {
        out.clear();
        if self.filled {
            out.extend_from_slice(&self.samples[self.write_index..]);
            out.extend_from_slice(&self.samples[..self.write_index]);
        } else {
            out.extend_from_slice(&self.samples[..self.write_index]);
        }
    }

    pub fn to_vec(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len());
        self.linearize_into(&mut out);
        out
    }

    pub fn clear(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = 0.0);
        self.write_index = 0;
        self.filled = false;
    }
}
