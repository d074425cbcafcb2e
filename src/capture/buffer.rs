//! Bounded utterance recording arena
//!
//! One writer (the feed task) appends while a session is active; the detect
//! task takes the snapshot when the session ends. Appends saturate at
//! capacity and never grow the allocation.

/// Fixed-capacity mono sample buffer with a write cursor
#[derive(Debug)]
pub struct RecordingBuffer {
    samples: Vec<i16>,
    cursor: usize,
    capacity: usize,
    active: bool,
    truncated: bool,
}

impl RecordingBuffer {
    /// Create an empty buffer; the arena is allocated on first `start`
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::new(),
            cursor: 0,
            capacity,
            active: false,
            truncated: false,
        }
    }

    /// Begin a recording: allocate if absent, reset cursor, mark active
    pub fn start(&mut self) {
        if self.samples.is_empty() {
            self.samples = vec![0; self.capacity];
        }
        self.cursor = 0;
        self.truncated = false;
        self.active = true;
    }

    /// Append mono samples, saturating at capacity
    ///
    /// Returns the number of samples copied. Excess samples are dropped
    /// silently beyond the internal truncation flag; appending while
    /// inactive copies nothing.
    pub fn append(&mut self, samples: &[i16]) -> usize {
        if !self.active || self.cursor >= self.capacity {
            if self.active && !samples.is_empty() {
                self.truncated = true;
            }
            return 0;
        }

        let copy = samples.len().min(self.capacity - self.cursor);
        self.samples[self.cursor..self.cursor + copy].copy_from_slice(&samples[..copy]);
        self.cursor += copy;
        if copy < samples.len() {
            self.truncated = true;
        }
        copy
    }

    /// End the recording, returning the captured samples
    ///
    /// Marks the buffer inactive and releases the arena so repeated wake
    /// cycles never accumulate memory.
    pub fn stop(&mut self) -> Vec<i16> {
        self.active = false;
        let mut arena = std::mem::take(&mut self.samples);
        arena.truncate(self.cursor);
        self.cursor = 0;
        arena
    }

    /// Current write position in samples
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Capacity in samples
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a recording is in progress
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether any appended samples were dropped at capacity
    #[must_use]
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }
}
