use std::collections::VecDeque;

/// Result of appending a chunk to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PushOutcome {
    /// Bytes actually stored
    pub appended: usize,
    /// True when this push began a new overflow episode
    pub overflow_started: bool,
}

/// Bounded FIFO of received data bytes.
///
/// Appended only by the protocol engine's demux step, drained only by the
/// application's read call. A chunk that does not fit is truncated; the
/// overflow flag stays raised for the whole episode so the owner can signal
/// it exactly once per burst.
pub struct RecvBuffer {
    data: VecDeque<u8>,
    capacity: usize,
    overflowed: bool,
    resume_pending: bool,
}

impl RecvBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: VecDeque::new(),
            capacity: capacity.max(1),
            overflowed: false,
            resume_pending: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity, discarding the newest bytes if the buffer
    /// already holds more than the new limit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.data.truncate(self.capacity);
    }

    /// Append a demuxed data chunk, truncating what does not fit.
    pub(crate) fn push_chunk(&mut self, chunk: &[u8]) -> PushOutcome {
        let free = self.capacity - self.data.len();
        let take = chunk.len().min(free);
        self.data.extend(&chunk[..take]);

        let mut overflow_started = false;
        if chunk.len() > free {
            if !self.overflowed {
                self.overflowed = true;
                self.resume_pending = true;
                overflow_started = true;
            }
        } else {
            // A fully fitting push ends the episode
            self.overflowed = false;
        }

        PushOutcome {
            appended: take,
            overflow_started,
        }
    }

    /// Drain up to `out.len()` bytes in FIFO order, returning the count.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.data.len());
        for slot in out.iter_mut().take(count) {
            // count is bounded by len, so the queue cannot run dry here
            *slot = self.data.pop_front().unwrap_or_default();
        }
        if self.data.is_empty() {
            self.overflowed = false;
        }
        count
    }

    /// Discard all buffered data and reset overflow state.
    pub fn clear(&mut self) {
        self.data.clear();
        self.overflowed = false;
        self.resume_pending = false;
    }

    /// Whether a flow-control resume is still owed for the current episode
    pub(crate) fn has_resume_pending(&self) -> bool {
        self.resume_pending
    }

    /// True once per overflow episode after the buffer has been drained
    /// empty; the caller uses it to send a flow-control resume.
    pub(crate) fn take_resume_pending(&mut self) -> bool {
        if self.resume_pending && self.data.is_empty() {
            self.resume_pending = false;
            true
        } else {
            false
        }
    }
}
