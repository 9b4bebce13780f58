use std::collections::VecDeque;

/// FIFO buffer for transport-address candidates that arrive before the
/// remote description is known. Once the negotiator drains it the queue
/// stays empty for the rest of the session.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    queued: VecDeque<String>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: String) {
        self.queued.push_back(candidate);
    }

    /// Remove and return all queued candidates in arrival order.
    pub fn drain(&mut self) -> Vec<String> {
        self.queued.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.queued.clear();
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}
