//! FIFO that holds entries until they have aged past a fixed delay.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Entries are released strictly in insertion order, and only once
/// `now - inserted_at >= delay`. A young head blocks everything behind it.
///
/// Unbounded: growth is limited by `delay` times the arrival rate.
#[derive(Debug)]
pub struct DelayQueue<T> {
    entries: VecDeque<(Instant, T)>,
    delay: Duration,
}

impl<T> DelayQueue<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn push(&mut self, item: T, at: Instant) {
        self.entries.push_back((at, item));
    }

    /// Pop the head if it is old enough.
    pub fn pop_ready(&mut self, now: Instant) -> Option<T> {
        let (at, _) = self.entries.front()?;
        if now.saturating_duration_since(*at) >= self.delay {
            self.entries.pop_front().map(|(_, item)| item)
        } else {
            None
        }
    }

    /// Everything that is due at `now`, oldest first.
    pub fn drain_ready(&mut self, now: Instant) -> DrainReady<'_, T> {
        DrainReady { queue: self, now }
    }

    /// When the current head becomes due.
    pub fn next_release(&self) -> Option<Instant> {
        self.entries.front().map(|(at, _)| *at + self.delay)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct DrainReady<'a, T> {
    queue: &'a mut DelayQueue<T>,
    now: Instant,
}

impl<T> Iterator for DrainReady<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.pop_ready(self.now)
    }
}
