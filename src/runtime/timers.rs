use std::fmt::Debug;
use std::time::Duration;

use log::trace;


/// Deadline-ordered queue of tagged one-shot timers.
///
/// Each recognizer owns one. Time only moves when the owner calls
/// `pop_due`, which makes the whole pipeline reproducible under a
/// scripted clock: nothing fires on its own.
///
/// At most one timer per tag is ever pending. Re-posting a tag replaces
/// its deadline, cancelling a tag that isn't pending does nothing.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    now: u64,
    seq: u64,
    pending: Vec<Pending<T>>,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    tag: T,
    deadline: u64,
    seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        TimerQueue { now: 0, seq: 0, pending: Vec::new() }
    }
}


impl<T: Copy + Eq + Debug> TimerQueue<T> {

    pub fn new() -> Self {
        Self::default()
    }

    /// Current queue time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Moves the clock forward without firing anything. Never goes backwards.
    pub fn observe(&mut self, now: u64) {
        if now > self.now {
            self.now = now;
        }
    }

    pub fn post_delayed(&mut self, tag: T, delay: Duration) {
        self.cancel(tag);
        let deadline = self.now.saturating_add(delay.as_millis() as u64);
        trace!("Posting {:?} for t={}", tag, deadline);
        self.seq += 1;
        self.pending.push(Pending { tag, deadline, seq: self.seq });
    }

    pub fn cancel(&mut self, tag: T) {
        self.pending.retain(|p| p.tag != tag);
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, tag: T) -> bool {
        self.pending.iter().any(|p| p.tag == tag)
    }

    /// Earliest deadline still queued.
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.iter().map(|p| p.deadline).min()
    }

    /// Removes and returns the earliest timer whose deadline is at or
    /// before `now`, setting the clock to that deadline. Ties go to the
    /// timer posted first.
    ///
    /// Call in a loop: handlers may post new timers that are also due.
    pub fn pop_due(&mut self, now: u64) -> Option<T> {
        let idx = self.pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.deadline <= now)
            .min_by_key(|(_, p)| (p.deadline, p.seq))
            .map(|(i, _)| i)?;

        let fired = self.pending.swap_remove(idx);
        self.observe(fired.deadline);
        trace!("Firing {:?} at t={}", fired.tag, fired.deadline);
        Some(fired.tag)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tag { A, B, C }

    #[test]
    fn fires_in_deadline_then_post_order() {
        let mut q = TimerQueue::new();
        q.post_delayed(Tag::A, Duration::from_millis(300));
        q.post_delayed(Tag::B, Duration::from_millis(100));
        q.post_delayed(Tag::C, Duration::from_millis(300));

        assert_eq!(q.pop_due(50), None);
        assert_eq!(q.pop_due(1_000), Some(Tag::B));
        assert_eq!(q.now(), 100);
        assert_eq!(q.pop_due(1_000), Some(Tag::A));
        assert_eq!(q.pop_due(1_000), Some(Tag::C));
        assert_eq!(q.pop_due(1_000), None);
    }

    #[test]
    fn repost_replaces_deadline() {
        let mut q = TimerQueue::new();
        q.post_delayed(Tag::A, Duration::from_millis(100));
        q.observe(80);
        q.post_delayed(Tag::A, Duration::from_millis(100));

        assert_eq!(q.pop_due(150), None);
        assert!(q.is_pending(Tag::A));
        assert_eq!(q.pop_due(180), Some(Tag::A));
        assert!(!q.is_pending(Tag::A));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut q: TimerQueue<Tag> = TimerQueue::new();
        q.cancel(Tag::A);
        q.post_delayed(Tag::A, Duration::from_millis(10));
        q.cancel(Tag::A);
        q.cancel(Tag::A);
        assert_eq!(q.next_deadline(), None);
    }

    #[test]
    fn clock_never_goes_backwards() {
        let mut q: TimerQueue<Tag> = TimerQueue::new();
        q.observe(500);
        q.observe(200);
        assert_eq!(q.now(), 500);
    }
}
