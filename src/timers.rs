use std::time::{Duration, Instant};

/// Small deadline queue polled from the event loop.
///
/// Scheduling an action that is already pending keeps a single entry at the
/// earlier deadline.
#[derive(Debug)]
pub struct Timers<A> {
    entries: Vec<(Instant, A)>,
}

impl<A> Default for Timers<A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<A: PartialEq> Timers<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: Instant, action: A) {
        if let Some(entry) = self.entries.iter_mut().find(|(_, a)| *a == action) {
            entry.0 = entry.0.min(at);
            return;
        }
        self.entries.push((at, action));
    }

    pub fn schedule_after(&mut self, now: Instant, delay: Duration, action: A) {
        self.schedule(now + delay, action);
    }

    pub fn is_pending(&self, action: &A) -> bool {
        self.entries.iter().any(|(_, a)| a == action)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|(at, _)| *at).min()
    }

    /// Remove and return every action due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<A> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|(at, _)| *at <= now);
        self.entries = pending;
        due.sort_by_key(|(at, _)| *at);
        due.into_iter().map(|(_, a)| a).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Action {
        Raise,
        Settle,
    }

    #[test]
    fn due_actions_come_out_in_deadline_order() {
        let now = Instant::now();
        let mut timers = Timers::new();
        timers.schedule_after(now, Duration::from_millis(50), Action::Settle);
        timers.schedule_after(now, Duration::from_millis(10), Action::Raise);
        assert_eq!(timers.next_deadline(), Some(now + Duration::from_millis(10)));
        assert!(timers.take_due(now).is_empty());
        assert_eq!(
            timers.take_due(now + Duration::from_millis(60)),
            vec![Action::Raise, Action::Settle]
        );
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn rescheduling_keeps_one_entry() {
        let now = Instant::now();
        let mut timers = Timers::new();
        timers.schedule_after(now, Duration::from_millis(30), Action::Raise);
        timers.schedule_after(now, Duration::from_millis(5), Action::Raise);
        timers.schedule_after(now, Duration::from_millis(90), Action::Raise);
        assert_eq!(timers.take_due(now + Duration::from_millis(5)), vec![Action::Raise]);
        assert!(!timers.is_pending(&Action::Raise));
    }
}
