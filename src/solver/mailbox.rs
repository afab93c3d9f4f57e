use std::collections::HashSet;

use parking_lot::Mutex;

use crate::game::Game;
use crate::solver::couple::CompactCouple;

/// Per-worker set of proved couples, filled by other threads when they prove
/// a transposition this worker has marked. Polled, never awaited.
pub struct Mailbox<G: Game> {
    messages: Mutex<HashSet<CompactCouple<G>>>,
}

impl<G: Game> Mailbox<G> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(HashSet::new()),
        }
    }

    pub fn notify(&self, compact: CompactCouple<G>) {
        self.messages.lock().insert(compact);
    }

    /// Atomically drains every pending notification.
    #[must_use]
    pub fn extract_all(&self) -> HashSet<CompactCouple<G>> {
        let mut messages = self.messages.lock();
        if messages.is_empty() {
            return HashSet::new();
        }

        std::mem::take(&mut messages)
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl<G: Game> Default for Mailbox<G> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::kayles::Kayles;
    use crate::solver::nimber::Nimber;

    fn compact(s: &str) -> CompactCouple<Kayles> {
        CompactCouple::new(s.parse().unwrap(), Nimber::LOSS)
    }

    #[test]
    fn notifications_are_idempotent() {
        let mailbox: Mailbox<Kayles> = Mailbox::new();
        mailbox.notify(compact("3"));
        mailbox.notify(compact("3"));
        mailbox.notify(compact("4"));
        assert_eq!(mailbox.extract_all().len(), 2);
    }

    #[test]
    fn extract_all_drains_exactly_once() {
        let mailbox: Mailbox<Kayles> = Mailbox::new();
        mailbox.notify(compact("5"));
        assert_eq!(mailbox.extract_all().len(), 1);
        assert!(mailbox.extract_all().is_empty());
    }
}
