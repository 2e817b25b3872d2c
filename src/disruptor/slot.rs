//! Slot (entry) stored in the ring buffer
//!
//! A slot pairs a user event with the sequence it was last claimed for. Slots are
//! created once by the [`EventFactory`](crate::disruptor::EventFactory) and reused
//! every time the ring wraps onto their index.

use std::ops::{Deref, DerefMut};

/// A reusable entry exchanged through the ring buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot<T> {
    sequence: i64,
    event: T,
}

impl<T> Slot<T> {
    pub(crate) fn new(event: T) -> Self {
        Self {
            sequence: crate::disruptor::INITIAL_CURSOR_VALUE,
            event,
        }
    }

    /// The sequence assigned to this slot by its most recent claim
    ///
    /// Only meaningful until the ring wraps back onto this slot.
    #[inline]
    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    #[inline]
    pub(crate) fn set_sequence(&mut self, sequence: i64) {
        self.sequence = sequence;
    }

    #[inline]
    pub fn event(&self) -> &T {
        &self.event
    }

    #[inline]
    pub fn event_mut(&mut self) -> &mut T {
        &mut self.event
    }
}

impl<T> Deref for Slot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.event
    }
}

impl<T> DerefMut for Slot<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Eq)]
    struct StubEvent {
        value: i32,
    }

    #[test]
    fn test_new_slot_is_unclaimed() {
        let slot = Slot::new(StubEvent::default());
        assert_eq!(slot.sequence(), -1);
        assert_eq!(slot.event(), &StubEvent { value: 0 });
    }

    #[test]
    fn test_slot_deref_reaches_event() {
        let mut slot = Slot::new(StubEvent::default());
        slot.set_sequence(2701);
        slot.value = 42;

        assert_eq!(slot.sequence(), 2701);
        assert_eq!(slot.event().value, 42);
        slot.event_mut().value += 1;
        assert_eq!(slot.value, 43);
    }
}
