//! Sequence Number (C2): a bounded counter in a character range, randomly
//! seeded, mirrored verbatim on the device side.

use rand::Rng;

/// A sequence number bounded to `[start, end]`, wrapping at the top back to
/// `start`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequenceNumber {
    start: u8,
    end: u8,
    current: u8,
}

impl SequenceNumber {
    /// Lower bound of the host's sweep, inclusive.
    pub const HOST_START: u8 = 0x20;
    /// Upper bound of the host's sweep, inclusive.
    pub const HOST_END: u8 = 0x7f;

    /// Lower bound of the device's sweep, inclusive.
    pub const DEVICE_START: u8 = 0x00;
    /// Upper bound of the device's sweep, inclusive.
    pub const DEVICE_END: u8 = 0xff;

    pub fn new(start: u8, end: u8, current: u8) -> Self {
        debug_assert!(start <= end);
        Self { start, end, current }
    }

    /// Host-side sequence number: a uniformly random *even* value in
    /// `[0x20, 0x7f]`.
    pub fn host_random() -> Self {
        let mut rng = rand::thread_rng();
        let span = ((Self::HOST_END - Self::HOST_START) / 2) + 1;
        let current = Self::HOST_START + rng.gen_range(0..span) * 2;
        Self::new(Self::HOST_START, Self::HOST_END, current)
    }

    /// Device-side sequence number, freely reassigned from each received
    /// frame rather than advanced on its own schedule.
    pub fn device_default() -> Self {
        Self::new(Self::DEVICE_START, Self::DEVICE_END, 0)
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    /// Resets to a new uniformly random value within range.
    pub fn reset(&mut self) {
        let mut rng = rand::thread_rng();
        self.current = rng.gen_range(self.start..=self.end);
    }

    /// Sets the current value directly, as the device does when mirroring
    /// the sequence number it received.
    pub fn set(&mut self, value: u8) {
        self.current = value;
    }

    /// Advances to the next value in the sweep, wrapping `end -> start`.
    pub fn next(&mut self) -> u8 {
        self.current = if self.current >= self.end {
            self.start
        } else {
            self.current + 1
        };
        self.current
    }

    /// Host-specific advance: steps by two (even-only sweep), wrapping.
    pub fn advance_host(&mut self) -> u8 {
        self.current = if self.current.saturating_add(2) > self.end {
            self.start
        } else {
            self.current + 2
        };
        self.current
    }

    pub fn in_range(&self, value: u8) -> bool {
        (self.start..=self.end).contains(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_random_is_even_and_in_range() {
        for _ in 0..100 {
            let seq = SequenceNumber::host_random();
            assert!(seq.current() % 2 == 0);
            assert!(seq.in_range(seq.current()));
        }
    }

    #[test]
    fn advance_host_wraps_within_even_sweep() {
        let mut seq = SequenceNumber::new(SequenceNumber::HOST_START, SequenceNumber::HOST_END, 0x7e);
        assert_eq!(seq.advance_host(), SequenceNumber::HOST_START);
    }

    #[test]
    fn advance_host_progression_matches_seed_plus_two_n() {
        let mut seq = SequenceNumber::new(SequenceNumber::HOST_START, SequenceNumber::HOST_END, 0x20);
        for n in 1..=10 {
            seq.advance_host();
            assert_eq!(seq.current(), 0x20 + 2 * n);
        }
    }

    #[test]
    fn device_mirrors_whatever_it_receives() {
        let mut seq = SequenceNumber::device_default();
        seq.set(0x41);
        assert_eq!(seq.current(), 0x41);
    }
}
