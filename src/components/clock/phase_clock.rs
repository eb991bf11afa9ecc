use serde::Serialize;

/// Quarter of a bus bit period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Clock low, data may change
    P0,
    /// Clock rises
    P1,
    /// Clock high, data is sampled
    P2,
    /// Clock falls, bit bookkeeping
    P3,
}

impl Phase {
    pub fn index(&self) -> u8 {
        match self {
            Phase::P0 => 0,
            Phase::P1 => 1,
            Phase::P2 => 2,
            Phase::P3 => 3,
        }
    }

    pub fn next(&self) -> Phase {
        match self {
            Phase::P0 => Phase::P1,
            Phase::P1 => Phase::P2,
            Phase::P2 => Phase::P3,
            Phase::P3 => Phase::P0,
        }
    }
}

/// Divides the reference clock into four-phase bit timing.
///
/// Only runs while enabled; when disabled it is held at phase 0 with the
/// divider cleared, so the first tick of every transaction is always P0.
#[derive(Debug, Clone)]
pub struct PhaseClock {
    divisor: u32,
    counter: u32,
    phase: Phase,
    tick: bool,
}

impl PhaseClock {
    /// `divisor` reference cycles per phase tick; zero is treated as one
    pub fn new(divisor: u32) -> Self {
        PhaseClock {
            divisor: divisor.max(1),
            counter: 0,
            phase: Phase::P0,
            tick: false,
        }
    }

    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Phase the next tick will carry
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// One-shot indicator: the last `step` produced a tick
    pub fn tick(&self) -> bool {
        self.tick
    }

    /// Advances one reference cycle and returns the phase if a tick fires
    pub fn step(&mut self, enabled: bool) -> Option<Phase> {
        if !enabled {
            self.hold();
            return None;
        }

        self.counter += 1;
        if self.counter < self.divisor {
            self.tick = false;
            return None;
        }

        self.counter = 0;
        self.tick = true;
        let current = self.phase;
        self.phase = current.next();
        Some(current)
    }

    pub fn hold(&mut self) {
        self.counter = 0;
        self.phase = Phase::P0;
        self.tick = false;
    }

    /// Bus bit rate for a given reference frequency
    pub fn bit_rate(&self, reference_frequency_hz: f64) -> f64 {
        reference_frequency_hz / (4.0 * self.divisor as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_clock_never_ticks() {
        let mut clock = PhaseClock::new(3);
        for _ in 0..20 {
            assert_eq!(clock.step(false), None);
            assert!(!clock.tick());
            assert_eq!(clock.phase(), Phase::P0);
        }
    }

    #[test]
    fn test_ticks_every_divisor_cycles() {
        let mut clock = PhaseClock::new(3);
        let ticks: Vec<Option<Phase>> = (0..12).map(|_| clock.step(true)).collect();
        assert_eq!(
            ticks,
            vec![
                None,
                None,
                Some(Phase::P0),
                None,
                None,
                Some(Phase::P1),
                None,
                None,
                Some(Phase::P2),
                None,
                None,
                Some(Phase::P3),
            ]
        );
    }

    #[test]
    fn test_divisor_one_ticks_every_cycle() {
        let mut clock = PhaseClock::new(1);
        assert_eq!(clock.step(true), Some(Phase::P0));
        assert!(clock.tick());
        assert_eq!(clock.step(true), Some(Phase::P1));
        assert_eq!(clock.step(true), Some(Phase::P2));
        assert_eq!(clock.step(true), Some(Phase::P3));
        assert_eq!(clock.step(true), Some(Phase::P0));
    }

    #[test]
    fn test_disable_resets_to_phase_zero() {
        let mut clock = PhaseClock::new(2);
        clock.step(true);
        clock.step(true);
        clock.step(true);
        assert_eq!(clock.phase(), Phase::P1);

        clock.step(false);
        assert_eq!(clock.phase(), Phase::P0);
        assert_eq!(clock.step(true), None);
        assert_eq!(clock.step(true), Some(Phase::P0));
    }

    #[test]
    fn test_zero_divisor_and_bit_rate() {
        let clock = PhaseClock::new(0);
        assert_eq!(clock.divisor(), 1);

        let clock = PhaseClock::new(125);
        assert_eq!(clock.bit_rate(50_000_000.0), 100_000.0);
    }
}
