//! Two-phase radio duty-cycle scheduler.
//!
//! Each [`PowerCycle`](crate::timer::TimerId::PowerCycle) alarm runs one
//! phase and arms the next: the radio is switched on for the on-time, then off
//! for the off-time, forever. The driver performs the radio work; this type
//! only remembers which phase comes next.

/// A step of the duty cycle.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Phase {
    /// Power the radio up and stay awake for the on-time.
    RadioOn,
    /// Power the radio down (if idle) and sleep for the off-time.
    RadioOff,
}

/// Duty-cycle sub-machine alternating between [`Phase::RadioOn`] and [`Phase::RadioOff`].
#[derive(Clone, Copy, Debug)]
pub struct PowerCycle {
    next: Phase,
}

impl PowerCycle {
    /// A cycle whose first phase is [`Phase::RadioOn`].
    pub const fn new() -> Self {
        Self {
            next: Phase::RadioOn,
        }
    }

    /// The phase the next alarm will run.
    pub const fn next_phase(&self) -> Phase {
        self.next
    }

    /// Returns the phase to run now and flips to the other one.
    pub fn advance(&mut self) -> Phase {
        let now = self.next;
        self.next = match now {
            Phase::RadioOn => Phase::RadioOff,
            Phase::RadioOff => Phase::RadioOn,
        };
        now
    }

    /// Restarts the cycle at [`Phase::RadioOn`].
    pub fn reset(&mut self) {
        self.next = Phase::RadioOn;
    }
}

impl Default for PowerCycle {
    fn default() -> Self {
        Self::new()
    }
}
