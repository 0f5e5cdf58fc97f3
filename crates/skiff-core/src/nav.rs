//! Two-phase navigation flags
//!
//! `can_go_back`/`can_go_forward` change as soon as the user navigates and
//! are confirmed later from the tab record or the page's own history.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Optimistic,
    Confirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TwoPhase<T> {
    value: T,
    phase: Phase,
}

impl<T: Copy + PartialEq> TwoPhase<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            phase: Phase::Confirmed,
        }
    }

    pub fn get(&self) -> T {
        self.value
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_confirmed(&self) -> bool {
        self.phase == Phase::Confirmed
    }

    /// Returns true when the value changed.
    pub fn set_optimistic(&mut self, value: T) -> bool {
        self.phase = Phase::Optimistic;
        self.replace(value)
    }

    /// Returns true when the value changed.
    pub fn confirm(&mut self, value: T) -> bool {
        self.phase = Phase::Confirmed;
        self.replace(value)
    }

    fn replace(&mut self, value: T) -> bool {
        let changed = self.value != value;
        self.value = value;
        changed
    }
}

impl<T: Copy + PartialEq + Default> Default for TwoPhase<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimistic_then_confirmed() {
        let mut flag = TwoPhase::new(false);
        assert!(flag.set_optimistic(true));
        assert!(flag.get());
        assert_eq!(flag.phase(), Phase::Optimistic);

        assert!(!flag.confirm(true));
        assert!(flag.is_confirmed());
    }

    #[test]
    fn test_confirm_overrides_guess() {
        let mut flag = TwoPhase::default();
        flag.set_optimistic(true);
        assert!(flag.confirm(false));
        assert!(!flag.get());
    }
}
