//! Cumulative per-crystal energy across events.

use petring_core::{Error, Result};
use std::collections::HashMap;

/// Cumulative deposited energy per crystal, with the running maximum.
///
/// Never reset during a run. Each worker owns one; merge them at the end.
#[derive(Debug, Clone, Default)]
pub struct ActivityState {
    energy: HashMap<usize, f64>,
    max_energy: f64,
}

impl ActivityState {
    /// Creates an empty activity state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a positive deposit to a crystal. Non-positive deposits are ignored.
    pub fn record(&mut self, index: usize, energy: f64) {
        if energy <= 0.0 {
            return;
        }
        let total = self.energy.entry(index).or_insert(0.0);
        *total += energy;
        if *total > self.max_energy {
            self.max_energy = *total;
        }
    }

    /// Cumulative energy of a crystal, 0 if never struck.
    #[must_use]
    pub fn cumulative(&self, index: usize) -> f64 {
        self.energy.get(&index).copied().unwrap_or(0.0)
    }

    /// Largest cumulative energy over all crystals.
    #[must_use]
    pub fn max_energy(&self) -> f64 {
        self.max_energy
    }

    /// True once any crystal has recorded energy.
    #[must_use]
    pub fn has_activity(&self) -> bool {
        self.max_energy > 0.0
    }

    /// Number of crystals that recorded energy.
    #[must_use]
    pub fn len(&self) -> usize {
        self.energy.len()
    }

    /// True if no crystal recorded energy.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    /// Log-scaled activity of a crystal relative to the most active one.
    ///
    /// `1 + 0.1 ln(E / Emax)`: 1 for the hottest crystal, falling by 0.1 per
    /// e-fold. Crystals that never recorded energy give 0.
    ///
    /// # Errors
    /// Returns `NoActivity` if no crystal has recorded energy yet.
    pub fn activity_fraction(&self, index: usize) -> Result<f64> {
        if !self.has_activity() {
            return Err(Error::NoActivity);
        }
        match self.energy.get(&index) {
            Some(&energy) => Ok(1.0 + 0.1 * (energy / self.max_energy).ln()),
            None => Ok(0.0),
        }
    }

    /// Folds another worker's activity into this one.
    pub fn merge(&mut self, other: &ActivityState) {
        for (&index, &energy) in &other.energy {
            let total = self.energy.entry(index).or_insert(0.0);
            *total += energy;
            if *total > self.max_energy {
                self.max_energy = *total;
            }
        }
    }

    /// Crystals and their cumulative energy, in ascending index order.
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<(usize, f64)> {
        let mut entries: Vec<_> = self.energy.iter().map(|(&i, &e)| (i, e)).collect();
        entries.sort_unstable_by_key(|&(i, _)| i);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_no_activity_is_error() {
        let state = ActivityState::new();
        assert_eq!(state.activity_fraction(0), Err(Error::NoActivity));
    }

    #[test]
    fn test_hottest_crystal_is_one() {
        let mut state = ActivityState::new();
        state.record(3, 2.0);
        state.record(5, 0.5);
        state.record(3, 1.0);
        assert_relative_eq!(state.max_energy(), 3.0);
        assert_relative_eq!(state.activity_fraction(3).unwrap(), 1.0);
        // 1 + 0.1 * ln(0.5 / 3)
        assert_relative_eq!(
            state.activity_fraction(5).unwrap(),
            1.0 + 0.1 * (0.5_f64 / 3.0).ln()
        );
        assert_relative_eq!(state.activity_fraction(7).unwrap(), 0.0);
    }

    #[test]
    fn test_fraction_monotonic_in_energy() {
        let mut state = ActivityState::new();
        for (i, e) in [0.1, 0.4, 0.9, 2.5, 7.0].into_iter().enumerate() {
            state.record(i, e);
        }
        let fractions: Vec<f64> = (0..5).map(|i| state.activity_fraction(i).unwrap()).collect();
        assert!(fractions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_non_positive_deposits_ignored() {
        let mut state = ActivityState::new();
        state.record(1, 0.0);
        state.record(2, -1.0);
        assert!(state.is_empty());
        assert!(!state.has_activity());
    }

    #[test]
    fn test_merge() {
        let mut a = ActivityState::new();
        a.record(1, 1.0);
        a.record(2, 4.0);
        let mut b = ActivityState::new();
        b.record(1, 3.5);
        b.record(9, 0.2);

        a.merge(&b);
        assert_eq!(a.len(), 3);
        assert_relative_eq!(a.cumulative(1), 4.5);
        assert_relative_eq!(a.max_energy(), 4.5);
        assert_eq!(a.sorted_entries().first().map(|&(i, _)| i), Some(1));
    }
}
