//! Decay time, decay vertex and annihilation vertex bookkeeping.
//!
//! The tracker watches newly created tracks. A primary (parent id 0) starts
//! a new event and clears everything. The first track created at a nonzero
//! global time marks the radioactive decay. A gamma whose lineage id matches
//! the isotope's configured chain marks the annihilation vertex.

use log::warn;
use petring_core::{Cartesian, Isotope, NewTrack};

/// Decay bookkeeping for the current event.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecayState {
    /// First nonzero track time; 0.0 until observed.
    first_decay_time_ns: f64,
    decay_position: Cartesian,
    annihilation_position: Cartesian,
    decay_observed: bool,
    annihilation_observed: bool,
}

impl DecayState {
    /// Time of the first decay, if one was seen.
    #[must_use]
    pub fn decay_time_ns(&self) -> Option<f64> {
        self.decay_observed.then_some(self.first_decay_time_ns)
    }

    #[must_use]
    pub fn decay_position(&self) -> Option<Cartesian> {
        self.decay_observed.then_some(self.decay_position)
    }

    #[must_use]
    pub fn annihilation_position(&self) -> Option<Cartesian> {
        self.annihilation_observed
            .then_some(self.annihilation_position)
    }

    #[must_use]
    pub fn decay_observed(&self) -> bool {
        self.decay_observed
    }

    #[must_use]
    pub fn annihilation_observed(&self) -> bool {
        self.annihilation_observed
    }

    /// Distance from decay to annihilation (mm); 0.0 unless both were seen.
    #[must_use]
    pub fn positron_range(&self) -> f64 {
        if self.decay_observed && self.annihilation_observed {
            self.decay_position.distance_to(&self.annihilation_position)
        } else {
            0.0
        }
    }
}

/// Per-event decay summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayRecord {
    pub event_id: u64,
    pub decay_time_ns: Option<f64>,
    pub decay_position: Option<Cartesian>,
    pub annihilation_position: Option<Cartesian>,
    /// Present only when both vertices were seen.
    pub positron_range_mm: Option<f64>,
}

/// State machine over new-track notifications.
#[derive(Debug, Clone)]
pub struct DecayTracker {
    state: DecayState,
    lineage_id: Option<i32>,
    missed_annihilations: u64,
}

impl DecayTracker {
    /// Creates a tracker. `lineage_id` is the track id whose gamma daughters
    /// are annihilation photons; `None` disables annihilation tracking.
    #[must_use]
    pub fn new(lineage_id: Option<i32>) -> Self {
        Self {
            state: DecayState::default(),
            lineage_id,
            missed_annihilations: 0,
        }
    }

    /// Creates a tracker with the isotope's annihilation lineage id.
    #[must_use]
    pub fn for_isotope(isotope: Isotope) -> Self {
        Self::new(isotope.annihilation_lineage_id())
    }

    #[must_use]
    pub fn lineage_id(&self) -> Option<i32> {
        self.lineage_id
    }

    /// Current event state.
    #[must_use]
    pub fn state(&self) -> &DecayState {
        &self.state
    }

    /// Events where a decay was seen but no annihilation matched.
    #[must_use]
    pub fn missed_annihilations(&self) -> u64 {
        self.missed_annihilations
    }

    /// Feeds one new track.
    pub fn on_new_track(&mut self, track: &NewTrack) {
        if track.is_primary() {
            self.state = DecayState::default();
        }

        if !self.state.decay_observed && track.global_time_ns != 0.0 {
            self.state.first_decay_time_ns = track.global_time_ns;
            self.state.decay_position = track.position;
            self.state.decay_observed = true;
        }

        if track.kind.is_annihilation_quantum() && Some(track.lineage_parent_id) == self.lineage_id
        {
            self.state.annihilation_position = track.position;
            self.state.annihilation_observed = true;
        }
    }

    /// Summarises the event and reports a decay whose annihilation never matched.
    ///
    /// State is kept until the next primary track.
    pub fn finish_event(&mut self, event_id: u64) -> DecayRecord {
        let state = &self.state;
        if state.decay_observed && self.lineage_id.is_some() && !state.annihilation_observed {
            self.missed_annihilations += 1;
            warn!(
                "event {event_id}: decay at {:.3} ns but no annihilation gamma from track {}",
                state.first_decay_time_ns,
                self.lineage_id.unwrap_or_default()
            );
        }

        DecayRecord {
            event_id,
            decay_time_ns: state.decay_time_ns(),
            decay_position: state.decay_position(),
            annihilation_position: state.annihilation_position(),
            positron_range_mm: (state.decay_observed && state.annihilation_observed)
                .then(|| state.positron_range()),
        }
    }
}

impl Default for DecayTracker {
    fn default() -> Self {
        Self::for_isotope(Isotope::F18)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use petring_core::ParticleKind;

    fn track(parent: i32, time: f64, pos: (f64, f64, f64), kind: ParticleKind) -> NewTrack {
        NewTrack::new(parent, time, Cartesian::new(pos.0, pos.1, pos.2), kind)
    }

    #[test]
    fn test_positron_range() {
        let mut tracker = DecayTracker::new(Some(4));
        tracker.on_new_track(&track(0, 0.0, (0.0, 0.0, 0.0), ParticleKind::Ion("F18".into())));
        tracker.on_new_track(&track(1, 5.0, (0.0, 0.0, 0.0), ParticleKind::Positron));
        tracker.on_new_track(&track(4, 5.2, (3.0, 4.0, 0.0), ParticleKind::Gamma));

        let state = tracker.state();
        assert_eq!(state.decay_time_ns(), Some(5.0));
        assert!(state.annihilation_observed());
        assert_relative_eq!(state.positron_range(), 5.0);

        let record = tracker.finish_event(0);
        assert_eq!(record.positron_range_mm, Some(5.0));
        assert_eq!(tracker.missed_annihilations(), 0);
    }

    #[test]
    fn test_first_nonzero_time_wins() {
        let mut tracker = DecayTracker::new(Some(4));
        tracker.on_new_track(&track(0, 0.0, (0.0, 0.0, 0.0), ParticleKind::Ion("F18".into())));
        tracker.on_new_track(&track(1, 0.0, (9.0, 9.0, 9.0), ParticleKind::Electron));
        tracker.on_new_track(&track(1, 12.5, (1.0, 2.0, 3.0), ParticleKind::Positron));
        tracker.on_new_track(&track(2, 40.0, (7.0, 7.0, 7.0), ParticleKind::Electron));

        let state = tracker.state();
        assert_eq!(state.decay_time_ns(), Some(12.5));
        assert_eq!(state.decay_position(), Some(Cartesian::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_reset_between_events() {
        let mut tracker = DecayTracker::new(Some(4));
        tracker.on_new_track(&track(0, 0.0, (0.0, 0.0, 0.0), ParticleKind::Ion("F18".into())));
        tracker.on_new_track(&track(1, 10.0, (1.0, 0.0, 0.0), ParticleKind::Positron));
        tracker.on_new_track(&track(4, 11.0, (2.0, 0.0, 0.0), ParticleKind::Gamma));

        // Second event: a primary clears the state
        tracker.on_new_track(&track(0, 0.0, (0.0, 0.0, 0.0), ParticleKind::Ion("F18".into())));
        assert_eq!(tracker.state().decay_time_ns(), None);
        assert!(!tracker.state().annihilation_observed());
        assert_relative_eq!(tracker.state().positron_range(), 0.0);

        tracker.on_new_track(&track(1, 30.0, (5.0, 0.0, 0.0), ParticleKind::Positron));
        assert_eq!(tracker.state().decay_time_ns(), Some(30.0));
    }

    #[test]
    fn test_primary_with_nonzero_time_sets_decay() {
        // Reset happens before the time check on the same track
        let mut tracker = DecayTracker::new(Some(4));
        tracker.on_new_track(&track(0, 3.0, (1.0, 1.0, 1.0), ParticleKind::Gamma));
        assert_eq!(tracker.state().decay_time_ns(), Some(3.0));
    }

    #[test]
    fn test_wrong_lineage_is_not_annihilation() {
        let mut tracker = DecayTracker::new(Some(4));
        tracker.on_new_track(&track(0, 0.0, (0.0, 0.0, 0.0), ParticleKind::Ion("F18".into())));
        tracker.on_new_track(&track(1, 5.0, (0.0, 0.0, 0.0), ParticleKind::Positron));
        tracker.on_new_track(&track(2, 6.0, (1.0, 0.0, 0.0), ParticleKind::Gamma));
        tracker.on_new_track(&track(4, 6.0, (1.0, 0.0, 0.0), ParticleKind::Electron));

        assert!(!tracker.state().annihilation_observed());
        let record = tracker.finish_event(3);
        assert_eq!(record.positron_range_mm, None);
        assert_eq!(tracker.missed_annihilations(), 1);
    }

    #[test]
    fn test_explicit_lineage_id() {
        let mut tracker = DecayTracker::new(Some(4));
        let gamma = track(7, 6.0, (0.0, 3.0, 4.0), ParticleKind::Gamma).with_lineage_parent_id(4);
        tracker.on_new_track(&track(0, 0.0, (0.0, 0.0, 0.0), ParticleKind::Ion("F18".into())));
        tracker.on_new_track(&track(1, 5.0, (0.0, 0.0, 0.0), ParticleKind::Positron));
        tracker.on_new_track(&gamma);
        assert_relative_eq!(tracker.state().positron_range(), 5.0);
    }

    #[test]
    fn test_disabled_tracking_does_not_count_misses() {
        let mut tracker = DecayTracker::for_isotope(Isotope::Zr89);
        assert_eq!(tracker.lineage_id(), None);
        tracker.on_new_track(&track(0, 0.0, (0.0, 0.0, 0.0), ParticleKind::Ion("Zr89".into())));
        tracker.on_new_track(&track(1, 5.0, (0.0, 0.0, 0.0), ParticleKind::Positron));
        tracker.on_new_track(&track(4, 6.0, (1.0, 0.0, 0.0), ParticleKind::Gamma));

        assert!(!tracker.state().annihilation_observed());
        tracker.finish_event(0);
        assert_eq!(tracker.missed_annihilations(), 0);
    }
}
