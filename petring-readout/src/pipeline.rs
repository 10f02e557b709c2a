//! Readout workers driven by transport-engine callbacks.
//!
//! A [`ReadoutWorker`] owns one aggregator, one decay tracker and one
//! activity state, and shares the slot table read-only. Recorded events can
//! be replayed through a pool of workers with [`replay_events`].

use crate::activity::ActivityState;
use crate::aggregation::HitAggregator;
use crate::decay::{DecayRecord, DecayTracker};
use log::{debug, info};
use petring_core::{Cartesian, CrystalHit, Isotope, NewTrack, StepHit};
use petring_geometry::SlotTable;
use rayon::prelude::*;
use std::sync::Arc;

/// One engine callback, as recorded for replay.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Track(NewTrack),
    Step(StepHit),
}

/// All callbacks of one simulated event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordedEvent {
    pub event_id: u64,
    pub callbacks: Vec<EngineEvent>,
}

/// Output of one finished event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventReadout {
    pub event_id: u64,
    pub hits: Vec<CrystalHit>,
    pub decay: DecayRecord,
}

/// Counters accumulated by a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub events: u64,
    pub steps: u64,
    pub hits_emitted: u64,
    pub unresolved_indices: u64,
    pub missed_annihilations: u64,
}

impl WorkerStats {
    /// Sums two workers' counters.
    #[must_use]
    pub fn combine(self, other: WorkerStats) -> WorkerStats {
        WorkerStats {
            events: self.events + other.events,
            steps: self.steps + other.steps,
            hits_emitted: self.hits_emitted + other.hits_emitted,
            unresolved_indices: self.unresolved_indices + other.unresolved_indices,
            missed_annihilations: self.missed_annihilations + other.missed_annihilations,
        }
    }
}

/// Single-threaded readout of one engine thread.
#[derive(Debug)]
pub struct ReadoutWorker {
    aggregator: HitAggregator,
    decay: DecayTracker,
    activity: ActivityState,
    stats: WorkerStats,
}

impl ReadoutWorker {
    /// Creates a worker. `lineage_id` configures annihilation tracking.
    #[must_use]
    pub fn new(table: Arc<SlotTable>, lineage_id: Option<i32>) -> Self {
        Self {
            aggregator: HitAggregator::new(table),
            decay: DecayTracker::new(lineage_id),
            activity: ActivityState::new(),
            stats: WorkerStats::default(),
        }
    }

    /// Creates a worker using the isotope's annihilation lineage id.
    #[must_use]
    pub fn for_isotope(table: Arc<SlotTable>, isotope: Isotope) -> Self {
        Self::new(table, isotope.annihilation_lineage_id())
    }

    /// Opens a new event.
    pub fn on_event_start(&mut self) {
        self.aggregator.initialize();
    }

    /// Records a step given in cartesian coordinates.
    pub fn on_step(&mut self, index: usize, energy_mev: f64, time_ns: f64, position: Cartesian) {
        let hit = StepHit::new(index, energy_mev, time_ns, position.to_cylindrical());
        self.on_step_hit(&hit);
    }

    /// Records a step.
    pub fn on_step_hit(&mut self, hit: &StepHit) {
        self.stats.steps += 1;
        self.aggregator.record_hit(hit, &mut self.activity);
    }

    /// Feeds a new track to the decay tracker.
    pub fn on_new_track(&mut self, track: &NewTrack) {
        self.decay.on_new_track(track);
    }

    /// Finishes the event: decay summary first, then crystal records timed
    /// relative to the decay.
    pub fn on_event_end(&mut self, event_id: u64) -> EventReadout {
        let decay = self.decay.finish_event(event_id);
        let hits = self.aggregator.end_of_event(event_id, self.decay.state());

        self.stats.events += 1;
        self.stats.hits_emitted += hits.len() as u64;
        EventReadout {
            event_id,
            hits,
            decay,
        }
    }

    /// Replays one recorded event from start to end.
    pub fn replay(&mut self, event: &RecordedEvent) -> EventReadout {
        self.on_event_start();
        for callback in &event.callbacks {
            match callback {
                EngineEvent::Track(track) => self.on_new_track(track),
                EngineEvent::Step(hit) => self.on_step_hit(hit),
            }
        }
        self.on_event_end(event.event_id)
    }

    /// Cumulative activity seen by this worker.
    #[must_use]
    pub fn activity(&self) -> &ActivityState {
        &self.activity
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            unresolved_indices: self.aggregator.unresolved(),
            missed_annihilations: self.decay.missed_annihilations(),
            ..self.stats
        }
    }

    /// Consumes the worker, returning its activity and counters.
    #[must_use]
    pub fn finish(self) -> (ActivityState, WorkerStats) {
        let stats = self.stats();
        (self.activity, stats)
    }
}

/// Result of replaying a set of events.
#[derive(Debug, Default)]
pub struct ReplaySummary {
    /// Event readouts in input order.
    pub readouts: Vec<EventReadout>,
    /// Activity merged over all workers.
    pub activity: ActivityState,
    pub stats: WorkerStats,
}

/// Replays events over a rayon pool, one worker per chunk of
/// `events_per_worker` consecutive events.
///
/// Readouts come back in input order; activity states are merged.
pub fn replay_events(
    table: &Arc<SlotTable>,
    lineage_id: Option<i32>,
    events: &[RecordedEvent],
    events_per_worker: usize,
) -> ReplaySummary {
    let chunk = events_per_worker.max(1);

    let per_worker: Vec<(Vec<EventReadout>, ActivityState, WorkerStats)> = events
        .par_chunks(chunk)
        .map(|events| {
            let mut worker = ReadoutWorker::new(Arc::clone(table), lineage_id);
            let readouts: Vec<EventReadout> = events.iter().map(|e| worker.replay(e)).collect();
            let (activity, stats) = worker.finish();
            (readouts, activity, stats)
        })
        .collect();

    debug!(
        "replayed {} events on {} workers",
        events.len(),
        per_worker.len()
    );

    let mut summary = ReplaySummary::default();
    for (readouts, activity, stats) in per_worker {
        summary.readouts.extend(readouts);
        summary.activity.merge(&activity);
        summary.stats = summary.stats.combine(stats);
    }

    info!(
        "{} events, {} crystal records, {} unresolved indices, {} missed annihilations",
        summary.stats.events,
        summary.stats.hits_emitted,
        summary.stats.unresolved_indices,
        summary.stats.missed_annihilations
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use petring_core::ParticleKind;
    use petring_geometry::{DetectorFamilyConfig, Granularity};

    fn table() -> Arc<SlotTable> {
        let config = DetectorFamilyConfig::siemens_quadra().with_rings(1);
        Arc::new(SlotTable::build(&config, Granularity::Block).unwrap())
    }

    #[test]
    fn test_time_relative_to_decay() {
        let mut worker = ReadoutWorker::new(table(), Some(4));
        worker.on_event_start();
        worker.on_new_track(&NewTrack::new(
            0,
            0.0,
            Cartesian::default(),
            ParticleKind::Ion("F18".into()),
        ));
        worker.on_new_track(&NewTrack::new(
            1,
            100.0,
            Cartesian::default(),
            ParticleKind::Positron,
        ));
        worker.on_step(3, 0.2, 103.0, Cartesian::new(410.0, 0.0, 0.0));
        worker.on_step(3, 0.2, 105.0, Cartesian::new(410.0, 0.0, 0.0));

        let readout = worker.on_event_end(42);
        assert_eq!(readout.hits.len(), 1);
        // mean 104 minus decay at 100
        assert_relative_eq!(readout.hits[0].time_ns, 4.0);
        assert_eq!(readout.decay.decay_time_ns, Some(100.0));
        assert_eq!(worker.stats().missed_annihilations, 1);
    }

    #[test]
    fn test_time_absolute_without_decay() {
        let mut worker = ReadoutWorker::new(table(), None);
        worker.on_event_start();
        worker.on_step(3, 0.5, 7.0, Cartesian::new(0.0, 410.0, 0.0));
        let readout = worker.on_event_end(0);
        assert_relative_eq!(readout.hits[0].time_ns, 7.0);
        assert_relative_eq!(readout.hits[0].position.rho, 410.0);
        assert_relative_eq!(readout.hits[0].position.phi, std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn test_replay_events_preserves_order_and_merges_activity() {
        let events: Vec<RecordedEvent> = (0..10)
            .map(|event_id| RecordedEvent {
                event_id,
                callbacks: vec![EngineEvent::Step(StepHit::new(
                    (event_id % 3) as usize,
                    1.0,
                    1.0,
                    petring_core::Cylindrical::new(410.0, 0.0, 0.0),
                ))],
            })
            .collect();

        let summary = replay_events(&table(), None, &events, 3);
        let ids: Vec<u64> = summary.readouts.iter().map(|r| r.event_id).collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
        assert_eq!(summary.stats.events, 10);
        // Index 0 struck by events 0, 3, 6, 9
        assert_relative_eq!(summary.activity.cumulative(0), 4.0);
        assert_relative_eq!(summary.activity.activity_fraction(0).unwrap(), 1.0);
    }
}
