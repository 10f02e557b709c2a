//! Per-event, energy-weighted crystal statistics.
//!
//! Each struck crystal accumulates its total energy and the energy-weighted
//! sums of time, rho, phi and z. At event end the sums become weighted means
//! and one [`CrystalHit`] is emitted per crystal, in ascending index order.
//!
//! Phi is unwrapped around the first deposit of each crystal before it is
//! summed, so crystals straddling the ±pi seam keep their centroid on the
//! struck side of the ring.

use crate::activity::ActivityState;
use crate::decay::DecayState;
use log::warn;
use petring_core::units::mev_to_kev;
use petring_core::{CrystalHit, Cylindrical, StepHit};
use petring_geometry::SlotTable;
use std::collections::BTreeMap;
use std::f64::consts::{PI, TAU};
use std::sync::Arc;

/// Maps an angle into (-pi, pi].
fn wrap_phi(phi: f64) -> f64 {
    if phi > -PI && phi <= PI {
        return phi;
    }
    let wrapped = (phi + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Running sums for one crystal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CrystalSums {
    /// Total energy (MeV).
    pub energy: f64,
    pub weighted_time: f64,
    pub weighted_rho: f64,
    /// Sum of energy times phi, unwrapped to within pi of `reference_phi`.
    pub weighted_phi: f64,
    pub weighted_z: f64,
    /// Phi of the first deposit.
    pub reference_phi: f64,
}

impl CrystalSums {
    fn add(&mut self, hit: &StepHit) {
        let e = hit.energy_mev;
        if self.energy <= 0.0 {
            self.reference_phi = hit.position.phi;
        }
        let mut phi = hit.position.phi;
        let offset = phi - self.reference_phi;
        if offset > PI {
            phi -= TAU;
        } else if offset <= -PI {
            phi += TAU;
        }
        self.energy += e;
        self.weighted_time += e * hit.time_ns;
        self.weighted_rho += e * hit.position.rho;
        self.weighted_phi += e * phi;
        self.weighted_z += e * hit.position.z;
    }

    /// Energy-weighted mean phi in (-pi, pi].
    #[must_use]
    pub fn mean_phi(&self) -> f64 {
        wrap_phi(self.weighted_phi / self.energy)
    }
}

/// Lifecycle of the aggregator within one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    /// No event open.
    Idle,
    /// Recording hits for the current event.
    Accumulating,
    /// Event summarised; waiting for the next `initialize`.
    Flushed,
}

/// Hit aggregation engine for one worker.
#[derive(Debug)]
pub struct HitAggregator {
    table: Arc<SlotTable>,
    sums: BTreeMap<usize, CrystalSums>,
    state: AggregatorState,
    unresolved: u64,
}

impl HitAggregator {
    /// Creates an aggregator resolving indices through `table`.
    #[must_use]
    pub fn new(table: Arc<SlotTable>) -> Self {
        Self {
            table,
            sums: BTreeMap::new(),
            state: AggregatorState::Idle,
            unresolved: 0,
        }
    }

    /// Clears the accumulator and opens a new event.
    pub fn initialize(&mut self) {
        self.sums.clear();
        self.state = AggregatorState::Accumulating;
    }

    /// Adds one step. Deposits of zero or less are ignored.
    ///
    /// A hit arriving outside an open event opens one implicitly.
    pub fn record_hit(&mut self, hit: &StepHit, activity: &mut ActivityState) {
        if hit.energy_mev <= 0.0 {
            return;
        }
        if self.state != AggregatorState::Accumulating {
            self.initialize();
        }
        self.sums.entry(hit.index).or_default().add(hit);
        activity.record(hit.index, hit.energy_mev);
    }

    /// Emits one record per struck crystal, in ascending flat-index order.
    ///
    /// Times are relative to the decay when one was observed, absolute
    /// otherwise. Indices outside the slot table are emitted without a
    /// hierarchical id.
    pub fn end_of_event(&mut self, event_id: u64, decay: &DecayState) -> Vec<CrystalHit> {
        let reference_ns = decay.decay_time_ns().unwrap_or(0.0);
        let mut hits = Vec::with_capacity(self.sums.len());

        for (&index, sums) in &self.sums {
            let id = match self.table.get(index) {
                Ok(slot) => Some(slot.id),
                Err(e) => {
                    self.unresolved += 1;
                    warn!("event {event_id}: {e}; writing raw index");
                    None
                }
            };

            let e = sums.energy;
            hits.push(CrystalHit {
                event_id,
                index,
                id,
                energy_kev: mev_to_kev(e),
                time_ns: sums.weighted_time / e - reference_ns,
                position: Cylindrical::new(
                    sums.weighted_rho / e,
                    sums.mean_phi(),
                    sums.weighted_z / e,
                ),
            });
        }

        self.state = AggregatorState::Flushed;
        hits
    }

    /// Running sums of a crystal in the open event.
    #[must_use]
    pub fn sums(&self, index: usize) -> Option<&CrystalSums> {
        self.sums.get(&index)
    }

    /// Crystals struck in the open event.
    #[must_use]
    pub fn struck_crystals(&self) -> usize {
        self.sums.len()
    }

    #[must_use]
    pub fn state(&self) -> AggregatorState {
        self.state
    }

    /// Records emitted without a hierarchical id so far.
    #[must_use]
    pub fn unresolved(&self) -> u64 {
        self.unresolved
    }

    /// Slot table used for id resolution.
    #[must_use]
    pub fn table(&self) -> &Arc<SlotTable> {
        &self.table
    }
}
