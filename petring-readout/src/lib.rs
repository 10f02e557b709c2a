//! petring-readout: Crystal hit aggregation and decay bookkeeping.
//!
//! This crate turns the per-step energy deposits and new-track
//! notifications of a transport engine into one summarized record per
//! struck crystal per event:
//! - **Aggregation** - energy-weighted mean time and position per crystal
//! - **Activity** - cumulative energy per crystal across events, log-scaled readback
//! - **Decay tracking** - decay time and vertex, annihilation vertex, positron range
//!

mod activity;
mod aggregation;
mod decay;
mod pipeline;

pub use activity::ActivityState;
pub use aggregation::{AggregatorState, CrystalSums, HitAggregator};
pub use decay::{DecayRecord, DecayState, DecayTracker};
pub use pipeline::{
    replay_events, EngineEvent, EventReadout, ReadoutWorker, RecordedEvent, ReplaySummary,
    WorkerStats,
};
