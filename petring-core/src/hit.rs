//! Step hits and per-crystal readout records.

use crate::position::Cylindrical;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum depth of a hierarchical crystal address.
pub const MAX_LEVELS: usize = 4;

/// Energy deposit reported by the transport engine for a single step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepHit {
    /// Flat replica index of the struck volume.
    pub index: usize,
    /// Deposited energy (MeV).
    pub energy_mev: f64,
    /// Global time of the step (ns).
    pub time_ns: f64,
    /// Step position.
    pub position: Cylindrical,
}

impl StepHit {
    /// Creates a new step hit.
    #[must_use]
    pub fn new(index: usize, energy_mev: f64, time_ns: f64, position: Cylindrical) -> Self {
        Self {
            index,
            energy_mev,
            time_ns,
            position,
        }
    }
}

/// Hierarchical address of a slot, slowest level first.
///
/// The arity depends on the granularity: a crystal address carries
/// (ring, block, trans, axial), a panel address carries only the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HierarchicalId {
    parts: [u32; MAX_LEVELS],
    arity: u8,
}

impl HierarchicalId {
    /// Builds an address from its parts. Parts beyond [`MAX_LEVELS`] are dropped.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_parts(parts: &[u32]) -> Self {
        let arity = parts.len().min(MAX_LEVELS);
        let mut out = [0; MAX_LEVELS];
        out[..arity].copy_from_slice(&parts[..arity]);
        Self {
            parts: out,
            arity: arity as u8,
        }
    }

    /// Address components, slowest level first.
    #[must_use]
    pub fn parts(&self) -> &[u32] {
        &self.parts[..self.arity as usize]
    }

    /// Number of components.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity as usize
    }
}

impl fmt::Display for HierarchicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

/// One summarized record per struck crystal per event.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CrystalHit {
    /// Event the record belongs to.
    pub event_id: u64,
    /// Flat replica index.
    pub index: usize,
    /// Hierarchical address, when the slot table covers `index`.
    pub id: Option<HierarchicalId>,
    /// Total deposited energy (keV).
    pub energy_kev: f64,
    /// Energy-weighted mean time, relative to the decay when one was seen (ns).
    pub time_ns: f64,
    /// Energy-weighted centroid.
    pub position: Cylindrical,
}
