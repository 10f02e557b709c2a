//! petring-core: Core types for PET ring detector readout.
//!
//! This crate provides the value types shared by the geometry resolver,
//! the hit aggregation engine and the decay tracker: positions, step hits,
//! per-crystal output records, new-track notifications, and the registries
//! of crystal materials and source isotopes.
//!
//! # Units
//!
//! Inputs follow the transport engine's internal convention (MeV, ns, mm,
//! radians). Output energies are in keV.

pub mod error;
pub mod hit;
pub mod material;
pub mod position;
pub mod track;
pub mod units;

pub use error::{Error, Result};
pub use hit::{CrystalHit, HierarchicalId, StepHit, MAX_LEVELS};
pub use material::{CrystalMaterial, Isotope};
pub use position::{Cartesian, Cylindrical};
pub use track::{NewTrack, ParticleKind};
