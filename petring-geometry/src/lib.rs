//! petring-geometry: Detector families and the flat-index resolver.
//!
//! This crate maps a flat replica index to the physical placement of a
//! crystal (or mini-block, block, panel) inside a PET ring detector.
//!
//! # Key Components
//!
//! - [`DetectorFamilyConfig`] - Scanner description with built-in presets and JSON loading
//! - [`Layout`] - Mixed-radix decomposition and flat-block placement for one granularity
//! - [`SlotTable`] - Eagerly built, read-only table of every slot
//! - [`DetectorGeometryData`] - Summary consumed by reconstruction headers
//!
//! # Example
//!
//! ```
//! use petring_geometry::{DetectorFamilyConfig, Granularity, SlotTable};
//!
//! let config = DetectorFamilyConfig::explorer().with_rings(1);
//! let table = SlotTable::build(&config, Granularity::Block).unwrap();
//! assert_eq!(table.len(), 24);
//! ```

mod error;
pub mod family;
pub mod granularity;
pub mod layout;
pub mod summary;
pub mod table;

pub use error::{Error, Result};
pub use family::{parse_detector_mode, DetectorFamily, DetectorFamilyConfig, UnitShape};
pub use granularity::{DigitOrder, DigitOrders, Granularity, Level};
pub use layout::{GeometrySlot, Layout, LevelDigits, SlotExtent};
pub use summary::DetectorGeometryData;
pub use table::SlotTable;
