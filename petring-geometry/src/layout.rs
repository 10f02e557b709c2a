//! Flat index to slot placement.
//!
//! A flat index is a mixed-radix number whose digits are hierarchy levels
//! in the configured [`DigitOrder`]. Every family and granularity runs
//! through the same decomposition and placement; only the radices, unit
//! sizes and digit order differ.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use crate::error::Result;
use crate::family::{DetectorFamily, DetectorFamilyConfig};
use crate::granularity::{DigitOrder, Granularity, Level};
use petring_core::{Cylindrical, Error as CoreError, HierarchicalId};

/// Half-sizes of a slot's box: radial, transaxial, axial (mm).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotExtent {
    pub half_radial_mm: f64,
    pub half_trans_mm: f64,
    pub half_axial_mm: f64,
}

/// Placement of one addressable unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometrySlot {
    /// Flat index.
    pub index: usize,
    /// Address in ring, block, trans, axial order, restricted to the
    /// levels the granularity distinguishes.
    pub id: HierarchicalId,
    /// Centre of the unit.
    pub position: Cylindrical,
    /// Rotation about the cylinder axis applied to the unit (rad); the
    /// negative of the unit's final azimuth.
    pub rotation_z: f64,
}

/// Digits of a decomposed flat index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelDigits {
    pub ring: usize,
    pub block: usize,
    pub trans: usize,
    pub axial: usize,
}

impl LevelDigits {
    fn get(&self, level: Level) -> usize {
        match level {
            Level::Ring => self.ring,
            Level::Block => self.block,
            Level::Trans => self.trans,
            Level::Axial => self.axial,
        }
    }

    fn set(&mut self, level: Level, value: usize) {
        match level {
            Level::Ring => self.ring = value,
            Level::Block => self.block = value,
            Level::Trans => self.trans = value,
            Level::Axial => self.axial = value,
        }
    }
}

/// Resolver for one (family, granularity) pair.
#[derive(Debug, Clone)]
pub struct Layout {
    family: DetectorFamily,
    granularity: Granularity,
    order: DigitOrder,
    rings: usize,
    blocks: usize,
    units_trans: usize,
    units_axial: usize,
    unit_trans_mm: f64,
    unit_axial_mm: f64,
    ring_pitch_mm: f64,
    radius_mm: f64,
    phi_offset_rad: f64,
    extent: SlotExtent,
}

impl Layout {
    /// Derives the layout of `config` at `granularity`.
    ///
    /// # Errors
    /// Returns a configuration error if the configuration is invalid or the
    /// family has no readout unit at this granularity.
    pub fn new(config: &DetectorFamilyConfig, granularity: Granularity) -> Result<Self> {
        config.validate()?;
        if !config.supports(granularity) {
            return Err(CoreError::ConfigError(format!(
                "{} has no {granularity} readout",
                config.family
            ))
            .into());
        }

        let (rings, blocks, units_trans, units_axial) = config.unit_radices(granularity);
        let (crystals_trans, crystals_axial) = config.unit_crystals(granularity);
        let unit_trans_mm = crystals_trans as f64 * config.crystal_pitch_mm;
        let unit_axial_mm = crystals_axial as f64 * config.crystal_pitch_mm;

        let half_axial_mm = if granularity == Granularity::Panel {
            config.axial_length_mm() / 2.0
        } else {
            unit_axial_mm / 2.0
        };

        Ok(Self {
            family: config.family,
            granularity,
            order: config.digit_orders.for_granularity(granularity).clone(),
            rings,
            blocks,
            units_trans,
            units_axial,
            unit_trans_mm,
            unit_axial_mm,
            ring_pitch_mm: config.ring_pitch_mm(),
            radius_mm: config.radius_mm,
            phi_offset_rad: config.phi_offset_deg.to_radians(),
            extent: SlotExtent {
                half_radial_mm: config.crystal_depth_mm / 2.0,
                half_trans_mm: unit_trans_mm / 2.0,
                half_axial_mm,
            },
        })
    }

    #[must_use]
    pub fn family(&self) -> DetectorFamily {
        self.family
    }

    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    #[must_use]
    pub fn digit_order(&self) -> &DigitOrder {
        &self.order
    }

    /// Box half-sizes shared by every slot.
    #[must_use]
    pub fn extent(&self) -> SlotExtent {
        self.extent
    }

    /// Rings distinguished at this granularity (1 for panels).
    #[must_use]
    pub fn rings(&self) -> usize {
        self.rings
    }

    /// Number of values a level takes.
    #[must_use]
    pub fn radix(&self, level: Level) -> usize {
        match level {
            Level::Ring => self.rings,
            Level::Block => self.blocks,
            Level::Trans => self.units_trans,
            Level::Axial => self.units_axial,
        }
    }

    /// Slots in one ring.
    #[must_use]
    pub fn slots_per_ring(&self) -> usize {
        self.blocks * self.units_trans * self.units_axial
    }

    /// Total number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rings * self.slots_per_ring()
    }

    /// True if the layout has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Splits a flat index into level digits, peeling the fastest digit first.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` for `index >= len()`.
    pub fn decompose(&self, index: usize) -> Result<LevelDigits> {
        let len = self.len();
        if index >= len {
            return Err(CoreError::IndexOutOfRange { index, len }.into());
        }
        let mut digits = LevelDigits::default();
        let mut rest = index;
        for &level in self.order.levels().iter().rev() {
            let radix = self.radix(level);
            digits.set(level, rest % radix);
            rest /= radix;
        }
        Ok(digits)
    }

    /// Inverse of [`Self::decompose`].
    #[must_use]
    pub fn compose(&self, digits: &LevelDigits) -> usize {
        self.order
            .levels()
            .iter()
            .fold(0, |acc, &level| acc * self.radix(level) + digits.get(level))
    }

    /// Resolves a flat index to its placement.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` for `index >= len()`.
    pub fn resolve(&self, index: usize) -> Result<GeometrySlot> {
        let digits = self.decompose(index)?;

        let phi = std::f64::consts::TAU / self.blocks as f64 * digits.block as f64
            + self.phi_offset_rad;

        let z = if self.granularity == Granularity::Panel {
            0.0
        } else {
            centred(digits.ring, self.rings) * self.ring_pitch_mm
                + centred(digits.axial, self.units_axial) * self.unit_axial_mm
        };

        // Flat block: transaxial offset turns into an azimuth shift and
        // a small radial push
        let ta = centred(digits.trans, self.units_trans) * self.unit_trans_mm;
        let d_phi = ta.atan2(self.radius_mm);
        let d_rho = ta * d_phi.sin() / 2.0;

        let phi_final = phi + d_phi;
        Ok(GeometrySlot {
            index,
            id: self.hierarchical_id(&digits),
            position: Cylindrical::new(self.radius_mm + d_rho, phi_final, z),
            rotation_z: -phi_final,
        })
    }

    fn hierarchical_id(&self, digits: &LevelDigits) -> HierarchicalId {
        let mut parts = [0u32; 4];
        let mut n = 0;
        for level in Level::CANONICAL {
            if self.order.contains(level) {
                parts[n] = digits.get(level) as u32;
                n += 1;
            }
        }
        HierarchicalId::from_parts(&parts[..n])
    }
}

/// Offset of position `i` among `n` from the centre of the run, in units.
fn centred(i: usize, n: usize) -> f64 {
    i as f64 - (n as f64 - 1.0) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quadra(granularity: Granularity) -> Layout {
        Layout::new(&DetectorFamilyConfig::siemens_quadra(), granularity).unwrap()
    }

    #[test]
    fn test_quadra_slot_counts() {
        assert_eq!(quadra(Granularity::Crystal).len(), 243_200);
        // 32 rings * 38 blocks * 4 trans * 2 axial
        assert_eq!(quadra(Granularity::MiniBlock).len(), 9_728);
        assert_eq!(quadra(Granularity::Block).len(), 1_216);
        assert_eq!(quadra(Granularity::Panel).len(), 38);
    }

    #[test]
    fn test_crystal_decomposition_axial_fastest() {
        let layout = quadra(Granularity::Crystal);
        // index = ((ring*38 + block)*20 + trans)*10 + axial
        let index = ((3 * 38 + 17) * 20 + 5) * 10 + 9;
        let digits = layout.decompose(index).unwrap();
        assert_eq!(
            digits,
            LevelDigits {
                ring: 3,
                block: 17,
                trans: 5,
                axial: 9
            }
        );
        assert_eq!(layout.compose(&digits), index);

        let slot = layout.resolve(index).unwrap();
        assert_eq!(slot.id.parts(), &[3, 17, 5, 9]);
    }

    #[test]
    fn test_mini_block_sweeps_half_ring_first() {
        let layout = quadra(Granularity::MiniBlock);
        // 152 mini-blocks per half ring: index 152 is ring 0, axial 1, block 0, trans 0
        let digits = layout.decompose(152).unwrap();
        assert_eq!(
            digits,
            LevelDigits {
                ring: 0,
                block: 0,
                trans: 0,
                axial: 1
            }
        );
        // index 5 is block 1, trans 1
        let digits = layout.decompose(5).unwrap();
        assert_eq!((digits.block, digits.trans), (1, 1));
    }

    #[test]
    fn test_out_of_range() {
        let layout = quadra(Granularity::Block);
        let err = layout.resolve(1_216).unwrap_err();
        assert_eq!(
            err.as_core(),
            Some(&CoreError::IndexOutOfRange {
                index: 1_216,
                len: 1_216
            })
        );
    }

    #[test]
    fn test_crystal_placement() {
        let layout = quadra(Granularity::Crystal);
        // ring 0, block 0, trans 0, axial 0
        let slot = layout.resolve(0).unwrap();
        // ta = (0 - 9.5) * 3.2 = -30.4
        let ta: f64 = -30.4;
        let d_phi = ta.atan2(410.0);
        assert_relative_eq!(slot.position.phi, d_phi, epsilon = 1e-12);
        assert_relative_eq!(
            slot.position.rho,
            410.0 + ta * d_phi.sin() / 2.0,
            epsilon = 1e-9
        );
        // z = (0 - 15.5) * 32 + (0 - 4.5) * 3.2 = -496 - 14.4
        assert_relative_eq!(slot.position.z, -510.4, epsilon = 1e-9);
        assert_relative_eq!(slot.rotation_z, -d_phi, epsilon = 1e-12);
    }

    #[test]
    fn test_block_placement_is_on_axis_of_block() {
        let layout = quadra(Granularity::Block);
        // ring 31, block 19: phi = 180 degrees, no transaxial offset
        let slot = layout.resolve(31 * 38 + 19).unwrap();
        assert_relative_eq!(slot.position.phi, std::f64::consts::PI, epsilon = 1e-12);
        assert_relative_eq!(slot.position.rho, 410.0);
        assert_relative_eq!(slot.position.z, 15.5 * 32.0, epsilon = 1e-9);
        assert_eq!(slot.id.parts(), &[31, 19]);
    }

    #[test]
    fn test_panel_spans_full_length() {
        let layout = quadra(Granularity::Panel);
        let slot = layout.resolve(10).unwrap();
        assert_relative_eq!(slot.position.z, 0.0);
        assert_eq!(slot.id.parts(), &[10]);
        assert_relative_eq!(layout.extent().half_axial_mm, 512.0);
        assert_relative_eq!(layout.extent().half_trans_mm, 32.0);
    }

    #[test]
    fn test_phi_offset() {
        let config = DetectorFamilyConfig::explorer().with_phi_offset_deg(7.5);
        let layout = Layout::new(&config, Granularity::Panel).unwrap();
        let slot = layout.resolve(1).unwrap();
        // 360/24 + 7.5 = 22.5 degrees
        assert_relative_eq!(slot.position.phi, 22.5_f64.to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn test_basic_has_no_mini_blocks() {
        let config = DetectorFamilyConfig::basic();
        assert!(Layout::new(&config, Granularity::MiniBlock).is_err());
        let layout = Layout::new(&config, Granularity::Crystal).unwrap();
        assert_eq!(layout.len(), 200);
        // ring 9 of 10 at 200 mm spacing, centred
        let slot = layout.resolve(199).unwrap();
        assert_relative_eq!(slot.position.z, 900.0);
        assert_relative_eq!(slot.position.rho, 500.0);
        assert_eq!(slot.id.parts(), &[9, 19]);
    }
}
