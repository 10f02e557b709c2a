//! Scanner summary for reconstruction headers.

use crate::family::DetectorFamilyConfig;

/// Quantities a reconstruction package needs to describe the scanner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorGeometryData {
    pub rings: usize,
    pub blocks_per_ring: usize,
    pub crystals_axial: usize,
    pub crystals_trans: usize,
    /// Diameter of the crystal front faces (mm).
    pub ring_inner_diameter_mm: f64,
    /// Axial distance between adjacent crystal centres (mm).
    pub ring_gap_mm: f64,
    pub crystal_radial_size_mm: f64,
    pub crystal_axial_size_mm: f64,
    pub crystal_trans_size_mm: f64,
}

impl From<&DetectorFamilyConfig> for DetectorGeometryData {
    fn from(config: &DetectorFamilyConfig) -> Self {
        Self {
            rings: config.rings,
            blocks_per_ring: config.blocks_per_ring,
            crystals_axial: config.crystals_axial,
            crystals_trans: config.crystals_trans,
            ring_inner_diameter_mm: 2.0 * (config.radius_mm - config.crystal_depth_mm / 2.0),
            ring_gap_mm: config.crystal_pitch_mm,
            crystal_radial_size_mm: config.crystal_depth_mm,
            crystal_axial_size_mm: config.crystal_pitch_mm,
            crystal_trans_size_mm: config.crystal_pitch_mm,
        }
    }
}

impl DetectorGeometryData {
    /// Crystal rings, counting each axial crystal row as a ring.
    #[must_use]
    pub fn crystal_rings(&self) -> usize {
        self.rings * self.crystals_axial
    }

    /// Detectors around one crystal ring.
    #[must_use]
    pub fn detectors_per_ring(&self) -> usize {
        self.crystals_trans * self.blocks_per_ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_explorer_summary() {
        let data = DetectorGeometryData::from(&DetectorFamilyConfig::explorer());
        // 8 rings * 84 axial crystals
        assert_eq!(data.crystal_rings(), 672);
        // 35 * 24
        assert_eq!(data.detectors_per_ring(), 840);
        // 2 * (402.05 - 9.05) = 786 mm face to face
        assert_relative_eq!(data.ring_inner_diameter_mm, 786.0, epsilon = 1e-9);
        assert_relative_eq!(data.ring_gap_mm, 2.76);
    }
}
