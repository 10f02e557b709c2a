//! Detector family configurations.
//!
//! A family fixes the block layout, crystal dimensions and ring radius of a
//! scanner. The number of rings is the one free parameter, usually derived
//! from a requested axial length.

use crate::error::Result;
use crate::granularity::{DigitOrders, Granularity, Level};
use petring_core::{CrystalMaterial, Error as CoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

/// Tolerance when converting a length into a whole number of rings.
const RING_COUNT_EPSILON: f64 = 1e-9;

/// Known scanner families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorFamily {
    /// Siemens Biograph Vision Quadra.
    SiemensQuadra,
    /// uEXPLORER total-body scanner.
    Explorer,
    /// Toy ring of large boxes.
    Basic,
}

impl DetectorFamily {
    /// Prefix used in detector mode strings (`SiemensCrystal`, `ExplorerPanel`).
    #[must_use]
    pub fn mode_prefix(self) -> &'static str {
        match self {
            Self::SiemensQuadra => "Siemens",
            Self::Explorer => "Explorer",
            Self::Basic => "Basic",
        }
    }

    /// Built-in configuration for this family.
    #[must_use]
    pub fn preset(self) -> DetectorFamilyConfig {
        match self {
            Self::SiemensQuadra => DetectorFamilyConfig::siemens_quadra(),
            Self::Explorer => DetectorFamilyConfig::explorer(),
            Self::Basic => DetectorFamilyConfig::basic(),
        }
    }
}

impl FromStr for DetectorFamily {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "siemens" | "quadra" | "siemensquadra" => Ok(Self::SiemensQuadra),
            "explorer" => Ok(Self::Explorer),
            "basic" => Ok(Self::Basic),
            _ => Err(CoreError::UnknownFamily(s.to_string())),
        }
    }
}

impl fmt::Display for DetectorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SiemensQuadra => f.write_str("SiemensQuadra"),
            Self::Explorer => f.write_str("Explorer"),
            Self::Basic => f.write_str("Basic"),
        }
    }
}

/// Splits a detector mode string such as `SiemensMiniBlock` into family and
/// granularity. A bare family name selects crystal granularity.
///
/// # Errors
/// Returns `UnknownFamily` or `UnknownGranularity` for unrecognised parts.
pub fn parse_detector_mode(mode: &str) -> Result<(DetectorFamily, Granularity)> {
    for family in [
        DetectorFamily::SiemensQuadra,
        DetectorFamily::Explorer,
        DetectorFamily::Basic,
    ] {
        if let Some(rest) = mode.strip_prefix(family.mode_prefix()) {
            let granularity = if rest.is_empty() {
                Granularity::Crystal
            } else {
                rest.parse()?
            };
            return Ok((family, granularity));
        }
    }
    Err(CoreError::UnknownFamily(mode.to_string()).into())
}

/// Crystal counts of a sub-block readout unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitShape {
    pub trans: usize,
    pub axial: usize,
}

/// Immutable description of a scanner, chosen once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorFamilyConfig {
    pub family: DetectorFamily,
    /// Number of rings along the axis.
    pub rings: usize,
    pub blocks_per_ring: usize,
    /// Crystals per block, transaxially.
    pub crystals_trans: usize,
    /// Crystals per block, axially.
    pub crystals_axial: usize,
    /// Mini-block shape; `None` if the family has no mini-block readout.
    pub mini_block: Option<UnitShape>,
    /// Crystal full width (mm), same in both directions.
    pub crystal_pitch_mm: f64,
    /// Crystal radial length (mm).
    pub crystal_depth_mm: f64,
    /// Axial gap between adjacent rings (mm).
    pub ring_gap_mm: f64,
    /// Radius of the crystal centres (mm).
    pub radius_mm: f64,
    /// Whole-ring azimuthal offset (degrees).
    pub phi_offset_deg: f64,
    pub material: CrystalMaterial,
    pub digit_orders: DigitOrders,
}

impl Default for DetectorFamilyConfig {
    fn default() -> Self {
        Self::siemens_quadra()
    }
}

// Intermediate structs for the JSON schema; every field overrides a preset
#[derive(Deserialize)]
struct JsonConfig {
    detector: JsonDetector,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonDetector {
    family: Option<String>,
    length_mm: Option<f64>,
    rings: Option<usize>,
    material: Option<String>,
    geometry: JsonGeometry,
    digit_orders: Option<DigitOrders>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonGeometry {
    blocks_per_ring: Option<usize>,
    crystals_trans: Option<usize>,
    crystals_axial: Option<usize>,
    mini_block_trans: Option<usize>,
    mini_block_axial: Option<usize>,
    crystal_pitch_mm: Option<f64>,
    crystal_depth_mm: Option<f64>,
    ring_gap_mm: Option<f64>,
    radius_mm: Option<f64>,
    phi_offset_deg: Option<f64>,
}

impl DetectorFamilyConfig {
    /// Siemens Biograph Vision Quadra: 38 blocks of 20x10 LSO crystals,
    /// 3.2 mm pitch, 32 contiguous rings (1024 mm).
    #[must_use]
    pub fn siemens_quadra() -> Self {
        Self {
            family: DetectorFamily::SiemensQuadra,
            rings: 32,
            blocks_per_ring: 38,
            crystals_trans: 20,
            crystals_axial: 10,
            mini_block: Some(UnitShape { trans: 5, axial: 5 }),
            crystal_pitch_mm: 3.2,
            crystal_depth_mm: 20.0,
            ring_gap_mm: 0.0,
            radius_mm: 410.0,
            phi_offset_deg: 0.0,
            material: CrystalMaterial::Lso,
            digit_orders: DigitOrders::default(),
        }
    }

    /// uEXPLORER: 24 blocks of 35x84 LYSO crystals, 2.76 mm pitch,
    /// 8 rings separated by 2.6 mm gaps (1872.92 mm).
    #[must_use]
    pub fn explorer() -> Self {
        Self {
            family: DetectorFamily::Explorer,
            rings: 8,
            blocks_per_ring: 24,
            crystals_trans: 35,
            crystals_axial: 84,
            mini_block: Some(UnitShape { trans: 7, axial: 6 }),
            crystal_pitch_mm: 2.76,
            crystal_depth_mm: 18.1,
            ring_gap_mm: 2.6,
            radius_mm: 402.05,
            phi_offset_deg: 0.0,
            material: CrystalMaterial::Lyso,
            digit_orders: DigitOrders::default(),
        }
    }

    /// Ten rings of twenty 100 mm x 100 mm x 200 mm boxes at 500 mm radius,
    /// 200 mm ring spacing.
    #[must_use]
    pub fn basic() -> Self {
        let mut digit_orders = DigitOrders::default();
        digit_orders.crystal = digit_orders.block.clone();
        Self {
            family: DetectorFamily::Basic,
            rings: 10,
            blocks_per_ring: 20,
            crystals_trans: 1,
            crystals_axial: 1,
            mini_block: None,
            crystal_pitch_mm: 100.0,
            crystal_depth_mm: 200.0,
            ring_gap_mm: 100.0,
            radius_mm: 500.0,
            phi_offset_deg: 0.0,
            material: CrystalMaterial::Lyso,
            digit_orders,
        }
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the JSON is malformed, or
    /// the resulting configuration is invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json_config: JsonConfig = serde_json::from_reader(reader)?;
        Self::from_json_config(json_config)
    }

    /// Load configuration from a JSON string.
    ///
    /// Fields not given keep the value of the named family's preset.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the configuration is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let json_config: JsonConfig = serde_json::from_str(json)?;
        Self::from_json_config(json_config)
    }

    fn from_json_config(config: JsonConfig) -> Result<Self> {
        let detector = config.detector;

        let family = match detector.family.as_deref() {
            Some(name) => name.parse::<DetectorFamily>()?,
            None => DetectorFamily::SiemensQuadra,
        };
        let mut out = family.preset();

        let g = detector.geometry;
        if let Some(v) = g.blocks_per_ring {
            out.blocks_per_ring = v;
        }
        if let Some(v) = g.crystals_trans {
            out.crystals_trans = v;
        }
        if let Some(v) = g.crystals_axial {
            out.crystals_axial = v;
        }
        match (g.mini_block_trans, g.mini_block_axial) {
            (None, None) => {}
            (Some(trans), Some(axial)) => out.mini_block = Some(UnitShape { trans, axial }),
            _ => {
                return Err(CoreError::ConfigError(
                    "mini_block_trans and mini_block_axial must be given together".to_string(),
                )
                .into())
            }
        }
        if let Some(v) = g.crystal_pitch_mm {
            out.crystal_pitch_mm = v;
        }
        if let Some(v) = g.crystal_depth_mm {
            out.crystal_depth_mm = v;
        }
        if let Some(v) = g.ring_gap_mm {
            out.ring_gap_mm = v;
        }
        if let Some(v) = g.radius_mm {
            out.radius_mm = v;
        }
        if let Some(v) = g.phi_offset_deg {
            out.phi_offset_deg = v;
        }
        if let Some(name) = detector.material.as_deref() {
            out.material = name.parse()?;
        }
        if let Some(orders) = detector.digit_orders {
            out.digit_orders = orders;
        }

        match (detector.rings, detector.length_mm) {
            (Some(_), Some(_)) => {
                return Err(CoreError::ConfigError(
                    "give either rings or length_mm, not both".to_string(),
                )
                .into())
            }
            (Some(rings), None) => out.rings = rings,
            (None, Some(length)) => out.rings = out.rings_for_length(length)?,
            (None, None) => {}
        }

        // Validate once at load time
        out.validate()?;
        Ok(out)
    }

    /// Sets the number of rings.
    #[must_use]
    pub fn with_rings(mut self, rings: usize) -> Self {
        self.rings = rings;
        self
    }

    /// Sets the number of rings to cover `length_mm` axially.
    ///
    /// # Errors
    /// Returns a configuration error for a non-positive length.
    pub fn with_axial_length(mut self, length_mm: f64) -> Result<Self> {
        self.rings = self.rings_for_length(length_mm)?;
        Ok(self)
    }

    /// Sets the crystal material.
    #[must_use]
    pub fn with_material(mut self, material: CrystalMaterial) -> Self {
        self.material = material;
        self
    }

    /// Sets the whole-ring azimuthal offset.
    #[must_use]
    pub fn with_phi_offset_deg(mut self, phi_offset_deg: f64) -> Self {
        self.phi_offset_deg = phi_offset_deg;
        self
    }

    /// Sets the crystal-centre radius.
    #[must_use]
    pub fn with_radius_mm(mut self, radius_mm: f64) -> Self {
        self.radius_mm = radius_mm;
        self
    }

    /// Sets the inter-ring gap.
    #[must_use]
    pub fn with_ring_gap_mm(mut self, ring_gap_mm: f64) -> Self {
        self.ring_gap_mm = ring_gap_mm;
        self
    }

    /// Axial extent of one block (mm).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn block_axial_mm(&self) -> f64 {
        self.crystals_axial as f64 * self.crystal_pitch_mm
    }

    /// Transaxial extent of one block (mm).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn block_trans_mm(&self) -> f64 {
        self.crystals_trans as f64 * self.crystal_pitch_mm
    }

    /// Axial distance between corresponding crystals of adjacent rings (mm).
    #[must_use]
    pub fn ring_pitch_mm(&self) -> f64 {
        self.block_axial_mm() + self.ring_gap_mm
    }

    /// Number of rings needed to cover `length_mm`, rounding up.
    ///
    /// Inverse of [`Self::length_for_rings`] for exact lengths.
    ///
    /// # Errors
    /// Returns a configuration error for a non-positive or non-finite length.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn rings_for_length(&self, length_mm: f64) -> Result<usize> {
        if !(length_mm.is_finite() && length_mm > 0.0) {
            return Err(CoreError::ConfigError(format!(
                "axial length must be positive, got {length_mm} mm"
            ))
            .into());
        }
        let rings = ((length_mm + self.ring_gap_mm) / self.ring_pitch_mm() - RING_COUNT_EPSILON)
            .ceil()
            .max(1.0);
        Ok(rings as usize)
    }

    /// Axial length spanned by `rings` rings, gaps included (mm).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn length_for_rings(&self, rings: usize) -> f64 {
        if rings == 0 {
            return 0.0;
        }
        self.block_axial_mm() * rings as f64 + self.ring_gap_mm * (rings - 1) as f64
    }

    /// Axial length of the configured detector (mm).
    #[must_use]
    pub fn axial_length_mm(&self) -> f64 {
        self.length_for_rings(self.rings)
    }

    /// Crystals per block.
    #[must_use]
    pub fn crystals_per_block(&self) -> usize {
        self.crystals_trans * self.crystals_axial
    }

    /// Total number of crystals in the detector.
    #[must_use]
    pub fn crystal_count(&self) -> usize {
        self.rings * self.blocks_per_ring * self.crystals_per_block()
    }

    /// True if the family supports the given granularity.
    #[must_use]
    pub fn supports(&self, granularity: Granularity) -> bool {
        granularity != Granularity::MiniBlock || self.mini_block.is_some()
    }

    /// Checks counts, dimensions, mini-block divisibility and digit orders.
    ///
    /// # Errors
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("rings", self.rings),
            ("blocks_per_ring", self.blocks_per_ring),
            ("crystals_trans", self.crystals_trans),
            ("crystals_axial", self.crystals_axial),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(config_error(format!("{name} must be positive")));
            }
        }

        let lengths = [
            ("crystal_pitch_mm", self.crystal_pitch_mm),
            ("crystal_depth_mm", self.crystal_depth_mm),
            ("radius_mm", self.radius_mm),
        ];
        for (name, value) in lengths {
            if !(value.is_finite() && value > 0.0) {
                return Err(config_error(format!("{name} must be positive, got {value}")));
            }
        }
        if !(self.ring_gap_mm.is_finite() && self.ring_gap_mm >= 0.0) {
            return Err(config_error(format!(
                "ring_gap_mm must be non-negative, got {}",
                self.ring_gap_mm
            )));
        }
        if !self.phi_offset_deg.is_finite() {
            return Err(config_error("phi_offset_deg must be finite".to_string()));
        }

        if let Some(shape) = self.mini_block {
            if shape.trans == 0
                || shape.axial == 0
                || self.crystals_trans % shape.trans != 0
                || self.crystals_axial % shape.axial != 0
            {
                return Err(config_error(format!(
                    "mini-block of {}x{} crystals does not tile a {}x{} block",
                    shape.trans, shape.axial, self.crystals_trans, self.crystals_axial
                )));
            }
        }

        for granularity in Granularity::ALL {
            if !self.supports(granularity) {
                continue;
            }
            let order = self.digit_orders.for_granularity(granularity);
            let (nr, nb, nt, na) = self.unit_radices(granularity);
            for (level, radix) in [
                (Level::Ring, nr),
                (Level::Block, nb),
                (Level::Trans, nt),
                (Level::Axial, na),
            ] {
                if radix > 1 && !order.contains(level) {
                    return Err(config_error(format!(
                        "{granularity} digit order omits {level:?}, which has {radix} values"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Number of (ring, block, trans, axial) values at a granularity.
    ///
    /// Callers must check [`Self::supports`] first; an unsupported
    /// mini-block granularity reports single-crystal units.
    #[must_use]
    pub fn unit_radices(&self, granularity: Granularity) -> (usize, usize, usize, usize) {
        let (ut, ua) = self.unit_crystals(granularity);
        let rings = if granularity == Granularity::Panel {
            1
        } else {
            self.rings
        };
        (
            rings,
            self.blocks_per_ring,
            self.crystals_trans / ut.max(1),
            self.crystals_axial / ua.max(1),
        )
    }

    /// Crystals per readout unit (transaxial, axial) at a granularity.
    #[must_use]
    pub fn unit_crystals(&self, granularity: Granularity) -> (usize, usize) {
        match granularity {
            Granularity::Crystal => (1, 1),
            Granularity::MiniBlock => self
                .mini_block
                .map_or((1, 1), |shape| (shape.trans, shape.axial)),
            Granularity::Block | Granularity::Panel => (self.crystals_trans, self.crystals_axial),
        }
    }
}

fn config_error(message: String) -> crate::error::Error {
    CoreError::ConfigError(message).into()
}
