//! Readout granularity and index digit ordering.

use crate::error::Result;
use petring_core::Error as CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size of the unit one flat index addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// A single crystal.
    Crystal,
    /// A group of crystals within a block sharing a readout.
    MiniBlock,
    /// A whole block.
    Block,
    /// A column of blocks spanning the full axial length.
    Panel,
}

impl Granularity {
    /// All granularities, finest first.
    pub const ALL: [Granularity; 4] = [
        Self::Crystal,
        Self::MiniBlock,
        Self::Block,
        Self::Panel,
    ];

    /// Name as used in detector mode strings (`SiemensMiniBlock`).
    #[must_use]
    pub fn mode_name(self) -> &'static str {
        match self {
            Self::Crystal => "Crystal",
            Self::MiniBlock => "MiniBlock",
            Self::Block => "Block",
            Self::Panel => "Panel",
        }
    }
}

impl FromStr for Granularity {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "crystal" => Ok(Self::Crystal),
            "miniblock" => Ok(Self::MiniBlock),
            "block" => Ok(Self::Block),
            "panel" => Ok(Self::Panel),
            _ => Err(CoreError::UnknownGranularity(s.to_string())),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode_name())
    }
}

/// One level of the detector hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Ring,
    Block,
    /// Transaxial position of the unit within its block.
    Trans,
    /// Axial position of the unit within its block.
    Axial,
}

impl Level {
    /// Canonical order used for hierarchical IDs.
    pub const CANONICAL: [Level; 4] = [Self::Ring, Self::Block, Self::Trans, Self::Axial];

    /// Lower-case name, as used in column headers and JSON.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ring => "ring",
            Self::Block => "block",
            Self::Trans => "trans",
            Self::Axial => "axial",
        }
    }
}

/// Order in which hierarchy levels appear as digits of the flat index,
/// slowest-varying first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Level>", into = "Vec<Level>")]
pub struct DigitOrder(Vec<Level>);

impl DigitOrder {
    /// Creates a digit order. Each level may appear at most once.
    ///
    /// # Errors
    /// Returns a configuration error on a repeated level.
    pub fn new(levels: Vec<Level>) -> Result<Self> {
        for (i, level) in levels.iter().enumerate() {
            if levels[..i].contains(level) {
                return Err(CoreError::ConfigError(format!(
                    "level {level:?} appears more than once in digit order"
                ))
                .into());
            }
        }
        Ok(Self(levels))
    }

    /// Ring, block, transaxial, axial: axial varies fastest.
    #[must_use]
    pub fn crystal_default() -> Self {
        Self(vec![Level::Ring, Level::Block, Level::Trans, Level::Axial])
    }

    /// Ring, axial, block, transaxial: units sweep a half-ring before moving axially.
    #[must_use]
    pub fn mini_block_default() -> Self {
        Self(vec![Level::Ring, Level::Axial, Level::Block, Level::Trans])
    }

    /// Ring, block.
    #[must_use]
    pub fn block_default() -> Self {
        Self(vec![Level::Ring, Level::Block])
    }

    /// Block only.
    #[must_use]
    pub fn panel_default() -> Self {
        Self(vec![Level::Block])
    }

    /// Levels, slowest first.
    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.0
    }

    /// True if the order includes `level`.
    #[must_use]
    pub fn contains(&self, level: Level) -> bool {
        self.0.contains(&level)
    }
}

impl TryFrom<Vec<Level>> for DigitOrder {
    type Error = String;

    fn try_from(value: Vec<Level>) -> std::result::Result<Self, Self::Error> {
        Self::new(value).map_err(|e| e.to_string())
    }
}

impl From<DigitOrder> for Vec<Level> {
    fn from(value: DigitOrder) -> Self {
        value.0
    }
}

/// Digit order for each granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitOrders {
    pub crystal: DigitOrder,
    pub mini_block: DigitOrder,
    pub block: DigitOrder,
    pub panel: DigitOrder,
}

impl Default for DigitOrders {
    fn default() -> Self {
        Self {
            crystal: DigitOrder::crystal_default(),
            mini_block: DigitOrder::mini_block_default(),
            block: DigitOrder::block_default(),
            panel: DigitOrder::panel_default(),
        }
    }
}

impl DigitOrders {
    /// Order for a given granularity.
    #[must_use]
    pub fn for_granularity(&self, granularity: Granularity) -> &DigitOrder {
        match granularity {
            Granularity::Crystal => &self.crystal,
            Granularity::MiniBlock => &self.mini_block,
            Granularity::Block => &self.block,
            Granularity::Panel => &self.panel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity_parsing() {
        assert_eq!("crystal".parse::<Granularity>(), Ok(Granularity::Crystal));
        assert_eq!("MiniBlock".parse::<Granularity>(), Ok(Granularity::MiniBlock));
        assert_eq!("mini-block".parse::<Granularity>(), Ok(Granularity::MiniBlock));
        assert_eq!("PANEL".parse::<Granularity>(), Ok(Granularity::Panel));
        assert_eq!(
            "voxel".parse::<Granularity>(),
            Err(CoreError::UnknownGranularity("voxel".to_string()))
        );
    }

    #[test]
    fn test_digit_order_rejects_duplicates() {
        assert!(DigitOrder::new(vec![Level::Ring, Level::Block, Level::Ring]).is_err());
        assert!(DigitOrder::new(vec![Level::Axial, Level::Trans]).is_ok());
    }

    #[test]
    fn test_digit_order_json() {
        let order: DigitOrder = serde_json::from_str(r#"["ring", "axial", "block", "trans"]"#)
            .expect("valid order");
        assert_eq!(order, DigitOrder::mini_block_default());

        let bad = serde_json::from_str::<DigitOrder>(r#"["ring", "ring"]"#);
        assert!(bad.is_err());
    }
}
