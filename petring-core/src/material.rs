//! Crystal material and source isotope registries.
//!
//! Only names and identities live here; composition is the transport
//! engine's concern. Unknown names are configuration errors.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scintillator or semiconductor the crystals are made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CrystalMaterial {
    Lso,
    Lyso,
    NaI,
    Bgo,
    CsF,
    CsI,
    /// CsI with a 1% Cs-137 fraction.
    EnrichedCsI,
    BaF2,
    CaF2,
    CdWO4,
    Czt,
    MaPbBr3,
    Cs2AgBiBr6,
    MaPbI3,
    CaTiO3,
    CsPbBr3,
    FaPbI3,
}

impl CrystalMaterial {
    /// All known materials.
    pub const ALL: [CrystalMaterial; 17] = [
        Self::Lso,
        Self::Lyso,
        Self::NaI,
        Self::Bgo,
        Self::CsF,
        Self::CsI,
        Self::EnrichedCsI,
        Self::BaF2,
        Self::CaF2,
        Self::CdWO4,
        Self::Czt,
        Self::MaPbBr3,
        Self::Cs2AgBiBr6,
        Self::MaPbI3,
        Self::CaTiO3,
        Self::CsPbBr3,
        Self::FaPbI3,
    ];

    /// Canonical name as accepted on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Lso => "LSO",
            Self::Lyso => "LYSO",
            Self::NaI => "NaI",
            Self::Bgo => "BGO",
            Self::CsF => "CsF",
            Self::CsI => "CsI",
            Self::EnrichedCsI => "eCsI",
            Self::BaF2 => "BaF2",
            Self::CaF2 => "CaF2",
            Self::CdWO4 => "CdWO4",
            Self::Czt => "CZT",
            Self::MaPbBr3 => "MAPbBr3",
            Self::Cs2AgBiBr6 => "Cs2AgBiBr6",
            Self::MaPbI3 => "MAPbI3",
            Self::CaTiO3 => "CaTiO3",
            Self::CsPbBr3 => "CsPbBr3",
            Self::FaPbI3 => "FAPbI3",
        }
    }
}

impl FromStr for CrystalMaterial {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| Error::UnknownMaterial(s.to_string()))
    }
}

impl fmt::Display for CrystalMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Positron-emitting source isotope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Isotope {
    F18,
    Zr89,
    Y90,
    C11,
    O15,
    N13,
    Rb82,
    Ga68,
}

impl Isotope {
    /// All known isotopes.
    pub const ALL: [Isotope; 8] = [
        Self::F18,
        Self::Zr89,
        Self::Y90,
        Self::C11,
        Self::O15,
        Self::N13,
        Self::Rb82,
        Self::Ga68,
    ];

    /// Element symbol and mass number, e.g. `F18`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::F18 => "F18",
            Self::Zr89 => "Zr89",
            Self::Y90 => "Y90",
            Self::C11 => "C11",
            Self::O15 => "O15",
            Self::N13 => "N13",
            Self::Rb82 => "Rb82",
            Self::Ga68 => "Ga68",
        }
    }

    /// Atomic number.
    #[must_use]
    pub fn atomic_number(self) -> u32 {
        match self {
            Self::F18 => 9,
            Self::Zr89 => 40,
            Self::Y90 => 39,
            Self::C11 => 6,
            Self::O15 => 8,
            Self::N13 => 7,
            Self::Rb82 => 37,
            Self::Ga68 => 31,
        }
    }

    /// Mass number.
    #[must_use]
    pub fn mass_number(self) -> u32 {
        match self {
            Self::F18 => 18,
            Self::Zr89 => 89,
            Self::Y90 => 90,
            Self::C11 => 11,
            Self::O15 => 15,
            Self::N13 => 13,
            Self::Rb82 => 82,
            Self::Ga68 => 68,
        }
    }

    /// Track id whose gamma daughters are the annihilation photons.
    ///
    /// Only the F-18 chain has a known value. `None` disables annihilation
    /// tracking for the isotope.
    #[must_use]
    pub fn annihilation_lineage_id(self) -> Option<i32> {
        match self {
            Self::F18 => Some(4),
            _ => None,
        }
    }
}

impl FromStr for Isotope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|i| i.name() == s)
            .ok_or_else(|| Error::UnknownIsotope(s.to_string()))
    }
}

impl fmt::Display for Isotope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
