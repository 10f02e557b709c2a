//! New-track notifications from the transport engine.

use crate::position::Cartesian;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Particle species of a newly created track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticleKind {
    /// Photon; the annihilation quantum.
    Gamma,
    /// Positron.
    Positron,
    /// Electron.
    Electron,
    /// Neutrino or anti-neutrino of any flavour.
    Neutrino,
    /// Nucleus, named by element and mass number (e.g. `F18`, `Zr89[909.000]`).
    Ion(String),
    /// Anything else, by engine name.
    Other(String),
}

impl ParticleKind {
    /// Engine name of the particle.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Gamma => "gamma",
            Self::Positron => "e+",
            Self::Electron => "e-",
            Self::Neutrino => "nu",
            Self::Ion(name) | Self::Other(name) => name,
        }
    }

    /// True for the quantum produced by electron-positron annihilation.
    #[must_use]
    pub fn is_annihilation_quantum(&self) -> bool {
        matches!(self, Self::Gamma)
    }
}

impl FromStr for ParticleKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "gamma" => Self::Gamma,
            "e+" => Self::Positron,
            "e-" => Self::Electron,
            n if n.starts_with("nu_") || n.starts_with("anti_nu_") => Self::Neutrino,
            n if looks_like_ion(n) => Self::Ion(n.to_string()),
            n => Self::Other(n.to_string()),
        })
    }
}

fn looks_like_ion(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name.chars().any(|c| c.is_ascii_digit())
}

impl fmt::Display for ParticleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Notification that the engine created a new track.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    /// Parent track id; 0 marks a primary, i.e. a new event.
    pub parent_id: i32,
    /// Global creation time (ns).
    pub global_time_ns: f64,
    /// Creation vertex.
    pub position: Cartesian,
    /// Particle species.
    pub kind: ParticleKind,
    /// Track id in the decay chain used to recognise the annihilation.
    pub lineage_parent_id: i32,
}

impl NewTrack {
    /// Creates a track notification whose lineage id equals its parent id.
    #[must_use]
    pub fn new(parent_id: i32, global_time_ns: f64, position: Cartesian, kind: ParticleKind) -> Self {
        Self {
            parent_id,
            global_time_ns,
            position,
            kind,
            lineage_parent_id: parent_id,
        }
    }

    /// Sets an explicit lineage id.
    #[must_use]
    pub fn with_lineage_parent_id(mut self, lineage_parent_id: i32) -> Self {
        self.lineage_parent_id = lineage_parent_id;
        self
    }

    /// True if this track starts a new event.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.parent_id == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_names() {
        assert_eq!("gamma".parse::<ParticleKind>(), Ok(ParticleKind::Gamma));
        assert_eq!("e+".parse::<ParticleKind>(), Ok(ParticleKind::Positron));
        assert_eq!("anti_nu_e".parse::<ParticleKind>(), Ok(ParticleKind::Neutrino));
        assert_eq!(
            "F18".parse::<ParticleKind>(),
            Ok(ParticleKind::Ion("F18".to_string()))
        );
        assert_eq!(
            "Zr89[909.000]".parse::<ParticleKind>(),
            Ok(ParticleKind::Ion("Zr89[909.000]".to_string()))
        );
        assert_eq!(
            "alpha".parse::<ParticleKind>(),
            Ok(ParticleKind::Other("alpha".to_string()))
        );
    }

    #[test]
    fn test_only_gamma_is_annihilation_quantum() {
        assert!(ParticleKind::Gamma.is_annihilation_quantum());
        assert!(!ParticleKind::Positron.is_annihilation_quantum());
        assert!(!ParticleKind::Ion("O18".into()).is_annihilation_quantum());
    }

    #[test]
    fn test_lineage_defaults_to_parent() {
        let t = NewTrack::new(4, 1.0, Cartesian::default(), ParticleKind::Gamma);
        assert_eq!(t.lineage_parent_id, 4);
        let t = t.with_lineage_parent_id(7);
        assert_eq!(t.lineage_parent_id, 7);
        assert!(!t.is_primary());
    }
}
