//! Cartesian and cylindrical positions.
//!
//! The cylinder axis is z. Azimuth `phi` is in radians, measured from +x.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cartesian position in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cartesian {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Cartesian {
    /// Creates a new cartesian position.
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: &Cartesian) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Converts to cylindrical coordinates about the z axis.
    #[must_use]
    pub fn to_cylindrical(&self) -> Cylindrical {
        Cylindrical {
            rho: self.x.hypot(self.y),
            phi: self.y.atan2(self.x),
            z: self.z,
        }
    }
}

/// Cylindrical position: radius (mm), azimuth (rad), axial (mm).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cylindrical {
    pub rho: f64,
    pub phi: f64,
    pub z: f64,
}

impl Cylindrical {
    /// Creates a new cylindrical position.
    #[must_use]
    pub fn new(rho: f64, phi: f64, z: f64) -> Self {
        Self { rho, phi, z }
    }

    /// Converts to cartesian coordinates.
    #[must_use]
    pub fn to_cartesian(&self) -> Cartesian {
        let (sin, cos) = self.phi.sin_cos();
        Cartesian {
            x: self.rho * cos,
            y: self.rho * sin,
            z: self.z,
        }
    }
}

impl From<Cartesian> for Cylindrical {
    fn from(value: Cartesian) -> Self {
        value.to_cylindrical()
    }
}

impl From<Cylindrical> for Cartesian {
    fn from(value: Cylindrical) -> Self {
        value.to_cartesian()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_distance_three_four_five() {
        let a = Cartesian::new(0.0, 0.0, 0.0);
        let b = Cartesian::new(3.0, 4.0, 0.0);
        assert_relative_eq!(a.distance_to(&b), 5.0);
        assert_relative_eq!(b.distance_to(&a), 5.0);
    }

    #[test]
    fn test_cylindrical_roundtrip() {
        let p = Cartesian::new(0.0, 410.0, -12.5);
        let c = p.to_cylindrical();
        assert_relative_eq!(c.rho, 410.0);
        assert_relative_eq!(c.phi, FRAC_PI_2);
        assert_relative_eq!(c.z, -12.5);

        let back: Cartesian = c.into();
        assert_relative_eq!(back.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(back.y, 410.0, epsilon = 1e-9);
    }
}
