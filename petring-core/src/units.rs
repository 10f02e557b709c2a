//! Unit conversion constants.
//!
//! Internal lengths are millimetres, times nanoseconds, energies MeV.

/// MeV to keV.
pub const MEV_TO_KEV: f64 = 1000.0;

/// Millimetres per centimetre.
pub const MM_PER_CM: f64 = 10.0;

/// Converts an energy in MeV to keV.
#[inline]
#[must_use]
pub fn mev_to_kev(energy_mev: f64) -> f64 {
    energy_mev * MEV_TO_KEV
}

/// Converts a length in millimetres to centimetres.
#[inline]
#[must_use]
pub fn mm_to_cm(length_mm: f64) -> f64 {
    length_mm / MM_PER_CM
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_conversions() {
        assert_relative_eq!(mev_to_kev(0.511), 511.0);
        assert_relative_eq!(mm_to_cm(820.0), 82.0);
    }
}
