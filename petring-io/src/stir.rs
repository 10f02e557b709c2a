//! STIR "ROOT header" describing the scanner as a GATE cylindrical PET.

use crate::Result;
use petring_core::units::mm_to_cm;
use petring_geometry::DetectorGeometryData;
use std::fs;
use std::path::Path;

/// Formats a number with six significant digits, trailing zeros removed,
/// switching to exponent notation for very large or small magnitudes.
pub(crate) fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let sci = format!("{value:.5e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..6).contains(&exponent) {
        let decimals = usize::try_from(5 - exponent).unwrap_or(0);
        trim_zeros(&format!("{value:.decimals$}")).to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_zeros(mantissa), exponent.abs())
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Renders the header text.
#[must_use]
pub fn stir_header(data: &DetectorGeometryData) -> String {
    let mut out = String::new();
    let mut line = |s: &str| {
        out.push_str(s);
        out.push('\n');
    };

    line("ROOT header := ");
    line("");
    line("originating system := User_defined_scanner");
    line(&format!(
        "Number of rings                          := {}",
        data.crystal_rings()
    ));
    line(&format!(
        "Number of detectors per ring             := {}",
        data.detectors_per_ring()
    ));
    line(&format!(
        "Inner ring diameter (cm)                 := {}",
        format_general(mm_to_cm(data.ring_inner_diameter_mm))
    ));
    line("Average depth of interaction (cm)        := 0.25");
    line(&format!(
        "Distance between rings (cm)              := {}",
        format_general(mm_to_cm(data.ring_gap_mm))
    ));
    line(&format!(
        "Default bin size (cm)                    := {}",
        format_general(mm_to_cm(data.crystal_trans_size_mm))
    ));
    line("View offset (degrees)                    := 0.0");
    line("Maximum number of non-arc-corrected bins := 381");
    line("Default number of arc-corrected bins     := 331");
    line(";Number of TOF time bins :=275");
    line(";Size of timing bin (ps) :=17.8");
    line(";Timing resolution (ps) :=75");
    line("");
    line("GATE scanner type := GATE_Cylindrical_PET");
    line("GATE_Cylindrical_PET Parameters :=");
    line("");
    line("name of data file := YOUR_FILE.root");
    line("");
    line("name of input TChain := Coincidences");
    line("");
    line("; As the GATE repeaters. ");
    line("; If you skip a level in GATE's hierarchy, ");
    line("; use 1.");
    line(&format!("number of Rsectors := {}", data.blocks_per_ring));
    line("number of modules_X := 1 ");
    line("number of modules_Y := 1");
    line("number of modules_Z := 1");
    line("number of submodules_X := 1");
    line("number of submodules_Y := 1");
    line(&format!("number of submodules_Z := {}", data.rings));
    line("number of crystals_X := 1");
    line(&format!("number of crystals_Y := {}", data.crystals_trans));
    line(&format!("number of crystals_Z := {}", data.crystals_axial));
    line("");
    line(";; From GATE's online documentation: ");
    line(";; (http://wiki.opengatecollaboration.org/index.php/Users_Guide_V7.2:Digitizer_and_readout_parameters)");
    line(";; [...] the readout depth depends upon how the electronic readout functions.");
    line(";; If one PMT reads the four modules in the axial direction, ");
    line(";; the depth should be set with the command:");
    line(";; /gate/digitizer/Singles/readout/setDepth 1 ");
    line(";");
    line("; In STIR terminology this will be used to define the number of crystals");
    line("; per singles unit. ");
    line("Singles readout depth := 1");
    line("");
    line(";");
    line("; If set the scattered events will be skipped");
    line("exclude scattered events := 1");
    line("");
    line(";");
    line("; If set the random events will be skipped");
    line("exclude random events := 1");
    line("");
    line("");
    line("; If want to deactivate set to [0, 10000]");
    line("low energy window (keV) := 0");
    line("upper energy window (keV):= 10000");
    line("");
    line("End GATE_Cylindrical_PET Parameters :=");
    line("");
    line("end ROOT header := ");
    out
}

/// Writes the header to `path`.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_stir_header<P: AsRef<Path>>(path: P, data: &DetectorGeometryData) -> Result<()> {
    fs::write(path, stir_header(data))?;
    Ok(())
}
