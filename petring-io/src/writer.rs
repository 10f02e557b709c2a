//! Writers for crystal hit records, decay logs and placement tables.

use crate::{Error, Result};
use petring_core::CrystalHit;
use petring_geometry::{Level, SlotTable};
use petring_readout::DecayRecord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Space separated, one record per line.
    Text,
    /// Comma separated with a header row.
    Csv,
    /// Little-endian fixed-width records.
    Binary,
}

impl OutputFormat {
    /// Picks a format from the file extension; anything unrecognized is text.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => Self::Csv,
            Some("bin" | "dat") => Self::Binary,
            _ => Self::Text,
        }
    }
}

/// How the crystal identifier is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSchema {
    /// The raw flat replica index.
    FlatIndex,
    /// One column per hierarchy level.
    Hierarchical { levels: Vec<Level> },
}

impl OutputSchema {
    /// Hierarchical schema with the levels the table's IDs carry.
    #[must_use]
    pub fn hierarchical_for(table: &SlotTable) -> Self {
        Self::Hierarchical {
            levels: id_levels(table),
        }
    }

    /// Names of the identifier columns.
    #[must_use]
    pub fn id_columns(&self) -> Vec<String> {
        match self {
            Self::FlatIndex => vec!["index".to_string()],
            Self::Hierarchical { levels } => {
                levels.iter().map(|l| format!("{}_id", l.name())).collect()
            }
        }
    }

    /// Identifier values of one hit.
    ///
    /// A hit without a hierarchical address keeps its flat index in the
    /// first column and fills the rest with -1.
    fn id_values(&self, hit: &CrystalHit) -> Vec<i64> {
        match self {
            Self::FlatIndex => vec![index_value(hit.index)],
            Self::Hierarchical { levels } => match &hit.id {
                Some(id) => id.parts().iter().map(|&p| i64::from(p)).collect(),
                None => {
                    let mut values = vec![-1; levels.len().max(1)];
                    values[0] = index_value(hit.index);
                    values
                }
            },
        }
    }
}

/// Levels carried by the table's hierarchical IDs, in canonical order.
fn id_levels(table: &SlotTable) -> Vec<Level> {
    let order = table.layout().digit_order();
    Level::CANONICAL
        .into_iter()
        .filter(|level| order.contains(*level))
        .collect()
}

fn index_value(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

/// Writer for summarized crystal hits.
pub struct CrystalHitWriter<W: Write = BufWriter<File>> {
    writer: W,
    format: OutputFormat,
    schema: OutputSchema,
    header_written: bool,
}

impl CrystalHitWriter {
    /// Creates a writer for a file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(
        path: P,
        format: OutputFormat,
        schema: OutputSchema,
    ) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), format, schema))
    }
}

impl<W: Write> CrystalHitWriter<W> {
    /// Wraps an existing writer.
    pub fn new(writer: W, format: OutputFormat, schema: OutputSchema) -> Self {
        Self {
            writer,
            format,
            schema,
            header_written: false,
        }
    }

    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    #[must_use]
    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        self.header_written = true;
        // Text rows are plain space-separated records
        if self.format == OutputFormat::Csv {
            writeln!(
                self.writer,
                "event_id,{},energy_kev,time_ns,rho_mm,phi_rad,z_mm",
                self.schema.id_columns().join(",")
            )?;
        }
        Ok(())
    }

    /// Writes hit records.
    ///
    /// Binary layout per record: u64 event id, then a u64 flat index or one
    /// i64 per hierarchy level, then f64 energy (keV), time (ns), rho (mm),
    /// phi (rad), z (mm).
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_hits(&mut self, hits: &[CrystalHit]) -> Result<()> {
        self.write_header()?;
        for hit in hits {
            match self.format {
                OutputFormat::Text | OutputFormat::Csv => {
                    let sep = if self.format == OutputFormat::Csv {
                        ","
                    } else {
                        " "
                    };
                    let ids: Vec<String> = self
                        .schema
                        .id_values(hit)
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                    writeln!(
                        self.writer,
                        "{ev}{sep}{ids}{sep}{e}{sep}{t}{sep}{rho}{sep}{phi}{sep}{z}",
                        ev = hit.event_id,
                        ids = ids.join(sep),
                        e = hit.energy_kev,
                        t = hit.time_ns,
                        rho = hit.position.rho,
                        phi = hit.position.phi,
                        z = hit.position.z,
                    )?;
                }
                OutputFormat::Binary => {
                    self.writer.write_all(&hit.event_id.to_le_bytes())?;
                    match self.schema {
                        OutputSchema::FlatIndex => {
                            self.writer.write_all(&(hit.index as u64).to_le_bytes())?;
                        }
                        OutputSchema::Hierarchical { .. } => {
                            for value in self.schema.id_values(hit) {
                                self.writer.write_all(&value.to_le_bytes())?;
                            }
                        }
                    }
                    for value in [
                        hit.energy_kev,
                        hit.time_ns,
                        hit.position.rho,
                        hit.position.phi,
                        hit.position.z,
                    ] {
                        self.writer.write_all(&value.to_le_bytes())?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the inner writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.write_header()?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Writer for per-event decay summaries.
pub struct DecayLogWriter<W: Write = BufWriter<File>> {
    writer: W,
    sep: &'static str,
    header_written: bool,
}

impl DecayLogWriter {
    /// Creates a decay log file.
    ///
    /// # Errors
    /// Returns `InvalidFormat` for binary output, or an I/O error if the
    /// file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<Self> {
        let sep = Self::separator(format)?;
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            sep,
            header_written: false,
        })
    }
}

impl<W: Write> DecayLogWriter<W> {
    /// Wraps an existing writer.
    ///
    /// # Errors
    /// Returns `InvalidFormat` for binary output.
    pub fn new(writer: W, format: OutputFormat) -> Result<Self> {
        Ok(Self {
            writer,
            sep: Self::separator(format)?,
            header_written: false,
        })
    }

    fn separator(format: OutputFormat) -> Result<&'static str> {
        match format {
            OutputFormat::Text => Ok(" "),
            OutputFormat::Csv => Ok(","),
            OutputFormat::Binary => Err(Error::InvalidFormat(
                "decay logs are written as text or CSV".to_string(),
            )),
        }
    }

    /// Writes one decay record. Missing values are written as `nan`.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_record(&mut self, record: &DecayRecord) -> Result<()> {
        let sep = self.sep;
        if !self.header_written {
            self.header_written = true;
            let columns = [
                "event_id",
                "decay_time_ns",
                "decay_x_mm",
                "decay_y_mm",
                "decay_z_mm",
                "annihilation_x_mm",
                "annihilation_y_mm",
                "annihilation_z_mm",
                "positron_range_mm",
            ];
            let prefix = if sep == " " { "# " } else { "" };
            writeln!(self.writer, "{prefix}{}", columns.join(sep))?;
        }

        let decay = record.decay_position;
        let annihilation = record.annihilation_position;
        let values = [
            record.decay_time_ns,
            decay.map(|p| p.x),
            decay.map(|p| p.y),
            decay.map(|p| p.z),
            annihilation.map(|p| p.x),
            annihilation.map(|p| p.y),
            annihilation.map(|p| p.z),
            record.positron_range_mm,
        ];
        let fields: Vec<String> = values
            .iter()
            .map(|v| v.map_or_else(|| "nan".to_string(), |v| v.to_string()))
            .collect();
        writeln!(self.writer, "{}{sep}{}", record.event_id, fields.join(sep))?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Dumps a placement table as CSV: flat index, ID parts, centre and
/// rotation.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_slot_table_csv<P: AsRef<Path>>(path: P, table: &SlotTable) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let id_headers: Vec<String> = id_levels(table)
        .iter()
        .map(|l| format!("{}_id", l.name()))
        .collect();
    writeln!(
        writer,
        "index,{},rho_mm,phi_rad,z_mm,rotation_z_rad",
        id_headers.join(",")
    )?;

    for slot in table {
        let parts: Vec<String> = slot.id.parts().iter().map(ToString::to_string).collect();
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            slot.index,
            parts.join(","),
            slot.position.rho,
            slot.position.phi,
            slot.position.z,
            slot.rotation_z
        )?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use petring_core::{Cartesian, Cylindrical, HierarchicalId};
    use petring_geometry::{DetectorFamilyConfig, Granularity};
    use tempfile::NamedTempFile;

    fn hit(index: usize, id: Option<HierarchicalId>) -> CrystalHit {
        CrystalHit {
            event_id: 3,
            index,
            id,
            energy_kev: 511.0,
            time_ns: 1.25,
            position: Cylindrical::new(410.5, 0.5, -12.0),
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(OutputFormat::from_path("hits.csv"), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path("hits.BIN"), OutputFormat::Binary);
        assert_eq!(OutputFormat::from_path("hits.dat"), OutputFormat::Binary);
        assert_eq!(OutputFormat::from_path("hits.txt"), OutputFormat::Text);
        assert_eq!(OutputFormat::from_path("hits"), OutputFormat::Text);
    }

    #[test]
    fn test_hierarchical_schema_for_block_table() {
        let config = DetectorFamilyConfig::siemens_quadra().with_rings(2);
        let table = SlotTable::build(&config, Granularity::Block).unwrap();
        let schema = OutputSchema::hierarchical_for(&table);
        assert_eq!(schema.id_columns(), vec!["ring_id", "block_id"]);
    }

    #[test]
    fn test_write_text_hierarchical() {
        let schema = OutputSchema::Hierarchical {
            levels: Level::CANONICAL.to_vec(),
        };
        let mut writer = CrystalHitWriter::new(Vec::new(), OutputFormat::Text, schema);
        writer
            .write_hits(&[
                hit(17, Some(HierarchicalId::from_parts(&[0, 17, 5, 9]))),
                hit(9999, None),
            ])
            .unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        // Plain records, no header line
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "3 0 17 5 9 511 1.25 410.5 0.5 -12");
        assert_eq!(lines[1], "3 9999 -1 -1 -1 511 1.25 410.5 0.5 -12");
    }

    #[test]
    fn test_write_csv_flat() {
        let mut writer = CrystalHitWriter::new(Vec::new(), OutputFormat::Csv, OutputSchema::FlatIndex);
        writer.write_hits(&[hit(42, None)]).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert!(text.contains("event_id,index,energy_kev,time_ns,rho_mm,phi_rad,z_mm"));
        assert!(text.contains("3,42,511,1.25,410.5,0.5,-12"));
    }

    #[test]
    fn test_write_binary_sizes() {
        let mut writer =
            CrystalHitWriter::new(Vec::new(), OutputFormat::Binary, OutputSchema::FlatIndex);
        writer.write_hits(&[hit(1, None), hit(2, None)]).unwrap();
        // 8 (event) + 8 (index) + 5 * 8 (f64) = 56 bytes per record
        assert_eq!(writer.into_inner().unwrap().len(), 112);

        let schema = OutputSchema::Hierarchical {
            levels: vec![Level::Ring, Level::Block],
        };
        let mut writer = CrystalHitWriter::new(Vec::new(), OutputFormat::Binary, schema);
        writer
            .write_hits(&[hit(1, Some(HierarchicalId::from_parts(&[0, 1])))])
            .unwrap();
        let data = writer.into_inner().unwrap();
        assert_eq!(data.len(), 8 + 2 * 8 + 5 * 8);
        assert_eq!(&data[..8], &3u64.to_le_bytes());
        assert_eq!(&data[16..24], &1i64.to_le_bytes());
    }

    #[test]
    fn test_decay_log_missing_values() {
        let mut writer = DecayLogWriter::new(Vec::new(), OutputFormat::Csv).unwrap();
        writer
            .write_record(&DecayRecord {
                event_id: 5,
                decay_time_ns: Some(100.0),
                decay_position: Some(Cartesian::new(0.0, 0.0, 0.0)),
                annihilation_position: None,
                positron_range_mm: None,
            })
            .unwrap();
        let text = String::from_utf8(writer.writer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("event_id,decay_time_ns"));
        assert_eq!(lines[1], "5,100,0,0,0,nan,nan,nan,nan");
    }

    #[test]
    fn test_decay_log_rejects_binary() {
        assert!(matches!(
            DecayLogWriter::new(Vec::new(), OutputFormat::Binary),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_slot_table_csv() {
        let config = DetectorFamilyConfig::basic().with_rings(2);
        let table = SlotTable::build(&config, Granularity::Block).unwrap();
        let file = NamedTempFile::new().unwrap();
        write_slot_table_csv(file.path(), &table).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "index,ring_id,block_id,rho_mm,phi_rad,z_mm,rotation_z_rad");
        assert_eq!(lines.len(), table.len() + 1);
        assert!(lines[1].starts_with("0,0,0,"));
    }
}
