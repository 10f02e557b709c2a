//! Memory-mapped readers for step logs and crystal hit files.
//!
//! A step log records the engine callbacks of a run, one per line:
//!
//! ```text
//! # comment
//! T <parent_id> <time_ns> <x> <y> <z> <particle> [lineage_parent_id]
//! S <index> <edep_mev> <time_ns> <x> <y> <z>
//! E <event_id>
//! ```
//!
//! `T` is a new track, `S` a step with an energy deposit, `E` closes the
//! event. Positions are cartesian millimetres.

use crate::{Error, Result};
use memmap2::Mmap;
use petring_core::{Cartesian, NewTrack, ParticleKind, StepHit};
use petring_readout::{EngineEvent, RecordedEvent};
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A memory-mapped file reader.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the contents as UTF-8 text.
    ///
    /// # Errors
    /// Returns `InvalidFormat` if the file is not valid UTF-8.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(self.as_bytes()).map_err(|e| {
            Error::InvalidFormat(format!("{} is not UTF-8: {e}", self.path.display()))
        })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reader for recorded engine callbacks.
pub struct StepLogReader {
    reader: MappedFileReader,
}

impl StepLogReader {
    /// Opens a step log.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            reader: MappedFileReader::open(path)?,
        })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Parses every event in the log.
    ///
    /// # Errors
    /// Returns a parse error naming the first malformed line.
    pub fn read_events(&self) -> Result<Vec<RecordedEvent>> {
        parse_step_log(self.reader.as_str()?)
    }
}

/// Parses step-log text. Events are split sequentially and parsed in parallel.
///
/// # Errors
/// Returns a parse error naming the first malformed line, or for callbacks
/// after the last `E` line.
pub fn parse_step_log(text: &str) -> Result<Vec<RecordedEvent>> {
    let mut blocks: Vec<(usize, Vec<&str>)> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start = 0;

    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if current.is_empty() {
            start = line_no;
        }
        current.push(trimmed);
        if trimmed.starts_with('E') {
            blocks.push((start, std::mem::take(&mut current)));
        }
    }

    if let Some(offset) = current.iter().position(|l| is_record(l)) {
        return Err(Error::parse(
            start + offset + 1,
            "callbacks after the last event end",
        ));
    }

    blocks
        .par_iter()
        .map(|(start, lines)| parse_block(*start, lines))
        .collect()
}

fn is_record(line: &str) -> bool {
    !line.is_empty() && !line.starts_with('#')
}

fn parse_block(start: usize, lines: &[&str]) -> Result<RecordedEvent> {
    let mut event = RecordedEvent::default();

    for (offset, line) in lines.iter().enumerate() {
        if !is_record(line) {
            continue;
        }
        let line_no = start + offset + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();

        match fields[0] {
            "T" => {
                if fields.len() != 7 && fields.len() != 8 {
                    return Err(Error::parse(line_no, "track needs 6 or 7 fields"));
                }
                let parent_id: i32 = field(&fields, 1, line_no)?;
                let kind = ParticleKind::from_str(fields[6]).unwrap_or_else(|e| match e {});
                let mut track = NewTrack::new(
                    parent_id,
                    field(&fields, 2, line_no)?,
                    cartesian(&fields, 3, line_no)?,
                    kind,
                );
                if fields.len() == 8 {
                    track = track.with_lineage_parent_id(field(&fields, 7, line_no)?);
                }
                event.callbacks.push(EngineEvent::Track(track));
            }
            "S" => {
                if fields.len() != 7 {
                    return Err(Error::parse(line_no, "step needs 6 fields"));
                }
                let position = cartesian(&fields, 4, line_no)?;
                event.callbacks.push(EngineEvent::Step(StepHit::new(
                    field(&fields, 1, line_no)?,
                    field(&fields, 2, line_no)?,
                    field(&fields, 3, line_no)?,
                    position.to_cylindrical(),
                )));
            }
            "E" => {
                if fields.len() != 2 {
                    return Err(Error::parse(line_no, "event end needs an event id"));
                }
                event.event_id = field(&fields, 1, line_no)?;
            }
            other => {
                return Err(Error::parse(line_no, format!("unknown record type '{other}'")));
            }
        }
    }

    Ok(event)
}

fn field<T: FromStr>(fields: &[&str], i: usize, line: usize) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    fields[i]
        .parse()
        .map_err(|e| Error::parse(line, format!("field {i} '{}': {e}", fields[i])))
}

fn cartesian(fields: &[&str], first: usize, line: usize) -> Result<Cartesian> {
    Ok(Cartesian::new(
        field(fields, first, line)?,
        field(fields, first + 1, line)?,
        field(fields, first + 2, line)?,
    ))
}

/// Crystal hit records read back from a text or CSV output file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrystalHitColumns {
    pub event_id: Vec<u64>,
    /// One column per identifier field: the flat index, or the hierarchical
    /// parts with -1 where a record fell back to its flat index.
    pub id_columns: Vec<Vec<i64>>,
    pub energy_kev: Vec<f64>,
    pub time_ns: Vec<f64>,
    pub rho_mm: Vec<f64>,
    pub phi_rad: Vec<f64>,
    pub z_mm: Vec<f64>,
}

impl CrystalHitColumns {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.event_id.len()
    }

    /// True if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.event_id.is_empty()
    }
}

/// Reads a crystal hit file written in text or CSV format.
///
/// # Errors
/// Returns an error if the file cannot be read or a row is malformed.
pub fn read_crystal_hits_text<P: AsRef<Path>>(path: P) -> Result<CrystalHitColumns> {
    let reader = MappedFileReader::open(path)?;
    parse_crystal_hits_text(reader.as_str()?)
}

/// Parses crystal hit rows. A leading header row is skipped.
///
/// # Errors
/// Returns a parse error for rows with too few or inconsistent columns.
pub fn parse_crystal_hits_text(text: &str) -> Result<CrystalHitColumns> {
    let mut out = CrystalHitColumns::default();
    let mut width = None;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();
        let line_no = line_no + 1;

        if width.is_none() && fields[0].parse::<u64>().is_err() {
            continue;
        }
        let n = *width.get_or_insert(fields.len());
        if n < 7 {
            return Err(Error::parse(line_no, "expected at least 7 columns"));
        }
        if fields.len() != n {
            return Err(Error::parse(
                line_no,
                format!("expected {n} columns, found {}", fields.len()),
            ));
        }
        let id_count = n - 6;
        if out.id_columns.is_empty() {
            out.id_columns = vec![Vec::new(); id_count];
        }

        out.event_id.push(field(&fields, 0, line_no)?);
        for (k, column) in out.id_columns.iter_mut().enumerate() {
            column.push(field(&fields, 1 + k, line_no)?);
        }
        out.energy_kev.push(field(&fields, n - 5, line_no)?);
        out.time_ns.push(field(&fields, n - 4, line_no)?);
        out.rho_mm.push(field(&fields, n - 3, line_no)?);
        out.phi_rad.push(field(&fields, n - 2, line_no)?);
        out.z_mm.push(field(&fields, n - 1, line_no)?);
    }

    Ok(out)
}
