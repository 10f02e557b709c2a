//! HDF5 output for crystal hits and decay summaries.

use crate::reader::CrystalHitColumns;
use crate::sink::EventSink;
use crate::writer::OutputSchema;
use crate::{Error, Result};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use ndarray::{s, ArrayView1};
use petring_geometry::{Level, SlotTable};
use petring_readout::EventReadout;
use std::path::Path;
use std::str::FromStr;

/// Layout and compression of the written datasets.
#[derive(Clone, Debug)]
pub struct CrystalHitWriteOptions {
    /// Detector mode recorded as a file attribute, e.g. `SiemensCrystal`.
    pub detector_mode: String,
    pub schema: OutputSchema,
    pub chunk_events: usize,
    pub compression: Option<u8>,
    pub shuffle: bool,
    pub include_decays: bool,
}

impl CrystalHitWriteOptions {
    /// Hierarchical columns for the table, deflate level 1.
    #[must_use]
    pub fn for_table(table: &SlotTable) -> Self {
        let layout = table.layout();
        Self {
            detector_mode: format!(
                "{}{}",
                layout.family().mode_prefix(),
                layout.granularity().mode_name()
            ),
            schema: OutputSchema::hierarchical_for(table),
            chunk_events: 100_000,
            compression: Some(1),
            shuffle: true,
            include_decays: true,
        }
    }
}

/// Streaming writer: `/entry/crystal_hits` and optionally `/entry/decays`.
pub struct Hdf5CrystalHitSink {
    file: File,
    hits: HitDatasets,
    decays: Option<DecayDatasets>,
}

struct HitDatasets {
    event_id: Dataset,
    index: Dataset,
    id: Vec<Dataset>,
    energy_kev: Dataset,
    time_ns: Dataset,
    rho_mm: Dataset,
    phi_rad: Dataset,
    z_mm: Dataset,
    len: usize,
}

struct DecayDatasets {
    event_id: Dataset,
    decay_time_ns: Dataset,
    positron_range_mm: Dataset,
    len: usize,
}

impl Hdf5CrystalHitSink {
    /// Creates the file and its extendable datasets.
    ///
    /// # Errors
    /// Returns an error if the HDF5 file or datasets cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, options: &CrystalHitWriteOptions) -> Result<Self> {
        let file = File::create(path)?;
        set_attr_str_file(&file, "petring_format_version", "0.1")?;
        set_attr_str_file(&file, "detector_mode", &options.detector_mode)?;

        let entry = file.create_group("entry")?;
        let group = entry.create_group("crystal_hits")?;
        let ext = |name: &str| -> Result<Dataset> {
            create_extendable_dataset::<f64>(
                &group,
                name,
                options.chunk_events,
                options.compression,
                options.shuffle,
            )
        };

        let id_levels: &[Level] = match &options.schema {
            OutputSchema::FlatIndex => &[],
            OutputSchema::Hierarchical { levels } => levels,
        };
        let mut id = Vec::with_capacity(id_levels.len());
        for level in id_levels {
            let ds = create_extendable_dataset::<i64>(
                &group,
                &format!("{}_id", level.name()),
                options.chunk_events,
                options.compression,
                options.shuffle,
            )?;
            set_dataset_units(&ds, "id")?;
            id.push(ds);
        }

        let hits = HitDatasets {
            event_id: create_extendable_dataset::<u64>(
                &group,
                "event_id",
                options.chunk_events,
                options.compression,
                options.shuffle,
            )?,
            index: create_extendable_dataset::<u64>(
                &group,
                "index",
                options.chunk_events,
                options.compression,
                options.shuffle,
            )?,
            id,
            energy_kev: ext("energy_kev")?,
            time_ns: ext("time_ns")?,
            rho_mm: ext("rho_mm")?,
            phi_rad: ext("phi_rad")?,
            z_mm: ext("z_mm")?,
            len: 0,
        };
        set_dataset_units(&hits.event_id, "id")?;
        set_dataset_units(&hits.index, "id")?;
        set_dataset_units(&hits.energy_kev, "keV")?;
        set_dataset_units(&hits.time_ns, "ns")?;
        set_dataset_units(&hits.rho_mm, "mm")?;
        set_dataset_units(&hits.phi_rad, "rad")?;
        set_dataset_units(&hits.z_mm, "mm")?;

        let decays = if options.include_decays {
            let group = entry.create_group("decays")?;
            let decays = DecayDatasets {
                event_id: create_extendable_dataset::<u64>(
                    &group,
                    "event_id",
                    options.chunk_events,
                    options.compression,
                    options.shuffle,
                )?,
                decay_time_ns: create_extendable_dataset::<f64>(
                    &group,
                    "decay_time_ns",
                    options.chunk_events,
                    options.compression,
                    options.shuffle,
                )?,
                positron_range_mm: create_extendable_dataset::<f64>(
                    &group,
                    "positron_range_mm",
                    options.chunk_events,
                    options.compression,
                    options.shuffle,
                )?,
                len: 0,
            };
            set_dataset_units(&decays.decay_time_ns, "ns")?;
            set_dataset_units(&decays.positron_range_mm, "mm")?;
            Some(decays)
        } else {
            None
        };

        Ok(Self {
            file,
            hits,
            decays,
        })
    }

    fn append(&mut self, readout: &EventReadout) -> Result<()> {
        let count = readout.hits.len();
        let start = self.hits.len;
        if count > 0 {
            let event_id = vec![readout.event_id; count];
            let index: Vec<u64> = readout.hits.iter().map(|h| h.index as u64).collect();
            append_slice(&self.hits.event_id, start, &event_id)?;
            append_slice(&self.hits.index, start, &index)?;

            for (level, ds) in self.hits.id.iter().enumerate() {
                let values: Vec<i64> = readout
                    .hits
                    .iter()
                    .map(|h| {
                        h.id.and_then(|id| id.parts().get(level).copied())
                            .map_or(-1, i64::from)
                    })
                    .collect();
                append_slice(ds, start, &values)?;
            }

            let column = |f: fn(&petring_core::CrystalHit) -> f64| -> Vec<f64> {
                readout.hits.iter().map(f).collect()
            };
            append_slice(&self.hits.energy_kev, start, &column(|h| h.energy_kev))?;
            append_slice(&self.hits.time_ns, start, &column(|h| h.time_ns))?;
            append_slice(&self.hits.rho_mm, start, &column(|h| h.position.rho))?;
            append_slice(&self.hits.phi_rad, start, &column(|h| h.position.phi))?;
            append_slice(&self.hits.z_mm, start, &column(|h| h.position.z))?;
            self.hits.len += count;
        }

        if let Some(decays) = &mut self.decays {
            let at = decays.len;
            append_slice(&decays.event_id, at, &[readout.decay.event_id])?;
            append_slice(
                &decays.decay_time_ns,
                at,
                &[readout.decay.decay_time_ns.unwrap_or(f64::NAN)],
            )?;
            append_slice(
                &decays.positron_range_mm,
                at,
                &[readout.decay.positron_range_mm.unwrap_or(f64::NAN)],
            )?;
            decays.len += 1;
        }
        Ok(())
    }
}

impl EventSink for Hdf5CrystalHitSink {
    fn write_event(&mut self, readout: &EventReadout) -> Result<()> {
        self.append(readout)
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// Reads `/entry/crystal_hits` back into columns.
///
/// # Errors
/// Returns an error if the file or datasets cannot be read.
pub fn read_crystal_hits_hdf5<P: AsRef<Path>>(path: P) -> Result<CrystalHitColumns> {
    let file = File::open(path)?;
    let group = file.group("entry/crystal_hits")?;

    let mut id_columns = Vec::new();
    for level in Level::CANONICAL {
        if let Ok(ds) = group.dataset(&format!("{}_id", level.name())) {
            id_columns.push(ds.read_raw::<i64>()?);
        }
    }
    if id_columns.is_empty() {
        let index: Vec<u64> = read_dataset_vec(&group, "index")?;
        id_columns.push(
            index
                .into_iter()
                .map(|i| i64::try_from(i).unwrap_or(i64::MAX))
                .collect(),
        );
    }

    Ok(CrystalHitColumns {
        event_id: read_dataset_vec(&group, "event_id")?,
        id_columns,
        energy_kev: read_dataset_vec(&group, "energy_kev")?,
        time_ns: read_dataset_vec(&group, "time_ns")?,
        rho_mm: read_dataset_vec(&group, "rho_mm")?,
        phi_rad: read_dataset_vec(&group, "phi_rad")?,
        z_mm: read_dataset_vec(&group, "z_mm")?,
    })
}

/// Reads a string attribute from the file root.
///
/// # Errors
/// Returns an error if the attribute is missing.
pub fn read_file_attr<P: AsRef<Path>>(path: P, name: &str) -> Result<String> {
    let file = File::open(path)?;
    let value: VarLenUnicode = file.attr(name)?.read_scalar()?;
    Ok(value.to_string())
}

fn create_extendable_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    chunk_events: usize,
    compression: Option<u8>,
    shuffle: bool,
) -> Result<Dataset> {
    let mut builder = group
        .new_dataset::<T>()
        .shape((0..,))
        .chunk((chunk_events.max(1),));

    if let Some(level) = compression {
        builder = builder.deflate(level);
    }

    if shuffle {
        builder = builder.shuffle();
    }

    Ok(builder.create(name)?)
}

fn append_slice<T: H5Type>(dataset: &Dataset, offset: usize, data: &[T]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let new_len = offset + data.len();
    dataset.resize((new_len,))?;
    let view = ArrayView1::from(data);
    dataset.write_slice(view, s![offset..new_len])?;
    Ok(())
}

fn read_dataset_vec<T: H5Type>(group: &Group, name: &str) -> Result<Vec<T>> {
    let dataset = group.dataset(name)?;
    Ok(dataset.read_raw::<T>()?)
}

fn set_dataset_units(dataset: &Dataset, units: &str) -> Result<()> {
    let value = to_var_len_unicode(units)?;
    dataset
        .new_attr::<VarLenUnicode>()
        .create("units")?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}
