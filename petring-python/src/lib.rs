//! petring-python: PyO3 Python bindings for petring.
#![allow(
    clippy::doc_markdown,
    clippy::needless_pass_by_value,
    clippy::uninlined_format_args,
    clippy::elidable_lifetime_names
)]
//!
//! Placement tables, replay results and hit files are handed to Python as
//! dicts of numpy arrays.

use numpy::PyArray1;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use petring_core::{Cartesian, Isotope};
use petring_geometry::{
    parse_detector_mode, DetectorFamilyConfig, DetectorGeometryData, Granularity, Level, SlotTable,
};
use petring_io::{CrystalHitColumns, StepLogReader};
use petring_readout::replay_events;
use std::sync::Arc;

fn io_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyIOError::new_err(format!("{context}: {err}"))
}

fn value_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(format!("{context}: {err}"))
}

/// Python wrapper for a detector family configuration and granularity.
#[pyclass(name = "DetectorConfig")]
#[derive(Clone)]
pub struct PyDetectorConfig {
    inner: DetectorFamilyConfig,
    granularity: Granularity,
}

#[pymethods]
impl PyDetectorConfig {
    #[new]
    #[pyo3(signature = (mode="SiemensCrystal", length_mm=None, rings=None))]
    fn new(mode: &str, length_mm: Option<f64>, rings: Option<usize>) -> PyResult<Self> {
        let (family, granularity) =
            parse_detector_mode(mode).map_err(|e| value_error("DetectorConfig", e))?;
        let mut inner = family.preset();
        if let Some(length) = length_mm {
            inner = inner
                .with_axial_length(length)
                .map_err(|e| value_error("DetectorConfig.length_mm", e))?;
        }
        if let Some(rings) = rings {
            inner = inner.with_rings(rings);
        }
        inner
            .validate()
            .map_err(|e| value_error("DetectorConfig.validate", e))?;
        Ok(Self { inner, granularity })
    }

    #[staticmethod]
    #[pyo3(signature = (path, granularity="Crystal"))]
    fn from_file(path: &str, granularity: &str) -> PyResult<Self> {
        let granularity = granularity
            .parse()
            .map_err(|e| value_error("DetectorConfig.from_file", e))?;
        DetectorFamilyConfig::from_file(path)
            .map(|inner| Self { inner, granularity })
            .map_err(|e| io_error(&format!("DetectorConfig.from_file({path})"), e))
    }

    #[staticmethod]
    #[pyo3(signature = (json, granularity="Crystal"))]
    fn from_json(json: &str, granularity: &str) -> PyResult<Self> {
        let granularity = granularity
            .parse()
            .map_err(|e| value_error("DetectorConfig.from_json", e))?;
        DetectorFamilyConfig::from_json(json)
            .map(|inner| Self { inner, granularity })
            .map_err(|e| value_error("DetectorConfig.from_json", e))
    }

    #[getter]
    fn mode(&self) -> String {
        format!("{}{}", self.inner.family.mode_prefix(), self.granularity)
    }

    #[getter]
    fn rings(&self) -> usize {
        self.inner.rings
    }

    #[getter]
    fn blocks_per_ring(&self) -> usize {
        self.inner.blocks_per_ring
    }

    #[getter]
    fn axial_length_mm(&self) -> f64 {
        self.inner.axial_length_mm()
    }

    #[getter]
    fn crystal_count(&self) -> usize {
        self.inner.crystal_count()
    }

    #[getter]
    fn material(&self) -> String {
        self.inner.material.to_string()
    }

    fn __repr__(&self) -> String {
        format!(
            "DetectorConfig(mode={}, rings={}, material={})",
            self.mode(),
            self.inner.rings,
            self.inner.material
        )
    }
}

fn resolve_config(config: Option<PyDetectorConfig>) -> PyResult<PyDetectorConfig> {
    match config {
        Some(config) => Ok(config),
        None => PyDetectorConfig::new("SiemensCrystal", None, None),
    }
}

fn build_table(config: &PyDetectorConfig) -> PyResult<SlotTable> {
    SlotTable::build(&config.inner, config.granularity)
        .map_err(|e| value_error("build_geometry", e))
}

/// Build the placement table and return it as numpy arrays.
#[pyfunction]
#[pyo3(signature = (config=None))]
fn build_geometry<'py>(
    py: Python<'py>,
    config: Option<PyDetectorConfig>,
) -> PyResult<Bound<'py, PyDict>> {
    let config = resolve_config(config)?;
    let table = build_table(&config)?;
    let order = table.layout().digit_order();
    let levels: Vec<Level> = Level::CANONICAL
        .into_iter()
        .filter(|level| order.contains(*level))
        .collect();

    let n = table.len();
    let mut index = Vec::with_capacity(n);
    let mut rho = Vec::with_capacity(n);
    let mut phi = Vec::with_capacity(n);
    let mut z = Vec::with_capacity(n);
    let mut rotation_z = Vec::with_capacity(n);
    let mut ids = vec![Vec::with_capacity(n); levels.len()];
    for slot in &table {
        index.push(slot.index as u64);
        rho.push(slot.position.rho);
        phi.push(slot.position.phi);
        z.push(slot.position.z);
        rotation_z.push(slot.rotation_z);
        for (column, &part) in ids.iter_mut().zip(slot.id.parts()) {
            column.push(part);
        }
    }

    let dict = PyDict::new(py);
    dict.set_item("index", PyArray1::from_vec(py, index))?;
    for (level, column) in levels.iter().zip(ids) {
        dict.set_item(format!("{}_id", level.name()), PyArray1::from_vec(py, column))?;
    }
    dict.set_item("rho_mm", PyArray1::from_vec(py, rho))?;
    dict.set_item("phi_rad", PyArray1::from_vec(py, phi))?;
    dict.set_item("z_mm", PyArray1::from_vec(py, z))?;
    dict.set_item("rotation_z_rad", PyArray1::from_vec(py, rotation_z))?;
    Ok(dict)
}

/// Write the STIR header for a detector.
#[pyfunction]
#[pyo3(signature = (path, config=None))]
fn write_stir_header(path: &str, config: Option<PyDetectorConfig>) -> PyResult<()> {
    let config = resolve_config(config)?;
    petring_io::write_stir_header(path, &DetectorGeometryData::from(&config.inner))
        .map_err(|e| io_error(&format!("write_stir_header({path})"), e))
}

fn columns_dict<'py>(py: Python<'py>, columns: CrystalHitColumns) -> PyResult<Bound<'py, PyDict>> {
    let CrystalHitColumns {
        event_id,
        id_columns,
        energy_kev,
        time_ns,
        rho_mm,
        phi_rad,
        z_mm,
    } = columns;

    let dict = PyDict::new(py);
    dict.set_item("event_id", PyArray1::from_vec(py, event_id))?;
    for (i, column) in id_columns.into_iter().enumerate() {
        dict.set_item(format!("id_{i}"), PyArray1::from_vec(py, column))?;
    }
    dict.set_item("energy_kev", PyArray1::from_vec(py, energy_kev))?;
    dict.set_item("time_ns", PyArray1::from_vec(py, time_ns))?;
    dict.set_item("rho_mm", PyArray1::from_vec(py, rho_mm))?;
    dict.set_item("phi_rad", PyArray1::from_vec(py, phi_rad))?;
    dict.set_item("z_mm", PyArray1::from_vec(py, z_mm))?;
    Ok(dict)
}

/// Read a text or CSV crystal hit file into numpy arrays.
#[pyfunction]
fn read_crystal_hits<'py>(py: Python<'py>, path: &str) -> PyResult<Bound<'py, PyDict>> {
    let columns = petring_io::read_crystal_hits_text(path)
        .map_err(|e| io_error(&format!("read_crystal_hits({path})"), e))?;
    columns_dict(py, columns)
}

/// Replay a step log and return the crystal records as numpy arrays.
#[pyfunction]
#[pyo3(signature = (path, config=None, isotope="F18", events_per_worker=1000))]
fn replay_step_log<'py>(
    py: Python<'py>,
    path: &str,
    config: Option<PyDetectorConfig>,
    isotope: &str,
    events_per_worker: usize,
) -> PyResult<Bound<'py, PyDict>> {
    let config = resolve_config(config)?;
    let isotope: Isotope = isotope
        .parse()
        .map_err(|e| value_error("replay_step_log", e))?;
    let table = Arc::new(build_table(&config)?);
    let events = StepLogReader::open(path)
        .and_then(|reader| reader.read_events())
        .map_err(|e| io_error(&format!("replay_step_log({path})"), e))?;

    let summary = py.allow_threads(|| {
        replay_events(
            &table,
            isotope.annihilation_lineage_id(),
            &events,
            events_per_worker,
        )
    });

    let mut columns = CrystalHitColumns {
        id_columns: vec![Vec::new()],
        ..CrystalHitColumns::default()
    };
    let mut decay_time = Vec::with_capacity(summary.readouts.len());
    let mut positron_range = Vec::with_capacity(summary.readouts.len());
    for readout in &summary.readouts {
        decay_time.push(readout.decay.decay_time_ns.unwrap_or(f64::NAN));
        positron_range.push(readout.decay.positron_range_mm.unwrap_or(f64::NAN));
        for hit in &readout.hits {
            columns.event_id.push(hit.event_id);
            columns.id_columns[0].push(i64::try_from(hit.index).unwrap_or(i64::MAX));
            columns.energy_kev.push(hit.energy_kev);
            columns.time_ns.push(hit.time_ns);
            columns.rho_mm.push(hit.position.rho);
            columns.phi_rad.push(hit.position.phi);
            columns.z_mm.push(hit.position.z);
        }
    }

    let dict = columns_dict(py, columns)?;
    dict.set_item("decay_time_ns", PyArray1::from_vec(py, decay_time))?;
    dict.set_item("positron_range_mm", PyArray1::from_vec(py, positron_range))?;
    Ok(dict)
}

/// Euclidean distance between a decay vertex and an annihilation vertex (mm).
#[pyfunction]
fn positron_range(decay: (f64, f64, f64), annihilation: (f64, f64, f64)) -> f64 {
    Cartesian::new(decay.0, decay.1, decay.2)
        .distance_to(&Cartesian::new(annihilation.0, annihilation.1, annihilation.2))
}

#[pymodule]
fn petring(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyDetectorConfig>()?;
    m.add_function(wrap_pyfunction!(build_geometry, m)?)?;
    m.add_function(wrap_pyfunction!(write_stir_header, m)?)?;
    m.add_function(wrap_pyfunction!(read_crystal_hits, m)?)?;
    m.add_function(wrap_pyfunction!(replay_step_log, m)?)?;
    m.add_function(wrap_pyfunction!(positron_range, m)?)?;
    Ok(())
}
