//! petring-io: Step-log input and crystal hit output for petring.
//!
//! Step logs are read through memory-mapped files via memmap2 and parsed
//! in parallel. Crystal hits go to text, CSV or little-endian binary files,
//! or to HDF5 with the `hdf5` feature.
//!

mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod reader;
mod sink;
mod stir;
mod writer;

pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hdf5::{read_crystal_hits_hdf5, CrystalHitWriteOptions, Hdf5CrystalHitSink};
pub use reader::{
    parse_crystal_hits_text, parse_step_log, read_crystal_hits_text, CrystalHitColumns,
    MappedFileReader, StepLogReader,
};
pub use sink::{stream_events, EventSink, SharedSink};
pub use stir::{stir_header, write_stir_header};
pub use writer::{
    write_slot_table_csv, CrystalHitWriter, DecayLogWriter, OutputFormat, OutputSchema,
};
