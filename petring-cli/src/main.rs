//! petring: PET ring detector geometry and readout replay.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use petring_core::Isotope;
use petring_geometry::{
    parse_detector_mode, DetectorFamilyConfig, DetectorGeometryData, Granularity, SlotTable,
};
use petring_io::{
    stream_events, write_slot_table_csv, write_stir_header, CrystalHitWriter, DecayLogWriter,
    EventSink, OutputFormat, OutputSchema, SharedSink, StepLogReader,
};
use petring_readout::{replay_events, ActivityState};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    PetringIo(#[from] petring_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] petring_core::Error),

    #[error("Geometry error: {0}")]
    Geometry(#[from] petring_geometry::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// PET ring detector geometry and readout replay.
#[derive(Parser)]
#[command(name = "petring")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Detector selection shared by all subcommands.
#[derive(Args)]
struct DetectorArgs {
    /// Detector mode: family followed by granularity, e.g. SiemensMiniBlock
    #[arg(short, long, default_value = "SiemensCrystal")]
    mode: String,

    /// JSON configuration overriding the family preset
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Axial length (mm); sets the ring count
    #[arg(long)]
    length_mm: Option<f64>,

    /// Ring count
    #[arg(long, conflicts_with = "length_mm")]
    rings: Option<usize>,

    /// Azimuthal offset of block 0 (degrees)
    #[arg(long)]
    phi_offset_deg: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a placement table and print its summary
    Geometry {
        #[command(flatten)]
        detector: DetectorArgs,

        /// Replica count reported by the transport engine
        #[arg(long)]
        count: Option<i64>,

        /// Write the placement table as CSV
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Write the STIR header for a detector
    Header {
        #[command(flatten)]
        detector: DetectorArgs,

        /// Output header file
        #[arg(short, long, default_value = "petring.hroot")]
        output: PathBuf,
    },

    /// Replay a step log through the readout
    Replay {
        /// Input step log
        input: PathBuf,

        /// Output hit file; format from extension (csv, bin/dat, h5, else text)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        detector: DetectorArgs,

        /// Source isotope; selects the annihilation lineage
        #[arg(long, default_value = "F18")]
        isotope: String,

        /// Write per-event decay summaries (text or csv)
        #[arg(long)]
        decay_log: Option<PathBuf>,

        /// Write the flat replica index instead of hierarchical IDs
        #[arg(long)]
        flat_index: bool,

        /// Write cumulative per-crystal activity as CSV
        #[arg(long)]
        activity: Option<PathBuf>,

        /// Consecutive events handled by one worker
        #[arg(long, default_value = "1000")]
        events_per_worker: usize,

        /// Worker threads (default: all cores)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Write events as workers finish them instead of in input order
        #[arg(long)]
        stream: bool,
    },
}

fn load_detector(args: &DetectorArgs) -> Result<(DetectorFamilyConfig, Granularity)> {
    let (family, granularity) = parse_detector_mode(&args.mode)?;

    let mut config = match &args.config {
        Some(path) => {
            let config = DetectorFamilyConfig::from_file(path)?;
            if config.family != family {
                warn!(
                    "config file describes {} but mode {} names {}; using the file",
                    config.family, args.mode, family
                );
            }
            config
        }
        None => family.preset(),
    };

    if let Some(length) = args.length_mm {
        config = config.with_axial_length(length)?;
    }
    if let Some(rings) = args.rings {
        config = config.with_rings(rings);
    }
    if let Some(offset) = args.phi_offset_deg {
        config = config.with_phi_offset_deg(offset);
    }
    config.validate()?;
    Ok((config, granularity))
}

fn hit_sink(
    output: &Path,
    table: &SlotTable,
    flat_index: bool,
    decay_log: Option<&Path>,
) -> Result<Box<dyn EventSink>> {
    let schema = if flat_index {
        OutputSchema::FlatIndex
    } else {
        OutputSchema::hierarchical_for(table)
    };

    let extension = output
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);
    let hits: Box<dyn EventSink> = match extension.as_deref() {
        #[cfg(feature = "hdf5")]
        Some("h5" | "hdf5") => {
            let mut options = petring_io::CrystalHitWriteOptions::for_table(table);
            options.schema = schema;
            options.include_decays = decay_log.is_none();
            Box::new(petring_io::Hdf5CrystalHitSink::create(output, &options)?)
        }
        #[cfg(not(feature = "hdf5"))]
        Some("h5" | "hdf5") => {
            warn!("built without HDF5 support; writing text to {}", output.display());
            Box::new(CrystalHitWriter::create(output, OutputFormat::Text, schema)?)
        }
        _ => Box::new(CrystalHitWriter::create(
            output,
            OutputFormat::from_path(output),
            schema,
        )?),
    };

    match decay_log {
        Some(path) => {
            let decays = DecayLogWriter::create(path, OutputFormat::from_path(path))?;
            Ok(Box::new((hits, decays)))
        }
        None => Ok(hits),
    }
}

fn write_activity_csv(path: &Path, activity: &ActivityState) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "index,cumulative_mev,activity_fraction")?;
    for (index, energy) in activity.sorted_entries() {
        let fraction = activity.activity_fraction(index)?;
        writeln!(writer, "{},{},{}", index, energy, fraction)?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Geometry {
            detector,
            count,
            dump,
        } => {
            let (config, granularity) = load_detector(&detector)?;
            let table = match count {
                Some(count) => SlotTable::build_with_count(&config, granularity, count)?,
                None => SlotTable::build(&config, granularity)?,
            };
            let extent = table.extent();

            println!("Detector: {}{}", config.family.mode_prefix(), granularity);
            println!("Material: {}", config.material);
            println!(
                "Rings: {} ({:.2} mm axial)",
                config.rings,
                config.axial_length_mm()
            );
            println!("Blocks per ring: {}", config.blocks_per_ring);
            println!("Crystals: {}", config.crystal_count());
            println!("Slots: {} ({} per ring)", table.len(), table.layout().slots_per_ring());
            println!(
                "Slot half-size: {:.3} x {:.3} x {:.3} mm (radial, trans, axial)",
                extent.half_radial_mm, extent.half_trans_mm, extent.half_axial_mm
            );

            if let Some(path) = dump {
                write_slot_table_csv(&path, &table)?;
                println!("Placement table written to {}", path.display());
            }
        }

        Commands::Header { detector, output } => {
            let (config, _) = load_detector(&detector)?;
            write_stir_header(&output, &DetectorGeometryData::from(&config))?;
            println!("STIR header written to {}", output.display());
        }

        Commands::Replay {
            input,
            output,
            detector,
            isotope,
            decay_log,
            flat_index,
            activity,
            events_per_worker,
            threads,
            stream,
        } => {
            if let Some(threads) = threads {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build_global()?;
            }

            let (config, granularity) = load_detector(&detector)?;
            let isotope: Isotope = isotope.parse()?;
            let lineage_id = isotope.annihilation_lineage_id();
            if lineage_id.is_none() {
                warn!("no annihilation lineage known for {isotope}; positron ranges disabled");
            }
            let table = Arc::new(SlotTable::build(&config, granularity)?);

            let start = Instant::now();
            let reader = StepLogReader::open(&input)?;
            let events = reader.read_events()?;
            info!(
                "read {} events from {} ({} bytes)",
                events.len(),
                input.display(),
                reader.file_size()
            );

            let mut sink = hit_sink(&output, &table, flat_index, decay_log.as_deref())?;
            let (merged, stats) = if stream {
                let shared = SharedSink::new(sink);
                stream_events(&table, lineage_id, &events, events_per_worker, &shared)?
            } else {
                let summary = replay_events(&table, lineage_id, &events, events_per_worker);
                for readout in &summary.readouts {
                    sink.write_event(readout)?;
                }
                sink.flush()?;
                (summary.activity, summary.stats)
            };

            println!(
                "Replayed {} events in {:.2}s",
                stats.events,
                start.elapsed().as_secs_f64()
            );
            println!("Steps: {}", stats.steps);
            println!("Crystal records: {}", stats.hits_emitted);
            if stats.unresolved_indices > 0 {
                println!("Indices outside the table: {}", stats.unresolved_indices);
            }
            if stats.missed_annihilations > 0 {
                println!("Decays without annihilation: {}", stats.missed_annihilations);
            }
            println!(
                "Struck crystals: {} (max cumulative {:.3} MeV)",
                merged.len(),
                merged.max_energy()
            );

            if let Some(path) = activity {
                if merged.has_activity() {
                    write_activity_csv(&path, &merged)?;
                    println!("Activity written to {}", path.display());
                } else {
                    warn!("no energy deposited; activity file not written");
                }
            }
        }
    }

    Ok(())
}
