use approx::assert_relative_eq;
use petring_geometry::{DetectorFamilyConfig, Granularity, SlotTable};
use petring_io::{
    read_crystal_hits_text, CrystalHitWriter, DecayLogWriter, OutputFormat, OutputSchema,
    StepLogReader,
};
use petring_readout::replay_events;
use std::io::Write;
use std::sync::Arc;
use tempfile::{tempdir, NamedTempFile};

// Two F-18 decays; the second deposits twice in one crystal at 10 and 30 ns
// after the decay with weights 1 and 3.
const STEP_LOG: &str = "\
# recorded callbacks
T 0 0 0 0 0 F18
T 1 500 0 0 0 O18
T 1 500 0 0 0 e+
T 4 500.2 3 4 0 gamma
S 0 0.2 502 410 0 -155
E 0
T 0 0 0 0 0 F18
T 1 1000 0 0 0 e+
S 1 0.1 1010 409 21 -155
S 1 0.3 1030 409 21 -155
E 1
";

fn step_log() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(STEP_LOG.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_step_log_to_text_hits() {
    let log = step_log();
    let events = StepLogReader::open(log.path()).unwrap().read_events().unwrap();
    assert_eq!(events.len(), 2);

    let config = DetectorFamilyConfig::siemens_quadra().with_rings(1);
    let table = Arc::new(SlotTable::build(&config, Granularity::Crystal).unwrap());
    let summary = replay_events(&table, Some(4), &events, 1);
    assert_eq!(summary.readouts.len(), 2);

    let dir = tempdir().unwrap();
    let hits_path = dir.path().join("hits.txt");
    let decay_path = dir.path().join("decays.csv");
    let mut hits = CrystalHitWriter::create(
        &hits_path,
        OutputFormat::from_path(&hits_path),
        OutputSchema::hierarchical_for(&table),
    )
    .unwrap();
    let mut decays = DecayLogWriter::create(&decay_path, OutputFormat::from_path(&decay_path))
        .unwrap();
    for readout in &summary.readouts {
        hits.write_hits(&readout.hits).unwrap();
        decays.write_record(&readout.decay).unwrap();
    }
    hits.flush().unwrap();
    decays.flush().unwrap();

    let cols = read_crystal_hits_text(&hits_path).unwrap();
    assert_eq!(cols.len(), 2);
    assert_eq!(cols.event_id, vec![0, 1]);
    assert_eq!(cols.id_columns.len(), 4);
    assert_relative_eq!(cols.energy_kev[0], 200.0, epsilon = 1e-9);
    assert_relative_eq!(cols.time_ns[0], 2.0, epsilon = 1e-9);
    assert_relative_eq!(cols.energy_kev[1], 400.0, epsilon = 1e-9);
    // (1 * 10 + 3 * 30) / 4
    assert_relative_eq!(cols.time_ns[1], 25.0, epsilon = 1e-9);
    assert_relative_eq!(cols.z_mm[1], -155.0, epsilon = 1e-9);

    let decay_log = std::fs::read_to_string(&decay_path).unwrap();
    let lines: Vec<&str> = decay_log.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "0,500,0,0,0,3,4,0,5");
    assert!(lines[2].starts_with("1,1000,0,0,0,nan"));
}

#[test]
fn test_binary_output_size() {
    let log = step_log();
    let events = StepLogReader::open(log.path()).unwrap().read_events().unwrap();
    let config = DetectorFamilyConfig::siemens_quadra().with_rings(1);
    let table = Arc::new(SlotTable::build(&config, Granularity::Crystal).unwrap());
    let summary = replay_events(&table, Some(4), &events, 8);

    let dir = tempdir().unwrap();
    let path = dir.path().join("hits.bin");
    let mut writer =
        CrystalHitWriter::create(&path, OutputFormat::from_path(&path), OutputSchema::FlatIndex)
            .unwrap();
    for readout in &summary.readouts {
        writer.write_hits(&readout.hits).unwrap();
    }
    writer.flush().unwrap();

    // Two records of 8 + 8 + 5 * 8 bytes
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 112);
}
