//! Event sinks and the mutex-guarded sink shared by readout workers.

use crate::writer::{CrystalHitWriter, DecayLogWriter};
use crate::{Error, Result};
use log::debug;
use petring_geometry::SlotTable;
use petring_readout::{ActivityState, EventReadout, ReadoutWorker, RecordedEvent, WorkerStats};
use rayon::prelude::*;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Destination for finished events.
pub trait EventSink: Send {
    /// Writes one finished event.
    ///
    /// # Errors
    /// Returns an error if the destination cannot be written.
    fn write_event(&mut self, readout: &EventReadout) -> Result<()>;

    /// Flushes buffered output.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    fn flush(&mut self) -> Result<()>;
}

impl<W: Write + Send> EventSink for CrystalHitWriter<W> {
    fn write_event(&mut self, readout: &EventReadout) -> Result<()> {
        self.write_hits(&readout.hits)
    }

    fn flush(&mut self) -> Result<()> {
        CrystalHitWriter::flush(self)
    }
}

impl<W: Write + Send> EventSink for DecayLogWriter<W> {
    fn write_event(&mut self, readout: &EventReadout) -> Result<()> {
        self.write_record(&readout.decay)
    }

    fn flush(&mut self) -> Result<()> {
        DecayLogWriter::flush(self)
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn write_event(&mut self, readout: &EventReadout) -> Result<()> {
        (**self).write_event(readout)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn write_event(&mut self, readout: &EventReadout) -> Result<()> {
        self.0.write_event(readout)?;
        self.1.write_event(readout)
    }

    fn flush(&mut self) -> Result<()> {
        self.0.flush()?;
        self.1.flush()
    }
}

/// A sink shared between workers. Each event is written whole while the
/// lock is held, so records of different events never interleave.
pub struct SharedSink<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: EventSink> SharedSink<S> {
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Writes one event under the lock.
    ///
    /// # Errors
    /// Returns `SinkPoisoned` if another worker panicked while writing, or
    /// the sink's own error.
    pub fn write_event(&self, readout: &EventReadout) -> Result<()> {
        let mut sink = self.inner.lock().map_err(|_| Error::SinkPoisoned)?;
        sink.write_event(readout)
    }

    /// Flushes the sink.
    ///
    /// # Errors
    /// Returns `SinkPoisoned` or the sink's own error.
    pub fn flush(&self) -> Result<()> {
        let mut sink = self.inner.lock().map_err(|_| Error::SinkPoisoned)?;
        sink.flush()
    }

    /// Returns the sink if this is the last handle.
    ///
    /// # Errors
    /// Returns `SinkPoisoned` if the lock was poisoned.
    pub fn into_inner(self) -> Result<Option<S>> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().map(Some).map_err(|_| Error::SinkPoisoned),
            Err(_) => Ok(None),
        }
    }
}

/// Replays events on a rayon pool, each worker writing its events to the
/// shared sink as they finish.
///
/// Events within one chunk of `events_per_worker` keep their order;
/// chunks may reach the sink in any order.
///
/// # Errors
/// Returns the first sink error.
pub fn stream_events<S: EventSink>(
    table: &Arc<SlotTable>,
    lineage_id: Option<i32>,
    events: &[RecordedEvent],
    events_per_worker: usize,
    sink: &SharedSink<S>,
) -> Result<(ActivityState, WorkerStats)> {
    let per_worker: Vec<(ActivityState, WorkerStats)> = events
        .par_chunks(events_per_worker.max(1))
        .map(|events| {
            let mut worker = ReadoutWorker::new(Arc::clone(table), lineage_id);
            for event in events {
                let readout = worker.replay(event);
                sink.write_event(&readout)?;
            }
            Ok(worker.finish())
        })
        .collect::<Result<_>>()?;

    debug!("streamed {} events from {} workers", events.len(), per_worker.len());

    let mut activity = ActivityState::new();
    let mut stats = WorkerStats::default();
    for (worker_activity, worker_stats) in per_worker {
        activity.merge(&worker_activity);
        stats = stats.combine(worker_stats);
    }
    sink.flush()?;
    Ok((activity, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{OutputFormat, OutputSchema};
    use approx::assert_relative_eq;
    use petring_core::{Cylindrical, StepHit};
    use petring_geometry::{DetectorFamilyConfig, Granularity};
    use petring_readout::EngineEvent;
    use std::collections::HashSet;

    /// Collects event ids in arrival order.
    #[derive(Default)]
    struct Recorder {
        events: Vec<u64>,
        flushed: bool,
    }

    impl EventSink for Recorder {
        fn write_event(&mut self, readout: &EventReadout) -> Result<()> {
            self.events.push(readout.event_id);
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            self.flushed = true;
            Ok(())
        }
    }

    fn events(n: u64) -> Vec<RecordedEvent> {
        (0..n)
            .map(|event_id| RecordedEvent {
                event_id,
                callbacks: vec![EngineEvent::Step(StepHit::new(
                    0,
                    0.5,
                    1.0,
                    Cylindrical::new(410.0, 0.0, 0.0),
                ))],
            })
            .collect()
    }

    fn table() -> Arc<SlotTable> {
        let config = DetectorFamilyConfig::siemens_quadra().with_rings(1);
        Arc::new(SlotTable::build(&config, Granularity::Block).unwrap())
    }

    #[test]
    fn test_stream_events_writes_every_event() {
        let sink = SharedSink::new(Recorder::default());
        let (activity, stats) = stream_events(&table(), None, &events(25), 4, &sink).unwrap();

        assert_eq!(stats.events, 25);
        assert_relative_eq!(activity.cumulative(0), 12.5);

        let recorder = sink.into_inner().unwrap().unwrap();
        assert!(recorder.flushed);
        let mut ids = recorder.events;
        ids.sort_unstable();
        assert_eq!(ids, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn test_stream_to_writer_pair() {
        let hits = CrystalHitWriter::new(Vec::new(), OutputFormat::Csv, OutputSchema::FlatIndex);
        let decay = DecayLogWriter::new(Vec::new(), OutputFormat::Text).unwrap();
        let sink = SharedSink::new((hits, decay));
        stream_events(&table(), Some(4), &events(3), 1, &sink).unwrap();

        let (hits, _decay) = sink.into_inner().unwrap().unwrap();
        let text = String::from_utf8(hits.into_inner().unwrap()).unwrap();
        // header plus one record per event
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_event_rows_stay_contiguous() {
        // Five struck blocks per event, one event per worker
        let events: Vec<RecordedEvent> = (0..200)
            .map(|event_id| RecordedEvent {
                event_id,
                callbacks: (0..5)
                    .map(|index| {
                        EngineEvent::Step(StepHit::new(
                            index,
                            0.1,
                            1.0,
                            Cylindrical::new(410.0, 0.0, 0.0),
                        ))
                    })
                    .collect(),
            })
            .collect();
        let hits = CrystalHitWriter::new(Vec::new(), OutputFormat::Csv, OutputSchema::FlatIndex);
        let sink = SharedSink::new(hits);
        let (_, stats) = stream_events(&table(), None, &events, 1, &sink).unwrap();
        assert_eq!(stats.hits_emitted, 1000);

        let hits = sink.into_inner().unwrap().unwrap();
        let text = String::from_utf8(hits.into_inner().unwrap()).unwrap();
        let rows: Vec<(u64, usize)> = text
            .lines()
            .skip(1)
            .map(|line| {
                let mut fields = line.split(',');
                let event = fields.next().unwrap().parse().unwrap();
                let index = fields.next().unwrap().parse().unwrap();
                (event, index)
            })
            .collect();
        assert_eq!(rows.len(), 1000);

        let mut closed = HashSet::new();
        for run in rows.chunk_by(|a, b| a.0 == b.0) {
            let event = run[0].0;
            assert!(closed.insert(event), "rows of event {event} are split");
            let indices: Vec<usize> = run.iter().map(|&(_, index)| index).collect();
            assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        }
        assert_eq!(closed.len(), 200);
    }

    #[test]
    fn test_into_inner_with_other_handle() {
        let sink = SharedSink::new(Recorder::default());
        let other = sink.clone();
        assert!(sink.into_inner().unwrap().is_none());
        assert!(other.into_inner().unwrap().is_some());
    }
}
