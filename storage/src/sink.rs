//! Event sink seam and the simple sink variants

use crate::error::StorageError;
use common::EventRecord;
use tracing::warn;

/// Append target for simulated events. The producer holds one `&mut dyn
/// EventSink` for the duration of a session and aborts on the first append
/// failure.
pub trait EventSink {
    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the underlying medium rejects the
    /// write; the caller treats this as fatal for the session.
    fn append(&mut self, rec: &EventRecord) -> Result<(), StorageError>;

    /// Push any buffered state down to the medium.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when flushing fails.
    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Finalize the sink. Implementations must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when finalization fails.
    fn close(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Growable in-memory sink, mainly for tests and the stepping UI path.
#[derive(Debug, Default)]
pub struct InMemorySink {
    events: Vec<EventRecord>,
}

impl InMemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All appended records, in order.
    #[must_use]
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Number of appended records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing was appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop all records.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for InMemorySink {
    fn append(&mut self, rec: &EventRecord) -> Result<(), StorageError> {
        self.events.push(*rec);
        Ok(())
    }
}

/// Best-effort fan-out over non-owning sink references. A failing
/// downstream sink is logged and skipped; the remaining sinks still see the
/// event. Downstream sinks must outlive the multiplexer.
#[derive(Default)]
pub struct MultiplexSink<'a> {
    sinks: Vec<&'a mut dyn EventSink>,
}

impl<'a> MultiplexSink<'a> {
    /// Create an empty multiplexer.
    #[must_use]
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a downstream sink.
    pub fn add_sink(&mut self, sink: &'a mut dyn EventSink) {
        self.sinks.push(sink);
    }

    /// Number of downstream sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl EventSink for MultiplexSink<'_> {
    fn append(&mut self, rec: &EventRecord) -> Result<(), StorageError> {
        for sink in &mut self.sinks {
            if let Err(e) = sink.append(rec) {
                warn!(error = %e, "multiplex sink append failed; continuing");
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        for sink in &mut self.sinks {
            if let Err(e) = sink.flush() {
                warn!(error = %e, "multiplex sink flush failed; continuing");
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        for sink in &mut self.sinks {
            if let Err(e) = sink.close() {
                warn!(error = %e, "multiplex sink close failed; continuing");
            }
        }
        Ok(())
    }
}
