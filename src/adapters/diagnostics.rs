use crate::domain::model::DiagnosticEvent;
use crate::domain::ports::DiagnosticSink;
use std::sync::Mutex;

/// Writes each dropped row to the `tracing` subscriber at WARN level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        tracing::warn!(
            line = event.line_number,
            raw = %event.raw,
            cause = %event.cause,
            "⚠️ Dropping unparseable row"
        );
    }
}

/// Keeps dropped rows in memory so callers can inspect them after a run.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl DiagnosticSink for MemoryDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
