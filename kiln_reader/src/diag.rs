//! Advisories: non-fatal findings reported during translation.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    /// Source entity the advisory is about, if any.
    pub entity: Option<u32>,
    pub message: String,
}

/// Receives advisories. The translator also logs each one with `tracing`.
pub trait DiagnosticSink {
    fn advise(&mut self, advisory: Advisory);
}

/// Keeps every advisory for later inspection.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub advisories: Vec<Advisory>,
}

impl DiagnosticSink for CollectingSink {
    fn advise(&mut self, advisory: Advisory) {
        self.advisories.push(advisory);
    }
}

/// Drops advisories; the translator's own `warn!` is the only trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn advise(&mut self, _advisory: Advisory) {}
}
