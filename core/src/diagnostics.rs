// Operator-visible diagnostics
//
// Misuse and transport faults never propagate into the caller's control loop; they
// are reported here instead.

use std::sync::Mutex;
use tracing::{error, warn};

pub trait DiagnosticSink: Send + Sync {
    fn report_error(&self, message: &str);
    fn report_warning(&self, message: &str);
}

/// Default sink: forwards to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report_error(&self, message: &str) {
        error!(target: "shuffleboard", "{}", message);
    }

    fn report_warning(&self, message: &str) {
        warn!(target: "shuffleboard", "{}", message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Error(String),
    Warning(String),
}

/// Sink that keeps every report in memory
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    reports: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|d| match d {
                Diagnostic::Error(m) => Some(m.clone()),
                Diagnostic::Warning(_) => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|d| match d {
                Diagnostic::Warning(m) => Some(m.clone()),
                Diagnostic::Error(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        // A poisoned report list is still a valid list
        self.reports.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl DiagnosticSink for CollectingDiagnostics {
    fn report_error(&self, message: &str) {
        self.lock().push(Diagnostic::Error(message.to_string()));
    }

    fn report_warning(&self, message: &str) {
        self.lock().push(Diagnostic::Warning(message.to_string()));
    }
}
