use loopback_orchestrator::OrchestratorError;
use std::io;
use thiserror::Error;

/// Errors that end a run before it completes. Per-pattern hardware errors
/// never surface here; they become `ERROR` records.
#[derive(Debug, Error)]
pub enum LoopbackError {
    #[error(transparent)]
    Setup(#[from] OrchestratorError),
    #[error("failed to write report: {0}")]
    Output(#[from] io::Error),
}

/// Checklist printed after a fatal error.
pub const SETUP_HINTS: [&str; 4] = [
    "The digital I/O backend for the device is installed and configured",
    "The device is properly connected",
    "The device name is correct",
    "Hardware loopback connections are in place",
];
