//! Error taxonomy for the daemon.
//!
//! The variants map directly onto the failure domains of the engine:
//! configuration problems abort startup, resource problems kill a single
//! worker, allocation problems abort a single render or recompute, and
//! signal-setup problems abort startup before anything runs.

use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing module configuration. Fatal at startup, before
    /// any worker runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// A data source or sink operation failed at runtime. Fatal to the
    /// worker that hit it; siblings keep running.
    #[error("resource error: {0}")]
    Resource(String),

    /// Memory could not be obtained for a render or recompute. The attempt
    /// is abandoned; already-published state is untouched.
    #[error("allocation failure")]
    Allocation(#[from] TryReserveError),

    /// Interrupt handling could not be installed. Fatal at startup.
    #[error("failed to install signal handling: {0}")]
    SignalSetup(#[source] std::io::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }
}
