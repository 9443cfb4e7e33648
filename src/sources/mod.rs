//! Status line data sources.
//!
//! Each module owns one [`ModuleSource`]: a sensor it reads and a change
//! notification it waits on. The worker loop drives the source; the source
//! never touches the status buffer itself.

pub mod brightness;
pub mod clock;
pub mod keyboard;
pub mod volume;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::ModuleCfg;

/// One render input: the format string for this iteration plus the module's
/// token table.
///
/// Most sources return their configured format unchanged and vary only the
/// tokens; the clock returns the formatted time itself with an empty table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub format: String,
    pub tokens: Vec<(&'static str, String)>,
}

/// Outcome of a change wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Changed,
    Cancelled,
}

/// A module's sensor boundary.
///
/// Construction performs the sensor-specific setup (see [`build_source`]);
/// dropping the source tears it down.
#[async_trait]
pub trait ModuleSource: Send {
    /// Current sensor values, or `None` when the underlying hardware is
    /// absent and the module's slot should be emptied.
    async fn current(&mut self) -> Result<Option<Snapshot>>;

    /// Suspends until the sensor reports a change or cancellation arrives.
    /// Never returns on a timer unless the module is interval-driven by
    /// design; transient wakeups are absorbed here, not surfaced.
    async fn wait_for_change(&mut self, cancel: &CancellationToken) -> Result<WaitOutcome>;
}

/// Builds the data source for one module config entry.
///
/// The variant set is closed: unknown kinds are rejected at deserialization
/// time, so this match is exhaustive by construction.
pub fn build_source(cfg: &ModuleCfg) -> Result<Box<dyn ModuleSource>> {
    match cfg {
        ModuleCfg::Clock { format, interval } => {
            Ok(Box::new(clock::ClockSource::new(format.clone(), *interval)))
        }
        ModuleCfg::Brightness { format, card } => Ok(Box::new(
            brightness::BrightnessSource::new(format.clone(), card)?,
        )),
        ModuleCfg::Volume {
            format,
            device,
            control,
        } => Ok(Box::new(volume::VolumeSource::new(
            format.clone(),
            device.clone(),
            control.clone(),
        ))),
        ModuleCfg::Keyboard { format } => {
            Ok(Box::new(keyboard::KeyboardSource::connect(format.clone())?))
        }
    }
}
