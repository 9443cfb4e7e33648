//! The module worker loop.
//!
//! One worker per configured module: read the source, render the text,
//! publish it into the module's slot, then sleep until the source reports a
//! change or cancellation arrives. Renders within one worker are strictly
//! ordered; a worker never overlaps with itself.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::error;
use tokio_util::sync::CancellationToken;

use crate::{
    error::Error,
    sources::{ModuleSource, WaitOutcome},
    status_line::StatusLine,
    template,
};

/// Drives one module until cancellation or a fatal source error.
///
/// Cancellation is also checked at loop-top, so a worker spawned after
/// shutdown began terminates without ever touching its source.
pub async fn run_worker(
    slot_index: usize,
    mut source: Box<dyn ModuleSource>,
    status_line: Arc<StatusLine>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let snapshot = source
            .current()
            .await
            .context("failed to read data source")?;

        // A failed render abandons this attempt only; the slot keeps its
        // last published value.
        let attempt = match snapshot {
            Some(snapshot) => match template::render(&snapshot.format, &snapshot.tokens) {
                Ok(text) => Some(Some(text)),
                Err(e) => {
                    error!("render failed: {e}");
                    None
                }
            },
            None => Some(None),
        };

        if let Some(text) = attempt {
            if let Err(e) = status_line.publish(slot_index, text) {
                match e {
                    Error::Allocation(_) => error!("recompute failed: {e}"),
                    other => return Err(other).context("failed to publish status text"),
                }
            }
        }

        match source.wait_for_change(&cancel).await? {
            WaitOutcome::Changed => {}
            WaitOutcome::Cancelled => return Ok(()),
        }
    }
}
