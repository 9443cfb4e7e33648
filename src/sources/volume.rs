//! ALSA mixer volume module.
//!
//! Reads the playback volume and switch state of a mixer control through
//! `amixer`, publishing the `%volume%` and `%state%` tokens. Change wakeups
//! come from a long-running `alsactl monitor` child; when that tool is not
//! available the module degrades to interval polling.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::{Instant, interval_at};
use tokio_stream::{StreamExt, wrappers::IntervalStream};
use tokio_util::sync::CancellationToken;

use super::{ModuleSource, Snapshot, WaitOutcome};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct VolumeSource {
    format: String,
    device: String,
    control: String,
    monitor: Monitor,
}

enum Monitor {
    /// The monitor child is spawned lazily on the first wait.
    Unstarted,
    Running {
        // Held for kill-on-drop; lines owns the pipe.
        _child: Child,
        lines: Lines<BufReader<ChildStdout>>,
    },
    Polling(IntervalStream),
}

impl VolumeSource {
    pub fn new(format: String, device: String, control: String) -> Self {
        Self {
            format,
            device,
            control,
            monitor: Monitor::Unstarted,
        }
    }

    fn start_monitor(&self) -> Result<Monitor> {
        let mut child = Command::new("alsactl")
            .args(["monitor", &self.device])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("failed to spawn alsactl monitor")?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("alsactl monitor has no stdout"))?;

        debug!("alsactl monitor started for device '{}'", self.device);

        Ok(Monitor::Running {
            _child: child,
            lines: BufReader::new(stdout).lines(),
        })
    }

    fn fall_back_to_polling(&mut self) {
        warn!(
            "mixer events unavailable for device '{}', polling every {POLL_INTERVAL:?}",
            self.device
        );

        let period = interval_at(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
        self.monitor = Monitor::Polling(IntervalStream::new(period));
    }
}

/// Extracts `(volume_percent, switched_on)` from `amixer sget` output.
///
/// The first channel line is used; stereo controls report per-channel lines
/// with the same percentage.
fn parse_mixer_state(output: &str) -> Result<(u8, bool)> {
    for line in output.lines() {
        let Some(start) = line.find('[') else {
            continue;
        };
        let Some(end) = line[start..].find("%]") else {
            continue;
        };

        let volume = line[start + 1..start + end]
            .parse()
            .with_context(|| format!("bad volume field in amixer output: {line:?}"))?;

        // Controls without a playback switch count as switched on.
        let switched_on = !line.contains("[off]");

        return Ok((volume, switched_on));
    }

    bail!("no volume information in amixer output")
}

#[async_trait]
impl ModuleSource for VolumeSource {
    async fn current(&mut self) -> Result<Option<Snapshot>> {
        let output = Command::new("amixer")
            .args(["-D", &self.device, "sget", &self.control])
            .output()
            .await
            .context("failed to run amixer")?;

        if !output.status.success() {
            bail!(
                "amixer failed for control '{}' on device '{}': {}",
                self.control,
                self.device,
                output.status
            );
        }

        let (volume, switched_on) = parse_mixer_state(&String::from_utf8_lossy(&output.stdout))?;

        Ok(Some(Snapshot {
            format: self.format.clone(),
            tokens: vec![
                ("%volume%", volume.to_string()),
                ("%state%", if switched_on { "m" } else { "M" }.to_string()),
            ],
        }))
    }

    async fn wait_for_change(&mut self, cancel: &CancellationToken) -> Result<WaitOutcome> {
        loop {
            if matches!(self.monitor, Monitor::Unstarted) {
                match self.start_monitor() {
                    Ok(monitor) => self.monitor = monitor,
                    Err(e) => {
                        debug!("{e:#}");
                        self.fall_back_to_polling();
                    }
                }
            }

            // `None` means the event stream is gone and the source should
            // degrade to polling before waiting again.
            let outcome = match &mut self.monitor {
                Monitor::Unstarted => None,
                Monitor::Running { lines, .. } => {
                    tokio::select! {
                        () = cancel.cancelled() => Some(WaitOutcome::Cancelled),
                        line = lines.next_line() => match line {
                            Ok(Some(_)) => Some(WaitOutcome::Changed),
                            Ok(None) => {
                                warn!("alsactl monitor exited");
                                None
                            }
                            Err(e) => {
                                warn!("alsactl monitor read failed: {e}");
                                None
                            }
                        },
                    }
                }
                Monitor::Polling(ticks) => {
                    tokio::select! {
                        () = cancel.cancelled() => Some(WaitOutcome::Cancelled),
                        _ = ticks.next() => Some(WaitOutcome::Changed),
                    }
                }
            };

            match outcome {
                Some(outcome) => return Ok(outcome),
                None => self.fall_back_to_polling(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const AMIXER_OUTPUT: &str = "\
Simple mixer control 'Master',0
  Capabilities: pvolume pswitch pswitch-joined
  Playback channels: Front Left - Front Right
  Limits: Playback 0 - 65536
  Mono:
  Front Left: Playback 42338 [65%] [on]
  Front Right: Playback 42338 [65%] [on]
";

    #[test]
    fn parses_volume_and_switch_state() {
        let (volume, switched_on) = parse_mixer_state(AMIXER_OUTPUT).unwrap();
        assert_eq!(volume, 65);
        assert!(switched_on);
    }

    #[test]
    fn parses_muted_control() {
        let output = "  Mono: Playback 0 [37%] [-40.00dB] [off]\n";
        let (volume, switched_on) = parse_mixer_state(output).unwrap();
        assert_eq!(volume, 37);
        assert!(!switched_on);
    }

    #[test]
    fn control_without_switch_counts_as_on() {
        let output = "  Mono: Capture 12 [8%]\n";
        let (_, switched_on) = parse_mixer_state(output).unwrap();
        assert!(switched_on);
    }

    #[test]
    fn output_without_volume_is_an_error() {
        assert!(parse_mixer_state("Simple mixer control 'Master',0\n").is_err());
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_wait() {
        let mut source = VolumeSource::new(
            "VOL %volume%%state%".to_string(),
            "default".to_string(),
            "Master".to_string(),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = source.wait_for_change(&cancel).await.unwrap();
        assert_eq!(outcome, WaitOutcome::Cancelled);
    }
}
