//! Backlight brightness module.
//!
//! Reads `brightness` and `max_brightness` from the card's sysfs node and
//! publishes the percentage through the `%value%` token. Changes are picked
//! up through inotify on the brightness file; if the node disappears the
//! module clears its slot instead of showing a stale value.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, warn};
use notify::{EventHandler, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{ModuleSource, Snapshot, WaitOutcome};

const BACKLIGHT_ROOT: &str = "/sys/class/backlight";

pub struct BrightnessSource {
    format: String,
    brightness_path: PathBuf,
    max_brightness_path: PathBuf,
    events: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    // Dropped with the source, which removes the watch.
    _watcher: RecommendedWatcher,
}

/// Forwards filesystem notifications into the async channel the source
/// waits on.
struct ForwardingHandler {
    sender: mpsc::UnboundedSender<notify::Result<notify::Event>>,
}

impl EventHandler for ForwardingHandler {
    fn handle_event(&mut self, event: notify::Result<notify::Event>) {
        // A full channel or a gone receiver both mean the worker stopped
        // listening; nothing to do from the watcher thread.
        let _ = self.sender.send(event);
    }
}

impl BrightnessSource {
    pub fn new(format: String, card: &str) -> Result<Self> {
        let card_dir = Path::new(BACKLIGHT_ROOT).join(card);
        let brightness_path = card_dir.join("brightness");
        let max_brightness_path = card_dir.join("max_brightness");

        if !brightness_path.is_file() || !max_brightness_path.is_file() {
            return Err(anyhow!(
                "backlight card '{card}' not found under {BACKLIGHT_ROOT}"
            ));
        }

        let (sender, events) = mpsc::unbounded_channel();
        let mut watcher = recommended_watcher(ForwardingHandler { sender })
            .context("failed to create backlight watcher")?;

        watcher
            .watch(&card_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", card_dir.display()))?;

        Ok(Self {
            format,
            brightness_path,
            max_brightness_path,
            events,
            _watcher: watcher,
        })
    }

    /// Current brightness as a 0-100 percentage, or `None` if the sysfs node
    /// is gone.
    fn read_percentage(&self) -> Result<Option<u8>> {
        let brightness = match read_sysfs_value(&self.brightness_path)? {
            Some(value) => value,
            None => return Ok(None),
        };
        let max_brightness = match read_sysfs_value(&self.max_brightness_path)? {
            Some(value) => value,
            None => return Ok(None),
        };

        if max_brightness == 0 {
            return Err(anyhow!(
                "max_brightness is zero for {}",
                self.max_brightness_path.display()
            ));
        }

        let percentage = (brightness as f64 / max_brightness as f64 * 100.0).round() as u8;

        Ok(Some(percentage.min(100)))
    }
}

fn read_sysfs_value(path: &Path) -> Result<Option<u64>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    content
        .trim()
        .parse()
        .with_context(|| format!("non-numeric value in {}", path.display()))
        .map(Some)
}

#[async_trait]
impl ModuleSource for BrightnessSource {
    async fn current(&mut self) -> Result<Option<Snapshot>> {
        let Some(percentage) = self.read_percentage()? else {
            debug!("backlight node gone, clearing slot");
            return Ok(None);
        };

        Ok(Some(Snapshot {
            format: self.format.clone(),
            tokens: vec![("%value%", percentage.to_string())],
        }))
    }

    async fn wait_for_change(&mut self, cancel: &CancellationToken) -> Result<WaitOutcome> {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(WaitOutcome::Cancelled),
                event = self.events.recv() => match event {
                    Some(Ok(_)) => return Ok(WaitOutcome::Changed),
                    Some(Err(e)) => {
                        // The watcher stays registered; a transient inotify
                        // error is not a reason to kill the module.
                        warn!("backlight watch error: {e}");
                    }
                    None => return Err(anyhow!("backlight watcher stopped unexpectedly")),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_card_is_a_construction_error() {
        let result = BrightnessSource::new("BL %value%".to_string(), "no-such-card-0");
        assert!(result.is_err());
    }

    #[test]
    fn sysfs_value_parses_trimmed_integers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brightness");
        std::fs::write(&path, "4095\n").unwrap();

        assert_eq!(read_sysfs_value(&path).unwrap(), Some(4095));
    }

    #[test]
    fn missing_sysfs_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone");

        assert_eq!(read_sysfs_value(&path).unwrap(), None);
    }

    #[test]
    fn garbage_sysfs_content_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brightness");
        std::fs::write(&path, "not-a-number").unwrap();

        assert!(read_sysfs_value(&path).is_err());
    }
}
