//! Wall-clock module.
//!
//! Publishes the local time rendered with the configured strftime format.
//! Wakeups are aligned to wall-clock multiples of the interval, so a 60s
//! clock ticks on the minute rather than 60s after startup.

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{Local, Utc};
use tokio_util::sync::CancellationToken;

use super::{ModuleSource, Snapshot, WaitOutcome};

pub struct ClockSource {
    format: String,
    interval_ms: i64,
}

impl ClockSource {
    pub fn new(format: String, interval_seconds: u16) -> Self {
        Self {
            format,
            interval_ms: i64::from(interval_seconds) * 1000,
        }
    }

    /// Time left until the next wall-clock multiple of the interval.
    fn until_next_tick(&self) -> Duration {
        let now_ms = Utc::now().timestamp_millis();
        let remaining_ms = self.interval_ms - now_ms.rem_euclid(self.interval_ms);

        Duration::from_millis(remaining_ms as u64)
    }
}

#[async_trait]
impl ModuleSource for ClockSource {
    async fn current(&mut self) -> Result<Option<Snapshot>> {
        let mut rendered = String::new();

        write!(rendered, "{}", Local::now().format(&self.format))
            .map_err(|_| anyhow!("invalid time format string: {:?}", self.format))?;

        Ok(Some(Snapshot {
            format: rendered,
            tokens: Vec::new(),
        }))
    }

    async fn wait_for_change(&mut self, cancel: &CancellationToken) -> Result<WaitOutcome> {
        tokio::select! {
            () = cancel.cancelled() => Ok(WaitOutcome::Cancelled),
            () = tokio::time::sleep(self.until_next_tick()) => Ok(WaitOutcome::Changed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn renders_the_configured_format() {
        let mut source = ClockSource::new("static text".to_string(), 1);

        let snapshot = source.current().await.unwrap().unwrap();
        assert_eq!(snapshot.format, "static text");
        assert!(snapshot.tokens.is_empty());
    }

    #[tokio::test]
    async fn renders_time_fields() {
        let mut source = ClockSource::new("%Y".to_string(), 1);

        let snapshot = source.current().await.unwrap().unwrap();
        let year: i32 = snapshot.format.parse().unwrap();
        assert!(year >= 2024);
    }

    #[test]
    fn tick_alignment_never_exceeds_the_interval() {
        let source = ClockSource::new("%H:%M".to_string(), 5);

        let remaining = source.until_next_tick();
        assert!(remaining <= Duration::from_secs(5));
        assert!(remaining > Duration::ZERO);
    }

    #[tokio::test]
    async fn cancellation_wins_over_the_tick() {
        let mut source = ClockSource::new("%H:%M".to_string(), 3600);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = source.wait_for_change(&cancel).await.unwrap();
        assert_eq!(outcome, WaitOutcome::Cancelled);
    }
}
