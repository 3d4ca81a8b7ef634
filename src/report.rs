//! Process-wide session report.
//!
//! Accumulates catches and timeout timestamps across every reconnect attempt
//! and renders a summary once on shutdown. Never persisted.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::Instant;

use crate::session::StopCause;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug)]
pub struct SessionReport {
    started_at: DateTime<Local>,
    /// Monotonic start, for the elapsed time.
    started: Instant,
    ended_at: Option<DateTime<Local>>,
    elapsed: Duration,
    total_catches: u64,
    timeouts: Vec<DateTime<Local>>,
    stop_cause: Option<StopCause>,
}

impl SessionReport {
    pub fn start() -> Self {
        Self {
            started_at: Local::now(),
            started: Instant::now(),
            ended_at: None,
            elapsed: Duration::ZERO,
            total_catches: 0,
            timeouts: Vec::new(),
            stop_cause: None,
        }
    }

    pub fn record_catch(&mut self) {
        self.total_catches += 1;
    }

    pub fn record_timeout(&mut self) {
        self.timeouts.push(Local::now());
    }

    /// Freeze the end time. Later calls keep the first result.
    pub fn finish(&mut self, cause: StopCause) {
        if self.ended_at.is_some() {
            return;
        }
        self.ended_at = Some(Local::now());
        self.elapsed = self.started.elapsed();
        self.stop_cause = Some(cause);
    }

    pub fn total_catches(&self) -> u64 {
        self.total_catches
    }

    /// Timeout timestamps in the order they were recorded.
    pub fn timeouts(&self) -> &[DateTime<Local>] {
        &self.timeouts
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// `None` when no whole second has elapsed.
pub fn catches_per_minute(catches: u64, elapsed_secs: u64) -> Option<f64> {
    (elapsed_secs > 0).then(|| catches as f64 * 60.0 / elapsed_secs as f64)
}

/// `None` when nothing was caught.
pub fn seconds_per_catch(catches: u64, elapsed_secs: u64) -> Option<f64> {
    (catches > 0).then(|| elapsed_secs as f64 / catches as f64)
}

/// `H:MM:SS`; hours are not wrapped.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cause = match self.stop_cause {
            Some(StopCause::Interrupted) => "interrupted",
            Some(StopCause::WearCeiling) => "wear ceiling reached",
            None => "running",
        };
        let secs = self.elapsed.as_secs();

        writeln!(f, "==== Session report ({cause}) ====")?;
        writeln!(f, "Started:        {}", self.started_at.format(TIME_FORMAT))?;
        if let Some(ended_at) = self.ended_at {
            writeln!(f, "Ended:          {}", ended_at.format(TIME_FORMAT))?;
        }
        writeln!(f, "Elapsed:        {}", format_elapsed(self.elapsed))?;
        writeln!(f, "Catches:        {}", self.total_catches)?;
        match catches_per_minute(self.total_catches, secs) {
            Some(rate) => writeln!(f, "Catches/minute: {rate:.2}")?,
            None => writeln!(f, "Catches/minute: undefined")?,
        }
        if let Some(per) = seconds_per_catch(self.total_catches, secs) {
            writeln!(f, "Seconds/catch:  {per:.2}")?;
        }
        if !self.timeouts.is_empty() {
            writeln!(f, "Timeouts ({}):", self.timeouts.len())?;
            for at in &self.timeouts {
                writeln!(f, "  {}", at.format(TIME_FORMAT))?;
            }
        }
        Ok(())
    }
}
