use super::ProgressEvent;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::info;

/// Turns progress events into status lines, at most one per interval.
#[derive(Debug)]
pub struct ProgressReporter {
    started: Instant,
    interval: Duration,
    last_emit: Instant,
    latest: Option<ProgressEvent>,
}

/// A computed status line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    pub total: u64,
    pub expected: u64,
    pub elapsed: Duration,
    /// Inserted documents per second since the start.
    pub rate: f64,
    pub percent: f64,
    pub eta: Option<Duration>,
}

impl ProgressReporter {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    pub fn starting_at(started: Instant, interval: Duration) -> Self {
        Self {
            started,
            interval,
            last_emit: started,
            latest: None,
        }
    }

    /// Record an event and return a line if the interval has passed since
    /// the previous one.
    pub fn observe(&mut self, event: ProgressEvent, now: Instant) -> Option<ProgressLine> {
        self.latest = Some(event);
        if now.saturating_duration_since(self.last_emit) < self.interval {
            return None;
        }
        self.last_emit = now;
        Some(self.line(event, now))
    }

    /// Line for the most recent event regardless of throttling.
    pub fn summary(&self, now: Instant) -> Option<ProgressLine> {
        self.latest.map(|event| self.line(event, now))
    }

    fn line(&self, event: ProgressEvent, now: Instant) -> ProgressLine {
        let elapsed = now.saturating_duration_since(self.started);
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            event.total as f64 / secs
        } else {
            0.0
        };
        let percent = if event.expected > 0 {
            event.total as f64 * 100.0 / event.expected as f64
        } else {
            0.0
        };
        let remaining = event.expected.saturating_sub(event.total);
        let eta = if rate > 0.0 {
            Some(Duration::from_secs_f64(remaining as f64 / rate))
        } else {
            None
        };

        ProgressLine {
            total: event.total,
            expected: event.expected,
            elapsed,
            rate,
            percent,
            eta,
        }
    }
}

impl fmt::Display for ProgressLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.1}%) | {:.0} docs/s | elapsed {}s",
            self.total,
            self.expected,
            self.percent,
            self.rate,
            self.elapsed.as_secs()
        )?;
        match self.eta {
            Some(eta) => write!(f, " | eta {}s", eta.as_secs()),
            None => write!(f, " | eta unknown"),
        }
    }
}

/// Consume progress events until the uploader hangs up.
///
/// Returns the final summary line, which is always logged.
pub async fn run_reporter(
    mut input: mpsc::Receiver<ProgressEvent>,
    mut reporter: ProgressReporter,
) -> Option<ProgressLine> {
    while let Some(event) = input.recv().await {
        if let Some(line) = reporter.observe(event, Instant::now()) {
            info!(
                inserted = line.total,
                rate = line.rate as u64,
                "Progress: {}",
                line
            );
        }
    }

    let summary = reporter.summary(Instant::now());
    if let Some(line) = &summary {
        info!("Finished: {}", line);
    }
    summary
}
