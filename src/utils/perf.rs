//! Request timing
//!
//! Play requests pass through several slow stages (search, download,
//! stream start, thumbnail). `Stopwatch` records when each one finished so
//! the handler can log a single summary line.

use std::time::{Duration, Instant};

/// A simple stopwatch for measuring elapsed time
#[derive(Debug)]
pub struct Stopwatch {
    start: Instant,
    last: Instant,
    splits: Vec<(&'static str, Duration)>,
}

impl Stopwatch {
    /// Start a new stopwatch
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            splits: Vec::new(),
        }
    }

    /// Record the time spent since the previous split
    pub fn split(&mut self, label: &'static str) {
        let now = Instant::now();
        self.splits.push((label, now - self.last));
        self.last = now;
    }

    /// Get the elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get all recorded splits
    pub fn splits(&self) -> &[(&'static str, Duration)] {
        &self.splits
    }

    /// `search: 120ms | download: 2300ms | total: 2450ms`
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = self
            .splits
            .iter()
            .map(|(label, duration)| format!("{}: {}ms", label, duration.as_millis()))
            .collect();
        parts.push(format!("total: {}ms", self.elapsed().as_millis()));
        parts.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwatch() {
        let mut sw = Stopwatch::start();
        std::thread::sleep(Duration::from_millis(10));
        sw.split("first");
        std::thread::sleep(Duration::from_millis(10));
        sw.split("second");

        assert!(sw.elapsed() >= Duration::from_millis(20));
        assert_eq!(sw.splits().len(), 2);
        assert!(sw.splits()[1].1 >= Duration::from_millis(10));
    }

    #[test]
    fn test_summary() {
        let mut sw = Stopwatch::start();
        sw.split("search");
        let summary = sw.summary();
        assert!(summary.starts_with("search: "));
        assert!(summary.contains("| total: "));
    }
}
