//! Background sampler for process memory and CPU gauges

use crate::MetricsCollector;
use common::constants::METRICS_UPDATE_INTERVAL_MS;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::debug;

/// Sample /proc gauges once a second until shutdown flips
pub async fn run_sampler(collector: Arc<MetricsCollector>, mut shutdown: watch::Receiver<bool>) {
    let mut cpu = CpuSampler::new();
    let mut interval =
        tokio::time::interval(Duration::from_millis(METRICS_UPDATE_INTERVAL_MS));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(mb) = read_memory_mb() {
                    collector.set_memory_mb(mb);
                }
                if let Some(percent) = cpu.sample() {
                    collector.set_cpu_percent(percent);
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("metrics sampler stopped");
}

/// Resident set size in MB from /proc/self/statm; absent off Linux
pub fn read_memory_mb() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let rss_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    let page_size = 4_096u64;
    Some(rss_pages * page_size / (1_024 * 1_024))
}

/// CPU usage from /proc/self/stat tick deltas
struct CpuSampler {
    last_ticks: Option<u64>,
    last_at: Instant,
}

impl CpuSampler {
    fn new() -> Self {
        Self {
            last_ticks: None,
            last_at: Instant::now(),
        }
    }

    /// Percent of one core used since the previous sample
    fn sample(&mut self) -> Option<f64> {
        let ticks = read_cpu_ticks()?;
        let now = Instant::now();

        let result = self.last_ticks.map(|last| {
            let tick_hz = 100.0; // USER_HZ on Linux
            let used_secs = ticks.saturating_sub(last) as f64 / tick_hz;
            let wall_secs = now.duration_since(self.last_at).as_secs_f64();
            if wall_secs > 0.0 {
                (used_secs / wall_secs * 100.0).min(100.0)
            } else {
                0.0
            }
        });

        self.last_ticks = Some(ticks);
        self.last_at = now;
        result
    }
}

/// utime + stime from /proc/self/stat
fn read_cpu_ticks() -> Option<u64> {
    let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
    // Skip past the parenthesized command name; utime and stime are the
    // 12th and 13th fields after it.
    let rest = &stat[stat.rfind(')')? + 2..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_readable_on_linux() {
        if std::path::Path::new("/proc/self/statm").exists() {
            assert!(read_memory_mb().is_some());
        }
    }

    #[test]
    fn cpu_needs_two_samples() {
        if std::path::Path::new("/proc/self/stat").exists() {
            let mut sampler = CpuSampler::new();
            assert!(sampler.sample().is_none());
            assert!(sampler.sample().is_some());
        }
    }
}
