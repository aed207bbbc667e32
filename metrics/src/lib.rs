//! Engine metrics: counters, latency percentiles, exports
//!
//! A single [`MetricsCollector`] is owned by the engine context and shared by
//! reference; there is no global registry. Exports come in two fixed shapes:
//! Prometheus text exposition and a JSON snapshot with `performance`,
//! `business` and `system` sections.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod latency;
pub mod sampler;
pub mod timer;

pub use latency::{LatencyStats, LatencyTracker};
pub use sampler::run_sampler;
pub use timer::ScopedTimer;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// One executed (or simulated) trade against an opportunity
#[derive(Debug, Clone)]
struct TradeRecord {
    #[allow(dead_code)]
    opportunity_id: String,
    #[allow(dead_code)]
    expected_profit: f64,
    actual_profit: f64,
}

/// `performance` section of the JSON snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceSection {
    /// Average processing latency across operations, µs
    pub avg_processing_latency_us: u64,
    /// Average detection-pass latency, µs
    pub avg_detection_latency_us: u64,
    /// Messages processed since start
    pub messages_processed: u64,
    /// Opportunities detected since start
    pub opportunities_detected: u64,
}

/// `business` section of the JSON snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessSection {
    /// Cumulative realized PnL in USD
    pub total_pnl: f64,
    /// Trades recorded
    pub total_trades: u64,
    /// Fraction of trades with positive PnL
    pub win_rate: f64,
}

/// `system` section of the JSON snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemSection {
    /// Resident set size in MB
    pub memory_mb: u64,
    /// Process CPU usage percent
    pub cpu_percent: f64,
    /// Hours since collector creation
    pub uptime_hours: f64,
}

/// Full snapshot, serialized as the JSON export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Latency and throughput
    pub performance: PerformanceSection,
    /// PnL and win rate
    pub business: BusinessSection,
    /// Process health
    pub system: SystemSection,
}

/// Shared metrics sink for every engine component
pub struct MetricsCollector {
    start: Instant,
    messages_processed: AtomicU64,
    opportunities_detected: AtomicU64,
    opportunities_executed: AtomicU64,
    operation_latencies: Mutex<FxHashMap<String, LatencyTracker>>,
    detection_latencies: Mutex<LatencyTracker>,
    execution_latencies: Mutex<LatencyTracker>,
    trades: Mutex<Vec<TradeRecord>>,
    memory_mb: AtomicU64,
    cpu_centi_percent: AtomicU64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Fresh collector; uptime counts from here
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            messages_processed: AtomicU64::new(0),
            opportunities_detected: AtomicU64::new(0),
            opportunities_executed: AtomicU64::new(0),
            operation_latencies: Mutex::new(FxHashMap::default()),
            detection_latencies: Mutex::new(LatencyTracker::new()),
            execution_latencies: Mutex::new(LatencyTracker::new()),
            trades: Mutex::new(Vec::new()),
            memory_mb: AtomicU64::new(0),
            cpu_centi_percent: AtomicU64::new(0),
        }
    }

    /// Record a named operation's latency in microseconds
    pub fn record_processing_latency(&self, operation: &str, micros: u64) {
        self.operation_latencies
            .lock()
            .entry(operation.to_string())
            .or_default()
            .record(micros);
    }

    /// Record one detection pass's latency in microseconds
    pub fn record_detection_latency(&self, micros: u64) {
        self.detection_latencies.lock().record(micros);
    }

    /// Record one execution round-trip's latency in microseconds
    pub fn record_execution_latency(&self, micros: u64) {
        self.execution_latencies.lock().record(micros);
    }

    /// Count one processed message
    pub fn increment_messages_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count `n` processed messages at once
    pub fn add_messages_processed(&self, n: u64) {
        self.messages_processed.fetch_add(n, Ordering::Relaxed);
    }

    /// Count one detected opportunity
    pub fn increment_opportunities_detected(&self) {
        self.opportunities_detected.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one executed opportunity
    pub fn increment_opportunities_executed(&self) {
        self.opportunities_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed trade and its realized PnL
    pub fn record_trade(&self, opportunity_id: &str, expected_profit: f64, actual_profit: f64) {
        self.trades.lock().push(TradeRecord {
            opportunity_id: opportunity_id.to_string(),
            expected_profit,
            actual_profit,
        });
        self.increment_opportunities_executed();
    }

    /// Update the RSS gauge (from the sampler)
    pub fn set_memory_mb(&self, mb: u64) {
        self.memory_mb.store(mb, Ordering::Relaxed);
    }

    /// Update the CPU gauge (from the sampler)
    pub fn set_cpu_percent(&self, percent: f64) {
        self.cpu_centi_percent
            .store((percent.max(0.0) * 100.0) as u64, Ordering::Relaxed);
    }

    /// Latency statistics for one named operation, when any were recorded
    pub fn operation_stats(&self, operation: &str) -> Option<LatencyStats> {
        self.operation_latencies
            .lock()
            .get(operation)
            .map(LatencyTracker::stats)
    }

    /// Latency statistics for detection passes
    pub fn detection_stats(&self) -> LatencyStats {
        self.detection_latencies.lock().stats()
    }

    /// Start a drop-guard timer for a named operation
    pub fn timer<'a>(&'a self, operation: &'static str) -> ScopedTimer<'a> {
        ScopedTimer::new(self, operation)
    }

    /// Point-in-time snapshot of every section
    pub fn snapshot(&self) -> MetricsSnapshot {
        let avg_processing = {
            let ops = self.operation_latencies.lock();
            let (sum, count) = ops
                .values()
                .map(|t| t.stats())
                .fold((0u64, 0u64), |(s, c), st| {
                    (s + st.avg * st.count, c + st.count)
                });
            if count > 0 {
                sum / count
            } else {
                0
            }
        };

        let (total_pnl, total_trades, wins) = {
            let trades = self.trades.lock();
            let total_pnl: f64 = trades.iter().map(|t| t.actual_profit).sum();
            let wins = trades.iter().filter(|t| t.actual_profit > 0.0).count() as u64;
            (total_pnl, trades.len() as u64, wins)
        };
        let win_rate = if total_trades > 0 {
            wins as f64 / total_trades as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            performance: PerformanceSection {
                avg_processing_latency_us: avg_processing,
                avg_detection_latency_us: self.detection_latencies.lock().stats().avg,
                messages_processed: self.messages_processed.load(Ordering::Relaxed),
                opportunities_detected: self.opportunities_detected.load(Ordering::Relaxed),
            },
            business: BusinessSection {
                total_pnl,
                total_trades,
                win_rate,
            },
            system: SystemSection {
                memory_mb: self.memory_mb.load(Ordering::Relaxed),
                cpu_percent: self.cpu_centi_percent.load(Ordering::Relaxed) as f64 / 100.0,
                uptime_hours: self.start.elapsed().as_secs_f64() / 3600.0,
            },
        }
    }

    /// Prometheus text exposition of the fixed metric surface
    pub fn export_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::with_capacity(1_024);

        push_sample(
            &mut out,
            "arbitrage_processing_latency_us",
            "Processing latency in microseconds",
            "gauge",
            &snapshot.performance.avg_processing_latency_us.to_string(),
        );
        push_sample(
            &mut out,
            "arbitrage_detection_latency_us",
            "Detection latency in microseconds",
            "gauge",
            &snapshot.performance.avg_detection_latency_us.to_string(),
        );
        push_sample(
            &mut out,
            "arbitrage_messages_processed_total",
            "Total messages processed",
            "counter",
            &snapshot.performance.messages_processed.to_string(),
        );
        push_sample(
            &mut out,
            "arbitrage_opportunities_detected_total",
            "Total opportunities detected",
            "counter",
            &snapshot.performance.opportunities_detected.to_string(),
        );
        push_sample(
            &mut out,
            "arbitrage_total_pnl_usd",
            "Total P&L in USD",
            "gauge",
            &snapshot.business.total_pnl.to_string(),
        );
        push_sample(
            &mut out,
            "arbitrage_win_rate",
            "Win rate percentage",
            "gauge",
            &(snapshot.business.win_rate * 100.0).to_string(),
        );
        push_sample(
            &mut out,
            "arbitrage_memory_usage_mb",
            "Memory usage in MB",
            "gauge",
            &snapshot.system.memory_mb.to_string(),
        );
        push_sample(
            &mut out,
            "arbitrage_cpu_usage_percent",
            "CPU usage percentage",
            "gauge",
            &snapshot.system.cpu_percent.to_string(),
        );

        out
    }

    /// JSON export of the snapshot
    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Write the final JSON snapshot, called once on shutdown
    pub fn write_final_snapshot(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.export_json())?;
        info!(path = %path.display(), "final metrics written");
        Ok(())
    }
}

/// One HELP/TYPE/sample triple in text exposition format
fn push_sample(out: &mut String, name: &str, help: &str, kind: &str, value: &str) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} {kind}\n"));
    out.push_str(&format!("{name} {value}\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn counters_accumulate() {
        let collector = MetricsCollector::new();
        collector.increment_messages_processed();
        collector.add_messages_processed(4);
        collector.increment_opportunities_detected();

        let snap = collector.snapshot();
        assert_eq!(snap.performance.messages_processed, 5);
        assert_eq!(snap.performance.opportunities_detected, 1);
    }

    #[test]
    fn trades_drive_business_section() {
        let collector = MetricsCollector::new();
        collector.record_trade("SPOT_1", 30.0, 25.0);
        collector.record_trade("SPOT_2", 10.0, -5.0);
        collector.record_trade("FUNDING_3", 40.0, 41.0);

        let snap = collector.snapshot();
        assert_relative_eq!(snap.business.total_pnl, 61.0);
        assert_eq!(snap.business.total_trades, 3);
        assert_relative_eq!(snap.business.win_rate, 2.0 / 3.0);
    }

    #[test]
    fn prometheus_export_has_fixed_surface() {
        let collector = MetricsCollector::new();
        collector.record_detection_latency(120);
        collector.record_trade("SPOT_1", 30.0, 25.0);
        collector.set_memory_mb(256);
        collector.set_cpu_percent(12.5);

        let text = collector.export_prometheus();
        for name in [
            "arbitrage_processing_latency_us",
            "arbitrage_detection_latency_us",
            "arbitrage_messages_processed_total",
            "arbitrage_opportunities_detected_total",
            "arbitrage_total_pnl_usd",
            "arbitrage_win_rate",
            "arbitrage_memory_usage_mb",
            "arbitrage_cpu_usage_percent",
        ] {
            assert!(text.contains(&format!("# HELP {name} ")), "missing {name}");
            assert!(text.contains(&format!("# TYPE {name} ")), "missing {name}");
        }
        assert!(text.contains("arbitrage_detection_latency_us 120"));
        assert!(text.contains("arbitrage_win_rate 100"));
        assert!(text.contains("arbitrage_memory_usage_mb 256"));
    }

    #[test]
    fn json_export_has_three_sections() {
        let collector = MetricsCollector::new();
        let parsed: serde_json::Value = serde_json::from_str(&collector.export_json()).unwrap();
        assert!(parsed.get("performance").is_some());
        assert!(parsed.get("business").is_some());
        assert!(parsed.get("system").is_some());
    }

    #[test]
    fn final_snapshot_written_to_disk() {
        let collector = MetricsCollector::new();
        collector.increment_messages_processed();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics_final.json");
        collector.write_final_snapshot(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: MetricsSnapshot = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.performance.messages_processed, 1);
    }

    #[test]
    fn scoped_timer_records_on_drop() {
        let collector = MetricsCollector::new();
        {
            let _timer = collector.timer("ingest");
        }
        let stats = collector.operation_stats("ingest").unwrap();
        assert_eq!(stats.count, 1);
    }
}
