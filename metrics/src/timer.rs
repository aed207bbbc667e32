//! Drop-guard latency timer

use crate::MetricsCollector;
use std::time::Instant;

/// Records the elapsed interval for a named operation when dropped
///
/// ```
/// # use metrics::MetricsCollector;
/// let collector = MetricsCollector::new();
/// {
///     let _timer = collector.timer("book_update");
///     // work measured here
/// }
/// assert_eq!(collector.operation_stats("book_update").unwrap().count, 1);
/// ```
pub struct ScopedTimer<'a> {
    collector: &'a MetricsCollector,
    operation: &'static str,
    start: Instant,
}

impl<'a> ScopedTimer<'a> {
    /// Start timing `operation`
    pub fn new(collector: &'a MetricsCollector, operation: &'static str) -> Self {
        Self {
            collector,
            operation,
            start: Instant::now(),
        }
    }

    /// Microseconds elapsed so far
    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        self.collector
            .record_processing_latency(self.operation, self.elapsed_micros());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_timers_record_independently() {
        let collector = MetricsCollector::new();
        {
            let _outer = collector.timer("outer");
            let _inner = collector.timer("inner");
        }
        assert_eq!(collector.operation_stats("outer").unwrap().count, 1);
        assert_eq!(collector.operation_stats("inner").unwrap().count, 1);
        assert!(collector.operation_stats("other").is_none());
    }
}
