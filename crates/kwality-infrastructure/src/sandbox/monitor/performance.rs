//! Performance monitor.
//!
//! Folds 1 Hz resource samples into peak metrics and emits findings when a
//! configured threshold is exceeded.

use std::collections::BTreeMap;

use kwality_domain::entities::{Finding, Severity};
use kwality_domain::ports::ContainerStats;
use kwality_domain::value_objects::PerformanceThresholds;

/// Folds samples into peaks and threshold findings.
#[derive(Debug)]
pub struct PerformanceMonitor {
    thresholds: PerformanceThresholds,
    samples: u64,
    peak_rss_bytes: u64,
    max_cpu_percent: f64,
    max_io_ops_per_sec: u64,
    previous_io_total: Option<u64>,
}

impl PerformanceMonitor {
    /// Monitor with the given thresholds.
    #[must_use]
    pub fn new(thresholds: PerformanceThresholds) -> Self {
        Self {
            thresholds,
            samples: 0,
            peak_rss_bytes: 0,
            max_cpu_percent: 0.0,
            max_io_ops_per_sec: 0,
            previous_io_total: None,
        }
    }

    /// Fold one sample. Samples arrive at ≥ 1 Hz, so the delta between
    /// consecutive io counters approximates ops per second.
    pub fn observe(&mut self, stats: ContainerStats) {
        self.samples += 1;
        self.peak_rss_bytes = self.peak_rss_bytes.max(stats.rss_bytes);
        self.max_cpu_percent = self.max_cpu_percent.max(stats.cpu_percent);

        let io_total = stats.io_read_ops + stats.io_write_ops;
        if let Some(previous) = self.previous_io_total {
            self.max_io_ops_per_sec = self
                .max_io_ops_per_sec
                .max(io_total.saturating_sub(previous));
        }
        self.previous_io_total = Some(io_total);
    }

    /// Produce findings and metrics once the run is draining.
    pub fn finalize(
        self,
        build_secs: f64,
        run_secs: f64,
        exit_code: Option<i64>,
    ) -> (Vec<Finding>, BTreeMap<String, f64>) {
        let mut findings = Vec::new();
        let peak_rss_mb = self.peak_rss_bytes as f64 / (1024.0 * 1024.0);

        if peak_rss_mb > self.thresholds.max_rss_mb as f64 {
            findings.push(Finding::new(
                Severity::Medium,
                "performance.memory",
                format!(
                    "peak RSS {peak_rss_mb:.0} MB exceeds the {} MB threshold",
                    self.thresholds.max_rss_mb
                ),
            ));
        }
        if self.max_cpu_percent > self.thresholds.max_cpu_percent {
            findings.push(Finding::new(
                Severity::Medium,
                "performance.cpu",
                format!(
                    "CPU peaked at {:.0}% against a {:.0}% threshold",
                    self.max_cpu_percent, self.thresholds.max_cpu_percent
                ),
            ));
        }
        if self.max_io_ops_per_sec > self.thresholds.max_io_ops_per_sec {
            findings.push(Finding::new(
                Severity::Medium,
                "performance.io",
                format!(
                    "IO peaked at {} ops/s against a {} ops/s threshold",
                    self.max_io_ops_per_sec, self.thresholds.max_io_ops_per_sec
                ),
            ));
        }
        if build_secs > self.thresholds.max_build_secs as f64 {
            findings.push(Finding::new(
                Severity::Medium,
                "performance.build_time",
                format!(
                    "build took {build_secs:.0}s against a {}s threshold",
                    self.thresholds.max_build_secs
                ),
            ));
        }
        if run_secs > self.thresholds.max_run_secs as f64 {
            findings.push(Finding::new(
                Severity::Medium,
                "performance.run_time",
                format!(
                    "run took {run_secs:.0}s against a {}s threshold",
                    self.thresholds.max_run_secs
                ),
            ));
        }

        let mut metrics = BTreeMap::new();
        metrics.insert("samples".to_owned(), self.samples as f64);
        metrics.insert("peak_rss_mb".to_owned(), peak_rss_mb);
        metrics.insert("max_cpu_percent".to_owned(), self.max_cpu_percent);
        metrics.insert(
            "max_io_ops_per_sec".to_owned(),
            self.max_io_ops_per_sec as f64,
        );
        metrics.insert("build_secs".to_owned(), build_secs);
        metrics.insert("run_secs".to_owned(), run_secs);
        if let Some(code) = exit_code {
            metrics.insert("exit_code".to_owned(), code as f64);
        }
        (findings, metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(rss_mb: u64, cpu: f64, io_total: u64) -> ContainerStats {
        ContainerStats {
            rss_bytes: rss_mb * 1024 * 1024,
            cpu_percent: cpu,
            io_read_ops: io_total,
            io_write_ops: 0,
        }
    }

    #[test]
    fn quiet_run_has_no_findings() {
        let mut monitor = PerformanceMonitor::new(PerformanceThresholds::default());
        monitor.observe(sample(100, 20.0, 10));
        monitor.observe(sample(120, 25.0, 15));
        let (findings, metrics) = monitor.finalize(1.0, 2.0, Some(0));
        assert!(findings.is_empty());
        assert!((metrics["peak_rss_mb"] - 120.0).abs() < 0.1);
        assert!((metrics["exit_code"] - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rss_breach_fires_a_memory_finding() {
        let thresholds = PerformanceThresholds {
            max_rss_mb: 64,
            ..PerformanceThresholds::default()
        };
        let mut monitor = PerformanceMonitor::new(thresholds);
        monitor.observe(sample(200, 10.0, 0));
        let (findings, _) = monitor.finalize(0.0, 1.0, Some(0));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, "performance.memory");
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn io_rate_uses_sample_deltas() {
        let thresholds = PerformanceThresholds {
            max_io_ops_per_sec: 50,
            ..PerformanceThresholds::default()
        };
        let mut monitor = PerformanceMonitor::new(thresholds);
        monitor.observe(sample(10, 1.0, 0));
        monitor.observe(sample(10, 1.0, 500));
        let (findings, metrics) = monitor.finalize(0.0, 1.0, Some(0));
        assert!((metrics["max_io_ops_per_sec"] - 500.0).abs() < f64::EPSILON);
        assert!(findings.iter().any(|f| f.category == "performance.io"));
    }

    #[test]
    fn slow_build_and_run_fire_findings() {
        let thresholds = PerformanceThresholds {
            max_build_secs: 10,
            max_run_secs: 5,
            ..PerformanceThresholds::default()
        };
        let monitor = PerformanceMonitor::new(thresholds);
        let (findings, _) = monitor.finalize(60.0, 30.0, Some(0));
        let categories: Vec<&str> = findings.iter().map(|f| f.category.as_str()).collect();
        assert!(categories.contains(&"performance.build_time"));
        assert!(categories.contains(&"performance.run_time"));
    }
}
