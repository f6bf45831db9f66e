/// Metrics for hoster resolution
///
/// Tracks success rates, error counts, and extraction times for each hoster

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HosterMetrics {
    pub hoster_name: String,
    pub total_resolutions: u64,
    pub successful_resolutions: u64,
    pub failed_resolutions: u64,
    /// Resolutions that succeeded but produced no stream.
    pub empty_resolutions: u64,
    pub streams_resolved: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub average_response_time_ms: f64,
    pub total_response_time_ms: u64,
    pub timeout_count: u64,
}

impl HosterMetrics {
    pub fn new(hoster_name: String) -> Self {
        Self {
            hoster_name,
            total_resolutions: 0,
            successful_resolutions: 0,
            failed_resolutions: 0,
            empty_resolutions: 0,
            streams_resolved: 0,
            last_success: None,
            last_failure: None,
            last_error: None,
            average_response_time_ms: 0.0,
            total_response_time_ms: 0,
            timeout_count: 0,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_resolutions == 0 {
            0.0
        } else {
            (self.successful_resolutions as f64 / self.total_resolutions as f64) * 100.0
        }
    }

    pub fn record_success(&mut self, response_time: Duration, streams: usize) {
        self.total_resolutions += 1;
        self.successful_resolutions += 1;
        self.streams_resolved += streams as u64;
        if streams == 0 {
            self.empty_resolutions += 1;
        }
        self.last_success = Some(Utc::now());

        let response_ms = response_time.as_millis() as u64;
        self.total_response_time_ms += response_ms;
        self.average_response_time_ms =
            self.total_response_time_ms as f64 / self.successful_resolutions as f64;
    }

    pub fn record_failure(&mut self, error: String) {
        self.total_resolutions += 1;
        self.failed_resolutions += 1;
        self.last_failure = Some(Utc::now());

        if error.to_lowercase().contains("timed out") || error.to_lowercase().contains("timeout") {
            self.timeout_count += 1;
        }
        self.last_error = Some(error);
    }
}

/// Shared tracker; clones record into the same table.
#[derive(Clone, Default)]
pub struct MetricsTracker {
    metrics: Arc<Mutex<HashMap<String, HosterMetrics>>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HosterMetrics>> {
        // A panic while holding the lock leaves counters usable.
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_success(&self, hoster_name: &str, response_time: Duration, streams: usize) {
        let mut metrics = self.lock();
        let hoster_metrics = metrics
            .entry(hoster_name.to_string())
            .or_insert_with(|| HosterMetrics::new(hoster_name.to_string()));
        hoster_metrics.record_success(response_time, streams);

        log::debug!(
            "[{}] Resolved {} stream(s) in {}ms - Success rate: {:.2}%",
            hoster_name,
            streams,
            response_time.as_millis(),
            hoster_metrics.success_rate()
        );
    }

    pub fn record_failure(&self, hoster_name: &str, error: String) {
        let mut metrics = self.lock();
        let hoster_metrics = metrics
            .entry(hoster_name.to_string())
            .or_insert_with(|| HosterMetrics::new(hoster_name.to_string()));
        hoster_metrics.record_failure(error.clone());

        log::warn!(
            "[{}] Failure - Error: {} - Success rate: {:.2}%",
            hoster_name,
            error,
            hoster_metrics.success_rate()
        );
    }

    pub fn get_metrics(&self, hoster_name: &str) -> Option<HosterMetrics> {
        self.lock().get(hoster_name).cloned()
    }

    pub fn get_all_metrics(&self) -> Vec<HosterMetrics> {
        let mut all: Vec<HosterMetrics> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| a.hoster_name.cmp(&b.hoster_name));
        all
    }

    pub fn export_json(&self) -> String {
        let metrics = self.lock();
        serde_json::to_string_pretty(&*metrics).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Time an extraction and record its outcome under `hoster_name`.
pub async fn track_resolution<F, T, E>(
    tracker: &MetricsTracker,
    hoster_name: &str,
    operation: F,
) -> Result<Vec<T>, E>
where
    F: std::future::Future<Output = Result<Vec<T>, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let result = operation.await;
    let duration = start.elapsed();

    match &result {
        Ok(streams) => tracker.record_success(hoster_name, duration, streams.len()),
        Err(e) => tracker.record_failure(hoster_name, e.to_string()),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = HosterMetrics::new("Voe".to_string());
        assert_eq!(metrics.hoster_name, "Voe");
        assert_eq!(metrics.total_resolutions, 0);
        assert_eq!(metrics.success_rate(), 0.0);
    }

    #[test]
    fn test_record_success_counts_streams() {
        let mut metrics = HosterMetrics::new("Voe".to_string());
        metrics.record_success(Duration::from_millis(100), 3);
        metrics.record_success(Duration::from_millis(300), 0);

        assert_eq!(metrics.successful_resolutions, 2);
        assert_eq!(metrics.streams_resolved, 3);
        assert_eq!(metrics.empty_resolutions, 1);
        assert_eq!(metrics.average_response_time_ms, 200.0);
    }

    #[test]
    fn test_record_failure() {
        let mut metrics = HosterMetrics::new("Mixdrop".to_string());
        metrics.record_failure("operation timed out".to_string());

        assert_eq!(metrics.failed_resolutions, 1);
        assert_eq!(metrics.timeout_count, 1);
        assert_eq!(metrics.success_rate(), 0.0);
        assert_eq!(metrics.last_error.as_deref(), Some("operation timed out"));
    }

    #[tokio::test]
    async fn test_track_resolution() {
        let tracker = MetricsTracker::new();

        let ok: Result<Vec<u8>, String> =
            track_resolution(&tracker, "Okru", async { Ok(vec![1, 2]) }).await;
        let err: Result<Vec<u8>, String> =
            track_resolution(&tracker, "Doodstream", async { Err("boom".to_string()) }).await;

        assert!(ok.is_ok());
        assert!(err.is_err());
        assert_eq!(tracker.get_metrics("Okru").unwrap().streams_resolved, 2);
        assert_eq!(tracker.get_metrics("Doodstream").unwrap().failed_resolutions, 1);
        assert_eq!(tracker.get_all_metrics().len(), 2);
    }
}
