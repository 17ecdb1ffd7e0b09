//! Compression Monitor: event log, rolling metrics and threshold alerts.
//!
//! # Alert Rules
//!
//! Evaluated on every recorded event:
//!
//! | Condition                                   | Type        | Severity |
//! |---------------------------------------------|-------------|----------|
//! | time > `slow_compression_ms` (5000)         | performance | medium   |
//! | successful compression, ratio > 0.8         | threshold   | low      |
//! | `success == false`                          | error       | high     |
//! | process memory > `memory_limit_bytes`       | performance | critical |
//!
//! The periodic health check adds:
//!
//! | Condition                                   | Type        | Severity |
//! |---------------------------------------------|-------------|----------|
//! | rolling error rate > 5%                     | error       | high     |
//! | process memory > `memory_limit_bytes`       | performance | critical |
//!
//! # Alert Lifecycle
//!
//! ```text
//! raised (resolved = false) ──resolve_alert(id)──> resolved ──clear_resolved_alerts()──> gone
//! ```
//!
//! Alerts never resolve on their own. Both events and alerts live in
//! bounded ring buffers that drop the oldest entry on overflow.

mod alert;
mod event;
mod memory;

pub use alert::{AlertSeverity, AlertType, CompressionAlert};
pub use event::{CompressionEvent, EventType};
pub use memory::{FixedMemoryProbe, MemoryProbe, NoMemoryProbe, SysinfoProbe};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::codec::Algorithm;
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::service::{
    CompressionResult, CompressionService, CompressionStats, DecompressionResult, ServiceMetrics,
};

/// Windowed aggregation over the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Mean time of successful compressions (ms)
    pub average_compression_time_ms: f64,
    /// Mean time of successful decompressions (ms)
    pub average_decompression_time_ms: f64,
    /// Mean compressed/original ratio of successful compressions
    pub average_compression_ratio: f64,
    /// failed / total events in the window
    pub error_rate: f64,
    /// Original bytes compressed per millisecond of compression time
    pub throughput_bytes_per_ms: f64,
    /// Process memory in bytes, when the host reports it
    pub memory_usage: Option<u64>,
    /// Cache-served compressions / compressions, over the cache window
    pub cache_hit_rate: f64,
    /// Events in the window
    pub event_count: usize,
}

/// Everything the monitor knows, for download/debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorExport {
    /// When the bundle was produced
    pub exported_at: DateTime<Utc>,
    /// Event log, oldest first
    pub events: Vec<CompressionEvent>,
    /// All alerts, oldest first
    pub alerts: Vec<CompressionAlert>,
    /// Metrics over the default window
    pub metrics: PerformanceMetrics,
    /// Compression Service totals, when a service is attached
    pub stats: Option<CompressionStats>,
    /// Compression Service metrics, when a service is attached
    pub service_metrics: Option<ServiceMetrics>,
}

/// Event recorder and alert engine.
///
/// Shared as `Arc<CompressionMonitor>`; the periodic health check holds its
/// own clone until stopped.
pub struct CompressionMonitor {
    config: MonitorConfig,
    events: Mutex<VecDeque<CompressionEvent>>,
    alerts: Mutex<VecDeque<CompressionAlert>>,
    memory: Arc<dyn MemoryProbe>,
    service: Option<Arc<CompressionService>>,
}

impl Default for CompressionMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl CompressionMonitor {
    /// Create a monitor
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(config.max_events.min(4096))),
            alerts: Mutex::new(VecDeque::with_capacity(config.max_alerts.min(1024))),
            config,
            memory: Arc::new(SysinfoProbe::new()),
            service: None,
        }
    }

    /// Use a specific memory probe
    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory = probe;
        self
    }

    /// Attach a Compression Service whose stats are included in exports
    pub fn with_service(mut self, service: Arc<CompressionService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Monitor configuration
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Record an event and evaluate alert rules against it.
    ///
    /// Returns the alerts raised by this event.
    pub fn record_event(&self, event: CompressionEvent) -> Vec<CompressionAlert> {
        let raised = self.evaluate_event(&event);

        if let Ok(mut events) = self.events.lock() {
            events.push_back(event);
            while events.len() > self.config.max_events {
                events.pop_front();
            }
        }

        self.push_alerts(&raised);
        raised
    }

    /// Record a compression result
    pub fn record_compression(
        &self,
        result: &CompressionResult,
        context: Option<&str>,
    ) -> Vec<CompressionAlert> {
        let mut event = CompressionEvent::from_compression(result);
        event.context = context.map(String::from);
        self.record_event(event)
    }

    /// Record a decompression result
    pub fn record_decompression(
        &self,
        result: &DecompressionResult,
        context: Option<&str>,
    ) -> Vec<CompressionAlert> {
        let mut event = CompressionEvent::from_decompression(result);
        event.context = context.map(String::from);
        self.record_event(event)
    }

    /// Record a failure outside a compress/decompress call
    pub fn record_error(
        &self,
        algorithm: Algorithm,
        message: &str,
        context: Option<&str>,
    ) -> Vec<CompressionAlert> {
        let mut event = CompressionEvent::error(algorithm, message);
        event.context = context.map(String::from);
        self.record_event(event)
    }

    fn evaluate_event(&self, event: &CompressionEvent) -> Vec<CompressionAlert> {
        let mut raised = Vec::new();

        if event.compression_time_ms > self.config.slow_compression_ms {
            raised.push(
                CompressionAlert::new(
                    AlertType::Performance,
                    AlertSeverity::Medium,
                    format!(
                        "Slow {:?} operation: {:.0} ms",
                        event.event_type, event.compression_time_ms
                    ),
                )
                .with_data(json!({
                    "event_id": event.id,
                    "compression_time_ms": event.compression_time_ms,
                    "threshold_ms": self.config.slow_compression_ms,
                })),
            );
        }

        // Skips (algorithm none) are not compressions and never count as poor
        if event.event_type == EventType::Compression
            && event.success
            && event.algorithm != Algorithm::None
        {
            if let Some(ratio) = event.ratio() {
                if ratio > self.config.poor_ratio_threshold {
                    raised.push(
                        CompressionAlert::new(
                            AlertType::Threshold,
                            AlertSeverity::Low,
                            format!("Poor compression ratio: {:.1}% savings", (1.0 - ratio) * 100.0),
                        )
                        .with_data(json!({
                            "event_id": event.id,
                            "ratio": ratio,
                            "threshold": self.config.poor_ratio_threshold,
                        })),
                    );
                }
            }
        }

        if !event.success {
            raised.push(
                CompressionAlert::new(
                    AlertType::Error,
                    AlertSeverity::High,
                    format!(
                        "{:?} failed: {}",
                        event.event_type,
                        event.error.as_deref().unwrap_or("unknown error")
                    ),
                )
                .with_data(json!({
                    "event_id": event.id,
                    "algorithm": event.algorithm,
                    "context": event.context,
                })),
            );
        }

        if let Some(alert) = self.memory_alert() {
            raised.push(alert);
        }

        raised
    }

    fn memory_alert(&self) -> Option<CompressionAlert> {
        let usage = self.memory.memory_usage()?;
        (usage > self.config.memory_limit_bytes).then(|| {
            CompressionAlert::new(
                AlertType::Performance,
                AlertSeverity::Critical,
                format!("High memory usage: {:.1} MB", usage as f64 / (1024.0 * 1024.0)),
            )
            .with_data(json!({
                "memory_usage": usage,
                "limit": self.config.memory_limit_bytes,
            }))
        })
    }

    fn push_alerts(&self, raised: &[CompressionAlert]) {
        if raised.is_empty() {
            return;
        }
        for alert in raised {
            warn!(
                "Compression alert [{}/{}]: {}",
                alert.alert_type, alert.severity, alert.message
            );
        }
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.extend(raised.iter().cloned());
            while alerts.len() > self.config.max_alerts {
                alerts.pop_front();
            }
        }
    }

    fn events_since(&self, window: Duration) -> Vec<CompressionEvent> {
        let cutoff = window_start(window);
        self.events
            .lock()
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.timestamp >= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Metrics over the configured window (default 24h)
    pub fn get_performance_metrics(&self) -> PerformanceMetrics {
        self.get_performance_metrics_for(self.config.metrics_window())
    }

    /// Metrics over an explicit window
    pub fn get_performance_metrics_for(&self, window: Duration) -> PerformanceMetrics {
        let events = self.events_since(window);

        let compressions: Vec<&CompressionEvent> = events
            .iter()
            .filter(|e| e.event_type == EventType::Compression && e.success)
            .collect();
        let decompressions: Vec<&CompressionEvent> = events
            .iter()
            .filter(|e| e.event_type == EventType::Decompression && e.success)
            .collect();

        let average_compression_time_ms =
            mean(compressions.iter().map(|e| e.compression_time_ms));
        let average_decompression_time_ms =
            mean(decompressions.iter().map(|e| e.compression_time_ms));
        let average_compression_ratio = mean(compressions.iter().filter_map(|e| e.ratio()));

        let failed = events.iter().filter(|e| !e.success).count();
        let error_rate = if events.is_empty() {
            0.0
        } else {
            failed as f64 / events.len() as f64
        };

        let total_bytes: usize = compressions.iter().map(|e| e.original_size).sum();
        let total_time: f64 = compressions.iter().map(|e| e.compression_time_ms).sum();
        let throughput_bytes_per_ms = if total_time > 0.0 {
            total_bytes as f64 / total_time
        } else {
            0.0
        };

        PerformanceMetrics {
            average_compression_time_ms,
            average_decompression_time_ms,
            average_compression_ratio,
            error_rate,
            throughput_bytes_per_ms,
            memory_usage: self.memory.memory_usage(),
            cache_hit_rate: self.cache_hit_rate(),
            event_count: events.len(),
        }
    }

    fn cache_hit_rate(&self) -> f64 {
        let events = self.events_since(self.config.cache_window());
        let compressions = events
            .iter()
            .filter(|e| e.event_type == EventType::Compression)
            .count();
        if compressions == 0 {
            return 0.0;
        }
        let hits = events.iter().filter(|e| e.cache_hit).count();
        hits as f64 / compressions as f64
    }

    /// Run the health rules once and record any alerts they raise
    pub fn check_health(&self) -> Vec<CompressionAlert> {
        let mut raised = Vec::new();

        let metrics = self.get_performance_metrics_for(self.config.health_window());
        if metrics.event_count > 0 && metrics.error_rate > self.config.error_rate_threshold {
            raised.push(
                CompressionAlert::new(
                    AlertType::Error,
                    AlertSeverity::High,
                    format!("High error rate: {:.1}%", metrics.error_rate * 100.0),
                )
                .with_data(json!({
                    "error_rate": metrics.error_rate,
                    "threshold": self.config.error_rate_threshold,
                    "events": metrics.event_count,
                })),
            );
        }

        if let Some(alert) = self.memory_alert() {
            raised.push(alert);
        }

        debug!("Health check raised {} alert(s)", raised.len());
        self.push_alerts(&raised);
        raised
    }

    /// Start the periodic health check on the current tokio runtime
    pub fn start_health_check(self: &Arc<Self>) -> HealthCheckHandle {
        let monitor = Arc::clone(self);
        let period = self.config.health_check_interval();
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.check_health();
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Health check stopped");
        });

        HealthCheckHandle {
            shutdown,
            task: Some(task),
        }
    }

    /// Most recent events, oldest first
    pub fn get_events(&self, limit: Option<usize>) -> Vec<CompressionEvent> {
        self.events
            .lock()
            .map(|events| {
                let skip = limit.map_or(0, |n| events.len().saturating_sub(n));
                events.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Unresolved alerts
    pub fn get_active_alerts(&self) -> Vec<CompressionAlert> {
        self.alerts
            .lock()
            .map(|alerts| alerts.iter().filter(|a| !a.resolved).cloned().collect())
            .unwrap_or_default()
    }

    /// Every alert still in the buffer
    pub fn get_all_alerts(&self) -> Vec<CompressionAlert> {
        self.alerts
            .lock()
            .map(|alerts| alerts.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Mark an alert resolved. Returns false if the id is unknown.
    pub fn resolve_alert(&self, id: Uuid) -> bool {
        let Ok(mut alerts) = self.alerts.lock() else {
            return false;
        };
        match alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.resolved = true;
                true
            },
            None => false,
        }
    }

    /// Drop resolved alerts, returning how many were removed
    pub fn clear_resolved_alerts(&self) -> usize {
        let Ok(mut alerts) = self.alerts.lock() else {
            return 0;
        };
        let before = alerts.len();
        alerts.retain(|a| !a.resolved);
        before - alerts.len()
    }

    /// Drop all events and alerts
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.clear();
        }
    }

    /// Bundle events, alerts, metrics and service stats
    pub fn export(&self) -> MonitorExport {
        MonitorExport {
            exported_at: Utc::now(),
            events: self.get_events(None),
            alerts: self.get_all_alerts(),
            metrics: self.get_performance_metrics(),
            stats: self.service.as_ref().map(|s| s.get_stats()),
            service_metrics: self.service.as_ref().map(|s| s.get_metrics()),
        }
    }

    /// Export bundle as pretty JSON
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }
}

/// Stops the periodic health check when stopped or dropped
pub struct HealthCheckHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl HealthCheckHandle {
    /// Stop the task and wait for it to exit
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Check if the task is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for HealthCheckHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn window_start(window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
