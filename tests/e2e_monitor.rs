//! End-to-end tests for the compression monitor.

use std::sync::Arc;

use notecomp::monitor::{FixedMemoryProbe, NoMemoryProbe};
use notecomp::{
    AlertSeverity, AlertType, Algorithm, CompressionEvent, CompressionMonitor, CompressionOptions,
    CompressionService, EventType, MonitorConfig,
};

fn monitor(config: MonitorConfig) -> CompressionMonitor {
    CompressionMonitor::new(config).with_memory_probe(Arc::new(NoMemoryProbe))
}

/// Real compression results feed the monitor without alerts
#[tokio::test]
async fn test_records_service_results() {
    let service = Arc::new(CompressionService::default().with_memory_probe(Arc::new(NoMemoryProbe)));
    let monitor = monitor(MonitorConfig::default()).with_service(Arc::clone(&service));
    let text = "Standup: shipped search, fixing sync. ".repeat(60);

    let result = service.compress(&text, &CompressionOptions::new()).await;
    assert!(monitor.record_compression(&result, Some("note:1")).is_empty());

    let bytes = result.compressed_data.clone().unwrap();
    let back = service.decompress(&bytes, result.algorithm).await;
    assert!(monitor.record_decompression(&back, None).is_empty());

    let hit = service.compress(&text, &CompressionOptions::new()).await;
    monitor.record_compression(&hit, None);

    let metrics = monitor.get_performance_metrics();
    assert_eq!(metrics.event_count, 3);
    assert_eq!(metrics.error_rate, 0.0);
    assert!(metrics.average_compression_ratio < 0.8);
    assert!((metrics.cache_hit_rate - 0.5).abs() < 1e-9);

    let events = monitor.get_events(Some(1));
    assert_eq!(events.len(), 1);
    assert!(events[0].cache_hit);

    let export = monitor.export();
    assert_eq!(export.events.len(), 3);
    assert_eq!(export.stats.unwrap().compression_count, 1);
}

/// Each alert rule fires on its own trigger
#[test]
fn test_alert_rules() {
    let monitor = monitor(MonitorConfig::default());

    let slow = CompressionEvent::new(EventType::Compression, Algorithm::Gzip, 10_000, 2_000, 6_000.0, true);
    let alerts = monitor.record_event(slow);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Performance);
    assert_eq!(alerts[0].severity, AlertSeverity::Medium);

    let poor = CompressionEvent::new(EventType::Compression, Algorithm::Brotli, 1_000, 900, 1.0, true);
    let alerts = monitor.record_event(poor);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Threshold);
    assert_eq!(alerts[0].severity, AlertSeverity::Low);

    let alerts = monitor.record_error(Algorithm::Gzip, "stream ended early", Some("note:9"));
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Error);
    assert_eq!(alerts[0].severity, AlertSeverity::High);

    let skipped = CompressionEvent::new(EventType::Compression, Algorithm::None, 100, 100, 0.0, true);
    assert!(monitor.record_event(skipped).is_empty());

    assert_eq!(monitor.get_active_alerts().len(), 3);
}

/// Memory above the ceiling raises a critical alert
#[test]
fn test_memory_alert() {
    let probe = Arc::new(FixedMemoryProbe::new(200 * 1024 * 1024));
    let monitor = CompressionMonitor::new(MonitorConfig::default()).with_memory_probe(probe.clone());
    let event = CompressionEvent::new(EventType::Compression, Algorithm::Gzip, 1_000, 300, 1.0, true);

    let alerts = monitor.record_event(event.clone());
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);

    probe.set(10 * 1024 * 1024);
    assert!(monitor.record_event(event).is_empty());
}

/// Alerts stay until resolved, then clear
#[test]
fn test_alert_lifecycle() {
    let monitor = monitor(MonitorConfig::default());
    monitor.record_error(Algorithm::Brotli, "first", None);
    monitor.record_error(Algorithm::Brotli, "second", None);

    let active = monitor.get_active_alerts();
    assert_eq!(active.len(), 2);
    assert!(monitor.resolve_alert(active[0].id));
    assert!(!monitor.resolve_alert(uuid::Uuid::nil()));

    assert_eq!(monitor.get_active_alerts().len(), 1);
    assert_eq!(monitor.get_all_alerts().len(), 2);

    assert_eq!(monitor.clear_resolved_alerts(), 1);
    assert_eq!(monitor.get_all_alerts().len(), 1);
    assert!(!monitor.get_all_alerts()[0].resolved);
}

/// Ring buffers keep the newest entries
#[test]
fn test_ring_buffers_overflow() {
    let monitor = monitor(MonitorConfig {
        max_events: 5,
        max_alerts: 3,
        ..Default::default()
    });

    for i in 0..8 {
        monitor.record_error(Algorithm::Gzip, &format!("failure {i}"), None);
    }

    let events = monitor.get_events(None);
    assert_eq!(events.len(), 5);
    assert_eq!(events[4].error.as_deref(), Some("failure 7"));

    let alerts = monitor.get_all_alerts();
    assert_eq!(alerts.len(), 3);
    assert!(alerts[2].message.contains("failure 7"));
}

/// Health check flags a high rolling error rate
#[test]
fn test_health_check_error_rate() {
    let monitor = monitor(MonitorConfig::default());
    assert!(monitor.check_health().is_empty());

    for _ in 0..9 {
        monitor.record_event(CompressionEvent::new(
            EventType::Compression,
            Algorithm::Gzip,
            1_000,
            200,
            1.0,
            true,
        ));
    }
    monitor.record_error(Algorithm::Gzip, "boom", None);

    let alerts = monitor.check_health();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Error);
    assert_eq!(alerts[0].severity, AlertSeverity::High);
}

/// Exports serialize to JSON
#[test]
fn test_export_json() {
    let monitor = monitor(MonitorConfig::default());
    monitor.record_error(Algorithm::Gzip, "boom", Some("note:3"));

    let json = monitor.export_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["events"].as_array().unwrap().len(), 1);
    assert_eq!(value["alerts"][0]["type"], "error");
    assert_eq!(value["events"][0]["context"], "note:3");
}

