//! Prometheus metrics for the PINOVARA sync server.
//!
//! Labels carry only the attachment kind and outcome, never organization
//! IDs or file names.
//!
//! The `/metrics` endpoint is unauthenticated; restrict it to the scraper
//! at the network level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use pinovara_core::{ItemStatus, SyncReport};
use prometheus::{self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};
use std::time::Duration;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static SYNC_RUNS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pinovara_odk_sync_runs_total",
            "Total ODK sync runs by kind and outcome",
        ),
        &["kind", "outcome"],
    )
    .expect("metric creation failed")
});

pub static SYNC_ITEMS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pinovara_odk_sync_items_total",
            "Total remote attachments processed by kind and status",
        ),
        &["kind", "status"],
    )
    .expect("metric creation failed")
});

pub static SYNC_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pinovara_odk_sync_duration_seconds",
            "Time taken by one ODK sync run",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["kind"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(SYNC_RUNS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SYNC_ITEMS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SYNC_DURATION.clone()))
            .expect("metric registration failed");
    });
}

/// Record the counters for a finished sync report.
pub fn record_sync(report: &SyncReport, elapsed: Duration) {
    let kind = report.tipo.as_str();
    let outcome = if !report.success {
        "failed"
    } else if report.erros > 0 {
        "partial"
    } else {
        "ok"
    };
    SYNC_RUNS.with_label_values(&[kind, outcome]).inc();
    SYNC_DURATION
        .with_label_values(&[kind])
        .observe(elapsed.as_secs_f64());

    for (status, count) in [
        (ItemStatus::Existente, report.ja_existentes),
        (ItemStatus::Baixada, report.baixadas),
        (ItemStatus::Erro, report.erros),
    ] {
        if count > 0 {
            SYNC_ITEMS
                .with_label_values(&[kind, status_label(status)])
                .inc_by(u64::from(count));
        }
    }
}

fn status_label(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Existente => "existente",
        ItemStatus::Baixada => "baixada",
        ItemStatus::Erro => "erro",
    }
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}
