use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

/// Counts graded attempts by outcome so pass rates can be charted per grading mode.
pub(crate) fn record_submission(grading_mode: &'static str, passed: Option<bool>) {
    let outcome = match passed {
        Some(true) => "passed",
        Some(false) => "failed",
        None => "ungraded",
    };
    metrics::counter!(
        "test_submissions_total",
        "grading_mode" => grading_mode,
        "outcome" => outcome
    )
    .increment(1);
}
