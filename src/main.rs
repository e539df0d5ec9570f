//! Log triage entrypoint: reads the configured sources once, scores every
//! window, exports the table and optionally persists it. Ctrl+C cancels the
//! run between stages.

use log_triage::{
    config::PipelineConfig,
    export,
    logging::{StructuredLogger, TracingObserver},
    pipeline::Pipeline,
    storage::open_sink,
    CancelToken,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("LOG_TRIAGE_CONFIG")
        .map(PathBuf::from)
        .ok()
        .or_else(|| std::env::args().nth(1).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let config = PipelineConfig::load(&config_path)?;

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(config = %config_path.display(), sources = config.sources.len(), "log triage starting");

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!(error = %e, "cannot install Ctrl+C handler");
    }

    let store = config.store.clone();
    let output = config.output.clone();
    let pipeline = Pipeline::new(config)?
        .with_observer(Arc::new(TracingObserver))
        .with_cancel(cancel);
    let run = pipeline.run()?;

    let sink = open_sink(&store);
    let run_id = run.run_id.to_string();
    let mut persisted = 0usize;
    for row in &run.rows {
        match sink.insert(&run_id, row) {
            Ok(()) => persisted += 1,
            Err(e) => warn!(error = %e, window_start = %row.features.window_start, "persist failed"),
        }
    }

    let written = export::save(&run.rows, run.grouped_by_actor, &output)?;
    for path in &written {
        info!(path = %path.display(), "wrote");
    }

    info!(
        run_id = %run.run_id,
        lines = run.report.lines_read,
        source_failures = run.report.source_failures.len(),
        kept = run.report.clean.kept,
        windows = run.report.windows_scored,
        anomalies = run.report.anomalies,
        detector_failures = run.report.detector_failures.len(),
        persisted,
        "log triage complete"
    );
    Ok(())
}
