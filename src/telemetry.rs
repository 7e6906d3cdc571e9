use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Initialize structured logging for the merge core.
///
/// JSON output with span context, filtered by RUST_LOG with an info default.
/// The surrounding application calls this once at startup.
pub fn init_telemetry() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("GitMaster telemetry initialized with structured logging");
    Ok(())
}

/// Generate a correlation ID for linking related merge operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span with common merge-cycle attributes. The orchestrator wraps
/// each VCS merge attempt in one of these.
pub fn create_merge_span(
    operation: &str,
    target_branch: Option<&str>,
    correlation_id: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "merge_orchestration",
        operation = operation,
        target.branch = target_branch,
        correlation.id = correlation_id,
    )
}
