use crate::app::{self, Settings};
use std::process::ExitCode;

/// Native entry point
pub async fn native_main() -> ExitCode {
    let _profiling = super::profiling::setup_logging_and_profiling();

    let settings = Settings::from_cli();
    tracing::info!(
        "{} {} starting",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    match app::run(settings).await {
        Ok(summary) => {
            tracing::info!(
                accepted = summary.accepted,
                announced = ?summary.announced,
                "Done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Replay failed: {e}");
            ExitCode::FAILURE
        }
    }
}
