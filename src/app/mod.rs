pub(crate) mod places;
pub(crate) mod replay;
pub(crate) mod settings;

pub use replay::run;
pub use settings::Settings;

/// Errors that abort a replay
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GPX parse error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    #[error(transparent)]
    Guide(#[from] hazard_guide_lib::GuideError),

    #[error("Track contains no usable points")]
    EmptyTrack,
}
