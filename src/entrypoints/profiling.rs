/*!
Logging and profiling setup for the command line.

There are two implementations:

- real: compiled only when `feature = "profiling"` is set. Adds a
  tracing-chrome layer that writes a `trace-*.json` file, flushed when the
  returned guard is dropped.
- stub: compiled in all other configurations. Logging only.

When RUST_LOG is not set, a helpful default filter is used.
*/

use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    let default = if cfg!(debug_assertions) {
        "debug,hyper_util=info,reqwest::connect=info,rustls=info"
    } else {
        "info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

#[cfg(feature = "profiling")]
mod inner {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    /// Keeps the trace file open until dropped
    pub struct ProfilingGuard {
        _flush: tracing_chrome::FlushGuard,
    }

    /// Initialize logging plus the chrome trace layer
    pub fn setup_logging_and_profiling() -> ProfilingGuard {
        let (chrome_layer, flush) = tracing_chrome::ChromeLayerBuilder::new()
            .include_args(true)
            .build();
        let fmt_layer = fmt::layer().with_filter(super::env_filter());
        tracing_subscriber::registry()
            .with(chrome_layer)
            .with(fmt_layer)
            .init();

        tracing::info!("Tracing initialized with chrome profiling layer");
        ProfilingGuard { _flush: flush }
    }
}

#[cfg(not(feature = "profiling"))]
mod inner {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    /// Nothing to flush without the profiling feature
    pub struct ProfilingGuard;

    /// Initialize logging; profiling is a no-op here
    pub fn setup_logging_and_profiling() -> ProfilingGuard {
        let fmt_layer = fmt::layer().with_filter(super::env_filter());
        tracing_subscriber::registry().with(fmt_layer).init();

        tracing::info!("Logging initialized (profiling disabled in this build)");
        ProfilingGuard
    }
}

pub use inner::setup_logging_and_profiling;
