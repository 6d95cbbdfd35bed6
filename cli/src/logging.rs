use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Lets the configured level replace the startup filter once configuration
/// is loaded. `RUST_LOG` always wins.
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool
}

pub fn init(verbose: bool) -> LogHandle {
    let from_env = std::env::var_os(EnvFilter::DEFAULT_ENV).is_some();
    let filter = if from_env {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(if verbose { "debug" } else { "info" })
    };

    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    LogHandle { handle, from_env }
}

impl LogHandle {
    pub fn apply_level(&self, level: &str) {
        if self.from_env {
            return;
        }
        if let Err(e) = self.handle.reload(EnvFilter::new(level)) {
            tracing::warn!(level = %level, error = %e, "Failed to apply configured log level");
        }
    }
}
