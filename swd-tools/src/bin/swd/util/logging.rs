use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    Error,
    Info,
    Debug,
    Trace,
}

impl LevelFilter {
    /// The level selected by the `-q`, `-d` and `-i` flags.
    ///
    /// `-q` wins over `-d`, which wins over `-i`. Without any flag `None` is
    /// returned and `RUST_LOG` decides.
    pub fn from_flags(quiet: bool, debug: u8, info: u8) -> Option<Self> {
        if quiet {
            Some(Self::Error)
        } else if debug > 1 {
            Some(Self::Trace)
        } else if debug == 1 {
            Some(Self::Debug)
        } else if info > 0 {
            Some(Self::Info)
        } else {
            None
        }
    }

    fn into_tracing(self) -> tracing::level_filters::LevelFilter {
        match self {
            Self::Error => tracing::level_filters::LevelFilter::ERROR,
            Self::Info => tracing::level_filters::LevelFilter::INFO,
            Self::Debug => tracing::level_filters::LevelFilter::DEBUG,
            Self::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }
}

fn env_filter(default: Option<LevelFilter>) -> EnvFilter {
    match default {
        Some(filter) => {
            // We have a level from the command line, ignore RUST_LOG.
            EnvFilter::builder()
                .with_default_directive(filter.into_tracing().into())
                .parse_lossy("")
        }
        None => {
            // No level given, use RUST_LOG or fall back to WARN.
            EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::WARN.into())
                .from_env_lossy()
        }
    }
}

/// Configures tracing for the current thread.
///
/// Log messages go to stderr, so the output of actions on stdout stays
/// clean. Logging is active until the returned guard is dropped.
///
/// # Arguments
///
/// * `default` - The log level to use. If `None`, falls back to `RUST_LOG` in the environment.
pub fn setup_logging(default: Option<LevelFilter>) -> DefaultGuard {
    let stderr_subscriber = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter(default));

    tracing_subscriber::registry()
        .with(stderr_subscriber)
        .set_default()
}
