fn env_truthy(var: &str) -> Option<bool> {
    std::env::var(var)
        .map(|v| !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"))
        .ok()
}

pub mod logging {
    use clap::ValueEnum;
    use std::fs::OpenOptions;
    use std::path::PathBuf;
    use std::sync::OnceLock;
    use tracing::level_filters::LevelFilter;
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_subscriber::EnvFilter;

    /// Env var holding a full `EnvFilter` directive that overrides `--log-level`.
    pub const FILTER_ENV: &str = "ASSESS_LOG_FILTER";

    #[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
    pub enum LogLevel {
        Error,
        #[default]
        Warn,
        Info,
        Debug,
        Trace,
    }

    impl LogLevel {
        pub fn to_filter(self) -> LevelFilter {
            match self {
                LogLevel::Error => LevelFilter::ERROR,
                LogLevel::Warn => LevelFilter::WARN,
                LogLevel::Info => LevelFilter::INFO,
                LogLevel::Debug => LevelFilter::DEBUG,
                LogLevel::Trace => LevelFilter::TRACE,
            }
        }
    }

    #[derive(Clone, Debug, Default)]
    pub struct LogConfig {
        pub level: LogLevel,
        pub file: Option<PathBuf>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum InitError {
        #[error("failed to open log file {path:?}: {source}")]
        Io {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("failed to configure logger: {0}")]
        Configure(String),
    }

    static INIT: OnceLock<()> = OnceLock::new();
    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

    /// Installs the global subscriber. Later calls are no-ops.
    pub fn init(config: &LogConfig) -> Result<(), InitError> {
        if INIT.get().is_some() {
            return Ok(());
        }
        install(config)?;
        INIT.set(()).ok();
        Ok(())
    }

    fn install(config: &LogConfig) -> Result<(), InitError> {
        let env_filter = match std::env::var(FILTER_ENV) {
            Ok(directive) => EnvFilter::new(directive),
            Err(_) => EnvFilter::new(default_directive(config.level.to_filter())),
        };

        let (writer, guard) = match &config.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| InitError::Io {
                        path: path.clone(),
                        source,
                    })?;
                tracing_appender::non_blocking(file)
            }
            None => tracing_appender::non_blocking(std::io::stderr()),
        };

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(config.level >= LogLevel::Debug)
            .with_ansi(config.file.is_none())
            .with_writer(writer)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|err| InitError::Configure(err.to_string()))?;

        let _ = GUARD.set(guard);
        Ok(())
    }

    const DEPENDENCY_TARGETS: &[&str] = &[
        "hyper",
        "hyper_util",
        "reqwest",
        "rustls",
        "tokio_tungstenite",
        "tungstenite",
        "mio",
        "h2",
    ];

    /// Our own crates follow the requested level; dependencies stay at `info`
    /// unless `ASSESS_TRACE_DEPS` is set.
    pub(crate) fn default_directive(level: LevelFilter) -> String {
        let ours = match level {
            LevelFilter::TRACE => "trace",
            LevelFilter::DEBUG => "debug",
            LevelFilter::INFO => return "info".to_owned(),
            LevelFilter::WARN => return "warn".to_owned(),
            LevelFilter::ERROR => return "error".to_owned(),
            LevelFilter::OFF => return "off".to_owned(),
        };
        let mut directive = format!(
            "info,assess={ours},assess_client_core={ours},run_store={ours},assess_proto={ours}"
        );
        if !super::env_truthy("ASSESS_TRACE_DEPS").unwrap_or(false) {
            for target in DEPENDENCY_TARGETS {
                directive.push_str(&format!(",{target}=info"));
            }
        }
        directive
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn coarse_levels_are_plain() {
            assert_eq!(default_directive(LevelFilter::WARN), "warn");
            assert_eq!(default_directive(LevelFilter::INFO), "info");
        }

        #[test]
        fn verbose_levels_scope_to_our_targets() {
            let directive = default_directive(LevelFilter::DEBUG);
            assert!(directive.starts_with("info,assess=debug"));
            assert!(directive.contains("run_store=debug"));
            assert!(EnvFilter::try_new(&directive).is_ok());
        }

        #[test]
        fn levels_order_by_verbosity() {
            assert!(LogLevel::Trace > LogLevel::Debug);
            assert_eq!(LogLevel::default(), LogLevel::Warn);
        }
    }
}
