//! Log output for the probe binary (stderr) and for the Python module
//! (forwarded into `logging`).
//!
//! Both read a filter from `MCP2221_LOG`, falling back to `RUST_LOG`. The
//! value uses `env_logger` directive syntax, so `warn,mcp2221_rs::transfer=trace`
//! keeps the rest quiet while tracing packet exchanges.

use std::sync::Once;

use log::LevelFilter;

const LOG_ENV: &str = "MCP2221_LOG";
const FALLBACK_LOG_ENV: &str = "RUST_LOG";

static RUST_LOG_ONCE: Once = Once::new();

fn filter_spec(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    lookup(LOG_ENV)
        .or_else(|| lookup(FALLBACK_LOG_ENV))
        .filter(|spec| !spec.trim().is_empty())
}

/// Most verbose level any directive in `spec` enables. A bare module path
/// enables everything for that module, as it does in `env_logger`.
#[cfg(any(feature = "python", test))]
fn max_level(spec: &str) -> Option<LevelFilter> {
    spec.split('/')
        .next()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .filter_map(|directive| match directive.split_once('=') {
            Some((_, level)) => level.trim().parse::<LevelFilter>().ok(),
            None => Some(directive.parse().unwrap_or(LevelFilter::Trace)),
        })
        .max()
}

/// Single threshold for sinks that cannot filter per module.
#[cfg(feature = "python")]
fn env_level() -> LevelFilter {
    filter_spec(|key| std::env::var(key).ok())
        .as_deref()
        .and_then(max_level)
        .unwrap_or(LevelFilter::Info)
}

/// Install the stderr logger used by the probe binary. Defaults to `info`.
/// Later calls, or a logger installed elsewhere first, leave things as they are.
pub fn init_rust_logging() {
    RUST_LOG_ONCE.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(LevelFilter::Info);
        if let Some(spec) = filter_spec(|key| std::env::var(key).ok()) {
            builder.parse_filters(&spec);
        }
        let _ = builder
            .format_timestamp_millis()
            .format_module_path(true)
            .format_target(true)
            .try_init();
    });
}

#[cfg(feature = "python")]
pub use self::python::{init_python_logging, set_python_log_level, set_python_log_level_str};

#[cfg(feature = "python")]
mod python {
    use std::sync::{Mutex, Once};

    use log::{LevelFilter, Log, Metadata, Record};
    use once_cell::sync::OnceCell;
    use pyo3::prelude::*;
    use pyo3::types::PyModule;

    use super::{env_level, max_level};

    static PY_LOG_ONCE: Once = Once::new();
    static PY_LOGGER: OnceCell<&'static PyLogger> = OnceCell::new();

    /// Forwards `log` records to `logging.getLogger(<target>)`, with `::`
    /// turned into `.` so `mcp2221_rs::transfer` lands under `mcp2221_rs`.
    struct PyLogger {
        top_filter: Mutex<LevelFilter>,
        logging_mod: Py<PyModule>,
    }

    impl PyLogger {
        fn new(py: Python<'_>, top_filter: LevelFilter) -> PyResult<Self> {
            let logging = py.import("logging")?;
            Ok(Self {
                top_filter: Mutex::new(top_filter),
                logging_mod: logging.into(),
            })
        }

        fn py_level(level: log::Level) -> u32 {
            match level {
                log::Level::Error => 40,
                log::Level::Warn => 30,
                log::Level::Info => 20,
                log::Level::Debug => 10,
                log::Level::Trace => 5,
            }
        }

        fn top(&self) -> LevelFilter {
            self.top_filter
                .lock()
                .map(|lf| *lf)
                .unwrap_or(LevelFilter::Off)
        }
    }

    impl Log for PyLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level().to_level_filter() <= self.top()
        }

        fn log(&self, record: &Record) {
            if !self.enabled(record.metadata()) {
                return;
            }
            let target = record.target().replace("::", ".");
            let message = record.args().to_string();
            let level = Self::py_level(record.level());

            Python::attach(|py| {
                let result = self
                    .logging_mod
                    .bind(py)
                    .getattr("getLogger")
                    .and_then(|get| get.call1((target.as_str(),)))
                    .and_then(|logger| logger.call_method1("log", (level, message)));
                if let Err(e) = result {
                    e.restore(py);
                }
            });
        }

        fn flush(&self) {}
    }

    /// Route Rust logs into Python's `logging`. Installs once; later calls are no-ops.
    pub fn init_python_logging(py: Python<'_>) -> PyResult<()> {
        let level = env_level();
        let mut failure = None;
        PY_LOG_ONCE.call_once(|| match PyLogger::new(py, level) {
            Ok(logger) => {
                let leaked: &'static PyLogger = Box::leak(Box::new(logger));
                if log::set_logger(leaked).is_ok() {
                    log::set_max_level(level);
                    let _ = PY_LOGGER.set(leaked);
                }
            }
            Err(e) => failure = Some(e),
        });
        failure.map_or(Ok(()), Err)
    }

    /// Change the minimum level forwarded to Python.
    pub fn set_python_log_level(py: Python<'_>, level: LevelFilter) -> PyResult<()> {
        init_python_logging(py)?;
        if let Some(logger) = PY_LOGGER.get() {
            if let Ok(mut lf) = logger.top_filter.lock() {
                *lf = level;
            }
        }
        log::set_max_level(level);
        Ok(())
    }

    /// Parse a level name (falling back to the environment) and apply it.
    pub fn set_python_log_level_str(py: Python<'_>, level: Option<&str>) -> PyResult<()> {
        let lvl = level
            .and_then(max_level)
            .unwrap_or_else(env_level);
        set_python_log_level(py, lvl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn bridge_variable_wins_over_rust_log() {
        let both = [(LOG_ENV, "debug"), (FALLBACK_LOG_ENV, "error")];
        assert_eq!(filter_spec(lookup(&both)).as_deref(), Some("debug"));

        let fallback = [(FALLBACK_LOG_ENV, "error")];
        assert_eq!(filter_spec(lookup(&fallback)).as_deref(), Some("error"));

        let blank = [(LOG_ENV, "  ")];
        assert_eq!(filter_spec(lookup(&blank)), None);
        assert_eq!(filter_spec(lookup(&[])), None);
    }

    #[test]
    fn threshold_follows_the_most_verbose_directive() {
        assert_eq!(max_level("warn"), Some(LevelFilter::Warn));
        assert_eq!(
            max_level("warn,mcp2221_rs::transfer=trace"),
            Some(LevelFilter::Trace)
        );
        assert_eq!(max_level("mcp2221_rs=debug"), Some(LevelFilter::Debug));
        assert_eq!(max_level("mcp2221_rs"), Some(LevelFilter::Trace));
        assert_eq!(max_level("off/cancel"), Some(LevelFilter::Off));
        assert_eq!(max_level("mcp2221_rs=loud"), None);
        assert_eq!(max_level(""), None);
    }

    #[test]
    fn init_is_idempotent() {
        init_rust_logging();
        init_rust_logging();
        log::debug!("logging initialised twice without panicking");
    }
}
