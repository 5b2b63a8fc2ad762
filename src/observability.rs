//! Logging hooks for the codec layer.
//!
//! Codecs log through the `log` facade only. Applications that do not install
//! a logger pay nothing; `init_logging` is the convenience hook that installs
//! an `env_logger` once with the same terse `[LEVEL] message` format used by
//! the rest of the tambak tooling.

use std::fs::OpenOptions;
use std::sync::Once;

use log::LevelFilter;

use crate::error::Result;

static INIT_LOGGER: Once = Once::new();

/// Logs a structured key-value metric line at debug level.
///
/// # Example
/// ```
/// use tambak_stream::log_metric;
/// let rows = 4;
/// log_metric!("event"="resume", "codec"="flag32", "rows"=&rows);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if $crate::log::log_enabled!($crate::log::Level::Debug) {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            $crate::log::debug!("TAMBAK_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

/// Installs a process-wide logger at `level`, optionally appending to `log_file`.
///
/// Only the first call has any effect; later calls return `Ok(())` without
/// touching the installed logger.
pub fn init_logging(level: LevelFilter, log_file: Option<&str>) -> Result<()> {
    let target = match log_file {
        Some(path) => Some(OpenOptions::new().append(true).create(true).open(path)?),
        None => None,
    };

    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.is_test(false);
        builder.filter_level(level);
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())
        });
        if let Some(file) = target {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        let _ = builder.try_init();
    });
    Ok(())
}
