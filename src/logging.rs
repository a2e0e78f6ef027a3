use std::io::Write;

pub struct Logger;

const LOG_NAME: &str = "PCA-SUMMARIZE";

impl Logger {
    fn format(record: &log::Record) -> String {
        let priority = match record.level() {
            log::Level::Error => "ERROR",
            log::Level::Warn => "WARNING",
            log::Level::Info => "INFO",
            log::Level::Debug => "DEBUG",
            log::Level::Trace => "TRACE",
        };
        format!(
            "{} [{} :: {}] {}",
            priority,
            LOG_NAME,
            record.target(),
            record.args()
        )
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            // The function runtime captures stderr line by line; a failed
            // write has nowhere else to go.
            let _ = writeln!(std::io::stderr().lock(), "{}", Self::format(record));
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install [`Logger`] and set the maximum level.
///
/// Warm invocations reuse the process, so the logger may already be set;
/// only the level is updated then.
pub fn init(level: log::LevelFilter) {
    if log::set_logger(&Logger).is_ok() {
        debug!("logger installed");
    }
    log::set_max_level(level);
}
