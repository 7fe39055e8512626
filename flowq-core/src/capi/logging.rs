//! Logging bootstrap for embedders.
//!
//! `capi_init` installs the tracing subscriber at a numeric level and can
//! forward every formatted log line to a C callback. Without a callback,
//! lines go to stderr as usual.

use std::ffi::{c_char, c_int, CString};
use std::io::{self, Write};
use std::sync::RwLock;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

use crate::error::{STATUS_INVALID_ARGUMENT, STATUS_OK, STATUS_OS_ERROR};

/// Receives one formatted log line per event. The message pointer is only
/// valid for the duration of the call.
pub type LogCallback = extern "C" fn(level: c_int, message: *const c_char);

static CALLBACK: RwLock<Option<LogCallback>> = RwLock::new(None);

fn level_to_int(level: Level) -> c_int {
    match level {
        Level::TRACE => 0,
        Level::DEBUG => 1,
        Level::INFO => 2,
        Level::WARN => 3,
        Level::ERROR => 4,
    }
}

struct CapiWriter {
    level: Level,
}

impl Write for CapiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let callback = *CALLBACK.read().expect("log callback lock poisoned");
        match callback {
            Some(callback) => {
                let line = String::from_utf8_lossy(buf);
                if let Ok(message) = CString::new(line.trim_end().as_bytes()) {
                    callback(level_to_int(self.level), message.as_ptr());
                }
            }
            None => io::stderr().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct CapiMakeWriter;

impl<'a> MakeWriter<'a> for CapiMakeWriter {
    type Writer = CapiWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapiWriter {
            level: Level::INFO,
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        CapiWriter {
            level: *meta.level(),
        }
    }
}

/// Install the tracing subscriber for the C surface.
///
/// Levels: 0 trace, 1 debug, 2 info, 3 warn, 4 error, 5 off. A non-null
/// `callback` receives every formatted line instead of stderr.
#[no_mangle]
pub extern "C" fn capi_init(level: c_int, callback: Option<LogCallback>) -> u8 {
    let max_level = match level {
        0 => tracing_subscriber::filter::LevelFilter::TRACE,
        1 => tracing_subscriber::filter::LevelFilter::DEBUG,
        2 => tracing_subscriber::filter::LevelFilter::INFO,
        3 => tracing_subscriber::filter::LevelFilter::WARN,
        4 => tracing_subscriber::filter::LevelFilter::ERROR,
        5 => tracing_subscriber::filter::LevelFilter::OFF,
        _ => return STATUS_INVALID_ARGUMENT,
    };

    *CALLBACK.write().expect("log callback lock poisoned") = callback;

    let result = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_writer(CapiMakeWriter)
        .with_ansi(false)
        .try_init();
    match result {
        Ok(()) => STATUS_OK,
        Err(_) => STATUS_OS_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping_is_total() {
        assert_eq!(level_to_int(Level::TRACE), 0);
        assert_eq!(level_to_int(Level::ERROR), 4);
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        assert_eq!(capi_init(42, None), STATUS_INVALID_ARGUMENT);
    }
}
