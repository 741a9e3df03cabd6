//! Human-readable log of one action run

use std::io::Write;

/// Sink for the lines a run reports to whoever triggered it
pub trait ActionLog {
    fn line(&mut self, message: &str);
}

impl ActionLog for Vec<String> {
    fn line(&mut self, message: &str) {
        self.push(message.to_string());
    }
}

/// Writes lines to standard output
#[derive(Debug, Default)]
pub struct StdoutLog;

impl ActionLog for StdoutLog {
    fn line(&mut self, message: &str) {
        let mut out = std::io::stdout().lock();
        // Nowhere left to report a broken stdout
        let _ = writeln!(out, "{}", message);
    }
}

/// Write an error and its source chain, one cause per line
pub fn log_error_chain(log: &mut dyn ActionLog, error: &(dyn std::error::Error + 'static)) {
    log.line(&error.to_string());
    let mut source = error.source();
    while let Some(cause) = source {
        log.line(&format!("  caused by: {}", cause));
        source = cause.source();
    }
}
