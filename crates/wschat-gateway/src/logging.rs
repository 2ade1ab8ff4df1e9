//! Operator log lines
//!
//! The server reports lifecycle and chat activity to an injected [`LogSink`]. Whatever
//! displays those lines (a window, a terminal) lives outside this crate.

use std::fmt;

/// Severity of an operator log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Receiver of operator log lines
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str, severity: Severity);
}

impl<F> LogSink for F
where
    F: Fn(&str, Severity) + Send + Sync,
{
    fn log(&self, message: &str, severity: Severity) {
        self(message, severity);
    }
}

/// Forwards operator log lines to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => tracing::info!(target: "wschat::operator", "{message}"),
            Severity::Warning => tracing::warn!(target: "wschat::operator", "{message}"),
            Severity::Error => tracing::error!(target: "wschat::operator", "{message}"),
        }
    }
}
