//! Injected logging for the tunnel core.
//!
//! The tunnel never reaches for a process-wide logger on its own. It is handed
//! a [`TunnelLogger`] at construction, which forwards one-line records to any
//! [`log::Log`] sink. [`TunnelLogger::global`] wires it to whatever the binary
//! installed with `env_logger`.

use std::fmt;
use std::sync::Arc;

use log::{Level, Log, Metadata, Record};

const TARGET: &str = "sshfwd::tunnel";

/// Cheap-to-clone handle to a log sink.
#[derive(Clone)]
pub struct TunnelLogger {
    sink: Arc<dyn Log>,
}

impl TunnelLogger {
    pub fn new(sink: Arc<dyn Log>) -> Self {
        Self { sink }
    }

    /// Forward to the logger installed through the `log` facade.
    pub fn global() -> Self {
        Self::new(Arc::new(Facade))
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Error, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Warn, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Info, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Debug, args);
    }

    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder().level(level).target(TARGET).build();
        if !self.sink.enabled(&metadata) {
            return;
        }
        self.sink.log(
            &Record::builder()
                .metadata(metadata)
                .args(args)
                .module_path_static(Some(module_path!()))
                .build(),
        );
    }
}

impl Default for TunnelLogger {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Debug for TunnelLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelLogger").finish_non_exhaustive()
    }
}

/// Sink that defers to `log::logger()` at call time.
struct Facade;

impl Log for Facade {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        log::logger().log(record)
    }

    fn flush(&self) {
        log::logger().flush()
    }
}
