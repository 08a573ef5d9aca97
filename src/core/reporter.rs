//! Message sinks and the exit-status contract.
//!
//! Reporters receive messages as they are resolved; the driver may fan one
//! run out to several sinks. The exit status is bit-ORed across the whole
//! run, one independent bit per category, with a distinct non-bit value
//! reserved for usage errors.

use std::io::Write;
use std::path::Path;

use crate::core::msgs::Message;
use crate::core::stats::RunStats;

/// Exit status reserved for usage errors (bad arguments, missing files).
pub const USAGE_EXIT: i32 = 32;

/// A sink for run output.
pub trait Reporter {
    /// A new module is about to be reported.
    fn on_module_start(&mut self, _module: &str, _path: &Path) {}

    /// One resolved, enabled message.
    fn handle_message(&mut self, message: &Message);

    /// The run finished; `previous` carries the stats of an earlier run when
    /// the caller kept them.
    fn on_run_end(&mut self, _stats: &RunStats, _previous: Option<&RunStats>) {}
}

/// Fan-out reporter driving any number of sinks.
#[derive(Default)]
pub struct ReporterMux {
    sinks: Vec<Box<dyn Reporter>>,
}

impl ReporterMux {
    /// Create an empty mux.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn add(&mut self, sink: Box<dyn Reporter>) {
        self.sinks.push(sink);
    }
}

impl Reporter for ReporterMux {
    fn on_module_start(&mut self, module: &str, path: &Path) {
        for sink in &mut self.sinks {
            sink.on_module_start(module, path);
        }
    }

    fn handle_message(&mut self, message: &Message) {
        for sink in &mut self.sinks {
            sink.handle_message(message);
        }
    }

    fn on_run_end(&mut self, stats: &RunStats, previous: Option<&RunStats>) {
        for sink in &mut self.sinks {
            sink.on_run_end(stats, previous);
        }
    }
}

/// Plain-text reporter in `path:line:col: ID: text (symbol)` form.
pub struct TextReporter<W: Write> {
    out: W,
}

impl TextReporter<std::io::Stdout> {
    /// Text reporter writing to stdout.
    pub fn stdout() -> Self {
        TextReporter {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> TextReporter<W> {
    /// Text reporter writing to an arbitrary sink.
    pub fn new(out: W) -> Self {
        TextReporter { out }
    }
}

impl<W: Write> Reporter for TextReporter<W> {
    fn on_module_start(&mut self, module: &str, _path: &Path) {
        let _ = writeln!(self.out, "************* Module {module}");
    }

    fn handle_message(&mut self, message: &Message) {
        let loc = &message.location;
        let _ = writeln!(
            self.out,
            "{}:{}:{}: {}: {} ({})",
            loc.path, loc.line, loc.column, message.msg_id, message.text, message.symbol
        );
    }

    fn on_run_end(&mut self, stats: &RunStats, _previous: Option<&RunStats>) {
        let _ = writeln!(
            self.out,
            "\nChecked {} module(s), {} message(s) emitted.",
            stats.modules_checked,
            stats.total_messages()
        );
    }
}

/// Reporter that keeps everything in memory; used by tests and the library
/// API.
#[derive(Default)]
pub struct CollectingReporter {
    /// Messages in arrival order
    pub messages: Vec<Message>,
    /// Modules announced via `on_module_start`
    pub modules: Vec<String>,
    /// Final stats, set by `on_run_end`
    pub final_stats: Option<RunStats>,
}

impl CollectingReporter {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbols of collected messages, in arrival order.
    pub fn symbols(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.symbol.as_str()).collect()
    }
}

impl Reporter for CollectingReporter {
    fn on_module_start(&mut self, module: &str, _path: &Path) {
        self.modules.push(module.to_string());
    }

    fn handle_message(&mut self, message: &Message) {
        self.messages.push(message.clone());
    }

    fn on_run_end(&mut self, stats: &RunStats, _previous: Option<&RunStats>) {
        self.final_stats = Some(stats.clone());
    }
}
