//! Sequential check driver.
//!
//! Walks the input files in argument order, drives every checker through its
//! lifecycle, resolves each emitted diagnostic through the state tracker,
//! and aggregates run statistics. A parse failure degrades to a single fatal
//! diagnostic for that file; it never aborts the run. The per-file routine
//! here is also the body each parallel worker executes, so both paths
//! produce identical per-file results by construction.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::checkers::{
    CheckContext, Checker, CheckerRegistry, Session, FILE_IGNORED, SYNTAX_ERROR,
};
use crate::core::config::NornConfig;
use crate::core::errors::{NornError, Result};
use crate::core::msgs::{Confidence, Message};
use crate::core::reporter::Reporter;
use crate::core::state::MessageStateTracker;
use crate::core::stats::RunStats;
use crate::lang::{module_name_for, AstNode, ModuleParser};

/// Final result of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Aggregated statistics
    pub stats: RunStats,
    /// Bit-ORed category flags of every emitted message
    pub exit_flags: i32,
}

impl RunOutcome {
    /// The process exit code this run maps to.
    pub fn exit_code(&self) -> i32 {
        self.exit_flags
    }
}

/// Everything one checked file contributes to the run. Crosses the
/// worker/coordinator boundary by value, so it stays serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    /// Module name
    pub module: String,
    /// Display path
    pub display_path: String,
    /// Absolute path
    pub abspath: PathBuf,
    /// Diagnostics emitted for this file, in emission order
    pub messages: Vec<Message>,
    /// Statistics fragment for this file
    pub stats: RunStats,
    /// Opaque map-data fragments, one per map-reduce checker, keyed by
    /// checker name
    pub fragments: Vec<(String, serde_json::Value)>,
}

/// Check one file with an already-built pipeline.
///
/// Handles its own per-file failure modes (parse errors, skip-file pragmas)
/// by degrading them to diagnostics; an `Err` from here means the pipeline
/// itself broke and the run cannot be trusted.
pub(crate) fn check_file(
    parser: &dyn ModuleParser,
    checkers: &mut [Box<dyn Checker>],
    tracker: &mut MessageStateTracker,
    path: &Path,
) -> Result<FileOutcome> {
    let display_path = path.display().to_string();
    let abspath = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let module = module_name_for(path);

    let parsed = match parser.parse_file(path, &display_path) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(path = %display_path, error = %err, "parse failure degraded to diagnostic");
            let (line, column) = match &err {
                NornError::Parse { line, column, .. } => (line.unwrap_or(1), column.unwrap_or(0)),
                _ => (1, 0),
            };
            let mut ctx = CheckContext::for_module(tracker, &module, &display_path, &abspath);
            ctx.add_message(SYNTAX_ERROR, line, column, err.to_string(), Confidence::High);
            let (messages, mut stats) = ctx.into_parts();
            stats.module_checked(&module);
            return Ok(FileOutcome {
                module,
                display_path,
                abspath,
                messages,
                stats,
                fragments: Vec::new(),
            });
        }
    };

    tracker.start_module(&parsed.module, parsed.last_covered_line());
    if let Some(skip_line) = tracker.apply_pragmas(&parsed) {
        tracker.abandon_module();
        let mut ctx = CheckContext::for_module(tracker, &parsed.module, &display_path, &abspath);
        ctx.add_message(
            FILE_IGNORED,
            skip_line,
            0,
            format!("Ignoring module '{}'", parsed.module),
            Confidence::High,
        );
        let (messages, mut stats) = ctx.into_parts();
        stats.module_checked(&parsed.module);
        return Ok(FileOutcome {
            module: parsed.module,
            display_path,
            abspath,
            messages,
            stats,
            fragments: Vec::new(),
        });
    }

    let mut ctx = CheckContext::for_module(tracker, &parsed.module, &display_path, &abspath);
    for checker in checkers.iter_mut() {
        checker.process_tokens(&parsed, &mut ctx);
    }
    walk(&parsed.ast, checkers, &mut ctx);
    ctx.flush_useless_suppressions();
    let (messages, mut stats) = ctx.into_parts();
    tracker.end_module();
    stats.module_checked(&parsed.module);

    let mut fragments = Vec::new();
    for checker in checkers.iter_mut() {
        let name = checker.name();
        if let Some(mr) = checker.as_map_reduce() {
            fragments.push((name.to_string(), mr.map_data()?));
        }
    }

    Ok(FileOutcome {
        module: parsed.module,
        display_path,
        abspath,
        messages,
        stats,
        fragments,
    })
}

/// Depth-first walk: visit hooks parents-first, leave hooks children-first.
/// Named blocks contribute the enclosing-object name of emitted messages.
fn walk(node: &AstNode, checkers: &mut [Box<dyn Checker>], ctx: &mut CheckContext<'_>) {
    for checker in checkers.iter_mut() {
        checker.visit(node, ctx);
    }
    let named = node.kind == "block" && node.name.is_some();
    if named {
        if let Some(name) = &node.name {
            ctx.push_obj(name);
        }
    }
    for child in &node.children {
        walk(child, checkers, ctx);
    }
    if named {
        ctx.pop_obj();
    }
    for checker in checkers.iter_mut() {
        checker.leave(node, ctx);
    }
}

/// Forward messages to the reporter, returning their combined exit bits.
pub(crate) fn forward_messages(messages: &[Message], reporter: &mut dyn Reporter) -> i32 {
    let mut flags = 0;
    for message in messages {
        flags |= message.category().exit_bit();
        reporter.handle_message(message);
    }
    flags
}

/// Group collected map fragments by checker name, preserving first-seen
/// order, then run each contributing checker's reduce exactly once.
pub(crate) fn reduce_fragments(
    fragments: Vec<(String, serde_json::Value)>,
    checkers: &mut [Box<dyn Checker>],
    tracker: &mut MessageStateTracker,
) -> Result<(Vec<Message>, RunStats)> {
    let mut grouped: IndexMap<String, Vec<serde_json::Value>> = IndexMap::new();
    for (name, fragment) in fragments {
        grouped.entry(name).or_default().push(fragment);
    }

    let mut ctx = CheckContext::for_run(tracker);
    for (name, group) in grouped {
        let checker = checkers
            .iter_mut()
            .find(|c| c.name() == name)
            .ok_or_else(|| {
                NornError::internal(format!("map data arrived for unknown checker '{name}'"))
            })?;
        let mr = checker.as_map_reduce().ok_or_else(|| {
            NornError::internal(format!("checker '{name}' contributed map data but cannot reduce"))
        })?;
        debug!(checker = %name, fragments = group.len(), "reducing");
        mr.reduce(group, &mut ctx)?;
    }
    Ok(ctx.into_parts())
}

/// Single-process check driver.
pub struct SequentialDriver<'a> {
    parser: &'a dyn ModuleParser,
    session: Session,
}

impl<'a> SequentialDriver<'a> {
    /// Build a driver running every checker the registry knows.
    pub fn new(
        config: &NornConfig,
        registry: &CheckerRegistry,
        parser: &'a dyn ModuleParser,
    ) -> Result<Self> {
        let task = registry.task_config(config);
        let session = Session::build(registry, &task)?;
        Ok(SequentialDriver { parser, session })
    }

    /// Build a driver from an explicit session.
    pub fn with_session(session: Session, parser: &'a dyn ModuleParser) -> Self {
        SequentialDriver { parser, session }
    }

    /// Check every file in argument order and report.
    pub fn run(&mut self, files: &[PathBuf], reporter: &mut dyn Reporter) -> Result<RunOutcome> {
        info!(files = files.len(), "starting sequential run");
        let mut stats = RunStats::new();
        let mut exit_flags = 0;
        let mut fragments: Vec<(String, serde_json::Value)> = Vec::new();

        for checker in &mut self.session.checkers {
            checker.open();
        }

        for path in files {
            let outcome = check_file(
                self.parser,
                &mut self.session.checkers,
                &mut self.session.tracker,
                path,
            )?;
            reporter.on_module_start(&outcome.module, path);
            exit_flags |= forward_messages(&outcome.messages, reporter);
            stats.merge(&outcome.stats);
            fragments.extend(outcome.fragments);
        }

        // Close in reverse open order; close hooks may still emit.
        let mut close_ctx = CheckContext::for_run(&mut self.session.tracker);
        for checker in self.session.checkers.iter_mut().rev() {
            checker.close(&mut close_ctx);
        }
        let (close_messages, close_stats) = close_ctx.into_parts();
        exit_flags |= forward_messages(&close_messages, reporter);
        stats.merge(&close_stats);

        // Consolidation pass: the sequential path runs the same map-reduce
        // protocol as the parallel one, with itself as the only worker.
        let (reduce_messages, reduce_stats) = reduce_fragments(
            fragments,
            &mut self.session.checkers,
            &mut self.session.tracker,
        )?;
        exit_flags |= forward_messages(&reduce_messages, reporter);
        stats.merge(&reduce_stats);

        reporter.on_run_end(&stats, None);
        Ok(RunOutcome { stats, exit_flags })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::core::reporter::CollectingReporter;
    use crate::lang::IndentParser;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn run_over(files: &[PathBuf]) -> (RunOutcome, CollectingReporter) {
        let config = NornConfig::default();
        let registry = CheckerRegistry::with_builtin_checkers();
        let parser = IndentParser::new();
        let mut driver = SequentialDriver::new(&config, &registry, &parser).unwrap();
        let mut reporter = CollectingReporter::new();
        let outcome = driver.run(files, &mut reporter).unwrap();
        (outcome, reporter)
    }

    #[test]
    fn clean_file_produces_no_messages() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "clean.nn", "a = 1\nb = 2\n");
        let (outcome, reporter) = run_over(&[file]);
        assert!(reporter.messages.is_empty());
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.stats.modules_checked, 1);
    }

    #[test]
    fn parse_failure_degrades_and_run_continues() {
        let dir = TempDir::new().unwrap();
        let bad = write_file(&dir, "bad.nn", "a = 1\n    b = 2\n");
        let long = format!("x = \"{}\"\n", "y".repeat(120));
        let good = write_file(&dir, "good.nn", &long);

        let (outcome, reporter) = run_over(&[bad, good]);
        let symbols = reporter.symbols();
        assert!(symbols.contains(&"syntax-error"));
        assert!(symbols.contains(&"line-too-long"));
        assert_eq!(outcome.stats.modules_checked, 2);
        // fatal bit | convention bit
        assert_eq!(outcome.exit_code(), 1 | 16);
    }

    #[test]
    fn missing_file_degrades_to_fatal() {
        let (outcome, reporter) = run_over(&[PathBuf::from("/nonexistent/gone.nn")]);
        assert_eq!(reporter.symbols(), vec!["syntax-error"]);
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn skip_file_pragma_emits_file_ignored_and_checks_nothing_else() {
        let dir = TempDir::new().unwrap();
        let long = "z".repeat(150);
        let file = write_file(
            &dir,
            "skipped.nn",
            &format!("# norn: skip-file\nx = \"{long}\"\n"),
        );
        let (outcome, reporter) = run_over(&[file]);
        assert_eq!(reporter.symbols(), vec!["file-ignored"]);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn pragma_suppresses_and_useless_pragma_is_flagged() {
        let dir = TempDir::new().unwrap();
        let long = "y".repeat(120);
        // Line 2 violates line-too-long but is governed by the pragma on
        // line 1; the pragma on line 3 suppresses nothing.
        let source = format!(
            "# norn: disable=line-too-long\nx = \"{long}\"\n# norn: disable=trailing-whitespace\na = 1\n"
        );
        let file = write_file(&dir, "pragmas.nn", &source);
        let (_, reporter) = run_over(&[file]);
        assert_eq!(reporter.symbols(), vec!["useless-suppression"]);
        assert_eq!(reporter.messages[0].location.line, 3);
    }

    #[test]
    fn useless_suppression_can_itself_be_disabled() {
        let dir = TempDir::new().unwrap();
        let source =
            "# norn: disable=useless-suppression\n# norn: disable=trailing-whitespace\na = 1\n";
        let file = write_file(&dir, "meta.nn", source);
        let (_, reporter) = run_over(&[file]);
        assert!(reporter.messages.is_empty());
    }

    // Minimal node checker used to exercise AST dispatch and scope names.
    struct StatementCounter;

    impl Checker for StatementCounter {
        fn name(&self) -> &'static str {
            "stmt-counter"
        }

        fn messages(&self) -> Vec<crate::core::msgs::MessageDefinition> {
            vec![crate::core::msgs::MessageDefinition::new(
                "W5001",
                "noted-statement",
                "Fires on every statement node",
                crate::core::msgs::MessageScope::Node,
            )
            .unwrap()]
        }

        fn visit(&mut self, node: &AstNode, ctx: &mut CheckContext<'_>) {
            if node.kind == "statement" {
                ctx.add_message(
                    "noted-statement",
                    node.line,
                    node.column,
                    "statement seen",
                    Confidence::High,
                );
            }
        }
    }

    fn statement_counter(_config: &NornConfig) -> Box<dyn Checker> {
        Box::new(StatementCounter)
    }

    #[test]
    fn exit_bits_accumulate_across_categories() {
        let dir = TempDir::new().unwrap();
        let long = "q".repeat(120);
        let file = write_file(&dir, "mixed.nn", &format!("x = \"{long}\"\n"));

        let config = NornConfig::default();
        let mut registry = CheckerRegistry::with_builtin_checkers();
        registry.register("stmt-counter", statement_counter);
        let parser = IndentParser::new();
        let mut driver = SequentialDriver::new(&config, &registry, &parser).unwrap();
        let mut reporter = CollectingReporter::new();
        let outcome = driver.run(&[file], &mut reporter).unwrap();

        // One warning (noted-statement) and one convention (line-too-long).
        assert_eq!(outcome.exit_code(), 4 | 16);
    }

    #[test]
    fn node_checkers_see_enclosing_object_names() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "objs.nn", "def handler():\n    x = 1\ny = 2\n");

        let config = NornConfig::default();
        let mut registry = CheckerRegistry::new();
        registry.register("stmt-counter", statement_counter);
        let parser = IndentParser::new();
        let mut driver = SequentialDriver::new(&config, &registry, &parser).unwrap();
        let mut reporter = CollectingReporter::new();
        driver.run(&[file], &mut reporter).unwrap();

        // Statement inside the block carries the block name; the top-level
        // statement does not.
        let inner = reporter
            .messages
            .iter()
            .find(|m| m.location.line == 2)
            .unwrap();
        assert_eq!(inner.location.obj, "handler");
        let top = reporter
            .messages
            .iter()
            .find(|m| m.location.line == 3)
            .unwrap();
        assert_eq!(top.location.obj, "");
    }
}
