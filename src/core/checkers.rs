//! The checker capability contract and the pipeline plumbing around it.
//!
//! A checker is a plugin with defaulted lifecycle hooks; one that also
//! implements the optional map/reduce capability may defer emission until it
//! has seen data from every file of the run. Pipelines are always rebuilt
//! from a serializable [`TaskConfig`] snapshot rather than shipped live, so
//! a worker and the coordinator construct exactly the same checker set.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::config::NornConfig;
use crate::core::errors::{NornError, Result};
use crate::core::msgs::{
    Confidence, Location, Message, MessageCatalog, MessageDefinition, MessageScope,
};
use crate::core::state::{EmissionDecision, MessageStateTracker};
use crate::core::stats::RunStats;
use crate::lang::{AstNode, ParsedModule};

/// Name under which the driver registers its own messages.
pub const DRIVER_CHECKER: &str = "main";

/// Symbol of the fatal diagnostic emitted when a file fails to parse.
pub const SYNTAX_ERROR: &str = "syntax-error";
/// Symbol of the diagnostic emitted when a `skip-file` pragma fires.
pub const FILE_IGNORED: &str = "file-ignored";
/// Symbol of the diagnostic emitted for pragmas that suppressed nothing.
pub const USELESS_SUPPRESSION: &str = "useless-suppression";

/// Emission context threaded through every checker hook.
///
/// Routes each attempted message through the state tracker (confidence
/// filter, version gate, pragma intervals, package axis) and keeps the
/// per-phase message list and statistics fragment.
pub struct CheckContext<'a> {
    tracker: &'a mut MessageStateTracker,
    module: String,
    display_path: String,
    abspath: PathBuf,
    obj_stack: Vec<String>,
    messages: Vec<Message>,
    stats: RunStats,
}

impl<'a> CheckContext<'a> {
    /// Context for checking one module.
    pub fn for_module(
        tracker: &'a mut MessageStateTracker,
        module: &str,
        display_path: &str,
        abspath: &Path,
    ) -> Self {
        CheckContext {
            tracker,
            module: module.to_string(),
            display_path: display_path.to_string(),
            abspath: abspath.to_path_buf(),
            obj_stack: Vec::new(),
            messages: Vec::new(),
            stats: RunStats::new(),
        }
    }

    /// Context for run-level phases (checker close, reduce) where no module
    /// is current; only the package axis applies.
    pub fn for_run(tracker: &'a mut MessageStateTracker) -> Self {
        Self::for_module(tracker, "", "", Path::new(""))
    }

    /// Attempt to emit a message anchored at a line of the current module.
    pub fn add_message(
        &mut self,
        symbol: &str,
        line: usize,
        column: usize,
        text: impl Into<String>,
        confidence: Confidence,
    ) {
        self.add_message_at(
            symbol,
            &self.module.clone(),
            &self.display_path.clone(),
            line,
            column,
            text,
            confidence,
        );
    }

    /// Attempt to emit a message against an explicit module and path (used by
    /// reduce phases, which report into files the coordinator never walked).
    #[allow(clippy::too_many_arguments)]
    pub fn add_message_at(
        &mut self,
        symbol: &str,
        module: &str,
        path: &str,
        line: usize,
        column: usize,
        text: impl Into<String>,
        confidence: Confidence,
    ) {
        let line_scope = if module == self.module { Some(line) } else { None };
        match self.tracker.resolve_emission(symbol, line_scope, Some(confidence)) {
            EmissionDecision::Emit => {}
            EmissionDecision::SuppressedByPragma(_) | EmissionDecision::Disabled => return,
        }
        let def = match self.tracker.catalog().resolve(symbol) {
            Ok(defs) => defs[0],
            Err(_) => {
                warn!(symbol, "checker emitted an unregistered message");
                return;
            }
        };
        let message = Message {
            msg_id: def.id.clone(),
            symbol: def.symbol.clone(),
            text: text.into(),
            confidence,
            location: Location {
                abspath: self.abspath.clone(),
                path: path.to_string(),
                module: module.to_string(),
                obj: self.obj_stack.last().cloned().unwrap_or_default(),
                line,
                column,
                end_line: None,
                end_column: None,
            },
        };
        self.stats
            .record(message.category(), &message.symbol, module);
        self.messages.push(message);
    }

    /// Emit `useless-suppression` for every disable pragma of the current
    /// module that suppressed nothing. Goes through normal emission
    /// resolution, so the diagnostic can itself be pragma-suppressed.
    pub fn flush_useless_suppressions(&mut self) {
        for (symbol, line) in self.tracker.useless_suppressions() {
            self.add_message(
                USELESS_SUPPRESSION,
                line,
                0,
                format!("Useless suppression of '{symbol}'"),
                Confidence::High,
            );
        }
    }

    /// Enter a named scope during the AST walk.
    pub fn push_obj(&mut self, name: &str) {
        self.obj_stack.push(name.to_string());
    }

    /// Leave the innermost named scope.
    pub fn pop_obj(&mut self) {
        self.obj_stack.pop();
    }

    /// The module currently being checked (empty for run-level contexts).
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Tear down into emitted messages and the statistics fragment.
    pub fn into_parts(self) -> (Vec<Message>, RunStats) {
        (self.messages, self.stats)
    }
}

/// Optional capability for checkers whose findings depend on all files.
///
/// A checker implementing this must produce zero diagnostics from its
/// per-file pass; everything it wants to say is deferred to [`reduce`],
/// which runs exactly once, on a coordinator-side instance, over the
/// fragments collected from every file of the run.
///
/// [`reduce`]: MapReduce::reduce
pub trait MapReduce {
    /// Drain the opaque data fragment accumulated since the last call.
    fn map_data(&mut self) -> Result<serde_json::Value>;

    /// Consume the consolidated fragments of the whole run and emit.
    fn reduce(
        &mut self,
        fragments: Vec<serde_json::Value>,
        ctx: &mut CheckContext<'_>,
    ) -> Result<()>;
}

/// The contract every analysis plugin implements.
///
/// All hooks default to no-ops: a token checker overrides
/// [`process_tokens`], a node checker overrides [`visit`]/[`leave`], and a
/// checker that defines no map-data hook is safe to run independently per
/// file with no consolidation step.
///
/// [`process_tokens`]: Checker::process_tokens
/// [`visit`]: Checker::visit
/// [`leave`]: Checker::leave
pub trait Checker: Send {
    /// Stable checker name, also the key for map-data consolidation.
    fn name(&self) -> &'static str;

    /// Message definitions this checker may emit.
    fn messages(&self) -> Vec<MessageDefinition>;

    /// Called once per run before any file is checked.
    fn open(&mut self) {}

    /// Token-level pass over one module.
    fn process_tokens(&mut self, _module: &ParsedModule, _ctx: &mut CheckContext<'_>) {}

    /// Called for each AST node, parents before children.
    fn visit(&mut self, _node: &AstNode, _ctx: &mut CheckContext<'_>) {}

    /// Called for each AST node after its children.
    fn leave(&mut self, _node: &AstNode, _ctx: &mut CheckContext<'_>) {}

    /// Called once per run after the last file, in reverse open order.
    fn close(&mut self, _ctx: &mut CheckContext<'_>) {}

    /// The optional map/reduce capability.
    fn as_map_reduce(&mut self) -> Option<&mut dyn MapReduce> {
        None
    }
}

/// Serializable snapshot of "what to run": the checker names plus the full
/// configuration. Workers and the coordinator rebuild identical pipelines
/// from this value instead of sharing live checker objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Names of the checkers to instantiate, in registration order
    pub checkers: Vec<String>,
    /// Full run configuration
    pub config: NornConfig,
}

/// Factory function constructing one checker from configuration.
pub type CheckerFactory = fn(&NornConfig) -> Box<dyn Checker>;

/// Registry of known checker factories, keyed by checker name.
#[derive(Default)]
pub struct CheckerRegistry {
    factories: IndexMap<String, CheckerFactory>,
}

impl CheckerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the bundled checkers.
    pub fn with_builtin_checkers() -> Self {
        let mut registry = Self::new();
        registry.register("raw", |config| {
            Box::new(crate::detectors::raw::RawChecker::new(&config.raw))
        });
        registry.register("similarity", |config| {
            Box::new(crate::detectors::similarity::DuplicateLineDetector::new(
                config.similarity.clone(),
            ))
        });
        registry
    }

    /// Register a factory under a checker name.
    pub fn register(&mut self, name: &str, factory: CheckerFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    /// All registered checker names, in registration order.
    pub fn checker_names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Snapshot a task configuration covering every registered checker.
    pub fn task_config(&self, config: &NornConfig) -> TaskConfig {
        TaskConfig {
            checkers: self.checker_names(),
            config: config.clone(),
        }
    }

    /// Instantiate the pipeline a task configuration describes.
    pub fn build_pipeline(&self, task: &TaskConfig) -> Result<Vec<Box<dyn Checker>>> {
        task.checkers
            .iter()
            .map(|name| {
                self.factories
                    .get(name)
                    .map(|factory| factory(&task.config))
                    .ok_or_else(|| {
                        NornError::config_field(format!("unknown checker '{name}'"), "checkers")
                    })
            })
            .collect()
    }
}

/// A reconstructed checking session: catalog, tracker, and pipeline, all
/// derived from one task configuration.
pub struct Session {
    /// The message catalog, immutable after this point
    pub catalog: Arc<MessageCatalog>,
    /// Message-state tracker seeded from the configuration
    pub tracker: MessageStateTracker,
    /// Instantiated checker pipeline
    pub checkers: Vec<Box<dyn Checker>>,
}

impl Session {
    /// Build a session from a task configuration.
    ///
    /// Registration problems (malformed ids, collisions, inconsistent
    /// checker numbers) surface here, before any file is touched.
    pub fn build(registry: &CheckerRegistry, task: &TaskConfig) -> Result<Session> {
        task.config.validate()?;
        let mut checkers = registry.build_pipeline(task)?;

        let mut catalog = MessageCatalog::new();
        for def in driver_messages() {
            catalog.register(DRIVER_CHECKER, def)?;
        }
        for checker in &mut checkers {
            for def in checker.messages() {
                catalog.register(checker.name(), def)?;
            }
        }

        let catalog = Arc::new(catalog);
        let tracker = MessageStateTracker::new(
            Arc::clone(&catalog),
            &task.config.messages,
            NornConfig::tool_version(),
        )?;
        Ok(Session {
            catalog,
            tracker,
            checkers,
        })
    }
}

/// Messages the driver itself emits.
fn driver_messages() -> Vec<MessageDefinition> {
    vec![
        MessageDefinition::new(
            "F0001",
            SYNTAX_ERROR,
            "The file could not be parsed; nothing else was checked",
            MessageScope::Line,
        )
        .expect("static definition"),
        MessageDefinition::new(
            "I0001",
            FILE_IGNORED,
            "A skip-file pragma ended analysis of this module",
            MessageScope::Line,
        )
        .expect("static definition"),
        MessageDefinition::new(
            "I0002",
            USELESS_SUPPRESSION,
            "A disable pragma suppressed no diagnostics in its interval",
            MessageScope::Line,
        )
        .expect("static definition"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_config_round_trips_through_json() {
        let registry = CheckerRegistry::with_builtin_checkers();
        let task = registry.task_config(&NornConfig::default());

        let json = serde_json::to_string(&task).unwrap();
        let restored: TaskConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, task);

        let session = Session::build(&registry, &restored).unwrap();
        assert_eq!(session.checkers.len(), 2);
        assert!(session.catalog.resolve("duplicate-lines").is_ok());
        assert!(session.catalog.resolve(SYNTAX_ERROR).is_ok());
    }

    #[test]
    fn unknown_checker_name_is_a_config_error() {
        let registry = CheckerRegistry::with_builtin_checkers();
        let task = TaskConfig {
            checkers: vec!["no-such-checker".to_string()],
            config: NornConfig::default(),
        };
        assert!(matches!(
            Session::build(&registry, &task),
            Err(NornError::Config { .. })
        ));
    }

    #[test]
    fn context_routes_messages_through_state() {
        let registry = CheckerRegistry::with_builtin_checkers();
        let task = TaskConfig {
            checkers: vec!["raw".to_string()],
            config: NornConfig {
                messages: crate::core::config::MessagesConfig {
                    disable: vec!["trailing-whitespace".to_string()],
                    ..Default::default()
                },
                ..Default::default()
            },
        };
        let mut session = Session::build(&registry, &task).unwrap();
        session.tracker.start_module("m", 10);

        let mut ctx =
            CheckContext::for_module(&mut session.tracker, "m", "m.nn", Path::new("/tmp/m.nn"));
        ctx.add_message("line-too-long", 1, 0, "too long", Confidence::High);
        ctx.add_message("trailing-whitespace", 2, 0, "trailing", Confidence::High);

        let (messages, stats) = ctx.into_parts();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].symbol, "line-too-long");
        assert_eq!(stats.total_messages(), 1);
    }
}
