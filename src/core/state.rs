//! Per-run and per-module message enablement state.
//!
//! Two independent axes decide whether a diagnostic may be emitted. The
//! package axis is a plain boolean map mutated by `enable`/`disable` calls
//! that accept an id, a symbol, a category letter, a checker name, or `all`.
//! The module axis is populated from inline pragma comments found by a raw
//! token scan; each pragma owns a half-open interval of lines until the next
//! pragma for the same message, the end of its enclosing block, or end of
//! file. Disable pragmas are additionally tracked so that ones which never
//! suppressed anything can be flagged as useless at end of module.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::core::config::MessagesConfig;
use crate::core::errors::Result;
use crate::core::msgs::{Category, Confidence, MessageCatalog, MessageDefinition};
use crate::lang::{ParsedModule, Token, TokenKind};

/// Marker comment prefix that introduces an inline directive.
const PRAGMA_PREFIX: &str = "norn:";

/// Action requested by one pragma comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PragmaAction {
    /// `disable=<names>`
    Disable,
    /// `enable=<names>`
    Enable,
    /// `disable-all` / `skip-file`: stop checking this module entirely
    SkipFile,
}

/// One parsed pragma directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PragmaDirective {
    /// Line the pragma comment sits on
    pub line: usize,
    /// Requested action
    pub action: PragmaAction,
    /// Message names the action applies to (empty for skip-file)
    pub names: Vec<String>,
}

/// Scan comment tokens for pragma directives.
pub fn scan_pragmas(tokens: &[Token]) -> Vec<PragmaDirective> {
    tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Comment)
        .filter_map(|t| parse_pragma(t))
        .collect()
}

fn parse_pragma(token: &Token) -> Option<PragmaDirective> {
    let body = token.text.trim_start_matches('#').trim_start();
    let rest = body.strip_prefix(PRAGMA_PREFIX)?.trim();

    let (action_word, names_part) = match rest.split_once('=') {
        Some((action, names)) => (action.trim(), names),
        None => (rest, ""),
    };
    let action = match action_word {
        "disable" => PragmaAction::Disable,
        "enable" => PragmaAction::Enable,
        "disable-all" | "skip-file" => PragmaAction::SkipFile,
        other => {
            warn!(line = token.line, directive = other, "ignoring unknown pragma");
            return None;
        }
    };
    let names = names_part
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    Some(PragmaDirective {
        line: token.line,
        action,
        names,
    })
}

#[derive(Debug, Clone, Copy)]
struct LineInterval {
    enabled: bool,
    until: usize,
}

#[derive(Debug, Clone)]
struct DisablePragma {
    symbol: String,
    line: usize,
    fired: bool,
}

/// Per-module state, created fresh before a module is walked and discarded
/// (after being queried for unused suppressions) once its check completes.
#[derive(Debug, Default)]
pub struct FileState {
    module: String,
    last_covered_line: usize,
    /// symbol → pragma start line → interval
    line_state: AHashMap<String, BTreeMap<usize, LineInterval>>,
    /// Raw pragma states ignoring block expiry, for the trailing-line
    /// fallback on lines past AST coverage.
    raw_state: AHashMap<String, BTreeMap<usize, bool>>,
    disable_pragmas: Vec<DisablePragma>,
    /// (symbol, emitted line) → responsible pragma line
    suppression_mapping: AHashMap<(String, usize), usize>,
}

impl FileState {
    fn new(module: &str, last_covered_line: usize) -> Self {
        FileState {
            module: module.to_string(),
            last_covered_line,
            ..FileState::default()
        }
    }

    fn set_line_state(&mut self, symbol: &str, line: usize, enabled: bool, until: usize) {
        self.line_state
            .entry(symbol.to_string())
            .or_default()
            .insert(line, LineInterval { enabled, until });
        self.raw_state
            .entry(symbol.to_string())
            .or_default()
            .insert(line, enabled);
        if !enabled {
            self.disable_pragmas.push(DisablePragma {
                symbol: symbol.to_string(),
                line,
                fired: false,
            });
        }
    }

    /// Nearest-preceding pragma state governing `line`, with the pragma line.
    fn query(&self, symbol: &str, line: usize) -> Option<(bool, usize)> {
        if let Some(intervals) = self.line_state.get(symbol) {
            // Nearest preceding pragma whose interval still covers the line;
            // expired block-local pragmas fall through to outer ones.
            for (start, interval) in intervals.range(..=line).rev() {
                if interval.until >= line {
                    return Some((interval.enabled, *start));
                }
            }
        }
        // Lines past AST coverage (trailing comments) fall back to the
        // closest raw pragma state instead of defaulting to enabled.
        if line > self.last_covered_line {
            if let Some(states) = self.raw_state.get(symbol) {
                if let Some((start, enabled)) = states.range(..=line).next_back() {
                    return Some((*enabled, *start));
                }
            }
        }
        None
    }

    fn note_suppression(&mut self, symbol: &str, emitted_line: usize, pragma_line: usize) {
        self.suppression_mapping
            .insert((symbol.to_string(), emitted_line), pragma_line);
        for pragma in &mut self.disable_pragmas {
            if pragma.line == pragma_line && pragma.symbol == symbol {
                pragma.fired = true;
            }
        }
    }

    /// Disable pragmas that suppressed nothing, as `(symbol, pragma line)`.
    fn useless_suppressions(&self) -> Vec<(String, usize)> {
        self.disable_pragmas
            .iter()
            .filter(|p| !p.fired)
            .map(|p| (p.symbol.clone(), p.line))
            .collect()
    }
}

/// Decision for one emission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionDecision {
    /// The message passes all filters
    Emit,
    /// A line pragma at the given line suppressed it
    SuppressedByPragma(usize),
    /// Disabled at package scope, by confidence, or by version gate
    Disabled,
}

/// Resolves enablement per message, per scope, per line for one run.
#[derive(Debug)]
pub struct MessageStateTracker {
    catalog: Arc<MessageCatalog>,
    global: AHashMap<String, bool>,
    confidence_filter: Option<HashSet<Confidence>>,
    tool_version: (u16, u16),
    file_state: Option<FileState>,
}

impl MessageStateTracker {
    /// Build a tracker, applying the configured disable list then enable
    /// list. Unknown names in either list are logged and skipped (they may
    /// be version-gated ids from another tool release).
    pub fn new(
        catalog: Arc<MessageCatalog>,
        config: &MessagesConfig,
        tool_version: (u16, u16),
    ) -> Result<Self> {
        let confidence_filter = match &config.confidence {
            None => None,
            Some(names) => {
                let mut set = HashSet::new();
                for name in names {
                    set.insert(name.parse::<Confidence>()?);
                }
                Some(set)
            }
        };
        let mut tracker = MessageStateTracker {
            catalog,
            global: AHashMap::new(),
            confidence_filter,
            tool_version,
            file_state: None,
        };
        for name in &config.disable {
            tracker.set_status(name, false);
        }
        for name in &config.enable {
            tracker.set_status(name, true);
        }
        Ok(tracker)
    }

    /// Enable a message, category, checker, or `all` at package scope.
    pub fn enable(&mut self, name: &str) {
        self.set_status(name, true);
    }

    /// Disable a message, category, checker, or `all` at package scope.
    pub fn disable(&mut self, name: &str) {
        self.set_status(name, false);
    }

    fn set_status(&mut self, name: &str, enabled: bool) {
        for symbol in self.expand(name) {
            self.global.insert(symbol, enabled);
        }
    }

    /// Expand a user-supplied name into the symbols it covers.
    fn expand(&self, name: &str) -> Vec<String> {
        if name == "all" {
            return Category::ALL
                .iter()
                .flat_map(|c| self.catalog.symbols_for_category(*c))
                .cloned()
                .collect();
        }
        if name.len() == 1 {
            if let Some(category) = Category::from_letter(name.chars().next().unwrap_or(' ')) {
                return self.catalog.symbols_for_category(category).to_vec();
            }
        }
        let by_checker = self.catalog.symbols_for_checker(name);
        if !by_checker.is_empty() {
            return by_checker.to_vec();
        }
        match self.catalog.resolve(name) {
            Ok(defs) => defs.iter().map(|d| d.symbol.clone()).collect(),
            Err(_) => {
                warn!(name, "ignoring unknown message name");
                Vec::new()
            }
        }
    }

    /// Begin tracking a new module; any previous module state is dropped.
    pub fn start_module(&mut self, module: &str, last_covered_line: usize) {
        self.file_state = Some(FileState::new(module, last_covered_line));
    }

    /// Apply all pragma directives found in a parsed module.
    ///
    /// Returns the line of a `skip-file` directive when one asks for the
    /// module to be abandoned entirely.
    pub fn apply_pragmas(&mut self, parsed: &ParsedModule) -> Option<usize> {
        let directives = scan_pragmas(&parsed.tokens);
        for directive in &directives {
            match directive.action {
                PragmaAction::SkipFile => {
                    debug!(module = %parsed.module, line = directive.line, "skip-file pragma");
                    return Some(directive.line);
                }
                PragmaAction::Disable | PragmaAction::Enable => {
                    let enabled = directive.action == PragmaAction::Enable;
                    let until = parsed.ast.enclosing_block_end(directive.line).max(directive.line);
                    for name in &directive.names {
                        for symbol in self.expand(name) {
                            if let Some(state) = self.file_state.as_mut() {
                                state.set_line_state(&symbol, directive.line, enabled, until);
                            }
                        }
                    }
                }
            }
        }
        None
    }

    /// Pure enablement query: confidence filter first, then version gate,
    /// then the line axis (nearest preceding pragma), then the package axis,
    /// defaulting to enabled.
    pub fn is_enabled(
        &self,
        name: &str,
        line: Option<usize>,
        confidence: Option<Confidence>,
    ) -> bool {
        if let (Some(filter), Some(conf)) = (&self.confidence_filter, confidence) {
            if !filter.contains(&conf) {
                return false;
            }
        }
        let defs = match self.catalog.resolve(name) {
            Ok(defs) => defs,
            Err(_) => {
                warn!(name, "enablement query for unknown message");
                return true;
            }
        };
        defs.iter().any(|def| self.def_enabled(def, line))
    }

    fn def_enabled(&self, def: &MessageDefinition, line: Option<usize>) -> bool {
        if !def.emittable_at(self.tool_version) {
            return false;
        }
        if let (Some(line), Some(state)) = (line, self.file_state.as_ref()) {
            if let Some((enabled, _)) = state.query(&def.symbol, line) {
                return enabled;
            }
        }
        self.global.get(&def.symbol).copied().unwrap_or(true)
    }

    /// Resolve one actual emission attempt, recording suppression
    /// bookkeeping when a line pragma swallows the message.
    pub fn resolve_emission(
        &mut self,
        symbol: &str,
        line: Option<usize>,
        confidence: Option<Confidence>,
    ) -> EmissionDecision {
        if let (Some(filter), Some(conf)) = (&self.confidence_filter, confidence) {
            if !filter.contains(&conf) {
                return EmissionDecision::Disabled;
            }
        }
        let def = match self.catalog.resolve(symbol) {
            Ok(defs) => defs[0].clone(),
            Err(_) => {
                warn!(symbol, "emission attempt for unknown message");
                return EmissionDecision::Emit;
            }
        };
        if !def.emittable_at(self.tool_version) {
            return EmissionDecision::Disabled;
        }
        if let (Some(line), Some(state)) = (line, self.file_state.as_mut()) {
            if let Some((enabled, pragma_line)) = state.query(&def.symbol, line) {
                if enabled {
                    return EmissionDecision::Emit;
                }
                state.note_suppression(&def.symbol, line, pragma_line);
                return EmissionDecision::SuppressedByPragma(pragma_line);
            }
        }
        if self.global.get(&def.symbol).copied().unwrap_or(true) {
            EmissionDecision::Emit
        } else {
            EmissionDecision::Disabled
        }
    }

    /// Disable pragmas of the current module that have suppressed nothing so
    /// far, as `(symbol, pragma line)` pairs. Queried at end of module,
    /// before the state is dropped, so the resulting diagnostics still go
    /// through normal suppression resolution.
    pub fn useless_suppressions(&self) -> Vec<(String, usize)> {
        self.file_state
            .as_ref()
            .map(FileState::useless_suppressions)
            .unwrap_or_default()
    }

    /// Finish the current module: return pragmas that suppressed nothing and
    /// drop the module state.
    pub fn end_module(&mut self) -> Vec<(String, usize)> {
        match self.file_state.take() {
            Some(state) => state.useless_suppressions(),
            None => Vec::new(),
        }
    }

    /// Drop module state without the useless-suppression query (skip-file).
    pub fn abandon_module(&mut self) {
        self.file_state = None;
    }

    /// Name of the module currently being tracked, if any.
    pub fn current_module(&self) -> Option<&str> {
        self.file_state.as_ref().map(|s| s.module.as_str())
    }

    /// The catalog this tracker resolves against.
    pub fn catalog(&self) -> &MessageCatalog {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::core::msgs::{MessageDefinition, MessageScope};
    use crate::lang::{IndentParser, ModuleParser};

    fn catalog() -> Arc<MessageCatalog> {
        let mut catalog = MessageCatalog::new();
        catalog
            .register(
                "demo",
                MessageDefinition::new("W0901", "unused-thing", "demo", MessageScope::Line).unwrap(),
            )
            .unwrap();
        catalog
            .register(
                "demo",
                MessageDefinition::new("C0902", "style-nit", "demo", MessageScope::Line).unwrap(),
            )
            .unwrap();
        catalog
            .register(
                "demo",
                MessageDefinition::new("C0903", "other-nit", "demo", MessageScope::Line).unwrap(),
            )
            .unwrap();
        Arc::new(catalog)
    }

    fn tracker() -> MessageStateTracker {
        MessageStateTracker::new(catalog(), &MessagesConfig::default(), (0, 3)).unwrap()
    }

    fn parse(source: &str) -> ParsedModule {
        IndentParser::new()
            .parse_source("m", Path::new("/tmp/m.nn"), "m.nn", source)
            .unwrap()
    }

    #[test]
    fn pragma_scan_parses_directives() {
        let parsed = parse("a = 1  # norn: disable=unused-thing, style-nit\n# norn: skip-file\n");
        let pragmas = scan_pragmas(&parsed.tokens);
        assert_eq!(pragmas.len(), 2);
        assert_eq!(pragmas[0].action, PragmaAction::Disable);
        assert_eq!(pragmas[0].names, vec!["unused-thing", "style-nit"]);
        assert_eq!(pragmas[1].action, PragmaAction::SkipFile);
    }

    #[test]
    fn disable_governs_following_lines_until_reenabled() {
        let mut t = tracker();
        let parsed = parse(
            "a = 1\n# norn: disable=unused-thing\nb = 2\nc = 3\n# norn: enable=unused-thing\nd = 4\n",
        );
        t.start_module("m", parsed.last_covered_line());
        assert!(t.apply_pragmas(&parsed).is_none());

        assert!(t.is_enabled("unused-thing", Some(1), None));
        assert!(!t.is_enabled("unused-thing", Some(3), None));
        assert!(!t.is_enabled("unused-thing", Some(4), None));
        assert!(t.is_enabled("unused-thing", Some(6), None));
        // The earlier interval is unaffected by the later enable.
        assert!(!t.is_enabled("unused-thing", Some(3), None));
    }

    #[test]
    fn disable_all_then_enable_one_leaves_exactly_one_enabled() {
        let mut t = tracker();
        t.disable("all");
        t.enable("style-nit");
        assert!(t.is_enabled("style-nit", None, None));
        assert!(!t.is_enabled("other-nit", None, None));
        assert!(!t.is_enabled("unused-thing", None, None));
    }

    #[test]
    fn category_letter_and_checker_name_expand() {
        let mut t = tracker();
        t.disable("C");
        assert!(!t.is_enabled("style-nit", None, None));
        assert!(t.is_enabled("unused-thing", None, None));

        let mut t = tracker();
        t.disable("demo");
        assert!(!t.is_enabled("unused-thing", None, None));
    }

    #[test]
    fn block_pragma_expires_with_block() {
        let mut t = tracker();
        let parsed = parse(
            "def f():\n    # norn: disable=unused-thing\n    a = 1\nb = 2\n",
        );
        t.start_module("m", parsed.last_covered_line());
        t.apply_pragmas(&parsed);

        assert!(!t.is_enabled("unused-thing", Some(3), None));
        assert!(t.is_enabled("unused-thing", Some(4), None));
    }

    #[test]
    fn trailing_lines_fall_back_to_closest_pragma() {
        let mut t = tracker();
        let parsed = parse("def f():\n    # norn: disable=unused-thing\n    a = 1\n");
        t.start_module("m", parsed.last_covered_line());
        t.apply_pragmas(&parsed);

        // Line 10 is past AST coverage and past the block interval; the raw
        // pragma state still governs it.
        assert!(!t.is_enabled("unused-thing", Some(10), None));
    }

    #[test]
    fn confidence_filter_applies_before_anything_else() {
        let config = MessagesConfig {
            confidence: Some(vec!["HIGH".to_string()]),
            ..MessagesConfig::default()
        };
        let t = MessageStateTracker::new(catalog(), &config, (0, 3)).unwrap();
        assert!(t.is_enabled("unused-thing", None, Some(Confidence::High)));
        assert!(!t.is_enabled("unused-thing", None, Some(Confidence::Medium)));
        assert!(t.is_enabled("unused-thing", None, None));
    }

    #[test]
    fn suppression_bookkeeping_flags_useless_pragmas() {
        let mut t = tracker();
        let parsed = parse(
            "# norn: disable=unused-thing\n# norn: disable=style-nit\na = 1\nb = 2\n",
        );
        t.start_module("m", parsed.last_covered_line());
        t.apply_pragmas(&parsed);

        // Only unused-thing actually fires inside its governed interval.
        assert_eq!(
            t.resolve_emission("unused-thing", Some(3), None),
            EmissionDecision::SuppressedByPragma(1)
        );

        let useless = t.end_module();
        assert_eq!(useless, vec![("style-nit".to_string(), 2)]);
    }

    #[test]
    fn pragma_suppresses_later_violation_and_counts_as_used() {
        let mut t = tracker();
        let source = "a = 1\nb = 2\nc = 3\nd = 4\n# norn: disable=unused-thing\nf = 6\ng = 7\nh = 8\ni = 9\nj = 10\n";
        let parsed = parse(source);
        t.start_module("m", parsed.last_covered_line());
        t.apply_pragmas(&parsed);

        assert!(t.is_enabled("unused-thing", Some(4), None));
        assert!(!t.is_enabled("unused-thing", Some(10), None));
        assert_eq!(
            t.resolve_emission("unused-thing", Some(10), None),
            EmissionDecision::SuppressedByPragma(5)
        );
        assert!(t.end_module().is_empty());
    }

    #[test]
    fn version_gated_messages_never_fire() {
        let mut catalog = MessageCatalog::new();
        catalog
            .register(
                "demo",
                MessageDefinition::new("W0905", "future-check", "demo", MessageScope::Line)
                    .unwrap()
                    .with_versions(Some((9, 0)), None),
            )
            .unwrap();
        let t =
            MessageStateTracker::new(Arc::new(catalog), &MessagesConfig::default(), (0, 3)).unwrap();
        assert!(!t.is_enabled("future-check", None, None));
    }

    #[test]
    fn skip_file_pragma_aborts_module() {
        let mut t = tracker();
        let parsed = parse("# norn: skip-file\na = 1\n");
        t.start_module("m", parsed.last_covered_line());
        assert_eq!(t.apply_pragmas(&parsed), Some(1));
    }
}
