//! Message definitions, the emitted message type, and the message catalog.
//!
//! Every diagnostic kind has two interchangeable names: a fixed-format
//! five-character id (`C0101`) and a stable human-readable symbol
//! (`line-too-long`). The catalog owns the bidirectional index between the
//! two, including retired names kept alive as aliases, and enforces the
//! registration invariants that make later lookups unambiguous.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use ahash::AHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::errors::{NornError, Result};

/// Severity category of a message, derived from the first letter of its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Informational messages; never affect the exit status
    Info,
    /// Coding-standard violations
    Convention,
    /// Code-smell findings that suggest a rewrite
    Refactor,
    /// Likely bugs or dangerous patterns
    Warning,
    /// Definite errors in the analyzed code
    Error,
    /// Errors that prevented further analysis of a file
    Fatal,
}

impl Category {
    /// All categories, in id-letter order used for `all` expansion.
    pub const ALL: [Category; 6] = [
        Category::Info,
        Category::Convention,
        Category::Refactor,
        Category::Warning,
        Category::Error,
        Category::Fatal,
    ];

    /// The id letter for this category.
    pub fn letter(self) -> char {
        match self {
            Category::Info => 'I',
            Category::Convention => 'C',
            Category::Refactor => 'R',
            Category::Warning => 'W',
            Category::Error => 'E',
            Category::Fatal => 'F',
        }
    }

    /// Map an id letter back to its category.
    pub fn from_letter(letter: char) -> Option<Category> {
        match letter.to_ascii_uppercase() {
            'I' => Some(Category::Info),
            'C' => Some(Category::Convention),
            'R' => Some(Category::Refactor),
            'W' => Some(Category::Warning),
            'E' => Some(Category::Error),
            'F' => Some(Category::Fatal),
            _ => None,
        }
    }

    /// Lower-case category name, as used in stats and reports.
    pub fn name(self) -> &'static str {
        match self {
            Category::Info => "info",
            Category::Convention => "convention",
            Category::Refactor => "refactor",
            Category::Warning => "warning",
            Category::Error => "error",
            Category::Fatal => "fatal",
        }
    }

    /// Exit-status bit contributed by a message of this category.
    pub fn exit_bit(self) -> i32 {
        match self {
            Category::Fatal => 1,
            Category::Error => 2,
            Category::Warning => 4,
            Category::Refactor => 8,
            Category::Convention => 16,
            Category::Info => 0,
        }
    }
}

/// Certainty of a finding, filtered independently of enable/disable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    /// The checker proved the finding from the code alone
    High,
    /// The finding relies on heuristics that are usually right
    Medium,
    /// The finding is speculative
    Low,
    /// The checker did not state a confidence
    Undefined,
}

impl Confidence {
    /// Upper-case confidence name used in configuration.
    pub fn name(self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
            Confidence::Undefined => "UNDEFINED",
        }
    }
}

impl FromStr for Confidence {
    type Err = NornError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Confidence::High),
            "MEDIUM" => Ok(Confidence::Medium),
            "LOW" => Ok(Confidence::Low),
            "UNDEFINED" => Ok(Confidence::Undefined),
            other => Err(NornError::config_field(
                format!("unknown confidence level '{other}'"),
                "confidence",
            )),
        }
    }
}

/// Whether a message is anchored to a raw line or to an AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageScope {
    /// Raw/token-level message; no AST node is available when it fires
    Line,
    /// AST-anchored message; may carry a line override at emission time
    Node,
}

/// Validated five-character message id.
///
/// Format: one category letter, two checker digits, two message digits.
/// Within one checker every id shares the same checker digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MsgId(String);

impl MsgId {
    /// Parse and validate an id, folding it to upper-case.
    pub fn parse(raw: &str) -> Result<MsgId> {
        let folded = raw.to_ascii_uppercase();
        let bytes = folded.as_bytes();
        if bytes.len() != 5 {
            return Err(NornError::registration(
                raw,
                "message id must be exactly 5 characters",
            ));
        }
        if Category::from_letter(bytes[0] as char).is_none() {
            return Err(NornError::registration(
                raw,
                "message id must start with one of I, C, R, W, E, F",
            ));
        }
        if !bytes[1..].iter().all(u8::is_ascii_digit) {
            return Err(NornError::registration(
                raw,
                "message id must end with 4 digits",
            ));
        }
        Ok(MsgId(folded))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Category derived from the id letter.
    pub fn category(&self) -> Category {
        Category::from_letter(self.0.as_bytes()[0] as char)
            .unwrap_or(Category::Fatal)
    }

    /// The two checker digits shared by all ids of one checker.
    pub fn checker_number(&self) -> &str {
        &self.0[1..3]
    }

    /// True if `name` is shaped like a message id (used to decide whether a
    /// user-supplied name should be case-folded before lookup).
    pub fn looks_like_id(name: &str) -> bool {
        let bytes = name.as_bytes();
        bytes.len() == 5
            && (bytes[0] as char).is_ascii_alphabetic()
            && bytes[1..].iter().all(u8::is_ascii_digit)
    }
}

impl FromStr for MsgId {
    type Err = NornError;

    fn from_str(s: &str) -> Result<Self> {
        MsgId::parse(s)
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MsgId {
    type Error = NornError;

    fn try_from(value: String) -> Result<Self> {
        MsgId::parse(&value)
    }
}

impl From<MsgId> for String {
    fn from(id: MsgId) -> String {
        id.0
    }
}

/// A retired `(id, symbol)` pair that must keep resolving to its successor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldName {
    /// The retired id
    pub id: MsgId,
    /// The retired symbol
    pub symbol: String,
}

/// Immutable definition of one diagnostic kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDefinition {
    /// Five-character id
    pub id: MsgId,
    /// Stable human-readable symbol
    pub symbol: String,
    /// One-line description shown in listings
    pub description: String,
    /// Line-anchored or node-anchored
    pub scope: MessageScope,
    /// Retired names that resolve to this definition
    #[serde(default)]
    pub old_names: Vec<OldName>,
    /// Emitted only at or above this `(major, minor)` tool version
    #[serde(default)]
    pub min_version: Option<(u16, u16)>,
    /// Emitted only at or below this `(major, minor)` tool version
    #[serde(default)]
    pub max_version: Option<(u16, u16)>,
}

impl MessageDefinition {
    /// Build a definition, validating the id format.
    pub fn new(
        id: &str,
        symbol: impl Into<String>,
        description: impl Into<String>,
        scope: MessageScope,
    ) -> Result<MessageDefinition> {
        Ok(MessageDefinition {
            id: MsgId::parse(id)?,
            symbol: symbol.into(),
            description: description.into(),
            scope,
            old_names: Vec::new(),
            min_version: None,
            max_version: None,
        })
    }

    /// Attach a retired name.
    pub fn with_old_name(mut self, old_id: &str, old_symbol: impl Into<String>) -> Result<Self> {
        self.old_names.push(OldName {
            id: MsgId::parse(old_id)?,
            symbol: old_symbol.into(),
        });
        Ok(self)
    }

    /// Gate emission by tool version.
    pub fn with_versions(
        mut self,
        min_version: Option<(u16, u16)>,
        max_version: Option<(u16, u16)>,
    ) -> Self {
        self.min_version = min_version;
        self.max_version = max_version;
        self
    }

    /// Whether this definition may emit under the given tool version.
    pub fn emittable_at(&self, version: (u16, u16)) -> bool {
        if let Some(min) = self.min_version {
            if version < min {
                return false;
            }
        }
        if let Some(max) = self.max_version {
            if version > max {
                return false;
            }
        }
        true
    }
}

/// Source location of an emitted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Absolute path of the file
    pub abspath: PathBuf,
    /// Path as given on the command line, used for display
    pub path: String,
    /// Dotted module name
    pub module: String,
    /// Name of the enclosing object (function, block), empty at module level
    pub obj: String,
    /// 1-based line
    pub line: usize,
    /// 0-based column
    pub column: usize,
    /// Optional end line for ranged findings
    #[serde(default)]
    pub end_line: Option<usize>,
    /// Optional end column for ranged findings
    #[serde(default)]
    pub end_column: Option<usize>,
}

/// One emitted diagnostic. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Id of the definition that fired
    pub msg_id: MsgId,
    /// Symbol of the definition that fired
    pub symbol: String,
    /// Formatted message text
    pub text: String,
    /// Confidence the checker attached to the finding
    pub confidence: Confidence,
    /// Where the finding is anchored
    pub location: Location,
}

impl Message {
    /// Category derived from the message id.
    pub fn category(&self) -> Category {
        self.msg_id.category()
    }
}

/// Immutable-after-registration store of message definitions.
///
/// Primary index is symbol → definition; ids and retired names live in an
/// alternate-name index that may map one retired name to several active
/// successors. A registration whose symbol or id collides with a *different*
/// existing definition is a fatal error, never a runtime surprise.
#[derive(Debug, Default)]
pub struct MessageCatalog {
    defs: IndexMap<String, MessageDefinition>,
    id_index: AHashMap<String, String>,
    alternates: AHashMap<String, Vec<String>>,
    by_category: IndexMap<Category, Vec<String>>,
    checker_numbers: AHashMap<String, String>,
    checker_members: AHashMap<String, Vec<String>>,
}

impl MessageCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition on behalf of the named checker.
    ///
    /// Fails if the id is malformed, the checker digits disagree with ids
    /// previously registered by the same checker, or the symbol, id, or any
    /// retired name collides with a different existing definition.
    /// Re-registering an identical definition is idempotent.
    pub fn register(&mut self, checker: &str, def: MessageDefinition) -> Result<()> {
        let number = def.id.checker_number().to_string();
        if let Some(existing) = self.checker_numbers.get(checker) {
            if existing != &number {
                return Err(NornError::registration(
                    def.id.as_str(),
                    format!(
                        "checker '{checker}' already owns message number {existing}, got {number}"
                    ),
                ));
            }
        }

        if let Some(existing) = self.defs.get(&def.symbol) {
            if existing == &def {
                return Ok(());
            }
            return Err(NornError::registration(
                &def.symbol,
                format!("symbol already registered as {}", existing.id),
            ));
        }
        if let Some(owner) = self.id_index.get(def.id.as_str()) {
            return Err(NornError::registration(
                def.id.as_str(),
                format!("id already registered as '{owner}'"),
            ));
        }
        if let Some(owners) = self.alternates.get(def.id.as_str()) {
            return Err(NornError::registration(
                def.id.as_str(),
                format!("id is a retired alias of '{}'", owners.join("', '")),
            ));
        }
        if let Some(owners) = self.alternates.get(def.symbol.as_str()) {
            return Err(NornError::registration(
                &def.symbol,
                format!("symbol is a retired alias of '{}'", owners.join("', '")),
            ));
        }
        for old in &def.old_names {
            self.check_alias_collision(&old.id, &old.symbol)?;
        }

        self.checker_numbers
            .entry(checker.to_string())
            .or_insert(number);
        self.checker_members
            .entry(checker.to_string())
            .or_default()
            .push(def.symbol.clone());
        self.id_index
            .insert(def.id.as_str().to_string(), def.symbol.clone());
        self.by_category
            .entry(def.id.category())
            .or_default()
            .push(def.symbol.clone());
        for old in &def.old_names {
            self.insert_alternate(old.id.as_str(), &def.symbol);
            self.insert_alternate(&old.symbol, &def.symbol);
        }
        self.defs.insert(def.symbol.clone(), def);
        Ok(())
    }

    /// Register a retired name for an already-registered definition.
    pub fn add_alias(&mut self, old_id: &str, old_symbol: &str, new_symbol: &str) -> Result<()> {
        let old_id = MsgId::parse(old_id)?;
        if !self.defs.contains_key(new_symbol) {
            return Err(NornError::unknown(new_symbol));
        }
        self.check_alias_collision(&old_id, old_symbol)?;
        self.insert_alternate(old_id.as_str(), new_symbol);
        self.insert_alternate(old_symbol, new_symbol);
        let def = self
            .defs
            .get_mut(new_symbol)
            .ok_or_else(|| NornError::unknown(new_symbol))?;
        def.old_names.push(OldName {
            id: old_id,
            symbol: old_symbol.to_string(),
        });
        Ok(())
    }

    /// Resolve an id, symbol, or retired name to its definitions.
    ///
    /// Returns a list because a retired id may legitimately map to more than
    /// one active successor. Id-shaped names are case-folded first so user
    /// casing never matters.
    pub fn resolve(&self, name: &str) -> Result<Vec<&MessageDefinition>> {
        let key = Self::normalize(name);
        if let Some(symbol) = self.id_index.get(key.as_ref()) {
            return Ok(vec![&self.defs[symbol.as_str()]]);
        }
        if let Some(def) = self.defs.get(name) {
            return Ok(vec![def]);
        }
        if let Some(symbols) = self.alternates.get(key.as_ref()) {
            let defs: Vec<&MessageDefinition> =
                symbols.iter().filter_map(|s| self.defs.get(s)).collect();
            if !defs.is_empty() {
                return Ok(defs);
            }
        }
        Err(NornError::unknown(name))
    }

    /// Look up a single definition by its exact symbol.
    pub fn get(&self, symbol: &str) -> Option<&MessageDefinition> {
        self.defs.get(symbol)
    }

    /// Symbols of every message in one category, in registration order.
    pub fn symbols_for_category(&self, category: Category) -> &[String] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Symbols registered by the named checker.
    pub fn symbols_for_checker(&self, checker: &str) -> &[String] {
        self.checker_members
            .get(checker)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All definitions in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = &MessageDefinition> {
        self.defs.values()
    }

    fn normalize(name: &str) -> std::borrow::Cow<'_, str> {
        if MsgId::looks_like_id(name) {
            std::borrow::Cow::Owned(name.to_ascii_uppercase())
        } else {
            std::borrow::Cow::Borrowed(name)
        }
    }

    fn insert_alternate(&mut self, name: &str, symbol: &str) {
        let entry = self.alternates.entry(name.to_string()).or_default();
        if !entry.iter().any(|s| s == symbol) {
            entry.push(symbol.to_string());
        }
    }

    fn check_alias_collision(&self, old_id: &MsgId, old_symbol: &str) -> Result<()> {
        if let Some(owner) = self.id_index.get(old_id.as_str()) {
            return Err(NornError::registration(
                old_id.as_str(),
                format!("alias id collides with active message '{owner}'"),
            ));
        }
        if self.defs.contains_key(old_symbol) {
            return Err(NornError::registration(
                old_symbol,
                "alias symbol collides with an active symbol",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: &str, symbol: &str) -> MessageDefinition {
        MessageDefinition::new(id, symbol, "test message", MessageScope::Line).unwrap()
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(MsgId::parse("C010").is_err());
        assert!(MsgId::parse("X0101").is_err());
        assert!(MsgId::parse("C01a1").is_err());
        assert!(MsgId::parse("c0101").is_ok());
        assert_eq!(MsgId::parse("c0101").unwrap().as_str(), "C0101");
    }

    #[test]
    fn category_derives_from_id_letter() {
        assert_eq!(MsgId::parse("W0801").unwrap().category(), Category::Warning);
        assert_eq!(MsgId::parse("F0001").unwrap().category(), Category::Fatal);
    }

    #[test]
    fn register_and_resolve_by_id_symbol_and_case() {
        let mut catalog = MessageCatalog::new();
        catalog.register("raw", def("C0101", "line-too-long")).unwrap();

        let by_symbol = catalog.resolve("line-too-long").unwrap();
        let by_id = catalog.resolve("C0101").unwrap();
        let by_lower_id = catalog.resolve("c0101").unwrap();
        assert_eq!(by_symbol, by_id);
        assert_eq!(by_id, by_lower_id);
        assert!(catalog.resolve("no-such-message").is_err());
    }

    #[test]
    fn colliding_registrations_are_fatal() {
        let mut catalog = MessageCatalog::new();
        catalog.register("raw", def("C0101", "line-too-long")).unwrap();

        // Same symbol, different id
        assert!(catalog.register("raw", def("C0102", "line-too-long")).is_err());
        // Same id, different symbol
        assert!(catalog.register("raw", def("C0101", "other-name")).is_err());
        // Identical registration is idempotent
        assert!(catalog.register("raw", def("C0101", "line-too-long")).is_ok());
    }

    #[test]
    fn checker_number_must_stay_consistent() {
        let mut catalog = MessageCatalog::new();
        catalog.register("raw", def("C0101", "line-too-long")).unwrap();
        catalog
            .register("raw", def("C0102", "trailing-whitespace"))
            .unwrap();
        assert!(catalog.register("raw", def("C0201", "stray-message")).is_err());
    }

    #[test]
    fn alias_round_trip() {
        let mut catalog = MessageCatalog::new();
        catalog.register("raw", def("C0102", "trailing-whitespace")).unwrap();
        catalog
            .add_alias("W0301", "bad-whitespace", "trailing-whitespace")
            .unwrap();

        let direct = catalog.resolve("trailing-whitespace").unwrap();
        assert_eq!(catalog.resolve("W0301").unwrap(), direct);
        assert_eq!(catalog.resolve("bad-whitespace").unwrap(), direct);
    }

    #[test]
    fn retired_id_may_map_to_multiple_successors() {
        let mut catalog = MessageCatalog::new();
        catalog.register("raw", def("C0103", "first-successor")).unwrap();
        catalog.register("raw", def("C0104", "second-successor")).unwrap();
        catalog
            .add_alias("C0199", "old-check", "first-successor")
            .unwrap();
        catalog
            .add_alias("C0199", "old-check", "second-successor")
            .unwrap();

        let defs = catalog.resolve("C0199").unwrap();
        assert_eq!(defs.len(), 2);
    }

    #[test]
    fn alias_colliding_with_active_name_is_fatal() {
        let mut catalog = MessageCatalog::new();
        catalog.register("raw", def("C0101", "line-too-long")).unwrap();
        catalog.register("raw", def("C0102", "trailing-whitespace")).unwrap();
        assert!(catalog
            .add_alias("C0101", "old-long", "trailing-whitespace")
            .is_err());
        assert!(catalog
            .add_alias("C0199", "line-too-long", "trailing-whitespace")
            .is_err());
    }

    #[test]
    fn registration_colliding_with_alias_is_fatal() {
        let mut catalog = MessageCatalog::new();
        catalog.register("raw", def("C0101", "line-too-long")).unwrap();
        catalog
            .add_alias("C0199", "old-long", "line-too-long")
            .unwrap();

        // An active registration may not shadow a retired id or symbol.
        assert!(catalog.register("raw", def("C0199", "brand-new")).is_err());
        assert!(catalog.register("raw", def("C0103", "old-long")).is_err());
        // The alias still resolves to its successor afterwards.
        let direct = catalog.resolve("line-too-long").unwrap();
        assert_eq!(catalog.resolve("C0199").unwrap(), direct);
        assert_eq!(catalog.resolve("old-long").unwrap(), direct);
    }

    #[test]
    fn version_gates() {
        let d = def("C0105", "gated").with_versions(Some((1, 2)), Some((2, 0)));
        assert!(!d.emittable_at((1, 1)));
        assert!(d.emittable_at((1, 2)));
        assert!(d.emittable_at((2, 0)));
        assert!(!d.emittable_at((2, 1)));
    }
}
