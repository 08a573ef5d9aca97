//! Parsing seam between the driver and guest-language front ends.
//!
//! The driver never inspects guest syntax itself; it consumes an AST whose
//! nodes are line/column addressable plus a finite token sequence, both
//! produced by a [`ModuleParser`]. Real grammars plug in behind that trait.
//! The bundled [`IndentParser`] understands just enough structure (comments,
//! indentation blocks) to drive the checker pipeline and the test corpus.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{NornError, Result};

/// Coarse token classification; checkers that need more detail re-scan text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// A run of source code on one line
    Code,
    /// A comment, whole-line or trailing
    Comment,
}

/// One token of a parsed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Classification
    pub kind: TokenKind,
    /// Raw token text
    pub text: String,
    /// 1-based line
    pub line: usize,
    /// 0-based column
    pub column: usize,
}

/// A node of the guest AST.
///
/// Kinds are open-ended strings so external parsers can introduce their own
/// vocabulary; the bundled parser produces `module`, `block`, and
/// `statement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstNode {
    /// Node kind, dispatched on by node-scope checkers
    pub kind: String,
    /// Declared name, when the node introduces one
    pub name: Option<String>,
    /// 1-based first line
    pub line: usize,
    /// 0-based column
    pub column: usize,
    /// 1-based last line covered by this node and its children
    pub end_line: usize,
    /// Child nodes in source order
    pub children: Vec<AstNode>,
}

impl AstNode {
    /// The end line of the innermost `block`/`module` node containing `line`.
    ///
    /// Used to bound the validity interval of an inline pragma: a directive
    /// inside a block expires with the block.
    pub fn enclosing_block_end(&self, line: usize) -> usize {
        let mut end = self.end_line;
        let mut node = self;
        loop {
            let child = node.children.iter().find(|c| {
                (c.kind == "block" || c.kind == "module")
                    && c.line <= line
                    && line <= c.end_line
            });
            match child {
                Some(c) => {
                    end = c.end_line;
                    node = c;
                }
                None => return end,
            }
        }
    }
}

/// A fully parsed module ready for checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedModule {
    /// Dotted module name
    pub module: String,
    /// Absolute path
    pub path: PathBuf,
    /// Path as given on the command line
    pub display_path: String,
    /// Raw source text
    pub source: String,
    /// AST root (kind `module`)
    pub ast: AstNode,
    /// Token sequence in source order
    pub tokens: Vec<Token>,
}

impl ParsedModule {
    /// Last line covered by the AST; lines past it hold only trivia.
    pub fn last_covered_line(&self) -> usize {
        self.ast.end_line
    }
}

/// External collaborator contract: turn a file into an AST plus tokens.
///
/// Failures must surface as typed errors, never as silent empties; the
/// driver degrades a parse failure into a single fatal diagnostic for that
/// file and moves on.
pub trait ModuleParser: Sync {
    /// Parse source text already in memory.
    fn parse_source(
        &self,
        module: &str,
        path: &Path,
        display_path: &str,
        source: &str,
    ) -> Result<ParsedModule>;

    /// Read and parse a file from disk.
    fn parse_file(&self, path: &Path, display_path: &str) -> Result<ParsedModule> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| NornError::parse(display_path, format!("cannot read file: {e}")))?;
        let module = module_name_for(path);
        self.parse_source(&module, path, display_path, &source)
    }
}

/// Derive a module name from a file path (the stem of the file name).
pub fn module_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Line/indentation parser for the bundled checkers and tests.
///
/// Grammar: `#` starts a comment (whole-line or trailing, quote-aware), a
/// statement ending in `:` opens an indented block, indentation must return
/// to a previously seen level. Nothing more; semantic structure belongs to
/// real front ends.
#[derive(Debug, Default, Clone)]
pub struct IndentParser;

impl IndentParser {
    /// Create a parser.
    pub fn new() -> Self {
        Self
    }

    fn split_comment(line: &str) -> (&str, Option<usize>) {
        let mut in_quote: Option<char> = None;
        for (idx, ch) in line.char_indices() {
            match in_quote {
                Some(q) if ch == q => in_quote = None,
                Some(_) => {}
                None if ch == '"' || ch == '\'' => in_quote = Some(ch),
                None if ch == '#' => return (&line[..idx], Some(idx)),
                None => {}
            }
        }
        (line, None)
    }
}

impl ModuleParser for IndentParser {
    fn parse_source(
        &self,
        module: &str,
        path: &Path,
        display_path: &str,
        source: &str,
    ) -> Result<ParsedModule> {
        let mut tokens = Vec::new();
        // Stack of (indent, children) frames; closing a frame folds its
        // statements into a block node on the parent.
        let mut stack: Vec<(usize, Vec<AstNode>)> = vec![(0, Vec::new())];
        let mut pending_block: Option<AstNode> = None;
        let mut last_line = 0usize;

        for (idx, raw_line) in source.lines().enumerate() {
            let line_no = idx + 1;
            if raw_line.contains('\t') {
                return Err(NornError::parse_at(
                    display_path,
                    "tab indentation is not supported",
                    line_no,
                    raw_line.find('\t').unwrap_or(0),
                ));
            }
            let indent = raw_line.len() - raw_line.trim_start_matches(' ').len();
            let (code_part, comment_at) = Self::split_comment(raw_line);
            let code = code_part.trim();

            if let Some(col) = comment_at {
                tokens.push(Token {
                    kind: TokenKind::Comment,
                    text: raw_line[col..].to_string(),
                    line: line_no,
                    column: col,
                });
            }
            if code.is_empty() {
                continue;
            }
            tokens.push(Token {
                kind: TokenKind::Code,
                text: code.to_string(),
                line: line_no,
                column: indent,
            });
            last_line = line_no;

            // A deeper line starts the body of the most recent `:` statement.
            if indent > stack.last().map(|f| f.0).unwrap_or(0) {
                match pending_block.take() {
                    Some(header) => {
                        stack.push((indent, vec![header]));
                    }
                    None => {
                        return Err(NornError::parse_at(
                            display_path,
                            "unexpected indent",
                            line_no,
                            indent,
                        ));
                    }
                }
            } else {
                pending_block = None;
                while indent < stack.last().map(|f| f.0).unwrap_or(0) {
                    let (_, children) = stack.pop().expect("stack never empty");
                    let parent = &mut stack.last_mut().expect("root frame").1;
                    close_block(parent, children);
                }
                if indent != stack.last().map(|f| f.0).unwrap_or(0) {
                    return Err(NornError::parse_at(
                        display_path,
                        "dedent to an unknown indentation level",
                        line_no,
                        indent,
                    ));
                }
            }

            let opens_block = code.ends_with(':');
            let node = AstNode {
                kind: "statement".to_string(),
                name: statement_name(code),
                line: line_no,
                column: indent,
                end_line: line_no,
                children: Vec::new(),
            };
            if opens_block {
                pending_block = Some(node.clone());
            }
            stack.last_mut().expect("root frame").1.push(node);
        }

        while stack.len() > 1 {
            let (_, children) = stack.pop().expect("checked len");
            let parent = &mut stack.last_mut().expect("root frame").1;
            close_block(parent, children);
        }

        let children = stack.pop().map(|f| f.1).unwrap_or_default();
        let end_line = children
            .iter()
            .map(|c| c.end_line)
            .max()
            .unwrap_or(last_line)
            .max(last_line);
        let ast = AstNode {
            kind: "module".to_string(),
            name: Some(module.to_string()),
            line: 1,
            column: 0,
            end_line,
            children,
        };

        Ok(ParsedModule {
            module: module.to_string(),
            path: path.to_path_buf(),
            display_path: display_path.to_string(),
            source: source.to_string(),
            ast,
            tokens,
        })
    }
}

/// Fold a finished indented body into a `block` node replacing its header
/// statement on the parent.
fn close_block(parent: &mut [AstNode], mut children: Vec<AstNode>) {
    let header = children.remove(0);
    let end_line = children
        .iter()
        .map(|c| c.end_line)
        .max()
        .unwrap_or(header.end_line);
    if let Some(slot) = parent.iter_mut().rev().find(|n| n.line == header.line) {
        *slot = AstNode {
            kind: "block".to_string(),
            name: header.name.clone(),
            line: header.line,
            column: header.column,
            end_line,
            children,
        };
    }
}

fn statement_name(code: &str) -> Option<String> {
    let mut words = code.split_whitespace();
    let first = words.next()?;
    if matches!(first, "def" | "block" | "class" | "fn") {
        let name = words.next()?;
        Some(name.trim_end_matches(':').trim_end_matches("()").to_string())
    } else {
        None
    }
}
