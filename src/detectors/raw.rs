//! Line-scope format checks.
//!
//! Small token-level checker exercising the registry from the shipped
//! binary; it fires before any AST walk and needs no consolidation.

use crate::core::checkers::{CheckContext, Checker};
use crate::core::config::RawConfig;
use crate::core::msgs::{Confidence, MessageDefinition, MessageScope};
use crate::lang::ParsedModule;

/// Physical-line checks: length and trailing whitespace.
pub struct RawChecker {
    max_line_length: usize,
}

impl RawChecker {
    /// Create a raw checker with the configured limits.
    pub fn new(config: &RawConfig) -> Self {
        RawChecker {
            max_line_length: config.max_line_length,
        }
    }
}

impl Checker for RawChecker {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn messages(&self) -> Vec<MessageDefinition> {
        vec![
            MessageDefinition::new(
                "C0101",
                "line-too-long",
                "A physical line exceeds the configured maximum length",
                MessageScope::Line,
            )
            .expect("static definition"),
            MessageDefinition::new(
                "C0102",
                "trailing-whitespace",
                "A line ends with spaces",
                MessageScope::Line,
            )
            .expect("static definition"),
        ]
    }

    fn process_tokens(&mut self, module: &ParsedModule, ctx: &mut CheckContext<'_>) {
        for (idx, line) in module.source.lines().enumerate() {
            let line_no = idx + 1;
            let length = line.chars().count();
            if length > self.max_line_length {
                ctx.add_message(
                    "line-too-long",
                    line_no,
                    self.max_line_length,
                    format!("Line too long ({length}/{})", self.max_line_length),
                    Confidence::High,
                );
            }
            if line != line.trim_end() && !line.trim_end().is_empty() {
                ctx.add_message(
                    "trailing-whitespace",
                    line_no,
                    line.trim_end().chars().count(),
                    "Trailing whitespace",
                    Confidence::High,
                );
            }
        }
    }
}
